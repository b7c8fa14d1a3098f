use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use voxtutor_audio::{encode, OutputContext};
use voxtutor_backend::{LiveConnection, LiveConnector, LiveEvent};
use voxtutor_core::{AudioSampleBuffer, Language, SessionStatus};
use voxtutor_playback::{SpeakingSignal, StreamScheduler};

/// A running live voice conversation: microphone blocks go upstream, model
/// audio comes back through a [`StreamScheduler`].
pub struct LiveSessionHost {
    status: watch::Receiver<SessionStatus>,
    speaking: watch::Receiver<bool>,
    close_tx: mpsc::UnboundedSender<()>,
    task: Option<JoinHandle<()>>,
}

impl LiveSessionHost {
    pub fn start<C>(
        connector: Arc<C>,
        output: Arc<dyn OutputContext>,
        mic_rx: mpsc::UnboundedReceiver<AudioSampleBuffer>,
        language: Language,
    ) -> Self
    where
        C: LiveConnector + ?Sized + 'static,
    {
        let (status_tx, status) = watch::channel(SessionStatus::Connecting);
        let (close_tx, close_rx) = mpsc::unbounded_channel();
        let signal = SpeakingSignal::new();
        let speaking = signal.subscribe();

        let task = tokio::spawn(run_session(
            connector, output, mic_rx, close_rx, status_tx, signal, language,
        ));

        Self {
            status,
            speaking,
            close_tx,
            task: Some(task),
        }
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn speaking(&self) -> watch::Receiver<bool> {
        self.speaking.clone()
    }

    /// Wait for the session task to end on its own. After a remote close this
    /// returns once the last model audio has played.
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }

    /// Stop playback, close the connection and wait for the session task.
    pub async fn close(&mut self) {
        let _ = self.close_tx.send(());
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn run_session<C>(
    connector: Arc<C>,
    output: Arc<dyn OutputContext>,
    mut mic_rx: mpsc::UnboundedReceiver<AudioSampleBuffer>,
    mut close_rx: mpsc::UnboundedReceiver<()>,
    status_tx: watch::Sender<SessionStatus>,
    signal: SpeakingSignal,
    language: Language,
) where
    C: LiveConnector + ?Sized,
{
    let connected = tokio::select! {
        _ = close_rx.recv() => {
            status_tx.send_replace(SessionStatus::Closed);
            return;
        }
        result = connector.connect_live(language) => result,
    };

    let mut connection: LiveConnection = match connected {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!("live session connect failed: {e}");
            status_tx.send_replace(SessionStatus::Error);
            return;
        }
    };
    let Some(mut events) = connection.take_event_receiver() else {
        tracing::error!("live connection has no event stream");
        status_tx.send_replace(SessionStatus::Error);
        return;
    };

    let (ended_tx, mut ended_rx) = mpsc::unbounded_channel();
    let mut scheduler = StreamScheduler::new(output, ended_tx, signal);
    let mut open = false;
    let mut remote_done = false;
    let mut mic_live = true;
    let mut dropped_blocks = 0usize;

    loop {
        tokio::select! {
            _ = close_rx.recv() => {
                scheduler.on_interrupted();
                connection.shutdown().await;
                if !status_tx.borrow().is_terminal() {
                    status_tx.send_replace(SessionStatus::Closed);
                }
                break;
            }
            event = events.recv(), if !remote_done => {
                match event {
                    Some(LiveEvent::Opened) => {
                        open = true;
                        status_tx.send_replace(SessionStatus::Open);
                        tracing::info!(language = language.code(), "live session open");
                    }
                    Some(LiveEvent::AudioChunk(chunk)) => {
                        scheduler.on_audio_chunk(&chunk);
                    }
                    Some(LiveEvent::Text(text)) => {
                        tracing::debug!("live text: {text}");
                    }
                    Some(LiveEvent::Interrupted) => scheduler.on_interrupted(),
                    Some(LiveEvent::Error(e)) => {
                        tracing::error!("live session error: {e}");
                        scheduler.on_interrupted();
                        status_tx.send_replace(SessionStatus::Error);
                        connection.close();
                        remote_done = true;
                    }
                    Some(LiveEvent::Closed) | None => {
                        tracing::info!("live session closed by remote");
                        if !status_tx.borrow().is_terminal() {
                            status_tx.send_replace(SessionStatus::Closed);
                        }
                        remote_done = true;
                    }
                }
            }
            block = mic_rx.recv(), if mic_live && !remote_done => {
                match block {
                    Some(block) if open => {
                        if let Err(e) = connection.send_realtime_input(encode(block.samples())) {
                            tracing::debug!("microphone block not sent: {e}");
                        }
                    }
                    Some(_) => dropped_blocks += 1,
                    None => {
                        tracing::debug!("microphone stream ended");
                        mic_live = false;
                    }
                }
            }
            Some(end) = ended_rx.recv() => scheduler.on_source_ended(end),
        }

        // Let the last model audio finish after the remote side went away
        if remote_done && scheduler.active_count() == 0 {
            break;
        }
    }

    if dropped_blocks > 0 {
        tracing::debug!(dropped_blocks, "microphone blocks dropped before the session opened");
    }
}
