use crate::narrator::{Completion, Narrator, PlaybackRequest};
use crate::speaking::SpeakingSignal;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use voxtutor_audio::OutputContext;
use voxtutor_backend::SpeechSynthesizer;
use voxtutor_core::{EncodedAudioChunk, Language};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarratorCommand {
    Speak { text: String, language: Language },
    Stop,
    Cancel,
    Shutdown,
}

/// Observable outcome of each synthesis that came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrationReport {
    pub generation: u64,
    pub completion: Completion,
}

/// Control side of a running narrator task.
pub struct NarratorHandle {
    commands: mpsc::UnboundedSender<NarratorCommand>,
    speaking: watch::Receiver<bool>,
    reports: Option<mpsc::UnboundedReceiver<NarrationReport>>,
    task: Option<JoinHandle<()>>,
}

impl NarratorHandle {
    pub fn speak(&self, text: impl Into<String>, language: Language) {
        self.send(NarratorCommand::Speak {
            text: text.into(),
            language,
        });
    }

    pub fn stop(&self) {
        self.send(NarratorCommand::Stop);
    }

    /// Stop and drop whatever synthesis is still pending.
    pub fn cancel(&self) {
        self.send(NarratorCommand::Cancel);
    }

    pub fn speaking(&self) -> watch::Receiver<bool> {
        self.speaking.clone()
    }

    pub fn is_speaking(&self) -> bool {
        *self.speaking.borrow()
    }

    pub fn take_report_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<NarrationReport>> {
        self.reports.take()
    }

    pub async fn shutdown(&mut self) {
        self.send(NarratorCommand::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, command: NarratorCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("narrator task already stopped");
        }
    }
}

/// Spawn the task that owns the [`Narrator`]. Every state change happens on it;
/// synthesis runs in side tasks that report back with their request.
pub fn spawn_narrator<S>(synthesizer: Arc<S>, output: Arc<dyn OutputContext>) -> NarratorHandle
where
    S: SpeechSynthesizer + ?Sized + 'static,
{
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<NarratorCommand>();
    let (ended_tx, mut ended_rx) = mpsc::unbounded_channel();
    let (done_tx, mut done_rx) =
        mpsc::unbounded_channel::<(PlaybackRequest, Option<EncodedAudioChunk>)>();
    let (report_tx, report_rx) = mpsc::unbounded_channel();

    let signal = SpeakingSignal::new();
    let speaking = signal.subscribe();
    let mut narrator = Narrator::new(output, ended_tx, signal);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                command = cmd_rx.recv() => {
                    match command {
                        Some(NarratorCommand::Speak { text, language }) => {
                            let request = narrator.speak(&text);
                            let synthesizer = Arc::clone(&synthesizer);
                            let done = done_tx.clone();
                            tokio::spawn(async move {
                                let audio = synthesizer.synthesize(request.text(), language).await;
                                let _ = done.send((request, audio));
                            });
                        }
                        Some(NarratorCommand::Stop) => narrator.stop(),
                        Some(NarratorCommand::Cancel) => narrator.cancel(),
                        Some(NarratorCommand::Shutdown) | None => {
                            narrator.stop();
                            tracing::debug!("narrator task shutting down");
                            break;
                        }
                    }
                }
                Some((request, audio)) = done_rx.recv() => {
                    let completion = narrator.complete(&request, audio);
                    let _ = report_tx.send(NarrationReport {
                        generation: request.generation(),
                        completion,
                    });
                }
                Some(end) = ended_rx.recv() => narrator.on_source_ended(end),
            }
        }
    });

    NarratorHandle {
        commands: cmd_tx,
        speaking,
        reports: Some(report_rx),
        task: Some(task),
    }
}
