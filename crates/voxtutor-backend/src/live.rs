use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voxtutor_core::{EncodedAudioChunk, TransportError};

/// Everything a live session can report. Consumers match exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Opened,
    AudioChunk(EncodedAudioChunk),
    Text(String),
    /// The user barged in; queued model audio must be dropped.
    Interrupted,
    Error(TransportError),
    Closed,
}

/// Upstream traffic from the session to the backend transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveCommand {
    Audio(EncodedAudioChunk),
    Close,
}

/// Session-side end of a live connection.
pub struct LiveConnection {
    commands: mpsc::UnboundedSender<LiveCommand>,
    events: Option<mpsc::UnboundedReceiver<LiveEvent>>,
    task: Option<JoinHandle<()>>,
}

/// Backend-side end of a live connection.
pub struct LiveTransport {
    pub commands: mpsc::UnboundedReceiver<LiveCommand>,
    pub events: mpsc::UnboundedSender<LiveEvent>,
}

impl LiveConnection {
    /// Create a connected pair. The backend drives the transport half.
    pub fn pair() -> (LiveConnection, LiveTransport) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connection = LiveConnection {
            commands: cmd_tx,
            events: Some(event_rx),
            task: None,
        };
        let transport = LiveTransport {
            commands: cmd_rx,
            events: event_tx,
        };
        (connection, transport)
    }

    /// Attach the task that serves the transport so `shutdown` can await it.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<LiveEvent>> {
        self.events.take()
    }

    pub fn send_realtime_input(&self, chunk: EncodedAudioChunk) -> Result<(), TransportError> {
        self.commands
            .send(LiveCommand::Audio(chunk))
            .map_err(|_| TransportError::Closed)
    }

    /// Ask the transport to close. Harmless if it is already gone.
    pub fn close(&self) {
        let _ = self.commands.send(LiveCommand::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Close and wait for the transport task to finish.
    pub async fn shutdown(&mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl LiveTransport {
    /// Returns `false` once the session side stopped listening.
    pub fn emit(&self, event: LiveEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_forwards_audio_and_close() {
        let (conn, mut transport) = LiveConnection::pair();
        conn.send_realtime_input(EncodedAudioChunk::from("AAAA")).unwrap();
        conn.close();

        assert_eq!(
            transport.commands.recv().await,
            Some(LiveCommand::Audio(EncodedAudioChunk::from("AAAA")))
        );
        assert_eq!(transport.commands.recv().await, Some(LiveCommand::Close));
    }

    #[tokio::test]
    async fn test_pair_delivers_events() {
        let (mut conn, transport) = LiveConnection::pair();
        let mut events = conn.take_event_receiver().unwrap();
        assert!(conn.take_event_receiver().is_none());

        assert!(transport.emit(LiveEvent::Opened));
        assert!(transport.emit(LiveEvent::Interrupted));
        assert_eq!(events.recv().await, Some(LiveEvent::Opened));
        assert_eq!(events.recv().await, Some(LiveEvent::Interrupted));
    }

    #[test]
    fn test_send_after_transport_dropped_is_closed_error() {
        let (conn, transport) = LiveConnection::pair();
        drop(transport);
        assert!(conn.is_closed());
        assert_eq!(
            conn.send_realtime_input(EncodedAudioChunk::from("AAAA")),
            Err(TransportError::Closed)
        );
        // close on a dead transport does not panic
        conn.close();
    }

    #[test]
    fn test_emit_after_session_dropped_returns_false() {
        let (mut conn, transport) = LiveConnection::pair();
        drop(conn.take_event_receiver());
        assert!(!transport.emit(LiveEvent::Closed));
    }

    #[tokio::test]
    async fn test_shutdown_awaits_task() {
        let (conn, mut transport) = LiveConnection::pair();
        let task = tokio::spawn(async move {
            while let Some(cmd) = transport.commands.recv().await {
                if cmd == LiveCommand::Close {
                    transport.emit(LiveEvent::Closed);
                    break;
                }
            }
        });
        let mut conn = conn.with_task(task);
        let mut events = conn.take_event_receiver().unwrap();
        conn.shutdown().await;
        assert_eq!(events.recv().await, Some(LiveEvent::Closed));
    }
}
