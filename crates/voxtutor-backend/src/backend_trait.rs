use crate::live::LiveConnection;
use async_trait::async_trait;
use voxtutor_core::{BackendError, Diagram, EncodedAudioChunk, Language, LessonRequest, TransportError};

/// Text content for the lesson views. Failures come back as readable fallback text.
#[async_trait]
pub trait LessonGenerator: Send + Sync {
    async fn explain_lesson(&self, request: &LessonRequest) -> String;

    async fn generate_test(&self, language: Language, unit_title: &str, topic_title: &str) -> String;

    async fn generate_diagram(
        &self,
        language: Language,
        topic_title: &str,
    ) -> Result<Diagram, BackendError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Base64 PCM16 at the playback rate, or `None` when no audio is available.
    async fn synthesize(&self, text: &str, language: Language) -> Option<EncodedAudioChunk>;
}

#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect_live(&self, language: Language) -> Result<LiveConnection, TransportError>;
}

/// A complete backend as selected by name from the registry.
#[async_trait]
pub trait TutorBackend: LessonGenerator + SpeechSynthesizer + LiveConnector {
    fn name(&self) -> &str;
    async fn initialize(&mut self, config: toml::Value) -> Result<(), BackendError>;
}
