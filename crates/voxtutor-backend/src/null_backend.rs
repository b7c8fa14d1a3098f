use crate::backend_trait::{LessonGenerator, LiveConnector, SpeechSynthesizer, TutorBackend};
use crate::live::{LiveCommand, LiveConnection, LiveEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use voxtutor_audio::{encode, PLAYBACK_SAMPLE_RATE};
use voxtutor_core::{
    BackendError, Diagram, EncodedAudioChunk, Language, LessonRequest, TransportError,
};

const DEFAULT_TONE_HZ: f32 = 440.0;
const DEFAULT_ECHO_EVERY: usize = 4;
const SECONDS_PER_CHAR: f32 = 0.05;
const MAX_SPEECH_SECONDS: f32 = 3.0;
const ECHO_SECONDS: f32 = 0.25;
const TONE_GAIN: f32 = 0.2;

/// Offline backend: canned text, sine-tone speech, and a live echo.
pub struct NullBackend {
    tone_hz: f32,
    echo_every: usize,
    synth_count: Arc<AtomicUsize>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            tone_hz: DEFAULT_TONE_HZ,
            echo_every: DEFAULT_ECHO_EVERY,
            synth_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn synth_count(&self) -> usize {
        self.synth_count.load(Ordering::Relaxed)
    }

    pub fn echo_every(&self) -> usize {
        self.echo_every
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// A sine tone at the playback rate, already encoded for the wire.
pub fn tone_chunk(freq_hz: f32, seconds: f32) -> EncodedAudioChunk {
    let len = (seconds.max(0.0) * PLAYBACK_SAMPLE_RATE as f32) as usize;
    let step = std::f32::consts::TAU * freq_hz / PLAYBACK_SAMPLE_RATE as f32;
    let samples: Vec<f32> = (0..len).map(|i| (i as f32 * step).sin() * TONE_GAIN).collect();
    encode(&samples)
}

#[async_trait]
impl LessonGenerator for NullBackend {
    async fn explain_lesson(&self, request: &LessonRequest) -> String {
        format!(
            "[null] {} / {}: part {} explanation ({})",
            request.unit_title,
            request.topic_title,
            request.part,
            request.language.code()
        )
    }

    async fn generate_test(&self, language: Language, unit_title: &str, topic_title: &str) -> String {
        format!("[null] test for {unit_title} / {topic_title} ({})", language.code())
    }

    async fn generate_diagram(
        &self,
        language: Language,
        topic_title: &str,
    ) -> Result<Diagram, BackendError> {
        Ok(Diagram {
            image_url: String::new(),
            explanation: format!("[null] diagram of {topic_title} ({})", language.code()),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for NullBackend {
    async fn synthesize(&self, text: &str, _language: Language) -> Option<EncodedAudioChunk> {
        let chars = text.chars().count();
        if chars == 0 {
            return None;
        }
        let count = self.synth_count.fetch_add(1, Ordering::Relaxed) + 1;
        let seconds = (chars as f32 * SECONDS_PER_CHAR).min(MAX_SPEECH_SECONDS);
        tracing::trace!("NullBackend synthesis #{count}, {chars} chars, {seconds:.2}s");
        Some(tone_chunk(self.tone_hz, seconds))
    }
}

#[async_trait]
impl LiveConnector for NullBackend {
    async fn connect_live(&self, language: Language) -> Result<LiveConnection, TransportError> {
        let (connection, mut transport) = LiveConnection::pair();
        let echo_every = self.echo_every;
        let tone_hz = self.tone_hz;

        let task = tokio::spawn(async move {
            transport.emit(LiveEvent::Opened);
            let mut received = 0usize;
            while let Some(command) = transport.commands.recv().await {
                match command {
                    LiveCommand::Audio(_) => {
                        received += 1;
                        if received % echo_every == 0
                            && !transport.emit(LiveEvent::AudioChunk(tone_chunk(tone_hz, ECHO_SECONDS)))
                        {
                            break;
                        }
                    }
                    LiveCommand::Close => break,
                }
            }
            transport.emit(LiveEvent::Closed);
            tracing::debug!(language = language.code(), received, "null live session ended");
        });

        Ok(connection.with_task(task))
    }
}

#[async_trait]
impl TutorBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    async fn initialize(&mut self, config: toml::Value) -> Result<(), BackendError> {
        if let Some(hz) = config.get("tone_hz") {
            let hz = hz
                .as_float()
                .or_else(|| hz.as_integer().map(|v| v as f64))
                .ok_or_else(|| {
                    BackendError::InitializationFailed("'tone_hz' must be a number".to_string())
                })?;
            self.tone_hz = hz as f32;
        }
        if let Some(every) = config.get("echo_every") {
            let every = every
                .as_integer()
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    BackendError::InitializationFailed(
                        "'echo_every' must be a positive integer".to_string(),
                    )
                })?;
            self.echo_every = every as usize;
        }
        Ok(())
    }
}
