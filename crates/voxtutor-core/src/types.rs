use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mono `f32` samples in `[-1, 1]` at a fixed sample rate. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSampleBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioSampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Base64 text of little-endian 16-bit PCM, as carried across the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedAudioChunk(String);

impl EncodedAudioChunk {
    pub fn new(base64: impl Into<String>) -> Self {
        Self(base64.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for EncodedAudioChunk {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EncodedAudioChunk {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Arabic => "ar",
            Language::English => "en",
        }
    }

    /// Human name used inside prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Arabic => "Arabic",
            Language::English => "English",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ar" | "arabic" => Ok(Language::Arabic),
            "en" | "english" => Ok(Language::English),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

/// Number of parts every lesson topic is split into.
pub const LESSON_PARTS: u8 = 4;

/// One lesson-explanation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRequest {
    pub language: Language,
    pub unit_title: String,
    pub topic_title: String,
    pub part: u8,
}

/// A generated diagram and its spoken explanation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagram {
    /// `data:image/png;base64,...` URL, empty when no image was produced.
    pub image_url: String,
    pub explanation: String,
}
