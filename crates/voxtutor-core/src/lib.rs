pub mod config;
pub mod error;
pub mod status;
pub mod types;

pub use config::{AppConfig, AudioConfig, BackendConfig, GeminiConfig, GeneralConfig, NullConfig};
pub use error::{AudioError, BackendError, ConfigError, DecodeError, TransportError};
pub use status::{DeviceStatus, SessionStatus};
pub use types::{AudioSampleBuffer, Diagram, EncodedAudioChunk, Language, LessonRequest, LESSON_PARTS};
