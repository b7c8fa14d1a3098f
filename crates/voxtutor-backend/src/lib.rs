pub mod backend_trait;
pub mod gemini;
pub mod live;
pub mod null_backend;
pub mod prompt;
pub mod registry;

pub use backend_trait::{LessonGenerator, LiveConnector, SpeechSynthesizer, TutorBackend};
pub use gemini::GeminiBackend;
pub use live::{LiveCommand, LiveConnection, LiveEvent, LiveTransport};
pub use null_backend::{tone_chunk, NullBackend};
pub use registry::BackendRegistry;
