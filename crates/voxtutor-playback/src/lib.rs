pub mod narrator;
pub mod narrator_task;
pub mod speaking;
pub mod stream;

pub use narrator::{clean_text, Completion, Narrator, PlaybackRequest};
pub use narrator_task::{spawn_narrator, NarrationReport, NarratorCommand, NarratorHandle};
pub use speaking::SpeakingSignal;
pub use stream::StreamScheduler;
