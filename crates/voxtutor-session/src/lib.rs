pub mod lesson;
pub mod live;

pub use lesson::LessonSession;
pub use live::LiveSessionHost;
