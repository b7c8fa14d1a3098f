use std::sync::Arc;
use voxtutor_backend::{prompt, LessonGenerator};
use voxtutor_core::{BackendError, Diagram, Language, LessonRequest, LESSON_PARTS};
use voxtutor_playback::NarratorHandle;

/// One student working through a topic: generates content and narrates it.
///
/// Every request cancels the narration in progress before generating, so a
/// slow reply for an old request can never be heard over the new one.
pub struct LessonSession<G: LessonGenerator + ?Sized> {
    generator: Arc<G>,
    narrator: NarratorHandle,
    language: Language,
    unit_title: String,
    topic_title: String,
    part: u8,
    last_spoken: Option<String>,
}

impl<G: LessonGenerator + ?Sized> LessonSession<G> {
    pub fn new(
        generator: Arc<G>,
        narrator: NarratorHandle,
        language: Language,
        unit_title: impl Into<String>,
        topic_title: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            narrator,
            language,
            unit_title: unit_title.into(),
            topic_title: topic_title.into(),
            part: 1,
            last_spoken: None,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.narrator.cancel();
        self.language = language;
    }

    pub fn part(&self) -> u8 {
        self.part
    }

    pub fn set_part(&mut self, part: u8) {
        self.part = part.clamp(1, LESSON_PARTS);
    }

    pub fn unit_title(&self) -> &str {
        &self.unit_title
    }

    pub fn topic_title(&self) -> &str {
        &self.topic_title
    }

    /// Switch topic and start over at part 1.
    pub fn select_topic(&mut self, unit_title: impl Into<String>, topic_title: impl Into<String>) {
        self.narrator.cancel();
        self.unit_title = unit_title.into();
        self.topic_title = topic_title.into();
        self.part = 1;
        self.last_spoken = None;
    }

    pub fn narrator(&self) -> &NarratorHandle {
        &self.narrator
    }

    pub fn narrator_mut(&mut self) -> &mut NarratorHandle {
        &mut self.narrator
    }

    /// Explain the current part and narrate it. Returns the text shown.
    pub async fn explain(&mut self) -> String {
        self.narrator.cancel();
        let request = LessonRequest {
            language: self.language,
            unit_title: self.unit_title.clone(),
            topic_title: self.topic_title.clone(),
            part: self.part,
        };
        tracing::info!(
            topic = %self.topic_title,
            part = self.part,
            "explaining lesson part"
        );
        let text = self.generator.explain_lesson(&request).await;
        self.narrate(text.clone());
        text
    }

    /// Move to the next part and explain it; `None` on the last part.
    pub async fn next_part(&mut self) -> Option<String> {
        if self.part >= LESSON_PARTS {
            return None;
        }
        self.part += 1;
        Some(self.explain().await)
    }

    pub async fn previous_part(&mut self) -> Option<String> {
        if self.part <= 1 {
            return None;
        }
        self.part -= 1;
        Some(self.explain().await)
    }

    /// Generate a test for the topic. The narration opens with a short intro.
    pub async fn request_test(&mut self) -> String {
        self.narrator.cancel();
        tracing::info!(topic = %self.topic_title, "generating test");
        let test = self
            .generator
            .generate_test(self.language, &self.unit_title, &self.topic_title)
            .await;
        self.narrate(format!("{} {}", prompt::test_intro(self.language), test));
        test
    }

    /// Generate a diagram and narrate its explanation. Nothing is spoken on failure.
    pub async fn request_diagram(&mut self) -> Result<Diagram, BackendError> {
        self.narrator.cancel();
        tracing::info!(topic = %self.topic_title, "generating diagram");
        let diagram = self
            .generator
            .generate_diagram(self.language, &self.topic_title)
            .await?;
        self.narrate(diagram.explanation.clone());
        Ok(diagram)
    }

    /// Speak the last narrated text again, if any.
    pub fn replay(&self) -> bool {
        match &self.last_spoken {
            Some(text) => {
                self.narrator.speak(text.clone(), self.language);
                true
            }
            None => false,
        }
    }

    pub fn stop_speaking(&self) {
        self.narrator.stop();
    }

    fn narrate(&mut self, text: String) {
        self.narrator.speak(text.clone(), self.language);
        self.last_spoken = Some(text);
    }
}
