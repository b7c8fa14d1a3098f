//! One-shot narration. Each `speak` supersedes everything before it: the
//! previous source is stopped and any synthesis still in flight for an older
//! generation is discarded when it completes.

use crate::speaking::SpeakingSignal;
use std::sync::Arc;
use tokio::sync::mpsc;
use voxtutor_audio::{decode, OutputContext, SourceEnd, SourceHandle, SourceId, PLAYBACK_SAMPLE_RATE};
use voxtutor_core::EncodedAudioChunk;

/// Characters stripped before text is sent for synthesis.
const MARKUP_CHARS: [char; 6] = ['*', '_', '#', '$', '`', '~'];

/// Remove markdown-ish markup and surrounding whitespace.
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| !MARKUP_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Ticket for one narration, carried through the async synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    generation: u64,
    text: String,
}

impl PlaybackRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cleaned text to synthesize.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Started(SourceId),
    /// A newer request exists; nothing changed.
    Stale,
    NoAudio,
    Failed,
}

pub struct Narrator {
    output: Arc<dyn OutputContext>,
    generation: u64,
    active: Option<SourceHandle>,
    speaking: SpeakingSignal,
    ended_tx: mpsc::UnboundedSender<SourceEnd>,
}

impl Narrator {
    /// `ended_tx` receives the end of every source this narrator starts;
    /// route those back into [`Narrator::on_source_ended`].
    pub fn new(
        output: Arc<dyn OutputContext>,
        ended_tx: mpsc::UnboundedSender<SourceEnd>,
        speaking: SpeakingSignal,
    ) -> Self {
        Self {
            output,
            generation: 0,
            active: None,
            speaking,
            ended_tx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.get()
    }

    pub fn active_source(&self) -> Option<SourceId> {
        self.active.as_ref().map(|h| h.id())
    }

    /// Start a new narration. Speaking turns on right away, while synthesis is pending.
    pub fn speak(&mut self, text: &str) -> PlaybackRequest {
        self.stop();
        self.generation += 1;
        self.speaking.set(true);
        tracing::debug!(generation = self.generation, "narration requested");
        PlaybackRequest {
            generation: self.generation,
            text: clean_text(text),
        }
    }

    /// Resume a request once its synthesis finished.
    pub fn complete(
        &mut self,
        request: &PlaybackRequest,
        audio: Option<EncodedAudioChunk>,
    ) -> Completion {
        if request.generation != self.generation {
            tracing::trace!(
                generation = request.generation,
                current = self.generation,
                "stale narration discarded"
            );
            return Completion::Stale;
        }

        let Some(chunk) = audio else {
            tracing::debug!(generation = request.generation, "no audio for narration");
            self.speaking.set(false);
            return Completion::NoAudio;
        };

        let buffer = match decode(&chunk, PLAYBACK_SAMPLE_RATE) {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::warn!(generation = request.generation, "narration audio undecodable: {e}");
                self.speaking.set(false);
                return Completion::Failed;
            }
        };

        if let Some(previous) = self.active.take() {
            previous.stop();
        }

        let now = self.output.current_time();
        match self.output.start_source(buffer, now, self.ended_tx.clone()) {
            Ok(handle) => {
                let id = handle.id();
                tracing::debug!(
                    generation = request.generation,
                    source_id = %id,
                    duration = handle.duration(),
                    "narration started"
                );
                self.active = Some(handle);
                Completion::Started(id)
            }
            Err(e) => {
                tracing::error!(generation = request.generation, "narration playback failed: {e}");
                self.speaking.set(false);
                Completion::Failed
            }
        }
    }

    /// Halt the current source. Safe to call at any time.
    pub fn stop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.stop();
        }
        self.speaking.set(false);
    }

    /// Stop and also drop any synthesis still in flight.
    pub fn cancel(&mut self) {
        self.stop();
        self.generation += 1;
    }

    pub fn on_source_ended(&mut self, end: SourceEnd) {
        if self.active_source() == Some(end.id) {
            self.active = None;
            self.speaking.set(false);
            tracing::debug!(source_id = %end.id, reason = ?end.reason, "narration ended");
        }
    }
}
