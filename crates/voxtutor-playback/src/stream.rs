//! Gapless playback of a live audio stream. Chunks are laid end to end on the
//! output clock; an interruption drops everything that is queued.

use crate::speaking::SpeakingSignal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use voxtutor_audio::{decode, OutputContext, SourceEnd, SourceHandle, SourceId, PLAYBACK_SAMPLE_RATE};
use voxtutor_core::EncodedAudioChunk;

pub struct StreamScheduler {
    output: Arc<dyn OutputContext>,
    next_start_time: f64,
    active: HashMap<SourceId, SourceHandle>,
    speaking: SpeakingSignal,
    ended_tx: mpsc::UnboundedSender<SourceEnd>,
}

impl StreamScheduler {
    pub fn new(
        output: Arc<dyn OutputContext>,
        ended_tx: mpsc::UnboundedSender<SourceEnd>,
        speaking: SpeakingSignal,
    ) -> Self {
        Self {
            output,
            next_start_time: 0.0,
            active: HashMap::new(),
            speaking,
            ended_tx,
        }
    }

    /// Queue one downstream chunk right after the previous one, or now if
    /// the queue already drained.
    pub fn on_audio_chunk(&mut self, chunk: &EncodedAudioChunk) -> Option<SourceHandle> {
        let buffer = match decode(chunk, PLAYBACK_SAMPLE_RATE) {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::warn!("dropping undecodable live chunk: {e}");
                self.settle();
                return None;
            }
        };

        let start_at = self.next_start_time.max(self.output.current_time());
        match self.output.start_source(buffer, start_at, self.ended_tx.clone()) {
            Ok(handle) => {
                self.next_start_time = handle.end_time();
                tracing::trace!(
                    source_id = %handle.id(),
                    start_at = handle.start_time(),
                    next_start = self.next_start_time,
                    "live chunk scheduled"
                );
                self.active.insert(handle.id(), handle.clone());
                self.speaking.set(true);
                Some(handle)
            }
            Err(e) => {
                tracing::error!("live chunk playback failed: {e}");
                self.settle();
                None
            }
        }
    }

    /// Hard cut: stop all queued audio and restart the timeline.
    pub fn on_interrupted(&mut self) {
        let stopped = self.active.len();
        for (_, handle) in self.active.drain() {
            handle.stop();
        }
        self.next_start_time = 0.0;
        self.speaking.set(false);
        tracing::debug!(stopped, "live playback interrupted");
    }

    pub fn on_source_ended(&mut self, end: SourceEnd) {
        if self.active.remove(&end.id).is_some() {
            self.settle();
        }
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.get()
    }

    fn settle(&self) {
        if self.active.is_empty() {
            self.speaking.set(false);
        }
    }
}
