use crate::context::{EndReason, SourceControls, SourceEnd, SourceId};
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use voxtutor_core::AudioSampleBuffer;

// ── Voice ──────────────────────────────────────────────────────

/// A buffer scheduled at an absolute frame of the master clock.
pub(crate) struct Voice {
    id: SourceId,
    buffer: AudioSampleBuffer,
    start_frame: u64,
    controls: Arc<SourceControls>,
    ended: mpsc::UnboundedSender<SourceEnd>,
}

impl Voice {
    pub(crate) fn new(
        id: SourceId,
        buffer: AudioSampleBuffer,
        start_frame: u64,
        controls: Arc<SourceControls>,
        ended: mpsc::UnboundedSender<SourceEnd>,
    ) -> Self {
        Self {
            id,
            buffer,
            start_frame,
            controls,
            ended,
        }
    }

    fn end_frame(&self) -> u64 {
        self.start_frame + self.buffer.len() as u64
    }

    fn finish(self, reason: EndReason) {
        self.controls.mark_ended();
        // Receiver may be gone if its scheduler shut down
        let _ = self.ended.send(SourceEnd {
            id: self.id,
            reason,
        });
    }
}

// ── Renderer ──────────────────────────────────────────────────

/// Render side of the output context. Lives on the audio callback thread.
pub struct Renderer {
    incoming: HeapCons<Voice>,
    voices: Vec<Voice>,
    clock: Arc<AtomicU64>,
}

impl Renderer {
    pub(crate) fn new(incoming: HeapCons<Voice>, clock: Arc<AtomicU64>, voice_capacity: usize) -> Self {
        Self {
            incoming,
            voices: Vec::with_capacity(voice_capacity.max(1)),
            clock,
        }
    }

    /// Render one block of mono frames and advance the master clock.
    /// Returns the number of voices still scheduled after this block.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        let block_start = self.clock.load(Ordering::Acquire);
        let block_end = block_start + out.len() as u64;

        // Never grow the voice list on the audio thread; extra voices wait in the queue
        while self.voices.len() < self.voices.capacity() {
            let Some(mut voice) = self.incoming.try_pop() else {
                break;
            };
            if voice.start_frame < block_start {
                voice.start_frame = block_start;
            }
            self.voices.push(voice);
        }

        out.iter_mut().for_each(|s| *s = 0.0);

        let mut i = 0;
        while i < self.voices.len() {
            let voice = &self.voices[i];

            if voice.controls.is_stop_requested() {
                let voice = self.voices.swap_remove(i);
                tracing::trace!(source_id = %voice.id, "source stopped");
                voice.finish(EndReason::Stopped);
                continue;
            }

            let from = voice.start_frame.max(block_start);
            let to = voice.end_frame().min(block_end);
            if from < to {
                let samples = voice.buffer.samples();
                for frame in from..to {
                    out[(frame - block_start) as usize] +=
                        samples[(frame - voice.start_frame) as usize];
                }
            }

            if voice.end_frame() <= block_end {
                let voice = self.voices.swap_remove(i);
                voice.finish(EndReason::Finished);
                continue;
            }
            i += 1;
        }

        self.clock.store(block_end, Ordering::Release);
        self.voices.len()
    }

    /// Most voices mixed at once.
    pub fn voice_capacity(&self) -> usize {
        self.voices.capacity()
    }

    /// Voices picked up from the queue and not yet ended.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }
}
