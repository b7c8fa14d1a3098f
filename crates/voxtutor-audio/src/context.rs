use crate::renderer::{Renderer, Voice};
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use voxtutor_core::{AudioError, AudioSampleBuffer};

// ── Source identity ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The whole buffer was played.
    Finished,
    /// `stop()` was requested before the buffer ran out.
    Stopped,
}

/// Sent once per source when it leaves the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceEnd {
    pub id: SourceId,
    pub reason: EndReason,
}

// ── SourceHandle ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct SourceControls {
    stop_requested: AtomicBool,
    ended: AtomicBool,
}

impl SourceControls {
    pub(crate) fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub(crate) fn mark_ended(&self) {
        self.ended.store(true, Ordering::Release);
    }
}

/// Control side of one scheduled buffer.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    id: SourceId,
    start_time: f64,
    duration: f64,
    controls: Arc<SourceControls>,
}

impl SourceHandle {
    pub(crate) fn new(id: SourceId, start_time: f64, duration: f64) -> Self {
        Self {
            id,
            start_time,
            duration,
            controls: Arc::new(SourceControls::default()),
        }
    }

    pub(crate) fn controls(&self) -> Arc<SourceControls> {
        Arc::clone(&self.controls)
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Request an immediate halt. Safe to call repeatedly or after the source ended.
    pub fn stop(&self) {
        self.controls.stop_requested.store(true, Ordering::Release);
    }

    pub fn has_ended(&self) -> bool {
        self.controls.ended.load(Ordering::Acquire)
    }
}

// ── OutputContext ─────────────────────────────────────────────

/// The process-wide audio output and its master clock.
///
/// Created once and shared; recreating it would reset the clock that
/// scheduled start times are measured against.
pub trait OutputContext: Send + Sync {
    fn sample_rate(&self) -> u32;

    /// Seconds of audio rendered since the context was created.
    fn current_time(&self) -> f64;

    /// Schedule `buffer` to start at `start_at` seconds on the master clock.
    /// Times in the past start immediately. A [`SourceEnd`] is sent on `ended`
    /// when the source finishes or is stopped.
    fn start_source(
        &self,
        buffer: AudioSampleBuffer,
        start_at: f64,
        ended: mpsc::UnboundedSender<SourceEnd>,
    ) -> Result<SourceHandle, AudioError>;
}

/// Control side of the output context; the render side is a [`Renderer`].
pub struct SharedOutput {
    sample_rate: u32,
    clock: Arc<AtomicU64>,
    queue: Mutex<HeapProd<Voice>>,
    next_id: AtomicU64,
}

/// Create the output context pair. The renderer goes to the audio callback.
pub fn output_context(sample_rate: u32, voice_capacity: usize) -> (SharedOutput, Renderer) {
    let (prod, cons) = HeapRb::<Voice>::new(voice_capacity.max(1)).split();
    let clock = Arc::new(AtomicU64::new(0));
    let shared = SharedOutput {
        sample_rate,
        clock: Arc::clone(&clock),
        queue: Mutex::new(prod),
        next_id: AtomicU64::new(1),
    };
    (shared, Renderer::new(cons, clock, voice_capacity))
}

impl SharedOutput {
    /// Frames rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }
}

impl OutputContext for SharedOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.frames_rendered() as f64 / self.sample_rate as f64
    }

    fn start_source(
        &self,
        buffer: AudioSampleBuffer,
        start_at: f64,
        ended: mpsc::UnboundedSender<SourceEnd>,
    ) -> Result<SourceHandle, AudioError> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(AudioError::SampleRateMismatch {
                buffer: buffer.sample_rate(),
                output: self.sample_rate,
            });
        }

        let start_at = start_at.max(self.current_time());
        let start_frame = (start_at * self.sample_rate as f64).round() as u64;
        let id = SourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = SourceHandle::new(id, start_at, buffer.duration());

        let voice = Voice::new(id, buffer, start_frame, handle.controls(), ended);
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| AudioError::StreamError("voice queue poisoned".to_string()))?;
        queue.try_push(voice).map_err(|_| AudioError::QueueFull)?;

        tracing::trace!(source_id = %id, start_at, duration = handle.duration(), "source queued");
        Ok(handle)
    }
}
