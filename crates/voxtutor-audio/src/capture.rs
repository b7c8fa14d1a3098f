use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use voxtutor_core::{AudioError, AudioSampleBuffer, DeviceStatus};

// ── BlockAccumulator ──────────────────────────────────────────

/// Regroups arbitrary callback slices into fixed-size mono blocks.
pub struct BlockAccumulator {
    block_size: usize,
    sample_rate: u32,
    pending: Vec<f32>,
}

impl BlockAccumulator {
    pub fn new(block_size: usize, sample_rate: u32) -> Self {
        let block_size = block_size.max(1);
        Self {
            block_size,
            sample_rate,
            pending: Vec::with_capacity(block_size),
        }
    }

    /// Append samples, calling `emit` once per completed block.
    pub fn push(&mut self, mut samples: &[f32], mut emit: impl FnMut(AudioSampleBuffer)) {
        while !samples.is_empty() {
            let room = self.block_size - self.pending.len();
            let take = room.min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.pending.len() == self.block_size {
                let block = std::mem::replace(&mut self.pending, Vec::with_capacity(self.block_size));
                emit(AudioSampleBuffer::new(block, self.sample_rate));
            }
        }
    }

    /// Samples waiting for the current block to fill.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drop the partial block.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

// ── CaptureHandle ─────────────────────────────────────────────

#[derive(Clone)]
pub struct CaptureHandle {
    enabled: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
}

impl CaptureHandle {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, v: bool) {
        self.enabled.store(v, Ordering::Relaxed);
        self.set_status(if v {
            DeviceStatus::Ok
        } else {
            DeviceStatus::Disabled
        });
    }

    pub fn status(&self) -> DeviceStatus {
        match self.status.load(Ordering::Relaxed) {
            1 => DeviceStatus::Error,
            2 => DeviceStatus::Disabled,
            _ => DeviceStatus::Ok,
        }
    }

    pub fn set_status(&self, s: DeviceStatus) {
        let v = match s {
            DeviceStatus::Ok => 0,
            DeviceStatus::Error => 1,
            DeviceStatus::Disabled => 2,
        };
        self.status.store(v, Ordering::Relaxed);
    }
}

// ── CaptureNode ───────────────────────────────────────────────

/// Microphone stream producing fixed-size mono blocks. Dropping it releases the device.
pub struct CaptureNode {
    _stream: Stream,
}

impl CaptureNode {
    pub fn new(
        device: &Device,
        sample_rate: u32,
        channels: u16,
        buffer_size: u32,
        block_size: usize,
        blocks: mpsc::UnboundedSender<AudioSampleBuffer>,
    ) -> Result<(Self, CaptureHandle), AudioError> {
        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(buffer_size),
        };

        let enabled = Arc::new(AtomicBool::new(true));
        let enabled_flag = Arc::clone(&enabled);
        let status = Arc::new(AtomicU8::new(0));
        let status_flag = Arc::clone(&status);

        let err_callback = move |err: cpal::StreamError| {
            tracing::error!("capture stream error: {}", err);
            status_flag.store(1, Ordering::Relaxed); // Error
        };

        let channels = channels.max(1) as usize;
        let mut accumulator = BlockAccumulator::new(block_size, sample_rate);
        let mut mono = Vec::with_capacity(buffer_size as usize);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !enabled_flag.load(Ordering::Relaxed) {
                        accumulator.reset();
                        return;
                    }
                    downmix(data, channels, &mut mono);
                    accumulator.push(&mono, |block| {
                        // Receiver gone means the session ended
                        let _ = blocks.send(block);
                    });
                },
                err_callback,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        tracing::info!(sample_rate, block_size, "capture stream started");
        let handle = CaptureHandle { enabled, status };
        Ok((Self { _stream: stream }, handle))
    }
}

/// Average interleaved frames down to mono.
fn downmix(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_capture_handle() -> CaptureHandle {
        CaptureHandle {
            enabled: Arc::new(AtomicBool::new(true)),
            status: Arc::new(AtomicU8::new(0)),
        }
    }

    fn collect(acc: &mut BlockAccumulator, samples: &[f32]) -> Vec<AudioSampleBuffer> {
        let mut out = Vec::new();
        acc.push(samples, |b| out.push(b));
        out
    }

    #[test]
    fn test_capture_handle_default_enabled() {
        let handle = make_capture_handle();
        assert!(handle.is_enabled());
        assert_eq!(handle.status(), DeviceStatus::Ok);
    }

    #[test]
    fn test_capture_handle_disable_sets_status() {
        let handle = make_capture_handle();
        handle.set_enabled(false);
        assert!(!handle.is_enabled());
        assert_eq!(handle.status(), DeviceStatus::Disabled);
        handle.set_enabled(true);
        assert_eq!(handle.status(), DeviceStatus::Ok);
    }

    #[test]
    fn test_capture_handle_clone_shares_state() {
        let h1 = make_capture_handle();
        let h2 = h1.clone();
        h1.set_status(DeviceStatus::Error);
        assert_eq!(h2.status(), DeviceStatus::Error);
    }

    #[test]
    fn test_accumulator_emits_exact_blocks() {
        let mut acc = BlockAccumulator::new(4, 16000);
        assert!(collect(&mut acc, &[0.1, 0.2, 0.3]).is_empty());
        assert_eq!(acc.pending(), 3);

        let blocks = collect(&mut acc, &[0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].samples(), &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(blocks[1].samples(), &[0.5, 0.6, 0.7, 0.8]);
        assert_eq!(blocks[1].sample_rate(), 16000);
        assert_eq!(acc.pending(), 1);
    }

    #[test]
    fn test_accumulator_reset_drops_partial() {
        let mut acc = BlockAccumulator::new(4, 16000);
        collect(&mut acc, &[1.0, 1.0]);
        acc.reset();
        let blocks = collect(&mut acc, &[0.0; 4]);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_accumulator_large_input() {
        let mut acc = BlockAccumulator::new(4096, 16000);
        let blocks = collect(&mut acc, &vec![0.25; 4096 * 3 + 10]);
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.len() == 4096));
        assert_eq!(acc.pending(), 10);
    }

    #[test]
    fn test_downmix_stereo_average() {
        let mut out = Vec::new();
        downmix(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2, &mut out);
        assert_eq!(out, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let mut out = vec![9.0];
        downmix(&[0.1, 0.2], 1, &mut out);
        assert_eq!(out, vec![0.1, 0.2]);
    }
}
