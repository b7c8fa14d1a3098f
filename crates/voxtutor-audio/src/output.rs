use crate::renderer::Renderer;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig, SupportedBufferSize};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use voxtutor_core::{AudioError, DeviceStatus};

const STATUS_OK: u8 = 0;
const STATUS_ERROR: u8 = 1;
const MAX_SCRATCH_FRAMES: u32 = 16384;

// ── OutputHandle ──────────────────────────────────────────────

#[derive(Clone)]
pub struct OutputHandle {
    playing: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
}

impl OutputHandle {
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Pausing freezes the master clock along with every scheduled source.
    pub fn set_playing(&self, v: bool) {
        self.playing.store(v, Ordering::Relaxed);
    }

    pub fn status(&self) -> DeviceStatus {
        match self.status.load(Ordering::Relaxed) {
            STATUS_ERROR => DeviceStatus::Error,
            _ => DeviceStatus::Ok,
        }
    }
}

// ── OutputNode ────────────────────────────────────────────────

/// Speaker stream driving a [`Renderer`]. Dropping it stops playback.
pub struct OutputNode {
    _stream: Stream,
}

impl OutputNode {
    pub fn new(
        device: &Device,
        mut renderer: Renderer,
        sample_rate: u32,
        channels: u16,
        buffer_size: u32,
    ) -> Result<(Self, OutputHandle), AudioError> {
        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(buffer_size),
        };

        let playing = Arc::new(AtomicBool::new(true));
        let playing_flag = Arc::clone(&playing);
        let status = Arc::new(AtomicU8::new(STATUS_OK));
        let status_flag = Arc::clone(&status);

        let err_callback = move |err: cpal::StreamError| {
            tracing::error!("output stream error: {}", err);
            status_flag.store(STATUS_ERROR, Ordering::Relaxed);
        };

        let channels = channels.max(1) as usize;
        let mut mono = vec![0.0f32; scratch_frames(device, buffer_size)];

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !playing_flag.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    render_interleaved(&mut renderer, &mut mono, data, channels);
                },
                err_callback,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        tracing::info!(sample_rate, channels, "output stream started");
        let handle = OutputHandle { playing, status };
        Ok((Self { _stream: stream }, handle))
    }
}

/// Largest callback the device may ask for, so the scratch buffer is sized once.
fn scratch_frames(device: &Device, buffer_size: u32) -> usize {
    let reported = match device.default_output_config().map(|c| *c.buffer_size()) {
        Ok(SupportedBufferSize::Range { max, .. }) => max.min(MAX_SCRATCH_FRAMES),
        _ => 0,
    };
    buffer_size.max(reported).max(1) as usize
}

/// Fill an interleaved device buffer, rendering at most `mono.len()` frames at a time.
fn render_interleaved(renderer: &mut Renderer, mono: &mut [f32], data: &mut [f32], channels: usize) {
    let step = mono.len().max(1) * channels;
    for chunk in data.chunks_mut(step) {
        let frames = chunk.len() / channels;
        renderer.render(&mut mono[..frames]);
        fan_out(&mono[..frames], chunk, channels);
    }
}

/// Copy mono frames into every channel of an interleaved buffer.
fn fan_out(mono: &[f32], interleaved: &mut [f32], channels: usize) {
    for (frame, &sample) in interleaved.chunks_exact_mut(channels).zip(mono) {
        frame.fill(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_output_handle() -> OutputHandle {
        OutputHandle {
            playing: Arc::new(AtomicBool::new(true)),
            status: Arc::new(AtomicU8::new(STATUS_OK)),
        }
    }

    #[test]
    fn test_output_handle_default_playing() {
        assert!(make_output_handle().is_playing());
    }

    #[test]
    fn test_output_handle_clone_shares_state() {
        let h1 = make_output_handle();
        let h2 = h1.clone();
        h1.set_playing(false);
        assert!(!h2.is_playing());
    }

    #[test]
    fn test_output_handle_status() {
        let handle = make_output_handle();
        assert_eq!(handle.status(), DeviceStatus::Ok);
        handle.status.store(STATUS_ERROR, Ordering::Relaxed);
        assert_eq!(handle.status(), DeviceStatus::Error);
    }

    #[test]
    fn test_fan_out_stereo() {
        let mut data = vec![0.0f32; 6];
        fan_out(&[0.1, 0.2, 0.3], &mut data, 2);
        assert_eq!(data, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_render_interleaved_larger_than_scratch() {
        let (output, mut renderer) = crate::output_context(1000, 8);
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let samples: Vec<f32> = (0..10).map(|i| i as f32 * 0.1).collect();
        crate::OutputContext::start_source(
            &output,
            voxtutor_core::AudioSampleBuffer::new(samples.clone(), 1000),
            0.0,
            tx,
        )
        .unwrap();

        // 10 stereo frames through a 4-frame scratch buffer
        let mut mono = vec![0.0f32; 4];
        let mut data = vec![0.0f32; 20];
        render_interleaved(&mut renderer, &mut mono, &mut data, 2);

        assert_eq!(mono.len(), 4);
        assert_eq!(output.frames_rendered(), 10);
        for (frame, expected) in data.chunks_exact(2).zip(&samples) {
            assert_eq!(frame, &[*expected, *expected]);
        }
    }

    #[test]
    fn test_fan_out_mono_is_copy() {
        let mut data = vec![0.0f32; 3];
        fan_out(&[0.5, -0.5, 0.25], &mut data, 1);
        assert_eq!(data, vec![0.5, -0.5, 0.25]);
    }
}
