pub mod capture;
pub mod codec;
pub mod context;
pub mod device;
pub mod output;
pub mod renderer;

pub use capture::{BlockAccumulator, CaptureHandle, CaptureNode};
pub use codec::{
    decode, decode_pcm16, encode, encode_buffer, encode_clamped, pcm_mime_type,
    CAPTURE_BLOCK_SIZE, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE,
};
pub use context::{
    output_context, EndReason, OutputContext, SharedOutput, SourceEnd, SourceHandle, SourceId,
};
pub use device::DeviceManager;
pub use output::{OutputHandle, OutputNode};
pub use renderer::Renderer;
