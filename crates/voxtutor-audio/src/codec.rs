//! Conversion between normalized `f32` samples and the wire format: 16-bit
//! little-endian signed PCM, mono, carried as standard base64 text.
//!
//! No resampling happens here. Downstream audio is decoded at
//! [`PLAYBACK_SAMPLE_RATE`] and microphone blocks are encoded at
//! [`CAPTURE_SAMPLE_RATE`] by convention, not by negotiation.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use voxtutor_core::{AudioSampleBuffer, DecodeError, EncodedAudioChunk};

/// Rate of audio received from the remote model.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Rate of microphone audio sent to the remote model.
pub const CAPTURE_SAMPLE_RATE: u32 = 16000;

/// Samples per upstream send.
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

const PCM_SCALE: f32 = 32768.0;

/// MIME type announced for upstream PCM blobs.
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

/// Decode base64 PCM16LE into a mono buffer at `output_sample_rate`.
pub fn decode(
    encoded: &EncodedAudioChunk,
    output_sample_rate: u32,
) -> Result<AudioSampleBuffer, DecodeError> {
    let bytes = BASE64
        .decode(encoded.as_str())
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
    decode_pcm16(&bytes, output_sample_rate)
}

/// Decode raw PCM16LE bytes (already base64-decoded).
pub fn decode_pcm16(bytes: &[u8], output_sample_rate: u32) -> Result<AudioSampleBuffer, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddByteLength(bytes.len()));
    }
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_SCALE)
        .collect();
    Ok(AudioSampleBuffer::new(samples, output_sample_rate))
}

/// Encode samples as base64 PCM16LE.
///
/// Out-of-range samples are not clamped: they wrap like a two's-complement
/// store into an `i16` (so `1.0` becomes `-32768`). See [`encode_clamped`].
pub fn encode(samples: &[f32]) -> EncodedAudioChunk {
    encode_with(samples, wrap_to_i16)
}

/// Like [`encode`] but saturates to the `i16` range instead of wrapping.
pub fn encode_clamped(samples: &[f32]) -> EncodedAudioChunk {
    encode_with(samples, saturate_to_i16)
}

/// Encode a whole buffer; the sample rate is not carried on the wire.
pub fn encode_buffer(buffer: &AudioSampleBuffer) -> EncodedAudioChunk {
    encode(buffer.samples())
}

fn encode_with(samples: &[f32], convert: fn(f32) -> i16) -> EncodedAudioChunk {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&convert(s).to_le_bytes());
    }
    EncodedAudioChunk::new(BASE64.encode(bytes))
}

/// Truncate toward zero, then wrap modulo 2^16. Non-finite input maps to 0.
fn wrap_to_i16(sample: f32) -> i16 {
    let scaled = sample * PCM_SCALE;
    if !scaled.is_finite() {
        return 0;
    }
    (scaled.trunc() as i64) as i16
}

fn saturate_to_i16(sample: f32) -> i16 {
    let scaled = sample * PCM_SCALE;
    if scaled.is_nan() {
        return 0;
    }
    scaled.trunc().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_vector() {
        let encoded = encode(&[0.5, -0.5]);
        assert_eq!(encoded.as_str(), "AEAAwA==");
        let bytes = BASE64.decode(encoded.as_str()).unwrap();
        assert_eq!(bytes, vec![0x00, 0x40, 0x00, 0xC0]);
    }

    #[test]
    fn test_decode_known_vector_is_exact() {
        let buffer = decode(&EncodedAudioChunk::from("AEAAwA=="), PLAYBACK_SAMPLE_RATE).unwrap();
        assert_eq!(buffer.samples(), &[0.5, -0.5]);
        assert_eq!(buffer.sample_rate(), 24000);
    }

    #[test]
    fn test_decode_empty_payload() {
        let buffer = decode(&EncodedAudioChunk::from(""), PLAYBACK_SAMPLE_RATE).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration(), 0.0);
    }

    #[test]
    fn test_decode_odd_byte_length_fails() {
        // three bytes: 0x00 0x40 0x00
        let chunk = EncodedAudioChunk::from("AEAA");
        assert_eq!(
            decode(&chunk, PLAYBACK_SAMPLE_RATE),
            Err(DecodeError::OddByteLength(3))
        );
    }

    #[test]
    fn test_decode_invalid_base64_fails() {
        let chunk = EncodedAudioChunk::from("not base64!!");
        match decode(&chunk, PLAYBACK_SAMPLE_RATE) {
            Err(DecodeError::InvalidBase64(_)) => {}
            other => panic!("expected InvalidBase64, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_full_int16_range() {
        let bytes = [0x00, 0x80, 0xFF, 0x7F, 0x00, 0x00];
        let buffer = decode_pcm16(&bytes, 16000).unwrap();
        assert_eq!(buffer.samples()[0], -1.0);
        assert_eq!(buffer.samples()[1], 32767.0 / 32768.0);
        assert_eq!(buffer.samples()[2], 0.0);
    }

    #[test]
    fn test_round_trip_within_quantization_error() {
        let step = 1.0 / 32768.0;
        let samples: Vec<f32> = (0..2000)
            .map(|i| ((i as f32 * 0.037).sin() * (1.0 - step)).max(-1.0))
            .chain([-1.0, 0.0, 1.0 - step, step, -step])
            .collect();
        let decoded = decode(&encode(&samples), PLAYBACK_SAMPLE_RATE).unwrap();
        assert_eq!(decoded.len(), samples.len());
        for (orig, back) in samples.iter().zip(decoded.samples()) {
            assert!(
                (orig - back).abs() <= step,
                "sample {orig} came back as {back}"
            );
        }
    }

    #[test]
    fn test_encode_wraps_out_of_range() {
        // 1.0 * 32768 does not fit in i16 and wraps to i16::MIN
        let bytes = BASE64.decode(encode(&[1.0]).as_str()).unwrap();
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MIN);

        let bytes = BASE64.decode(encode(&[1.5]).as_str()).unwrap();
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), -16384);
    }

    #[test]
    fn test_encode_clamped_saturates() {
        let bytes = BASE64.decode(encode_clamped(&[1.0, -2.0, 0.5]).as_str()).unwrap();
        let values: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect();
        assert_eq!(values, vec![i16::MAX, i16::MIN, 16384]);
    }

    #[test]
    fn test_encode_truncates_toward_zero() {
        let tiny = 0.9 / 32768.0;
        let bytes = BASE64.decode(encode(&[tiny, -tiny]).as_str()).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_non_finite_is_silence() {
        let bytes = BASE64
            .decode(encode(&[f32::NAN, f32::INFINITY]).as_str())
            .unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_buffer_matches_slice() {
        let buffer = AudioSampleBuffer::new(vec![0.25, -0.25], CAPTURE_SAMPLE_RATE);
        assert_eq!(encode_buffer(&buffer), encode(&[0.25, -0.25]));
    }

    #[test]
    fn test_pcm_mime_type() {
        assert_eq!(pcm_mime_type(CAPTURE_SAMPLE_RATE), "audio/pcm;rate=16000");
    }
}
