//! Audio payload codec: WAV framing and base64 transport encoding.
//!
//! Recorded fragments travel as PCM16 WAV wrapped in standard base64 inside
//! JSON text frames. Response audio arrives the same way and is unwrapped
//! back to f32 samples for playback.

use crate::error::{ClientError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::io::Cursor;

/// Encode raw bytes for the wire (standard alphabet, padded).
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 payload from the wire.
///
/// # Errors
///
/// Returns an error if the payload is not valid base64.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(payload)
        .map_err(|e| ClientError::Codec(format!("invalid base64 payload: {e}")))
}

/// Wrap f32 samples in a PCM16 WAV container.
///
/// Samples are clamped to [-1.0, 1.0] before quantization.
///
/// # Errors
///
/// Returns an error if the WAV writer fails.
pub fn wrap_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| ClientError::Codec(format!("wav writer: {e}")))?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| ClientError::Codec(format!("wav write: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| ClientError::Codec(format!("wav finalize: {e}")))?;
    }
    Ok(cursor.into_inner())
}

/// Decoded audio ready for playback.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Unwrap a WAV container into f32 samples.
///
/// Handles both PCM16 and float WAV data.
///
/// # Errors
///
/// Returns an error if the bytes are not a readable WAV stream.
pub fn unwrap_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| ClientError::Codec(format!("wav reader: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| ClientError::Codec(format!("wav samples: {e}")))?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ClientError::Codec(format!("wav samples: {e}")))?,
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Convenience: wrap samples as WAV and base64-encode for the wire.
///
/// # Errors
///
/// Returns an error if WAV framing fails.
pub fn encode_audio_payload(samples: &[f32], sample_rate: u32, channels: u16) -> Result<String> {
    let wav = wrap_wav(samples, sample_rate, channels)?;
    Ok(encode_base64(&wav))
}

/// Convenience: base64-decode and unwrap a response audio payload.
///
/// # Errors
///
/// Returns an error if the payload is not valid base64 or not valid WAV.
pub fn decode_audio_payload(payload: &str) -> Result<DecodedAudio> {
    let bytes = decode_base64(payload)?;
    unwrap_wav(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_roundtrip() {
        let bytes = [0u8, 1, 127, 128, 255];
        let encoded = encode_base64(&bytes);
        assert_eq!(decode_base64(&encoded).unwrap(), bytes);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_base64("not base64 !!!").is_err());
    }

    #[test]
    fn wav_roundtrip_preserves_shape() {
        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 / 1600.0).sin() * 0.5).collect();
        let wav = wrap_wav(&samples, 16_000, 1).unwrap();
        let decoded = unwrap_wav(&wav).unwrap();

        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), samples.len());
        // PCM16 quantization noise stays well under one LSB of headroom.
        for (a, b) in samples.iter().zip(&decoded.samples) {
            assert!((a - b).abs() < 1.0 / 16_000.0, "{a} vs {b}");
        }
    }

    #[test]
    fn wav_clamps_out_of_range_samples() {
        let wav = wrap_wav(&[2.0, -2.0], 16_000, 1).unwrap();
        let decoded = unwrap_wav(&wav).unwrap();
        assert!(decoded.samples[0] > 0.99);
        assert!(decoded.samples[1] < -0.99);
    }

    #[test]
    fn audio_payload_roundtrip() {
        let samples = vec![0.0f32, 0.25, -0.25, 0.5];
        let payload = encode_audio_payload(&samples, 16_000, 1).unwrap();
        let decoded = decode_audio_payload(&payload).unwrap();
        assert_eq!(decoded.samples.len(), samples.len());
    }

    #[test]
    fn decode_payload_rejects_non_wav() {
        let payload = encode_base64(b"just some text");
        assert!(decode_audio_payload(&payload).is_err());
    }
}
