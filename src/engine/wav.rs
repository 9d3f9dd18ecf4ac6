//! Canonical 16-bit PCM WAV container
//!
//! `encode` is the one binary artifact the engine produces, so it writes the
//! 44-byte header by hand: identical buffers always give identical bytes,
//! whatever the channel count. Decoding goes through `hound`.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use crate::engine::AudioBuffer;
use crate::error::{LoopError, Result};

/// Size of the RIFF/WAVE header written by [`encode`]
pub const HEADER_LEN: usize = 44;

/// Output bit depth
pub const BITS_PER_SAMPLE: u16 = 16;

const BYTES_PER_SAMPLE: u32 = (BITS_PER_SAMPLE / 8) as u32;
const FORMAT_PCM: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Convert one float sample to 16-bit PCM
///
/// Clamped to [-1, 1]; negatives scale by 32768, the rest by 32767, then
/// truncate toward zero.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Size in bytes of the `data` chunk for `frames` frames of `channels`
///
/// Fails when the chunk cannot be described by the 32-bit RIFF size fields.
pub fn data_chunk_len(frames: usize, channels: usize) -> Result<u32> {
    (frames as u64)
        .checked_mul(channels as u64 * BYTES_PER_SAMPLE as u64)
        .filter(|&len| len <= (u32::MAX - 36) as u64)
        .map(|len| len as u32)
        .ok_or_else(|| LoopError::InvalidParameter {
            name: "frames".to_string(),
            reason: format!(
                "{} frames of {} channels exceed the 4 GiB WAV limit",
                frames, channels
            ),
        })
}

/// Encode a buffer as a 16-bit PCM WAV byte stream
///
/// Layout: `RIFF` header, 16-byte `fmt ` chunk (format 1), `data` chunk with
/// frame-interleaved little-endian samples.
pub fn encode(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let channels = buffer.num_channels() as u32;
    let sample_rate = buffer.sample_rate();
    let block_align = channels * BYTES_PER_SAMPLE;
    let byte_rate = sample_rate * block_align;
    let data_len = data_chunk_len(buffer.len(), buffer.num_channels())?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    bytes.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    bytes.extend_from_slice(&(channels as u16).to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&(block_align as u16).to_le_bytes());
    bytes.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());

    for frame in 0..buffer.len() {
        for channel in buffer.channels() {
            bytes.extend_from_slice(&sample_to_i16(channel[frame]).to_le_bytes());
        }
    }

    Ok(bytes)
}

/// Decode WAV bytes into a float buffer
///
/// Accepts integer PCM (8 to 32 bit) and 32-bit float.
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| LoopError::InvalidAudio {
        reason: format!("Failed to parse WAV data: {}", e),
        source: Some(Box::new(e)),
    })?;
    read_into_buffer(reader)
}

/// Drain a hound reader into an [`AudioBuffer`]
pub(crate) fn read_into_buffer<R: std::io::Read>(reader: WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_error)?,
        (SampleFormat::Int, bits @ 8..=32) => {
            // mirror of the encoder: negatives span one more step than positives
            let negative_scale = (1_i64 << (bits - 1)) as f64;
            let positive_scale = negative_scale - 1.0;
            reader
                .into_samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        let scale = if v < 0 { negative_scale } else { positive_scale };
                        (v as f64 / scale) as f32
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_error)?
        }
        (format, bits) => {
            return Err(LoopError::UnsupportedFormat {
                format: format!("{:?} {}-bit", format, bits),
            })
        }
    };

    AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)
}

fn decode_error(e: hound::Error) -> LoopError {
    LoopError::InvalidAudio {
        reason: format!("Failed to decode samples: {}", e),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_sample_conversion() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(1.0), 32767);
        assert_eq!(sample_to_i16(-1.0), -32768);
        assert_eq!(sample_to_i16(2.5), 32767);
        assert_eq!(sample_to_i16(-3.0), -32768);
        assert_eq!(sample_to_i16(0.5), 16383);
        assert_eq!(sample_to_i16(-0.5), -16384);
        assert_eq!(sample_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_header_layout() {
        let buffer = AudioBuffer::silent(2, 10, 44100);
        let bytes = encode(&buffer).unwrap();

        assert_eq!(bytes.len(), HEADER_LEN + 10 * 2 * 2);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(read_u32(&bytes, 4), 36 + 40);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(read_u32(&bytes, 16), 16);
        assert_eq!(read_u16(&bytes, 20), 1);
        assert_eq!(read_u16(&bytes, 22), 2);
        assert_eq!(read_u32(&bytes, 24), 44100);
        assert_eq!(read_u32(&bytes, 28), 44100 * 4);
        assert_eq!(read_u16(&bytes, 32), 4);
        assert_eq!(read_u16(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(read_u32(&bytes, 40), 40);
    }

    #[test]
    fn test_samples_interleaved_per_frame() {
        let buffer =
            AudioBuffer::from_channels(vec![vec![1.0, 0.0], vec![-1.0, 0.5]], 8000).unwrap();
        let bytes = encode(&buffer).unwrap();
        let data: Vec<i16> = bytes[HEADER_LEN..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(data, vec![32767, -32768, 0, 16383]);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let samples: Vec<f32> = (0..500).map(|i| ((i as f32) * 0.37).sin()).collect();
        let buffer = AudioBuffer::from_channels(vec![samples], 22050).unwrap();
        assert_eq!(encode(&buffer).unwrap(), encode(&buffer.clone()).unwrap());
    }

    #[test]
    fn test_roundtrip_within_quantization() {
        let left: Vec<f32> = (0..1000).map(|i| ((i as f32) * 0.01).sin() * 0.9).collect();
        let right: Vec<f32> = left.iter().map(|s| -s * 0.5).collect();
        let buffer = AudioBuffer::from_channels(vec![left, right], 48000).unwrap();

        let decoded = decode(&encode(&buffer).unwrap()).unwrap();
        assert_eq!(decoded.num_channels(), 2);
        assert_eq!(decoded.len(), 1000);
        assert_eq!(decoded.sample_rate(), 48000);
        for (orig, back) in buffer.channels().zip(decoded.channels()) {
            for (a, b) in orig.iter().zip(back) {
                // positives truncate against 32767, one step coarser than negatives
                assert!((a - b).abs() <= 1.0 / 32767.0, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_data_chunk_len_limit() {
        assert_eq!(data_chunk_len(10, 2).unwrap(), 40);
        assert_eq!(data_chunk_len(0, 1).unwrap(), 0);
        let max_frames = (u32::MAX as usize - 36) / 4;
        assert!(data_chunk_len(max_frames, 2).is_ok());
        assert!(matches!(
            data_chunk_len(max_frames + 1, 2),
            Err(LoopError::InvalidParameter { .. })
        ));
        assert!(data_chunk_len(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"not a wav file at all"),
            Err(LoopError::InvalidAudio { .. })
        ));
    }
}
