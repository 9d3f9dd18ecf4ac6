//! Audio file I/O
//!
//! Import accepts any WAV `hound` can read (integer 8 to 32 bit, 32-bit
//! float) and keeps the file's native sample rate and channel count. Export
//! always writes the canonical 16-bit container from [`crate::engine::wav`].

use std::fs;
use std::path::Path;

use hound::WavReader;
use tracing::{debug, info};

use crate::engine::buffer::AudioBuffer;
use crate::engine::wav;
use crate::error::{LoopError, Result};

/// Import a WAV file as a float buffer
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a readable WAV file
/// * `UnsupportedFormat` - If the sample format cannot be decoded
/// * `EmptyAudio` - If the file holds no frames
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(LoopError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| LoopError::InvalidAudio {
        reason: format!("Failed to open WAV file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let buffer = wav::read_into_buffer(reader)?;
    if buffer.is_empty() {
        return Err(LoopError::EmptyAudio);
    }

    info!(
        "Imported {} ({} ch, {} Hz, {:.3}s)",
        path.display(),
        buffer.num_channels(),
        buffer.sample_rate(),
        buffer.duration_secs()
    );
    Ok(buffer)
}

/// Write `buffer` to `path` as 16-bit PCM WAV, returning the bytes written
///
/// The returned bytes are exactly the file contents, so callers can hash
/// them without reading the file back.
pub fn export_wav(buffer: &AudioBuffer, path: &Path) -> Result<Vec<u8>> {
    let bytes = wav::encode(buffer)?;
    fs::write(path, &bytes)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(bytes)
}

/// Generate a mono sine tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_frames = (duration_secs.max(0.0) * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let samples = (0..num_frames)
        .map(|i| (angular_freq * i as f32).sin())
        .collect();

    AudioBuffer::from_channels(vec![samples], sample_rate)
        .unwrap_or_else(|_| AudioBuffer::silent(1, num_frames, sample_rate))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::tempdir;

    #[test]
    fn test_generate_test_tone() {
        let tone = generate_test_tone(440.0, 1.0, 48000);
        assert_eq!(tone.num_channels(), 1);
        assert_eq!(tone.len(), 48000);
        assert_eq!(tone.channel(0)[0], 0.0);
        assert!(tone.channel(0).iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_export_then_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = generate_test_tone(220.0, 0.25, 22050);

        let bytes = export_wav(&tone, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), bytes);

        let back = import_audio(&path).unwrap();
        assert_eq!(back.sample_rate(), 22050);
        assert_eq!(back.len(), tone.len());
        for (a, b) in tone.channel(0).iter().zip(back.channel(0)) {
            assert!((a - b).abs() <= 1.0 / 32767.0);
        }
    }

    #[test]
    fn test_import_keeps_native_rate_and_24_bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hires.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 96000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(8_388_607_i32).unwrap();
            writer.write_sample(-8_388_608_i32).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = import_audio(&path).unwrap();
        assert_eq!(buffer.sample_rate(), 96000);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.channel(0)[0], 1.0);
        assert_eq!(buffer.channel(1)[0], -1.0);
    }

    #[test]
    fn test_import_float_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25_f32).unwrap();
        writer.write_sample(-0.75_f32).unwrap();
        writer.finalize().unwrap();

        let buffer = import_audio(&path).unwrap();
        assert_eq!(buffer.channel(0), &[0.25, -0.75]);
    }

    #[test]
    fn test_import_empty_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        export_wav(&AudioBuffer::silent(1, 0, 44100), &path).unwrap();
        assert!(matches!(import_audio(&path), Err(LoopError::EmptyAudio)));
    }

    #[test]
    fn test_import_nonexistent_file() {
        let result = import_audio(Path::new("/nonexistent/loop.wav"));
        assert!(matches!(result, Err(LoopError::FileNotFound { .. })));
    }

    #[test]
    fn test_import_non_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.wav");
        fs::write(&path, b"definitely not riff").unwrap();
        assert!(matches!(import_audio(&path), Err(LoopError::InvalidAudio { .. })));
    }
}
