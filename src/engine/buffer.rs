//! Audio Buffer Management
//!
//! Provides the immutable audio buffer type shared by synthesis, export and
//! playback. Buffers keep the native sample rate of the source recording.

use crate::error::{LoopError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// # Returns
/// Value in decibels. Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Calculate the RMS level of an audio buffer in dB
///
/// Returns -f32::INFINITY for empty or silent buffers.
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let total_samples = buffer.num_channels() * buffer.len();
    if total_samples == 0 {
        return f32::NEG_INFINITY;
    }

    let sum_squares: f64 = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    let rms = (sum_squares / total_samples as f64).sqrt() as f32;
    linear_to_db(rms)
}

/// Calculate the peak level of an audio buffer in dB
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    let peak = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max);

    linear_to_db(peak)
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Multi-channel float audio, one `Vec<f32>` per channel
///
/// All channels share one sample rate and one frame count. Buffers are never
/// patched in place by the processing code: every step builds a new one.
///
/// # Example
/// ```
/// use loopmaker::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::silent(2, 44100, 44100);
/// assert_eq!(buffer.num_channels(), 2);
/// assert_eq!(buffer.len(), 44100);
/// assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer with the given shape
    pub fn silent(num_channels: usize, num_frames: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_frames]; num_channels],
            sample_rate,
        }
    }

    /// Create a silent buffer with the same channel count and rate as `self`
    pub fn silent_like(&self, num_frames: usize) -> Self {
        Self::silent(self.num_channels(), num_frames, self.sample_rate)
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// Fails with `InvalidAudio` if the channels differ in length or there
    /// are no channels at all.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(LoopError::InvalidAudio {
                reason: "Buffer must have at least one channel".to_string(),
                source: None,
            });
        }
        if sample_rate == 0 {
            return Err(LoopError::InvalidAudio {
                reason: "Sample rate must be positive".to_string(),
                source: None,
            });
        }

        let frames = samples[0].len();
        if let Some((index, channel)) = samples
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != frames)
        {
            return Err(LoopError::InvalidAudio {
                reason: format!(
                    "Channel {} has {} frames, expected {}",
                    index,
                    channel.len(),
                    frames
                ),
                source: None,
            });
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an audio buffer from interleaved sample data
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(LoopError::InvalidAudio {
                reason: "Channel count must be positive".to_string(),
                source: None,
            });
        }

        if interleaved.len() % num_channels != 0 {
            return Err(LoopError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_frames = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_frames); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::from_channels(samples, sample_rate)
    }

    /// Get the number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of frames per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Iterate over all channels
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.iter().map(|ch| ch.as_slice())
    }

    /// Get a sample at the specified channel and frame
    #[inline]
    pub fn get_sample(&self, channel: usize, frame: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(frame).copied())
    }

    /// Build a new buffer by mapping every channel through `f`
    ///
    /// `f` receives the channel index and the source samples and must return
    /// `frames` samples; the result keeps this buffer's sample rate.
    pub(crate) fn map_channels<F>(&self, frames: usize, mut f: F) -> Self
    where
        F: FnMut(usize, &[f32]) -> Vec<f32>,
    {
        let samples = self
            .samples
            .iter()
            .enumerate()
            .map(|(index, channel)| {
                let mut out = f(index, channel);
                out.resize(frames, 0.0);
                out
            })
            .collect();

        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
