//! Track mixdown
//!
//! Sums the head and tail tracks into the single loop buffer that gets
//! exported. No gain compensation and no clipping here; the PCM encoder
//! clamps on the way out.

use crate::engine::AudioBuffer;
use crate::error::{LoopError, Result};

/// Sample-wise sum of two tracks of identical shape
///
/// # Errors
/// `LengthMismatch` or `ChannelMismatch` when the tracks differ in shape.
/// Both mean the caller broke the equal-length contract upstream.
pub fn mix(track1: &AudioBuffer, track2: &AudioBuffer) -> Result<AudioBuffer> {
    if track1.len() != track2.len() {
        return Err(LoopError::LengthMismatch {
            left: track1.len(),
            right: track2.len(),
        });
    }
    if track1.num_channels() != track2.num_channels() {
        return Err(LoopError::ChannelMismatch {
            left: track1.num_channels(),
            right: track2.num_channels(),
        });
    }

    let mixed = track1
        .channels()
        .zip(track2.channels())
        .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x + y).collect())
        .collect();

    AudioBuffer::from_channels(mixed, track1.sample_rate())
}
