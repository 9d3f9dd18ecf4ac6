//! Usable range extraction
//!
//! Slices the portion of the source recording that takes part in loop
//! synthesis.

use serde::{Deserialize, Serialize};

use crate::engine::AudioBuffer;
use crate::error::{LoopError, Result};

/// Tolerance when converting seconds to frame positions, so that a time
/// like 0.1s at 44.1kHz lands on frame 4410 rather than 4411
const FRAME_EPSILON: f64 = 1e-6;

/// Time range of the source, in seconds: `[start_secs, end_secs)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsableRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl UsableRange {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    /// Range covering a whole buffer
    pub fn full(buffer: &AudioBuffer) -> Self {
        Self::new(0.0, buffer.duration_secs())
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }

    /// Clamp both ends into `[0, duration]`
    pub fn clamp_to(&self, duration: f64) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, duration) };
        Self::new(clamp(self.start_secs), clamp(self.end_secs))
    }

    /// Check `0 <= start < end <= duration`
    pub fn validate(&self, duration: f64) -> Result<()> {
        let ordered = self.start_secs.is_finite()
            && self.end_secs.is_finite()
            && self.start_secs >= 0.0
            && self.start_secs < self.end_secs
            && self.end_secs <= duration + FRAME_EPSILON;
        if ordered {
            Ok(())
        } else {
            Err(LoopError::InvalidRange {
                start_secs: self.start_secs,
                end_secs: self.end_secs,
            })
        }
    }
}

/// First frame whose time is at or after `secs`
fn frame_at_or_after(secs: f64, sample_rate: u32) -> usize {
    let position = secs * sample_rate as f64;
    if position <= 0.0 || position.is_nan() {
        return 0;
    }
    (position - FRAME_EPSILON).ceil() as usize
}

/// Extract the frames whose time falls in `[start_secs, end_secs)`
///
/// Returns a zero-length buffer with the source's channel count and sample
/// rate when `end_secs <= start_secs`.
pub fn extract(source: &AudioBuffer, start_secs: f64, end_secs: f64) -> AudioBuffer {
    if end_secs <= start_secs || end_secs.is_nan() || start_secs.is_nan() {
        return source.silent_like(0);
    }

    let rate = source.sample_rate();
    let len = source.len();
    let start = frame_at_or_after(start_secs, rate).min(len);
    let end = frame_at_or_after(end_secs, rate).min(len);
    let frames = end.saturating_sub(start);

    tracing::debug!(
        start_frame = start,
        end_frame = end,
        frames,
        "extracted usable range"
    );

    source.map_channels(frames, |_, channel| channel[start..start + frames].to_vec())
}

/// Extract a [`UsableRange`]
pub fn extract_range(source: &AudioBuffer, range: &UsableRange) -> AudioBuffer {
    extract(source, range.start_secs, range.end_secs)
}
