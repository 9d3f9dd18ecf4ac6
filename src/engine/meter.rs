//! Per-track level metering
//!
//! The render side pushes one RMS value per block; the UI side reads a
//! smoothed level at any time without locking.

use std::sync::atomic::{AtomicU32, Ordering};

/// Frames per metering block
pub const METER_BLOCK_FRAMES: usize = 256;

/// Default smoothing between consecutive blocks
pub const DEFAULT_SMOOTHING: f32 = 0.8;

/// Smoothed RMS level in [0, 1]
#[derive(Debug)]
pub struct LevelMeter {
    level_bits: AtomicU32,
    smoothing: f32,
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}

impl LevelMeter {
    /// `smoothing` is the weight of the previous level, clamped to [0, 1)
    pub fn new(smoothing: f32) -> Self {
        Self {
            level_bits: AtomicU32::new(0.0_f32.to_bits()),
            smoothing: smoothing.clamp(0.0, 0.999),
        }
    }

    /// Fold one block's RMS into the level
    pub fn push(&self, block_rms: f32) {
        let block_rms = if block_rms.is_finite() { block_rms } else { 0.0 };
        let next = self.smoothing * self.level() + (1.0 - self.smoothing) * block_rms;
        self.level_bits
            .store(next.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Current smoothed level
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.level_bits.store(0.0_f32.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(LevelMeter::default().level(), 0.0);
    }

    #[test]
    fn test_converges_to_block_rms() {
        let meter = LevelMeter::default();
        for _ in 0..200 {
            meter.push(0.5);
        }
        assert_relative_eq!(meter.level(), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_smoothing_step() {
        let meter = LevelMeter::new(0.8);
        meter.push(1.0);
        assert_relative_eq!(meter.level(), 0.2, epsilon = 1e-6);
        meter.push(0.0);
        assert_relative_eq!(meter.level(), 0.16, epsilon = 1e-6);
    }

    #[test]
    fn test_level_is_clamped() {
        let meter = LevelMeter::new(0.0);
        meter.push(3.0);
        assert_eq!(meter.level(), 1.0);
        meter.push(f32::NAN);
        assert_eq!(meter.level(), 0.0);
    }

    #[test]
    fn test_reset() {
        let meter = LevelMeter::new(0.0);
        meter.push(0.7);
        meter.reset();
        assert_eq!(meter.level(), 0.0);
    }
}
