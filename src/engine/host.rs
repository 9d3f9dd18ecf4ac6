//! Output hosts
//!
//! An [`OutputHost`] owns the real-time clock and the output graph the
//! preview plays into. The scheduler only ever hands it a complete
//! [`VoicePair`], so one track can never be started without the other.

use crate::engine::voice::VoicePair;
use crate::engine::AudioBuffer;
use crate::error::{LoopError, Result};

/// Clock and output graph of an audio backend
pub trait OutputHost {
    /// Current output clock in seconds; must not block
    fn now(&self) -> f64;

    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Install `pair` and schedule both voices at one future output frame
    ///
    /// Returns the clock time (seconds) at which the pair's first frame is
    /// heard. Any previously installed pair is replaced.
    fn start(&mut self, pair: VoicePair) -> Result<f64>;

    /// Tear down the installed pair, if any
    fn stop(&mut self);
}

/// Host that renders on demand against a simulated sample clock
///
/// The clock only advances when [`OfflineHost::render`] or
/// [`OfflineHost::advance`] is called, which makes preview behavior
/// reproducible in tests and lets the CLI bounce a preview to disk.
#[derive(Debug)]
pub struct OfflineHost {
    sample_rate: u32,
    channels: usize,
    latency_frames: u64,
    rendered_frames: u64,
    connected: bool,
    pair: Option<VoicePair>,
}

impl OfflineHost {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            latency_frames: 0,
            rendered_frames: 0,
            connected: true,
            pair: None,
        }
    }

    /// A host whose output is unavailable: every start fails
    pub fn disconnected(sample_rate: u32, channels: usize) -> Self {
        Self {
            connected: false,
            ..Self::new(sample_rate, channels)
        }
    }

    /// Delay between a start request and the first audible frame
    pub fn with_latency(mut self, latency_secs: f64) -> Self {
        self.latency_frames = (latency_secs.max(0.0) * self.sample_rate as f64).round() as u64;
        self
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn rendered_frames(&self) -> u64 {
        self.rendered_frames
    }

    /// Whether a voice pair is installed
    pub fn is_active(&self) -> bool {
        self.pair.is_some()
    }

    /// Render the next `frames` output frames and advance the clock
    pub fn render(&mut self, frames: usize) -> AudioBuffer {
        let mut interleaved = vec![0.0_f32; frames * self.channels];
        if let Some(pair) = &self.pair {
            pair.render(&mut interleaved, self.channels, self.rendered_frames);
        }
        self.rendered_frames += frames as u64;

        AudioBuffer::from_interleaved(&interleaved, self.channels, self.sample_rate)
            .unwrap_or_else(|_| AudioBuffer::silent(self.channels, frames, self.sample_rate))
    }

    /// Render and discard `secs` seconds of output
    pub fn advance(&mut self, secs: f64) {
        let frames = (secs.max(0.0) * self.sample_rate as f64).round() as usize;
        self.render(frames);
    }
}

impl OutputHost for OfflineHost {
    fn now(&self) -> f64 {
        self.rendered_frames as f64 / self.sample_rate as f64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, mut pair: VoicePair) -> Result<f64> {
        if !self.connected {
            return Err(LoopError::HostOutput {
                reason: "offline output is disconnected".to_string(),
            });
        }
        if pair.sample_rate() != self.sample_rate {
            return Err(LoopError::HostOutput {
                reason: format!(
                    "output runs at {} Hz but tracks are {} Hz",
                    self.sample_rate,
                    pair.sample_rate()
                ),
            });
        }

        let start_frame = self.rendered_frames + self.latency_frames;
        pair.schedule_at(start_frame);
        self.pair = Some(pair);
        Ok(start_frame as f64 / self.sample_rate as f64)
    }

    fn stop(&mut self) {
        self.pair = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pair(rate: u32) -> VoicePair {
        let ones = Arc::new(AudioBuffer::from_channels(vec![vec![0.25; 100]], rate).unwrap());
        VoicePair::new(Arc::clone(&ones), ones, 100, 0, [1.0, 1.0])
    }

    #[test]
    fn test_clock_follows_rendered_frames() {
        let mut host = OfflineHost::new(1000, 2);
        assert_eq!(host.now(), 0.0);
        let out = host.render(250);
        assert_eq!(out.len(), 250);
        assert_eq!(out.num_channels(), 2);
        assert_eq!(host.now(), 0.25);
        host.advance(0.75);
        assert_eq!(host.now(), 1.0);
    }

    #[test]
    fn test_start_schedules_after_latency() {
        let mut host = OfflineHost::new(1000, 1).with_latency(0.01);
        host.advance(0.5);
        let start = host.start(pair(1000)).unwrap();
        assert!((start - 0.51).abs() < 1e-9);

        let out = host.render(20);
        assert!(out.channel(0)[..10].iter().all(|&s| s == 0.0));
        assert!(out.channel(0)[10..].iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_disconnected_rejects_start() {
        let mut host = OfflineHost::disconnected(1000, 1);
        assert!(matches!(host.start(pair(1000)), Err(LoopError::HostOutput { .. })));
        assert!(!host.is_active());
    }

    #[test]
    fn test_sample_rate_mismatch_rejected() {
        let mut host = OfflineHost::new(48000, 1);
        assert!(matches!(host.start(pair(44100)), Err(LoopError::HostOutput { .. })));
    }

    #[test]
    fn test_stop_silences_output() {
        let mut host = OfflineHost::new(1000, 1);
        host.start(pair(1000)).unwrap();
        host.stop();
        assert!(!host.is_active());
        assert!(host.render(10).channel(0).iter().all(|&s| s == 0.0));
    }
}
