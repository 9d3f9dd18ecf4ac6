//! Looping voices for the two preview tracks
//!
//! A [`VoicePair`] is the unit an output host plays: both tracks share one
//! start frame and one loop length, so they can never drift apart. Read
//! positions are derived from the absolute output frame on every sample,
//! never accumulated, so a skipped render block does not shift the phase.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::engine::meter::{LevelMeter, METER_BLOCK_FRAMES};
use crate::engine::AudioBuffer;

/// One of the two preview tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackId {
    /// Head track, fades in at the loop start
    Track1,
    /// Tail track, fades out and then stays silent
    Track2,
}

impl TrackId {
    pub const BOTH: [TrackId; 2] = [TrackId::Track1, TrackId::Track2];

    /// Map a 1-based track number
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(TrackId::Track1),
            2 => Some(TrackId::Track2),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            TrackId::Track1 => 1,
            TrackId::Track2 => 2,
        }
    }

    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.number() as usize - 1
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track {}", self.number())
    }
}

/// Gain and metering tap of one voice, shared between the render side and
/// the control side
#[derive(Debug)]
pub struct VoiceTap {
    gain_bits: AtomicU32,
    meter: LevelMeter,
}

impl VoiceTap {
    pub fn new(gain: f32) -> Self {
        Self {
            gain_bits: AtomicU32::new(gain.to_bits()),
            meter: LevelMeter::default(),
        }
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain_bits.store(gain.to_bits(), Ordering::Relaxed);
    }

    /// Smoothed post-gain level in [0, 1]
    pub fn level(&self) -> f32 {
        self.meter.level()
    }
}

struct LoopVoice {
    buffer: Arc<AudioBuffer>,
    tap: Arc<VoiceTap>,
}

impl LoopVoice {
    /// Add this voice into `out` and meter what was added
    fn render_block(
        &self,
        out: &mut [f32],
        channels: usize,
        first_frame: u64,
        loop_position: impl Fn(u64) -> Option<usize>,
    ) {
        let frames = out.len() / channels;
        if frames == 0 {
            return;
        }
        let gain = self.tap.gain();
        let source_channels = self.buffer.num_channels();
        let mut sum_squares = 0.0_f64;

        for (f, frame) in out.chunks_exact_mut(channels).enumerate() {
            let Some(index) = loop_position(first_frame + f as u64) else {
                continue;
            };
            for (ch, slot) in frame.iter_mut().enumerate() {
                // extra output channels repeat the last source channel
                let source = ch.min(source_channels.saturating_sub(1));
                let sample = self.buffer.get_sample(source, index).unwrap_or(0.0) * gain;
                *slot += sample;
                sum_squares += (sample as f64) * (sample as f64);
            }
        }

        let rms = (sum_squares / (frames * channels) as f64).sqrt() as f32;
        self.tap.meter.push(rms);
    }
}

/// Two phase-locked looping voices
pub struct VoicePair {
    voices: [LoopVoice; 2],
    sample_rate: u32,
    loop_frames: usize,
    offset_frames: usize,
    start_frame: u64,
}

impl VoicePair {
    /// Build a pair looping over the first `loop_frames` frames, entering
    /// the loop at `offset_frames`
    ///
    /// `loop_frames` must be positive; `offset_frames` is wrapped into it.
    pub fn new(
        track1: Arc<AudioBuffer>,
        track2: Arc<AudioBuffer>,
        loop_frames: usize,
        offset_frames: usize,
        gains: [f32; 2],
    ) -> Self {
        let loop_frames = loop_frames.max(1);
        let sample_rate = track1.sample_rate();
        Self {
            voices: [
                LoopVoice {
                    buffer: track1,
                    tap: Arc::new(VoiceTap::new(gains[0])),
                },
                LoopVoice {
                    buffer: track2,
                    tap: Arc::new(VoiceTap::new(gains[1])),
                },
            ],
            sample_rate,
            loop_frames,
            offset_frames: offset_frames % loop_frames,
            start_frame: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn loop_frames(&self) -> usize {
        self.loop_frames
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// Set the absolute output frame at which both voices begin
    pub fn schedule_at(&mut self, start_frame: u64) {
        self.start_frame = start_frame;
    }

    /// Shared tap of one voice
    pub fn tap(&self, track: TrackId) -> Arc<VoiceTap> {
        Arc::clone(&self.voices[track.index()].tap)
    }

    /// Buffer frame played at an absolute output frame, `None` before start
    #[inline]
    pub fn loop_position(&self, absolute_frame: u64) -> Option<usize> {
        let elapsed = absolute_frame.checked_sub(self.start_frame)?;
        let wrapped = (elapsed % self.loop_frames as u64) as usize;
        Some((wrapped + self.offset_frames) % self.loop_frames)
    }

    /// Mix both voices into interleaved `out`, whose first frame is the
    /// absolute output frame `first_frame`
    ///
    /// Metering happens per [`METER_BLOCK_FRAMES`] block so levels do not
    /// depend on the caller's buffer size.
    pub fn render(&self, out: &mut [f32], channels: usize, first_frame: u64) {
        if channels == 0 {
            return;
        }
        let block_len = METER_BLOCK_FRAMES * channels;
        for (b, block) in out.chunks_mut(block_len).enumerate() {
            let block_first = first_frame + (b * METER_BLOCK_FRAMES) as u64;
            for voice in &self.voices {
                voice.render_block(block, channels, block_first, |frame| {
                    self.loop_position(frame)
                });
            }
        }
    }
}

impl fmt::Debug for VoicePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoicePair")
            .field("sample_rate", &self.sample_rate)
            .field("loop_frames", &self.loop_frames)
            .field("offset_frames", &self.offset_frames)
            .field("start_frame", &self.start_frame)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(frames: usize) -> Arc<AudioBuffer> {
        let samples = (0..frames).map(|i| i as f32 / 100.0).collect();
        Arc::new(AudioBuffer::from_channels(vec![samples], 1000).unwrap())
    }

    #[test]
    fn test_track_numbers() {
        assert_eq!(TrackId::from_number(1), Some(TrackId::Track1));
        assert_eq!(TrackId::from_number(2), Some(TrackId::Track2));
        assert_eq!(TrackId::from_number(3), None);
        assert_eq!(TrackId::Track2.index(), 1);
        assert_eq!(TrackId::Track1.to_string(), "track 1");
    }

    #[test]
    fn test_loop_position_wraps_with_offset() {
        let mut pair = VoicePair::new(indexed(10), indexed(10), 10, 7, [1.0, 1.0]);
        pair.schedule_at(100);
        assert_eq!(pair.loop_position(99), None);
        assert_eq!(pair.loop_position(100), Some(7));
        assert_eq!(pair.loop_position(102), Some(9));
        assert_eq!(pair.loop_position(103), Some(0));
        assert_eq!(pair.loop_position(110), Some(7));
    }

    #[test]
    fn test_offset_is_wrapped() {
        let pair = VoicePair::new(indexed(4), indexed(4), 4, 9, [1.0, 1.0]);
        assert_eq!(pair.loop_position(0), Some(1));
    }

    #[test]
    fn test_render_sums_both_voices() {
        let pair = VoicePair::new(indexed(4), indexed(4), 4, 0, [1.0, 0.5]);
        let mut out = vec![0.0_f32; 6];
        pair.render(&mut out, 1, 0);
        let expected = [0.0, 0.015, 0.03, 0.045, 0.0, 0.015];
        for (a, b) in out.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_render_duplicates_mono_to_stereo() {
        let pair = VoicePair::new(indexed(4), indexed(4), 4, 1, [1.0, 0.0]);
        let mut out = vec![0.0_f32; 4];
        pair.render(&mut out, 2, 0);
        assert_eq!(out, vec![0.01, 0.01, 0.02, 0.02]);
    }

    #[test]
    fn test_silence_before_start() {
        let mut pair = VoicePair::new(indexed(4), indexed(4), 4, 0, [1.0, 1.0]);
        pair.schedule_at(3);
        let mut out = vec![0.0_f32; 5];
        pair.render(&mut out, 1, 0);
        assert_eq!(&out[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(out[3], 0.0); // frame 0 of the ramp is zero
        assert!((out[4] - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_muted_voice_meters_zero() {
        let pair = VoicePair::new(indexed(512), indexed(512), 512, 0, [0.0, 1.0]);
        let mut out = vec![0.0_f32; 512 * 8];
        pair.render(&mut out, 1, 0);
        assert_eq!(pair.tap(TrackId::Track1).level(), 0.0);
        assert!(pair.tap(TrackId::Track2).level() > 0.0);
    }
}
