//! Head and tail track synthesis
//!
//! Both tracks keep part of the source and fade the rest:
//! - the head track (track 1) drops the last `overlap%` of the source and
//!   fades in over its first `overlap%`-long window;
//! - the tail track (track 2) plays that dropped end of the source fading
//!   out, then stays silent until it matches the head's length.
//!
//! Summing the two reconstructs a crossfade across the loop wrap point.

use serde::{Deserialize, Serialize};

use crate::dsp::fade::{FadeDirection, FadeSettings};
use crate::dsp::mixer;
use crate::engine::AudioBuffer;
use crate::error::{LoopError, Result};

/// Largest accepted overlap, in percent of the source duration
pub const MAX_OVERLAP_PERCENT: f64 = 50.0;

/// Share of the source duration used as the crossfade window, in percent
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlapRatio(f64);

impl OverlapRatio {
    /// No crossfade: the loop is a plain repeat of the head
    pub const NONE: OverlapRatio = OverlapRatio(0.0);

    /// Create a ratio, rejecting values outside [0, 50]
    pub fn new(percent: f64) -> Result<Self> {
        if !percent.is_finite() || !(0.0..=MAX_OVERLAP_PERCENT).contains(&percent) {
            return Err(LoopError::InvalidParameter {
                name: "overlap_ratio".to_string(),
                reason: format!("{} is outside [0, {}]", percent, MAX_OVERLAP_PERCENT),
            });
        }
        Ok(Self(percent))
    }

    /// Create a ratio, clamping into [0, 50] (NaN becomes 0)
    pub fn clamped(percent: f64) -> Self {
        if percent.is_nan() {
            return Self::NONE;
        }
        Self(percent.clamp(0.0, MAX_OVERLAP_PERCENT))
    }

    #[inline]
    pub fn percent(&self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    /// Length of the crossfade window for a source of `duration` seconds
    #[inline]
    pub fn cut_duration(&self, duration: f64) -> f64 {
        duration * (self.0 / 100.0)
    }

    /// Fraction of the head track covered by its fade-in: `r / (100 - r)`
    pub fn fade_width_ratio(&self) -> f64 {
        if self.0 <= 0.0 {
            return 0.0;
        }
        (self.0 / (100.0 - self.0)).clamp(0.0, 1.0)
    }
}

/// Build the head track (track 1)
///
/// Keeps the first `duration - cut` seconds of `buffer` and fades in over
/// the first `cut` seconds. Returns the input unchanged when the overlap is
/// zero or leaves nothing to keep.
pub fn synthesize_head(
    buffer: &AudioBuffer,
    overlap: OverlapRatio,
    fade: &FadeSettings,
) -> AudioBuffer {
    if overlap.is_zero() {
        return buffer.clone();
    }

    let duration = buffer.duration_secs();
    let cut_duration = overlap.cut_duration(duration);
    let keep_end = duration - cut_duration;
    if keep_end <= 0.0 {
        tracing::debug!(
            duration,
            overlap = overlap.percent(),
            "overlap leaves no audio to keep, head track falls back to source"
        );
        return buffer.clone();
    }

    let rate = buffer.sample_rate() as f64;
    let frames = ((keep_end * rate).floor() as usize).min(buffer.len());
    let fade_frames = (cut_duration * rate).floor() as usize;

    let gains: Vec<f32> = (0..fade_frames.min(frames))
        .map(|i| fade.gain(FadeDirection::In, i as f64 / fade_frames as f64) as f32)
        .collect();

    tracing::debug!(frames, fade_frames, curve = %fade.curve, "synthesized head track");

    buffer.map_channels(frames, |_, input| {
        input[..frames]
            .iter()
            .enumerate()
            .map(|(i, &sample)| match gains.get(i) {
                Some(&gain) => sample * gain,
                None => sample,
            })
            .collect()
    })
}

/// Build the tail track (track 2)
///
/// Always returns exactly `target_frames` frames, normally the head track's
/// frame count. The first `cut` seconds carry the source's last `cut`
/// seconds fading out; everything after is silence. A zero overlap yields
/// pure silence.
pub fn synthesize_tail(
    buffer: &AudioBuffer,
    overlap: OverlapRatio,
    target_frames: usize,
    fade: &FadeSettings,
) -> AudioBuffer {
    if overlap.is_zero() {
        return buffer.silent_like(target_frames);
    }

    let duration = buffer.duration_secs();
    let cut_duration = overlap.cut_duration(duration);
    if cut_duration <= 0.0 {
        return buffer.silent_like(target_frames);
    }

    let rate = buffer.sample_rate() as f64;
    let tail_start = ((duration - cut_duration) * rate).floor() as usize;

    let gains: Vec<f32> = (0..target_frames)
        .map(|i| i as f64 / rate)
        .take_while(|&time| time < cut_duration)
        .map(|time| fade.gain(FadeDirection::Out, time / cut_duration) as f32)
        .collect();

    tracing::debug!(
        target_frames,
        tail_start,
        fade_frames = gains.len(),
        curve = %fade.curve,
        "synthesized tail track"
    );

    buffer.map_channels(target_frames, |_, input| {
        gains
            .iter()
            .enumerate()
            .map(|(i, &gain)| match input.get(tail_start + i) {
                Some(&sample) => sample * gain,
                None => 0.0,
            })
            .collect()
    })
}

/// The pair of synthesized tracks for one parameter set
///
/// Both tracks always have the same frame count.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopTracks {
    pub track1: AudioBuffer,
    pub track2: AudioBuffer,
}

impl LoopTracks {
    /// Synthesize both tracks from an already range-extracted buffer
    pub fn synthesize(
        buffer: &AudioBuffer,
        overlap: OverlapRatio,
        fade_in: &FadeSettings,
        fade_out: &FadeSettings,
    ) -> Self {
        let track1 = synthesize_head(buffer, overlap, fade_in);
        let track2 = synthesize_tail(buffer, overlap, track1.len(), fade_out);
        Self { track1, track2 }
    }

    /// Frame count shared by both tracks
    pub fn frames(&self) -> usize {
        self.track1.len()
    }

    /// Wrap period of the loop: the head track's duration
    pub fn loop_duration_secs(&self) -> f64 {
        self.track1.duration_secs()
    }

    /// Sample-wise sum of both tracks
    pub fn mixdown(&self) -> Result<AudioBuffer> {
        mixer::mix(&self.track1, &self.track2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::fade::FadeCurve;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn constant(value: f32, frames: usize, rate: u32) -> AudioBuffer {
        AudioBuffer::from_channels(vec![vec![value; frames]], rate).unwrap()
    }

    fn ramp(frames: usize, rate: u32) -> AudioBuffer {
        let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
        AudioBuffer::from_channels(vec![samples], rate).unwrap()
    }

    #[test]
    fn test_overlap_ratio_bounds() {
        assert!(OverlapRatio::new(0.0).is_ok());
        assert!(OverlapRatio::new(50.0).is_ok());
        assert!(OverlapRatio::new(50.5).is_err());
        assert!(OverlapRatio::new(-1.0).is_err());
        assert!(OverlapRatio::new(f64::NAN).is_err());
        assert_eq!(OverlapRatio::clamped(80.0).percent(), 50.0);
        assert_eq!(OverlapRatio::clamped(f64::NAN), OverlapRatio::NONE);
    }

    #[test]
    fn test_fade_width_ratio() {
        assert_eq!(OverlapRatio::NONE.fade_width_ratio(), 0.0);
        assert_relative_eq!(OverlapRatio::clamped(25.0).fade_width_ratio(), 1.0 / 3.0);
        assert_relative_eq!(OverlapRatio::clamped(50.0).fade_width_ratio(), 1.0);
    }

    #[test]
    fn test_zero_overlap_head_is_identity() {
        let source = ramp(1000, 1000);
        let head = synthesize_head(&source, OverlapRatio::NONE, &FadeSettings::default());
        assert_eq!(head, source);
    }

    #[test]
    fn test_zero_overlap_tail_is_silence() {
        let source = ramp(1000, 1000);
        let tail = synthesize_tail(&source, OverlapRatio::NONE, 1000, &FadeSettings::default());
        assert_eq!(tail.len(), 1000);
        assert!(tail.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_head_four_second_scenario() {
        let source = constant(1.0, 4 * 44100, 44100);
        let head = synthesize_head(
            &source,
            OverlapRatio::clamped(25.0),
            &FadeSettings::new(FadeCurve::Linear),
        );
        assert_eq!(head.len(), 132_300);
        assert_relative_eq!(head.duration_secs(), 3.0);
        assert_eq!(head.channel(0)[0], 0.0);
        assert_relative_eq!(head.channel(0)[22050], 0.5, epsilon = 1e-6);
        // past the fade window the source passes through untouched
        assert_eq!(head.channel(0)[44100], 1.0);
        assert_eq!(head.channel(0)[132_299], 1.0);
    }

    #[test]
    fn test_tail_four_second_scenario() {
        let rate = 44100;
        let source = ramp(4 * rate as usize, rate);
        let fade = FadeSettings::new(FadeCurve::Linear);
        let tail = synthesize_tail(&source, OverlapRatio::clamped(25.0), 132_300, &fade);

        assert_eq!(tail.len(), 132_300);
        // frame 0 is the start of the source's last second at full level
        assert_eq!(tail.channel(0)[0], source.channel(0)[132_300]);
        let expected = source.channel(0)[132_300 + 22050] * 0.5;
        assert_relative_eq!(tail.channel(0)[22050], expected, epsilon = 1e-6);
        assert!(tail.channel(0)[44099] > 0.0);
        assert!(tail.channel(0)[44100..].iter().all(|&s| s == 0.0));
    }

    #[test_case(5.0 ; "five percent")]
    #[test_case(12.5 ; "twelve and a half percent")]
    #[test_case(33.3 ; "a third")]
    #[test_case(50.0 ; "maximum")]
    fn test_tracks_have_equal_length(percent: f64) {
        let source = ramp(48_013, 48000);
        let tracks = LoopTracks::synthesize(
            &source,
            OverlapRatio::clamped(percent),
            &FadeSettings::default(),
            &FadeSettings::new(FadeCurve::Exponential),
        );
        assert_eq!(tracks.track1.len(), tracks.track2.len());
        assert_eq!(tracks.frames(), tracks.track1.len());
    }

    #[test]
    fn test_linear_crossfade_sums_to_unity() {
        // a DC source makes the equal-gain property visible in the mixdown
        let source = constant(0.5, 8000, 1000);
        let fade = FadeSettings::new(FadeCurve::Linear);
        let tracks = LoopTracks::synthesize(&source, OverlapRatio::clamped(25.0), &fade, &fade);
        let mixed = tracks.mixdown().unwrap();
        assert_eq!(mixed.len(), 6000);
        for &sample in mixed.channel(0) {
            assert_relative_eq!(sample, 0.5, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_tail_with_custom_curve_complements_head_curve() {
        let source = constant(1.0, 1000, 100);
        let fade = FadeSettings::custom(0.3, 0.8);
        let overlap = OverlapRatio::clamped(20.0);
        let head = synthesize_head(&source, overlap, &fade);
        let tail = synthesize_tail(&source, overlap, head.len(), &fade);
        for i in 0..200 {
            let sum = head.channel(0)[i] + tail.channel(0)[i];
            assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_stereo_channels_processed_independently() {
        let source = AudioBuffer::from_channels(vec![vec![1.0; 100], vec![-1.0; 100]], 100).unwrap();
        let fade = FadeSettings::new(FadeCurve::Linear);
        let head = synthesize_head(&source, OverlapRatio::clamped(10.0), &fade);
        assert_eq!(head.num_channels(), 2);
        assert_eq!(head.len(), 90);
        assert_relative_eq!(head.channel(0)[5], 0.5, epsilon = 1e-6);
        assert_relative_eq!(head.channel(1)[5], -0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_source_degenerates() {
        let source = AudioBuffer::silent(1, 0, 44100);
        let tracks = LoopTracks::synthesize(
            &source,
            OverlapRatio::clamped(30.0),
            &FadeSettings::default(),
            &FadeSettings::default(),
        );
        assert!(tracks.track1.is_empty());
        assert!(tracks.track2.is_empty());
    }
}
