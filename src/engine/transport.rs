//! Loop preview transport
//!
//! Plays the head and tail tracks as one phase-locked, endlessly looping
//! pair against an output host's clock. Position is always recomputed from
//! the host clock and the recorded start reference, never integrated, so it
//! stays exact over long sessions.
//!
//! There is no pause: `stop` discards the position, and seeking is a stop
//! followed by a play at the new offset.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::host::OutputHost;
use crate::engine::voice::{TrackId, VoicePair, VoiceTap};
use crate::engine::AudioBuffer;
use crate::error::{LoopError, Result};

/// Fraction of a frame treated as rounding noise when aligning offsets
const FRAME_EPSILON: f64 = 1e-6;

/// Transport states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Idle,
    Playing,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Idle => write!(f, "Idle"),
            TransportState::Playing => write!(f, "Playing"),
        }
    }
}

/// Wrap `offset` into `[0, loop_duration)`
///
/// Negative offsets count back from the loop end. Returns 0 for a
/// non-positive loop duration or a non-finite offset.
pub fn normalize_offset(offset: f64, loop_duration: f64) -> f64 {
    if loop_duration <= 0.0 || !offset.is_finite() {
        return 0.0;
    }
    let wrapped = offset.rem_euclid(loop_duration);
    // rem_euclid can round up to exactly loop_duration for tiny negatives
    if wrapped >= loop_duration {
        0.0
    } else {
        wrapped
    }
}

/// State of one play-to-stop run
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    /// Identifier used in logs
    pub id: Uuid,
    /// Host clock time corresponding to loop position 0 of the first pass
    pub start_clock_time: f64,
    /// Wrap period: the head track's duration
    pub loop_duration_secs: f64,
    /// Loop position the session entered at, after normalization
    pub offset_secs: f64,
    track1: Arc<AudioBuffer>,
    track2: Arc<AudioBuffer>,
    taps: [Arc<VoiceTap>; 2],
}

impl PlaybackSession {
    /// Current output gain of a track (0 when muted, 1 otherwise)
    pub fn track_gain(&self, track: TrackId) -> f32 {
        self.taps[track.index()].gain()
    }

    pub fn is_muted(&self, track: TrackId) -> bool {
        self.track_gain(track) == 0.0
    }

    /// Buffers being played
    pub fn tracks(&self) -> (&Arc<AudioBuffer>, &Arc<AudioBuffer>) {
        (&self.track1, &self.track2)
    }
}

/// Sample-accurate loop preview scheduler
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use loopmaker::engine::{AudioBuffer, LoopPlaybackScheduler, OfflineHost};
///
/// let track = Arc::new(AudioBuffer::silent(1, 3000, 1000));
/// let mut scheduler = LoopPlaybackScheduler::new(OfflineHost::new(1000, 1));
/// scheduler
///     .play(Some(Arc::clone(&track)), Some(track), 5.0)
///     .unwrap();
/// // a 3 second loop entered at 5 seconds starts at 2 seconds
/// assert!((scheduler.current_position().unwrap() - 2.0).abs() < 1e-9);
/// ```
pub struct LoopPlaybackScheduler<H: OutputHost> {
    host: H,
    session: Option<PlaybackSession>,
}

impl<H: OutputHost> LoopPlaybackScheduler<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            session: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access, e.g. to drive an offline render
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn state(&self) -> TransportState {
        if self.session.is_some() {
            TransportState::Playing
        } else {
            TransportState::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// The running session, if playing
    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Start looping both tracks from `offset_secs`
    ///
    /// The loop period is `track1`'s duration; the offset is wrapped into it.
    ///
    /// # Errors
    /// * `PlaybackState` if already playing, a track is missing, or track 1
    ///   is empty. Nothing changes; retry after `stop`.
    /// * `HostOutput` if the host refuses to schedule. The scheduler stays
    ///   idle.
    pub fn play(
        &mut self,
        track1: Option<Arc<AudioBuffer>>,
        track2: Option<Arc<AudioBuffer>>,
        offset_secs: f64,
    ) -> Result<()> {
        if self.session.is_some() {
            return Err(LoopError::PlaybackState {
                reason: "already playing".to_string(),
            });
        }
        let (track1, track2) = match (track1, track2) {
            (Some(t1), Some(t2)) => (t1, t2),
            _ => {
                return Err(LoopError::PlaybackState {
                    reason: "both track buffers are required".to_string(),
                })
            }
        };
        if track1.is_empty() {
            return Err(LoopError::PlaybackState {
                reason: "track 1 has no frames to loop".to_string(),
            });
        }

        let loop_duration = track1.duration_secs();
        let offset = normalize_offset(offset_secs, loop_duration);
        let loop_frames = track1.len();
        let rate = track1.sample_rate() as f64;
        // tolerance absorbs float error in offsets that are already whole frames
        let offset_frames =
            ((offset * rate + FRAME_EPSILON).floor() as usize).min(loop_frames - 1);
        let offset = offset_frames as f64 / rate;

        let pair = VoicePair::new(
            Arc::clone(&track1),
            Arc::clone(&track2),
            loop_frames,
            offset_frames,
            [1.0, 1.0],
        );
        let taps = [pair.tap(TrackId::Track1), pair.tap(TrackId::Track2)];

        let scheduled_time = match self.host.start(pair) {
            Ok(time) => time,
            Err(e) => {
                warn!("Loop preview failed to start: {}", e);
                self.host.stop();
                return Err(e);
            }
        };

        let session = PlaybackSession {
            id: Uuid::new_v4(),
            start_clock_time: scheduled_time - offset,
            loop_duration_secs: loop_duration,
            offset_secs: offset,
            track1,
            track2,
            taps,
        };
        info!(
            "[TRANSPORT] Play session {} at {:.3}s of {:.3}s loop",
            session.id, offset, loop_duration
        );
        self.session = Some(session);
        Ok(())
    }

    /// Convenience wrapper taking the synthesized pair by reference
    pub fn play_tracks(&mut self, tracks: &crate::dsp::LoopTracks, offset_secs: f64) -> Result<()> {
        self.play(
            Some(Arc::new(tracks.track1.clone())),
            Some(Arc::new(tracks.track2.clone())),
            offset_secs,
        )
    }

    /// Stop both tracks together and return to idle; safe when idle
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            self.host.stop();
            debug!("[TRANSPORT] Stopped session {}", session.id);
        }
    }

    /// Loop-relative playback position in seconds, `None` when idle
    ///
    /// Before the scheduled start has been reached the position counts back
    /// from the loop end.
    pub fn current_position(&self) -> Option<f64> {
        let session = self.session.as_ref()?;
        let elapsed = self.host.now() - session.start_clock_time;
        Some(normalize_offset(elapsed, session.loop_duration_secs))
    }

    /// Mute or unmute one track without interrupting playback
    ///
    /// No effect while idle.
    pub fn set_track_mute(&mut self, track: TrackId, muted: bool) {
        let Some(session) = &self.session else {
            debug!("[TRANSPORT] Ignoring mute of {} while idle", track);
            return;
        };
        session.taps[track.index()].set_gain(if muted { 0.0 } else { 1.0 });
        debug!(
            "[TRANSPORT] {} {} in session {}",
            track,
            if muted { "muted" } else { "unmuted" },
            session.id
        );
    }

    /// Recent loudness of one track in [0, 1]; 0 when idle
    pub fn level(&self, track: TrackId) -> f32 {
        self.session
            .as_ref()
            .map(|session| session.taps[track.index()].level())
            .unwrap_or(0.0)
    }

    /// Restart the running session's buffers at `target_secs`
    ///
    /// Mute states carry over to the new session.
    ///
    /// # Errors
    /// `PlaybackState` when idle, or whatever the restart reports.
    pub fn seek(&mut self, target_secs: f64) -> Result<()> {
        let Some(session) = &self.session else {
            return Err(LoopError::PlaybackState {
                reason: "cannot seek while idle".to_string(),
            });
        };
        let (track1, track2) = (Arc::clone(&session.track1), Arc::clone(&session.track2));
        let muted = TrackId::BOTH.map(|track| session.is_muted(track));

        self.stop();
        self.play(Some(track1), Some(track2), target_secs)?;
        for (track, muted) in TrackId::BOTH.into_iter().zip(muted) {
            if muted {
                self.set_track_mute(track, true);
            }
        }
        Ok(())
    }
}

impl<H: OutputHost> Drop for LoopPlaybackScheduler<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<H: OutputHost> fmt::Debug for LoopPlaybackScheduler<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopPlaybackScheduler")
            .field("state", &self.state())
            .field("session", &self.session.as_ref().map(|s| s.id))
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
