//! Loop project
//!
//! Owns a source recording and the settings applied to it, and keeps the
//! synthesized track pair in step with those settings. Every setter
//! re-renders both tracks in full; there is no incremental update.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::LoopSettings;
use crate::dsp::{extract_range, FadeSettings, LoopTracks, OverlapRatio, UsableRange};
use crate::engine::{io, AudioBuffer, LoopPlaybackScheduler, OutputHost, TrackId};
use crate::error::{LoopError, Result};

/// A source buffer, its loop settings, and the current track pair
#[derive(Debug, Clone)]
pub struct LoopProject {
    source: AudioBuffer,
    source_name: Option<String>,
    settings: LoopSettings,
    tracks: LoopTracks,
}

impl LoopProject {
    /// Create a project and render its tracks
    ///
    /// # Errors
    /// * `EmptyAudio` - If the source has no frames
    /// * `InvalidParameter` / `InvalidRange` - If the settings do not validate
    pub fn new(source: AudioBuffer, settings: LoopSettings) -> Result<Self> {
        if source.is_empty() {
            return Err(LoopError::EmptyAudio);
        }
        settings.validate()?;

        let mut project = Self {
            tracks: LoopTracks {
                track1: source.silent_like(0),
                track2: source.silent_like(0),
            },
            source,
            source_name: None,
            settings,
        };
        if let Some(range) = project.settings.range {
            project.settings.range = Some(project.clamp_range(range)?);
        }
        project.render();
        Ok(project)
    }

    /// Import a WAV file and create a project from it
    pub fn open(path: &Path, settings: LoopSettings) -> Result<Self> {
        let source = io::import_audio(path)?;
        Ok(Self::new(source, settings)?.with_source_name(path.display().to_string()))
    }

    /// Record where the source came from, for export manifests
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn source(&self) -> &AudioBuffer {
        &self.source
    }

    /// Where the source was loaded from, if it came from a file
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// The current track pair
    pub fn tracks(&self) -> &LoopTracks {
        &self.tracks
    }

    /// Range in effect: the configured one, or the whole source
    pub fn range(&self) -> UsableRange {
        self.settings
            .range
            .unwrap_or_else(|| UsableRange::full(&self.source))
    }

    /// Re-run range extraction and both synthesizers
    pub fn render(&mut self) -> &LoopTracks {
        let extracted = extract_range(&self.source, &self.range());
        self.tracks = LoopTracks::synthesize(
            &extracted,
            self.settings.overlap(),
            &self.settings.fade_in,
            &self.settings.fade_out,
        );
        debug!(
            "Rendered loop: {} frames ({:.3}s) at {}% overlap",
            self.tracks.frames(),
            self.tracks.loop_duration_secs(),
            self.settings.overlap_ratio
        );
        &self.tracks
    }

    /// Both tracks summed into one buffer
    pub fn mixdown(&self) -> Result<AudioBuffer> {
        self.tracks.mixdown()
    }

    // ========================================================================
    // Parameter changes
    // ========================================================================

    /// Set the overlap percentage, clamped into [0, 50]
    pub fn set_overlap_ratio(&mut self, percent: f64) {
        self.settings.overlap_ratio = OverlapRatio::clamped(percent).percent();
        self.render();
    }

    /// Set the usable range, clamped to the source duration
    ///
    /// # Errors
    /// `InvalidRange` if nothing is left after clamping. The previous range
    /// stays in effect.
    pub fn set_range(&mut self, range: UsableRange) -> Result<()> {
        self.settings.range = Some(self.clamp_range(range)?);
        self.render();
        Ok(())
    }

    /// Loop the whole source again
    pub fn clear_range(&mut self) {
        self.settings.range = None;
        self.render();
    }

    pub fn set_fade_in(&mut self, fade: FadeSettings) -> Result<()> {
        fade.validate()?;
        self.settings.fade_in = fade;
        self.render();
        Ok(())
    }

    pub fn set_fade_out(&mut self, fade: FadeSettings) -> Result<()> {
        fade.validate()?;
        self.settings.fade_out = fade;
        self.render();
        Ok(())
    }

    fn clamp_range(&self, range: UsableRange) -> Result<UsableRange> {
        let duration = self.source.duration_secs();
        let clamped = range.clamp_to(duration);
        clamped.validate(duration).map_err(|_| LoopError::InvalidRange {
            start_secs: range.start_secs,
            end_secs: range.end_secs,
        })?;
        Ok(clamped)
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Start previewing the current tracks at `offset_secs`
    pub fn play<H: OutputHost>(
        &self,
        scheduler: &mut LoopPlaybackScheduler<H>,
        offset_secs: f64,
    ) -> Result<()> {
        scheduler.play_tracks(&self.tracks, offset_secs)
    }

    /// Swap freshly rendered tracks into a running preview
    ///
    /// Captures the position and mute flags, stops, and plays the current
    /// tracks from the captured position (clamped into the new loop) with
    /// the same tracks muted. Does nothing while the scheduler is idle.
    pub fn apply_to_scheduler<H: OutputHost>(
        &self,
        scheduler: &mut LoopPlaybackScheduler<H>,
    ) -> Result<()> {
        let (Some(position), Some(session)) = (scheduler.current_position(), scheduler.session())
        else {
            return Ok(());
        };
        let muted = TrackId::BOTH.map(|track| session.is_muted(track));

        let loop_duration = self.tracks.loop_duration_secs();
        let last_frame = 1.0 / self.tracks.track1.sample_rate() as f64;
        let resume_at = position.min((loop_duration - last_frame).max(0.0));

        scheduler.stop();
        self.play(scheduler, resume_at)?;
        for (track, muted) in TrackId::BOTH.into_iter().zip(muted) {
            scheduler.set_track_mute(track, muted);
        }
        info!("Swapped new tracks into preview at {:.3}s", resume_at);
        Ok(())
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Write the mixdown as WAV and return its manifest
    pub fn export_wav(&self, path: &Path) -> Result<ExportManifest> {
        let mixed = self.mixdown()?;
        let bytes = io::export_wav(&mixed, path)?;
        info!("Exported {:.3}s loop to {}", mixed.duration_secs(), path.display());
        Ok(ExportManifest::new(
            &mixed,
            &bytes,
            self.source_name.clone(),
            self.settings,
        ))
    }
}

/// Record of one export, written as JSON beside the WAV file
///
/// The SHA-256 covers the exact WAV bytes, so two exports with the same
/// digest are bit-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub created_at: DateTime<Utc>,
    /// Path of the source recording, if known
    pub source: Option<String>,
    pub settings: LoopSettings,
    pub frames: usize,
    pub channels: usize,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub sha256: String,
}

impl ExportManifest {
    pub fn new(
        buffer: &AudioBuffer,
        wav_bytes: &[u8],
        source: Option<String>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            created_at: Utc::now(),
            source,
            settings,
            frames: buffer.len(),
            channels: buffer.num_channels(),
            sample_rate: buffer.sample_rate(),
            duration_secs: buffer.duration_secs(),
            sha256: format!("{:x}", Sha256::digest(wav_bytes)),
        }
    }

    /// Manifest location for an exported WAV: same path, `.json` extension
    pub fn sidecar_path(wav_path: &Path) -> PathBuf {
        wav_path.with_extension("json")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
