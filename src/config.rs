//! Loop settings file
//!
//! The parameters a user edits, stored as pretty-printed JSON:
//!
//! ```json
//! {
//!   "overlap_ratio": 25.0,
//!   "range": { "start_secs": 0.5, "end_secs": 4.5 },
//!   "fade_in": { "mode": "logarithmic", "control_x": 0.5, "control_y": 0.5 },
//!   "fade_out": { "mode": "custom", "control_x": 0.3, "control_y": 0.8 }
//! }
//! ```
//!
//! Every field is optional; a missing `range` means the whole source.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsp::{FadeSettings, OverlapRatio, UsableRange};
use crate::error::{LoopError, Result};

/// User-editable loop parameters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// Crossfade window in percent of the range duration, [0, 50]
    pub overlap_ratio: f64,
    /// Part of the source to loop; `None` is the whole source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<UsableRange>,
    /// Shape of the head track's fade-in
    pub fade_in: FadeSettings,
    /// Shape of the tail track's fade-out
    pub fade_out: FadeSettings,
}

impl LoopSettings {
    /// Read settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LoopError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }
        let content = fs::read_to_string(path)?;
        let settings: LoopSettings = serde_json::from_str(&content)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check every value is in range
    ///
    /// The range can only be checked against a source, so only its ordering
    /// is verified here.
    pub fn validate(&self) -> Result<()> {
        OverlapRatio::new(self.overlap_ratio)?;
        self.fade_in.validate()?;
        self.fade_out.validate()?;
        if let Some(range) = &self.range {
            range.validate(f64::INFINITY)?;
        }
        Ok(())
    }

    /// Overlap as a typed ratio, clamped into [0, 50]
    pub fn overlap(&self) -> OverlapRatio {
        OverlapRatio::clamped(self.overlap_ratio)
    }
}
