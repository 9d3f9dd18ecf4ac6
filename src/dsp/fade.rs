//! Fade curves
//!
//! Shaping functions mapping normalized fade progress to a gain factor. The
//! head track fades in along the curve; the tail track fades out along its
//! complement (`1 - curve(t)`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LoopError, Result};

/// Steepness of the logarithmic and exponential curves
const CURVE_STEEPNESS: f64 = 4.0;

/// Allowed range for a dragged control point, in both axes
const CONTROL_POINT_MIN: f64 = 0.1;
const CONTROL_POINT_MAX: f64 = 0.9;

/// Curve family used to shape a fade
///
/// Serialized by name; unknown names (including in settings files) fall back
/// to [`FadeCurve::Logarithmic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FadeCurve {
    /// `gain = t`
    Linear,
    /// Slow start, fast finish: `ln(1 + kt) / ln(1 + k)`
    #[default]
    Logarithmic,
    /// Fast start: `(e^(kt) - 1) / (e^k - 1)`
    Exponential,
    /// Quadratic shaped by the control point's Y coordinate
    Custom,
}

impl FadeCurve {
    /// All curve families, in display order
    pub const ALL: [FadeCurve; 4] = [
        FadeCurve::Linear,
        FadeCurve::Logarithmic,
        FadeCurve::Exponential,
        FadeCurve::Custom,
    ];

    /// Canonical name used in settings files and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Logarithmic => "logarithmic",
            FadeCurve::Exponential => "exponential",
            FadeCurve::Custom => "custom",
        }
    }

    /// Parse a curve name, falling back to logarithmic for anything unknown
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" | "lin" => FadeCurve::Linear,
            "exponential" | "exp" => FadeCurve::Exponential,
            "custom" => FadeCurve::Custom,
            _ => FadeCurve::Logarithmic,
        }
    }

    /// Evaluate the curve at progress `t`
    ///
    /// `t` is clamped to [0, 1] first. Only `Custom` reads the control point,
    /// and only its Y coordinate.
    pub fn evaluate(&self, t: f64, control_y: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            FadeCurve::Linear => t,
            FadeCurve::Logarithmic => {
                (CURVE_STEEPNESS * t).ln_1p() / CURVE_STEEPNESS.ln_1p()
            }
            FadeCurve::Exponential => {
                (CURVE_STEEPNESS * t).exp_m1() / CURVE_STEEPNESS.exp_m1()
            }
            FadeCurve::Custom => 2.0 * (1.0 - t) * t * control_y + t * t,
        }
    }
}

impl fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FadeCurve {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(FadeCurve::from_name(s))
    }
}

impl From<String> for FadeCurve {
    fn from(name: String) -> Self {
        FadeCurve::from_name(&name)
    }
}

impl From<FadeCurve> for String {
    fn from(curve: FadeCurve) -> Self {
        curve.name().to_string()
    }
}

/// Whether a fade rises (head track) or falls (tail track)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// Curve choice plus the control point a UI edits
///
/// The control point is kept for every mode so switching back to `Custom`
/// restores the last edit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeSettings {
    #[serde(rename = "mode")]
    pub curve: FadeCurve,
    #[serde(default = "default_control")]
    pub control_x: f64,
    #[serde(default = "default_control")]
    pub control_y: f64,
}

fn default_control() -> f64 {
    0.5
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            curve: FadeCurve::Logarithmic,
            control_x: 0.5,
            control_y: 0.5,
        }
    }
}

impl FadeSettings {
    /// Settings for a curve with the default control point
    pub fn new(curve: FadeCurve) -> Self {
        Self {
            curve,
            ..Self::default()
        }
    }

    /// Custom curve through a control point
    pub fn custom(control_x: f64, control_y: f64) -> Self {
        Self {
            curve: FadeCurve::Custom,
            control_x,
            control_y,
        }
    }

    /// Fade-in gain at progress `t`
    #[inline]
    pub fn evaluate(&self, t: f64) -> f64 {
        self.curve.evaluate(t, self.control_y)
    }

    /// Gain at progress `t` for the given direction
    #[inline]
    pub fn gain(&self, direction: FadeDirection, t: f64) -> f64 {
        match direction {
            FadeDirection::In => self.evaluate(t),
            FadeDirection::Out => 1.0 - self.evaluate(t),
        }
    }

    /// Move the control point as a drag handle would
    ///
    /// Both coordinates are clamped to [0.1, 0.9] and the curve switches to
    /// `Custom`. `y` is in gain space (1 is full level).
    pub fn with_control_point(self, x: f64, y: f64) -> Self {
        Self {
            curve: FadeCurve::Custom,
            control_x: clamp_control(x),
            control_y: clamp_control(y),
        }
    }

    /// Position of the drag handle: the curve point at t = 0.5
    pub fn anchor(&self, direction: FadeDirection) -> (f64, f64) {
        (0.5, self.gain(direction, 0.5))
    }

    /// `steps + 1` evenly spaced `(t, gain)` points across the fade
    pub fn sample_curve(&self, steps: usize, direction: FadeDirection) -> Vec<(f64, f64)> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                (t, self.gain(direction, t))
            })
            .collect()
    }

    /// Reject control points outside [0, 1] or non-finite values
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("control_x", self.control_x), ("control_y", self.control_y)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(LoopError::InvalidParameter {
                    name: name.to_string(),
                    reason: format!("{} is outside [0, 1]", value),
                });
            }
        }
        Ok(())
    }
}

fn clamp_control(value: f64) -> f64 {
    if value.is_nan() {
        return default_control();
    }
    value.clamp(CONTROL_POINT_MIN, CONTROL_POINT_MAX)
}
