//! CLI Module
//!
//! Command-line interface for building, inspecting and previewing loops.

pub mod commands;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use crate::config::LoopSettings;
use crate::dsp::{FadeCurve, FadeSettings, UsableRange};

/// Loopmaker - seamless loop builder
#[derive(Parser, Debug)]
#[command(name = "loopmaker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a loop and export the mixdown as 16-bit WAV
    Render {
        /// Source WAV file
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the two tracks as <output>_track1.wav / _track2.wav
        #[arg(long)]
        tracks: bool,

        /// Write a JSON manifest next to the output
        #[arg(long)]
        manifest: bool,

        /// Write the resolved settings to this file
        #[arg(long, value_name = "FILE")]
        save_settings: Option<PathBuf>,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Show format and level information for a WAV file
    Info {
        /// WAV file to inspect
        input: PathBuf,
    },

    /// Print the gain curve of a fade mode
    Curve {
        /// linear, logarithmic, exponential or custom
        #[arg(short, long, default_value = "logarithmic")]
        mode: String,

        /// Control point as X,Y (switches the mode to custom)
        #[arg(long, value_name = "X,Y", value_parser = parse_point)]
        point: Option<(f64, f64)>,

        /// Show the fade-out (complemented) curve
        #[arg(long)]
        fade_out: bool,

        /// Number of intervals to sample
        #[arg(long, default_value_t = 10)]
        steps: usize,
    },

    /// Render every WAV file under a directory
    Batch {
        /// Directory to scan recursively
        dir: PathBuf,

        /// Directory for the rendered loops
        #[arg(short, long)]
        output_dir: PathBuf,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Render a preview of several loop passes through the playback scheduler
    Preview {
        /// Source WAV file
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of loop passes to render
        #[arg(long, default_value_t = 2)]
        loops: u32,

        /// Loop position to start from, in seconds
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        offset: f64,

        /// Track to mute (1 or 2); may be repeated
        #[arg(long = "mute", value_name = "TRACK")]
        mute: Vec<u8>,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Play the loop on the default audio device
    #[cfg(feature = "device")]
    Play {
        /// Source WAV file
        input: PathBuf,

        /// How long to play, in seconds
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,

        /// Output device name
        #[arg(long)]
        device: Option<String>,

        #[command(flatten)]
        loop_args: LoopArgs,
    },
}

/// Loop parameters shared by the rendering commands
///
/// Values given on the command line override the settings file.
#[derive(Args, Debug, Clone, Default)]
pub struct LoopArgs {
    /// JSON settings file
    #[arg(short, long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Crossfade overlap in percent of the range (0-50)
    #[arg(long, value_name = "PERCENT")]
    pub overlap: Option<f64>,

    /// Start of the usable range, in seconds
    #[arg(long, value_name = "SECS")]
    pub start: Option<f64>,

    /// End of the usable range, in seconds
    #[arg(long, value_name = "SECS")]
    pub end: Option<f64>,

    /// Fade-in mode
    #[arg(long, value_name = "MODE")]
    pub fade_in: Option<String>,

    /// Fade-out mode
    #[arg(long, value_name = "MODE")]
    pub fade_out: Option<String>,

    /// Fade-in control point as X,Y (switches fade-in to custom)
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pub fade_in_point: Option<(f64, f64)>,

    /// Fade-out control point as X,Y (switches fade-out to custom)
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pub fade_out_point: Option<(f64, f64)>,
}

impl LoopArgs {
    /// Merge the settings file (if any) with command-line overrides
    ///
    /// A range bound given without the other keeps the file's value, or
    /// falls back to 0 / the end of the source.
    pub fn resolve(&self, source_duration: f64) -> anyhow::Result<LoopSettings> {
        let mut settings = match &self.settings {
            Some(path) => LoopSettings::load(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => LoopSettings::default(),
        };

        if let Some(overlap) = self.overlap {
            settings.overlap_ratio = overlap;
        }
        if self.start.is_some() || self.end.is_some() {
            let base = settings
                .range
                .unwrap_or_else(|| UsableRange::new(0.0, source_duration));
            settings.range = Some(UsableRange::new(
                self.start.unwrap_or(base.start_secs),
                self.end.unwrap_or(base.end_secs),
            ));
        }
        apply_fade(&mut settings.fade_in, self.fade_in.as_deref(), self.fade_in_point);
        apply_fade(&mut settings.fade_out, self.fade_out.as_deref(), self.fade_out_point);

        settings.validate()?;
        Ok(settings)
    }
}

fn apply_fade(fade: &mut FadeSettings, mode: Option<&str>, point: Option<(f64, f64)>) {
    if let Some(mode) = mode {
        fade.curve = FadeCurve::from_name(mode);
    }
    if let Some((x, y)) = point {
        *fade = fade.with_control_point(x, y);
    }
}

/// Parse an `X,Y` pair
pub fn parse_point(value: &str) -> anyhow::Result<(f64, f64)> {
    let Some((x, y)) = value.split_once(',') else {
        bail!("expected X,Y but got '{}'", value);
    };
    let x: f64 = x.trim().parse().with_context(|| format!("invalid X in '{}'", value))?;
    let y: f64 = y.trim().parse().with_context(|| format!("invalid Y in '{}'", value))?;
    Ok((x, y))
}
