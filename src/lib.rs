//! Loopmaker - seamless loop crossfade engine
//!
//! Turns a recording into a loop that repeats without an audible seam:
//! 1. Range extraction picks the part of the source to loop
//! 2. Track synthesis builds a head track (source minus its end, fading in)
//!    and a tail track (that end, fading out, padded with silence)
//! 3. Mixing the two gives the final loop, exported as 16-bit WAV
//!
//! # Architecture
//!
//! - [`dsp`]: pure synthesis functions (fade curves, range, tracks, mixer)
//! - [`engine`]: buffers, WAV I/O, output hosts and the playback scheduler
//! - [`project`]: parameter state that keeps the tracks in sync with edits
//! - [`config`]: the JSON settings file

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod project;

pub use config::LoopSettings;
pub use error::{LoopError, Result};
pub use project::{ExportManifest, LoopProject};
