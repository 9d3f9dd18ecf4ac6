//! Loop synthesis DSP
//!
//! Pure functions: every call takes buffers as arguments and returns new
//! buffers. Nothing here keeps state between calls.
//!
//! Data flow: source → [`range::extract`] → [`track::synthesize_head`] and
//! [`track::synthesize_tail`] → [`mixer::mix`].

pub mod fade;
pub mod mixer;
pub mod range;
pub mod track;

pub use fade::{FadeCurve, FadeDirection, FadeSettings};
pub use mixer::mix;
pub use range::{extract, extract_range, UsableRange};
pub use track::{synthesize_head, synthesize_tail, LoopTracks, OverlapRatio, MAX_OVERLAP_PERCENT};
