//! Audio Engine Module
//!
//! Buffers, the WAV container, file I/O, and the real-time side of loop
//! preview:
//! - Output hosts and their phase-locked voice pairs
//! - Per-track level metering
//! - The playback scheduler

pub mod buffer;
#[cfg(feature = "device")]
pub mod device;
pub mod host;
pub mod io;
pub mod meter;
pub mod transport;
pub mod voice;
pub mod wav;

pub use buffer::AudioBuffer;
#[cfg(feature = "device")]
pub use device::DeviceHost;
pub use host::{OfflineHost, OutputHost};
pub use io::{export_wav, generate_test_tone, import_audio};
pub use meter::LevelMeter;
pub use transport::{LoopPlaybackScheduler, PlaybackSession, TransportState};
pub use voice::{TrackId, VoicePair, VoiceTap};
