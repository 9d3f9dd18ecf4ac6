//! Error handling for LoopMaker
//!
//! Every error carries a stable code and recovery hints so the preview/export
//! front ends can decide whether to retry or surface the failure.

use thiserror::Error;

/// Result type alias for LoopMaker operations
pub type Result<T> = std::result::Result<T, LoopError>;

/// Main error type for LoopMaker operations
#[derive(Error, Debug)]
pub enum LoopError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Parameter Errors
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid range: start {start_secs:.3}s must be before end {end_secs:.3}s")]
    InvalidRange { start_secs: f64, end_secs: f64 },

    // Contract violations
    #[error("Track length mismatch: {left} frames vs {right} frames")]
    LengthMismatch { left: usize, right: usize },

    #[error("Track channel mismatch: {left} channels vs {right} channels")]
    ChannelMismatch { left: usize, right: usize },

    // Playback Errors
    #[error("Playback state error: {reason}")]
    PlaybackState { reason: String },

    #[error("Audio output failure: {reason}")]
    HostOutput { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoopError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LoopError::FileNotFound { .. } => "FILE_NOT_FOUND",
            LoopError::InvalidAudio { .. } => "INVALID_AUDIO",
            LoopError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            LoopError::EmptyAudio => "EMPTY_AUDIO",
            LoopError::InvalidParameter { .. } => "INVALID_PARAMETER",
            LoopError::InvalidRange { .. } => "INVALID_RANGE",
            LoopError::LengthMismatch { .. } => "LENGTH_MISMATCH",
            LoopError::ChannelMismatch { .. } => "CHANNEL_MISMATCH",
            LoopError::PlaybackState { .. } => "PLAYBACK_STATE",
            LoopError::HostOutput { .. } => "HOST_OUTPUT",
            LoopError::Io(_) => "IO_ERROR",
            LoopError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Length and channel mismatches are caller bugs and never recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            LoopError::PlaybackState { .. } => true,
            LoopError::HostOutput { .. } => true,
            LoopError::FileNotFound { .. } => true,
            LoopError::InvalidAudio { .. } => true,
            LoopError::UnsupportedFormat { .. } => true,
            LoopError::InvalidParameter { .. } => true,
            LoopError::InvalidRange { .. } => true,
            _ => false,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LoopError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            LoopError::InvalidAudio { .. } => vec![
                "Try converting the file to 16-bit PCM WAV first",
                "Check if the file plays in another application",
            ],
            LoopError::UnsupportedFormat { .. } => vec![
                "Convert to WAV (8/16/24/32-bit integer or 32-bit float)",
            ],
            LoopError::InvalidParameter { .. } => vec![
                "Overlap ratio must be between 0 and 50 percent",
                "Fade control points must be between 0 and 1",
            ],
            LoopError::InvalidRange { .. } => vec![
                "Move the range start before the range end",
                "Keep the range inside the source duration",
            ],
            LoopError::PlaybackState { .. } => vec![
                "Stop playback before starting it again",
                "Render the loop tracks before pressing play",
            ],
            LoopError::HostOutput { .. } => vec![
                "Check that an audio output device is connected",
                "Close other applications holding the device exclusively",
                "Export the loop to WAV instead of previewing it",
            ],
            _ => vec![],
        }
    }
}
