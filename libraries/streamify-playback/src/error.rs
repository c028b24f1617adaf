//! Error types for player operations

use streamify_core::CoreError;
use thiserror::Error;

/// Player errors
///
/// Only argument validation surfaces as an error. Build failures during
/// playback are reported through `TrackError` events instead.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Equalizer input did not have one gain per band
    #[error("EQ must be an array of 15 band gains (-0.25 to 1.0), got {0} bands")]
    InvalidEqualizer(usize),

    /// Unknown equalizer preset
    #[error("Unknown preset: {name}. Available: {available}")]
    UnknownPreset { name: String, available: String },

    /// Unknown effect preset
    #[error("Unknown effect preset: {0}")]
    UnknownEffect(String),

    /// Filter name or value rejected
    #[error(transparent)]
    Filter(#[from] CoreError),
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;
