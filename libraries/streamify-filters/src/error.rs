//! Error types for filter-chain building

use thiserror::Error;

/// Filter errors
#[derive(Debug, Error)]
pub enum FilterError {
    /// Effect preset name not found
    #[error("Unknown effect preset: {0}")]
    UnknownEffect(String),

    /// Equalizer preset name not found
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Effect intensity is not a number
    #[error("Invalid effect intensity: {0}")]
    InvalidIntensity(String),

    /// Output format not supported
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;
