//! Error types for pipeline construction

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The track has no id the extractor can use
    #[error("Invalid track ID: {0}")]
    InvalidTrack(String),

    /// The extractor failed before the transcoder produced data
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The transcoder exited before producing data
    #[error("Transcode failed: {0}")]
    Transcode(String),

    /// Cross-source resolution failed
    #[error("Failed to resolve track: {0}")]
    Resolution(String),

    /// A child process could not be started
    #[error("Failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The pipeline was destroyed, possibly while it was being built
    #[error("Stream already destroyed")]
    Destroyed,
}

impl PipelineError {
    /// True when the error is the result of a requested teardown
    pub fn is_destroyed(&self) -> bool {
        matches!(self, PipelineError::Destroyed)
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
