/// Core error types for Streamify
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for Streamify
#[derive(Error, Debug)]
pub enum CoreError {
    /// Filter name is not part of the filter catalogue
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    /// Filter value could not be coerced into the filter's type
    #[error("Invalid value for filter {name}: {reason}")]
    InvalidFilterValue { name: String, reason: String },

    /// Cross-source id resolution failed
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Related-track lookup failed
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create an invalid filter value error
    pub fn invalid_filter_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilterValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }
}
