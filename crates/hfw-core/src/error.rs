//! Error types for the Hello Future World logger

/// Result type alias using the logger's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for logger operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Script identifier failed validation at session construction
    #[error("invalid script id {0:?}: must be at least 2 characters of [A-Za-z0-9_]")]
    InvalidScriptId(String),

    /// Script category is not one of setup/task
    #[error("invalid script category {0:?}: expected \"setup\" or \"task\"")]
    InvalidCategory(String),

    /// Malformed metrics event
    #[error("validation error: {0}")]
    Validation(String),

    /// A configuration field required for publishing is absent
    #[error("missing required configuration field: {field}")]
    MissingConfig { field: &'static str },

    /// Telemetry sink errors
    #[error("publish error: {0}")]
    Publish(String),

    /// File system errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new publish error
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    /// Create a new missing-config error
    pub fn missing_config(field: &'static str) -> Self {
        Self::MissingConfig { field }
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
