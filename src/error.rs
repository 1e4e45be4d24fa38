//! Error types for the CA sentinel

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sentinel
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown filter field: {0}")]
    UnknownFilterField(String),

    #[error("Invalid task config: {0}")]
    InvalidTask(String),

    // Collaborator errors
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("Notification failed to {target}: {message}")]
    Notify { target: String, message: String },

    #[error("Processing timed out after {0}s")]
    Timeout(u64),

    // Persistence errors
    #[error("State persistence failed: {0}")]
    State(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is transient (worth retrying or merely logging)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Fetch(_) | Error::Notify { .. } | Error::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Fetch(e.to_string())
    }
}
