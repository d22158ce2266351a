//! Error types for the cpr_core library.
//!
//! The session state machine itself never fails; these errors only come out
//! of the I/O shell around it (store, config, suggestion service).

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cpr_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot or history store error
    #[error("Store error: {0}")]
    Store(String),

    /// Suggestion service error
    #[error("Suggestion error: {0}")]
    Suggestion(String),
}
