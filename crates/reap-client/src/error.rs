//! Error types for reap-client

use thiserror::Error;

/// Result type alias using reap-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the messaging bridge
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The bridge answered with a non-success status
    #[error("bridge returned status {code}")]
    Status { code: u16 },
}
