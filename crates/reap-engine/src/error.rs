//! Error types for reap-engine

use thiserror::Error;

/// Result type alias using reap-engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a harvest run
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the transport layer
    #[error(transparent)]
    Client(#[from] reap_client::Error),

    /// Filesystem or prompt I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value the pipeline cannot run with
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The remote side answered a request with a shape its contract rules out
    #[error("unexpected response to {0}")]
    Protocol(&'static str),

    /// The session was closed by the remote service
    #[error("session closed by the remote service")]
    Closed,
}
