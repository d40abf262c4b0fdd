//! Common error types for the dashboard.
//!
//! Most request paths never surface these to clients: upstream failures are
//! degraded into placeholder data at the provider boundary. They matter for
//! startup, the API client, and logging what went wrong.

use thiserror::Error;

/// Main error type for dashboard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from tokio or std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport errors talking to the miner API, node, or dashboard
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listen address could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The dashboard API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
