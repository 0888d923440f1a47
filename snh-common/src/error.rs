//! Common error types for Sonhário

use thiserror::Error;

/// Common result type for Sonhário operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the engines
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error talking to the materials repository
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decoding error (repository payloads, local exports)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decoding error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Repository answered but the query failed (non-2xx status, bad shape)
    #[error("Repository error: {0}")]
    Repository(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
