//! Error types for snh-player
//!
//! Only failures that stop a session from starting are errors here.
//! Per-resource load failures and play() rejections are absorbed where they
//! happen (see [`crate::media::LoadError`]) and never reach this type.

use thiserror::Error;

/// Main error type for snh-player
#[derive(Error, Debug)]
pub enum Error {
    /// Errors from the shared library (config, repository transport)
    #[error(transparent)]
    Common(#[from] snh_common::Error),

    /// The materials pool could not be fetched; no session can start
    #[error("Materials unavailable: {0}")]
    MaterialsUnavailable(String),

    /// Preset or config values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using snh-player Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert!(Error::MaterialsUnavailable("503".into())
            .to_string()
            .starts_with("Materials unavailable"));
        assert!(Error::InvalidConfig("x".into())
            .to_string()
            .contains("Invalid configuration"));
    }

    #[test]
    fn test_common_error_is_transparent() {
        let err: Error = snh_common::Error::Repository("boom".into()).into();
        assert_eq!(err.to_string(), "Repository error: boom");
    }
}
