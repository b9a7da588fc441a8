//! Configuration loading errors.

use super::error_code::{self, TidemarkErrorCode};

/// Errors raised while loading an [`crate::config::IngestConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse config: {message}")]
    Parse { message: String },
}

impl TidemarkErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        error_code::CONFIG_ERROR
    }
}
