//! Sparsity-map parsing and calendar errors.

use super::error_code::{self, TidemarkErrorCode};

/// Errors raised while parsing or constructing a sparsity map.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("malformed sparsity mapping string {input:?}: {reason}")]
    Malformed { input: String, reason: String },

    #[error("unparseable date {input:?}: {reason}")]
    BadDate { input: String, reason: String },

    #[error("unknown time unit {unit:?} (expected days, months, or years)")]
    UnknownUnit { unit: String },
}

impl TidemarkErrorCode for DomainError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } | Self::BadDate { .. } => error_code::MALFORMED_DOMAIN,
            Self::UnknownUnit { .. } => error_code::UNKNOWN_UNIT,
        }
    }
}
