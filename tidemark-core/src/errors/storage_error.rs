//! Storage-layer errors for SQLite operations.

use super::error_code::{self, TidemarkErrorCode};

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("table {table} does not exist (pass create_missing=true to create it)")]
    TableMissing { table: String },

    #[error("unique constraint violated on {table}: {message}")]
    UniqueViolation { table: String, message: String },

    #[error("store busy or unreachable: {message}")]
    Transient { message: String },

    #[error("invalid identifier {name:?} for a table or column")]
    InvalidIdentifier { name: String },
}

impl TidemarkErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TableMissing { .. } => error_code::TABLE_MISSING,
            Self::UniqueViolation { .. } => error_code::UNIQUE_VIOLATION,
            Self::Transient { .. } => error_code::STORE_TRANSIENT,
            _ => error_code::STORAGE_ERROR,
        }
    }
}
