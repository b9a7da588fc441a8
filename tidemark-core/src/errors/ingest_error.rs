//! Ingestion-level errors: everything `collect`/`delete` can fail with.

use super::error_code::{self, TidemarkErrorCode};

/// Errors surfaced by the interval processor.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("domain error: {0}")]
    Domain(#[from] super::DomainError),

    #[error("schema error: {0}")]
    Schema(#[from] super::SchemaError),

    #[error("storage error: {0}")]
    Storage(#[from] super::StorageError),

    /// Deleting more rows than the coverage row accounts for.
    #[error(
        "coverage underflow for {table}: collected_items {collected_items} cannot absorb {removed} removed rows"
    )]
    CoverageUnderflow {
        table: String,
        collected_items: i64,
        removed: i64,
    },

    /// The metadata table holds more than one coverage row for one
    /// parameter tuple. Impossible under the declared primary key.
    #[error("duplicate coverage rows in {table} for parameters {params}")]
    DuplicateCoverage { table: String, params: String },
}

impl TidemarkErrorCode for IngestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Domain(e) => e.error_code(),
            Self::Schema(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::CoverageUnderflow { .. } => error_code::COVERAGE_UNDERFLOW,
            Self::DuplicateCoverage { .. } => error_code::DUPLICATE_COVERAGE,
        }
    }
}
