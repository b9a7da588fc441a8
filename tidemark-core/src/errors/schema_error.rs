//! Schema construction and batch validation errors.

use super::error_code::{self, TidemarkErrorCode};

/// Errors raised while composing schemas or validating row batches.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A batch does not conform to the schema. Reports the first offender.
    #[error("schema mismatch in column {column:?} at row {row}: expected {expected}, found {found}")]
    Mismatch {
        column: String,
        row: usize,
        expected: String,
        found: String,
    },

    /// Column names of a batch differ from the schema's.
    #[error("schema mismatch: expected columns {expected:?}, found {found:?}")]
    ColumnSet {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A batch repeats a value tuple on the declared unique constraint.
    #[error("duplicate key {key:?} at row {row} violates unique constraint")]
    DuplicateKey { key: String, row: usize },

    /// Two sub-schemas declare the same column name.
    #[error("column {column:?} declared by more than one schema")]
    Conflict { column: String },

    /// A constraint or descriptor references a column the schema lacks.
    #[error("column {column:?} not present in schema")]
    MissingColumn { column: String },

    /// The descriptor's time column is absent or not a timestamp.
    #[error("time column {column:?} must be a timestamp column of the data schema")]
    TimeColumn { column: String },

    /// A row's arity differs from the batch's column count.
    #[error("row {row} has {found} values, batch has {expected} columns")]
    RowArity {
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl TidemarkErrorCode for SchemaError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => error_code::SCHEMA_CONFLICT,
            _ => error_code::SCHEMA_MISMATCH,
        }
    }
}
