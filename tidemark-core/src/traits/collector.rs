//! `Collector` trait — the external data-source contract.

use crate::calendar::Unit;
use crate::domain::DateInterval;
use crate::errors::error_code::{self, TidemarkErrorCode};
use crate::schema::{Batch, Value};

/// Opaque failure marker a collector returns instead of a batch.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CollectorError(pub String);

impl CollectorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl TidemarkErrorCode for CollectorError {
    fn error_code(&self) -> &'static str {
        error_code::COLLECTOR_ERROR
    }
}

/// An external data source queried one uncovered interval at a time.
///
/// Implementations must not mutate shared state, and every returned row's
/// time column must lie inside the requested closed interval. The returned
/// batch carries the data columns only; the processor prepends parameter
/// columns before validation and persistence.
pub trait Collector: Send + Sync {
    /// Stable name, used in logs and reports.
    fn name(&self) -> &str;

    /// Fetch all rows for one closed interval and parameter tuple.
    fn retrieve(
        &self,
        interval: &DateInterval,
        unit: Unit,
        params: &[(String, Value)],
    ) -> Result<Batch, CollectorError>;
}
