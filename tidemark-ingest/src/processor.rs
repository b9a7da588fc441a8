//! The interval processor — coverage-aware collect/delete orchestration.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use tidemark_core::domain::{DateInterval, SparsityMap};
use tidemark_core::errors::{IngestError, StorageError};
use tidemark_core::predicate::{CompareOp, Predicate};
use tidemark_core::schema::{Batch, Value};
use tidemark_core::traits::collector::Collector;
use tidemark_core::traits::store::TabularStore;

use crate::coverage::{param_display, param_key, CoverageCache, CoverageRow};
use crate::descriptor::ProcessorDescriptor;

/// Construction options for a processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessorOptions {
    /// Create the data and metadata tables on first use instead of
    /// failing with `TableMissing`. Default: false.
    pub create_missing: bool,
}

/// Outcome of one gap interval during `collect`.
#[derive(Debug, Clone, PartialEq)]
pub enum IntervalOutcome {
    /// Rows were appended and coverage extended.
    Ingested { interval: DateInterval, rows: usize },
    /// The collector returned no rows; coverage is unchanged.
    Empty { interval: DateInterval },
    /// The interval was skipped; later intervals still ran.
    Failed { interval: DateInterval, reason: String },
}

/// Result of one `collect` run.
#[derive(Debug, Default)]
pub struct CollectReport {
    pub rows_ingested: usize,
    pub outcomes: Vec<IntervalOutcome>,
}

impl CollectReport {
    pub fn successes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IntervalOutcome::Ingested { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IntervalOutcome::Failed { .. }))
            .count()
    }
}

/// Result of one `delete` run.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub rows_deleted: usize,
    /// Per requested interval, the number of rows removed.
    pub intervals: Vec<(DateInterval, usize)>,
}

/// Coverage-aware ETL driver bound to one descriptor and store.
///
/// Single-writer: one processor owns its `name` and its coverage cache.
/// Run several processors concurrently only with distinct names.
pub struct IntervalProcessor {
    descriptor: ProcessorDescriptor,
    store: Arc<dyn TabularStore>,
    coverage: CoverageCache,
}

impl IntervalProcessor {
    /// Bind a descriptor to a store, creating the `{name}` and
    /// `{name}_metadata` tables when allowed, and prime the coverage cache
    /// from the persisted metadata.
    pub fn new(
        descriptor: ProcessorDescriptor,
        store: Arc<dyn TabularStore>,
        options: ProcessorOptions,
    ) -> Result<Self, IngestError> {
        let meta_table = descriptor.meta_table_name();
        let data_exists = store.has_table(descriptor.name())?;
        let meta_exists = store.has_table(&meta_table)?;

        if !data_exists || !meta_exists {
            if !options.create_missing {
                let table = if data_exists {
                    meta_table
                } else {
                    descriptor.name().to_string()
                };
                return Err(StorageError::TableMissing { table }.into());
            }
            info!(table = descriptor.name(), "creating processor tables");
            store.create_table(
                descriptor.name(),
                descriptor.table_schema(),
                descriptor.table_primary_key(),
            )?;
            let meta_key = descriptor.meta_primary_key();
            store.create_table(&meta_table, descriptor.meta_schema(), Some(&meta_key))?;
        }

        let coverage = CoverageCache::load(store.as_ref(), &descriptor)?;
        Ok(Self {
            descriptor,
            store,
            coverage,
        })
    }

    pub fn descriptor(&self) -> &ProcessorDescriptor {
        &self.descriptor
    }

    /// Cached coverage for a parameter tuple, if any.
    pub fn coverage_for(
        &self,
        params: &[(String, Value)],
    ) -> Result<Option<&CoverageRow>, IngestError> {
        let params = self.descriptor.normalize_params(params)?;
        Ok(self.coverage.get(&param_key(&params)))
    }

    /// Ingest every uncovered interval of `domain` for one parameter tuple.
    ///
    /// The collector sees only `requested − covered`, in start-ascending
    /// order. Each interval commits independently: rows and the coverage
    /// update land in one store transaction, and a failed interval never
    /// rolls back earlier ones. Collector errors, schema mismatches, and
    /// uniqueness violations skip the interval; storage failures abort.
    pub fn collect(
        &mut self,
        collector: &dyn Collector,
        domain: &str,
        params: &[(String, Value)],
    ) -> Result<CollectReport, IngestError> {
        let unit = self.descriptor.unit();
        let params = self.descriptor.normalize_params(params)?;
        let requested = SparsityMap::parse(unit, domain)?;

        let key = param_key(&params);
        let covered = self
            .coverage
            .get(&key)
            .map(|row| row.domain.clone())
            .unwrap_or_else(|| SparsityMap::empty(unit));
        let gap = requested.difference(&covered);
        debug!(
            processor = self.descriptor.name(),
            params = %param_display(&params),
            requested = %requested,
            gap = %gap,
            "computed collection gap"
        );

        let mut report = CollectReport::default();
        for interval in gap.iter() {
            let batch = match collector.retrieve(interval, unit, &params) {
                Ok(batch) => batch,
                Err(error) => {
                    warn!(
                        processor = self.descriptor.name(),
                        collector = collector.name(),
                        interval = %interval,
                        %error,
                        "collector failed, skipping interval"
                    );
                    report.outcomes.push(IntervalOutcome::Failed {
                        interval: *interval,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            if batch.is_empty() {
                debug!(interval = %interval, "collector returned no rows");
                report
                    .outcomes
                    .push(IntervalOutcome::Empty { interval: *interval });
                continue;
            }

            let stamped = batch.prepend_columns(&params);
            if let Err(error) = self.descriptor.table_schema().validate(&stamped) {
                warn!(
                    processor = self.descriptor.name(),
                    collector = collector.name(),
                    interval = %interval,
                    %error,
                    "collector batch failed validation, skipping interval"
                );
                report.outcomes.push(IntervalOutcome::Failed {
                    interval: *interval,
                    reason: error.to_string(),
                });
                continue;
            }
            if let Some(row) =
                first_out_of_range(&stamped, self.descriptor.time_column(), interval)
            {
                let reason = format!(
                    "row {row} falls outside the requested interval {interval}"
                );
                warn!(
                    processor = self.descriptor.name(),
                    collector = collector.name(),
                    interval = %interval,
                    %reason,
                    "collector batch failed validation, skipping interval"
                );
                report.outcomes.push(IntervalOutcome::Failed {
                    interval: *interval,
                    reason,
                });
                continue;
            }

            let mut updated = self
                .coverage
                .get(&key)
                .cloned()
                .unwrap_or_else(|| CoverageRow::absent(params.clone(), unit));
            updated.domain = updated
                .domain
                .union(&SparsityMap::from_interval(unit, *interval));
            updated.collected_items += stamped.len() as i64;

            let meta_batch =
                self.coverage
                    .batch_with_override(&key, Some(&updated), &self.descriptor)?;
            let meta_table = self.descriptor.meta_table_name();
            match self.store.append_with_meta(
                self.descriptor.name(),
                &stamped,
                &meta_table,
                &meta_batch,
            ) {
                Ok(appended) => {
                    info!(
                        processor = self.descriptor.name(),
                        interval = %interval,
                        rows = appended,
                        coverage = %updated.domain,
                        "interval ingested"
                    );
                    self.coverage.upsert(key.clone(), updated);
                    report.rows_ingested += appended;
                    report.outcomes.push(IntervalOutcome::Ingested {
                        interval: *interval,
                        rows: appended,
                    });
                }
                Err(error @ StorageError::UniqueViolation { .. }) => {
                    warn!(
                        processor = self.descriptor.name(),
                        interval = %interval,
                        %error,
                        "append violated uniqueness, skipping interval"
                    );
                    report.outcomes.push(IntervalOutcome::Failed {
                        interval: *interval,
                        reason: error.to_string(),
                    });
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(report)
    }

    /// Remove every row of the **requested** domain for one parameter tuple
    /// and shrink coverage accordingly, interval by interval.
    pub fn delete(
        &mut self,
        domain: &str,
        params: &[(String, Value)],
    ) -> Result<DeleteReport, IngestError> {
        let unit = self.descriptor.unit();
        let params = self.descriptor.normalize_params(params)?;
        let requested = SparsityMap::parse(unit, domain)?;
        let key = param_key(&params);
        let meta_table = self.descriptor.meta_table_name();

        let mut report = DeleteReport::default();
        for interval in requested.iter() {
            let removed = self
                .store
                .delete(self.descriptor.name(), &self.row_predicate(&params, interval))?;

            let current = self
                .coverage
                .get(&key)
                .cloned()
                .unwrap_or_else(|| CoverageRow::absent(params.clone(), unit));
            let remaining = current.collected_items - removed as i64;
            if remaining < 0 {
                return Err(IngestError::CoverageUnderflow {
                    table: self.descriptor.name().to_string(),
                    collected_items: current.collected_items,
                    removed: removed as i64,
                });
            }

            let mut updated = current;
            updated.domain = updated
                .domain
                .difference(&SparsityMap::from_interval(unit, *interval));
            updated.collected_items = remaining;

            // A fully emptied tuple leaves the metadata table entirely.
            let replacement = if updated.domain.is_empty() && updated.collected_items == 0 {
                None
            } else {
                Some(&updated)
            };
            let meta_batch =
                self.coverage
                    .batch_with_override(&key, replacement, &self.descriptor)?;
            self.store.replace(&meta_table, &meta_batch)?;

            info!(
                processor = self.descriptor.name(),
                interval = %interval,
                rows = removed,
                coverage = %updated.domain,
                "interval deleted"
            );
            if replacement.is_some() {
                self.coverage.upsert(key.clone(), updated);
            } else {
                self.coverage.remove(&key);
            }
            report.rows_deleted += removed;
            report.intervals.push((*interval, removed));
        }
        Ok(report)
    }

    /// Drop both tables and forget the cache. Idempotent on the store side.
    pub fn drop_tables(self) -> Result<(), IngestError> {
        let meta_table = self.descriptor.meta_table_name();
        self.store.drop_table(self.descriptor.name())?;
        self.store.drop_table(&meta_table)?;
        Ok(())
    }

    /// Predicate matching one parameter tuple within one closed interval:
    /// `params = … AND time >= start AND time < day-after-end`.
    fn row_predicate(&self, params: &[(String, Value)], interval: &DateInterval) -> Predicate {
        let mut predicate = Predicate::all();
        for (column, value) in params {
            predicate = predicate.and(column.clone(), CompareOp::Eq, value.clone());
        }
        let upper = interval.end.succ_opt().unwrap_or(NaiveDate::MAX);
        predicate
            .and(
                self.descriptor.time_column(),
                CompareOp::Ge,
                Value::from(interval.start),
            )
            .and(
                self.descriptor.time_column(),
                CompareOp::Lt,
                Value::from(upper),
            )
    }
}

/// Index of the first row whose time column lies outside `interval`.
fn first_out_of_range(batch: &Batch, time_column: &str, interval: &DateInterval) -> Option<usize> {
    let index = batch.column_index(time_column)?;
    for (row_index, row) in batch.rows().iter().enumerate() {
        match row.get(index) {
            Some(Value::Timestamp(ts)) if interval.contains(ts.date()) => {}
            _ => return Some(row_index),
        }
    }
    None
}
