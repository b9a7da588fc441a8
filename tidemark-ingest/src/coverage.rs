//! Coverage rows and the processor's write-through cache.
//!
//! The store owns the persisted truth (`{name}_metadata`); the cache is the
//! in-memory mirror a processor consults for gap computation. Persisting
//! always rewrites the whole table, so the cache renders itself — with one
//! row substituted or dropped — into the replacement batch.

use std::collections::BTreeMap;

use tidemark_core::calendar::Unit;
use tidemark_core::domain::SparsityMap;
use tidemark_core::errors::{IngestError, SchemaError};
use tidemark_core::predicate::Predicate;
use tidemark_core::schema::{Batch, Value};
use tidemark_core::traits::store::TabularStore;

use crate::descriptor::{ProcessorDescriptor, COLLECTED_ITEMS_COLUMN, DOMAIN_COLUMN};

/// Coverage state of one parameter tuple.
#[derive(Debug, Clone)]
pub struct CoverageRow {
    /// Parameter values in parameter-schema order.
    pub params: Vec<(String, Value)>,
    /// Intervals already ingested.
    pub domain: SparsityMap,
    /// Rows on disk for this tuple.
    pub collected_items: i64,
}

impl CoverageRow {
    pub(crate) fn absent(params: Vec<(String, Value)>, unit: Unit) -> Self {
        Self {
            params,
            domain: SparsityMap::empty(unit),
            collected_items: 0,
        }
    }
}

/// Canonical cache key for a normalized parameter tuple.
pub(crate) fn param_key(params: &[(String, Value)]) -> String {
    params
        .iter()
        .map(|(_, value)| value.key_repr())
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Human-readable parameter rendering for logs and errors.
pub(crate) fn param_display(params: &[(String, Value)]) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered in-memory mirror of the metadata table.
#[derive(Debug, Default)]
pub(crate) struct CoverageCache {
    rows: BTreeMap<String, CoverageRow>,
}

impl CoverageCache {
    /// Populate from the persisted metadata table.
    pub fn load(
        store: &dyn TabularStore,
        descriptor: &ProcessorDescriptor,
    ) -> Result<Self, IngestError> {
        let meta_table = descriptor.meta_table_name();
        let batch = store.query(&meta_table, &Predicate::all())?;

        let mut rows = BTreeMap::new();
        for index in 0..batch.len() {
            let mut params = Vec::with_capacity(descriptor.param_schema().len());
            for column in descriptor.param_schema().columns() {
                let value = batch
                    .value(index, &column.name)
                    .cloned()
                    .unwrap_or(Value::Null);
                params.push((column.name.clone(), value));
            }

            let domain_text = batch
                .value(index, DOMAIN_COLUMN)
                .and_then(|v| v.as_text().map(str::to_string))
                .unwrap_or_else(|| "/".to_string());
            let domain = SparsityMap::parse(descriptor.unit(), &domain_text)?;
            let collected_items = batch
                .value(index, COLLECTED_ITEMS_COLUMN)
                .and_then(Value::as_integer)
                .unwrap_or(0);

            let key = param_key(&params);
            let display = param_display(&params);
            let row = CoverageRow {
                params,
                domain,
                collected_items,
            };
            if rows.insert(key, row).is_some() {
                return Err(IngestError::DuplicateCoverage {
                    table: meta_table,
                    params: display,
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn get(&self, key: &str) -> Option<&CoverageRow> {
        self.rows.get(key)
    }

    pub fn upsert(&mut self, key: String, row: CoverageRow) {
        self.rows.insert(key, row);
    }

    pub fn remove(&mut self, key: &str) {
        self.rows.remove(key);
    }

    /// Render the cache as the metadata replacement batch, with the row at
    /// `key` substituted (`Some`) or dropped (`None`).
    pub fn batch_with_override(
        &self,
        key: &str,
        replacement: Option<&CoverageRow>,
        descriptor: &ProcessorDescriptor,
    ) -> Result<Batch, SchemaError> {
        let mut batch = Batch::for_schema(descriptor.meta_schema());
        for (existing_key, row) in &self.rows {
            if existing_key == key {
                continue;
            }
            batch.push(render_row(row))?;
        }
        if let Some(row) = replacement {
            batch.push(render_row(row))?;
        }
        Ok(batch)
    }
}

fn render_row(row: &CoverageRow) -> Vec<Value> {
    let mut values: Vec<Value> = row.params.iter().map(|(_, value)| value.clone()).collect();
    values.push(Value::Text(row.domain.to_string()));
    values.push(Value::Integer(row.collected_items));
    values
}
