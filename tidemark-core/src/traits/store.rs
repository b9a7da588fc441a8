//! `TabularStore` trait — abstract data/metadata persistence.
//!
//! The processor consumes this contract only; no SQL is exposed upward.
//! Every operation runs inside a transaction that commits on success and
//! rolls back on any error, which is returned unchanged.

use std::sync::Arc;

use crate::errors::StorageError;
use crate::predicate::Predicate;
use crate::schema::{Batch, Schema};

/// Tabular persistence contract consumed by the interval processor.
pub trait TabularStore: Send + Sync {
    /// Whether a table exists.
    fn has_table(&self, name: &str) -> Result<bool, StorageError>;

    /// Create a table for `schema`, optionally with a composite primary
    /// key. Idempotent: an existing table is left untouched.
    fn create_table(
        &self,
        name: &str,
        schema: &Schema,
        primary_key: Option<&[String]>,
    ) -> Result<(), StorageError>;

    /// Append rows. A declared-uniqueness violation surfaces
    /// [`StorageError::UniqueViolation`] and nothing is written.
    fn append(&self, name: &str, rows: &Batch) -> Result<usize, StorageError>;

    /// Atomically substitute all rows of a table. Used for coverage
    /// metadata tables, which are rewritten whole.
    fn replace(&self, name: &str, rows: &Batch) -> Result<(), StorageError>;

    /// Materialize all rows matching `predicate`, decoded per the table's
    /// declared column types.
    fn query(&self, name: &str, predicate: &Predicate) -> Result<Batch, StorageError>;

    /// Delete matching rows, returning the affected count.
    fn delete(&self, name: &str, predicate: &Predicate) -> Result<usize, StorageError>;

    /// Drop a table. Idempotent: succeeds even if absent.
    fn drop_table(&self, name: &str) -> Result<(), StorageError>;

    /// Left-outer join of several tables on a shared column, with one
    /// per-table predicate. Read side only.
    fn join(
        &self,
        names: &[String],
        on: &str,
        predicates: &[Predicate],
    ) -> Result<Batch, StorageError>;

    /// Append `rows` to `name` and replace `meta_name` with `meta` in one
    /// transaction, append first. This is the processor's commit point: a
    /// crash never persists rows without their coverage update.
    fn append_with_meta(
        &self,
        name: &str,
        rows: &Batch,
        meta_name: &str,
        meta: &Batch,
    ) -> Result<usize, StorageError>;
}

impl<T: TabularStore + ?Sized> TabularStore for Arc<T> {
    fn has_table(&self, name: &str) -> Result<bool, StorageError> {
        (**self).has_table(name)
    }
    fn create_table(
        &self,
        name: &str,
        schema: &Schema,
        primary_key: Option<&[String]>,
    ) -> Result<(), StorageError> {
        (**self).create_table(name, schema, primary_key)
    }
    fn append(&self, name: &str, rows: &Batch) -> Result<usize, StorageError> {
        (**self).append(name, rows)
    }
    fn replace(&self, name: &str, rows: &Batch) -> Result<(), StorageError> {
        (**self).replace(name, rows)
    }
    fn query(&self, name: &str, predicate: &Predicate) -> Result<Batch, StorageError> {
        (**self).query(name, predicate)
    }
    fn delete(&self, name: &str, predicate: &Predicate) -> Result<usize, StorageError> {
        (**self).delete(name, predicate)
    }
    fn drop_table(&self, name: &str) -> Result<(), StorageError> {
        (**self).drop_table(name)
    }
    fn join(
        &self,
        names: &[String],
        on: &str,
        predicates: &[Predicate],
    ) -> Result<Batch, StorageError> {
        (**self).join(names, on, predicates)
    }
    fn append_with_meta(
        &self,
        name: &str,
        rows: &Batch,
        meta_name: &str,
        meta: &Batch,
    ) -> Result<usize, StorageError> {
        (**self).append_with_meta(name, rows, meta_name, meta)
    }
}
