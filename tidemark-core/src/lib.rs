//! # tidemark-core
//!
//! Foundation crate for the Tidemark ingestion engine.
//! Defines the unit calendar, the sparsity-map interval algebra, schema
//! descriptors, structured predicates, errors, config, and the traits the
//! storage and ingest crates implement. Every other crate in the workspace
//! depends on this.

pub mod calendar;
pub mod config;
pub mod domain;
pub mod errors;
pub mod predicate;
pub mod schema;
pub mod tracing;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use calendar::Unit;
pub use config::IngestConfig;
pub use domain::{DateInterval, SparsityMap};
pub use errors::error_code::TidemarkErrorCode;
pub use predicate::{CompareOp, Predicate};
pub use schema::{Batch, LogicalType, Schema, Value};
pub use traits::collector::{Collector, CollectorError};
pub use traits::store::TabularStore;
