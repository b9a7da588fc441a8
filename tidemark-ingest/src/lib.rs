//! # tidemark-ingest
//!
//! The interval processor: composes the sparsity-map algebra with a
//! pluggable collector and a tabular store so that collectors are only ever
//! asked about uncovered intervals, coverage metadata always matches the
//! rows on disk, and every interval commits independently.

pub mod coverage;
pub mod descriptor;
pub mod processor;

pub use coverage::CoverageRow;
pub use descriptor::ProcessorDescriptor;
pub use processor::{
    CollectReport, DeleteReport, IntervalOutcome, IntervalProcessor, ProcessorOptions,
};
