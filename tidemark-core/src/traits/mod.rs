//! Traits at the seams of the system: data sources and tabular stores.

pub mod collector;
pub mod store;

pub use collector::{Collector, CollectorError};
pub use store::TabularStore;
