//! # tidemark-storage
//!
//! SQLite persistence layer for the Tidemark ingestion engine.
//! WAL mode, one write-serialized connection per URL, scoped transactions
//! with rollback on every error path, structured predicates rendered to
//! bound parameters.

pub mod connection;
pub mod pragmas;
pub mod sql;
pub mod store;

pub use connection::{connect, shutdown};
pub use store::SqliteStore;
