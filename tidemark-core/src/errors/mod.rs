//! Error types for every Tidemark concern, one enum per layer.

pub mod config_error;
pub mod domain_error;
pub mod error_code;
pub mod ingest_error;
pub mod schema_error;
pub mod storage_error;

pub use config_error::ConfigError;
pub use domain_error::DomainError;
pub use ingest_error::IngestError;
pub use schema_error::SchemaError;
pub use storage_error::StorageError;
