//! Ingestion configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calendar::Unit;
use crate::errors::ConfigError;

/// Configuration for one ingestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IngestConfig {
    /// Store connection descriptor: a filesystem path, an `sqlite://` URL,
    /// or `:memory:`.
    pub url: String,
    /// Quantum of the timeline. Default: days.
    pub unit: Unit,
    /// Create tables on first use instead of failing. Default: false.
    pub create_missing: bool,
}

impl IngestConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let config = IngestConfig::from_toml_str(
            r#"
            url = "data/market.db"
            unit = "months"
            create_missing = true
            "#,
        )
        .unwrap();
        assert_eq!(config.url, "data/market.db");
        assert_eq!(config.unit, Unit::Months);
        assert!(config.create_missing);
    }

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = IngestConfig::from_toml_str("url = \":memory:\"").unwrap();
        assert_eq!(config.unit, Unit::Days);
        assert!(!config.create_missing);
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(IngestConfig::from_toml_str("unit = \"weeks\"").is_err());
    }
}
