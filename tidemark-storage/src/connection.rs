//! Process-wide connection registry, keyed by store URL.
//!
//! At most one live [`SqliteStore`] exists per URL; every `connect` call for
//! the same URL returns a handle to the same store, so all processors at a
//! URL share one write-serialized connection. `:memory:` URLs are exempt —
//! each in-memory SQLite database is private to its connection, so sharing
//! a handle would alias unrelated databases.

use std::sync::{Arc, LazyLock, Mutex};

use rustc_hash::FxHashMap;
use tracing::debug;

use tidemark_core::errors::StorageError;

use crate::store::SqliteStore;

static REGISTRY: LazyLock<Mutex<FxHashMap<String, Arc<SqliteStore>>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// In-memory URLs never share a store.
pub(crate) fn is_memory_url(url: &str) -> bool {
    url == ":memory:" || url == "sqlite://:memory:"
}

/// Open the store registered for `url`, creating it on first use.
pub fn connect(url: &str) -> Result<Arc<SqliteStore>, StorageError> {
    if is_memory_url(url) {
        return Ok(Arc::new(SqliteStore::open(url)?));
    }

    let mut registry = REGISTRY.lock().map_err(|_| StorageError::Transient {
        message: "connection registry lock poisoned".to_string(),
    })?;
    if let Some(store) = registry.get(url) {
        return Ok(Arc::clone(store));
    }

    debug!(url, "opening sqlite store");
    let store = Arc::new(SqliteStore::open(url)?);
    registry.insert(url.to_string(), Arc::clone(&store));
    Ok(store)
}

/// Drop every registered store handle. Underlying connections close once
/// the last processor holding them is dropped.
pub fn shutdown() {
    if let Ok(mut registry) = REGISTRY.lock() {
        registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_url_shares_one_store() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("registry.db").display().to_string();
        let a = connect(&url).unwrap();
        let b = connect(&url).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn memory_urls_stay_private() {
        let a = connect(":memory:").unwrap();
        let b = connect(":memory:").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
