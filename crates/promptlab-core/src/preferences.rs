//! Persistent preference store: string values under string keys.
//!
//! Reads and writes are synchronous. A missing key is `Ok(None)`, never an error.

use dashmap::DashMap;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

use crate::error::LabResult;

/// Durable key-value store behind the theme and template holders.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> LabResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> LabResult<()>;
}

/// Sled-backed store with an in-memory hot cache. The cache is checked before Sled.
pub struct SledPreferenceStore {
    db: Db,
    cache: Arc<DashMap<String, String>>,
}

impl SledPreferenceStore {
    /// Opens or creates the store at `path`; `LabConfig::preferences_path` gives the default.
    pub fn open_path<P: AsRef<Path>>(path: P) -> LabResult<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            cache: Arc::new(DashMap::new()),
        })
    }

    /// Blocks until every pending write is on disk.
    pub fn flush(&self) -> LabResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl PreferenceStore for SledPreferenceStore {
    fn get(&self, key: &str) -> LabResult<Option<String>> {
        if let Some(v) = self.cache.get(key) {
            return Ok(Some(v.clone()));
        }
        let Some(raw) = self.db.get(key.as_bytes())? else {
            return Ok(None);
        };
        let value = String::from_utf8(raw.to_vec()).map_err(|e| {
            crate::error::LabError::Storage(format!("value under '{}' is not UTF-8: {}", key, e))
        })?;
        self.cache.insert(key.to_string(), value.clone());
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> LabResult<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        self.cache.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Volatile store for tests and the `--ephemeral` console mode.
#[derive(Default)]
pub struct InMemoryPreferenceStore {
    values: DashMap<String, String>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store, e.g. to simulate values left by an earlier session.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (k, v) in values {
            store.values.insert(k.into(), v.into());
        }
        store
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get(&self, key: &str) -> LabResult<Option<String>> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    fn set(&self, key: &str, value: &str) -> LabResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sled_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledPreferenceStore::open_path(dir.path()).unwrap();
            assert_eq!(store.get("theme").unwrap(), None);
            store.set("theme", "light").unwrap();
            store.flush().unwrap();
        }
        let store = SledPreferenceStore::open_path(dir.path()).unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn in_memory_store_overwrites() {
        let store = InMemoryPreferenceStore::with_values([("theme", "dark")]);
        store.set("theme", "light").unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("light"));
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
