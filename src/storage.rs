//! Persistent key-value storage for user collections.
//!
//! Collections (tasks, notes, snippets, formatters, chat threads) are
//! stored as JSON values under string keys. [`FileStorage`] keeps the
//! whole store in a single JSON document on disk; [`MemoryStorage`] backs
//! tests and ephemeral sessions.
//!
//! Writers always replace a whole key. Concurrent writers to the same key
//! are last-writer-wins, which matches how the popup and the background
//! engine already coordinate: each reads the collection, modifies it, and
//! writes the full list back.

use crate::error::{AutomatorError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

/// Abstract key-value store.
///
/// Implementations must be safe to share across tasks; every operation
/// on a single key is atomic with respect to other operations.
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Read the raw JSON value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Remove the value stored under `key`. Missing keys are a no-op.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Read a typed value stored under `key`.
pub async fn get_typed<T: DeserializeOwned>(
    storage: &dyn StorageArea,
    key: &str,
) -> Result<Option<T>> {
    match storage.get(key).await? {
        Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
            AutomatorError::StorageUnavailable(format!("corrupt entry under key '{key}': {e}"))
        }),
        None => Ok(None),
    }
}

/// Store a typed value under `key`.
pub async fn set_typed<T: Serialize>(storage: &dyn StorageArea, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_value(value).map_err(|e| {
        AutomatorError::StorageUnavailable(format!("failed to encode entry for key '{key}': {e}"))
    })?;
    storage.set(key, json).await
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageArea for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// File-backed storage holding every key in one JSON document.
///
/// The document is small (user collections, not bulk data), so each write
/// rewrites it whole via a temp file and atomic rename. A mutex serializes
/// read-modify-write cycles within the process.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_document(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(serde_json::Map::new()),
            Err(e) => {
                return Err(AutomatorError::StorageUnavailable(format!(
                    "failed to read storage document '{}': {e}",
                    self.path.display()
                )));
            }
        };
        serde_json::from_str(&contents).map_err(|e| {
            AutomatorError::StorageUnavailable(format!(
                "storage document '{}' is corrupt: {e}",
                self.path.display()
            ))
        })
    }

    fn save_document(&self, document: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AutomatorError::StorageUnavailable(format!(
                    "failed to create storage directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        let text = serde_json::to_string_pretty(document).map_err(|e| {
            AutomatorError::StorageUnavailable(format!("failed to encode storage document: {e}"))
        })?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, text.as_bytes()).map_err(|e| {
            AutomatorError::StorageUnavailable(format!(
                "failed to write storage document '{}': {e}",
                tmp_path.display()
            ))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            AutomatorError::StorageUnavailable(format!(
                "failed to replace storage document '{}': {e}",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl StorageArea for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.load_document()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_document()?;
        document.insert(key.to_owned(), value);
        self.save_document(&document)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_document()?;
        if document.remove(key).is_some() {
            self.save_document(&document)?;
        }
        Ok(())
    }
}
