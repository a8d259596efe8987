//! Namespaced key/value persistence.
//!
//! Values are JSON. A namespace is written as a whole, so a reader sees either
//! the previous document or the new one, never a mix.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Namespace the token registry persists under.
pub const CROSS_SPACE_NAMESPACE: &str = "cross-space";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document is not valid JSON.
    #[error("invalid store document: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored document is valid JSON but not an object.
    #[error("store namespace {0} is not a JSON object")]
    NotAnObject(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read `key` in `namespace`. Missing keys read as `None`.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write `key` in `namespace`, replacing any previous value.
    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// One JSON document per namespace, at `<dir>/<namespace>.json`.
pub struct FileStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }

    async fn read_namespace(&self, namespace: &str) -> Result<Map<String, Value>, StoreError> {
        let path = self.path_for(namespace);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject(namespace.to_string())),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let mut document = self.read_namespace(namespace).await?;
        Ok(document.remove(key))
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        // A corrupt document is replaced rather than blocking every write.
        let mut document = match self.read_namespace(namespace).await {
            Ok(document) => document,
            Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
            Err(e) => {
                debug!(namespace, error = %e, "Discarding unreadable store document");
                Map::new()
            }
        };
        document.insert(key.to_string(), value);
        let json = serde_json::to_string_pretty(&Value::Object(document))?;

        // Write atomically: write to temp file, then rename
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(namespace);
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "xspace-store-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn test_file_store_persists_per_namespace() {
        let dir = temp_dir("persist");
        let store = FileStore::new(&dir);

        assert_eq!(store.get(CROSS_SPACE_NAMESPACE, "a").await.unwrap(), None);
        store.set(CROSS_SPACE_NAMESPACE, "a", json!(1)).await.unwrap();
        store.set(CROSS_SPACE_NAMESPACE, "b", json!({"x": "y"})).await.unwrap();
        store.set("other", "a", json!(2)).await.unwrap();

        let reopened = FileStore::new(&dir);
        assert_eq!(
            reopened.get(CROSS_SPACE_NAMESPACE, "a").await.unwrap(),
            Some(json!(1))
        );
        assert_eq!(
            reopened.get(CROSS_SPACE_NAMESPACE, "b").await.unwrap(),
            Some(json!({"x": "y"}))
        );
        assert_eq!(reopened.get("other", "a").await.unwrap(), Some(json!(2)));
        assert!(dir.join("cross-space.json").exists());
        assert!(!dir.join("cross-space.json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_document() {
        let dir = temp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("cross-space.json"), "{ not json").unwrap();
        let store = FileStore::new(&dir);

        assert!(matches!(
            store.get(CROSS_SPACE_NAMESPACE, "a").await,
            Err(StoreError::Json(_))
        ));
        store.set(CROSS_SPACE_NAMESPACE, "a", json!(true)).await.unwrap();
        assert_eq!(
            store.get(CROSS_SPACE_NAMESPACE, "a").await.unwrap(),
            Some(json!(true))
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        store.set("ns", "k", json!("v")).await.unwrap();
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(json!("v")));
        assert_eq!(store.get("other", "k").await.unwrap(), None);
    }
}
