//! Durable blob storage for automations and execution history

use crate::error::AutomationError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;

/// Key-value store of opaque blobs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob; `Ok(None)` when the key has never been written
    async fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>, AutomationError>;

    /// Replace a blob
    async fn save_blob(&self, key: &str, bytes: &[u8]) -> Result<(), AutomationError>;
}

/// Stores each blob as `<dir>/<key>.json`
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>, AutomationError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_blob(&self, key: &str, bytes: &[u8]) -> Result<(), AutomationError> {
        fs::create_dir_all(&self.dir).await?;

        // Write atomically: write to temp file, then rename
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes).await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

/// Volatile store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>, AutomationError> {
        Ok(self.blobs.get(key).map(|r| r.value().clone()))
    }

    async fn save_blob(&self, key: &str, bytes: &[u8]) -> Result<(), AutomationError> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Load a JSON list, treating a missing, unreadable or corrupt blob as empty
pub async fn load_list<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Vec<T> {
    match store.load_blob(key).await {
        Ok(Some(bytes)) => match serde_json::from_slice::<Vec<T>>(&bytes) {
            Ok(items) => {
                tracing::info!("Loaded {} entries from blob '{}'", items.len(), key);
                items
            }
            Err(e) => {
                tracing::warn!("Failed to parse blob '{}': {}", key, e);
                Vec::new()
            }
        },
        Ok(None) => {
            tracing::debug!("No blob '{}' found, starting fresh", key);
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("Failed to read blob '{}': {}", key, e);
            Vec::new()
        }
    }
}

/// Serialize a list as pretty JSON and write it under `key`
pub async fn save_list<T: Serialize>(
    store: &dyn BlobStore,
    key: &str,
    items: &[T],
) -> Result<(), AutomationError> {
    let json = serde_json::to_vec_pretty(items)?;
    store.save_blob(key, &json).await?;
    tracing::debug!("Saved {} entries to blob '{}'", items.len(), key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path().join("data"));

        assert!(store.load_blob("automations").await.unwrap().is_none());
        store.save_blob("automations", b"[1,2,3]").await.unwrap();
        assert_eq!(
            store.load_blob("automations").await.unwrap().as_deref(),
            Some(&b"[1,2,3]"[..])
        );
        assert!(!dir
            .path()
            .join("data")
            .join("automations.json.tmp")
            .exists());
    }

    #[tokio::test]
    async fn test_load_list_falls_back_to_empty() {
        let store = MemoryBlobStore::new();
        assert!(load_list::<u32>(&store, "missing").await.is_empty());

        store.save_blob("corrupt", b"{not json").await.unwrap();
        assert!(load_list::<u32>(&store, "corrupt").await.is_empty());

        save_list(&store, "ok", &[4u32, 5]).await.unwrap();
        assert_eq!(load_list::<u32>(&store, "ok").await, vec![4, 5]);
    }
}
