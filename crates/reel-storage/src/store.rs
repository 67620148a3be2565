//! Object store abstraction.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Information about a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Location of a freshly written object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    /// Retrievable URL (presigned for private buckets)
    pub url: String,
}

/// Build a unique key under `prefix`, e.g. `projects/p1/exports/<uuid>.mp4`.
pub fn new_object_key(prefix: &str, extension: &str) -> String {
    let ext = extension.trim_start_matches('.');
    if ext.is_empty() {
        format!("{prefix}{}", Uuid::new_v4())
    } else {
        format!("{prefix}{}.{ext}", Uuid::new_v4())
    }
}

/// Binary asset storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a whole object. Missing keys yield [`StorageError::NotFound`].
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Write `data` under a fresh key in `key_prefix`.
    async fn put(
        &self,
        data: Vec<u8>,
        key_prefix: &str,
        extension: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject>;

    /// List objects whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Download an object into a local file, creating parent directories.
    async fn download_to(&self, key: &str, path: &Path) -> StorageResult<()> {
        let bytes = self.get(key).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::read(key, format!("cannot create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| StorageError::read(key, format!("cannot write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Upload a local file under a fresh key in `key_prefix`, keeping its extension.
    async fn put_file(
        &self,
        path: &Path,
        key_prefix: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let data = tokio::fs::read(path).await?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.put(data, key_prefix, extension, content_type).await
    }
}
