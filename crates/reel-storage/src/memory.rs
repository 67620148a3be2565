//! In-memory object store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::store::{new_object_key, ObjectInfo, ObjectStore, StoredObject};

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    content_type: String,
    modified_at: DateTime<Utc>,
}

/// [`ObjectStore`] kept in process memory. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object under an exact key.
    pub async fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.insert_at(key, data, Utc::now()).await;
    }

    /// Store an object with an explicit modification time.
    pub async fn insert_at(
        &self,
        key: impl Into<String>,
        data: impl Into<Vec<u8>>,
        modified_at: DateTime<Utc>,
    ) {
        self.objects.write().await.insert(
            key.into(),
            Entry {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
                modified_at,
            },
        );
    }

    /// Keys currently stored, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|e| e.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|e| e.data.clone())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn put(
        &self,
        data: Vec<u8>,
        key_prefix: &str,
        extension: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let key = new_object_key(key_prefix, extension);
        self.objects.write().await.insert(
            key.clone(),
            Entry {
                data,
                content_type: content_type.to_string(),
                modified_at: Utc::now(),
            },
        );
        Ok(StoredObject {
            url: format!("memory://{key}"),
            key,
        })
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| ObjectInfo {
                key: k.clone(),
                size: e.data.len() as u64,
                modified_at: Some(e.modified_at),
            })
            .collect())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_list() {
        let store = MemoryStore::new();
        let stored = store
            .put(b"video".to_vec(), "projects/p1/exports/", "mp4", "video/mp4")
            .await
            .unwrap();

        assert!(stored.key.starts_with("projects/p1/exports/"));
        assert_eq!(stored.url, format!("memory://{}", stored.key));
        assert_eq!(store.get(&stored.key).await.unwrap(), b"video");
        assert_eq!(store.content_type(&stored.key).await.as_deref(), Some("video/mp4"));

        store.insert("projects/p2/scenes/s1/clip.mp4", b"x".to_vec()).await;
        let listed = store.list("projects/p1/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 5);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryStore::new();
        assert!(store.get("nope").await.unwrap_err().is_not_found());
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_download_and_put_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.insert("a/clip.mp4", b"clip".to_vec()).await;

        let local = dir.path().join("nested/clip.mp4");
        store.download_to("a/clip.mp4", &local).await.unwrap();
        assert_eq!(tokio::fs::read(&local).await.unwrap(), b"clip");

        let stored = store.put_file(&local, "b/", "video/mp4").await.unwrap();
        assert!(stored.key.ends_with(".mp4"));
    }
}
