//! Read-only scene metadata.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use reel_models::keys::manifest_key;
use reel_models::ProjectManifest;
use reel_storage::ObjectStore;

use crate::error::{AssemblyError, PipelineResult};

/// Source of scene records and project audio defaults.
#[async_trait]
pub trait SceneCatalog: Send + Sync {
    /// Manifest of a project, or `None` when the project has no metadata.
    async fn project(&self, project_id: &str) -> PipelineResult<Option<ProjectManifest>>;
}

/// Catalog backed by `projects/{id}/manifest.json` in the object store.
pub struct StorageCatalog {
    store: Arc<dyn ObjectStore>,
}

impl StorageCatalog {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SceneCatalog for StorageCatalog {
    async fn project(&self, project_id: &str) -> PipelineResult<Option<ProjectManifest>> {
        let key = manifest_key(project_id);
        let bytes = match self.store.get(&key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                debug!(project_id, "No manifest at {}", key);
                return Ok(None);
            }
            Err(e) => {
                return Err(AssemblyError::internal(format!(
                    "failed to read {key}: {e}"
                )))
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AssemblyError::internal(format!("malformed manifest {key}: {e}")))
    }
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    projects: HashMap<String, ProjectManifest>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, manifest: ProjectManifest) -> Self {
        self.projects.insert(manifest.project_id.clone(), manifest);
        self
    }
}

#[async_trait]
impl SceneCatalog for MemoryCatalog {
    async fn project(&self, project_id: &str) -> PipelineResult<Option<ProjectManifest>> {
        Ok(self.projects.get(project_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::SceneRecord;
    use reel_storage::MemoryStore;

    #[tokio::test]
    async fn test_storage_catalog_reads_manifest() {
        let store = MemoryStore::new();
        store
            .insert(
                "projects/p1/manifest.json",
                br#"{"projectId":"p1","audioDefaults":{"musicVolume":0.3},
                    "scenes":[{"id":"s1","duration":4.5,"transitionPreference":{"type":"dissolve","durationSeconds":0.5}}]}"#
                    .to_vec(),
            )
            .await;

        let catalog = StorageCatalog::new(Arc::new(store));
        let manifest = catalog.project("p1").await.unwrap().unwrap();
        assert_eq!(manifest.audio_defaults.music_volume, Some(0.3));
        assert_eq!(manifest.scene("s1").unwrap().duration_seconds, 4.5);

        assert!(catalog.project("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_catalog_rejects_malformed_manifest() {
        let store = MemoryStore::new();
        store.insert("projects/p1/manifest.json", b"{not json".to_vec()).await;
        let catalog = StorageCatalog::new(Arc::new(store));
        assert!(matches!(
            catalog.project("p1").await,
            Err(AssemblyError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_catalog() {
        let catalog = MemoryCatalog::new().with_project(ProjectManifest {
            project_id: "p1".to_string(),
            scenes: vec![SceneRecord::new("s1", 3.0)],
            ..Default::default()
        });
        assert!(catalog.project("p1").await.unwrap().is_some());
        assert!(catalog.project("p2").await.unwrap().is_none());
    }
}
