use crate::domain::artifact::Artifact;
use crate::domain::ports::SharedArtifactStore;
use crate::error::{Result, StudioError};
use tracing::info;

/// Read and delete access to stored artifacts.
#[derive(Clone)]
pub struct ArtifactCatalog {
    store: SharedArtifactStore,
}

impl ArtifactCatalog {
    pub fn new(store: SharedArtifactStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Artifact> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| StudioError::not_found(id))
    }

    pub async fn list(&self) -> Result<Vec<Artifact>> {
        self.store.get_all().await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(StudioError::not_found(id));
        }
        info!(artifact_id = %id, "artifact deleted");
        Ok(())
    }

    /// Returns how many artifacts were removed.
    pub async fn delete_all(&self) -> Result<usize> {
        let removed = self.store.delete_all().await?;
        info!(removed, "all artifacts deleted");
        Ok(removed)
    }
}
