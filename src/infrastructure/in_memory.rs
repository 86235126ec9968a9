use crate::domain::artifact::{Artifact, NewArtifact, PaymentStatus, Transition};
use crate::domain::ports::{ArtifactChange, ArtifactStore};
use crate::error::{Result, StudioError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory artifact store.
///
/// Uses `Arc<RwLock<HashMap<String, Artifact>>>` to allow shared concurrent access.
/// Payment transitions run under the write lock, which makes them a
/// compare-and-set against concurrent webhook deliveries.
#[derive(Default, Clone)]
pub struct InMemoryArtifactStore {
    artifacts: Arc<RwLock<HashMap<String, Artifact>>>,
}

impl InMemoryArtifactStore {
    /// Creates a new, empty in-memory artifact store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn create(&self, new: NewArtifact) -> Result<Artifact> {
        let artifact = Artifact::from_new(Uuid::new_v4().to_string(), new);
        let mut artifacts = self.artifacts.write().await;
        artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(artifact)
    }

    async fn get(&self, id: &str) -> Result<Option<Artifact>> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Artifact>> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts.values().cloned().collect())
    }

    async fn modify(&self, id: &str, change: ArtifactChange) -> Result<Artifact> {
        let mut artifacts = self.artifacts.write().await;
        let slot = artifacts
            .get_mut(id)
            .ok_or_else(|| StudioError::not_found(id))?;
        let mut artifact = slot.clone();
        change(&mut artifact)?;
        *slot = artifact.clone();
        Ok(artifact)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut artifacts = self.artifacts.write().await;
        Ok(artifacts.remove(id).is_some())
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut artifacts = self.artifacts.write().await;
        let count = artifacts.len();
        artifacts.clear();
        Ok(count)
    }

    async fn transition_payment(
        &self,
        id: &str,
        to: PaymentStatus,
        email: Option<String>,
    ) -> Result<(Artifact, Transition)> {
        let mut artifacts = self.artifacts.write().await;
        let artifact = artifacts
            .get_mut(id)
            .ok_or_else(|| StudioError::not_found(id))?;
        let transition = artifact.transition(to, email);
        Ok((artifact.clone(), transition))
    }
}
