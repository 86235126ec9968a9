use crate::domain::artifact::{Artifact, NewArtifact, PaymentStatus, Transition};
use crate::domain::ports::{ArtifactChange, ArtifactStore};
use crate::error::{Result, StudioError};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family holding artifact documents keyed by id.
pub const CF_ARTIFACTS: &str = "artifacts";

/// A persistent artifact store backed by RocksDB.
///
/// Artifacts are stored as JSON documents. Writes that read before they write
/// (updates and payment transitions) are serialized through `write_lock`, so a
/// payment transition is a compare-and-set even across concurrent requests.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "artifacts" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_artifacts = ColumnFamilyDescriptor::new(CF_ARTIFACTS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_artifacts])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(CF_ARTIFACTS)
            .ok_or_else(|| StudioError::internal("Artifacts column family not found"))
    }

    fn read(&self, id: &str) -> Result<Option<Artifact>> {
        let cf = self.cf()?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, artifact: &Artifact) -> Result<()> {
        let cf = self.cf()?;
        let value = serde_json::to_vec(artifact)?;
        self.db.put_cf(cf, artifact.id.as_bytes(), value)?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for RocksDBStore {
    async fn create(&self, new: NewArtifact) -> Result<Artifact> {
        let artifact = Artifact::from_new(Uuid::new_v4().to_string(), new);
        self.write(&artifact)?;
        Ok(artifact)
    }

    async fn get(&self, id: &str) -> Result<Option<Artifact>> {
        self.read(id)
    }

    async fn get_all(&self) -> Result<Vec<Artifact>> {
        let cf = self.cf()?;
        let mut artifacts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            artifacts.push(serde_json::from_slice(&value)?);
        }
        Ok(artifacts)
    }

    async fn modify(&self, id: &str, change: ArtifactChange) -> Result<Artifact> {
        let _guard = self.write_lock.lock().await;
        let mut artifact = self.read(id)?.ok_or_else(|| StudioError::not_found(id))?;
        change(&mut artifact)?;
        self.write(&artifact)?;
        Ok(artifact)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf()?;
        if self.db.get_pinned_cf(cf, id.as_bytes())?.is_none() {
            return Ok(false);
        }
        self.db.delete_cf(cf, id.as_bytes())?;
        Ok(true)
    }

    async fn delete_all(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        let mut count = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _value) = item?;
            batch.delete_cf(cf, key);
            count += 1;
        }
        self.db.write(batch)?;
        Ok(count)
    }

    async fn transition_payment(
        &self,
        id: &str,
        to: PaymentStatus,
        email: Option<String>,
    ) -> Result<(Artifact, Transition)> {
        let _guard = self.write_lock.lock().await;
        let mut artifact = self.read(id)?.ok_or_else(|| StudioError::not_found(id))?;
        let transition = artifact.transition(to, email);
        if transition == Transition::Applied {
            self.write(&artifact)?;
        }
        Ok((artifact, transition))
    }
}
