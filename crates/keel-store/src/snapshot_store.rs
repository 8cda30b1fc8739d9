//! In-memory implementation of the `SnapshotStore` trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use keel_core::error::DomainError;
use keel_core::identity::Identifier;
use keel_core::snapshot::{Snapshot, SnapshotStore};

type SnapshotKey = (String, Identifier);

/// Keeps the newest snapshot per aggregate.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<SnapshotKey, Snapshot>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of aggregates with a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Infrastructure`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, DomainError> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| DomainError::poisoned("snapshot store"))?;
        Ok(snapshots.len())
    }

    /// Whether no snapshot is stored.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Infrastructure`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    #[tracing::instrument(skip(self, aggregate_id), fields(aggregate_id = %aggregate_id))]
    async fn load(
        &self,
        aggregate_type: &str,
        aggregate_id: &Identifier,
    ) -> Result<Option<Snapshot>, DomainError> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| DomainError::poisoned("snapshot store"))?;
        Ok(snapshots
            .get(&(aggregate_type.to_owned(), aggregate_id.clone()))
            .cloned())
    }

    #[tracing::instrument(
        skip(self, snapshot),
        fields(
            aggregate_type = %snapshot.aggregate_type,
            aggregate_id = %snapshot.aggregate_id,
            version = snapshot.version
        )
    )]
    async fn save(&self, snapshot: Snapshot) -> Result<bool, DomainError> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| DomainError::poisoned("snapshot store"))?;
        let key = (snapshot.aggregate_type.clone(), snapshot.aggregate_id.clone());

        if let Some(existing) = snapshots.get(&key) {
            if existing.version >= snapshot.version {
                tracing::debug!(
                    existing_version = existing.version,
                    "declining snapshot that is not newer than the stored one"
                );
                return Ok(false);
            }
        }

        snapshots.insert(key, snapshot);
        Ok(true)
    }
}
