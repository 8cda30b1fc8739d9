//! Snapshot store doubles.

use async_trait::async_trait;
use keel_core::error::DomainError;
use keel_core::identity::Identifier;
use keel_core::snapshot::{Snapshot, SnapshotStore};

/// A snapshot store whose every call fails with an infrastructure error.
#[derive(Debug)]
pub struct FailingSnapshotStore;

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn load(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &Identifier,
    ) -> Result<Option<Snapshot>, DomainError> {
        Err(DomainError::Infrastructure("snapshot store offline".into()))
    }

    async fn save(&self, _snapshot: Snapshot) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("snapshot store offline".into()))
    }
}
