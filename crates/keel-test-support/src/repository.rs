//! Test repositories: mock `EventRepository` implementations for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keel_core::error::DomainError;
use keel_core::identity::Identifier;
use keel_core::repository::{EventRepository, StoredEvent};

/// An event repository that records all `append_events` calls. Returns the
/// configured events from every load and always succeeds on append.
#[derive(Debug, Default)]
pub struct RecordingEventRepository {
    load_result: Vec<StoredEvent>,
    appended: Mutex<Vec<(Identifier, i64, Vec<StoredEvent>)>>,
}

impl RecordingEventRepository {
    /// Create a new recording repository that will return `load_result` from
    /// every load call.
    #[must_use]
    pub fn new(load_result: Vec<StoredEvent>) -> Self {
        Self {
            load_result,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of every append call, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(Identifier, i64, Vec<StoredEvent>)> {
        self.appended.lock().unwrap().clone()
    }

    /// Identifiers of the appended streams, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_ids(&self) -> Vec<Identifier> {
        self.appended
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _, _)| id.clone())
            .collect()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(&self, _aggregate_id: &Identifier) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.load_result.clone())
    }

    async fn load_all_after(
        &self,
        position: u64,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .load_result
            .iter()
            .filter(|event| event.position > position)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn append_events(
        &self,
        aggregate_id: &Identifier,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((aggregate_id.clone(), expected_version, events.to_vec()));
        Ok(())
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _aggregate_id: &Identifier) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_all_after(
        &self,
        _position: u64,
        _limit: usize,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _aggregate_id: &Identifier,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Delegates to another repository but fails appends to one stream.
/// Used to exercise partial commit failures.
pub struct RejectingEventRepository {
    inner: Arc<dyn EventRepository>,
    rejected: Identifier,
}

impl RejectingEventRepository {
    /// Wraps `inner`, rejecting every append to `rejected`.
    #[must_use]
    pub fn new(inner: Arc<dyn EventRepository>, rejected: Identifier) -> Self {
        Self { inner, rejected }
    }
}

impl std::fmt::Debug for RejectingEventRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RejectingEventRepository")
            .field("rejected", &self.rejected)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventRepository for RejectingEventRepository {
    async fn load_events(&self, aggregate_id: &Identifier) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events(aggregate_id).await
    }

    async fn load_all_after(
        &self,
        position: u64,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_all_after(position, limit).await
    }

    async fn append_events(
        &self,
        aggregate_id: &Identifier,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if *aggregate_id == self.rejected {
            return Err(DomainError::Infrastructure(format!(
                "stream {aggregate_id} is read-only"
            )));
        }
        self.inner
            .append_events(aggregate_id, expected_version, events)
            .await
    }
}
