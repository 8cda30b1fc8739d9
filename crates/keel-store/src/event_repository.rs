//! In-memory implementation of the `EventRepository` trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use keel_core::error::DomainError;
use keel_core::identity::Identifier;
use keel_core::repository::{EventRepository, StoredEvent};

#[derive(Debug, Default)]
struct EventLog {
    /// All events in append order; an event's global position is its index + 1.
    events: Vec<StoredEvent>,
    /// Indices into `events` per stream, in sequence order.
    streams: HashMap<Identifier, Vec<usize>>,
}

impl EventLog {
    fn stream_version(&self, aggregate_id: &Identifier) -> i64 {
        self.streams
            .get(aggregate_id)
            .and_then(|indices| indices.last())
            .map_or(0, |&index| self.events[index].sequence_number)
    }
}

/// Event repository backed by a process-local append-only log.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    log: RwLock<EventLog>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Global position of the most recently appended event (0 when empty).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Infrastructure`] if the lock is poisoned.
    pub fn head_position(&self) -> Result<u64, DomainError> {
        let log = self.log.read().map_err(|_| DomainError::poisoned("event log"))?;
        Ok(u64::try_from(log.events.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    #[tracing::instrument(skip(self, aggregate_id), fields(aggregate_id = %aggregate_id))]
    async fn load_events(&self, aggregate_id: &Identifier) -> Result<Vec<StoredEvent>, DomainError> {
        let log = self.log.read().map_err(|_| DomainError::poisoned("event log"))?;
        let events = log
            .streams
            .get(aggregate_id)
            .map(|indices| indices.iter().map(|&i| log.events[i].clone()).collect())
            .unwrap_or_default();
        Ok(events)
    }

    #[tracing::instrument(skip(self))]
    async fn load_all_after(
        &self,
        position: u64,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let log = self.log.read().map_err(|_| DomainError::poisoned("event log"))?;
        let start = usize::try_from(position).unwrap_or(usize::MAX);
        Ok(log.events.iter().skip(start).take(limit).cloned().collect())
    }

    #[tracing::instrument(
        skip(self, aggregate_id, events),
        fields(aggregate_id = %aggregate_id, count = events.len())
    )]
    async fn append_events(
        &self,
        aggregate_id: &Identifier,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut log = self.log.write().map_err(|_| DomainError::poisoned("event log"))?;
        let actual = log.stream_version(aggregate_id);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual,
            });
        }

        for (offset, event) in (1_i64..).zip(events) {
            if event.aggregate_id != *aggregate_id {
                return Err(DomainError::Validation(format!(
                    "event {} belongs to stream {}, not {aggregate_id}",
                    event.event_id, event.aggregate_id
                )));
            }
            if event.sequence_number != expected_version + offset {
                return Err(DomainError::Validation(format!(
                    "event {} has sequence number {}, expected {}",
                    event.event_id,
                    event.sequence_number,
                    expected_version + offset
                )));
            }
        }

        let mut indices = Vec::with_capacity(events.len());
        for event in events {
            let index = log.events.len();
            let mut stored = event.clone();
            stored.position = u64::try_from(index + 1).unwrap_or(u64::MAX);
            log.events.push(stored);
            indices.push(index);
        }
        log.streams
            .entry(aggregate_id.clone())
            .or_default()
            .extend(indices);

        if let Some(last) = events.last() {
            tracing::debug!(version = last.sequence_number, "events appended");
        }
        Ok(())
    }
}
