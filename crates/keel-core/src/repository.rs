//! Event repository abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::identity::Identifier;

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: Identifier,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Sequence number within the aggregate stream, starting at 1.
    pub sequence_number: i64,
    /// Global position across all streams, assigned by the store on append.
    /// Zero until the event has been stored.
    pub position: u64,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Flattens a typed domain event into its stored form.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the payload cannot be encoded.
    pub fn from_event<E: DomainEvent + ?Sized>(event: &E) -> Result<Self, serde_json::Error> {
        let meta = event.metadata();
        Ok(Self {
            event_id: meta.event_id,
            aggregate_id: meta.aggregate_id.clone(),
            event_type: event.event_type().to_owned(),
            payload: event.to_payload()?,
            sequence_number: meta.sequence_number,
            position: 0,
            correlation_id: meta.correlation_id,
            causation_id: meta.causation_id,
            occurred_at: meta.occurred_at,
        })
    }
}

/// Repository trait for loading and appending domain events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Load all events for a given aggregate, ordered by sequence number.
    async fn load_events(&self, aggregate_id: &Identifier) -> Result<Vec<StoredEvent>, DomainError>;

    /// Load the events of one aggregate whose sequence number is greater than
    /// `after_version`.
    async fn load_events_after(
        &self,
        aggregate_id: &Identifier,
        after_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let mut events = self.load_events(aggregate_id).await?;
        events.retain(|event| event.sequence_number > after_version);
        Ok(events)
    }

    /// Load up to `limit` events across all streams whose global position is
    /// greater than `position`, in position order.
    async fn load_all_after(&self, position: u64, limit: usize)
    -> Result<Vec<StoredEvent>, DomainError>;

    /// Append new events to an aggregate stream with optimistic concurrency.
    /// `expected_version` is the last known sequence number.
    async fn append_events(
        &self,
        aggregate_id: &Identifier,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError>;
}
