//! Shared test aggregates and listeners for the keel-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use keel_core::aggregate::{AggregateRoot, SnapshotCodec};
use keel_core::error::DomainError;
use keel_core::event::{DomainEvent, EventMetadata};
use keel_core::identity::Identifier;
use keel_core::listener::EventListener;
use keel_core::object::{Capability, DomainObject};
use keel_core::repository::StoredEvent;
use keel_core::subscription::Subscription;
use keel_core::unit_of_work::UnitOfWork;
use keel_store::{InMemoryEventRepository, InMemorySubscriptionRegistry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const INCREMENTED: &str = "counter.incremented";

#[derive(Debug, Serialize, Deserialize)]
struct IncrementedPayload {
    by: i64,
}

#[derive(Debug, Clone)]
pub struct Incremented {
    pub metadata: EventMetadata,
    pub by: i64,
}

impl DomainEvent for Incremented {
    fn event_type(&self) -> &'static str {
        INCREMENTED
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(IncrementedPayload { by: self.by })
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn from_stored(stored: &StoredEvent) -> Result<Self, serde_json::Error> {
        let payload: IncrementedPayload = serde_json::from_value(stored.payload.clone())?;
        Ok(Self {
            metadata: EventMetadata::from_stored(stored),
            by: payload.by,
        })
    }
}

fn record(id: &Identifier, version: i64, pending: &mut Vec<Incremented>, by: i64) {
    let sequence_number = version + i64::try_from(pending.len()).unwrap() + 1;
    pending.push(Incremented {
        metadata: EventMetadata {
            event_id: Uuid::new_v4(),
            event_type: INCREMENTED.into(),
            aggregate_id: id.clone(),
            sequence_number,
            correlation_id: Uuid::nil(),
            causation_id: Uuid::nil(),
            occurred_at: Utc::now(),
        },
        by,
    });
}

/// Snapshottable aggregate.
#[derive(Debug, Serialize, Deserialize)]
pub struct Counter {
    pub id: Identifier,
    pub version: i64,
    pub total: i64,
    #[serde(skip)]
    pub pending: Vec<Incremented>,
}

impl Counter {
    pub fn new(id: &str) -> Self {
        Self {
            id: Identifier::new(id),
            version: 0,
            total: 0,
            pending: Vec::new(),
        }
    }

    pub fn increment(&mut self, by: i64) {
        record(&self.id, self.version, &mut self.pending, by);
    }
}

impl AggregateRoot for Counter {
    type Event = Incremented;
    const AGGREGATE_TYPE: &'static str = "counter";

    fn aggregate_id(&self) -> &Identifier {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Incremented) {
        self.total += event.by;
        self.version = event.metadata.sequence_number;
    }

    fn uncommitted_events(&self) -> &[Incremented] {
        &self.pending
    }

    fn clear_uncommitted_events(&mut self) {
        self.pending.clear();
    }

    fn snapshot_codec() -> Option<SnapshotCodec<Self>> {
        Some(SnapshotCodec::json())
    }
}

impl DomainObject for Counter {
    fn into_capability(self: Box<Self>) -> Capability {
        Capability::Aggregate(self)
    }
}

/// Aggregate without a snapshot codec.
#[derive(Debug)]
pub struct Gauge {
    pub id: Identifier,
    pub version: i64,
    pub pending: Vec<Incremented>,
}

impl Gauge {
    pub fn new(id: &str) -> Self {
        Self {
            id: Identifier::new(id),
            version: 0,
            pending: Vec::new(),
        }
    }

    pub fn increment(&mut self, by: i64) {
        record(&self.id, self.version, &mut self.pending, by);
    }
}

impl AggregateRoot for Gauge {
    type Event = Incremented;
    const AGGREGATE_TYPE: &'static str = "gauge";

    fn aggregate_id(&self) -> &Identifier {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Incremented) {
        self.version = event.metadata.sequence_number;
    }

    fn uncommitted_events(&self) -> &[Incremented] {
        &self.pending
    }

    fn clear_uncommitted_events(&mut self) {
        self.pending.clear();
    }
}

impl DomainObject for Gauge {
    fn into_capability(self: Box<Self>) -> Capability {
        Capability::Aggregate(self)
    }
}

/// Sums every increment it is shown.
#[derive(Debug)]
pub struct Tally {
    pub subscription: Subscription,
    pub sum: i64,
    pub fail_at: Option<u64>,
}

impl Tally {
    pub fn new(id: &str) -> Self {
        Self {
            subscription: Subscription::new(Identifier::new(id)),
            sum: 0,
            fail_at: None,
        }
    }
}

impl EventListener for Tally {
    fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    fn subscription_mut(&mut self) -> &mut Subscription {
        &mut self.subscription
    }

    fn handle(&mut self, event: &StoredEvent) -> Result<(), DomainError> {
        if self.fail_at == Some(event.position) {
            return Err(DomainError::Infrastructure("tally offline".into()));
        }
        let by = event.payload["by"]
            .as_i64()
            .ok_or_else(|| DomainError::Validation("missing `by`".into()))?;
        self.sum += by;
        Ok(())
    }
}

impl DomainObject for Tally {
    fn into_capability(self: Box<Self>) -> Capability {
        Capability::Listener(self)
    }
}

pub struct Stores {
    pub events: Arc<InMemoryEventRepository>,
    pub subscriptions: Arc<InMemorySubscriptionRegistry>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            events: Arc::new(InMemoryEventRepository::new()),
            subscriptions: Arc::new(InMemorySubscriptionRegistry::new()),
        }
    }

    pub fn unit(&self) -> UnitOfWork {
        UnitOfWork::new(self.events.clone(), self.subscriptions.clone())
    }
}

/// Commits `increments` to the counter `id` in a single unit of work.
pub async fn commit_counter(unit: &mut UnitOfWork, counter: Counter, increments: &[i64]) -> Counter {
    let mut counter = counter;
    for by in increments {
        counter.increment(*by);
    }
    let id = counter.id.clone();
    unit.add(counter).unwrap();
    let committed = unit.commit().try_collect().await.unwrap();
    committed
        .into_iter()
        .find(|object| object.identifier() == &id)
        .unwrap()
        .downcast::<Counter>()
        .map(|boxed| *boxed)
        .unwrap()
}
