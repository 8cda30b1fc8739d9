//! Shared test doubles and utilities for the Keel engine.

mod clock;
mod identity;
mod repository;
mod scenario;
mod snapshot;
mod subscription;

pub use clock::FixedClock;
pub use identity::SequenceIdentifierFactory;
pub use repository::{FailingEventRepository, RecordingEventRepository, RejectingEventRepository};
pub use scenario::{Outcome, Scenario};
pub use snapshot::FailingSnapshotStore;
pub use subscription::FailingSubscriptionRegistry;
