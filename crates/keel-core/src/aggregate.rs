//! Aggregate root abstraction.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::event::DomainEvent;
use crate::identity::Identifier;
use crate::repository::StoredEvent;

/// Trait for aggregate roots that reconstitute from event history.
///
/// Command methods record events into the uncommitted list without applying
/// them; [`version`](AggregateRoot::version) therefore always reflects the
/// last persisted event. The unit of work applies and clears the uncommitted
/// events once they have been appended.
pub trait AggregateRoot: Send + Sync + fmt::Debug + 'static {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent + Clone;

    /// Stable type name, used to key snapshots.
    const AGGREGATE_TYPE: &'static str;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &Identifier;

    /// Returns the current version (number of events applied).
    fn version(&self) -> i64;

    /// Apply an event to mutate internal state (used during reconstitution).
    fn apply(&mut self, event: &Self::Event);

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self);

    /// Snapshot codec for this aggregate type, or `None` when instances of it
    /// cannot be snapshotted.
    fn snapshot_codec() -> Option<SnapshotCodec<Self>>
    where
        Self: Sized,
    {
        None
    }

    /// Decodes and applies stored events in order.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error of the first event that fails to decode;
    /// events before it stay applied.
    fn replay(&mut self, events: &[StoredEvent]) -> Result<(), serde_json::Error>
    where
        Self: Sized,
    {
        for stored in events {
            let event = Self::Event::from_stored(stored)?;
            self.apply(&event);
        }
        Ok(())
    }
}

type Encode<A> = fn(&A) -> Result<serde_json::Value, serde_json::Error>;
type Decode<A> = fn(serde_json::Value) -> Result<A, serde_json::Error>;

/// Converts an aggregate to and from its snapshot state.
pub struct SnapshotCodec<A> {
    encode: Encode<A>,
    decode: Decode<A>,
}

impl<A> SnapshotCodec<A> {
    /// Builds a codec from explicit conversion functions.
    #[must_use]
    pub const fn new(encode: Encode<A>, decode: Decode<A>) -> Self {
        Self { encode, decode }
    }

    /// Encodes the aggregate's state.
    ///
    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn encode(&self, aggregate: &A) -> Result<serde_json::Value, serde_json::Error> {
        (self.encode)(aggregate)
    }

    /// Rebuilds an aggregate from snapshot state.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error.
    pub fn decode(&self, state: serde_json::Value) -> Result<A, serde_json::Error> {
        (self.decode)(state)
    }
}

impl<A: Serialize + DeserializeOwned> SnapshotCodec<A> {
    /// Codec using the aggregate's serde implementation.
    ///
    /// Fields holding uncommitted events should be `#[serde(skip)]`.
    #[must_use]
    pub fn json() -> Self {
        Self {
            encode: |aggregate| serde_json::to_value(aggregate),
            decode: serde_json::from_value,
        }
    }
}

impl<A> Clone for SnapshotCodec<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for SnapshotCodec<A> {}

impl<A> fmt::Debug for SnapshotCodec<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotCodec").finish_non_exhaustive()
    }
}
