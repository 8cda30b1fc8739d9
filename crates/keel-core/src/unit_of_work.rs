//! Unit of work: the working set of one logical operation.
//!
//! Business logic adds the aggregates and listeners it touched, mutates them
//! in place, then drives [`UnitOfWork::commit`]. Commit walks the working set
//! in insertion order and persists each dirty object exactly once: pending
//! events for aggregates, the subscription for listeners. Committed objects
//! are handed back one at a time through the lazy [`Commit`] sequence.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::identity::Identifier;
use crate::listener::EventListener;
use crate::object::{Capability, DomainObject, TrackedObject};
use crate::repository::EventRepository;
use crate::snapshot::{SnapshotOutcome, Snapshotter};
use crate::subscription::{SubscriptionError, SubscriptionRegistry};

/// Returned by [`UnitOfWork::add`] for objects that are neither aggregates
/// nor listeners.
#[derive(Debug, Error)]
#[error("object is neither an aggregate nor a listener: {object:?}")]
pub struct ObjectNotSupported {
    /// The rejected object.
    pub object: Box<dyn fmt::Debug + Send + Sync>,
}

/// A tracked object failed to persist.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Pending events could not be encoded.
    #[error("failed to encode pending events of {identifier}: {source}")]
    Encode {
        /// The failing aggregate.
        identifier: Identifier,
        /// The serializer error.
        #[source]
        source: serde_json::Error,
    },

    /// The event repository rejected the append.
    #[error("failed to append events of {identifier}: {source}")]
    Persistence {
        /// The failing aggregate.
        identifier: Identifier,
        /// The repository error.
        #[source]
        source: DomainError,
    },

    /// The subscription registry rejected the save.
    #[error("failed to save subscription of {identifier}: {source}")]
    Subscription {
        /// The failing listener.
        identifier: Identifier,
        /// The registry error.
        #[source]
        source: SubscriptionError,
    },
}

impl CommitError {
    /// Identity of the object that failed.
    #[must_use]
    pub fn identifier(&self) -> &Identifier {
        match self {
            Self::Encode { identifier, .. }
            | Self::Persistence { identifier, .. }
            | Self::Subscription { identifier, .. } => identifier,
        }
    }
}

/// Tracks aggregates and listeners touched by one operation and commits them.
pub struct UnitOfWork {
    objects: IndexMap<Identifier, TrackedObject>,
    events: Arc<dyn EventRepository>,
    subscriptions: Arc<dyn SubscriptionRegistry>,
    snapshotter: Option<Arc<Snapshotter>>,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("objects", &self.objects.keys().collect::<Vec<_>>())
            .field("snapshotter", &self.snapshotter)
            .finish_non_exhaustive()
    }
}

impl UnitOfWork {
    /// Creates an empty unit of work without snapshotting.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventRepository>,
        subscriptions: Arc<dyn SubscriptionRegistry>,
    ) -> Self {
        Self {
            objects: IndexMap::new(),
            events,
            subscriptions,
            snapshotter: None,
        }
    }

    /// Offers committed aggregates to `snapshotter`.
    #[must_use]
    pub fn with_snapshotter(mut self, snapshotter: Arc<Snapshotter>) -> Self {
        self.snapshotter = Some(snapshotter);
        self
    }

    /// Starts tracking `object`.
    ///
    /// Adding an identity that is already tracked replaces the instance and
    /// keeps its place in the commit order.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectNotSupported`] if the object is neither an aggregate
    /// nor a listener.
    pub fn add<T: DomainObject>(&mut self, object: T) -> Result<(), ObjectNotSupported> {
        let tracked = match Box::new(object).into_capability() {
            Capability::Aggregate(aggregate) => TrackedObject::Aggregate(aggregate),
            Capability::Listener(listener) => TrackedObject::Listener(listener),
            Capability::Unsupported(object) => return Err(ObjectNotSupported { object }),
        };

        let identifier = tracked.identifier().clone();
        tracing::debug!(
            identifier = %identifier,
            kind = ?tracked.kind(),
            "tracking object"
        );
        self.objects.insert(identifier, tracked);
        Ok(())
    }

    /// Stops tracking and returns the object, or `None` if it is not tracked.
    pub fn remove(&mut self, identifier: &Identifier) -> Option<TrackedObject> {
        self.objects.shift_remove(identifier)
    }

    /// Whether an object with this identity is tracked.
    #[must_use]
    pub fn has(&self, identifier: &Identifier) -> bool {
        self.objects.contains_key(identifier)
    }

    /// The working set in insertion order.
    pub fn uncommitted(&self) -> impl ExactSizeIterator<Item = &TrackedObject> + '_ {
        self.objects.values()
    }

    /// Number of tracked objects.
    #[must_use]
    pub fn count(&self) -> usize {
        self.objects.len()
    }

    /// Borrows a tracked object.
    #[must_use]
    pub fn get(&self, identifier: &Identifier) -> Option<&TrackedObject> {
        self.objects.get(identifier)
    }

    /// Mutably borrows a tracked object.
    pub fn get_mut(&mut self, identifier: &Identifier) -> Option<&mut TrackedObject> {
        self.objects.get_mut(identifier)
    }

    /// Mutably borrows a tracked aggregate as its concrete type.
    pub fn aggregate_mut<A: AggregateRoot>(&mut self, identifier: &Identifier) -> Option<&mut A> {
        self.objects.get_mut(identifier)?.downcast_mut::<A>()
    }

    /// Mutably borrows a tracked listener as its concrete type.
    pub fn listener_mut<L: EventListener>(&mut self, identifier: &Identifier) -> Option<&mut L> {
        self.objects.get_mut(identifier)?.downcast_mut::<L>()
    }

    /// Starts committing the working set. Nothing happens until the returned
    /// sequence is polled.
    pub fn commit(&mut self) -> Commit<'_> {
        Commit {
            unit: self,
            halted: false,
        }
    }

    /// Drops every tracked object without committing.
    pub fn clear(&mut self) {
        if !self.objects.is_empty() {
            tracing::debug!(discarded = self.objects.len(), "clearing unit of work");
        }
        self.objects.clear();
    }
}

/// Lazy commit of a [`UnitOfWork`].
///
/// Each call to [`next`](Commit::next) persists the next dirty object and
/// yields it. Clean objects are untracked along the way without being
/// yielded. After a failure the sequence ends; the failing object and every
/// object after it stay tracked. Dropping the sequence early leaves unreached
/// objects tracked.
#[derive(Debug)]
pub struct Commit<'a> {
    unit: &'a mut UnitOfWork,
    halted: bool,
}

impl Commit<'_> {
    /// Commits the next dirty object.
    ///
    /// Returns `None` once the working set is exhausted or after an error
    /// has been yielded.
    pub async fn next(&mut self) -> Option<Result<TrackedObject, CommitError>> {
        if self.halted {
            return None;
        }

        loop {
            let unit = &mut *self.unit;
            let (identifier, object) = unit.objects.get_index_mut(0)?;

            if !object.has_pending_changes() {
                tracing::debug!(identifier = %identifier, "skipping clean object");
                unit.objects.shift_remove_index(0);
                continue;
            }

            if let Err(e) = persist(
                unit.events.as_ref(),
                unit.subscriptions.as_ref(),
                object,
            )
            .await
            {
                tracing::error!(error = %e, "commit halted");
                self.halted = true;
                return Some(Err(e));
            }

            let (identifier, object) = unit.objects.shift_remove_index(0)?;
            tracing::info!(identifier = %identifier, kind = ?object.kind(), "committed object");

            if let (Some(snapshotter), TrackedObject::Aggregate(aggregate)) =
                (unit.snapshotter.as_ref(), &object)
            {
                match snapshotter.offer_snapshot(&**aggregate).await {
                    Ok(SnapshotOutcome::Taken { version }) => {
                        tracing::debug!(identifier = %identifier, version, "snapshot taken");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(
                            identifier = %identifier,
                            error = %e,
                            "failed to take snapshot, continuing"
                        );
                    }
                }
            }

            return Some(Ok(object));
        }
    }

    /// Drains the sequence, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first [`CommitError`]; objects committed before it stay
    /// committed.
    pub async fn try_collect(mut self) -> Result<Vec<TrackedObject>, CommitError> {
        let mut committed = Vec::new();
        while let Some(result) = self.next().await {
            committed.push(result?);
        }
        Ok(committed)
    }
}

async fn persist(
    events: &dyn EventRepository,
    subscriptions: &dyn SubscriptionRegistry,
    object: &mut TrackedObject,
) -> Result<(), CommitError> {
    match object {
        TrackedObject::Aggregate(aggregate) => {
            let identifier = aggregate.stream_id().clone();
            let pending = aggregate
                .pending_events()
                .map_err(|source| CommitError::Encode {
                    identifier: identifier.clone(),
                    source,
                })?;
            events
                .append_events(&identifier, aggregate.committed_version(), &pending)
                .await
                .map_err(|source| CommitError::Persistence {
                    identifier: identifier.clone(),
                    source,
                })?;
            aggregate.mark_committed();
        }
        TrackedObject::Listener(listener) => {
            subscriptions
                .save(listener.subscription())
                .await
                .map_err(|source| CommitError::Subscription {
                    identifier: listener.listener_id().clone(),
                    source,
                })?;
            listener.mark_state_saved();
        }
    }
    Ok(())
}
