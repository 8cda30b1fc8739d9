//! Wiring of the inventory domain to the engine and the in-memory stores.

use std::sync::Arc;

use keel_core::clock::Clock;
use keel_core::error::DomainError;
use keel_core::identity::{Identifier, IdentifierFactory};
use keel_core::listener::EventListener;
use keel_core::logging::LoggingListener;
use keel_core::object::{DomainObject, TrackedObject};
use keel_core::snapshot::{SnapshotStore, Snapshotter};
use keel_core::subscription::{self, SubscriptionRegistry};
use keel_core::unit_of_work::UnitOfWork;
use keel_store::{InMemoryEventRepository, InMemorySnapshotStore, InMemorySubscriptionRegistry};
use uuid::Uuid;

use crate::config::DemoConfig;
use crate::domain::{CommandContext, Inventory};
use crate::error::AppError;

/// Namespace for the demo's named (v5) identifiers.
pub const LISTENER_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

/// Runs inventory commands and listener replays, one unit of work each.
pub struct Engine {
    events: Arc<InMemoryEventRepository>,
    snapshots: Arc<InMemorySnapshotStore>,
    subscriptions: Arc<InMemorySubscriptionRegistry>,
    snapshotter: Arc<Snapshotter>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdentifierFactory>,
    replay_batch: usize,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("snapshotter", &self.snapshotter)
            .field("replay_batch", &self.replay_batch)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Builds an engine over fresh in-memory stores.
    #[must_use]
    pub fn new(config: &DemoConfig, clock: Arc<dyn Clock>, ids: Arc<dyn IdentifierFactory>) -> Self {
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let snapshotter = Arc::new(Snapshotter::new(
            Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
            Arc::clone(&clock),
            config.snapshot_policy(),
        ));
        Self {
            events: Arc::new(InMemoryEventRepository::new()),
            snapshots,
            subscriptions: Arc::new(InMemorySubscriptionRegistry::new()),
            snapshotter,
            clock,
            ids,
            replay_batch: config.replay_batch,
        }
    }

    /// The event log.
    #[must_use]
    pub fn events(&self) -> &InMemoryEventRepository {
        &self.events
    }

    /// The snapshot store.
    #[must_use]
    pub fn snapshots(&self) -> &InMemorySnapshotStore {
        &self.snapshots
    }

    /// The subscription registry.
    #[must_use]
    pub fn subscriptions(&self) -> &dyn SubscriptionRegistry {
        self.subscriptions.as_ref()
    }

    /// Stable listener identifier derived from `name`.
    #[must_use]
    pub fn listener_id(&self, name: &str) -> Identifier {
        self.ids.generate_named(&LISTENER_NAMESPACE, name)
    }

    fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(self.events.clone(), self.subscriptions.clone())
            .with_snapshotter(Arc::clone(&self.snapshotter))
    }

    /// Loads an inventory from its latest snapshot plus the events after it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Rehydrate` if the event stream cannot be read.
    pub async fn load_inventory(&self, id: &Identifier) -> Result<Inventory, AppError> {
        let inventory = self
            .snapshotter
            .rehydrate(Inventory::new(id.clone()), self.events.as_ref())
            .await?;
        Ok(inventory)
    }

    /// Loads an inventory, runs `command` on it and commits the result.
    ///
    /// Returns the committed inventory.
    ///
    /// # Errors
    ///
    /// Returns the command's `DomainError`, or the error of loading or
    /// committing.
    #[tracing::instrument(skip(self, id, command), fields(inventory_id = %id))]
    pub async fn execute<F>(&self, id: &Identifier, command: F) -> Result<Inventory, AppError>
    where
        F: FnOnce(&mut Inventory, &CommandContext<'_>) -> Result<(), DomainError>,
    {
        let mut inventory = self.load_inventory(id).await?;
        let ctx = CommandContext {
            correlation_id: self.ids.new_uuid(),
            clock: self.clock.as_ref(),
            ids: self.ids.as_ref(),
        };
        command(&mut inventory, &ctx)?;
        self.commit_one(inventory, id).await
    }

    /// Replays every event after the listener's recorded position, then
    /// saves its subscription.
    ///
    /// The listener is resumed from the registry first, so a fresh instance
    /// skips what an earlier instance already handled.
    ///
    /// # Errors
    ///
    /// Returns the replay or commit error; a failed replay leaves the
    /// recorded position untouched.
    pub async fn project<L: EventListener>(&self, listener: L) -> Result<L, AppError> {
        let mut listener = LoggingListener::new(listener);
        subscription::resume(&mut listener, self.subscriptions.as_ref()).await?;
        let handled =
            subscription::catch_up(&mut listener, self.events.as_ref(), self.replay_batch).await?;
        tracing::info!(
            listener_id = %listener.listener_id(),
            handled,
            position = listener.subscription().position(),
            "listener replayed"
        );
        let id = listener.listener_id().clone();
        Ok(self.commit_one(listener, &id).await?.into_inner())
    }

    async fn commit_one<T: DomainObject>(&self, object: T, id: &Identifier) -> Result<T, AppError> {
        let mut unit = self.unit_of_work();
        unit.add(object)?;

        // Commit drops clean objects without yielding them.
        let dirty = unit.get(id).is_some_and(TrackedObject::has_pending_changes);
        let next = if dirty {
            unit.commit().next().await
        } else {
            unit.remove(id).map(Ok)
        };
        let tracked = next.ok_or_else(|| DomainError::AggregateNotFound(id.clone()))??;

        tracked.downcast::<T>().map(|boxed| *boxed).map_err(|other| {
            AppError::Domain(DomainError::Infrastructure(format!(
                "unit of work returned {} instead of {id}",
                other.identifier()
            )))
        })
    }
}
