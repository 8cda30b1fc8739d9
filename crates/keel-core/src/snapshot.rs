//! Snapshot support for bounded aggregate replay.
//!
//! Snapshots persist aggregate state at a committed version, so loading only
//! replays the events after it. This module provides:
//!
//! - [`Snapshot`] - point-in-time aggregate state
//! - [`SnapshotStore`] - persistence contract
//! - [`NoSnapshots`] - store that keeps nothing
//! - [`SnapshotPolicy`] - when the unit of work should offer snapshots
//! - [`Snapshotter`] - restore, take and policy-gated offer

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::AggregateRoot;
use crate::clock::{Clock, SystemClock};
use crate::error::DomainError;
use crate::identity::Identifier;
use crate::object::EventSourced;
use crate::repository::EventRepository;

/// Point-in-time snapshot of aggregate state.
///
/// `version` is the sequence number of the last event folded into `state`;
/// only events after it need replaying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Aggregate type name.
    pub aggregate_type: String,
    /// Owning aggregate.
    pub aggregate_id: Identifier,
    /// Committed version the state corresponds to.
    pub version: i64,
    /// Opaque state produced by the aggregate's snapshot codec.
    pub state: serde_json::Value,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

/// Snapshot persistence.
///
/// Stores keep the newest snapshot per `(aggregate_type, aggregate_id)` and
/// decline snapshots that are not newer than the one they hold.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the most recent snapshot for an aggregate.
    async fn load(
        &self,
        aggregate_type: &str,
        aggregate_id: &Identifier,
    ) -> Result<Option<Snapshot>, DomainError>;

    /// Persist a snapshot. Returns `false` when an equal or newer snapshot is
    /// already stored and the offered one was discarded.
    async fn save(&self, snapshot: Snapshot) -> Result<bool, DomainError>;

    /// Version of the most recent snapshot, if any.
    async fn latest_version(
        &self,
        aggregate_type: &str,
        aggregate_id: &Identifier,
    ) -> Result<Option<i64>, DomainError> {
        Ok(self
            .load(aggregate_type, aggregate_id)
            .await?
            .map(|snapshot| snapshot.version))
    }
}

/// Snapshot store that never holds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSnapshots;

#[async_trait]
impl SnapshotStore for NoSnapshots {
    async fn load(
        &self,
        _aggregate_type: &str,
        _aggregate_id: &Identifier,
    ) -> Result<Option<Snapshot>, DomainError> {
        Ok(None)
    }

    async fn save(&self, _snapshot: Snapshot) -> Result<bool, DomainError> {
        Ok(false)
    }
}

/// When the unit of work offers a snapshot after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// Snapshot after every commit that appended events.
    Always,
    /// Snapshot once at least N events were committed since the last one.
    EveryNEvents(u64),
    /// Never snapshot on commit (load-only).
    Never,
}

impl SnapshotPolicy {
    /// Check if a snapshot should be created based on events since the last
    /// snapshot.
    #[must_use]
    pub const fn should_snapshot(&self, events_since: u64) -> bool {
        match self {
            Self::Always => true,
            Self::EveryNEvents(threshold) => events_since >= *threshold,
            Self::Never => false,
        }
    }
}

/// Result of asking for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// The aggregate type declares no snapshot codec.
    Unsupported,
    /// The policy or the store declined.
    Declined,
    /// A snapshot at `version` was stored.
    Taken {
        /// The snapshot's version.
        version: i64,
    },
}

/// Snapshot failures. All of them are recoverable: the aggregate can always
/// be rebuilt by full replay.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The aggregate state could not be encoded.
    #[error("failed to encode snapshot state: {0}")]
    Encode(#[source] serde_json::Error),

    /// A stored snapshot could not be decoded.
    #[error("failed to decode snapshot state: {0}")]
    Decode(#[source] serde_json::Error),

    /// The decoded state does not match the snapshot record.
    #[error("snapshot for {aggregate_id} claims version {expected} but decodes to version {found}")]
    Inconsistent {
        /// The aggregate.
        aggregate_id: Identifier,
        /// Version recorded on the snapshot.
        expected: i64,
        /// Version of the decoded state.
        found: i64,
    },

    /// The snapshot is newer than the aggregate's persisted event stream.
    #[error("snapshot for {aggregate_id} is at version {snapshot_version}, beyond the persisted stream")]
    AheadOfStream {
        /// The aggregate.
        aggregate_id: Identifier,
        /// Version recorded on the snapshot.
        snapshot_version: i64,
    },

    /// The snapshot store failed.
    #[error("snapshot store error: {0}")]
    Store(#[from] DomainError),

    /// Loading the events to replay on top of a snapshot failed.
    #[error("failed to load events: {0}")]
    Events(#[source] DomainError),

    /// A stored event could not be decoded during replay.
    #[error("failed to replay event: {0}")]
    Replay(#[source] serde_json::Error),
}

/// Restores and takes aggregate snapshots under a [`SnapshotPolicy`].
#[derive(Clone)]
pub struct Snapshotter {
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    policy: SnapshotPolicy,
}

impl std::fmt::Debug for Snapshotter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshotter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Snapshotter {
    /// Creates a snapshotter over `store`, timestamping with `clock`.
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>, policy: SnapshotPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// A snapshotter that neither stores nor restores anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoSnapshots), Arc::new(SystemClock), SnapshotPolicy::Never)
    }

    /// The configured policy.
    #[must_use]
    pub fn policy(&self) -> SnapshotPolicy {
        self.policy
    }

    /// Rebuilds a distinct instance of `aggregate` from its latest snapshot.
    ///
    /// Returns `None` when no snapshot exists or `A` cannot be snapshotted.
    /// The input is never modified; the caller replays the events after the
    /// restored instance's version. The snapshot's version is checked
    /// against `events`, so a snapshot newer than the persisted stream is
    /// never returned.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::AheadOfStream`] if the stream has no event at
    /// the snapshot's version, [`SnapshotError::Events`] if the stream cannot
    /// be read, and other [`SnapshotError`]s if the store fails or the stored
    /// state does not decode to the recorded version.
    pub async fn restore_to_snapshot<A: AggregateRoot>(
        &self,
        aggregate: &A,
        events: &dyn EventRepository,
    ) -> Result<Option<A>, SnapshotError> {
        let Some(codec) = A::snapshot_codec() else {
            return Ok(None);
        };
        let Some(snapshot) = self
            .store
            .load(A::AGGREGATE_TYPE, aggregate.aggregate_id())
            .await?
        else {
            return Ok(None);
        };

        let expected = snapshot.version;
        if expected > 0 {
            let from_snapshot = events
                .load_events_after(aggregate.aggregate_id(), expected - 1)
                .await
                .map_err(SnapshotError::Events)?;
            let persisted = from_snapshot
                .first()
                .is_some_and(|event| event.sequence_number == expected);
            if !persisted {
                return Err(SnapshotError::AheadOfStream {
                    aggregate_id: aggregate.aggregate_id().clone(),
                    snapshot_version: expected,
                });
            }
        }

        let restored = codec.decode(snapshot.state).map_err(SnapshotError::Decode)?;
        if restored.version() != expected || restored.aggregate_id() != aggregate.aggregate_id() {
            return Err(SnapshotError::Inconsistent {
                aggregate_id: aggregate.aggregate_id().clone(),
                expected,
                found: restored.version(),
            });
        }

        tracing::trace!(
            aggregate_type = A::AGGREGATE_TYPE,
            aggregate_id = %aggregate.aggregate_id(),
            version = expected,
            "restored aggregate from snapshot"
        );
        Ok(Some(restored))
    }

    /// Persists the aggregate's committed state, regardless of policy.
    ///
    /// Returns [`SnapshotOutcome::Unsupported`] (not an error) when the type
    /// cannot be snapshotted.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if encoding or storage fails.
    pub async fn take_snapshot(
        &self,
        aggregate: &dyn EventSourced,
    ) -> Result<SnapshotOutcome, SnapshotError> {
        let Some(state) = aggregate.snapshot_state() else {
            return Ok(SnapshotOutcome::Unsupported);
        };
        let state = state.map_err(SnapshotError::Encode)?;
        let version = aggregate.committed_version();
        let snapshot = Snapshot {
            aggregate_type: aggregate.aggregate_type().to_owned(),
            aggregate_id: aggregate.stream_id().clone(),
            version,
            state,
            taken_at: self.clock.now(),
        };

        if self.store.save(snapshot).await? {
            Ok(SnapshotOutcome::Taken { version })
        } else {
            Ok(SnapshotOutcome::Declined)
        }
    }

    /// Takes a snapshot if the policy asks for one.
    ///
    /// Events since the last snapshot are measured against the stored
    /// snapshot's version, so a snapshot that failed earlier is retried on
    /// the next offer.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the store or encoding fails.
    pub async fn offer_snapshot(
        &self,
        aggregate: &dyn EventSourced,
    ) -> Result<SnapshotOutcome, SnapshotError> {
        if !aggregate.supports_snapshots() {
            return Ok(SnapshotOutcome::Unsupported);
        }
        if self.policy == SnapshotPolicy::Never {
            return Ok(SnapshotOutcome::Declined);
        }

        let last = self
            .store
            .latest_version(aggregate.aggregate_type(), aggregate.stream_id())
            .await?
            .unwrap_or(0);
        let events_since = u64::try_from(aggregate.committed_version() - last).unwrap_or(0);
        if events_since == 0 || !self.policy.should_snapshot(events_since) {
            return Ok(SnapshotOutcome::Declined);
        }

        self.take_snapshot(aggregate).await
    }

    /// Loads an aggregate: restores `blank` from its latest snapshot when
    /// possible, then replays the stream events after the snapshot.
    ///
    /// `blank` must be a fresh instance (version 0) carrying the aggregate's
    /// identifier. Snapshots that cannot be restored (unreadable, or ahead
    /// of the stream) are logged and ignored in favour of full replay.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Events`] or [`SnapshotError::Replay`] if the
    /// event stream cannot be read.
    pub async fn rehydrate<A: AggregateRoot>(
        &self,
        blank: A,
        events: &dyn EventRepository,
    ) -> Result<A, SnapshotError> {
        let restored = match self.restore_to_snapshot(&blank, events).await {
            Ok(restored) => restored,
            Err(SnapshotError::Events(e)) => return Err(SnapshotError::Events(e)),
            Err(e) => {
                tracing::warn!(
                    aggregate_id = %blank.aggregate_id(),
                    error = %e,
                    "failed to restore snapshot, falling back to full replay"
                );
                None
            }
        };

        let mut aggregate = restored.unwrap_or(blank);
        let tail = events
            .load_events_after(aggregate.aggregate_id(), aggregate.version())
            .await
            .map_err(SnapshotError::Events)?;
        aggregate.replay(&tail).map_err(SnapshotError::Replay)?;
        Ok(aggregate)
    }
}
