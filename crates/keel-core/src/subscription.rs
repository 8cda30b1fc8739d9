//! Listener subscriptions and the replay driver.
//!
//! A [`Subscription`] is a listener's durable bookmark into the global event
//! log. The cursor only moves forward and only past events the listener has
//! been shown. [`deliver`] is the single step of replay; [`catch_up`] pulls
//! batches from an [`EventRepository`] and delivers them in order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DomainError;
use crate::identity::Identifier;
use crate::listener::EventListener;
use crate::repository::{EventRepository, StoredEvent};

/// A listener's position in the global event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    listener_id: Identifier,
    position: u64,
    handled: u64,
    completed: bool,
    #[serde(skip)]
    dirty: bool,
}

impl Subscription {
    /// A fresh subscription at the start of the log.
    #[must_use]
    pub fn new(listener_id: Identifier) -> Self {
        Self {
            listener_id,
            position: 0,
            handled: 0,
            completed: false,
            dirty: false,
        }
    }

    /// The subscribed listener.
    #[must_use]
    pub fn listener_id(&self) -> &Identifier {
        &self.listener_id
    }

    /// Global position of the last event shown to the listener.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of events the listener actually handled.
    #[must_use]
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Whether the listener has handled at least one event.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.handled > 0
    }

    /// Whether the listener finished (one-shot process managers).
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether the subscription changed since it was last saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the event at `position` should be shown to the listener.
    #[must_use]
    pub fn should_deliver(&self, position: u64) -> bool {
        !self.completed && position > self.position
    }

    /// Moves the cursor forward to `position`.
    ///
    /// Advancing to the current position is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::CursorRegression`] if `position` is
    /// behind the cursor.
    pub fn advance(&mut self, position: u64) -> Result<(), SubscriptionError> {
        if position < self.position {
            return Err(SubscriptionError::CursorRegression {
                listener_id: self.listener_id.clone(),
                recorded: self.position,
                attempted: position,
            });
        }
        if position > self.position {
            self.position = position;
            self.dirty = true;
        }
        Ok(())
    }

    /// Marks the listener as finished; no further events are delivered.
    pub fn complete(&mut self) {
        if !self.completed {
            self.completed = true;
            self.dirty = true;
        }
    }

    /// Clears the unsaved-changes flag.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Copy of this subscription as it would be read back after saving.
    #[must_use]
    pub fn to_saved(&self) -> Self {
        Self {
            dirty: false,
            ..self.clone()
        }
    }

    fn record_handled(&mut self, position: u64) {
        self.position = position;
        self.handled += 1;
        self.dirty = true;
    }
}

/// Errors raised by subscriptions and their registries.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The cursor would move backwards.
    #[error("subscription {listener_id} is at position {recorded}, refusing to move back to {attempted}")]
    CursorRegression {
        /// The listener whose cursor was moved.
        listener_id: Identifier,
        /// The position currently recorded.
        recorded: u64,
        /// The rejected position.
        attempted: u64,
    },

    /// The registry's storage failed.
    #[error("subscription store error: {0}")]
    Store(#[from] DomainError),
}

/// Durable store of subscriptions, keyed by listener identity.
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// Returns the recorded subscription, or a fresh one at position 0.
    async fn load(&self, listener_id: &Identifier) -> Result<Subscription, SubscriptionError>;

    /// Records the subscription.
    ///
    /// Implementations must reject a position behind the recorded one with
    /// [`SubscriptionError::CursorRegression`], and must keep a recorded
    /// completion even if the saved copy is not completed.
    async fn save(&self, subscription: &Subscription) -> Result<(), SubscriptionError>;
}

/// Replaces the listener's in-memory subscription with the recorded one when
/// the record is further along, so a restarted listener resumes where it
/// stopped.
///
/// # Errors
///
/// Returns the registry's error.
pub async fn resume(
    listener: &mut dyn EventListener,
    registry: &dyn SubscriptionRegistry,
) -> Result<(), SubscriptionError> {
    let recorded = registry.load(listener.listener_id()).await?;
    let current = listener.subscription();
    let further = recorded.position() > current.position()
        || (recorded.is_completed() && !current.is_completed());
    if further {
        *listener.subscription_mut() = recorded.to_saved();
    }
    Ok(())
}

/// Outcome of offering one event to a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The listener handled the event and the cursor moved.
    Handled,
    /// The listener is not interested; the cursor moved without handling.
    Ignored,
    /// The event is at or before the cursor, or the listener completed.
    Skipped,
}

/// Errors raised while delivering events to a listener.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A listener with starting event types was first shown another event.
    #[error("listener {listener_id} cannot start with `{event_type}`, expected one of {expected:?}")]
    InvalidFirstEventGiven {
        /// The listener.
        listener_id: Identifier,
        /// The offending event type.
        event_type: String,
        /// The accepted starting event types.
        expected: &'static [&'static str],
    },

    /// The listener failed to handle the event.
    #[error("listener {listener_id} failed at position {position}: {source}")]
    Handler {
        /// The listener.
        listener_id: Identifier,
        /// Position of the event that failed.
        position: u64,
        /// The listener's error.
        #[source]
        source: DomainError,
    },

    /// Loading events for replay failed.
    #[error("failed to load events for replay: {0}")]
    Load(#[source] DomainError),
}

/// Offers one event to a listener.
///
/// The cursor is only moved after the listener handled the event (or
/// declined interest in it); on error it is left untouched so the event can
/// be delivered again.
///
/// # Errors
///
/// Returns [`DeliveryError::InvalidFirstEventGiven`] or
/// [`DeliveryError::Handler`].
pub fn deliver(
    listener: &mut dyn EventListener,
    event: &StoredEvent,
) -> Result<Delivery, DeliveryError> {
    if !listener.subscription().should_deliver(event.position) {
        return Ok(Delivery::Skipped);
    }

    if !listener.interested_in(&event.event_type) {
        let subscription = listener.subscription_mut();
        subscription.position = event.position;
        subscription.dirty = true;
        return Ok(Delivery::Ignored);
    }

    let first = !listener.subscription().has_started();
    match listener.starting_event_types() {
        Some(expected) if first && !expected.contains(&event.event_type.as_str()) => {
            return Err(DeliveryError::InvalidFirstEventGiven {
                listener_id: listener.listener_id().clone(),
                event_type: event.event_type.clone(),
                expected,
            });
        }
        _ => {}
    }

    if let Err(source) = listener.handle(event) {
        return Err(DeliveryError::Handler {
            listener_id: listener.listener_id().clone(),
            position: event.position,
            source,
        });
    }
    listener.subscription_mut().record_handled(event.position);
    Ok(Delivery::Handled)
}

/// Delivers every stored event after the listener's cursor, in batches of
/// `batch_size`, stopping at the first failure or when the listener
/// completes. Returns the number of events handled.
///
/// # Errors
///
/// Returns the first [`DeliveryError`]; events delivered before it keep
/// their effect on the cursor.
pub async fn catch_up(
    listener: &mut dyn EventListener,
    events: &dyn EventRepository,
    batch_size: usize,
) -> Result<usize, DeliveryError> {
    let batch_size = batch_size.max(1);
    let mut handled = 0;

    while !listener.subscription().is_completed() {
        let batch = events
            .load_all_after(listener.subscription().position(), batch_size)
            .await
            .map_err(DeliveryError::Load)?;
        let fetched = batch.len();

        for event in &batch {
            if deliver(listener, event)? == Delivery::Handled {
                handled += 1;
            }
        }

        if fetched < batch_size {
            break;
        }
    }

    tracing::debug!(
        listener_id = %listener.listener_id(),
        position = listener.subscription().position(),
        handled,
        "listener caught up"
    );
    Ok(handled)
}
