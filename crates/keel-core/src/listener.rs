//! Event listener abstraction.
//!
//! Listeners cover both projections (which consume a stream indefinitely)
//! and process managers (which must be started by a recognised first event
//! and may complete). Each listener owns the in-memory copy of its
//! [`Subscription`]; the replay driver in [`crate::subscription`] advances it
//! and the unit of work persists it.

use std::fmt;

use crate::error::DomainError;
use crate::identity::Identifier;
use crate::object::AsAny;
use crate::repository::StoredEvent;
use crate::subscription::Subscription;

/// A consumer of stored events with a durable bookmark.
pub trait EventListener: AsAny + Send + Sync + fmt::Debug {
    /// The listener's subscription (cursor, completion flag).
    fn subscription(&self) -> &Subscription;

    /// Mutable access for the replay driver.
    fn subscription_mut(&mut self) -> &mut Subscription;

    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Returns an error when the event cannot be processed; the cursor is
    /// then left where it was so the event is delivered again.
    fn handle(&mut self, event: &StoredEvent) -> Result<(), DomainError>;

    /// Returns the listener identifier.
    fn listener_id(&self) -> &Identifier {
        self.subscription().listener_id()
    }

    /// Whether this listener wants events of `event_type` handed to
    /// [`handle`](EventListener::handle). Other events only move the cursor.
    fn interested_in(&self, event_type: &str) -> bool {
        let _ = event_type;
        true
    }

    /// Event types allowed to be the first event this listener handles.
    ///
    /// `None` (the default) accepts any first event. Process managers return
    /// the events that start them.
    fn starting_event_types(&self) -> Option<&'static [&'static str]> {
        None
    }

    /// Whether the listener holds state that has not been saved.
    ///
    /// Defaults to "the subscription moved since it was last saved".
    fn has_pending_state(&self) -> bool {
        self.subscription().is_dirty()
    }

    /// Called after the subscription has been persisted.
    fn mark_state_saved(&mut self) {
        self.subscription_mut().mark_saved();
    }
}
