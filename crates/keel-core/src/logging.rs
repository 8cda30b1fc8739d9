//! Structured logging decorator for listeners.

use crate::error::DomainError;
use crate::identity::Identifier;
use crate::listener::EventListener;
use crate::object::{Capability, DomainObject};
use crate::repository::StoredEvent;
use crate::subscription::Subscription;

/// Wraps a listener and reports every handled event through `tracing`.
///
/// The wrapper only observes: results, cursor movement and filtering are
/// those of the inner listener.
#[derive(Debug)]
pub struct LoggingListener<L> {
    inner: L,
}

impl<L: EventListener> LoggingListener<L> {
    /// Decorates `inner`.
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    /// The wrapped listener.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Mutable access to the wrapped listener.
    pub fn inner_mut(&mut self) -> &mut L {
        &mut self.inner
    }

    /// Unwraps the decorator.
    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: EventListener> EventListener for LoggingListener<L> {
    fn subscription(&self) -> &Subscription {
        self.inner.subscription()
    }

    fn subscription_mut(&mut self) -> &mut Subscription {
        self.inner.subscription_mut()
    }

    fn handle(&mut self, event: &StoredEvent) -> Result<(), DomainError> {
        let span = tracing::debug_span!(
            "listener.handle",
            listener_id = %self.inner.listener_id(),
            event_type = %event.event_type,
            position = event.position,
        );
        let _entered = span.enter();

        let result = self.inner.handle(event);
        match &result {
            Ok(()) => tracing::debug!("event handled"),
            Err(e) => tracing::warn!(error = %e, "listener failed to handle event"),
        }
        result
    }

    fn listener_id(&self) -> &Identifier {
        self.inner.listener_id()
    }

    fn interested_in(&self, event_type: &str) -> bool {
        let interested = self.inner.interested_in(event_type);
        if !interested {
            tracing::trace!(
                listener_id = %self.inner.listener_id(),
                event_type,
                "event filtered out"
            );
        }
        interested
    }

    fn starting_event_types(&self) -> Option<&'static [&'static str]> {
        self.inner.starting_event_types()
    }

    fn has_pending_state(&self) -> bool {
        self.inner.has_pending_state()
    }

    fn mark_state_saved(&mut self) {
        self.inner.mark_state_saved();
        tracing::debug!(
            listener_id = %self.inner.listener_id(),
            position = self.inner.subscription().position(),
            "subscription saved"
        );
    }
}

impl<L: EventListener> DomainObject for LoggingListener<L> {
    fn into_capability(self: Box<Self>) -> Capability {
        Capability::Listener(self)
    }
}
