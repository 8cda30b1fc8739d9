//! In-memory implementation of the `SubscriptionRegistry` trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use keel_core::error::DomainError;
use keel_core::identity::Identifier;
use keel_core::subscription::{Subscription, SubscriptionError, SubscriptionRegistry};

/// Subscription registry keyed by listener identity.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionRegistry {
    subscriptions: RwLock<HashMap<Identifier, Subscription>>,
}

impl InMemorySubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRegistry for InMemorySubscriptionRegistry {
    #[tracing::instrument(skip(self, listener_id), fields(listener_id = %listener_id))]
    async fn load(&self, listener_id: &Identifier) -> Result<Subscription, SubscriptionError> {
        let subscriptions = self
            .subscriptions
            .read()
            .map_err(|_| DomainError::poisoned("subscription registry"))?;
        Ok(subscriptions
            .get(listener_id)
            .cloned()
            .unwrap_or_else(|| Subscription::new(listener_id.clone())))
    }

    #[tracing::instrument(
        skip(self, subscription),
        fields(listener_id = %subscription.listener_id(), position = subscription.position())
    )]
    async fn save(&self, subscription: &Subscription) -> Result<(), SubscriptionError> {
        let mut subscriptions = self
            .subscriptions
            .write()
            .map_err(|_| DomainError::poisoned("subscription registry"))?;

        let mut saved = subscription.to_saved();
        if let Some(recorded) = subscriptions.get(subscription.listener_id()) {
            if subscription.position() < recorded.position() {
                return Err(SubscriptionError::CursorRegression {
                    listener_id: subscription.listener_id().clone(),
                    recorded: recorded.position(),
                    attempted: subscription.position(),
                });
            }
            // Completion is final.
            if recorded.is_completed() && !saved.is_completed() {
                tracing::debug!("keeping recorded completion");
                saved.complete();
                saved.mark_saved();
            }
        }

        subscriptions.insert(subscription.listener_id().clone(), saved);
        Ok(())
    }
}
