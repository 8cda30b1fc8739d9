//! Subscription registry doubles.

use async_trait::async_trait;
use keel_core::error::DomainError;
use keel_core::identity::Identifier;
use keel_core::subscription::{Subscription, SubscriptionError, SubscriptionRegistry};

/// A registry that loads fresh subscriptions but refuses every save.
#[derive(Debug)]
pub struct FailingSubscriptionRegistry;

#[async_trait]
impl SubscriptionRegistry for FailingSubscriptionRegistry {
    async fn load(&self, listener_id: &Identifier) -> Result<Subscription, SubscriptionError> {
        Ok(Subscription::new(listener_id.clone()))
    }

    async fn save(&self, _subscription: &Subscription) -> Result<(), SubscriptionError> {
        Err(DomainError::Infrastructure("subscription registry offline".into()).into())
    }
}
