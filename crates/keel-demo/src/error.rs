//! Keel demo: application error types.

use keel_core::error::DomainError;
use keel_core::snapshot::SnapshotError;
use keel_core::subscription::{DeliveryError, SubscriptionError};
use keel_core::unit_of_work::{CommitError, ObjectNotSupported};
use thiserror::Error;

/// Startup and runtime errors for the demo.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A command was rejected by the domain.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An object could not be tracked.
    #[error(transparent)]
    Unsupported(#[from] ObjectNotSupported),

    /// Committing the unit of work failed.
    #[error("commit failed: {0}")]
    Commit(#[from] CommitError),

    /// Loading an aggregate failed.
    #[error("rehydration failed: {0}")]
    Rehydrate(#[from] SnapshotError),

    /// Replaying events to a listener failed.
    #[error("replay failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// A subscription could not be read.
    #[error("subscription error: {0}")]
    Subscription(#[from] SubscriptionError),
}

#[cfg(test)]
mod tests {
    use keel_core::identity::Identifier;

    use super::*;

    #[test]
    fn test_domain_errors_are_transparent() {
        let err = AppError::from(DomainError::Validation("bad input".into()));

        assert_eq!(err.to_string(), "validation error: bad input");
    }

    #[test]
    fn test_commit_errors_name_the_object() {
        let err = AppError::from(CommitError::Persistence {
            identifier: Identifier::new("warehouse-1"),
            source: DomainError::Infrastructure("disk full".into()),
        });

        assert!(err.to_string().contains("warehouse-1"));
    }
}
