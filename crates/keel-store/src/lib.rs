//! In-memory reference stores for the Keel engine.
//!
//! Every store is `Send + Sync`, guards its state with a `std::sync::RwLock`
//! and never holds a lock across an `.await`. Poisoned locks surface as
//! [`DomainError::Infrastructure`](keel_core::error::DomainError).

pub mod event_repository;
pub mod snapshot_store;
pub mod subscription_registry;

pub use event_repository::InMemoryEventRepository;
pub use snapshot_store::InMemorySnapshotStore;
pub use subscription_registry::InMemorySubscriptionRegistry;
