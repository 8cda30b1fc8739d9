//! Deterministic identifier factory for tests.

use std::sync::atomic::{AtomicU64, Ordering};

use keel_core::identity::IdentifierFactory;
use uuid::Uuid;

/// Hands out `00000000-0000-0000-0000-000000000001`, `...002` and so on.
#[derive(Debug, Default)]
pub struct SequenceIdentifierFactory {
    next: AtomicU64,
}

impl SequenceIdentifierFactory {
    /// Creates a factory whose first UUID is `Uuid::from_u128(1)`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentifierFactory for SequenceIdentifierFactory {
    fn new_uuid(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Uuid::from_u128(u128::from(n))
    }
}
