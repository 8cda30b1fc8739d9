//! Identity kernel.
//!
//! [`Identifier`] is the key type for every map in the engine. Equality is
//! structural: two identifiers with the same text are interchangeable.
//! Identifiers are minted through an [`IdentifierFactory`] so that tests and
//! replays can substitute a deterministic source.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable, value-typed identifier for aggregates, listeners and streams.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Wraps a string as an identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the owned text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for Identifier {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of new identifiers.
///
/// In production this wraps random UUID generation. In tests and replays a
/// sequence-backed implementation is injected so event ids are reproducible.
pub trait IdentifierFactory: Send + Sync {
    /// Returns a new, unique UUID.
    fn new_uuid(&self) -> Uuid;

    /// Returns a UUID derived deterministically from `namespace` and `name`.
    ///
    /// The same inputs always produce the same output, across processes.
    fn named_uuid(&self, namespace: &Uuid, name: &str) -> Uuid {
        Uuid::new_v5(namespace, name.as_bytes())
    }

    /// Returns a new, unique identifier.
    fn generate(&self) -> Identifier {
        Identifier::from(self.new_uuid())
    }

    /// Returns the identifier derived from `namespace` and `name`.
    fn generate_named(&self, namespace: &Uuid, name: &str) -> Identifier {
        Identifier::from(self.named_uuid(namespace, name))
    }
}

/// Production factory: random v4 UUIDs, v5 for named identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdentifierFactory;

impl IdentifierFactory for UuidIdentifierFactory {
    fn new_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}
