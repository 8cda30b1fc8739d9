//! Capability check for objects handed to the unit of work.
//!
//! A [`DomainObject`] declares what it can do by converting itself into a
//! [`Capability`]. The unit of work stores the accepted ones as a
//! [`TrackedObject`], so commit can dispatch on the variant instead of
//! inspecting types at runtime.

use std::any::Any;
use std::fmt;

use crate::aggregate::AggregateRoot;
use crate::identity::Identifier;
use crate::listener::EventListener;
use crate::repository::StoredEvent;

/// Type-erased access to the concrete value behind a trait object.
pub trait AsAny: Any {
    /// Get the value as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Get the value as mutable `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Convert the boxed value into a boxed `Any`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Object-safe view of an [`AggregateRoot`], implemented for every aggregate.
pub trait EventSourced: AsAny + Send + Sync + fmt::Debug {
    /// Stable aggregate type name.
    fn aggregate_type(&self) -> &'static str;

    /// Identifier of the aggregate's event stream.
    fn stream_id(&self) -> &Identifier;

    /// Version of the last persisted event.
    fn committed_version(&self) -> i64;

    /// Number of events recorded but not yet persisted.
    fn pending_event_count(&self) -> usize;

    /// Flattens the pending events into their stored form.
    ///
    /// # Errors
    ///
    /// Returns the serializer error of the first event that fails to encode.
    fn pending_events(&self) -> Result<Vec<StoredEvent>, serde_json::Error>;

    /// Applies and clears the pending events after they were persisted.
    fn mark_committed(&mut self);

    /// Whether the aggregate type declares a snapshot codec.
    fn supports_snapshots(&self) -> bool;

    /// Current state for a snapshot, or `None` when the type does not
    /// support snapshotting.
    fn snapshot_state(&self) -> Option<Result<serde_json::Value, serde_json::Error>>;
}

impl<A: AggregateRoot> EventSourced for A {
    fn aggregate_type(&self) -> &'static str {
        A::AGGREGATE_TYPE
    }

    fn stream_id(&self) -> &Identifier {
        self.aggregate_id()
    }

    fn committed_version(&self) -> i64 {
        self.version()
    }

    fn pending_event_count(&self) -> usize {
        self.uncommitted_events().len()
    }

    fn pending_events(&self) -> Result<Vec<StoredEvent>, serde_json::Error> {
        self.uncommitted_events()
            .iter()
            .map(StoredEvent::from_event)
            .collect()
    }

    fn mark_committed(&mut self) {
        let pending = self.uncommitted_events().to_vec();
        for event in &pending {
            self.apply(event);
        }
        self.clear_uncommitted_events();
    }

    fn supports_snapshots(&self) -> bool {
        A::snapshot_codec().is_some()
    }

    fn snapshot_state(&self) -> Option<Result<serde_json::Value, serde_json::Error>> {
        A::snapshot_codec().map(|codec| codec.encode(self))
    }
}

/// What an object handed to the unit of work is able to do.
pub enum Capability {
    /// An event-sourced aggregate root.
    Aggregate(Box<dyn EventSourced>),
    /// An event listener (projection or process manager).
    Listener(Box<dyn EventListener>),
    /// Neither; the object is returned for diagnostics.
    Unsupported(Box<dyn fmt::Debug + Send + Sync>),
}

/// Any object that may be offered to the unit of work.
///
/// The default implementation reports the object as unsupported. Aggregates
/// and listeners override it:
///
/// ```ignore
/// impl DomainObject for Inventory {
///     fn into_capability(self: Box<Self>) -> Capability {
///         Capability::Aggregate(self)
///     }
/// }
/// ```
pub trait DomainObject: fmt::Debug + Send + Sync + 'static {
    /// Converts the object into the capability it supports.
    fn into_capability(self: Box<Self>) -> Capability
    where
        Self: Sized,
    {
        Capability::Unsupported(self)
    }
}

/// Discriminant of a [`TrackedObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// See [`TrackedObject::Aggregate`].
    Aggregate,
    /// See [`TrackedObject::Listener`].
    Listener,
}

/// An object accepted by the unit of work.
#[derive(Debug)]
pub enum TrackedObject {
    /// An aggregate whose pending events are appended on commit.
    Aggregate(Box<dyn EventSourced>),
    /// A listener whose subscription is saved on commit.
    Listener(Box<dyn EventListener>),
}

impl TrackedObject {
    /// Identity of the tracked object.
    #[must_use]
    pub fn identifier(&self) -> &Identifier {
        match self {
            Self::Aggregate(aggregate) => aggregate.stream_id(),
            Self::Listener(listener) => listener.listener_id(),
        }
    }

    /// Which variant this is.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Aggregate(_) => ObjectKind::Aggregate,
            Self::Listener(_) => ObjectKind::Listener,
        }
    }

    /// Whether committing this object would persist anything.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        match self {
            Self::Aggregate(aggregate) => aggregate.pending_event_count() > 0,
            Self::Listener(listener) => listener.has_pending_state(),
        }
    }

    /// Borrows the concrete object if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Aggregate(aggregate) => (**aggregate).as_any().downcast_ref(),
            Self::Listener(listener) => (**listener).as_any().downcast_ref(),
        }
    }

    /// Mutably borrows the concrete object if it is a `T`.
    #[must_use]
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        match self {
            Self::Aggregate(aggregate) => (**aggregate).as_any_mut().downcast_mut(),
            Self::Listener(listener) => (**listener).as_any_mut().downcast_mut(),
        }
    }

    /// Takes the concrete object out if it is a `T`, otherwise hands `self`
    /// back unchanged.
    ///
    /// # Errors
    ///
    /// Returns `self` when the object is not a `T`.
    pub fn downcast<T: Any>(self) -> Result<Box<T>, Self> {
        if self.downcast_ref::<T>().is_none() {
            return Err(self);
        }
        let any = match self {
            Self::Aggregate(aggregate) => aggregate.into_any(),
            Self::Listener(listener) => listener.into_any(),
        };
        Ok(any
            .downcast::<T>()
            .unwrap_or_else(|_| unreachable!("type checked above")))
    }
}
