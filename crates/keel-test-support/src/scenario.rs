//! Given/When/Then harness for aggregate unit tests.
//!
//! ```ignore
//! Scenario::given(Inventory::new(id), &[stocked(id, 1, 10)])
//!     .when(|inv| inv.remove_stock(4, correlation, &clock))
//!     .then_expect_event_types(&["inventory.stock_removed"]);
//! ```
//!
//! History events are applied directly; the command runs against the
//! rehydrated aggregate and its recorded (uncommitted) events are asserted.

use std::fmt;

use keel_core::aggregate::AggregateRoot;
use keel_core::error::DomainError;
use keel_core::event::DomainEvent;

/// An aggregate rebuilt from prior events, ready for one command.
#[derive(Debug)]
pub struct Scenario<A> {
    aggregate: A,
}

impl<A: AggregateRoot> Scenario<A> {
    /// Starts a scenario by applying `history` to `blank` in order.
    #[must_use]
    pub fn given(mut blank: A, history: &[A::Event]) -> Self {
        for event in history {
            blank.apply(event);
        }
        Self { aggregate: blank }
    }

    /// Applies more history.
    #[must_use]
    pub fn and(mut self, history: &[A::Event]) -> Self {
        for event in history {
            self.aggregate.apply(event);
        }
        self
    }

    /// Runs a command against the aggregate.
    pub fn when<F>(mut self, command: F) -> Outcome<A>
    where
        F: FnOnce(&mut A) -> Result<(), DomainError>,
    {
        let result = command(&mut self.aggregate);
        Outcome {
            aggregate: self.aggregate,
            result,
        }
    }
}

/// Result of [`Scenario::when`], with assertion helpers.
pub struct Outcome<A> {
    aggregate: A,
    result: Result<(), DomainError>,
}

impl<A: fmt::Debug> fmt::Debug for Outcome<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("aggregate", &self.aggregate)
            .field("result", &self.result)
            .finish()
    }
}

impl<A: AggregateRoot> Outcome<A> {
    /// Asserts the command succeeded and recorded events of exactly these
    /// types, in order.
    ///
    /// # Panics
    ///
    /// Panics if the command failed or the event types differ.
    #[track_caller]
    pub fn then_expect_event_types(self, expected: &[&str]) -> A {
        if let Err(error) = &self.result {
            panic!("Expected events but got error: {error}");
        }
        let actual: Vec<&str> = self
            .aggregate
            .uncommitted_events()
            .iter()
            .map(DomainEvent::event_type)
            .collect();
        assert_eq!(actual, expected, "recorded event types differ");
        self.aggregate
    }

    /// Asserts the command succeeded and recorded events with exactly these
    /// payloads, in order.
    ///
    /// # Panics
    ///
    /// Panics if the command failed, a payload cannot be encoded, or the
    /// payloads differ.
    #[track_caller]
    pub fn then_expect_payloads(self, expected: &[serde_json::Value]) -> A {
        if let Err(error) = &self.result {
            panic!("Expected events but got error: {error}");
        }
        let actual: Vec<serde_json::Value> = self
            .aggregate
            .uncommitted_events()
            .iter()
            .map(|event| event.to_payload().unwrap())
            .collect();
        assert_eq!(actual, expected, "recorded payloads differ");
        self.aggregate
    }

    /// Asserts the command succeeded without recording anything.
    ///
    /// # Panics
    ///
    /// Panics if the command failed or recorded events.
    #[track_caller]
    pub fn then_expect_no_events(self) -> A {
        self.then_expect_event_types(&[])
    }

    /// Asserts the command failed and recorded nothing.
    ///
    /// # Panics
    ///
    /// Panics if the command succeeded or recorded events.
    #[track_caller]
    pub fn then_expect_error(self) -> DomainError {
        let pending = self.aggregate.uncommitted_events().len();
        match self.result {
            Ok(()) => panic!("Expected error but got {pending} recorded event(s)"),
            Err(error) => {
                assert_eq!(pending, 0, "failed command must not record events");
                error
            }
        }
    }

    /// Asserts the command failed with a message containing
    /// `expected_substring`.
    ///
    /// # Panics
    ///
    /// Panics if the command succeeded or the message does not match.
    #[track_caller]
    pub fn then_expect_error_message(self, expected_substring: &str) {
        let message = self.then_expect_error().to_string();
        assert!(
            message.contains(expected_substring),
            "Expected error message to contain '{expected_substring}' but got: {message}"
        );
    }

    /// Raw command result and aggregate, for custom assertions.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub fn inspect_result(self) -> Result<A, DomainError> {
        self.result.map(|()| self.aggregate)
    }
}
