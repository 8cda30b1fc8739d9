//! Keel Core: unit of work and snapshotting engine.
//!
//! This crate defines the identity kernel, the aggregate and listener
//! capabilities, and the engine that tracks them during one logical
//! operation: the [`unit_of_work::UnitOfWork`], the
//! [`snapshot::Snapshotter`] and the subscription contract used by replay.
//! It contains no infrastructure code; storage backends live in other crates.

pub mod aggregate;
pub mod clock;
pub mod convert;
pub mod error;
pub mod event;
pub mod identity;
pub mod listener;
pub mod logging;
pub mod object;
pub mod repository;
pub mod snapshot;
pub mod subscription;
pub mod unit_of_work;
