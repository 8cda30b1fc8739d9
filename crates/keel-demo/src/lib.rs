//! Keel demo: a small inventory domain wired to the in-memory stores.
//!
//! The library half holds the configuration, error type, domain and the
//! [`app::Engine`] that drives commands and projections through the unit of
//! work; `main.rs` only sets up logging and runs a scripted session.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
