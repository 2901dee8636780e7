//! Test doubles for the session ports
//!
//! Available to this crate's tests and, behind the `test-utils` feature, to
//! downstream crates.

pub mod mocks;

pub use mocks::{MemoryCredentialStore, ScriptedRefresher};
