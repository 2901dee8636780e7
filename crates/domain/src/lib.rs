//! # Dermalens Domain
//!
//! Domain types shared by every Dermalens crate.
//!
//! This crate contains:
//! - Credential and auth wire types (login, refresh)
//! - The persisted storage-key layout
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Dermalens crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
