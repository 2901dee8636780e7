//! # Dermalens Core
//!
//! Session lifecycle logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for credential storage and token refresh
//! - The token gate, pre-refresh coordinator and refresh queue
//! - The session terminator and auth-changed notification channel
//! - [`SessionController`], the single instance tying them together
//!
//! ## Architecture Principles
//! - Only depends on `dermalens-domain`
//! - No HTTP, keychain or filesystem code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod session;

// Testing utilities
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use session::ports::{CredentialStore, TokenRefresher};
pub use session::{
    AuthEvent, AuthEvents, GateState, ListenerId, PreRefreshState, RefreshFailure,
    SessionConfig, SessionController,
};
