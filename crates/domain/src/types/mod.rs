//! Domain types and models

pub mod auth;
pub mod credential;

pub use auth::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, RefreshedTokens};
pub use credential::{Credential, StorageKey};
