//! # Dermalens Infrastructure
//!
//! Infrastructure implementations of the session core ports.
//!
//! This crate contains:
//! - The authenticated API client and the auth bootstrap endpoints
//! - The HTTP transport
//! - Credential store backends (platform keychain, JSON file)
//! - Configuration loading and logging setup
//!
//! ## Architecture
//! - Implements traits defined in `dermalens-core`
//! - Depends on `dermalens-domain` and `dermalens-core`
//! - Contains all "impure" code (network, keychain, filesystem)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod stack;
pub mod storage;

// Re-export commonly used items
pub use api::{
    ApiClient, ApiError, ApiErrorCategory, ApiRequest, ApiResponse, AuthApi, HttpTokenRefresher,
    MultipartPart,
};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::init_tracing;
pub use stack::SessionStack;
pub use storage::{open_credential_store, FileCredentialStore, KeychainCredentialStore};
