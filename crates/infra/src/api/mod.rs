//! Backend API access
//!
//! [`ApiClient`] runs every call through the session: protected endpoints
//! wait for the token gate and carry the bearer credential, and a 401 is
//! recovered through the shared single-flight refresh and retried once.
//! [`AuthApi`] and [`HttpTokenRefresher`] cover the bootstrap endpoints.

pub mod auth;
pub mod client;
pub mod errors;
pub mod request;

pub use auth::{AuthApi, HttpTokenRefresher};
pub use client::{ApiClient, ApiClientBuilder, ApiResponse};
pub use errors::{ApiError, ApiErrorCategory};
pub use request::{ApiRequest, EndpointKind, EndpointPolicy, MultipartPart, RequestBody};
