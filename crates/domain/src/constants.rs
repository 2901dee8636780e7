//! Application constants
//!
//! Centralized location for domain-level constants: endpoint paths, default
//! timeouts and the environment variable prefix.

// Auth bootstrap endpoints (never carry a bearer credential)
pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REFRESH_PATH: &str = "/auth/refresh";

// Timeouts
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

// Defaults
pub const DEFAULT_API_BASE_URL: &str = "https://api.dermalens.app";
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "Dermalens.session";
pub const DEFAULT_CREDENTIAL_FILE: &str = "dermalens-credentials.json";
pub const DEFAULT_USER_AGENT: &str = concat!("dermalens/", env!("CARGO_PKG_VERSION"));

/// Prefix shared by every configuration environment variable.
pub const ENV_PREFIX: &str = "DERMALENS_";
