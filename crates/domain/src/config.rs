//! Configuration structures
//!
//! Every section deserializes with defaults so partial TOML/JSON files and
//! environment overrides compose cleanly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_CREDENTIAL_FILE, DEFAULT_KEYCHAIN_SERVICE,
    DEFAULT_REFRESH_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT, LOGIN_PATH,
    REFRESH_PATH, REGISTER_PATH,
};

/// Root application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Backend API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL without trailing slash (e.g., "https://api.dermalens.app")
    pub base_url: String,
    /// Transport-level timeout applied to every outgoing call
    pub request_timeout_secs: u64,
    /// Upper bound on a single refresh exchange
    pub refresh_timeout_secs: u64,
    /// Paths that never carry a credential and bypass the token gate
    pub bootstrap_paths: Vec<String>,
    pub user_agent: String,
}

impl ApiConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Join `path` onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            bootstrap_paths: vec![
                LOGIN_PATH.to_string(),
                REGISTER_PATH.to_string(),
                REFRESH_PATH.to_string(),
            ],
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Which durable store holds the credential triple
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Platform keychain (macOS Keychain, Windows Credential Manager, Secret
    /// Service)
    #[default]
    Keychain,
    /// JSON file with owner-only permissions
    File,
}

/// Credential storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Keychain service name
    pub service_name: String,
    /// Location of the credential file for the `file` backend
    pub file_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            service_name: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            file_path: PathBuf::from(DEFAULT_CREDENTIAL_FILE),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
