//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment when one is present
//! 2. Attempts to load from `DERMALENS_*` environment variables
//! 3. If `DERMALENS_API_BASE_URL` is unset, falls back to a config file
//! 4. Probes multiple paths for config files (JSON and TOML)
//!
//! ## Environment Variables
//! - `DERMALENS_API_BASE_URL`: Backend base URL (required)
//! - `DERMALENS_REQUEST_TIMEOUT_SECS`: Per-request timeout
//! - `DERMALENS_REFRESH_TIMEOUT_SECS`: Refresh exchange timeout
//! - `DERMALENS_USER_AGENT`: User agent sent with every call
//! - `DERMALENS_STORAGE_BACKEND`: `keychain` or `file`
//! - `DERMALENS_KEYCHAIN_SERVICE`: Keychain service name
//! - `DERMALENS_CREDENTIAL_FILE`: Credential file for the `file` backend
//! - `DERMALENS_LOG_LEVEL`: Default log filter
//! - `DERMALENS_LOG_JSON`: JSON log output (true/false)
//!
//! ## File Locations
//! The loader probes `config.{json,toml}` and `dermalens.{json,toml}` in the
//! working directory, its two parents, and next to the executable.

use std::path::{Path, PathBuf};

use dermalens_domain::constants::{ENV_PREFIX, LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use dermalens_domain::{ApiConfig, Config, DermalensError, Result, StorageBackend};

use crate::api::{EndpointKind, EndpointPolicy};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `DermalensError::Config` if configuration cannot be loaded from
/// either source or fails validation.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only the base URL is required; every other setting keeps its default when
/// its variable is unset.
///
/// # Errors
/// Returns `DermalensError::Config` if the base URL is missing or a value is
/// invalid.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    config.api.base_url = env_var("API_BASE_URL")?;

    if let Some(secs) = env_parse::<u64>("REQUEST_TIMEOUT_SECS")? {
        config.api.request_timeout_secs = secs;
    }
    if let Some(secs) = env_parse::<u64>("REFRESH_TIMEOUT_SECS")? {
        config.api.refresh_timeout_secs = secs;
    }
    if let Some(agent) = env_opt("USER_AGENT") {
        config.api.user_agent = agent;
    }

    if let Some(backend) = env_opt("STORAGE_BACKEND") {
        config.storage.backend = parse_backend(&backend)?;
    }
    if let Some(service) = env_opt("KEYCHAIN_SERVICE") {
        config.storage.service_name = service;
    }
    if let Some(file) = env_opt("CREDENTIAL_FILE") {
        config.storage.file_path = PathBuf::from(file);
    }

    if let Some(level) = env_opt("LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("LOG_JSON", config.logging.json);

    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `DermalensError::Config` if no file is found, the format is
/// invalid or validation fails.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DermalensError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DermalensError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DermalensError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `DermalensError::Config` if format is invalid or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DermalensError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DermalensError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(DermalensError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.json", "config.toml", "dermalens.json", "dermalens.toml"];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join("..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn validate(config: &Config) -> Result<()> {
    validate_api(&config.api)?;
    if config.storage.backend == StorageBackend::Keychain && config.storage.service_name.is_empty()
    {
        return Err(DermalensError::Config("Keychain service name must not be empty".into()));
    }
    Ok(())
}

fn validate_api(api: &ApiConfig) -> Result<()> {
    let url = url::Url::parse(&api.base_url)
        .map_err(|e| DermalensError::Config(format!("Invalid API base URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DermalensError::Config(format!(
            "API base URL must be http or https, got {}",
            url.scheme()
        )));
    }
    if api.request_timeout_secs == 0 || api.refresh_timeout_secs == 0 {
        return Err(DermalensError::Config("Timeouts must be at least one second".into()));
    }

    let policy = EndpointPolicy::new(api.bootstrap_paths.clone());
    if let Some(path) = [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH]
        .into_iter()
        .find(|path| policy.classify(path) != EndpointKind::AuthBootstrap)
    {
        return Err(DermalensError::Config(format!("bootstrap_paths must cover {path}")));
    }
    Ok(())
}

fn parse_backend(value: &str) -> Result<StorageBackend> {
    match value.to_ascii_lowercase().as_str() {
        "keychain" => Ok(StorageBackend::Keychain),
        "file" => Ok(StorageBackend::File),
        other => Err(DermalensError::Config(format!("Unknown storage backend: {other}"))),
    }
}

fn env_key(name: &str) -> String {
    format!("{ENV_PREFIX}{name}")
}

/// Get required environment variable
///
/// # Errors
/// Returns `DermalensError::Config` if the variable is not set.
fn env_var(name: &str) -> Result<String> {
    let key = env_key(name);
    std::env::var(&key).map_err(|_| {
        DermalensError::Config(format!("Missing required environment variable: {key}"))
    })
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(env_key(name)).ok().filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                DermalensError::Config(format!("Invalid value for {}: {e}", env_key(name)))
            })
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(name: &str, default: bool) -> bool {
    env_opt(name)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
