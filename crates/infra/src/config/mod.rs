//! Configuration loading
//!
//! Builds a [`dermalens_domain::Config`] from `.env`, the environment or a
//! config file.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, parse_config, probe_config_paths};
