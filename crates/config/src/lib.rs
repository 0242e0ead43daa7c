//! Configuration support for authwire.
//!
//! This crate provides the settings collaborator used by the web client:
//! immutable settings snapshots with key validation, YAML loading with
//! platform-specific discovery, the usable-file predicate and named-logger
//! setup on top of `tracing-subscriber`.

pub mod constants;
pub mod fs;
mod loader;
pub mod logging;
mod settings;

pub use fs::is_file_readable;
pub use loader::{
    ApplicationConfig, ConfigError, Result, candidate_locations, config_path_env_var,
    find_config_file,
};
pub use settings::{Settings, is_empty_value, merge_values};
