//! Configuration loading from YAML files.
//!
//! Responsibilities:
//! - Discover an application's configuration file across platform locations.
//! - Parse YAML into an immutable [`crate::Settings`] tree.
//!
//! Does NOT handle:
//! - Interpreting individual settings (consumers deserialize their own sections).
//!
//! Invariants / Assumptions:
//! - Only YAML (`yml`/`yaml`) files are supported.
//! - A file is only considered if it passes [`crate::fs::is_file_readable`].

mod application;
mod discovery;
mod error;

pub use application::ApplicationConfig;
pub use discovery::{candidate_locations, config_path_env_var, find_config_file};
pub use error::{ConfigError, Result};
