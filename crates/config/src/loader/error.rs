//! Error types for configuration loading and validation.
//!
//! Responsibilities:
//! - Define error variants for settings lookup, validation and file loading.
//! - Carry enough context (keys, paths) to debug a failure without the file.
//!
//! Invariants:
//! - Errors never include configuration values, only key names and paths,
//!   so secrets in a settings tree cannot leak through error messages.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No configuration has been set")]
    NoConfiguration,

    #[error("Missing configuration section: {0}")]
    MissingSection(String),

    #[error(
        "Configuration content did not pass validation, missing or empty keys: {}",
        .0.join(", ")
    )]
    MissingKeys(Vec<String>),

    #[error("Invalid type for {key}: expected {expected}")]
    InvalidType { key: String, expected: &'static str },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Readable configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unable to locate configuration file for {application}")]
    NotDiscovered { application: String },

    #[error("Failed to parse config file at {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unsupported configuration file type: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to deserialize configuration: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Keys reported missing or empty, if this is a validation failure.
    pub fn missing_keys(&self) -> &[String] {
        match self {
            Self::MissingKeys(keys) => keys,
            _ => &[],
        }
    }
}
