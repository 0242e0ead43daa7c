//! YAML application configuration.
//!
//! Responsibilities:
//! - Load a YAML file into a [`Settings`] snapshot.
//! - Combine discovery with loading for applications that allow it.
//!
//! Invariants:
//! - The top level of a configuration file must be a mapping.
//! - A leading UTF-8 byte order mark is ignored.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::discovery::find_config_file;
use super::error::{ConfigError, Result};
use crate::fs::is_file_readable;
use crate::settings::Settings;

/// Configuration loaded from an application's YAML file.
#[derive(Debug, Clone)]
pub struct ApplicationConfig {
    path: PathBuf,
    settings: Settings,
}

impl ApplicationConfig {
    /// Load configuration from an explicit YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] if the file is missing, empty or
    /// unreadable, [`ConfigError::Parse`] for invalid YAML and
    /// [`ConfigError::InvalidType`] if the document is not a mapping.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !is_file_readable(path) {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        tracing::debug!(path = %path.display(), "Loading application configuration");
        let raw = std::fs::read_to_string(path)?;
        let content = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        let value: Value = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Settings::from_value(value).map_err(|_| ConfigError::InvalidType {
            key: path.display().to_string(),
            expected: "mapping at document root",
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            settings,
        })
    }

    /// Discover and load the configuration file for `application`.
    ///
    /// `extra_locations` are searched before the standard locations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedFormat`] for file types other than
    /// `yml`/`yaml` and [`ConfigError::NotDiscovered`] if no usable file exists.
    pub fn discover(
        application: &str,
        file_type: &str,
        extra_locations: &[PathBuf],
    ) -> Result<Self> {
        if !matches!(file_type.to_ascii_lowercase().as_str(), "yml" | "yaml") {
            return Err(ConfigError::UnsupportedFormat(file_type.to_string()));
        }

        let path = find_config_file(application, file_type, extra_locations).ok_or_else(|| {
            ConfigError::NotDiscovered {
                application: application.to_string(),
            }
        })?;
        Self::load(path)
    }

    /// Path of the loaded file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The complete configuration tree.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Shorthand for `settings().section(key)`.
    pub fn section(&self, key: &str) -> Result<Settings> {
        self.settings.section(key)
    }
}
