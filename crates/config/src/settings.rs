//! Immutable settings snapshots.
//!
//! Responsibilities:
//! - Hold a validated configuration sub-tree as an owned, cheaply clonable value.
//! - Look up nested sections and validate required keys.
//! - Deep-merge settings trees.
//!
//! Does NOT handle:
//! - Reading configuration from disk (see `loader`).
//!
//! Invariants:
//! - A `Settings` value is never mutated after construction; merging produces a
//!   new snapshot. Holders therefore never observe each other's changes.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::loader::{ConfigError, Result};

/// An owned, read-only mapping of configuration keys to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    inner: Arc<Map<String, Value>>,
}

impl Settings {
    /// Create a snapshot from a key/value map.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(map),
        }
    }

    /// Create a snapshot from a JSON value, which must be a mapping.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            _ => Err(ConfigError::InvalidType {
                key: "<root>".to_string(),
                expected: "mapping",
            }),
        }
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.inner
    }

    /// Clone the underlying map out of the snapshot.
    pub fn to_map(&self) -> Map<String, Value> {
        self.inner.as_ref().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Get a string value. Empty strings are returned as-is.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(Value::as_str)
    }

    /// Get an unsigned integer, accepting numeric strings (quoted YAML scalars).
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.inner.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get a signed integer, accepting numeric strings (quoted YAML scalars).
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.inner.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Extract the mapping stored under `key` as its own snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSection`] if the key is absent and
    /// [`ConfigError::InvalidType`] if the value is not a mapping.
    pub fn section(&self, key: &str) -> Result<Settings> {
        match self.inner.get(key) {
            None => Err(ConfigError::MissingSection(key.to_string())),
            Some(Value::Object(map)) => Ok(Settings::from_map(map.clone())),
            Some(_) => Err(ConfigError::InvalidType {
                key: key.to_string(),
                expected: "mapping",
            }),
        }
    }

    /// Ensure every expected key is present at the top level.
    ///
    /// Unless `allow_empty` is set, keys holding an empty value (null, empty
    /// string, list or mapping) count as missing. All offending keys are
    /// reported together.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfiguration`] for an empty snapshot and
    /// [`ConfigError::MissingKeys`] otherwise.
    pub fn validate_keys<S: AsRef<str>>(&self, expected: &[S], allow_empty: bool) -> Result<()> {
        if self.inner.is_empty() {
            return Err(ConfigError::NoConfiguration);
        }
        tracing::debug!(
            keys = ?expected.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
            "Validating configuration keys"
        );

        let missing: Vec<String> = expected
            .iter()
            .map(AsRef::as_ref)
            .filter(|key| match self.inner.get(*key) {
                None => true,
                Some(value) => !allow_empty && is_empty_value(value),
            })
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingKeys(missing))
        }
    }

    /// Deserialize the snapshot into a typed structure.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.to_map()))?)
    }

    /// Deep-merge this snapshot over `base`; values in `self` win.
    pub fn merged_over(&self, base: &Settings) -> Settings {
        let merged = merge_values(
            &Value::Object(base.to_map()),
            &Value::Object(self.to_map()),
        );
        match merged {
            Value::Object(map) => Settings::from_map(map),
            // Two mappings always merge into a mapping.
            _ => self.clone(),
        }
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

/// Whether a value counts as "not provided" for validation purposes.
///
/// `false` and `0` are real values and are not empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Recursively merge `overlay` into `base`.
///
/// Mappings are merged key by key; any other value in `overlay` replaces the
/// corresponding value in `base`.
pub fn merge_values(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(key) {
                    Some(existing) => merge_values(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}
