//! Property-based tests for settings merging and validation.
//!
//! Test coverage:
//! - Deep merge: every overlay leaf wins, every base-only key survives.
//! - Validation: keys that are present with non-empty values always validate.

use authwire_config::{Settings, merge_values};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z_]{1,8}"
}

fn flat_map_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(key_strategy(), "[a-zA-Z0-9]{1,12}", 0..8).prop_map(|m| {
        m.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_overlay_leaves_win(base in flat_map_strategy(), overlay in flat_map_strategy()) {
        let merged = merge_values(&Value::Object(base.clone()), &Value::Object(overlay.clone()));
        let merged = merged.as_object().unwrap();

        for (key, value) in &overlay {
            prop_assert_eq!(merged.get(key), Some(value));
        }
        for (key, value) in &base {
            if !overlay.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
    }

    #[test]
    fn prop_nested_sections_merge(base in flat_map_strategy(), overlay in flat_map_strategy()) {
        let merged = merge_values(
            &json!({ "section": Value::Object(base.clone()) }),
            &json!({ "section": Value::Object(overlay.clone()) }),
        );
        let section = merged["section"].as_object().unwrap();
        prop_assert!(section.len() >= base.len().max(overlay.len()));
    }

    #[test]
    fn prop_present_keys_validate(map in flat_map_strategy()) {
        prop_assume!(!map.is_empty());
        let keys: Vec<String> = map.keys().cloned().collect();
        let settings = Settings::from_map(map);
        prop_assert!(settings.validate_keys(&keys, false).is_ok());
    }
}
