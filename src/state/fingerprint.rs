//! "Did these inputs change since last time" checks.

use ring::digest::{digest, SHA256};
use serde_json::Value;

use crate::error::CharmError;

use super::store::StateStore;

/// Hex SHA-256 of the canonical JSON encoding of `value`.
pub fn fingerprint(value: &Value) -> String {
    // serde_json maps are ordered by key, so the encoding is canonical.
    let encoded = value.to_string();
    digest(&SHA256, encoded.as_bytes())
        .as_ref()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Whether `value` differs from what was last recorded under `key`.
pub fn data_changed(store: &dyn StateStore, key: &str, value: &Value) -> bool {
    store.get_string(key).as_deref() != Some(fingerprint(value).as_str())
}

/// Record `value` as the latest data seen under `key`.
pub fn record_data(store: &mut dyn StateStore, key: &str, value: &Value) -> Result<(), CharmError> {
    store.set(key, Value::String(fingerprint(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use serde_json::json;

    #[test]
    fn test_fingerprint_is_stable_and_order_independent() {
        let a = json!({"host": "10.0.0.1", "port": 9103});
        let b = json!({"port": 9103, "host": "10.0.0.1"});
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn test_data_changed_lifecycle() {
        let mut store = MemoryStateStore::new();
        let inputs = json!({"host": "10.0.0.1", "port": 9103});

        assert!(data_changed(&store, "reg", &inputs));
        record_data(&mut store, "reg", &inputs).unwrap();
        assert!(!data_changed(&store, "reg", &inputs));
        assert!(data_changed(&store, "reg", &json!({"host": "10.0.0.1", "port": 9104})));
    }
}
