//! Redaction of charm options before they reach the journal.

use serde_json::{Map, Value};

/// Option names whose values are never journaled.
const SENSITIVE_KEYS: &[&str] = &["authtoken", "token", "secret", "password", "proxy"];

/// Keys whose values are shortened when long (armored keys, source lists).
const TRUNCATABLE_KEYS: &[&str] = &["install_keys", "install_sources"];

const MAX_STRING_LENGTH: usize = 256;

/// Copy of `options` with secrets redacted and long values truncated.
///
/// Proxy URLs are redacted as a whole since they routinely embed credentials.
pub fn sanitize_options(options: &Value) -> Value {
    sanitize_value(options, false)
}

fn sanitize_value(value: &Value, truncatable: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = Map::new();
            for (key, val) in map {
                let key_lower = key.to_lowercase();
                let sensitive = SENSITIVE_KEYS.iter().any(|s| key_lower.contains(s));
                let truncate = TRUNCATABLE_KEYS.iter().any(|s| key_lower == *s);

                let redacted = match val {
                    Value::String(s) if sensitive && !s.is_empty() => Value::String("[REDACTED]".to_string()),
                    _ if sensitive => val.clone(),
                    _ => sanitize_value(val, truncate),
                };
                sanitized.insert(key.clone(), redacted);
            }
            Value::Object(sanitized)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| sanitize_value(v, truncatable)).collect()),
        Value::String(s) if truncatable && s.len() > MAX_STRING_LENGTH => {
            Value::String(format!("[TRUNCATED - {} bytes]", s.len()))
        }
        _ => value.clone(),
    }
}
