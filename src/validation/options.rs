//! Charm option validation.

use crate::error::{CharmError, ValidationErrorKind};

/// Validate a TCP port number.
pub fn validate_port(value: i64) -> Result<u16, CharmError> {
    if (1..=i64::from(u16::MAX)).contains(&value) {
        Ok(value as u16)
    } else {
        Err(CharmError::Validation {
            kind: ValidationErrorKind::InvalidPort { value },
        })
    }
}

/// Validate an option that holds either nothing or an http(s) URL.
pub fn validate_optional_url(option: &str, value: &str) -> Result<(), CharmError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }

    let rest = value
        .strip_prefix("http://")
        .or_else(|| value.strip_prefix("https://"));

    match rest {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') && !rest.contains(char::is_whitespace) => {
            Ok(())
        }
        _ => Err(CharmError::Validation {
            kind: ValidationErrorKind::InvalidUrl {
                option: option.to_string(),
                value: value.to_string(),
            },
        }),
    }
}
