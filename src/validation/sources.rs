//! Package source validation.
//!
//! `install_sources` and `install_keys` hold either a single value or a YAML
//! list. Keys pair up with sources by position; a `null` key means the source
//! needs no signing key.

use serde_yaml::Value as YamlValue;

use crate::error::{CharmError, ValidationErrorKind};

/// One archive source with its optional signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub source: String,
    pub key: Option<String>,
}

const DANGEROUS_CHARS: &[char] = &[
    ';', '|', '&', '$', '`', '(', ')', '{', '}', '<', '>', '\n', '\r', '\\', '"', '\'', '*', '?',
    '!',
];

/// Parse and validate the configured sources and keys.
///
/// The `distro` pseudo-source is dropped: it denotes the archive already
/// configured on the machine.
pub fn parse_sources(sources: &str, keys: &str) -> Result<Vec<PackageSource>, CharmError> {
    let sources = parse_list("install_sources", sources)?;
    let keys = parse_list("install_keys", keys)?;

    if !keys.is_empty() && keys.len() != sources.len() {
        return Err(CharmError::Validation {
            kind: ValidationErrorKind::InvalidOption {
                option: "install_keys".to_string(),
                message: format!(
                    "{} keys given for {} sources; lists must be the same length",
                    keys.len(),
                    sources.len()
                ),
            },
        });
    }

    let mut parsed = Vec::with_capacity(sources.len());
    for (index, source) in sources.into_iter().enumerate() {
        let Some(source) = source else { continue };
        if source == "distro" {
            continue;
        }
        validate_source(&source)?;

        let key = keys.get(index).cloned().flatten();
        if let Some(key) = &key {
            validate_key(key)?;
        }

        parsed.push(PackageSource { source, key });
    }

    Ok(parsed)
}

/// Validate a single source line.
pub fn validate_source(source: &str) -> Result<(), CharmError> {
    let invalid = |message: &str| CharmError::Validation {
        kind: ValidationErrorKind::InvalidOption {
            option: "install_sources".to_string(),
            message: format!("{}: {}", message, source),
        },
    };

    if source.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
        return Err(invalid("Source contains invalid characters"));
    }

    let known_prefix = ["ppa:", "deb ", "cloud:", "http://", "https://"]
        .iter()
        .any(|prefix| source.starts_with(prefix));
    if !known_prefix {
        return Err(invalid("Unsupported source format"));
    }

    Ok(())
}

fn validate_key(key: &str) -> Result<(), CharmError> {
    let is_armored = key.trim_start().starts_with("-----BEGIN PGP PUBLIC KEY BLOCK-----");
    let is_key_id = key.len() >= 8 && key.chars().all(|c| c.is_ascii_hexdigit());

    if is_armored || is_key_id {
        Ok(())
    } else {
        Err(CharmError::Validation {
            kind: ValidationErrorKind::InvalidOption {
                option: "install_keys".to_string(),
                message: "Key must be a hex key id or an ASCII-armored public key".to_string(),
            },
        })
    }
}

fn parse_list(option: &str, raw: &str) -> Result<Vec<Option<String>>, CharmError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let value: YamlValue = serde_yaml::from_str(raw).map_err(|e| CharmError::Validation {
        kind: ValidationErrorKind::InvalidOption {
            option: option.to_string(),
            message: format!("Invalid YAML: {}", e),
        },
    })?;

    let scalar = |v: &YamlValue| -> Result<Option<String>, CharmError> {
        match v {
            YamlValue::Null => Ok(None),
            YamlValue::String(s) => Ok(Some(s.trim().to_string())),
            YamlValue::Number(n) => Ok(Some(n.to_string())),
            _ => Err(CharmError::Validation {
                kind: ValidationErrorKind::InvalidOption {
                    option: option.to_string(),
                    message: "Entries must be strings".to_string(),
                },
            }),
        }
    };

    match &value {
        YamlValue::Sequence(items) => items.iter().map(scalar).collect(),
        other => Ok(vec![scalar(other)?]),
    }
}
