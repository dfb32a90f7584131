//! Charm options supplied by the lifecycle framework.
//!
//! The raw option mapping comes from `config-get --format=json`. A snapshot of
//! the mapping is persisted at the end of each pass so the next invocation can
//! tell which options changed.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CharmError;
use crate::validation::{parse_sources, validate_optional_url, validate_port, PackageSource};

/// Typed view of the charm options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharmConfig {
    #[serde(default = "default_port", deserialize_with = "port_or_default")]
    pub port: u16,
    #[serde(default, deserialize_with = "string_or_null")]
    pub http_proxy: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub install_file: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub install_sources: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub install_keys: String,
    #[serde(default, deserialize_with = "bool_or_null")]
    pub standalone: bool,
    #[serde(default, deserialize_with = "string_or_null")]
    pub promreg_url: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub promreg_authtoken: String,
}

fn default_port() -> u16 {
    9103
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn bool_or_null<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

fn port_or_default<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<i64>::deserialize(deserializer)? {
        None => Ok(default_port()),
        Some(value) => validate_port(value).map_err(serde::de::Error::custom),
    }
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            http_proxy: String::new(),
            install_file: String::new(),
            install_sources: String::new(),
            install_keys: String::new(),
            standalone: false,
            promreg_url: String::new(),
            promreg_authtoken: String::new(),
        }
    }
}

impl CharmConfig {
    /// Install file URL, if one is configured.
    pub fn install_file(&self) -> Option<&str> {
        non_empty(&self.install_file)
    }

    /// Proxy applied to the install file download, if one is configured.
    pub fn http_proxy(&self) -> Option<&str> {
        non_empty(&self.http_proxy)
    }

    /// Registration service base URL without a trailing slash.
    pub fn promreg_url(&self) -> Option<&str> {
        non_empty(&self.promreg_url).map(|url| url.trim_end_matches('/'))
    }

    /// Parsed archive sources with their keys.
    pub fn sources(&self) -> Result<Vec<PackageSource>, CharmError> {
        parse_sources(&self.install_sources, &self.install_keys)
    }

    /// Validate option values.
    pub fn validate(&self) -> Result<(), CharmError> {
        validate_optional_url("install_file", &self.install_file)?;
        validate_optional_url("http_proxy", &self.http_proxy)?;
        validate_optional_url("promreg_url", &self.promreg_url)?;
        self.sources()?;
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Options of the current invocation together with the previous snapshot.
#[derive(Debug, Clone)]
pub struct ConfigView {
    options: CharmConfig,
    raw: Map<String, Value>,
    previous: Option<Map<String, Value>>,
}

impl ConfigView {
    /// Build a view from the raw option mapping and the previous snapshot.
    pub fn new(raw: Map<String, Value>, previous: Option<Map<String, Value>>) -> Result<Self, CharmError> {
        let options: CharmConfig =
            serde_json::from_value(Value::Object(raw.clone())).map_err(|e| CharmError::Config {
                message: format!("Invalid charm options: {}", e),
            })?;
        options.validate()?;

        Ok(Self {
            options,
            raw,
            previous,
        })
    }

    /// Build a view from typed options, mostly useful in tests.
    pub fn from_options(options: &CharmConfig, previous: Option<&CharmConfig>) -> Result<Self, CharmError> {
        let as_map = |config: &CharmConfig| -> Result<Map<String, Value>, CharmError> {
            match serde_json::to_value(config)? {
                Value::Object(map) => Ok(map),
                _ => Err(CharmError::Config {
                    message: "Charm options must serialize to a mapping".to_string(),
                }),
            }
        };

        let previous = previous.map(as_map).transpose()?;
        Self::new(as_map(options)?, previous)
    }

    /// Typed options.
    pub fn options(&self) -> &CharmConfig {
        &self.options
    }

    /// The full option mapping, as handed to the template engine.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Whether `key` differs from the previous invocation.
    ///
    /// Without a previous snapshot every option counts as changed.
    pub fn changed(&self, key: &str) -> bool {
        match &self.previous {
            None => true,
            Some(previous) => previous.get(key) != self.raw.get(key),
        }
    }

    /// Whether any of `keys` changed.
    pub fn any_changed(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.changed(key))
    }

    /// Whether a previous snapshot was available.
    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}
