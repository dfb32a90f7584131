//! Runtime settings for the charm binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CharmError;

/// Main settings structure.
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// working configuration for a standard deployment.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub relations: RelationsConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Persistent key-value state file.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Optional directory of `.tera` templates overriding the built-in one.
    pub templates_dir: Option<PathBuf>,
    /// Rendered daemon defaults file.
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,
    /// Directory used for downloaded install files.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Subprocess limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Timeout for package manager invocations.
    #[serde(default = "default_package_timeout")]
    pub package_timeout_seconds: u64,
    /// Timeout for service manager invocations.
    #[serde(default = "default_service_timeout")]
    pub service_timeout_seconds: u64,
    /// Timeout for framework hook tools.
    #[serde(default = "default_hook_tool_timeout")]
    pub hook_tool_timeout_seconds: u64,
    /// Upper bound on transitions applied in one pass.
    #[serde(default = "default_max_transitions")]
    pub max_transitions_per_pass: usize,
}

/// Managed service identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Systemd unit name.
    #[serde(default = "default_service_name")]
    pub unit: String,
    /// Package installed from the archive.
    #[serde(default = "default_package")]
    pub package: String,
    /// Charm name used in registration comments.
    #[serde(default = "default_charm_name")]
    pub charm_name: String,
    /// Template used to render the defaults file.
    #[serde(default = "default_template")]
    pub template: String,
    /// Owner of the rendered defaults file.
    #[serde(default = "default_owner")]
    pub config_owner: String,
    /// Group of the rendered defaults file.
    #[serde(default = "default_group")]
    pub config_group: String,
    /// Mode of the rendered defaults file (octal string).
    #[serde(default = "default_config_mode")]
    pub config_mode: String,
}

/// Relation endpoint names as declared in the charm metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationsConfig {
    /// Scrape relation towards the metrics collector.
    #[serde(default = "default_upstream_relation")]
    pub upstream: String,
    /// Subordinate relation towards the principal workload.
    #[serde(default = "default_principal_relation")]
    pub principal: String,
}

/// Pass journal configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    /// Whether pass journaling is enabled.
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
    /// Path to the journal file.
    #[serde(default = "default_journal_path")]
    pub path: PathBuf,
}

// Default value functions
fn default_state_file() -> PathBuf {
    PathBuf::from("/var/lib/cadvisor-charm/state.json")
}

fn default_config_file() -> PathBuf {
    PathBuf::from("/etc/default/cadvisor")
}

fn default_download_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_package_timeout() -> u64 {
    600
}

fn default_service_timeout() -> u64 {
    120
}

fn default_hook_tool_timeout() -> u64 {
    60
}

fn default_max_transitions() -> usize {
    32
}

fn default_service_name() -> String {
    "cadvisor".to_string()
}

fn default_package() -> String {
    "cadvisor".to_string()
}

fn default_charm_name() -> String {
    "cadvisor".to_string()
}

fn default_template() -> String {
    "cadvisor.tera".to_string()
}

fn default_owner() -> String {
    "root".to_string()
}

fn default_group() -> String {
    "root".to_string()
}

fn default_config_mode() -> String {
    "0640".to_string()
}

fn default_upstream_relation() -> String {
    "target".to_string()
}

fn default_principal_relation() -> String {
    "juju-info".to_string()
}

fn default_journal_enabled() -> bool {
    true
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("/var/log/cadvisor-charm/passes.log")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            templates_dir: None,
            config_file: default_config_file(),
            download_dir: default_download_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            package_timeout_seconds: default_package_timeout(),
            service_timeout_seconds: default_service_timeout(),
            hook_tool_timeout_seconds: default_hook_tool_timeout(),
            max_transitions_per_pass: default_max_transitions(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            unit: default_service_name(),
            package: default_package(),
            charm_name: default_charm_name(),
            template: default_template(),
            config_owner: default_owner(),
            config_group: default_group(),
            config_mode: default_config_mode(),
        }
    }
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            upstream: default_upstream_relation(),
            principal: default_principal_relation(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: default_journal_enabled(),
            path: default_journal_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CharmError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CharmError::Config {
            message: format!("Failed to read settings file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            CharmError::Config { message } => CharmError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Load settings from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, CharmError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "Settings file absent, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, CharmError> {
        let settings: Settings = toml::from_str(content).map_err(|e| CharmError::Config {
            message: format!("Failed to parse settings: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Parsed file mode of the rendered defaults file.
    pub fn config_mode(&self) -> Result<u32, CharmError> {
        let mode = self.service.config_mode.trim_start_matches('0');
        u32::from_str_radix(if mode.is_empty() { "0" } else { mode }, 8).map_err(|_| {
            CharmError::Config {
                message: format!(
                    "Invalid config_mode '{}'. Must be octal (e.g., '0640')",
                    self.service.config_mode
                ),
            }
        })
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), CharmError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(CharmError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(CharmError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if !self.service.config_mode.chars().all(|c| c.is_digit(8)) {
            return Err(CharmError::Config {
                message: format!(
                    "Invalid config_mode '{}'. Must be octal (e.g., '0640')",
                    self.service.config_mode
                ),
            });
        }

        if self.limits.max_transitions_per_pass == 0 {
            return Err(CharmError::Config {
                message: "max_transitions_per_pass must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.paths.config_file, PathBuf::from("/etc/default/cadvisor"));
        assert_eq!(settings.service.unit, "cadvisor");
        assert_eq!(settings.relations.upstream, "target");
        assert_eq!(settings.config_mode().unwrap(), 0o640);
    }

    #[test]
    fn test_empty_toml_is_valid() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.limits.max_transitions_per_pass, 32);
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml(
            r#"
[service]
config_group = "cadvisor"

[logging]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(settings.service.config_group, "cadvisor");
        assert_eq!(settings.service.config_owner, "root");
        assert_eq!(settings.logging.format, "json");
    }

    #[test]
    fn test_invalid_log_level() {
        let result = Settings::from_toml("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(result, Err(CharmError::Config { .. })));
    }

    #[test]
    fn test_invalid_mode() {
        let result = Settings::from_toml("[service]\nconfig_mode = \"0999\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.service.package, "cadvisor");
    }
}
