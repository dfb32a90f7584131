//! Interfaces of the external collaborators.
//!
//! The convergence logic only talks to the machine through these traits. The
//! production implementations shell out to apt, systemd and the framework's
//! hook tools; tests use [`super::RecordingHost`].

use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::error::CharmError;
use crate::validation::PackageSource;

/// Operating system package manager.
pub trait PackageManager {
    /// Add an archive source and its signing key.
    fn add_source(&mut self, source: &PackageSource) -> Result<(), CharmError>;

    /// Refresh the package index.
    fn update(&mut self) -> Result<(), CharmError>;

    /// Install packages from the archive.
    fn install(&mut self, packages: &[String]) -> Result<(), CharmError>;

    /// Install a local package file.
    fn install_file(&mut self, path: &Path) -> Result<(), CharmError>;

    /// Remove packages together with their configuration.
    fn purge(&mut self, packages: &[String]) -> Result<(), CharmError>;
}

/// Service supervisor.
pub trait ServiceManager {
    fn is_running(&mut self, unit: &str) -> Result<bool, CharmError>;
    fn start(&mut self, unit: &str) -> Result<(), CharmError>;
    fn restart(&mut self, unit: &str) -> Result<(), CharmError>;
    fn stop(&mut self, unit: &str) -> Result<(), CharmError>;
}

/// Firewall / port exposure primitives of the framework.
pub trait PortManager {
    fn open_port(&mut self, port: u16) -> Result<(), CharmError>;
    fn close_port(&mut self, port: u16) -> Result<(), CharmError>;
}

/// Status surface of the framework.
pub trait StatusReporter {
    fn set_status(&mut self, status: &Status) -> Result<(), CharmError>;
}

/// Downloads install files.
pub trait Fetcher {
    /// Stream `url` into `dest`, optionally through `proxy`. Returns the byte count.
    fn fetch(&mut self, url: &str, proxy: Option<&str>, dest: &mut dyn Write) -> Result<u64, CharmError>;
}

/// One relation instance with the remote units taking part in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub relation_id: String,
    pub remote_units: Vec<String>,
}

/// A relation endpoint of this unit.
pub trait Relation {
    /// Endpoint name as declared in the charm metadata.
    fn name(&self) -> &str;

    /// All relation instances on this endpoint.
    fn conversations(&mut self) -> Result<Vec<Conversation>, CharmError>;

    /// Read `key` published by `unit` on the given relation instance.
    fn get_remote(&mut self, conversation: &Conversation, unit: &str, key: &str) -> Result<Option<String>, CharmError>;

    /// Publish `key = value` on the given relation instance.
    fn set_remote(&mut self, conversation: &Conversation, key: &str, value: &str) -> Result<(), CharmError>;

    /// Whether any remote unit is present.
    fn is_available(&mut self) -> Result<bool, CharmError> {
        Ok(self
            .conversations()?
            .iter()
            .any(|c| !c.remote_units.is_empty()))
    }

    /// Publish the scrape endpoint on every relation instance.
    fn configure(&mut self, hostname: &str, port: u16) -> Result<(), CharmError> {
        let port = port.to_string();
        for conversation in self.conversations()? {
            self.set_remote(&conversation, "hostname", hostname)?;
            self.set_remote(&conversation, "port", &port)?;
        }
        Ok(())
    }
}

/// Severity of a workload status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Maintenance,
    Active,
    Waiting,
    Blocked,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Maintenance => "maintenance",
            Severity::Active => "active",
            Severity::Waiting => "waiting",
            Severity::Blocked => "blocked",
        };
        f.write_str(name)
    }
}

/// A workload status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub severity: Severity,
    pub message: String,
}

impl Status {
    pub fn maintenance(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Maintenance,
            message: message.into(),
        }
    }

    pub fn active(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Active,
            message: message.into(),
        }
    }

    pub fn waiting(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Waiting,
            message: message.into(),
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Blocked,
            message: message.into(),
        }
    }
}

/// Identity of this unit, used for targets and default labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitIdentity {
    /// Machine hostname.
    pub hostname: String,
    /// Local unit name, e.g. `cadvisor/0`.
    pub unit_name: String,
    /// Primary network address of the unit.
    pub private_address: String,
    /// `JUJU_MODEL_NAME`, when available.
    pub model_name: Option<String>,
    /// `JUJU_ENV_NAME`, when available.
    pub env_name: Option<String>,
}

/// Every external collaborator a pass may touch.
pub struct Host {
    pub packages: Box<dyn PackageManager>,
    pub services: Box<dyn ServiceManager>,
    pub ports: Box<dyn PortManager>,
    pub status: Box<dyn StatusReporter>,
    pub fetcher: Box<dyn Fetcher>,
    pub upstream: Box<dyn Relation>,
    pub principal: Box<dyn Relation>,
}
