//! Lifecycle framework hook tools.
//!
//! Inside a hook the framework exposes its primitives as executables on
//! `PATH` (`config-get`, `open-port`, `relation-set`, ...). This module wraps
//! them behind the collaborator traits.

use std::env;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CharmError;
use crate::executor::{sanitize_output, SubprocessBuilder};

use super::traits::{Conversation, PortManager, Relation, Status, StatusReporter, UnitIdentity};

/// Runner for the framework's hook tools.
#[derive(Debug, Clone)]
pub struct HookTools {
    timeout: Duration,
}

impl HookTools {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a hook tool and return its stdout.
    fn run(&self, tool: &str, args: &[&str]) -> Result<String, CharmError> {
        let result = SubprocessBuilder::new(tool)
            .args(args.iter().copied())
            .timeout(self.timeout)
            .run()
            .map_err(|e| CharmError::Hook {
                tool: tool.to_string(),
                message: e.to_string(),
            })?;

        if !result.success {
            return Err(CharmError::Hook {
                tool: tool.to_string(),
                message: sanitize_output(&result.stderr, 5),
            });
        }

        Ok(result.stdout)
    }

    /// Run a hook tool with `--format=json` and parse its output.
    fn run_json(&self, tool: &str, args: &[&str]) -> Result<Value, CharmError> {
        let mut full_args = args.to_vec();
        full_args.push("--format=json");
        let stdout = self.run(tool, &full_args)?;

        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(stdout.trim()).map_err(|e| CharmError::Hook {
            tool: tool.to_string(),
            message: format!("Unparseable output: {}", e),
        })
    }

    /// Current charm option mapping.
    pub fn config_get(&self) -> Result<Map<String, Value>, CharmError> {
        match self.run_json("config-get", &[])? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(CharmError::Hook {
                tool: "config-get".to_string(),
                message: format!("Expected a mapping, got {}", other),
            }),
        }
    }

    /// Identity of the local unit.
    pub fn unit_identity(&self) -> Result<UnitIdentity, CharmError> {
        let unit_name = env::var("JUJU_UNIT_NAME").map_err(|_| CharmError::Config {
            message: "JUJU_UNIT_NAME is not set; not running inside a hook context".to_string(),
        })?;

        let hostname = nix::unistd::gethostname()
            .map_err(|e| CharmError::Config {
                message: format!("Failed to read hostname: {}", e),
            })?
            .to_string_lossy()
            .into_owned();

        let private_address = self.run("unit-get", &["private-address"])?.trim().to_string();

        Ok(UnitIdentity {
            hostname,
            unit_name,
            private_address,
            model_name: env::var("JUJU_MODEL_NAME").ok(),
            env_name: env::var("JUJU_ENV_NAME").ok(),
        })
    }

    /// Relation endpoint `name` backed by the relation hook tools.
    pub fn relation(&self, name: &str) -> HookRelation {
        HookRelation {
            tools: self.clone(),
            name: name.to_string(),
        }
    }
}

impl PortManager for HookTools {
    fn open_port(&mut self, port: u16) -> Result<(), CharmError> {
        self.run("open-port", &[&format!("{}/tcp", port)])?;
        Ok(())
    }

    fn close_port(&mut self, port: u16) -> Result<(), CharmError> {
        self.run("close-port", &[&format!("{}/tcp", port)])?;
        Ok(())
    }
}

impl StatusReporter for HookTools {
    fn set_status(&mut self, status: &Status) -> Result<(), CharmError> {
        self.run("status-set", &[&status.severity.to_string(), &status.message])?;
        Ok(())
    }
}

/// A relation endpoint accessed through relation-ids/-list/-get/-set.
#[derive(Debug, Clone)]
pub struct HookRelation {
    tools: HookTools,
    name: String,
}

fn string_list(tool: &str, value: Value) -> Result<Vec<String>, CharmError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect()),
        other => Err(CharmError::Hook {
            tool: tool.to_string(),
            message: format!("Expected a list, got {}", other),
        }),
    }
}

impl Relation for HookRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn conversations(&mut self) -> Result<Vec<Conversation>, CharmError> {
        let ids = string_list("relation-ids", self.tools.run_json("relation-ids", &[&self.name])?)?;

        let mut conversations = Vec::with_capacity(ids.len());
        for relation_id in ids {
            let units = string_list(
                "relation-list",
                self.tools.run_json("relation-list", &["-r", &relation_id])?,
            )?;
            conversations.push(Conversation {
                relation_id,
                remote_units: units,
            });
        }

        debug!(relation = %self.name, count = conversations.len(), "Relation conversations listed");
        Ok(conversations)
    }

    fn get_remote(&mut self, conversation: &Conversation, unit: &str, key: &str) -> Result<Option<String>, CharmError> {
        let value = self
            .tools
            .run_json("relation-get", &["-r", &conversation.relation_id, key, unit])?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    fn set_remote(&mut self, conversation: &Conversation, key: &str, value: &str) -> Result<(), CharmError> {
        self.tools.run(
            "relation-set",
            &["-r", &conversation.relation_id, &format!("{}={}", key, value)],
        )?;
        Ok(())
    }
}
