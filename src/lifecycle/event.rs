//! Lifecycle events, parsed from hook names.

use std::fmt;

use crate::config::RelationsConfig;

/// Which relation endpoint an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Scrape relation towards the metrics collector.
    Upstream,
    /// Subordinate relation towards the principal workload.
    Principal,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Upstream => "upstream",
            Endpoint::Principal => "principal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationChange {
    Joined,
    Changed,
    Departed,
    Broken,
}

impl RelationChange {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "joined" => Some(RelationChange::Joined),
            "changed" => Some(RelationChange::Changed),
            "departed" => Some(RelationChange::Departed),
            "broken" => Some(RelationChange::Broken),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationChange::Joined => "joined",
            RelationChange::Changed => "changed",
            RelationChange::Departed => "departed",
            RelationChange::Broken => "broken",
        }
    }

    /// Whether a remote unit left the relation.
    pub fn is_departure(&self) -> bool {
        matches!(self, RelationChange::Departed | RelationChange::Broken)
    }
}

/// One lifecycle event delivered by the framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Install,
    UpgradeCharm,
    ConfigChanged,
    Start,
    Stop,
    UpdateStatus,
    Relation { endpoint: Endpoint, change: RelationChange },
    /// Any other hook; evaluated as a plain re-convergence pass.
    Other(String),
}

impl Event {
    /// Map a hook name onto an event.
    pub fn parse(hook: &str, relations: &RelationsConfig) -> Self {
        match hook {
            "install" => return Event::Install,
            "upgrade-charm" => return Event::UpgradeCharm,
            "config-changed" => return Event::ConfigChanged,
            "start" => return Event::Start,
            "stop" => return Event::Stop,
            "update-status" => return Event::UpdateStatus,
            _ => {}
        }

        let relation_event = hook.rsplit_once("-relation-").and_then(|(name, suffix)| {
            let change = RelationChange::from_suffix(suffix)?;
            let endpoint = if name == relations.upstream {
                Endpoint::Upstream
            } else if name == relations.principal {
                Endpoint::Principal
            } else {
                return None;
            };
            Some(Event::Relation { endpoint, change })
        });

        relation_event.unwrap_or_else(|| Event::Other(hook.to_string()))
    }

    /// Whether the event reports an upstream unit leaving.
    pub fn is_upstream_departure(&self) -> bool {
        matches!(
            self,
            Event::Relation {
                endpoint: Endpoint::Upstream,
                change,
            } if change.is_departure()
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Install => f.write_str("install"),
            Event::UpgradeCharm => f.write_str("upgrade-charm"),
            Event::ConfigChanged => f.write_str("config-changed"),
            Event::Start => f.write_str("start"),
            Event::Stop => f.write_str("stop"),
            Event::UpdateStatus => f.write_str("update-status"),
            Event::Relation { endpoint, change } => write!(f, "{}-relation-{}", endpoint.as_str(), change.as_str()),
            Event::Other(hook) => f.write_str(hook),
        }
    }
}
