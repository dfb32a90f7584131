//! Side effects described by transition plans.

use serde_json::Value;

use crate::host::Status;
use crate::validation::PackageSource;

use super::flags::Flag;

/// A single side effect. Effects are applied in order by the effect runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetStatus(Status),

    /// Download a package file, through `proxy` if set, and install it.
    InstallFromUrl { url: String, proxy: Option<String> },
    AddSource(PackageSource),
    UpdatePackages,
    InstallPackages(Vec<String>),
    PurgePackages(Vec<String>),

    /// Render the defaults file; raises `do-restart` when its content changed.
    RenderConfig,
    OpenPort(u16),
    ClosePort(u16),
    PersistPort(u16),
    ForgetPort,

    /// Start the service, or restart it when it is already running.
    StartOrRestart,
    StopService,

    /// Publish `hostname`/`port` on every upstream relation instance.
    PublishEndpoint { address: String, port: u16 },
    Register { address: String, port: u16 },
    Deregister { address: String, port: u16 },
    /// Relay the principal unit to every upstream relation instance.
    PropagatePrincipal(String),
    PersistPrincipal(String),
    /// Remember the registration inputs that were just published.
    RecordRegistration(Value),
    ForgetRegistration,

    SetFlag(Flag),
    ClearFlag(Flag),
}

/// Ordered list of effects produced by a transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) -> &mut Self {
        self.effects.push(effect);
        self
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }
}

impl IntoIterator for Plan {
    type Item = Effect;
    type IntoIter = std::vec::IntoIter<Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.effects.into_iter()
    }
}

impl FromIterator<Effect> for Plan {
    fn from_iter<I: IntoIterator<Item = Effect>>(iter: I) -> Self {
        Self {
            effects: iter.into_iter().collect(),
        }
    }
}
