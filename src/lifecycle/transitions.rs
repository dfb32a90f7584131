//! The transition table.
//!
//! Transitions are evaluated in table order; the first one whose guard holds
//! fires, its plan is applied, and evaluation starts over until no guard
//! holds. Guards and actions only look at the [`Snapshot`].

use std::fmt;

use tracing::debug;

use crate::error::CharmError;
use crate::host::Status;

use super::effect::{Effect, Plan};
use super::event::Event;
use super::flags::Flag;
use super::snapshot::Snapshot;

/// Options whose change requires rendering the defaults file again.
pub const CONFIGURE_OPTIONS: &[&str] = &["port", "standalone", "http_proxy"];

/// Options whose change requires installing the daemon again.
pub const INSTALL_OPTIONS: &[&str] = &["install_file", "install_sources", "install_keys"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionName {
    Install,
    Configure,
    Restart,
    RecordPrincipal,
    Publish,
    Teardown,
}

impl TransitionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionName::Install => "install",
            TransitionName::Configure => "configure",
            TransitionName::Restart => "restart",
            TransitionName::RecordPrincipal => "record-principal",
            TransitionName::Publish => "publish",
            TransitionName::Teardown => "teardown",
        }
    }
}

impl fmt::Display for TransitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Guard = fn(&Snapshot<'_>) -> bool;
pub type Action = fn(&Snapshot<'_>) -> Result<Plan, CharmError>;

/// A guarded action.
#[derive(Clone, Copy)]
pub struct Transition {
    pub name: TransitionName,
    pub guard: Guard,
    pub action: Action,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition").field("name", &self.name).finish()
    }
}

pub const TRANSITIONS: [Transition; 6] = [
    Transition {
        name: TransitionName::Install,
        guard: install_guard,
        action: install_action,
    },
    Transition {
        name: TransitionName::Configure,
        guard: configure_guard,
        action: configure_action,
    },
    Transition {
        name: TransitionName::Restart,
        guard: restart_guard,
        action: restart_action,
    },
    Transition {
        name: TransitionName::RecordPrincipal,
        guard: record_principal_guard,
        action: record_principal_action,
    },
    Transition {
        name: TransitionName::Publish,
        guard: publish_guard,
        action: publish_action,
    },
    Transition {
        name: TransitionName::Teardown,
        guard: teardown_guard,
        action: teardown_action,
    },
];

/// First transition whose guard holds.
pub fn next_transition(snapshot: &Snapshot<'_>) -> Option<&'static Transition> {
    TRANSITIONS.iter().find(|t| (t.guard)(snapshot))
}

fn install_guard(s: &Snapshot<'_>) -> bool {
    !s.has(Flag::Installed) && !s.has(Flag::Stopped)
}

fn install_action(s: &Snapshot<'_>) -> Result<Plan, CharmError> {
    let options = s.config.options();
    let mut plan = Plan::new();
    plan.push(Effect::SetStatus(Status::maintenance("Installing cAdvisor")));

    if let Some(url) = options.install_file() {
        plan.push(Effect::SetStatus(Status::maintenance("Installing deb pkgs")))
            .push(Effect::InstallFromUrl {
                url: url.to_string(),
                proxy: options.http_proxy().map(|p| p.to_string()),
            });
    } else if s.config.any_changed(&["install_sources", "install_keys"]) {
        plan.push(Effect::SetStatus(Status::maintenance("Installing deb pkgs")));
        for source in options.sources()? {
            plan.push(Effect::AddSource(source));
        }
        plan.push(Effect::UpdatePackages)
            .push(Effect::InstallPackages(vec![s.service.package.clone()]));
    } else {
        debug!("No install source changed, nothing to install");
    }

    plan.push(Effect::SetFlag(Flag::Installed))
        .push(Effect::SetStatus(Status::active("Completed installing cAdvisor")));
    Ok(plan)
}

fn configure_guard(s: &Snapshot<'_>) -> bool {
    s.has(Flag::Installed) && !s.has(Flag::Configured) && !s.has(Flag::Stopped)
}

fn configure_action(s: &Snapshot<'_>) -> Result<Plan, CharmError> {
    let port = s.port();
    let mut plan = Plan::new();
    plan.push(Effect::SetStatus(Status::maintenance("Configuring cAdvisor")))
        .push(Effect::RenderConfig);

    // New port first so there is no window with nothing reachable.
    if s.persisted_port != Some(port) {
        plan.push(Effect::OpenPort(port));
        if let Some(previous) = s.persisted_port {
            plan.push(Effect::ClosePort(previous));
        }
        plan.push(Effect::PersistPort(port));
    }

    // An unchanged file must still bring a dead service back.
    if !s.service_running {
        plan.push(Effect::SetFlag(Flag::DoRestart));
    }

    plan.push(Effect::SetFlag(Flag::Configured));
    Ok(plan)
}

fn restart_guard(s: &Snapshot<'_>) -> bool {
    s.has(Flag::Configured) && !s.has(Flag::Stopped) && (s.has(Flag::DoRestart) || !s.has(Flag::Started))
}

fn restart_action(_s: &Snapshot<'_>) -> Result<Plan, CharmError> {
    let mut plan = Plan::new();
    plan.push(Effect::StartOrRestart)
        .push(Effect::SetFlag(Flag::Started))
        .push(Effect::ClearFlag(Flag::DoRestart));
    Ok(plan)
}

fn record_principal_guard(s: &Snapshot<'_>) -> bool {
    s.principal_unit.is_some() && s.principal_unit != s.persisted_principal
}

fn record_principal_action(s: &Snapshot<'_>) -> Result<Plan, CharmError> {
    Ok(s
        .principal_unit
        .iter()
        .map(|unit| Effect::PersistPrincipal(unit.clone()))
        .collect())
}

fn publish_guard(s: &Snapshot<'_>) -> bool {
    s.has(Flag::Started) && !s.has(Flag::Stopped) && s.upstream_available && s.registration_changed
}

fn publish_action(s: &Snapshot<'_>) -> Result<Plan, CharmError> {
    let address = s.address().to_string();
    let port = s.port();

    let mut plan = Plan::new();
    plan.push(Effect::PublishEndpoint {
        address: address.clone(),
        port,
    })
    .push(Effect::Register { address, port });
    if let Some(principal) = &s.persisted_principal {
        plan.push(Effect::PropagatePrincipal(principal.clone()));
    }
    plan.push(Effect::RecordRegistration(s.registration_inputs()));
    Ok(plan)
}

fn teardown_guard(s: &Snapshot<'_>) -> bool {
    s.has(Flag::Stopped) && s.has(Flag::Installed) && !s.upstream_available
}

fn teardown_action(s: &Snapshot<'_>) -> Result<Plan, CharmError> {
    let mut plan = Plan::new();
    plan.push(Effect::SetStatus(Status::maintenance("Removing cAdvisor")))
        .push(Effect::StopService)
        .push(Effect::Deregister {
            address: s.address().to_string(),
            port: s.persisted_port.unwrap_or_else(|| s.port()),
        });
    if let Some(port) = s.persisted_port {
        plan.push(Effect::ClosePort(port));
    }
    plan.push(Effect::PurgePackages(vec![s.service.package.clone()]));
    for flag in [Flag::Installed, Flag::Configured, Flag::Started, Flag::DoRestart] {
        plan.push(Effect::ClearFlag(flag));
    }
    plan.push(Effect::ForgetPort).push(Effect::ForgetRegistration);
    Ok(plan)
}

/// Flag and registration adjustments for `event`, applied once before the
/// fixed-point loop.
pub fn preprocess(event: &Event, s: &Snapshot<'_>) -> Plan {
    let mut plan = Plan::new();

    match event {
        Event::ConfigChanged => {
            if s.config.any_changed(CONFIGURE_OPTIONS) {
                plan.push(Effect::ClearFlag(Flag::Configured));
            }
            if s.config.any_changed(INSTALL_OPTIONS) {
                plan.push(Effect::ClearFlag(Flag::Installed));
            }
        }
        Event::Stop => {
            plan.push(Effect::SetFlag(Flag::Stopped));
        }
        Event::Install | Event::UpgradeCharm => {
            plan.push(Effect::ClearFlag(Flag::Stopped));
        }
        Event::Start | Event::UpdateStatus => {
            if !s.service_running {
                plan.push(Effect::ClearFlag(Flag::Started));
            }
        }
        event if event.is_upstream_departure() => {
            plan.push(Effect::Deregister {
                address: s.address().to_string(),
                port: s.persisted_port.unwrap_or_else(|| s.port()),
            })
            .push(Effect::ForgetRegistration);
        }
        _ => {}
    }

    plan
}

/// Workload status once the pass reached its fixed point.
pub fn summarize(s: &Snapshot<'_>) -> Status {
    if s.has(Flag::Stopped) {
        if s.has(Flag::Installed) {
            return Status::waiting("Waiting for the upstream relation to depart before removal");
        }
        return Status::maintenance("cAdvisor removed");
    }
    if s.has(Flag::Started) {
        let mut message = format!("cAdvisor running on port {}", s.port());
        if s.config.options().promreg_url().is_none() {
            message.push_str(", promreg_url unset");
        }
        return Status::active(message);
    }
    Status::waiting("Waiting for cAdvisor to start")
}
