//! Observed state fed to transition guards and actions.

use serde_json::{json, Value};
use tracing::debug;

use crate::config::{ConfigView, ServiceConfig};
use crate::error::CharmError;
use crate::host::{Host, Relation, UnitIdentity};
use crate::state::{data_changed, StateStore, KEY_PORT, KEY_PRINCIPAL_UNIT, KEY_REGISTRATION};

use super::flags::{Flag, FlagSet};
use super::runner::PRINCIPAL_UNIT_KEY;

/// Everything a transition may look at, captured before it is evaluated.
///
/// Guards and actions are pure functions of a snapshot; the dispatcher takes
/// a fresh one after every applied plan.
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    pub flags: FlagSet,
    pub config: &'a ConfigView,
    pub service: &'a ServiceConfig,
    pub identity: &'a UnitIdentity,
    /// Last applied port.
    pub persisted_port: Option<u16>,
    /// Principal unit recorded by an earlier pass.
    pub persisted_principal: Option<String>,
    /// Principal unit currently visible on the principal relation.
    pub principal_unit: Option<String>,
    pub upstream_available: bool,
    pub service_running: bool,
    /// Whether the registration inputs differ from the last published ones.
    pub registration_changed: bool,
}

impl<'a> Snapshot<'a> {
    /// Observe the host and the state store.
    pub fn capture(
        flags: &FlagSet,
        config: &'a ConfigView,
        service: &'a ServiceConfig,
        identity: &'a UnitIdentity,
        host: &mut Host,
        store: &dyn StateStore,
    ) -> Result<Self, CharmError> {
        let persisted_port = store.get_u64(KEY_PORT).and_then(|p| u16::try_from(p).ok());
        let persisted_principal = store.get_string(KEY_PRINCIPAL_UNIT);

        let principal_unit = principal_unit(host.principal.as_mut())?;
        let upstream_available = host.upstream.is_available()?;
        let service_running = host.services.is_running(&service.unit)?;

        let mut snapshot = Self {
            flags: flags.clone(),
            config,
            service,
            identity,
            persisted_port,
            persisted_principal,
            principal_unit,
            upstream_available,
            service_running,
            registration_changed: false,
        };
        snapshot.registration_changed = data_changed(store, KEY_REGISTRATION, &snapshot.registration_inputs());

        debug!(
            flags = ?snapshot.flags.names(),
            persisted_port = ?snapshot.persisted_port,
            upstream_available = snapshot.upstream_available,
            service_running = snapshot.service_running,
            registration_changed = snapshot.registration_changed,
            "State captured"
        );

        Ok(snapshot)
    }

    pub fn has(&self, flag: Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Port requested by the current options.
    pub fn port(&self) -> u16 {
        self.config.options().port
    }

    /// Address advertised to the upstream relation and the registry.
    pub fn address(&self) -> &str {
        &self.identity.private_address
    }

    /// Inputs whose change requires publishing the endpoint again.
    pub fn registration_inputs(&self) -> Value {
        json!({
            "address": self.address(),
            "port": self.port(),
            "principal_unit": self.persisted_principal,
            "promreg_url": self.config.options().promreg_url(),
        })
    }
}

/// Identifier of the principal unit.
///
/// A unit that itself relays a principal publishes it under
/// `principal-unit`; otherwise the remote unit is the principal.
fn principal_unit(relation: &mut dyn Relation) -> Result<Option<String>, CharmError> {
    for conversation in relation.conversations()? {
        if let Some(unit) = conversation.remote_units.first() {
            let relayed = relation
                .get_remote(&conversation, unit, PRINCIPAL_UNIT_KEY)?
                .filter(|value| !value.is_empty());
            return Ok(Some(relayed.unwrap_or_else(|| unit.clone())));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;

    #[test]
    fn test_principal_is_remote_unit() {
        let recording = RecordingHost::new();
        let mut host = recording.host("target", "juju-info");
        assert_eq!(principal_unit(host.principal.as_mut()).unwrap(), None);

        recording.join("juju-info", "juju-info:2", "ubuntu/0");
        assert_eq!(
            principal_unit(host.principal.as_mut()).unwrap().as_deref(),
            Some("ubuntu/0")
        );
    }

    #[test]
    fn test_relayed_principal_wins() {
        let recording = RecordingHost::new();
        let mut host = recording.host("target", "juju-info");
        recording.set_remote_data("juju-info", "juju-info:2", "filebeat/0", "principal-unit", "mysql/1");

        assert_eq!(
            principal_unit(host.principal.as_mut()).unwrap().as_deref(),
            Some("mysql/1")
        );
    }
}
