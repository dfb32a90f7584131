//! Target registration with create/update/no-op/delete semantics.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::CharmError;
use crate::host::UnitIdentity;

use super::labels::{build_target, combined_labels, default_labels, Labels};
use super::transport::{HttpMethod, RegistryResponse, Transport};

/// Body the registry answers a DELETE of an unknown target with.
const ALREADY_DELETED: &str = "Storage Error host not found unable to delete";

/// What [`RegistrationClient::register`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// No registry URL configured.
    Skipped,
    Created,
    Updated,
    Unchanged,
}

/// What [`RegistrationClient::deregister`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeregisterOutcome {
    /// No registry URL configured.
    Skipped,
    /// The target was not registered.
    Absent,
    Deleted,
    /// The registry lost the target between the lookup and the delete.
    AlreadyDeleted,
}

/// Client of the target registration service.
pub struct RegistrationClient {
    transport: Box<dyn Transport>,
    identity: UnitIdentity,
    charm_name: String,
    url: Option<String>,
    token: String,
}

impl RegistrationClient {
    pub fn new(transport: Box<dyn Transport>, identity: UnitIdentity, charm_name: &str) -> Self {
        Self {
            transport,
            identity,
            charm_name: charm_name.to_string(),
            url: None,
            token: String::new(),
        }
    }

    /// Point the client at a registry. An unset URL turns every call into a no-op.
    pub fn with_registry(mut self, url: Option<&str>, token: &str) -> Self {
        self.configure(url, token);
        self
    }

    /// Replace the registry URL and token, e.g. after the options changed.
    pub fn configure(&mut self, url: Option<&str>, token: &str) {
        self.url = url.map(|u| u.trim_end_matches('/').to_string());
        self.token = token.trim_end_matches('\n').to_string();
    }

    pub fn identity(&self) -> &UnitIdentity {
        &self.identity
    }

    pub fn build_target(&self, host: Option<&str>, port: u16) -> String {
        build_target(host, port, &self.identity)
    }

    pub fn default_labels(&self) -> Labels {
        default_labels(&self.identity)
    }

    /// Register `host:port`, or update its labels when they differ.
    pub fn register(&mut self, host: Option<&str>, port: u16, custom_labels: &Labels) -> Result<RegisterOutcome, CharmError> {
        let target = self.build_target(host, port);
        let Some(url) = self.target_url(&target) else {
            info!(target = %target, "promreg_url is unset, not registering target");
            return Ok(RegisterOutcome::Skipped);
        };

        let labels = combined_labels(&self.identity, custom_labels);
        let current = self.lookup("register", &url, &target)?;

        let comment = format!("Added by charm {}", self.charm_name);
        let body = json!({ "comment": comment, "labels": labels });

        let (method, outcome) = match current {
            None => (HttpMethod::Post, RegisterOutcome::Created),
            Some(existing) if existing == labels => {
                debug!(target = %target, "Target labels up to date");
                return Ok(RegisterOutcome::Unchanged);
            }
            Some(_) => (HttpMethod::Put, RegisterOutcome::Updated),
        };

        let response = self.transport.send(method, &url, &self.token, Some(&body))?;
        if !response.is_success() {
            return Err(registration_error("register", &target, response));
        }

        info!(target = %target, method = %method, "Target registered");
        Ok(outcome)
    }

    /// Remove `host:port` from the registry if it is registered.
    pub fn deregister(&mut self, host: Option<&str>, port: u16) -> Result<DeregisterOutcome, CharmError> {
        let target = self.build_target(host, port);
        let Some(url) = self.target_url(&target) else {
            info!(target = %target, "promreg_url is unset, not deregistering target");
            return Ok(DeregisterOutcome::Skipped);
        };

        if self.lookup("deregister", &url, &target)?.is_none() {
            debug!(target = %target, "Target not registered");
            return Ok(DeregisterOutcome::Absent);
        }

        let body = json!({ "comment": format!("Delete by charm {}", self.charm_name) });
        let response = self
            .transport
            .send(HttpMethod::Delete, &url, &self.token, Some(&body))?;

        if response.is_ok() {
            info!(target = %target, "Target deregistered");
            return Ok(DeregisterOutcome::Deleted);
        }
        if response.status == 500 && response.text == ALREADY_DELETED {
            warn!(target = %target, "Target already removed from the registry");
            return Ok(DeregisterOutcome::AlreadyDeleted);
        }

        Err(registration_error("deregister", &target, response))
    }

    fn target_url(&self, target: &str) -> Option<String> {
        self.url
            .as_deref()
            .map(|base| format!("{}/targets/{}", base, target))
    }

    /// Labels of the registered target, `None` when it is not registered.
    fn lookup(&mut self, action: &str, url: &str, target: &str) -> Result<Option<Labels>, CharmError> {
        let response = self.transport.send(HttpMethod::Get, url, &self.token, None)?;
        if !response.is_ok() {
            return Err(registration_error(action, target, response));
        }
        if response.text.trim() == "null" {
            return Ok(None);
        }

        let parsed: Value = serde_json::from_str(&response.text).map_err(|_| CharmError::Registration {
            action: action.to_string(),
            target: target.to_string(),
            status: response.status,
            body: response.text.clone(),
        })?;

        match parsed {
            Value::Null => Ok(None),
            Value::Array(entries) if entries.is_empty() => Ok(None),
            Value::Array(entries) => Ok(Some(existing_labels(target, &entries[0]))),
            _ => Err(CharmError::Registration {
                action: action.to_string(),
                target: target.to_string(),
                status: response.status,
                body: response.text,
            }),
        }
    }
}

/// Labels of a registry entry. Missing or malformed labels count as none,
/// which makes the next registration rewrite them.
fn existing_labels(target: &str, entry: &Value) -> Labels {
    let Some(labels) = entry.get("labels") else {
        warn!(target = %target, "Registered target has no labels");
        return Labels::new();
    };
    match serde_json::from_value(labels.clone()) {
        Ok(labels) => labels,
        Err(e) => {
            warn!(target = %target, error = %e, labels = %labels, "Registered target has malformed labels");
            Labels::new()
        }
    }
}

fn registration_error(action: &str, target: &str, response: RegistryResponse) -> CharmError {
    CharmError::Registration {
        action: action.to_string(),
        target: target.to_string(),
        status: response.status,
        body: response.text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::transport::ScriptedTransport;

    const BASE: &str = "http://127.0.0.1:12321";

    fn identity() -> UnitIdentity {
        UnitIdentity {
            hostname: "node-1".to_string(),
            unit_name: "cadvisor/0".to_string(),
            private_address: "127.0.1.1".to_string(),
            model_name: Some("prod".to_string()),
            env_name: None,
        }
    }

    fn client(transport: &ScriptedTransport) -> RegistrationClient {
        RegistrationClient::new(Box::new(transport.clone()), identity(), "cadvisor").with_registry(Some(BASE), "abc\n")
    }

    fn existing(labels: &Labels) -> String {
        json!([{ "comment": "Added by charm cadvisor", "labels": labels }]).to_string()
    }

    #[test]
    fn test_no_url_is_noop() {
        let transport = ScriptedTransport::new();
        let mut client =
            RegistrationClient::new(Box::new(transport.clone()), identity(), "cadvisor").with_registry(None, "abc");

        assert_eq!(client.register(None, 9103, &Labels::new()).unwrap(), RegisterOutcome::Skipped);
        assert_eq!(client.deregister(None, 9103).unwrap(), DeregisterOutcome::Skipped);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_register_creates_missing_target() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "null").respond(201, "");

        let outcome = client(&transport).register(None, 9103, &Labels::new()).unwrap();
        assert_eq!(outcome, RegisterOutcome::Created);

        let requests = transport.requests();
        assert_eq!(transport.methods(), vec![HttpMethod::Get, HttpMethod::Post]);
        assert_eq!(requests[0].url, "http://127.0.0.1:12321/targets/127.0.1.1:9103");
        assert_eq!(requests[0].token, "abc");
        assert_eq!(requests[0].body, None);

        let body = requests[1].body.clone().unwrap();
        assert_eq!(body["comment"], "Added by charm cadvisor");
        assert_eq!(body["labels"]["juju_unit"], "cadvisor/0");
        assert_eq!(body["labels"]["juju_model"], "prod");
    }

    #[test]
    fn test_register_empty_array_counts_as_missing() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "[]").respond(200, "");

        let outcome = client(&transport).register(None, 9103, &Labels::new()).unwrap();
        assert_eq!(outcome, RegisterOutcome::Created);
    }

    #[test]
    fn test_register_unchanged_labels_is_noop() {
        let transport = ScriptedTransport::new();
        let labels = combined_labels(&identity(), &Labels::new());
        transport.respond(200, &existing(&labels));

        let outcome = client(&transport).register(None, 9103, &Labels::new()).unwrap();
        assert_eq!(outcome, RegisterOutcome::Unchanged);
        assert_eq!(transport.methods(), vec![HttpMethod::Get]);
    }

    #[test]
    fn test_register_updates_changed_labels() {
        let transport = ScriptedTransport::new();
        transport.respond(200, &existing(&default_labels(&identity()))).respond(200, "");

        let mut custom = Labels::new();
        custom.insert("team".to_string(), "infra".to_string());

        let outcome = client(&transport).register(None, 9103, &custom).unwrap();
        assert_eq!(outcome, RegisterOutcome::Updated);
        assert_eq!(transport.methods(), vec![HttpMethod::Get, HttpMethod::Put]);
        assert_eq!(transport.requests()[1].body.as_ref().unwrap()["labels"]["team"], "infra");
    }

    #[test]
    fn test_register_rewrites_malformed_labels() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, &json!([{ "labels": { "host": ["node-1"] } }]).to_string())
            .respond(200, "");

        let outcome = client(&transport).register(None, 9103, &Labels::new()).unwrap();
        assert_eq!(outcome, RegisterOutcome::Updated);
        assert_eq!(transport.methods(), vec![HttpMethod::Get, HttpMethod::Put]);
    }

    #[test]
    fn test_existing_labels_fallbacks() {
        assert!(existing_labels("t:1", &json!({ "comment": "no labels" })).is_empty());
        assert!(existing_labels("t:1", &json!({ "labels": "host=node-1" })).is_empty());
        assert_eq!(
            existing_labels("t:1", &json!({ "labels": { "host": "node-1" } })).get("host"),
            Some(&"node-1".to_string())
        );
    }

    #[test]
    fn test_register_lookup_failure() {
        let transport = ScriptedTransport::new();
        transport.respond(403, "bad token");

        let err = client(&transport).register(None, 9103, &Labels::new()).unwrap_err();
        match err {
            CharmError::Registration { status, body, .. } => {
                assert_eq!(status, 403);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.methods(), vec![HttpMethod::Get]);
    }

    #[test]
    fn test_register_write_failure() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "null").respond(302, "moved");

        let err = client(&transport).register(None, 9103, &Labels::new()).unwrap_err();
        assert!(matches!(err, CharmError::Registration { status: 302, .. }));
    }

    #[test]
    fn test_deregister_absent_target_is_noop() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "null");

        let outcome = client(&transport).deregister(None, 9103).unwrap();
        assert_eq!(outcome, DeregisterOutcome::Absent);
        assert_eq!(transport.methods(), vec![HttpMethod::Get]);
    }

    #[test]
    fn test_deregister_deletes_existing_target() {
        let transport = ScriptedTransport::new();
        transport.respond(200, &existing(&Labels::new())).respond(200, "");

        let outcome = client(&transport).deregister(Some("127.0.1.1"), 9103).unwrap();
        assert_eq!(outcome, DeregisterOutcome::Deleted);
        assert_eq!(transport.methods(), vec![HttpMethod::Get, HttpMethod::Delete]);
        assert_eq!(
            transport.requests()[1].body,
            Some(json!({ "comment": "Delete by charm cadvisor" }))
        );
    }

    #[test]
    fn test_deregister_host_not_found_is_success() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, &existing(&Labels::new()))
            .respond(500, ALREADY_DELETED);

        let outcome = client(&transport).deregister(None, 9103).unwrap();
        assert_eq!(outcome, DeregisterOutcome::AlreadyDeleted);
    }

    #[test]
    fn test_deregister_other_failure() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, &existing(&Labels::new()))
            .respond(500, "Storage Error disk full");

        let err = client(&transport).deregister(None, 9103).unwrap_err();
        assert!(matches!(err, CharmError::Registration { status: 500, .. }));
    }

    #[test]
    fn test_trailing_slash_in_url_is_ignored() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "null");
        let mut client = RegistrationClient::new(Box::new(transport.clone()), identity(), "cadvisor")
            .with_registry(Some("http://registry:8080/"), "abc");

        client.deregister(None, 9103).unwrap();
        assert_eq!(transport.requests()[0].url, "http://registry:8080/targets/127.0.1.1:9103");
    }
}
