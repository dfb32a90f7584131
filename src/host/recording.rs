//! In-memory host used by tests.
//!
//! Every collaborator records its calls into one shared log so a test can
//! assert on the exact sequence of external side effects of a pass.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use crate::error::CharmError;
use crate::validation::PackageSource;

use super::traits::{
    Conversation, Fetcher, Host, PackageManager, PortManager, Relation, ServiceManager, Status, StatusReporter,
};

/// One recorded side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    AddSource(String),
    UpdatePackages,
    InstallPackages(Vec<String>),
    /// Local package install; carries the file content, the path is random.
    InstallFile(Vec<u8>),
    Purge(Vec<String>),
    Start(String),
    Restart(String),
    Stop(String),
    OpenPort(u16),
    ClosePort(u16),
    Status(Status),
    Fetch { url: String, proxy: Option<String> },
    RelationSet {
        relation: String,
        relation_id: String,
        key: String,
        value: String,
    },
}

impl HostCall {
    /// Whether the call went to the package manager.
    pub fn is_package_call(&self) -> bool {
        matches!(
            self,
            HostCall::AddSource(_)
                | HostCall::UpdatePackages
                | HostCall::InstallPackages(_)
                | HostCall::InstallFile(_)
                | HostCall::Purge(_)
        )
    }
}

#[derive(Debug, Default)]
struct RelationInstance {
    units: Vec<String>,
    /// (unit, key) -> value published by remote units.
    remote: BTreeMap<(String, String), String>,
    /// Data published by this unit.
    local: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<HostCall>,
    running: bool,
    fail_packages: bool,
    download: Vec<u8>,
    relations: BTreeMap<String, BTreeMap<String, RelationInstance>>,
}

impl Recorded {
    fn record(&mut self, call: HostCall) {
        self.calls.push(call);
    }

    fn package_call(&mut self, call: HostCall) -> Result<(), CharmError> {
        self.record(call);
        if self.fail_packages {
            return Err(CharmError::execution_failed("package manager exited with status 100"));
        }
        Ok(())
    }
}

/// Handle on the shared recording; cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    shared: Rc<RefCell<Recorded>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`Host`] whose collaborators record into this handle.
    pub fn host(&self, upstream: &str, principal: &str) -> Host {
        Host {
            packages: Box::new(FakePackages(self.clone())),
            services: Box::new(FakeServices(self.clone())),
            ports: Box::new(FakePorts(self.clone())),
            status: Box::new(FakeStatus(self.clone())),
            fetcher: Box::new(FakeFetcher(self.clone())),
            upstream: Box::new(FakeRelation {
                name: upstream.to_string(),
                recording: self.clone(),
            }),
            principal: Box::new(FakeRelation {
                name: principal.to_string(),
                recording: self.clone(),
            }),
        }
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<HostCall> {
        self.shared.borrow().calls.clone()
    }

    /// Recorded calls other than status updates.
    pub fn actions(&self) -> Vec<HostCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, HostCall::Status(_)))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.shared.borrow_mut().calls.clear();
    }

    pub fn set_running(&self, running: bool) {
        self.shared.borrow_mut().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.shared.borrow().running
    }

    /// Make every package manager call fail after being recorded.
    pub fn fail_package_calls(&self, fail: bool) {
        self.shared.borrow_mut().fail_packages = fail;
    }

    /// Content served for any download.
    pub fn set_download(&self, content: &[u8]) {
        self.shared.borrow_mut().download = content.to_vec();
    }

    /// Add `unit` to relation instance `relation_id` of endpoint `relation`.
    pub fn join(&self, relation: &str, relation_id: &str, unit: &str) {
        let mut shared = self.shared.borrow_mut();
        let instance = shared
            .relations
            .entry(relation.to_string())
            .or_default()
            .entry(relation_id.to_string())
            .or_default();
        if !instance.units.iter().any(|u| u == unit) {
            instance.units.push(unit.to_string());
        }
    }

    /// Remove `unit` from a relation instance.
    pub fn depart(&self, relation: &str, relation_id: &str, unit: &str) {
        let mut shared = self.shared.borrow_mut();
        if let Some(instance) = shared
            .relations
            .get_mut(relation)
            .and_then(|instances| instances.get_mut(relation_id))
        {
            instance.units.retain(|u| u != unit);
        }
    }

    /// Set data published by a remote unit.
    pub fn set_remote_data(&self, relation: &str, relation_id: &str, unit: &str, key: &str, value: &str) {
        self.join(relation, relation_id, unit);
        let mut shared = self.shared.borrow_mut();
        if let Some(instance) = shared
            .relations
            .get_mut(relation)
            .and_then(|instances| instances.get_mut(relation_id))
        {
            instance
                .remote
                .insert((unit.to_string(), key.to_string()), value.to_string());
        }
    }

    /// Data this unit published on a relation instance.
    pub fn published(&self, relation: &str, relation_id: &str, key: &str) -> Option<String> {
        self.shared
            .borrow()
            .relations
            .get(relation)
            .and_then(|instances| instances.get(relation_id))
            .and_then(|instance| instance.local.get(key).cloned())
    }
}

struct FakePackages(RecordingHost);

impl PackageManager for FakePackages {
    fn add_source(&mut self, source: &PackageSource) -> Result<(), CharmError> {
        self.0
            .shared
            .borrow_mut()
            .package_call(HostCall::AddSource(source.source.clone()))
    }

    fn update(&mut self) -> Result<(), CharmError> {
        self.0.shared.borrow_mut().package_call(HostCall::UpdatePackages)
    }

    fn install(&mut self, packages: &[String]) -> Result<(), CharmError> {
        self.0
            .shared
            .borrow_mut()
            .package_call(HostCall::InstallPackages(packages.to_vec()))
    }

    fn install_file(&mut self, path: &Path) -> Result<(), CharmError> {
        let content = std::fs::read(path)?;
        self.0.shared.borrow_mut().package_call(HostCall::InstallFile(content))
    }

    fn purge(&mut self, packages: &[String]) -> Result<(), CharmError> {
        self.0
            .shared
            .borrow_mut()
            .package_call(HostCall::Purge(packages.to_vec()))
    }
}

struct FakeServices(RecordingHost);

impl ServiceManager for FakeServices {
    fn is_running(&mut self, _unit: &str) -> Result<bool, CharmError> {
        Ok(self.0.shared.borrow().running)
    }

    fn start(&mut self, unit: &str) -> Result<(), CharmError> {
        let mut shared = self.0.shared.borrow_mut();
        shared.record(HostCall::Start(unit.to_string()));
        shared.running = true;
        Ok(())
    }

    fn restart(&mut self, unit: &str) -> Result<(), CharmError> {
        let mut shared = self.0.shared.borrow_mut();
        shared.record(HostCall::Restart(unit.to_string()));
        shared.running = true;
        Ok(())
    }

    fn stop(&mut self, unit: &str) -> Result<(), CharmError> {
        let mut shared = self.0.shared.borrow_mut();
        shared.record(HostCall::Stop(unit.to_string()));
        shared.running = false;
        Ok(())
    }
}

struct FakePorts(RecordingHost);

impl PortManager for FakePorts {
    fn open_port(&mut self, port: u16) -> Result<(), CharmError> {
        self.0.shared.borrow_mut().record(HostCall::OpenPort(port));
        Ok(())
    }

    fn close_port(&mut self, port: u16) -> Result<(), CharmError> {
        self.0.shared.borrow_mut().record(HostCall::ClosePort(port));
        Ok(())
    }
}

struct FakeStatus(RecordingHost);

impl StatusReporter for FakeStatus {
    fn set_status(&mut self, status: &Status) -> Result<(), CharmError> {
        self.0.shared.borrow_mut().record(HostCall::Status(status.clone()));
        Ok(())
    }
}

struct FakeFetcher(RecordingHost);

impl Fetcher for FakeFetcher {
    fn fetch(&mut self, url: &str, proxy: Option<&str>, dest: &mut dyn Write) -> Result<u64, CharmError> {
        let content = {
            let mut shared = self.0.shared.borrow_mut();
            shared.record(HostCall::Fetch {
                url: url.to_string(),
                proxy: proxy.map(|p| p.to_string()),
            });
            shared.download.clone()
        };
        dest.write_all(&content)?;
        Ok(content.len() as u64)
    }
}

struct FakeRelation {
    name: String,
    recording: RecordingHost,
}

impl Relation for FakeRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn conversations(&mut self) -> Result<Vec<Conversation>, CharmError> {
        let shared = self.recording.shared.borrow();
        Ok(shared
            .relations
            .get(&self.name)
            .map(|instances| {
                instances
                    .iter()
                    .map(|(id, instance)| Conversation {
                        relation_id: id.clone(),
                        remote_units: instance.units.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_remote(&mut self, conversation: &Conversation, unit: &str, key: &str) -> Result<Option<String>, CharmError> {
        let shared = self.recording.shared.borrow();
        Ok(shared
            .relations
            .get(&self.name)
            .and_then(|instances| instances.get(&conversation.relation_id))
            .and_then(|instance| instance.remote.get(&(unit.to_string(), key.to_string())).cloned()))
    }

    fn set_remote(&mut self, conversation: &Conversation, key: &str, value: &str) -> Result<(), CharmError> {
        let mut shared = self.recording.shared.borrow_mut();
        shared.record(HostCall::RelationSet {
            relation: self.name.clone(),
            relation_id: conversation.relation_id.clone(),
            key: key.to_string(),
            value: value.to_string(),
        });
        shared
            .relations
            .entry(self.name.clone())
            .or_default()
            .entry(conversation.relation_id.clone())
            .or_default()
            .local
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_services_track_running_state() {
        let recording = RecordingHost::new();
        let mut host = recording.host("target", "juju-info");

        assert!(!host.services.is_running("cadvisor").unwrap());
        host.services.start("cadvisor").unwrap();
        assert!(host.services.is_running("cadvisor").unwrap());
        host.services.stop("cadvisor").unwrap();
        assert!(!recording.is_running());

        assert_eq!(
            recording.calls(),
            vec![HostCall::Start("cadvisor".into()), HostCall::Stop("cadvisor".into())]
        );
    }

    #[test]
    fn test_relation_availability_and_configure() {
        let recording = RecordingHost::new();
        let mut host = recording.host("target", "juju-info");

        assert!(!host.upstream.is_available().unwrap());
        recording.join("target", "target:1", "prometheus/0");
        assert!(host.upstream.is_available().unwrap());

        host.upstream.configure("10.0.0.5", 9103).unwrap();
        assert_eq!(recording.published("target", "target:1", "hostname").as_deref(), Some("10.0.0.5"));
        assert_eq!(recording.published("target", "target:1", "port").as_deref(), Some("9103"));

        recording.depart("target", "target:1", "prometheus/0");
        assert!(!host.upstream.is_available().unwrap());
    }

    #[test]
    fn test_remote_data_is_per_unit() {
        let recording = RecordingHost::new();
        let mut host = recording.host("target", "juju-info");
        recording.set_remote_data("juju-info", "juju-info:2", "ubuntu/0", "private-address", "10.0.0.9");

        let conversations = host.principal.conversations().unwrap();
        assert_eq!(conversations[0].remote_units, vec!["ubuntu/0".to_string()]);
        assert_eq!(
            host.principal
                .get_remote(&conversations[0], "ubuntu/0", "private-address")
                .unwrap()
                .as_deref(),
            Some("10.0.0.9")
        );
        assert_eq!(
            host.principal
                .get_remote(&conversations[0], "ubuntu/1", "private-address")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_failing_packages_still_record() {
        let recording = RecordingHost::new();
        let mut host = recording.host("target", "juju-info");
        recording.fail_package_calls(true);

        assert!(host.packages.update().is_err());
        assert_eq!(recording.calls(), vec![HostCall::UpdatePackages]);
        assert!(recording.calls()[0].is_package_call());
    }
}
