//! Applies plans to the host, the registry and the state store.

use std::io::Write;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{ConfigView, Settings};
use crate::error::CharmError;
use crate::host::Host;
use crate::registration::{Labels, RegistrationClient};
use crate::state::{record_data, StateStore, KEY_PORT, KEY_PRINCIPAL_UNIT, KEY_REGISTRATION};
use crate::templates::{write_if_changed, FileSpec, TemplateEngine};

use super::effect::{Effect, Plan};
use super::flags::{Flag, FlagSet};

/// Relation key the principal unit is relayed under.
pub const PRINCIPAL_UNIT_KEY: &str = "principal-unit";

/// Everything effects are applied to.
pub struct EffectRunner<'a> {
    pub settings: &'a Settings,
    pub config: &'a ConfigView,
    pub host: &'a mut Host,
    pub store: &'a mut dyn StateStore,
    pub registry: &'a mut RegistrationClient,
    pub templates: &'a TemplateEngine,
    pub flags: &'a mut FlagSet,
}

impl EffectRunner<'_> {
    /// Apply every effect of `plan` in order, stopping at the first failure.
    pub fn apply(&mut self, plan: Plan) -> Result<(), CharmError> {
        for effect in plan {
            self.apply_effect(effect)?;
        }
        Ok(())
    }

    fn apply_effect(&mut self, effect: Effect) -> Result<(), CharmError> {
        debug!(effect = ?effect, "Applying effect");

        match effect {
            Effect::SetStatus(status) => self.host.status.set_status(&status)?,

            Effect::InstallFromUrl { url, proxy } => self.install_from_url(&url, proxy.as_deref())?,
            Effect::AddSource(source) => self.host.packages.add_source(&source)?,
            Effect::UpdatePackages => self.host.packages.update()?,
            Effect::InstallPackages(packages) => self.host.packages.install(&packages)?,
            Effect::PurgePackages(packages) => self.host.packages.purge(&packages)?,

            Effect::RenderConfig => {
                if self.render_config()? {
                    self.set_flag(Flag::DoRestart)?;
                }
            }
            Effect::OpenPort(port) => self.host.ports.open_port(port)?,
            Effect::ClosePort(port) => self.host.ports.close_port(port)?,
            Effect::PersistPort(port) => self.store.set(KEY_PORT, json!(port))?,
            Effect::ForgetPort => self.store.unset(KEY_PORT)?,

            Effect::StartOrRestart => {
                let unit = &self.settings.service.unit;
                if self.host.services.is_running(unit)? {
                    self.host.services.restart(unit)?;
                } else {
                    self.host.services.start(unit)?;
                }
            }
            Effect::StopService => self.host.services.stop(&self.settings.service.unit)?,

            Effect::PublishEndpoint { address, port } => self.host.upstream.configure(&address, port)?,
            Effect::Register { address, port } => {
                self.registry.register(Some(&address), port, &Labels::new())?;
            }
            Effect::Deregister { address, port } => {
                self.registry.deregister(Some(&address), port)?;
            }
            Effect::PropagatePrincipal(unit) => {
                for conversation in self.host.upstream.conversations()? {
                    self.host
                        .upstream
                        .set_remote(&conversation, PRINCIPAL_UNIT_KEY, &unit)?;
                }
            }
            Effect::PersistPrincipal(unit) => {
                info!(principal = %unit, "Principal unit recorded");
                self.store.set(KEY_PRINCIPAL_UNIT, Value::String(unit))?;
            }
            Effect::RecordRegistration(inputs) => record_data(self.store, KEY_REGISTRATION, &inputs)?,
            Effect::ForgetRegistration => self.store.unset(KEY_REGISTRATION)?,

            Effect::SetFlag(flag) => self.set_flag(flag)?,
            Effect::ClearFlag(flag) => {
                if self.flags.clear(flag) {
                    info!(flag = %flag, "Flag cleared");
                    self.flags.save(self.store)?;
                }
            }
        }

        Ok(())
    }

    fn set_flag(&mut self, flag: Flag) -> Result<(), CharmError> {
        if self.flags.set(flag) {
            info!(flag = %flag, "Flag set");
            self.flags.save(self.store)?;
        }
        Ok(())
    }

    /// Download the package file next to other downloads and install it.
    /// The temporary file is removed when this returns.
    fn install_from_url(&mut self, url: &str, proxy: Option<&str>) -> Result<(), CharmError> {
        let download_dir = &self.settings.paths.download_dir;
        std::fs::create_dir_all(download_dir)?;

        let mut file = tempfile::Builder::new()
            .prefix("cadvisor-")
            .suffix(".deb")
            .tempfile_in(download_dir)?;

        self.host.fetcher.fetch(url, proxy, file.as_file_mut())?;
        file.as_file_mut().flush()?;

        self.host.packages.install_file(file.path())
    }

    /// Render the defaults file; returns whether its content changed.
    fn render_config(&mut self) -> Result<bool, CharmError> {
        let identity = self.registry.identity();
        let context = json!({
            "config": self.config.raw(),
            "listen_address": identity.private_address,
            "unit_name": identity.unit_name,
        });
        let content = self.templates.render(&self.settings.service.template, &context)?;

        let service = &self.settings.service;
        let spec = FileSpec {
            path: self.settings.paths.config_file.clone(),
            mode: self.settings.config_mode()?,
            owner: non_empty(&service.config_owner),
            group: non_empty(&service.config_group),
        };
        write_if_changed(&spec, &content)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
