//! Event dispatch and the fixed-point loop.

use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{ConfigView, Settings};
use crate::error::CharmError;
use crate::host::{Host, Status, UnitIdentity};
use crate::journal::{sanitize_options, Journal, PassEntry};
use crate::registration::RegistrationClient;
use crate::state::{StateStore, KEY_CONFIG};
use crate::templates::TemplateEngine;

use super::event::Event;
use super::flags::FlagSet;
use super::runner::EffectRunner;
use super::snapshot::Snapshot;
use super::transitions::{next_transition, preprocess, summarize, TransitionName};

/// Outcome of a pass that reached its fixed point.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub event: Event,
    /// Transitions fired, in order.
    pub transitions: Vec<TransitionName>,
    pub flags: FlagSet,
    pub status: Status,
}

/// Runs one pass per lifecycle event.
pub struct Dispatcher {
    settings: Settings,
    identity: UnitIdentity,
    host: Host,
    store: Box<dyn StateStore>,
    registry: RegistrationClient,
    templates: TemplateEngine,
    journal: Box<dyn Journal>,
}

impl Dispatcher {
    pub fn new(
        settings: Settings,
        host: Host,
        store: Box<dyn StateStore>,
        registry: RegistrationClient,
        templates: TemplateEngine,
        journal: Box<dyn Journal>,
    ) -> Self {
        Self {
            settings,
            identity: registry.identity().clone(),
            host,
            store,
            registry,
            templates,
            journal,
        }
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Previous option snapshot, used to build the next [`ConfigView`].
    pub fn previous_options(&self) -> Option<serde_json::Map<String, Value>> {
        match self.store.get(KEY_CONFIG) {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Evaluate `hook` to a fixed point and journal the outcome.
    pub fn dispatch(&mut self, hook: &str, config: &ConfigView) -> Result<PassReport, CharmError> {
        let started = Instant::now();
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let pass_id = Uuid::new_v4();
        let event = Event::parse(hook, &self.settings.relations);

        info!(pass_id = %pass_id, hook = %hook, event = %event, "Pass started");

        let mut fired = Vec::new();
        let result = self.converge(&event, config, &mut fired);

        let duration_ms = started.elapsed().as_millis() as u64;
        let options = sanitize_options(&Value::Object(config.raw().clone()));
        let transitions: Vec<String> = fired.iter().map(|t| t.to_string()).collect();

        let entry = match &result {
            Ok(report) => {
                info!(
                    pass_id = %pass_id,
                    transitions = ?transitions,
                    status = %report.status.message,
                    duration_ms = duration_ms,
                    "Pass converged"
                );
                PassEntry::success(
                    timestamp,
                    pass_id,
                    hook.to_string(),
                    options,
                    transitions,
                    flag_names(&report.flags),
                    format!("{}: {}", report.status.severity, report.status.message),
                    duration_ms,
                )
            }
            Err(e) => {
                error!(pass_id = %pass_id, error = %e, transitions = ?transitions, "Pass failed");
                let flags = FlagSet::load(self.store.as_ref()).unwrap_or_default();
                PassEntry::failure(
                    timestamp,
                    pass_id,
                    hook.to_string(),
                    options,
                    transitions,
                    flag_names(&flags),
                    e.code().to_string(),
                    e.to_string(),
                    duration_ms,
                )
            }
        };

        if let Err(e) = self.journal.record(&entry) {
            warn!(error = %e, "Failed to write pass journal");
        }

        result
    }

    fn converge(
        &mut self,
        event: &Event,
        config: &ConfigView,
        fired: &mut Vec<TransitionName>,
    ) -> Result<PassReport, CharmError> {
        let options = config.options();
        self.registry
            .configure(options.promreg_url(), &options.promreg_authtoken);

        let mut flags = FlagSet::load(self.store.as_ref())?;

        let plan = {
            let snapshot = self.capture(&flags, config)?;
            preprocess(event, &snapshot)
        };
        self.runner(config, &mut flags).apply(plan)?;

        let max = self.settings.limits.max_transitions_per_pass;
        let mut last: Option<TransitionName> = None;

        let status = loop {
            let snapshot = self.capture(&flags, config)?;
            let Some(transition) = next_transition(&snapshot) else {
                break summarize(&snapshot);
            };

            if last == Some(transition.name) {
                return Err(CharmError::Convergence {
                    message: format!("transition '{}' still enabled after it was applied", transition.name),
                });
            }
            if fired.len() >= max {
                return Err(CharmError::Convergence {
                    message: format!("no fixed point after {} transitions: {:?}", max, fired),
                });
            }

            info!(transition = %transition.name, "Transition fired");
            let plan = (transition.action)(&snapshot)?;
            drop(snapshot);

            self.runner(config, &mut flags).apply(plan)?;
            fired.push(transition.name);
            last = Some(transition.name);
        };

        self.host.status.set_status(&status)?;
        self.store.set(KEY_CONFIG, Value::Object(config.raw().clone()))?;

        Ok(PassReport {
            event: event.clone(),
            transitions: fired.clone(),
            flags,
            status,
        })
    }

    fn capture<'a>(&'a mut self, flags: &FlagSet, config: &'a ConfigView) -> Result<Snapshot<'a>, CharmError> {
        Snapshot::capture(
            flags,
            config,
            &self.settings.service,
            &self.identity,
            &mut self.host,
            self.store.as_ref(),
        )
    }

    fn runner<'a>(&'a mut self, config: &'a ConfigView, flags: &'a mut FlagSet) -> EffectRunner<'a> {
        EffectRunner {
            settings: &self.settings,
            config,
            host: &mut self.host,
            store: self.store.as_mut(),
            registry: &mut self.registry,
            templates: &self.templates,
            flags,
        }
    }
}

fn flag_names(flags: &FlagSet) -> Vec<String> {
    flags.names().into_iter().map(|n| n.to_string()).collect()
}
