//! cAdvisor charm library.
//!
//! This crate deploys the cAdvisor container-metrics daemon on a unit managed
//! by a declarative lifecycle framework, converges it to the configured state
//! on every hook, and registers it as a scrape target with a Prometheus
//! registration service.

pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod journal;
pub mod lifecycle;
pub mod registration;
pub mod state;
pub mod templates;
pub mod validation;
