//! Prometheus target registration client.
//!
//! Targets are identified by their `host:port` address. Every write is
//! preceded by a lookup so create, update, no-op and delete are decided by
//! comparing the registered labels with the computed ones.

mod client;
mod labels;
mod transport;

pub use client::{DeregisterOutcome, RegisterOutcome, RegistrationClient};
pub use labels::{build_target, combined_labels, default_labels, Labels};
pub use transport::{HttpMethod, HttpTransport, RecordedRequest, RegistryResponse, ScriptedTransport, Transport};
