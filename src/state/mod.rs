//! Persistent local state.
//!
//! A flat key-value store that survives between invocations, plus the keys
//! the charm uses in it.

mod fingerprint;
mod store;

pub use fingerprint::{data_changed, fingerprint, record_data};
pub use store::{FileStateStore, MemoryStateStore, StateStore};

/// Last applied port.
pub const KEY_PORT: &str = "cadvisor.port";
/// Identifier of the principal unit.
pub const KEY_PRINCIPAL_UNIT: &str = "cadvisor.principal_unit";
/// Persisted convergence flags.
pub const KEY_FLAGS: &str = "cadvisor.flags";
/// Charm option snapshot of the previous invocation.
pub const KEY_CONFIG: &str = "cadvisor.config";
/// Fingerprint of the last published registration inputs.
pub const KEY_REGISTRATION: &str = "cadvisor.registration";
