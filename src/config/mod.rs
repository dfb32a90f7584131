//! Configuration module for the cAdvisor charm.
//!
//! Runtime settings are loaded from TOML; charm options come from the
//! lifecycle framework as JSON.

mod options;
mod settings;

pub use options::*;
pub use settings::*;
