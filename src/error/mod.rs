//! Error types for the cAdvisor charm.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
