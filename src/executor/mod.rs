//! Command executor module.
//!
//! Handles subprocess spawning with timeouts and output sanitization.

mod output;
mod subprocess;

pub use output::sanitize_output;
pub use subprocess::{SubprocessBuilder, SubprocessResult};
