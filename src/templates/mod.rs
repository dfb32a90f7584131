//! Template rendering for the daemon defaults file.

mod engine;
mod writer;

pub use engine::{TemplateEngine, BUILTIN_TEMPLATE};
pub use writer::{write_if_changed, FileSpec};
