//! Pass journal.
//!
//! One JSON line per evaluation pass: which hook ran, which transitions
//! fired, the resulting flags and the outcome. Charm options are recorded
//! with secrets redacted.

mod entry;
mod logger;
mod sanitize;

pub use entry::{PassEntry, PassResult};
pub use logger::{Journal, JournalLogger, MemoryJournal, NullJournal};
pub use sanitize::sanitize_options;
