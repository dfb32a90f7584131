//! External collaborators of a convergence pass.
//!
//! - [`traits`]: the interfaces the convergence logic is written against
//! - [`apt`], [`systemd`], [`hooktools`], [`fetch`]: production implementations
//! - [`recording`]: in-memory fakes for tests

mod apt;
mod fetch;
mod hooktools;
mod recording;
mod systemd;
mod traits;

pub use apt::AptPackageManager;
pub use fetch::HttpFetcher;
pub use hooktools::{HookRelation, HookTools};
pub use recording::{HostCall, RecordingHost};
pub use systemd::SystemdServiceManager;
pub use traits::{
    Conversation, Fetcher, Host, PackageManager, PortManager, Relation, ServiceManager, Severity, Status,
    StatusReporter, UnitIdentity,
};
