//! Convergence controller.
//!
//! A pass takes one lifecycle [`Event`], adjusts the persisted flags for it,
//! then evaluates the transition table until no guard holds:
//!
//! | transition       | guard                                                    |
//! |------------------|----------------------------------------------------------|
//! | install          | `!installed && !stopped`                                 |
//! | configure        | `installed && !configured && !stopped`                   |
//! | restart          | `configured && !stopped && (do-restart \|\| !started)`   |
//! | record-principal | principal unit visible and not yet recorded              |
//! | publish          | `started && !stopped`, upstream available, inputs changed |
//! | teardown         | `stopped && installed`, upstream gone                    |
//!
//! Actions are pure: they turn a [`Snapshot`] into a [`Plan`] of [`Effect`]s
//! that the [`EffectRunner`] applies through the host collaborators.

mod dispatcher;
mod effect;
mod event;
mod flags;
mod runner;
mod snapshot;
mod transitions;

pub use dispatcher::{Dispatcher, PassReport};
pub use effect::{Effect, Plan};
pub use event::{Endpoint, Event, RelationChange};
pub use flags::{Flag, FlagSet};
pub use runner::{EffectRunner, PRINCIPAL_UNIT_KEY};
pub use snapshot::Snapshot;
pub use transitions::{
    next_transition, preprocess, summarize, Transition, TransitionName, CONFIGURE_OPTIONS, INSTALL_OPTIONS,
    TRANSITIONS,
};
