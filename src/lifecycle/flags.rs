//! Convergence flags.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CharmError;
use crate::state::{StateStore, KEY_FLAGS};

/// A named boolean recording convergence progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flag {
    Installed,
    Configured,
    Started,
    Stopped,
    DoRestart,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Installed => "installed",
            Flag::Configured => "configured",
            Flag::Started => "started",
            Flag::Stopped => "stopped",
            Flag::DoRestart => "do-restart",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of flags currently raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagSet(BTreeSet<Flag>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.0.contains(&flag)
    }

    /// Raise `flag`; returns whether it was newly raised.
    pub fn set(&mut self, flag: Flag) -> bool {
        self.0.insert(flag)
    }

    /// Clear `flag`; returns whether it was raised before.
    pub fn clear(&mut self, flag: Flag) -> bool {
        self.0.remove(&flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        self.0.iter().copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|f| f.as_str()).collect()
    }

    /// Flags persisted by the previous invocation; empty on first run.
    pub fn load(store: &dyn StateStore) -> Result<Self, CharmError> {
        match store.get(KEY_FLAGS) {
            None => Ok(Self::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| CharmError::State {
                message: format!("Corrupt flag set under '{}': {}", KEY_FLAGS, e),
            }),
        }
    }

    pub fn save(&self, store: &mut dyn StateStore) -> Result<(), CharmError> {
        store.set(KEY_FLAGS, serde_json::to_value(self)?)
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;

    #[test]
    fn test_set_and_clear() {
        let mut flags = FlagSet::new();
        assert!(flags.set(Flag::Installed));
        assert!(!flags.set(Flag::Installed));
        assert!(flags.contains(Flag::Installed));
        assert!(flags.clear(Flag::Installed));
        assert!(!flags.clear(Flag::Installed));
    }

    #[test]
    fn test_persisted_as_flag_names() {
        let mut store = MemoryStateStore::new();
        let flags: FlagSet = [Flag::DoRestart, Flag::Installed].into_iter().collect();
        flags.save(&mut store).unwrap();

        assert_eq!(
            store.get(KEY_FLAGS),
            Some(serde_json::json!(["installed", "do-restart"]))
        );
        assert_eq!(FlagSet::load(&store).unwrap(), flags);
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let mut store = MemoryStateStore::new();
        assert_eq!(FlagSet::load(&store).unwrap(), FlagSet::new());

        store.set(KEY_FLAGS, serde_json::json!(["installed", "bogus"])).unwrap();
        assert!(matches!(FlagSet::load(&store), Err(CharmError::State { .. })));
    }
}
