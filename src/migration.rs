// src/migration.rs
use crate::storage::{keys, StorageAdapter};
use tracing::{info, warn};

/// Current on-disk layout of the namespaced keys.
pub const SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Namespace was empty; the marker was written.
    Initialized,
    UpToDate,
    /// Data from another layout was removed. `from` is the old marker, if any.
    Wiped { from: Option<String> },
}

pub trait Migration {
    fn run(&self, store: &mut StorageAdapter) -> MigrationOutcome;
}

/// Wipes the namespace whenever the stored version marker differs from the
/// running one. No data is carried across layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGate {
    pub version: String,
}

impl VersionGate {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Default for VersionGate {
    fn default() -> Self {
        Self::new(SCHEMA_VERSION)
    }
}

impl Migration for VersionGate {
    fn run(&self, store: &mut StorageAdapter) -> MigrationOutcome {
        let stored = store.get(keys::SCHEMA_VERSION);
        match stored {
            Some(ref marker) if *marker == self.version => MigrationOutcome::UpToDate,
            None if store.keys().is_empty() => {
                store.set(keys::SCHEMA_VERSION, &self.version);
                info!(version = %self.version, "initialized storage schema");
                MigrationOutcome::Initialized
            }
            from => {
                warn!(
                    from = from.as_deref().unwrap_or("<none>"),
                    to = %self.version,
                    "storage schema changed, clearing stored data"
                );
                store.clear_namespace();
                store.set(keys::SCHEMA_VERSION, &self.version);
                MigrationOutcome::Wiped { from }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_initializes_then_stays_up_to_date() {
        let mut store = StorageAdapter::in_memory("test_");
        let gate = VersionGate::new("2");
        assert_eq!(gate.run(&mut store), MigrationOutcome::Initialized);
        assert_eq!(gate.run(&mut store), MigrationOutcome::UpToDate);
    }

    #[test]
    fn gate_wipes_on_version_change() {
        let mut store = StorageAdapter::in_memory("test_");
        store.set(keys::SCHEMA_VERSION, "1");
        store.set(keys::WORKOUTS, "[]");
        let gate = VersionGate::new("2");
        assert_eq!(
            gate.run(&mut store),
            MigrationOutcome::Wiped {
                from: Some("1".to_string())
            }
        );
        assert_eq!(store.get(keys::WORKOUTS), None);
        assert_eq!(store.get(keys::SCHEMA_VERSION).as_deref(), Some("2"));
    }

    #[test]
    fn gate_wipes_unmarked_data() {
        let mut store = StorageAdapter::in_memory("test_");
        store.set(keys::CURRENT_ID, "7");
        let outcome = VersionGate::new("1").run(&mut store);
        assert_eq!(outcome, MigrationOutcome::Wiped { from: None });
        assert_eq!(store.get(keys::CURRENT_ID), None);
    }
}
