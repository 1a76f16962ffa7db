//! Shared journal for probes.

use crate::scope::Dispose;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// What a probe observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAction {
    /// The instance was constructed.
    Created,
    /// The stage was invoked.
    Entered,
    /// The stage returned.
    Exited,
    /// The instance was disposed.
    Disposed,
}

impl fmt::Display for ProbeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Entered => "entered",
            Self::Exited => "exited",
            Self::Disposed => "disposed",
        })
    }
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEntry {
    /// The probe label.
    pub label: String,
    /// The probed instance.
    pub instance: Uuid,
    /// What happened.
    pub action: ProbeAction,
}

/// An append-only, cloneable log shared by probes.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<ProbeEntry>>>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, label: &str, instance: Uuid, action: ProbeAction) {
        self.entries.lock().push(ProbeEntry {
            label: label.to_string(),
            instance,
            action,
        });
    }

    /// Returns every entry.
    #[must_use]
    pub fn entries(&self) -> Vec<ProbeEntry> {
        self.entries.lock().clone()
    }

    /// Returns the entries as `action:label` lines.
    #[must_use]
    pub fn trace(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|e| format!("{}:{}", e.action, e.label))
            .collect()
    }

    /// Returns the labels recorded with `action`, in order.
    #[must_use]
    pub fn labels_of(&self, action: ProbeAction) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .map(|e| e.label.clone())
            .collect()
    }

    /// Returns the instances created under `label`, in order.
    #[must_use]
    pub fn instances_of(&self, label: &str) -> Vec<Uuid> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.action == ProbeAction::Created && e.label == label)
            .map(|e| e.instance)
            .collect()
    }

    /// Returns the number of entries with `action`.
    #[must_use]
    pub fn count(&self, action: ProbeAction) -> usize {
        self.entries.lock().iter().filter(|e| e.action == action).count()
    }

    /// Clears the journal.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// A disposable component that records its construction and disposal.
#[derive(Debug)]
pub struct DisposeProbe {
    label: String,
    instance: Uuid,
    journal: Journal,
}

impl DisposeProbe {
    /// Creates a probe and records `Created`.
    #[must_use]
    pub fn new(label: impl Into<String>, journal: Journal) -> Self {
        let label = label.into();
        let instance = Uuid::now_v7();
        journal.record(&label, instance, ProbeAction::Created);
        Self {
            label,
            instance,
            journal,
        }
    }

    /// Returns the probe label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the instance id.
    #[must_use]
    pub fn instance(&self) -> Uuid {
        self.instance
    }
}

impl Dispose for DisposeProbe {
    fn dispose(&self) {
        self.journal.record(&self.label, self.instance, ProbeAction::Disposed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_probe_records_lifecycle() {
        let journal = Journal::new();
        let probe = DisposeProbe::new("db", journal.clone());
        probe.dispose();

        assert_eq!(journal.trace(), vec!["created:db", "disposed:db"]);
        assert_eq!(journal.instances_of("db"), vec![probe.instance()]);
        assert_eq!(journal.count(ProbeAction::Disposed), 1);
    }
}
