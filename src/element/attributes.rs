//! Attribute Monitor - snapshot of a declared set of attribute names.
//!
//! Each component declares a fixed set of attribute names to watch. The
//! snapshot is seeded with `None` for every declared name, refreshed from
//! the host attributes on attach, and updated entry-by-entry on change
//! notifications. Names outside the declared set are ignored.

use std::collections::HashMap;

/// Snapshot of watched attribute values for one node.
///
/// An empty attribute value is treated as absent.
#[derive(Debug)]
pub(crate) struct AttributeMonitor {
    snapshot: HashMap<String, Option<String>>,
}

impl AttributeMonitor {
    /// Seed the snapshot with `None` for every declared name.
    pub(crate) fn new(names: &[String]) -> Self {
        let snapshot = names.iter().map(|name| (name.clone(), None)).collect();
        Self { snapshot }
    }

    /// Whether `name` is part of the declared set.
    pub(crate) fn watches(&self, name: &str) -> bool {
        self.snapshot.contains_key(name)
    }

    /// Re-read every declared name from the host attribute storage.
    pub(crate) fn refresh(&mut self, read: impl Fn(&str) -> Option<String>) {
        for (name, value) in self.snapshot.iter_mut() {
            *value = read(name).filter(|v| !v.is_empty());
        }
    }

    /// Record a single change notification. No-op for undeclared names.
    pub(crate) fn record(&mut self, name: &str, value: Option<String>) {
        if let Some(entry) = self.snapshot.get_mut(name) {
            *entry = value.filter(|v| !v.is_empty());
        }
    }

    /// Current snapshot, cloned for notification payloads.
    pub(crate) fn snapshot(&self) -> HashMap<String, Option<String>> {
        self.snapshot.clone()
    }
}
