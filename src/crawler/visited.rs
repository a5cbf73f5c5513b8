//! Concurrent registry of already-scheduled URLs

use std::collections::HashSet;
use std::sync::RwLock;

/// Thread-safe insert-if-absent set of normalized URLs
///
/// Membership only grows during a crawl run, which is what stops link
/// cycles and duplicate discoveries from producing a second task.
#[derive(Debug, Default)]
pub struct VisitedSet {
    items: RwLock<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key`, returning true only for the call that inserted it
    ///
    /// Check and insert happen under one write lock, so of any number of
    /// racing callers with the same key exactly one sees `true`.
    pub fn add(&self, key: &str) -> bool {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        if items.contains(key) {
            return false;
        }
        items.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of every key in the set
    pub fn items(&self) -> HashSet<String> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashSet<String>> {
        // A poisoned lock still holds a consistent set: inserts are atomic
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }
}
