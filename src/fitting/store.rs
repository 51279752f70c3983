//! Keyed storage of composite fits across datasets.

use std::collections::BTreeMap;

use super::multi_gaussian::CompositeFit;

/// Composite fits keyed by a caller-chosen dataset key (e.g. charge state).
///
/// The store is plain data passed explicitly to whoever fits; refitting a key
/// replaces its entry.
#[derive(Debug, Clone)]
pub struct FitStore<K: Ord> {
    entries: BTreeMap<K, CompositeFit>,
}

impl<K: Ord> Default for FitStore<K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord> FitStore<K> {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the fit for `key`, returning the replaced fit
    pub fn upsert(&mut self, key: K, fit: CompositeFit) -> Option<CompositeFit> {
        self.entries.insert(key, fit)
    }

    /// Fit stored under `key`
    pub fn get(&self, key: &K) -> Option<&CompositeFit> {
        self.entries.get(key)
    }

    /// Remove and return the fit stored under `key`
    pub fn remove(&mut self, key: &K) -> Option<CompositeFit> {
        self.entries.remove(key)
    }

    /// Number of stored fits
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &CompositeFit)> {
        self.entries.iter()
    }
}
