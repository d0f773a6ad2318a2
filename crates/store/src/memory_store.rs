//! In-memory store backend.

use crate::store::{SeekDirection, Store};
use std::collections::BTreeMap;

/// A `BTreeMap`-backed store; the map's ordering provides seek order.
///
/// Cloning snapshots the full state, which is what the ledger uses to keep
/// per-height views for historic execution.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    /// Removes `key`.
    pub fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for MemoryStore {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn seek(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut matches: Vec<(Vec<u8>, Vec<u8>)> = self
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if direction == SeekDirection::Backward {
            matches.reverse();
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let mut store = MemoryStore::new();
        store.put(vec![1, 2], vec![3]);
        assert_eq!(store.try_get(&[1, 2]), Some(vec![3]));
        assert!(store.contains(&[1, 2]));
        store.delete(&[1, 2]);
        assert_eq!(store.try_get(&[1, 2]), None);
    }

    #[test]
    fn seek_respects_prefix_and_order() {
        let mut store = MemoryStore::new();
        store.put(vec![1, 3], vec![0]);
        store.put(vec![1, 1], vec![0]);
        store.put(vec![1, 2], vec![0]);
        store.put(vec![2, 1], vec![0]);

        let forward = store.seek(&[1], SeekDirection::Forward);
        let keys: Vec<_> = forward.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![vec![1, 1], vec![1, 2], vec![1, 3]]);

        let backward = store.seek(&[1], SeekDirection::Backward);
        assert_eq!(backward[0].0, vec![1, 3]);
    }
}
