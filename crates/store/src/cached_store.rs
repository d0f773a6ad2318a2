//! Layered overlay store with change tracking.

use crate::store::{SeekDirection, Store};
use indexmap::IndexMap;
use std::rc::Rc;

/// How a key in the overlay differs from the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// The key does not exist in the base.
    Added,
    /// The key exists in the base with another value.
    Changed,
    /// The key exists in the base and is deleted here.
    Deleted,
}

impl std::fmt::Display for TrackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackState::Added => write!(f, "Added"),
            TrackState::Changed => write!(f, "Changed"),
            TrackState::Deleted => write!(f, "Deleted"),
        }
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    state: TrackState,
    value: Vec<u8>,
}

/// One pending operation, as reported by [`CachedStore::get_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Pending state of the key.
    pub state: TrackState,
    /// The full key, id prefix included.
    pub key: Vec<u8>,
    /// The pending value; empty for deletions.
    pub value: Vec<u8>,
}

/// A child overlay over a read-only base store.
///
/// Reads resolve child-first; writes and deletions accumulate in the child
/// and never touch the base. Discarding the overlay discards the script's
/// effects, which is exactly what the debugger's reset does.
pub struct CachedStore {
    base: Rc<dyn Store>,
    // Insertion order is preserved so get_batch reports operations in the
    // order each key was first touched.
    changes: IndexMap<Vec<u8>, Tracked>,
}

impl CachedStore {
    /// Creates an empty overlay over `base`.
    pub fn new(base: Rc<dyn Store>) -> Self {
        Self {
            base,
            changes: IndexMap::new(),
        }
    }

    /// The base this overlay shadows.
    pub fn base(&self) -> &Rc<dyn Store> {
        &self.base
    }

    /// Reads child-first: a Deleted entry shadows the base.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.changes.get(key) {
            Some(tracked) if tracked.state == TrackState::Deleted => None,
            Some(tracked) => Some(tracked.value.clone()),
            None => self.base.try_get(key),
        }
    }

    /// True when the key resolves to a value.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Stores `value` under `key` in the overlay.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let in_base = self.base.contains(&key);
        match self.changes.get_mut(&key) {
            Some(tracked) => {
                tracked.value = value;
                tracked.state = match tracked.state {
                    TrackState::Added => TrackState::Added,
                    TrackState::Changed => TrackState::Changed,
                    TrackState::Deleted => {
                        if in_base {
                            TrackState::Changed
                        } else {
                            TrackState::Added
                        }
                    }
                };
            }
            None => {
                let state = if in_base {
                    TrackState::Changed
                } else {
                    TrackState::Added
                };
                self.changes.insert(key, Tracked { state, value });
            }
        }
    }

    /// Deletes `key` in the overlay. Deleting a key the overlay itself
    /// added leaves no trace in the batch.
    pub fn delete(&mut self, key: &[u8]) {
        match self.changes.get_mut(key) {
            Some(tracked) => {
                if tracked.state == TrackState::Added {
                    self.changes.shift_remove(key);
                } else {
                    tracked.state = TrackState::Deleted;
                    tracked.value.clear();
                }
            }
            None => {
                if self.base.contains(key) {
                    self.changes.insert(
                        key.to_vec(),
                        Tracked {
                            state: TrackState::Deleted,
                            value: Vec::new(),
                        },
                    );
                }
            }
        }
    }

    /// Scans keys under `prefix`.
    ///
    /// `depth` 0 merges the overlay over the base; `depth` 1 reports only
    /// the overlay's own live entries: the view storage diffs use.
    pub fn seek(
        &self,
        prefix: &[u8],
        direction: SeekDirection,
        depth: usize,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut matches: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        if depth == 0 {
            for (key, value) in self.base.seek(prefix, SeekDirection::Forward) {
                match self.changes.get(&key) {
                    Some(_) => {} // child decides below
                    None => matches.push((key, value)),
                }
            }
        }
        for (key, tracked) in &self.changes {
            if tracked.state != TrackState::Deleted && key.starts_with(prefix) {
                matches.push((key.clone(), tracked.value.clone()));
            }
        }
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        if direction == SeekDirection::Backward {
            matches.reverse();
        }
        matches
    }

    /// The pending change set, in the order keys were first touched.
    pub fn get_batch(&self) -> Vec<BatchItem> {
        self.changes
            .iter()
            .map(|(key, tracked)| BatchItem {
                state: tracked.state,
                key: key.clone(),
                value: tracked.value.clone(),
            })
            .collect()
    }

    /// True when the overlay holds no pending operations.
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty()
    }
}

impl Store for CachedStore {
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.get(key)
    }

    fn seek(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.seek(prefix, direction, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;

    fn base_with(entries: &[(&[u8], &[u8])]) -> Rc<dyn Store> {
        let mut store = MemoryStore::new();
        for (key, value) in entries {
            store.put(key.to_vec(), value.to_vec());
        }
        Rc::new(store)
    }

    #[test]
    fn get_after_put_returns_new_value() {
        let mut cache = CachedStore::new(base_with(&[(b"k", b"old")]));
        cache.put(b"k".to_vec(), b"new".to_vec());
        assert_eq!(cache.get(b"k"), Some(b"new".to_vec()));
    }

    #[test]
    fn get_after_delete_shadows_base() {
        let mut cache = CachedStore::new(base_with(&[(b"k", b"v")]));
        cache.delete(b"k");
        assert_eq!(cache.get(b"k"), None);
        assert!(!cache.contains(b"k"));
    }

    #[test]
    fn put_then_delete_of_new_key_leaves_no_trace() {
        let mut cache = CachedStore::new(base_with(&[]));
        cache.put(b"k".to_vec(), b"v".to_vec());
        cache.delete(b"k");
        assert!(cache.get_batch().is_empty());
    }

    #[test]
    fn put_then_delete_of_existing_key_is_one_deletion() {
        let mut cache = CachedStore::new(base_with(&[(b"k", b"v")]));
        cache.put(b"k".to_vec(), b"w".to_vec());
        cache.delete(b"k");
        let batch = cache.get_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].state, TrackState::Deleted);
        assert!(batch[0].value.is_empty());
    }

    #[test]
    fn delete_then_put_becomes_change() {
        let mut cache = CachedStore::new(base_with(&[(b"k", b"v")]));
        cache.delete(b"k");
        cache.put(b"k".to_vec(), b"w".to_vec());
        let batch = cache.get_batch();
        assert_eq!(batch[0].state, TrackState::Changed);
        assert_eq!(cache.get(b"k"), Some(b"w".to_vec()));
    }

    #[test]
    fn seek_depth_zero_merges() {
        let mut cache = CachedStore::new(base_with(&[(b"a1", b"base"), (b"a2", b"base")]));
        cache.put(b"a2".to_vec(), b"child".to_vec());
        cache.put(b"a3".to_vec(), b"child".to_vec());
        let merged = cache.seek(b"a", SeekDirection::Forward, 0);
        assert_eq!(
            merged,
            vec![
                (b"a1".to_vec(), b"base".to_vec()),
                (b"a2".to_vec(), b"child".to_vec()),
                (b"a3".to_vec(), b"child".to_vec()),
            ]
        );
    }

    #[test]
    fn seek_depth_one_is_child_only() {
        let mut cache = CachedStore::new(base_with(&[(b"a1", b"base")]));
        cache.put(b"a3".to_vec(), b"child".to_vec());
        let diff = cache.seek(b"a", SeekDirection::Forward, 1);
        assert_eq!(diff, vec![(b"a3".to_vec(), b"child".to_vec())]);
    }

    #[test]
    fn seek_hides_deleted_and_reverses() {
        let mut cache = CachedStore::new(base_with(&[(b"a1", b"v"), (b"a2", b"v")]));
        cache.delete(b"a1");
        let merged = cache.seek(b"a", SeekDirection::Backward, 0);
        assert_eq!(merged, vec![(b"a2".to_vec(), b"v".to_vec())]);
    }

    #[test]
    fn batch_preserves_first_touch_order() {
        let mut cache = CachedStore::new(base_with(&[(b"b", b"v")]));
        cache.put(b"z".to_vec(), b"1".to_vec());
        cache.put(b"a".to_vec(), b"2".to_vec());
        cache.put(b"z".to_vec(), b"3".to_vec()); // coalesces into the first slot
        let batch = cache.get_batch();
        assert_eq!(batch[0].key, b"z".to_vec());
        assert_eq!(batch[0].value, b"3".to_vec());
        assert_eq!(batch[1].key, b"a".to_vec());
    }

    #[test]
    fn layering_overlay_over_overlay() {
        let mut parent = CachedStore::new(base_with(&[(b"k", b"base")]));
        parent.put(b"p".to_vec(), b"parent".to_vec());
        let mut child = CachedStore::new(Rc::new(parent));
        child.put(b"c".to_vec(), b"child".to_vec());
        assert_eq!(child.get(b"k"), Some(b"base".to_vec()));
        assert_eq!(child.get(b"p"), Some(b"parent".to_vec()));
        // Only the child's own writes appear at depth 1.
        let diff = child.seek(b"", SeekDirection::Forward, 1);
        assert_eq!(diff, vec![(b"c".to_vec(), b"child".to_vec())]);
    }
}
