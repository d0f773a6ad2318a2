//! Read-only store interface and seek direction.

/// Direction of a prefix scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekDirection {
    /// Ascending byte-lexicographic order.
    #[default]
    Forward,
    /// Descending byte-lexicographic order.
    Backward,
}

/// A read-only key-value view.
///
/// Writes exist only on the [`CachedStore`](crate::CachedStore) overlay, so
/// anything reachable through this trait: including historic snapshots -
/// is structurally immutable.
pub trait Store {
    /// Fetches the value stored under `key`.
    fn try_get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// True when `key` is present.
    fn contains(&self, key: &[u8]) -> bool {
        self.try_get(key).is_some()
    }

    /// All entries whose key starts with `prefix`, in byte-lexicographic
    /// order (reversed for [`SeekDirection::Backward`]). Keys keep their
    /// prefix; trimming is the caller's concern.
    fn seek(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)>;
}
