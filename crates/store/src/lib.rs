//! # Neo Debugger Store Layer
//!
//! Key-value storage abstractions for the execution core: the read-only
//! [`Store`] trait every backing implements, the in-memory backend the
//! debugger runs over, and the [`CachedStore`] overlay that tracks a
//! script's pending writes so they can be inspected and then discarded.

pub mod cached_store;
pub mod memory_store;
pub mod store;

pub use cached_store::{BatchItem, CachedStore, TrackState};
pub use memory_store::MemoryStore;
pub use store::{SeekDirection, Store};
