//! Persistent collections in a sharable byte arena.
//!
//! An associative map (hash array-mapped trie), a set layered on it, a
//! random-access vector (32-wide trie) and stack/queue adapters, all
//! storing their nodes in one contiguous byte buffer managed by a bump
//! pointer and a coalescing free list.
//!
//! Every update path-copies the root-to-leaf spine and shares the rest,
//! so old versions stay valid for free. Per-node refcounts track sharing;
//! releasing a handle walks only the subtrees unique to its root.
//!
//! Because nodes are raw bytes at 32-bit offsets, a snapshot is just the
//! buffer plus `(root, heap_end, free_head)`: another worker attaches to
//! the same bytes and reads every key with zero copying.
//!
//! # Key properties
//!
//! - **Persistence**: writes return a new handle; old handles are untouched
//! - **Structural sharing**: one `set` on a tree of size *n* allocates
//!   O(log₃₂ *n*) nodes
//! - **Zero-copy handoff**: attached readers walk the producer's bytes
//! - **Zero `unsafe`**: enforced by `#![forbid(unsafe_code)]`
//!
//! # Example
//!
//! ```rust
//! use hamt_arena::{Arena, MapHandle};
//!
//! let mut arena = Arena::new();
//! let empty = MapHandle::new();
//! let v1 = empty.set(&mut arena, b"foo", b"bar").unwrap();
//!
//! assert_eq!(v1.get(&arena, b"foo"), Some(&b"bar"[..]));
//! assert_eq!(empty.get(&arena, b"foo"), None);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod hash;
pub mod iter;
pub mod layout;
pub mod node;

mod adapters;
mod arena;
mod batch;
mod error;
mod map;
mod ops;
mod refcount;
mod set;
mod snapshot;
mod vector;

#[cfg(test)]
mod tests;

pub use adapters::{Queue, Stack};
pub use arena::{Arena, ArenaConfig, ArenaState};
pub use batch::{
    batch_delete, batch_delete_transient, batch_get, batch_insert, batch_insert_transient,
};
pub use error::{ArenaError, Result};
pub use iter::LeafCursor;
pub use layout::{NOT_FOUND, NULL};
pub use map::{get_info_staged, get_staged, insert_staged, remove_staged};
pub use map::{MapHandle, StagedInsert};
pub use ops::get::LeafInfo;
pub use set::SetHandle;
pub use snapshot::{MapSnapshot, QueueSnapshot, VectorSnapshot};
pub use vector::{VectorHandle, VectorKind};
