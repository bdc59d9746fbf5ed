//! Snapshot handoff records.
//!
//! A producer conveys `(buffer, allocator state, per-structure roots)`
//! out-of-band; a reader rebuilds an [`Arena`](crate::Arena) with
//! [`Arena::attach`](crate::Arena::attach) and turns these records back
//! into handles. Attached readers perform read-only walks; calling
//! mutation APIs against bytes another worker owns corrupts the free list.

use crate::adapters::{Queue, Stack};
use crate::map::MapHandle;
use crate::set::SetHandle;
use crate::vector::{VectorHandle, VectorKind};

/// Snapshot record for a map version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapSnapshot {
    /// Root node offset.
    pub root: u32,
    /// Entry count at snapshot time.
    pub size: u32,
    /// Opaque value-codec tag.
    pub value_tag: u8,
}

impl MapSnapshot {
    /// Rebuilds the handle this record was taken from.
    #[must_use]
    pub const fn into_handle(self) -> MapHandle {
        MapHandle::from_parts(self.root, self.size, self.value_tag)
    }
}

impl MapHandle {
    /// Captures this handle for out-of-band handoff.
    #[must_use]
    pub const fn snapshot(&self) -> MapSnapshot {
        MapSnapshot {
            root: self.root(),
            size: self.len(),
            value_tag: self.value_tag(),
        }
    }
}

impl SetHandle {
    /// Captures this handle for out-of-band handoff.
    #[must_use]
    pub const fn snapshot(&self) -> MapSnapshot {
        self.as_map().snapshot()
    }
}

/// Snapshot record for a vector version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorSnapshot {
    /// Root node offset.
    pub root: u32,
    /// Internal levels above the leaf layer.
    pub depth: u32,
    /// Element count at snapshot time.
    pub size: u32,
    /// Lane kind.
    pub kind: VectorKind,
}

impl VectorSnapshot {
    /// Rebuilds the handle this record was taken from.
    #[must_use]
    pub const fn into_handle(self) -> VectorHandle {
        VectorHandle::from_parts(self.root, self.depth, self.size, self.kind)
    }
}

impl VectorHandle {
    /// Captures this handle for out-of-band handoff.
    #[must_use]
    pub const fn snapshot(&self) -> VectorSnapshot {
        VectorSnapshot {
            root: self.root(),
            depth: self.depth(),
            size: self.len(),
            kind: self.kind(),
        }
    }
}

impl Stack {
    /// Captures this handle for out-of-band handoff.
    #[must_use]
    pub const fn snapshot(&self) -> VectorSnapshot {
        self.as_vector().snapshot()
    }
}

/// Snapshot record for a queue version: its vector plus the head index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// The underlying vector record.
    pub vector: VectorSnapshot,
    /// Logical head index.
    pub head: u32,
}

impl QueueSnapshot {
    /// Rebuilds the handle this record was taken from.
    #[must_use]
    pub const fn into_handle(self) -> Queue {
        Queue::from_parts(self.vector.into_handle(), self.head)
    }
}

impl Queue {
    /// Captures this handle for out-of-band handoff.
    #[must_use]
    pub const fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            vector: self.as_vector().snapshot(),
            head: self.head(),
        }
    }
}
