//! Persistent vector: a 32-wide trie over fixed-size nodes.
//!
//! Internal nodes are 132 bytes (header + 32 child words), leaves 260
//! bytes (header + 32 eight-byte slots). Both sizes are fixed, so freed
//! vector nodes go onto small per-class free lists instead of back through
//! the general allocator.
//!
//! A handle is `(root, depth, size)`: `depth` internal levels sit above
//! the leaf layer and capacity is `32^(depth + 1)`. The index is consumed
//! top-down, five bits per level. `push` grows a level by planting the old
//! root as child 0 of a fresh root; `pop` collapses a level once the
//! surviving size fits one child.
//!
//! The f64 lane stores values directly in the slots. Other lanes store a
//! `ptr | (len << 20)` packed word naming a blob allocated from the same
//! arena; replaced blobs stay allocated until `reset`, since older
//! versions may still reference them.

use crate::arena::Arena;
use crate::error::{ArenaError, Result};
use crate::layout::{self, NULL, PACKED_MAX_LEN, PACKED_PTR_MASK};
use crate::node::{header_refcount, header_tag, pack_header};
use crate::refcount;

/// Slots per node.
pub const FANOUT: u32 = 32;

/// Bits of index consumed per level.
const BITS: u32 = 5;

const SLOT_MASK: u32 = FANOUT - 1;

/// Usable bytes of an internal node.
pub const INTERNAL_BYTES: u32 = 4 + FANOUT * 4;

/// Usable bytes of a leaf node.
pub const LEAF_BYTES: u32 = 4 + FANOUT * 8;

const CHILDREN: u32 = 4;
const SLOTS: u32 = 4;

/// How a vector's slots are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorKind {
    /// Values are f64 stored directly in the 8-byte slots.
    F64,
    /// Slots hold packed offset/length words naming arena blobs.
    Packed,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NodeClass {
    Internal,
    Leaf,
}

/// Handle to one version of a persistent vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorHandle {
    root: u32,
    depth: u32,
    size: u32,
    kind: VectorKind,
}

impl VectorHandle {
    /// An empty f64 vector.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_kind(VectorKind::F64)
    }

    /// An empty vector of the given lane kind.
    #[must_use]
    pub const fn with_kind(kind: VectorKind) -> Self {
        Self {
            root: NULL,
            depth: 0,
            size: 0,
            kind,
        }
    }

    /// Rebuilds a handle from snapshot parts.
    #[must_use]
    pub const fn from_parts(root: u32, depth: u32, size: u32, kind: VectorKind) -> Self {
        Self {
            root,
            depth,
            size,
            kind,
        }
    }

    /// Number of elements.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.size
    }

    /// `true` when the vector has no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Root node offset.
    #[must_use]
    pub const fn root(&self) -> u32 {
        self.root
    }

    /// Internal levels above the leaf layer.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// The lane kind.
    #[must_use]
    pub const fn kind(&self) -> VectorKind {
        self.kind
    }

    /// Returns a copy owning its own root reference.
    #[must_use]
    pub fn retain(&self, a: &mut Arena) -> Self {
        if self.root != NULL {
            refcount::incref(a, self.root);
        }
        *self
    }

    /// Drops this handle's root reference, freeing nodes unique to it.
    pub fn release(self, a: &mut Arena) {
        decref_node(a, self.root, self.depth);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    fn word_at(&self, a: &Arena, index: u32) -> Option<u64> {
        if index >= self.size {
            return None;
        }
        let mut cur = self.root;
        let mut level = self.depth;
        while level > 0 {
            if cur == NULL {
                return None;
            }
            let slot = (index >> (BITS * level)) & SLOT_MASK;
            cur = a.u32_at(cur + CHILDREN + slot * 4);
            level -= 1;
        }
        if cur == NULL {
            return None;
        }
        Some(a.u64_at(cur + SLOTS + (index & SLOT_MASK) * 8))
    }

    /// Element at `index` of an f64 vector.
    #[must_use]
    pub fn get(&self, a: &Arena, index: u32) -> Option<f64> {
        debug_assert_eq!(self.kind, VectorKind::F64);
        self.word_at(a, index).map(f64::from_bits)
    }

    /// Blob bytes at `index` of a packed vector.
    #[must_use]
    pub fn get_bytes<'a>(&self, a: &'a Arena, index: u32) -> Option<&'a [u8]> {
        debug_assert_eq!(self.kind, VectorKind::Packed);
        let word = self.word_at(a, index)? as u32;
        Some(a.slice(layout::blob_ptr(word), layout::blob_len(word)))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Appends an f64, returning the handle of the new version.
    pub fn push(&self, a: &mut Arena, value: f64) -> Result<Self> {
        debug_assert_eq!(self.kind, VectorKind::F64);
        self.push_word(a, value.to_bits())
    }

    /// Appends a blob to a packed vector.
    pub fn push_bytes(&self, a: &mut Arena, bytes: &[u8]) -> Result<Self> {
        debug_assert_eq!(self.kind, VectorKind::Packed);
        let packed = alloc_blob(a, bytes)?;
        self.push_word(a, u64::from(packed))
    }

    /// Replaces the f64 at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&self, a: &mut Arena, index: u32, value: f64) -> Result<Self> {
        debug_assert_eq!(self.kind, VectorKind::F64);
        assert!(index < self.size, "index {index} out of bounds");
        let root = set_path(a, self.root, self.depth, index, value.to_bits())?;
        Ok(Self { root, ..*self })
    }

    /// Replaces the blob at `index` of a packed vector.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set_bytes(&self, a: &mut Arena, index: u32, bytes: &[u8]) -> Result<Self> {
        debug_assert_eq!(self.kind, VectorKind::Packed);
        assert!(index < self.size, "index {index} out of bounds");
        let packed = alloc_blob(a, bytes)?;
        let root = set_path(a, self.root, self.depth, index, u64::from(packed))?;
        Ok(Self { root, ..*self })
    }

    fn push_word(&self, a: &mut Arena, word: u64) -> Result<Self> {
        let index = self.size;
        if u64::from(index) == capacity(self.depth) {
            // Root is full: add a level, old root becomes child 0.
            let depth = self.depth + 1;
            let root = alloc_node(a, NodeClass::Internal)?;
            refcount::incref(a, self.root);
            a.put_u32(root + CHILDREN, self.root);
            let slot = (index >> (BITS * depth)) & SLOT_MASK;
            let chain = set_path(a, NULL, depth - 1, index, word)?;
            a.put_u32(root + CHILDREN + slot * 4, chain);
            return Ok(Self {
                root,
                depth,
                size: index + 1,
                kind: self.kind,
            });
        }
        let root = set_path(a, self.root, self.depth, index, word)?;
        Ok(Self {
            root,
            depth: self.depth,
            size: index + 1,
            kind: self.kind,
        })
    }

    /// Removes the last element, returning the shrunk version's handle.
    ///
    /// Returns `None` on an empty vector. Vacated slots keep their bytes;
    /// the size bound makes them unreachable.
    #[must_use]
    pub fn pop(&self, a: &mut Arena) -> Option<Self> {
        if self.size == 0 {
            return None;
        }
        let size = self.size - 1;
        if self.depth > 0 && u64::from(size) <= capacity(self.depth - 1) {
            // Only child 0 is populated now: drop the top level.
            let child = a.u32_at(self.root + CHILDREN);
            refcount::incref(a, child);
            return Some(Self {
                root: child,
                depth: self.depth - 1,
                size,
                kind: self.kind,
            });
        }
        refcount::incref(a, self.root);
        Some(Self { size, ..*self })
    }
}

impl Default for VectorHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Capacity of a trie with `depth` internal levels: `32^(depth + 1)`.
#[must_use]
pub const fn capacity(depth: u32) -> u64 {
    32u64.pow(depth + 1)
}

// ---------------------------------------------------------------------------
// Path copy
// ---------------------------------------------------------------------------

/// Path-copies `node` (or builds a fresh chain when it is null) so that
/// slot `index` holds `word` at the leaf layer. Shared siblings are
/// incref'd; nodes along the path are fresh with refcount 1.
fn set_path(a: &mut Arena, cur: u32, level: u32, index: u32, word: u64) -> Result<u32> {
    if level == 0 {
        let copy = alloc_node(a, NodeClass::Leaf)?;
        if cur != NULL {
            for s in 0..FANOUT {
                let w = a.u64_at(cur + SLOTS + s * 8);
                a.put_u64(copy + SLOTS + s * 8, w);
            }
        }
        a.put_u64(copy + SLOTS + (index & SLOT_MASK) * 8, word);
        return Ok(copy);
    }
    let slot = (index >> (BITS * level)) & SLOT_MASK;
    let copy = alloc_node(a, NodeClass::Internal)?;
    let mut old_child = NULL;
    if cur != NULL {
        for s in 0..FANOUT {
            let child = a.u32_at(cur + CHILDREN + s * 4);
            if s == slot {
                old_child = child;
            } else if child != NULL {
                refcount::incref(a, child);
            }
            a.put_u32(copy + CHILDREN + s * 4, child);
        }
    }
    let new_child = set_path(a, old_child, level - 1, index, word)?;
    a.put_u32(copy + CHILDREN + slot * 4, new_child);
    Ok(copy)
}

// ---------------------------------------------------------------------------
// Node pool
// ---------------------------------------------------------------------------
//
// Vector nodes come in exactly two sizes, so freed ones are threaded onto
// per-class lists through their block headers' next-free word and reused
// before touching the general allocator.

fn alloc_node(a: &mut Arena, class: NodeClass) -> Result<u32> {
    let head = match class {
        NodeClass::Internal => a.vec_free_internal,
        NodeClass::Leaf => a.vec_free_leaf,
    };
    let node = if head != NULL {
        let next = a.u32_at(head - 4);
        match class {
            NodeClass::Internal => a.vec_free_internal = next,
            NodeClass::Leaf => a.vec_free_leaf = next,
        }
        head
    } else {
        let bytes = match class {
            NodeClass::Internal => INTERNAL_BYTES,
            NodeClass::Leaf => LEAF_BYTES,
        };
        a.alloc(bytes)?
    };
    a.put_u32(node, pack_header(1, 0));
    let body = match class {
        NodeClass::Internal => FANOUT * 4,
        NodeClass::Leaf => FANOUT * 8,
    };
    for off in (0..body).step_by(4) {
        a.put_u32(node + 4 + off, 0);
    }
    Ok(node)
}

fn free_node(a: &mut Arena, node: u32, class: NodeClass) {
    match class {
        NodeClass::Internal => {
            a.put_u32(node - 4, a.vec_free_internal);
            a.vec_free_internal = node;
        }
        NodeClass::Leaf => {
            a.put_u32(node - 4, a.vec_free_leaf);
            a.vec_free_leaf = node;
        }
    }
}

/// Drops one reference from a vector node `level` internal levels above
/// the leaves, releasing its unique subtree on zero.
pub(crate) fn decref_node(a: &mut Arena, node: u32, level: u32) {
    if node == NULL {
        return;
    }
    let header = a.u32_at(node);
    let rc = header_refcount(header);
    debug_assert!(rc > 0, "decref of dead vector node at {node}");
    if rc > 1 {
        a.put_u32(node, pack_header(rc - 1, header_tag(header)));
        return;
    }
    if level > 0 {
        for s in 0..FANOUT {
            let child = a.u32_at(node + CHILDREN + s * 4);
            decref_node(a, child, level - 1);
        }
        free_node(a, node, NodeClass::Internal);
    } else {
        free_node(a, node, NodeClass::Leaf);
    }
}

// ---------------------------------------------------------------------------
// Blobs
// ---------------------------------------------------------------------------

fn alloc_blob(a: &mut Arena, bytes: &[u8]) -> Result<u32> {
    let len = bytes.len() as u32;
    if len > PACKED_MAX_LEN {
        return Err(ArenaError::BlobTooLarge {
            len,
            max: PACKED_MAX_LEN,
        });
    }
    let ptr = a.alloc(len.max(1))?;
    if ptr > PACKED_PTR_MASK {
        a.free(ptr);
        return Err(ArenaError::BlobWindowExhausted { offset: ptr });
    }
    a.copy_in(ptr, bytes);
    Ok(layout::pack_blob(ptr, len))
}
