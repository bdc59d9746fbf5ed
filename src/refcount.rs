//! Per-node reference counting with recursive release.
//!
//! A node's refcount lives in the low 24 bits of its header. When a decref
//! reaches zero the node's kind is dispatched on the bitmap word: leaves go
//! straight back to the free list, internal nodes first decref every child.
//! Saturating the 24-bit field is a caller logic error; structural sharing
//! keeps real trees far below the limit.

use crate::arena::Arena;
use crate::layout::NULL;
use crate::node;

/// Adds one reference to `node`.
pub(crate) fn incref(a: &mut Arena, node: u32) {
    let header = node::header(a, node);
    let rc = node::header_refcount(header);
    debug_assert!(rc < node::REFCOUNT_MASK, "refcount overflow at {node}");
    node::set_header(a, node, node::pack_header(rc + 1, node::header_tag(header)));
}

/// Drops one reference from `node`, releasing the subtree unique to it.
///
/// Children of a freed internal node are decrefed recursively; recursion
/// depth is bounded by the trie height.
pub(crate) fn decref(a: &mut Arena, node: u32) {
    if node == NULL {
        return;
    }
    let header = node::header(a, node);
    let rc = node::header_refcount(header);
    debug_assert!(rc > 0, "decref of dead node at {node}");
    if rc > 1 {
        node::set_header(a, node, node::pack_header(rc - 1, node::header_tag(header)));
        return;
    }
    if !node::is_leaf(a, node) {
        for i in 0..node::child_count(a, node) {
            let child = node::child_at(a, node, i);
            decref(a, child);
        }
    }
    a.free(node);
}
