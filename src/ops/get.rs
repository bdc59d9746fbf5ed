//! Lookup — walks the trie from a root without touching refcounts.

use crate::arena::Arena;
use crate::layout::NULL;
use crate::node;

/// Locations of a leaf's fields, as returned by `get_info`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafInfo {
    /// Offset of the leaf node.
    pub leaf: u32,
    /// Offset of the inline key bytes.
    pub key_ptr: u32,
    /// Key length in bytes.
    pub key_len: u32,
    /// Offset of the inline value bytes.
    pub val_ptr: u32,
    /// Value length in bytes.
    pub val_len: u32,
}

/// Finds the leaf storing `(hash, key)` under `root`.
///
/// Returns the null offset on a miss. At each level: a leaf compares hash,
/// length and bytes; an internal node consumes the next 5-bit fragment;
/// past 32 hash bits the node is positional and is scanned linearly.
pub(crate) fn find_leaf(a: &Arena, root: u32, hash: u32, key: &[u8]) -> u32 {
    let mut cur = root;
    let mut shift = 0;
    while cur != NULL {
        if node::is_leaf(a, cur) {
            return if node::leaf_matches(a, cur, hash, key) {
                cur
            } else {
                NULL
            };
        }
        if shift >= node::COLLISION_SHIFT {
            for i in 0..node::child_count(a, cur) {
                let child = node::child_at(a, cur, i);
                if node::leaf_matches(a, child, hash, key) {
                    return child;
                }
            }
            return NULL;
        }
        let map = node::bitmap(a, cur);
        let bit = node::bit_for(node::fragment(hash, shift));
        if map & bit == 0 {
            return NULL;
        }
        cur = node::child_at(a, cur, node::compact_index(map, bit));
        shift += node::BITS_PER_LEVEL;
    }
    NULL
}

/// Field locations of the leaf at `leaf`.
pub(crate) fn leaf_info(a: &Arena, leaf: u32) -> LeafInfo {
    LeafInfo {
        leaf,
        key_ptr: node::leaf_key_ptr(leaf),
        key_len: node::leaf_key_len(a, leaf),
        val_ptr: node::leaf_val_ptr(a, leaf),
        val_len: node::leaf_val_len(a, leaf),
    }
}

// ---------------------------------------------------------------------------
// Field-at-offset reads
// ---------------------------------------------------------------------------
//
// These avoid reconstructing a whole value when only one field is wanted:
// the caller names a byte offset inside the value and gets the primitive
// back directly.

/// Little-endian `i32` at `offset` inside the leaf's value bytes.
pub(crate) fn read_field_i32(a: &Arena, leaf: u32, offset: u32) -> Option<i32> {
    let val_len = node::leaf_val_len(a, leaf);
    if offset + 4 > val_len {
        return None;
    }
    let ptr = node::leaf_val_ptr(a, leaf) + offset;
    Some(a.u32_at(ptr) as i32)
}

/// Little-endian `f64` at `offset` inside the leaf's value bytes.
pub(crate) fn read_field_f64(a: &Arena, leaf: u32, offset: u32) -> Option<f64> {
    let val_len = node::leaf_val_len(a, leaf);
    if offset + 8 > val_len {
        return None;
    }
    let ptr = node::leaf_val_ptr(a, leaf) + offset;
    Some(f64::from_bits(a.u64_at(ptr)))
}

/// Copies the length-prefixed string at `offset` into `out`.
///
/// The field is stored as `[len: u32][bytes]`. Returns the full string
/// length; at most `out.len()` bytes are copied, so a short `out` yields a
/// truncated copy the caller can detect and retry.
pub(crate) fn read_field_str(a: &Arena, leaf: u32, offset: u32, out: &mut [u8]) -> Option<u32> {
    let val_len = node::leaf_val_len(a, leaf);
    if offset + 4 > val_len {
        return None;
    }
    let ptr = node::leaf_val_ptr(a, leaf) + offset;
    let str_len = a.u32_at(ptr);
    if offset + 4 + str_len > val_len {
        return None;
    }
    let copy_len = (str_len as usize).min(out.len());
    out[..copy_len].copy_from_slice(&a.slice(ptr + 4, str_len)[..copy_len]);
    Some(str_len)
}
