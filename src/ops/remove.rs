//! Removal — path-copy delete with single-child collapse.
//!
//! A miss short-circuits: the unchanged subtree is reported upward without
//! any allocation so the caller can keep its size counter untouched. When
//! the removed leaf was its parent's only child the parent collapses and
//! the null offset bubbles up instead.

use crate::arena::Arena;
use crate::error::Result;
use crate::layout::NULL;
use crate::node;
use crate::refcount;

/// Outcome of a recursive remove.
pub(crate) enum RemoveOutcome {
    /// Key absent — tree unchanged, no allocation happened.
    NotFound,
    /// Key removed; `node` is the new subtree root, or the null offset if
    /// the subtree is now empty.
    Removed {
        /// New root of the modified subtree.
        node: u32,
    },
}

/// Removes `(hash, key)` from the tree rooted at `root`.
pub(crate) fn remove(
    a: &mut Arena,
    root: u32,
    hash: u32,
    key: &[u8],
    tag: u8,
) -> Result<RemoveOutcome> {
    if root == NULL {
        return Ok(RemoveOutcome::NotFound);
    }
    remove_recursive(a, root, 0, hash, key, tag)
}

fn remove_recursive(
    a: &mut Arena,
    cur: u32,
    shift: u32,
    hash: u32,
    key: &[u8],
    tag: u8,
) -> Result<RemoveOutcome> {
    if node::is_leaf(a, cur) {
        return Ok(if node::leaf_matches(a, cur, hash, key) {
            RemoveOutcome::Removed { node: NULL }
        } else {
            RemoveOutcome::NotFound
        });
    }
    if shift >= node::COLLISION_SHIFT {
        remove_from_collision(a, cur, hash, key, tag)
    } else {
        remove_from_inner(a, cur, shift, hash, key, tag)
    }
}

// ---------------------------------------------------------------------------
// Internal node
// ---------------------------------------------------------------------------

fn remove_from_inner(
    a: &mut Arena,
    cur: u32,
    shift: u32,
    hash: u32,
    key: &[u8],
    tag: u8,
) -> Result<RemoveOutcome> {
    let map = node::bitmap(a, cur);
    let bit = node::bit_for(node::fragment(hash, shift));
    if map & bit == 0 {
        return Ok(RemoveOutcome::NotFound);
    }
    let idx = node::compact_index(map, bit);
    let child = node::child_at(a, cur, idx);

    match remove_recursive(a, child, shift + node::BITS_PER_LEVEL, hash, key, tag)? {
        RemoveOutcome::NotFound => Ok(RemoveOutcome::NotFound),
        RemoveOutcome::Removed { node: new_child } if new_child != NULL => {
            if new_child == child {
                // In-place update further down; this node is unchanged.
                return Ok(RemoveOutcome::Removed { node: cur });
            }
            if tag != 0 && node::header_tag(node::header(a, cur)) == tag {
                node::set_child_at(a, cur, idx, new_child);
                refcount::decref(a, child);
                return Ok(RemoveOutcome::Removed { node: cur });
            }
            let copy = node::copy_internal(a, cur, idx, tag)?;
            node::set_child_at(a, copy, idx, new_child);
            Ok(RemoveOutcome::Removed { node: copy })
        }
        RemoveOutcome::Removed { .. } => {
            // Child subtree vanished entirely.
            let count = map.count_ones();
            if count == 1 {
                return Ok(RemoveOutcome::Removed { node: NULL });
            }
            // One fewer child — the size changes, so always reallocate.
            let copy = node::alloc_internal(a, map & !bit, tag)?;
            let mut j = 0;
            for i in 0..count {
                if i == idx {
                    continue;
                }
                let c = node::child_at(a, cur, i);
                refcount::incref(a, c);
                node::set_child_at(a, copy, j, c);
                j += 1;
            }
            Ok(RemoveOutcome::Removed { node: copy })
        }
    }
}

// ---------------------------------------------------------------------------
// Collision node
// ---------------------------------------------------------------------------

fn remove_from_collision(
    a: &mut Arena,
    cur: u32,
    hash: u32,
    key: &[u8],
    tag: u8,
) -> Result<RemoveOutcome> {
    let count = node::child_count(a, cur);
    for i in 0..count {
        let child = node::child_at(a, cur, i);
        if !node::leaf_matches(a, child, hash, key) {
            continue;
        }
        if count == 2 {
            // The survivor is promoted to a plain leaf at this position.
            let other = node::child_at(a, cur, 1 - i);
            refcount::incref(a, other);
            return Ok(RemoveOutcome::Removed { node: other });
        }
        let new_map = ((1u64 << (count - 1)) - 1) as u32;
        let copy = node::alloc_internal(a, new_map, tag)?;
        let mut j = 0;
        for k in 0..count {
            if k == i {
                continue;
            }
            let c = node::child_at(a, cur, k);
            refcount::incref(a, c);
            node::set_child_at(a, copy, j, c);
            j += 1;
        }
        return Ok(RemoveOutcome::Removed { node: copy });
    }
    Ok(RemoveOutcome::NotFound)
}
