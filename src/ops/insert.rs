//! Insertion — path-copy insert with leaf merge and transient fast paths.
//!
//! After an insert, every node on the old root-to-leaf path is untouched
//! and every node on the new path is freshly allocated with refcount 1.
//! Unchanged siblings are shared between the two paths and incref'd once.
//!
//! With a non-zero owner tag, nodes stamped by the active transient session
//! are updated in place when their physical size does not change; anything
//! else falls back to path copy.

use crate::arena::Arena;
use crate::error::Result;
use crate::layout::NULL;
use crate::node;
use crate::refcount;

/// Value payload for an insert.
pub(crate) enum ValueSource<'a> {
    /// Copy these bytes into the leaf.
    Bytes(&'a [u8]),
    /// Reserve this many bytes; the caller writes them through `val_ptr`.
    Reserve(u32),
}

impl ValueSource<'_> {
    pub(crate) fn len(&self) -> u32 {
        match self {
            Self::Bytes(b) => b.len() as u32,
            Self::Reserve(n) => *n,
        }
    }

    fn write(&self, a: &mut Arena, val_ptr: u32) {
        if let Self::Bytes(b) = self {
            a.copy_in(val_ptr, b);
        }
    }
}

/// Outcome of a recursive insert.
pub(crate) struct InsertOutcome {
    /// Root of the modified subtree; equals the input node after an
    /// in-place transient update.
    pub node: u32,
    /// `true` if an existing value was replaced rather than a key added.
    pub existed: bool,
    /// Offset of the value bytes in the (possibly new) leaf.
    pub val_ptr: u32,
}

/// Inserts `(hash, key, val)` into the tree rooted at `root`.
///
/// `tag` is the active transient owner tag, or 0 for plain persistent
/// inserts.
pub(crate) fn insert(
    a: &mut Arena,
    root: u32,
    hash: u32,
    key: &[u8],
    val: ValueSource<'_>,
    tag: u8,
) -> Result<InsertOutcome> {
    if root == NULL {
        let (leaf, val_ptr) = node::alloc_leaf(a, hash, key, val.len(), tag)?;
        val.write(a, val_ptr);
        return Ok(InsertOutcome {
            node: leaf,
            existed: false,
            val_ptr,
        });
    }
    insert_recursive(a, root, 0, hash, key, val, tag)
}

fn insert_recursive(
    a: &mut Arena,
    cur: u32,
    shift: u32,
    hash: u32,
    key: &[u8],
    val: ValueSource<'_>,
    tag: u8,
) -> Result<InsertOutcome> {
    if node::is_leaf(a, cur) {
        insert_at_leaf(a, cur, shift, hash, key, val, tag)
    } else if shift >= node::COLLISION_SHIFT {
        insert_into_collision(a, cur, hash, key, val, tag)
    } else {
        insert_into_inner(a, cur, shift, hash, key, val, tag)
    }
}

// ---------------------------------------------------------------------------
// Leaf position
// ---------------------------------------------------------------------------

fn insert_at_leaf(
    a: &mut Arena,
    cur: u32,
    shift: u32,
    hash: u32,
    key: &[u8],
    val: ValueSource<'_>,
    tag: u8,
) -> Result<InsertOutcome> {
    if node::leaf_matches(a, cur, hash, key) {
        // Same key — replace the value.
        if tag != 0
            && node::header_tag(node::header(a, cur)) == tag
            && node::leaf_val_len(a, cur) == val.len()
        {
            let val_ptr = node::leaf_val_ptr(a, cur);
            val.write(a, val_ptr);
            return Ok(InsertOutcome {
                node: cur,
                existed: true,
                val_ptr,
            });
        }
        let (leaf, val_ptr) = node::alloc_leaf(a, hash, key, val.len(), tag)?;
        val.write(a, val_ptr);
        return Ok(InsertOutcome {
            node: leaf,
            existed: true,
            val_ptr,
        });
    }

    // Different key landing on this leaf — split by the next differing
    // fragment. The old leaf becomes shared between both roots.
    let (leaf, val_ptr) = node::alloc_leaf(a, hash, key, val.len(), tag)?;
    val.write(a, val_ptr);
    refcount::incref(a, cur);
    let old_hash = node::leaf_key_hash(a, cur);
    let merged = merge_leaves(a, shift, cur, old_hash, leaf, hash, tag)?;
    Ok(InsertOutcome {
        node: merged,
        existed: false,
        val_ptr,
    })
}

/// Builds the internal chain splitting two leaves whose hashes agree up to
/// `shift`. Hashes identical through all 32 bits end side by side in a
/// positional collision node.
fn merge_leaves(
    a: &mut Arena,
    shift: u32,
    old: u32,
    old_hash: u32,
    new: u32,
    new_hash: u32,
    tag: u8,
) -> Result<u32> {
    if shift >= node::COLLISION_SHIFT {
        let merged = node::alloc_internal(a, 0b11, tag)?;
        node::set_child_at(a, merged, 0, old);
        node::set_child_at(a, merged, 1, new);
        return Ok(merged);
    }
    let f_old = node::fragment(old_hash, shift);
    let f_new = node::fragment(new_hash, shift);
    if f_old == f_new {
        let child = merge_leaves(a, shift + node::BITS_PER_LEVEL, old, old_hash, new, new_hash, tag)?;
        let merged = node::alloc_internal(a, node::bit_for(f_old), tag)?;
        node::set_child_at(a, merged, 0, child);
        Ok(merged)
    } else {
        let merged = node::alloc_internal(a, node::bit_for(f_old) | node::bit_for(f_new), tag)?;
        let (first, second) = if f_old < f_new { (old, new) } else { (new, old) };
        node::set_child_at(a, merged, 0, first);
        node::set_child_at(a, merged, 1, second);
        Ok(merged)
    }
}

// ---------------------------------------------------------------------------
// Internal node
// ---------------------------------------------------------------------------

fn insert_into_inner(
    a: &mut Arena,
    cur: u32,
    shift: u32,
    hash: u32,
    key: &[u8],
    val: ValueSource<'_>,
    tag: u8,
) -> Result<InsertOutcome> {
    let map = node::bitmap(a, cur);
    let bit = node::bit_for(node::fragment(hash, shift));

    if map & bit != 0 {
        // Slot occupied — recurse and splice the result back in.
        let idx = node::compact_index(map, bit);
        let child = node::child_at(a, cur, idx);
        let out = insert_recursive(a, child, shift + node::BITS_PER_LEVEL, hash, key, val, tag)?;
        if out.node == child {
            return Ok(InsertOutcome { node: cur, ..out });
        }
        if tag != 0 && node::header_tag(node::header(a, cur)) == tag {
            // Same popcount, same session — overwrite the slot in place.
            node::set_child_at(a, cur, idx, out.node);
            refcount::decref(a, child);
            return Ok(InsertOutcome { node: cur, ..out });
        }
        let copy = node::copy_internal(a, cur, idx, tag)?;
        node::set_child_at(a, copy, idx, out.node);
        return Ok(InsertOutcome { node: copy, ..out });
    }

    // Slot empty — the node grows by one child, which always reallocates.
    let (leaf, val_ptr) = node::alloc_leaf(a, hash, key, val.len(), tag)?;
    val.write(a, val_ptr);
    let new_map = map | bit;
    let insert_at = node::compact_index(new_map, bit);
    let count = map.count_ones();
    let copy = node::alloc_internal(a, new_map, tag)?;
    for i in 0..insert_at {
        let c = node::child_at(a, cur, i);
        refcount::incref(a, c);
        node::set_child_at(a, copy, i, c);
    }
    node::set_child_at(a, copy, insert_at, leaf);
    for i in insert_at..count {
        let c = node::child_at(a, cur, i);
        refcount::incref(a, c);
        node::set_child_at(a, copy, i + 1, c);
    }
    Ok(InsertOutcome {
        node: copy,
        existed: false,
        val_ptr,
    })
}

// ---------------------------------------------------------------------------
// Collision node
// ---------------------------------------------------------------------------

fn insert_into_collision(
    a: &mut Arena,
    cur: u32,
    hash: u32,
    key: &[u8],
    val: ValueSource<'_>,
    tag: u8,
) -> Result<InsertOutcome> {
    let count = node::child_count(a, cur);

    for i in 0..count {
        let child = node::child_at(a, cur, i);
        if !node::leaf_matches(a, child, hash, key) {
            continue;
        }
        if tag != 0
            && node::header_tag(node::header(a, child)) == tag
            && node::leaf_val_len(a, child) == val.len()
        {
            let val_ptr = node::leaf_val_ptr(a, child);
            val.write(a, val_ptr);
            return Ok(InsertOutcome {
                node: cur,
                existed: true,
                val_ptr,
            });
        }
        let (leaf, val_ptr) = node::alloc_leaf(a, hash, key, val.len(), tag)?;
        val.write(a, val_ptr);
        if tag != 0 && node::header_tag(node::header(a, cur)) == tag {
            node::set_child_at(a, cur, i, leaf);
            refcount::decref(a, child);
            return Ok(InsertOutcome {
                node: cur,
                existed: true,
                val_ptr,
            });
        }
        let copy = node::copy_internal(a, cur, i, tag)?;
        node::set_child_at(a, copy, i, leaf);
        return Ok(InsertOutcome {
            node: copy,
            existed: true,
            val_ptr,
        });
    }

    // Key not present — append one more colliding leaf.
    debug_assert!(count < 32, "collision node full");
    let (leaf, val_ptr) = node::alloc_leaf(a, hash, key, val.len(), tag)?;
    val.write(a, val_ptr);
    let new_map = ((1u64 << (count + 1)) - 1) as u32;
    let copy = node::alloc_internal(a, new_map, tag)?;
    for i in 0..count {
        let c = node::child_at(a, cur, i);
        refcount::incref(a, c);
        node::set_child_at(a, copy, i, c);
    }
    node::set_child_at(a, copy, count, leaf);
    Ok(InsertOutcome {
        node: copy,
        existed: false,
        val_ptr,
    })
}
