//! Batched writes and transient sessions.
//!
//! A batch folds a sequence of writes into one new version, releasing each
//! intermediate root as soon as the next one supersedes it, so the arena
//! only keeps the entry version and the exit version alive.
//!
//! The transient variants additionally open an owner-tag session: nodes
//! allocated during the session carry the tag and may be patched in place
//! by later writes of the same batch, skipping most of the path copies.
//! Transients never escape — the tag is cleared when the batch returns and
//! the resulting tree is as immutable as any other.

use tracing::trace;

use crate::arena::Arena;
use crate::error::Result;
use crate::hash::fnv1a;
use crate::layout::NULL;
use crate::map::MapHandle;
use crate::node;
use crate::ops::get;
use crate::ops::insert::{self, ValueSource};
use crate::ops::remove::{self, RemoveOutcome};
use crate::refcount;

/// Applies all `pairs` to `map`, returning the handle of the final version.
pub fn batch_insert(a: &mut Arena, map: &MapHandle, pairs: &[(&[u8], &[u8])]) -> Result<MapHandle> {
    let (root, size) = run_inserts(a, map.root(), map.len(), pairs, 0)?;
    Ok(MapHandle::from_parts(root, size, map.value_tag()))
}

/// [`batch_insert`] with in-place mutation of this-session nodes.
pub fn batch_insert_transient(
    a: &mut Arena,
    map: &MapHandle,
    pairs: &[(&[u8], &[u8])],
) -> Result<MapHandle> {
    let tag = a.begin_transient()?;
    let result = run_inserts(a, map.root(), map.len(), pairs, tag);
    a.end_transient();
    let (root, size) = result?;
    clear_tags(a, root, tag);
    Ok(MapHandle::from_parts(root, size, map.value_tag()))
}

/// Looks up every key, returning one leaf offset (or the null offset) per
/// key in input order.
#[must_use]
pub fn batch_get(a: &Arena, map: &MapHandle, keys: &[&[u8]]) -> Vec<u32> {
    keys.iter()
        .map(|key| get::find_leaf(a, map.root(), fnv1a(key), key))
        .collect()
}

/// Removes all `keys` from `map`; absent keys are skipped.
pub fn batch_delete(a: &mut Arena, map: &MapHandle, keys: &[&[u8]]) -> Result<MapHandle> {
    let (root, size) = run_deletes(a, map.root(), map.len(), keys, 0)?;
    Ok(MapHandle::from_parts(root, size, map.value_tag()))
}

/// [`batch_delete`] with in-place mutation of this-session nodes.
pub fn batch_delete_transient(
    a: &mut Arena,
    map: &MapHandle,
    keys: &[&[u8]],
) -> Result<MapHandle> {
    let tag = a.begin_transient()?;
    let result = run_deletes(a, map.root(), map.len(), keys, tag);
    a.end_transient();
    let (root, size) = result?;
    clear_tags(a, root, tag);
    Ok(MapHandle::from_parts(root, size, map.value_tag()))
}

fn run_inserts(
    a: &mut Arena,
    entry_root: u32,
    mut size: u32,
    pairs: &[(&[u8], &[u8])],
    tag: u8,
) -> Result<(u32, u32)> {
    trace!(count = pairs.len(), tag, "batch insert");
    let mut root = entry_root;
    for (key, val) in pairs {
        let out = insert::insert(a, root, fnv1a(key), key, ValueSource::Bytes(val), tag)?;
        if !out.existed {
            size += 1;
        }
        if out.node != root {
            release_intermediate(a, root, entry_root);
            root = out.node;
        }
    }
    own_result(a, root, entry_root);
    Ok((root, size))
}

fn run_deletes(
    a: &mut Arena,
    entry_root: u32,
    mut size: u32,
    keys: &[&[u8]],
    tag: u8,
) -> Result<(u32, u32)> {
    trace!(count = keys.len(), tag, "batch delete");
    let mut root = entry_root;
    for key in keys {
        match remove::remove(a, root, fnv1a(key), key, tag)? {
            RemoveOutcome::NotFound => {}
            RemoveOutcome::Removed { node } => {
                size -= 1;
                if node != root {
                    release_intermediate(a, root, entry_root);
                    root = node;
                }
            }
        }
    }
    own_result(a, root, entry_root);
    Ok((root, size))
}

/// Drops a superseded intermediate root. The batch's entry root stays
/// owned by the caller's handle.
fn release_intermediate(a: &mut Arena, root: u32, entry_root: u32) {
    if root != entry_root && root != NULL {
        refcount::decref(a, root);
    }
}

/// A batch that changed nothing hands the entry root back; incref it so
/// the returned handle owns its own reference like any other result.
fn own_result(a: &mut Arena, root: u32, entry_root: u32) {
    if root == entry_root && root != NULL {
        refcount::incref(a, root);
    }
}

/// Strips the session tag from every node the batch created.
///
/// Session nodes form a connected region at the top of the result tree
/// (every ancestor of a session node is a session node), so the walk
/// stops at the first untagged node on each path. Afterwards no node
/// carries the tag and a later session reusing the cycled tag value
/// cannot mistake old nodes for its own.
fn clear_tags(a: &mut Arena, cur: u32, tag: u8) {
    if cur == NULL {
        return;
    }
    let header = node::header(a, cur);
    if node::header_tag(header) != tag {
        return;
    }
    node::set_header(a, cur, node::pack_header(node::header_refcount(header), 0));
    if !node::is_leaf(a, cur) {
        for i in 0..node::child_count(a, cur) {
            let child = node::child_at(a, cur, i);
            clear_tags(a, child, tag);
        }
    }
}
