//! Persistent map handle and the staged engine entry points.
//!
//! A handle is a small value: root offset, cached entry count and an opaque
//! value-type tag for the codec layer above. Every operation takes the
//! arena explicitly; writes return a new handle wrapping a new root while
//! the old handle stays valid and independent.
//!
//! # Reference ownership
//!
//! A handle owns one reference to its root. Copies of a handle share that
//! single reference — use [`MapHandle::retain`] when a second independent
//! owner is wanted, and [`MapHandle::release`] exactly once per owned
//! reference. Every write returns a handle that owns its own reference:
//! `delete` of an absent key hands the same root back after an incref, so
//! releasing both the old and new handles stays sound.

use smallvec::SmallVec;

use crate::arena::Arena;
use crate::error::{ArenaError, Result};
use crate::hash::{avalanche32, fnv1a};
use crate::layout::{BATCH_BUF, KEY_BUF_SIZE, NOT_FOUND, NULL};
use crate::node;
use crate::ops::get::{self, LeafInfo};
use crate::ops::insert::{self, ValueSource};
use crate::ops::remove::{self, RemoveOutcome};
use crate::refcount;

/// Inline capacity for key copies made by the staged entry points.
type KeyScratch = SmallVec<[u8; 64]>;

/// Handle to one version of a persistent hash map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapHandle {
    root: u32,
    size: u32,
    value_tag: u8,
}

impl MapHandle {
    /// An empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_value_tag(0)
    }

    /// An empty map whose values carry the given codec tag.
    ///
    /// The tag is opaque to the engine; wrapper layers use it to pick a
    /// value codec when reconstructing language-level objects.
    #[must_use]
    pub const fn with_value_tag(value_tag: u8) -> Self {
        Self {
            root: NULL,
            size: 0,
            value_tag,
        }
    }

    /// Rebuilds a handle from snapshot parts.
    #[must_use]
    pub const fn from_parts(root: u32, size: u32, value_tag: u8) -> Self {
        Self {
            root,
            size,
            value_tag,
        }
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.size
    }

    /// `true` when the map has no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Root node offset; the null offset for an empty map.
    #[must_use]
    pub const fn root(&self) -> u32 {
        self.root
    }

    /// The opaque value-codec tag.
    #[must_use]
    pub const fn value_tag(&self) -> u8 {
        self.value_tag
    }

    /// Returns a copy owning its own root reference.
    #[must_use]
    pub fn retain(&self, a: &mut Arena) -> Self {
        if self.root != NULL {
            refcount::incref(a, self.root);
        }
        *self
    }

    /// Drops this handle's root reference, freeing subtrees unique to it.
    pub fn release(self, a: &mut Arena) {
        refcount::decref(a, self.root);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Value bytes stored under `key`.
    #[must_use]
    pub fn get<'a>(&self, a: &'a Arena, key: &[u8]) -> Option<&'a [u8]> {
        let leaf = get::find_leaf(a, self.root, fnv1a(key), key);
        (leaf != NULL).then(|| node::leaf_val(a, leaf))
    }

    /// `true` if `key` is present.
    #[must_use]
    pub fn has(&self, a: &Arena, key: &[u8]) -> bool {
        get::find_leaf(a, self.root, fnv1a(key), key) != NULL
    }

    /// Field locations of the entry under `key`.
    #[must_use]
    pub fn get_info(&self, a: &Arena, key: &[u8]) -> Option<LeafInfo> {
        let leaf = get::find_leaf(a, self.root, fnv1a(key), key);
        (leaf != NULL).then(|| get::leaf_info(a, leaf))
    }

    /// Little-endian `i32` at `offset` inside the value under `key`.
    #[must_use]
    pub fn get_field_i32(&self, a: &Arena, key: &[u8], offset: u32) -> Option<i32> {
        let leaf = get::find_leaf(a, self.root, fnv1a(key), key);
        if leaf == NULL {
            return None;
        }
        get::read_field_i32(a, leaf, offset)
    }

    /// Little-endian `f64` at `offset` inside the value under `key`.
    #[must_use]
    pub fn get_field_f64(&self, a: &Arena, key: &[u8], offset: u32) -> Option<f64> {
        let leaf = get::find_leaf(a, self.root, fnv1a(key), key);
        if leaf == NULL {
            return None;
        }
        get::read_field_f64(a, leaf, offset)
    }

    /// Copies the length-prefixed string field at `offset` into `out`,
    /// returning the full field length.
    #[must_use]
    pub fn get_field_str(&self, a: &Arena, key: &[u8], offset: u32, out: &mut [u8]) -> Option<u32> {
        let leaf = get::find_leaf(a, self.root, fnv1a(key), key);
        if leaf == NULL {
            return None;
        }
        get::read_field_str(a, leaf, offset, out)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Inserts or replaces `key`, returning the handle of the new version.
    pub fn set(&self, a: &mut Arena, key: &[u8], val: &[u8]) -> Result<Self> {
        let out = insert::insert(a, self.root, fnv1a(key), key, ValueSource::Bytes(val), 0)?;
        Ok(Self {
            root: out.node,
            size: self.size + u32::from(!out.existed),
            value_tag: self.value_tag,
        })
    }

    /// Removes `key`, returning the new version's handle.
    ///
    /// An absent key returns a handle with the same root and size; the
    /// root is incref'd so the returned handle owns its own reference.
    pub fn delete(&self, a: &mut Arena, key: &[u8]) -> Result<Self> {
        match remove::remove(a, self.root, fnv1a(key), key, 0)? {
            RemoveOutcome::NotFound => Ok(self.retain(a)),
            RemoveOutcome::Removed { node } => Ok(Self {
                root: node,
                size: self.size - 1,
                value_tag: self.value_tag,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Numeric keys
    // -----------------------------------------------------------------------
    //
    // Index-keyed variants store the index as a 4-byte little-endian key
    // and hash it with the integer avalanche mix instead of FNV-1a.

    /// Inserts or replaces the entry under numeric key `index`.
    pub fn set_num(&self, a: &mut Arena, index: u32, val: &[u8]) -> Result<Self> {
        let key = index.to_le_bytes();
        let out = insert::insert(
            a,
            self.root,
            avalanche32(index),
            &key,
            ValueSource::Bytes(val),
            0,
        )?;
        Ok(Self {
            root: out.node,
            size: self.size + u32::from(!out.existed),
            value_tag: self.value_tag,
        })
    }

    /// Value bytes under numeric key `index`.
    #[must_use]
    pub fn get_num<'a>(&self, a: &'a Arena, index: u32) -> Option<&'a [u8]> {
        let key = index.to_le_bytes();
        let leaf = get::find_leaf(a, self.root, avalanche32(index), &key);
        (leaf != NULL).then(|| node::leaf_val(a, leaf))
    }

    /// `true` if numeric key `index` is present.
    #[must_use]
    pub fn has_num(&self, a: &Arena, index: u32) -> bool {
        let key = index.to_le_bytes();
        get::find_leaf(a, self.root, avalanche32(index), &key) != NULL
    }

    /// Field locations of the entry under numeric key `index`.
    #[must_use]
    pub fn get_num_info(&self, a: &Arena, index: u32) -> Option<LeafInfo> {
        let key = index.to_le_bytes();
        let leaf = get::find_leaf(a, self.root, avalanche32(index), &key);
        (leaf != NULL).then(|| get::leaf_info(a, leaf))
    }

    /// Removes numeric key `index`; an absent key hands back an incref'd
    /// handle on the same root.
    pub fn delete_num(&self, a: &mut Arena, index: u32) -> Result<Self> {
        let key = index.to_le_bytes();
        match remove::remove(a, self.root, avalanche32(index), &key, 0)? {
            RemoveOutcome::NotFound => Ok(self.retain(a)),
            RemoveOutcome::Removed { node } => Ok(Self {
                root: node,
                size: self.size - 1,
                value_tag: self.value_tag,
            }),
        }
    }
}

impl Default for MapHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Staged entry points
// ---------------------------------------------------------------------------
//
// The raw engine surface: the caller stages the key in KEY_BUF, the engine
// returns its multi-word results through BATCH_BUF as well as by value.
// These are the operations an attached peer speaks; the typed handle API
// above bypasses the scratch regions entirely.

/// Result triple of a staged insert, also written to `BATCH_BUF`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagedInsert {
    /// Root of the new tree version.
    pub new_root: u32,
    /// Whether an existing value was replaced.
    pub existed: bool,
    /// Offset of the value bytes; the caller writes the value here.
    pub val_ptr: u32,
}

fn staged_key(a: &Arena, key_len: u32) -> Result<KeyScratch> {
    if key_len > KEY_BUF_SIZE {
        return Err(ArenaError::KeyTooLarge {
            len: key_len,
            max: KEY_BUF_SIZE,
        });
    }
    Ok(KeyScratch::from_slice(a.key_buf(key_len)))
}

/// Inserts the key staged in `KEY_BUF`, reserving `val_len` value bytes.
///
/// Writes `(new_root, existed, val_ptr)` to `BATCH_BUF` words 0..3; the
/// caller completes the operation by writing the value through `val_ptr`.
pub fn insert_staged(a: &mut Arena, root: u32, key_len: u32, val_len: u32) -> Result<StagedInsert> {
    let key = staged_key(a, key_len)?;
    let out = insert::insert(a, root, fnv1a(&key), &key, ValueSource::Reserve(val_len), 0)?;
    a.put_u32(BATCH_BUF, out.node);
    a.put_u32(BATCH_BUF + 4, u32::from(out.existed));
    a.put_u32(BATCH_BUF + 8, out.val_ptr);
    Ok(StagedInsert {
        new_root: out.node,
        existed: out.existed,
        val_ptr: out.val_ptr,
    })
}

/// Removes the key staged in `KEY_BUF`.
///
/// Returns the new root, or [`NOT_FOUND`](crate::layout::NOT_FOUND) when
/// the key was absent so the caller leaves its size counter alone. The
/// result is also written to `BATCH_BUF` word 0.
pub fn remove_staged(a: &mut Arena, root: u32, key_len: u32) -> Result<u32> {
    let key = staged_key(a, key_len)?;
    let result = match remove::remove(a, root, fnv1a(&key), &key, 0)? {
        RemoveOutcome::NotFound => NOT_FOUND,
        RemoveOutcome::Removed { node } => node,
    };
    a.put_u32(BATCH_BUF, result);
    Ok(result)
}

/// Looks up the key staged in `KEY_BUF`, returning the leaf offset or the
/// null offset.
pub fn get_staged(a: &Arena, root: u32, key_len: u32) -> Result<u32> {
    let key = staged_key(a, key_len)?;
    Ok(get::find_leaf(a, root, fnv1a(&key), &key))
}

/// Looks up the staged key and writes `[leaf, key_len, val_len, key_ptr]`
/// to `BATCH_BUF`; returns the leaf offset (null on a miss).
pub fn get_info_staged(a: &mut Arena, root: u32, key_len: u32) -> Result<u32> {
    let key = staged_key(a, key_len)?;
    let leaf = get::find_leaf(a, root, fnv1a(&key), &key);
    if leaf == NULL {
        a.put_u32(BATCH_BUF, NULL);
        return Ok(NULL);
    }
    let info = get::leaf_info(a, leaf);
    a.put_u32(BATCH_BUF, info.leaf);
    a.put_u32(BATCH_BUF + 4, info.key_len);
    a.put_u32(BATCH_BUF + 8, info.val_len);
    a.put_u32(BATCH_BUF + 12, info.key_ptr);
    Ok(leaf)
}
