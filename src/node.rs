//! HAMT node layout and bitmap helpers.
//!
//! A node starts with a 4-byte header (low 24 bits refcount, high 8 bits
//! transient owner tag) followed by a 4-byte bitmap word. A zero bitmap
//! marks a leaf; a non-zero bitmap marks an internal node whose set bits
//! name the occupied child slots, children packed in ascending slot order
//! with no gaps.

use crate::arena::Arena;
use crate::error::Result;
use crate::layout::NULL;

/// Bits of hash consumed per trie level (5 → 32-way branching).
pub const BITS_PER_LEVEL: u32 = 5;

/// Mask over one level's hash fragment.
pub const LEVEL_MASK: u32 = 0x1F;

/// Shift at which the 32-bit hash is exhausted; nodes at or past this
/// depth are positional collision nodes.
pub const COLLISION_SHIFT: u32 = 32;

/// Low 24 bits of the header hold the refcount.
pub const REFCOUNT_MASK: u32 = 0x00FF_FFFF;

// Field offsets relative to a node offset.
const HEADER: u32 = 0;
const BITMAP: u32 = 4;
const CHILDREN: u32 = 8;
const LEAF_KEY_HASH: u32 = 8;
const LEAF_KEY_LEN: u32 = 12;
const LEAF_VAL_LEN: u32 = 16;
const LEAF_KEY_BYTES: u32 = 20;

// ---------------------------------------------------------------------------
// Bitmap helpers
// ---------------------------------------------------------------------------

/// Extracts the 5-bit hash fragment at the given bit-shift depth.
#[inline]
#[must_use]
pub const fn fragment(hash: u32, shift: u32) -> u32 {
    (hash >> shift) & LEVEL_MASK
}

/// Returns the single-bit mask for the given fragment (0..31).
#[inline]
#[must_use]
pub const fn bit_for(frag: u32) -> u32 {
    1 << frag
}

/// Returns the compact child index of `bit` within `bitmap`.
///
/// Counts the number of set bits below `bit`.
#[inline]
#[must_use]
pub const fn compact_index(bitmap: u32, bit: u32) -> u32 {
    (bitmap & (bit - 1)).count_ones()
}

// ---------------------------------------------------------------------------
// Header packing
// ---------------------------------------------------------------------------

/// Packs a refcount and owner tag into a header word.
#[inline]
#[must_use]
pub const fn pack_header(refcount: u32, tag: u8) -> u32 {
    (refcount & REFCOUNT_MASK) | ((tag as u32) << 24)
}

/// Refcount field of a header word.
#[inline]
#[must_use]
pub const fn header_refcount(header: u32) -> u32 {
    header & REFCOUNT_MASK
}

/// Owner-tag field of a header word.
#[inline]
#[must_use]
pub const fn header_tag(header: u32) -> u8 {
    (header >> 24) as u8
}

// ---------------------------------------------------------------------------
// Node accessors
// ---------------------------------------------------------------------------

#[inline]
pub(crate) fn header(a: &Arena, node: u32) -> u32 {
    a.u32_at(node + HEADER)
}

pub(crate) fn set_header(a: &mut Arena, node: u32, header: u32) {
    a.put_u32(node + HEADER, header);
}

/// Bitmap word; zero means leaf.
#[inline]
pub(crate) fn bitmap(a: &Arena, node: u32) -> u32 {
    a.u32_at(node + BITMAP)
}

#[inline]
pub(crate) fn is_leaf(a: &Arena, node: u32) -> bool {
    bitmap(a, node) == 0
}

#[inline]
pub(crate) fn child_count(a: &Arena, node: u32) -> u32 {
    bitmap(a, node).count_ones()
}

#[inline]
pub(crate) fn child_at(a: &Arena, node: u32, index: u32) -> u32 {
    a.u32_at(node + CHILDREN + index * 4)
}

pub(crate) fn set_child_at(a: &mut Arena, node: u32, index: u32, child: u32) {
    a.put_u32(node + CHILDREN + index * 4, child);
}

#[inline]
pub(crate) fn leaf_key_hash(a: &Arena, node: u32) -> u32 {
    a.u32_at(node + LEAF_KEY_HASH)
}

#[inline]
pub(crate) fn leaf_key_len(a: &Arena, node: u32) -> u32 {
    a.u32_at(node + LEAF_KEY_LEN)
}

#[inline]
pub(crate) fn leaf_val_len(a: &Arena, node: u32) -> u32 {
    a.u32_at(node + LEAF_VAL_LEN)
}

#[inline]
pub(crate) fn leaf_key_ptr(node: u32) -> u32 {
    node + LEAF_KEY_BYTES
}

#[inline]
pub(crate) fn leaf_val_ptr(a: &Arena, node: u32) -> u32 {
    node + LEAF_KEY_BYTES + leaf_key_len(a, node)
}

pub(crate) fn leaf_key(a: &Arena, node: u32) -> &[u8] {
    a.slice(leaf_key_ptr(node), leaf_key_len(a, node))
}

pub(crate) fn leaf_val(a: &Arena, node: u32) -> &[u8] {
    a.slice(leaf_val_ptr(a, node), leaf_val_len(a, node))
}

/// `true` if the leaf stores exactly `(hash, key)`.
pub(crate) fn leaf_matches(a: &Arena, node: u32, hash: u32, key: &[u8]) -> bool {
    leaf_key_hash(a, node) == hash
        && leaf_key_len(a, node) as usize == key.len()
        && leaf_key(a, node) == key
}

// ---------------------------------------------------------------------------
// Node construction
// ---------------------------------------------------------------------------

/// Usable bytes of an internal node with `children` slots.
#[inline]
#[must_use]
pub const fn internal_size(children: u32) -> u32 {
    CHILDREN + children * 4
}

/// Usable bytes of a leaf holding `key_len` + `val_len` payload bytes.
#[inline]
#[must_use]
pub const fn leaf_size(key_len: u32, val_len: u32) -> u32 {
    LEAF_KEY_BYTES + key_len + val_len
}

/// Allocates an internal node with refcount 1 and the given bitmap.
///
/// Child slots are left for the caller to fill; freshly allocated memory is
/// not zeroed.
pub(crate) fn alloc_internal(a: &mut Arena, bitmap: u32, tag: u8) -> Result<u32> {
    debug_assert_ne!(bitmap, 0, "internal node needs a non-empty bitmap");
    let node = a.alloc(internal_size(bitmap.count_ones()))?;
    a.put_u32(node + HEADER, pack_header(1, tag));
    a.put_u32(node + BITMAP, bitmap);
    Ok(node)
}

/// Allocates a leaf with refcount 1, copying in the key.
///
/// Value bytes are reserved but not written; the caller fills them through
/// the returned value pointer. Returns `(node, val_ptr)`.
pub(crate) fn alloc_leaf(
    a: &mut Arena,
    hash: u32,
    key: &[u8],
    val_len: u32,
    tag: u8,
) -> Result<(u32, u32)> {
    let key_len = key.len() as u32;
    let node = a.alloc(leaf_size(key_len, val_len))?;
    a.put_u32(node + HEADER, pack_header(1, tag));
    a.put_u32(node + BITMAP, 0);
    a.put_u32(node + LEAF_KEY_HASH, hash);
    a.put_u32(node + LEAF_KEY_LEN, key_len);
    a.put_u32(node + LEAF_VAL_LEN, val_len);
    a.copy_in(node + LEAF_KEY_BYTES, key);
    Ok((node, node + LEAF_KEY_BYTES + key_len))
}

/// Copies an internal node into a fresh node with refcount 1, increfing
/// every child except the one at `skip_slot`.
///
/// Pass `skip_slot = u32::MAX` to incref all children.
pub(crate) fn copy_internal(a: &mut Arena, node: u32, skip_slot: u32, tag: u8) -> Result<u32> {
    let map = bitmap(a, node);
    let count = map.count_ones();
    let copy = alloc_internal(a, map, tag)?;
    for i in 0..count {
        let child = child_at(a, node, i);
        if i != skip_slot && child != NULL {
            crate::refcount::incref(a, child);
        }
        set_child_at(a, copy, i, child);
    }
    Ok(copy)
}
