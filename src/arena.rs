//! The byte arena: one contiguous buffer holding every persistent node.
//!
//! Allocation is a bump pointer plus a singly-linked, address-ordered free
//! list. Freed blocks coalesce with immediate neighbours, which keeps the
//! list bounded across long write sessions. The buffer grows by whole
//! 64 KiB pages up to a configured cap; growth failure is the only fatal
//! allocation error.
//!
//! The low prelude (key scratch, batch scratch, iterator stack, roots table)
//! sits at fixed offsets so that an attached reader finds them without
//! negotiation; see [`crate::layout`].

use tracing::{debug, trace};

use crate::error::{ArenaError, Result};
use crate::layout::{
    self, BATCH_BUF, BATCH_BUF_SIZE, BLOCK_HEADER_SIZE, GROW_PAGE, HEAP_BASE, KEY_BUF,
    KEY_BUF_SIZE, MIN_BLOCK_SIZE, NULL, ROOTS_TABLE, ROOTS_TABLE_SLOTS,
};

/// Sizing parameters for an [`Arena`].
#[derive(Clone, Copy, Debug)]
pub struct ArenaConfig {
    /// Initial backing-buffer size in bytes; rounded up to a whole page.
    pub initial_bytes: u32,
    /// Hard cap on backing-buffer size. Allocations that would push the
    /// buffer past this fail with [`ArenaError::CapacityExceeded`].
    pub max_bytes: u32,
}

impl ArenaConfig {
    /// Default initial size: one growth page.
    pub const DEFAULT_INITIAL_BYTES: u32 = GROW_PAGE;

    /// Default cap: 256 MiB.
    pub const DEFAULT_MAX_BYTES: u32 = 256 * 1024 * 1024;
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_bytes: Self::DEFAULT_INITIAL_BYTES,
            max_bytes: Self::DEFAULT_MAX_BYTES,
        }
    }
}

/// Exposed allocator state, the part of a snapshot that is not a root.
///
/// A reader re-seeds these two words so that its own allocations, should it
/// ever become a writer, do not collide with existing nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaState {
    /// First unallocated heap address.
    pub heap_end: u32,
    /// Head of the free list, [`NULL`](crate::layout::NULL) when empty.
    pub free_head: u32,
}

/// Single-owner byte arena.
///
/// All persistent-structure nodes live here. One writer at a time; readers
/// attach to a byte copy (or the shared region) via [`Arena::attach`] and
/// must not call mutation APIs.
pub struct Arena {
    bytes: Vec<u8>,
    heap_end: u32,
    free_head: u32,
    max_bytes: u32,
    /// Owner tag of the active transient session, 0 when none.
    pub(crate) owner_tag: u8,
    /// Last tag handed out; cycles 1..=255.
    pub(crate) last_tag: u8,
    /// Free-list head for 132-byte vector internal nodes.
    pub(crate) vec_free_internal: u32,
    /// Free-list head for 260-byte vector leaf nodes.
    pub(crate) vec_free_leaf: u32,
}

impl Arena {
    /// Creates an arena with default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    /// Creates an arena with explicit sizing.
    ///
    /// # Panics
    ///
    /// Panics if `initial_bytes` exceeds `max_bytes` or if the cap cannot
    /// hold the fixed prelude.
    #[must_use]
    pub fn with_config(config: ArenaConfig) -> Self {
        let initial = page_round(config.initial_bytes.max(HEAP_BASE));
        assert!(
            initial <= config.max_bytes,
            "initial size {initial} exceeds cap {max}",
            max = config.max_bytes
        );
        Self {
            bytes: vec![0; initial as usize],
            heap_end: HEAP_BASE,
            free_head: NULL,
            max_bytes: config.max_bytes,
            owner_tag: 0,
            last_tag: 0,
            vec_free_internal: NULL,
            vec_free_leaf: NULL,
        }
    }

    /// Reattaches to an externally produced buffer.
    ///
    /// `state` must be the producer's exported allocator state; roots are
    /// conveyed separately and rebuilt into handles via the snapshot types.
    #[must_use]
    pub fn attach(bytes: Vec<u8>, state: ArenaState) -> Self {
        let max = u32::try_from(bytes.len())
            .map_or(ArenaConfig::DEFAULT_MAX_BYTES, |len| {
                len.max(ArenaConfig::DEFAULT_MAX_BYTES)
            });
        Self {
            bytes,
            heap_end: state.heap_end,
            free_head: state.free_head,
            max_bytes: max,
            owner_tag: 0,
            last_tag: 0,
            vec_free_internal: NULL,
            vec_free_leaf: NULL,
        }
    }

    /// Exports the allocator state for snapshot handoff.
    #[must_use]
    pub const fn state(&self) -> ArenaState {
        ArenaState {
            heap_end: self.heap_end,
            free_head: self.free_head,
        }
    }

    /// The raw buffer, for handing to another worker.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the arena and yields its buffer.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// First unallocated heap address.
    #[must_use]
    pub const fn heap_end(&self) -> u32 {
        self.heap_end
    }

    /// Overwrites the bump pointer; snapshot-attach plumbing only.
    pub fn set_heap_end(&mut self, heap_end: u32) {
        self.heap_end = heap_end;
    }

    /// Head of the free list.
    #[must_use]
    pub const fn free_head(&self) -> u32 {
        self.free_head
    }

    /// Overwrites the free-list head; snapshot-attach plumbing only.
    pub fn set_free_head(&mut self, free_head: u32) {
        self.free_head = free_head;
    }

    /// Drops every allocation and clears the prelude scratch state.
    ///
    /// Handles created before the reset refer to freed memory and must not
    /// be used afterwards.
    pub fn reset(&mut self) {
        trace!(heap_end = self.heap_end, "arena reset");
        self.heap_end = HEAP_BASE;
        self.free_head = NULL;
        self.owner_tag = 0;
        self.vec_free_internal = NULL;
        self.vec_free_leaf = NULL;
        let table = ROOTS_TABLE as usize;
        self.bytes[table..table + (ROOTS_TABLE_SLOTS as usize) * 4].fill(0);
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    /// Allocates at least `n` usable bytes, 8-byte aligned.
    ///
    /// Returns the offset just past the block header. First-fit over the
    /// free list; a block larger than the request by at least one minimum
    /// block is split and the remainder pushed back.
    pub fn alloc(&mut self, n: u32) -> Result<u32> {
        let need = layout::block_size_for(n);

        let mut prev = NULL;
        let mut cur = self.free_head;
        while cur != NULL {
            let size = self.u32_at(cur);
            if size >= need {
                let next = self.u32_at(cur + 4);
                if size - need >= MIN_BLOCK_SIZE {
                    // Split: hand out the front, relink the remainder.
                    let rest = cur + need;
                    self.put_u32(rest, size - need);
                    self.put_u32(rest + 4, next);
                    self.relink(prev, rest);
                    self.put_u32(cur, need);
                } else {
                    self.relink(prev, next);
                }
                return Ok(cur + BLOCK_HEADER_SIZE);
            }
            prev = cur;
            cur = self.u32_at(cur + 4);
        }

        // No fit: bump, growing the buffer if the block does not fit.
        let block = self.heap_end;
        let new_end = block
            .checked_add(need)
            .ok_or(ArenaError::CapacityExceeded {
                requested: need,
                capacity: self.max_bytes,
            })?;
        if new_end as usize > self.bytes.len() {
            self.grow_to(new_end, need)?;
        }
        self.heap_end = new_end;
        self.put_u32(block, need);
        Ok(block + BLOCK_HEADER_SIZE)
    }

    /// Returns a block to the free list, coalescing with address neighbours.
    ///
    /// `offset` must be a value previously returned by [`Arena::alloc`].
    pub fn free(&mut self, offset: u32) {
        let block = offset - BLOCK_HEADER_SIZE;
        let size = self.u32_at(block);

        // Find the insertion point keeping the list address-ordered.
        let mut prev = NULL;
        let mut next = self.free_head;
        while next != NULL && next < block {
            prev = next;
            next = self.u32_at(next + 4);
        }

        let mut merged = block;
        let mut merged_size = size;

        if prev != NULL && prev + self.u32_at(prev) == block {
            merged = prev;
            merged_size += self.u32_at(prev);
        }
        if next != NULL && block + size == next {
            merged_size += self.u32_at(next);
            next = self.u32_at(next + 4);
        }

        self.put_u32(merged, merged_size);
        self.put_u32(merged + 4, next);
        if merged != prev {
            self.relink(prev, merged);
        }
    }

    /// Number of blocks currently on the free list.
    #[must_use]
    pub fn free_list_len(&self) -> usize {
        let mut n = 0;
        let mut cur = self.free_head;
        while cur != NULL {
            n += 1;
            cur = self.u32_at(cur + 4);
        }
        n
    }

    fn relink(&mut self, prev: u32, to: u32) {
        if prev == NULL {
            self.free_head = to;
        } else {
            self.put_u32(prev + 4, to);
        }
    }

    fn grow_to(&mut self, new_end: u32, requested: u32) -> Result<()> {
        let target = page_round(new_end);
        if target > self.max_bytes {
            return Err(ArenaError::CapacityExceeded {
                requested,
                capacity: self.max_bytes,
            });
        }
        let old_len = self.bytes.len();
        self.bytes.resize(target as usize, 0);
        debug!(old_len, new_len = target, "arena grown");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fixed regions
    // -----------------------------------------------------------------------

    /// The key scratch region.
    #[must_use]
    pub fn key_buf(&self, len: u32) -> &[u8] {
        let start = KEY_BUF as usize;
        &self.bytes[start..start + len as usize]
    }

    /// Mutable key scratch region, for staging a key before a staged call.
    pub fn key_buf_mut(&mut self) -> &mut [u8] {
        let start = KEY_BUF as usize;
        &mut self.bytes[start..start + KEY_BUF_SIZE as usize]
    }

    /// The batch scratch region.
    #[must_use]
    pub fn batch_buf(&self) -> &[u8] {
        let start = BATCH_BUF as usize;
        &self.bytes[start..start + BATCH_BUF_SIZE as usize]
    }

    /// Mutable batch scratch region.
    pub fn batch_buf_mut(&mut self) -> &mut [u8] {
        let start = BATCH_BUF as usize;
        &mut self.bytes[start..start + BATCH_BUF_SIZE as usize]
    }

    /// Registers a live root in the roots table, returning its slot.
    ///
    /// Returns `None` when the table is full. Registration is bookkeeping
    /// for out-of-band consumers; it does not touch refcounts.
    pub fn register_root(&mut self, root: u32) -> Option<u32> {
        for slot in 0..ROOTS_TABLE_SLOTS {
            let off = ROOTS_TABLE + slot * 4;
            if self.u32_at(off) == NULL {
                self.put_u32(off, root);
                return Some(slot);
            }
        }
        None
    }

    /// Clears a slot previously returned by [`Arena::register_root`].
    pub fn unregister_root(&mut self, slot: u32) {
        debug_assert!(slot < ROOTS_TABLE_SLOTS);
        self.put_u32(ROOTS_TABLE + slot * 4, NULL);
    }

    /// Root registered in `slot`, [`NULL`](crate::layout::NULL) when empty.
    #[must_use]
    pub fn root_at(&self, slot: u32) -> u32 {
        debug_assert!(slot < ROOTS_TABLE_SLOTS);
        self.u32_at(ROOTS_TABLE + slot * 4)
    }

    // -----------------------------------------------------------------------
    // Word and byte access
    // -----------------------------------------------------------------------

    pub(crate) fn u32_at(&self, offset: u32) -> u32 {
        let o = offset as usize;
        let b = &self.bytes[o..o + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    pub(crate) fn put_u32(&mut self, offset: u32, value: u32) {
        let o = offset as usize;
        self.bytes[o..o + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn u64_at(&self, offset: u32) -> u64 {
        let o = offset as usize;
        let b = &self.bytes[o..o + 8];
        u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    pub(crate) fn put_u64(&mut self, offset: u32, value: u64) {
        let o = offset as usize;
        self.bytes[o..o + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn slice(&self, offset: u32, len: u32) -> &[u8] {
        let o = offset as usize;
        &self.bytes[o..o + len as usize]
    }

    pub(crate) fn copy_in(&mut self, offset: u32, src: &[u8]) {
        let o = offset as usize;
        self.bytes[o..o + src.len()].copy_from_slice(src);
    }

    /// Bytes at an engine-reported offset, for reading a value in place.
    #[must_use]
    pub fn bytes_at(&self, offset: u32, len: u32) -> &[u8] {
        self.slice(offset, len)
    }

    /// Writes bytes at an engine-reported offset.
    ///
    /// This completes a staged insert: the engine reserves `val_len` bytes
    /// and hands back `val_ptr`; the caller fills them here.
    pub fn write_bytes(&mut self, offset: u32, src: &[u8]) {
        self.copy_in(offset, src);
    }

    // -----------------------------------------------------------------------
    // Transient sessions
    // -----------------------------------------------------------------------

    /// Opens a transient session and returns its owner tag.
    ///
    /// Nested sessions are forbidden and rejected outright.
    pub(crate) fn begin_transient(&mut self) -> Result<u8> {
        if self.owner_tag != 0 {
            return Err(ArenaError::TransientActive {
                active: self.owner_tag,
            });
        }
        let tag = if self.last_tag == u8::MAX {
            1
        } else {
            self.last_tag + 1
        };
        self.last_tag = tag;
        self.owner_tag = tag;
        trace!(tag, "transient session opened");
        Ok(tag)
    }

    /// Closes the active transient session; the tree is immutable again.
    pub(crate) fn end_transient(&mut self) {
        trace!(tag = self.owner_tag, "transient session closed");
        self.owner_tag = 0;
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.bytes.len())
            .field("heap_end", &self.heap_end)
            .field("free_head", &self.free_head)
            .finish_non_exhaustive()
    }
}

const fn page_round(n: u32) -> u32 {
    n.div_ceil(GROW_PAGE).saturating_mul(GROW_PAGE)
}
