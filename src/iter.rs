//! Depth-first leaf iteration over an explicit in-arena frame stack.
//!
//! The cursor is a plain stack machine: `new` pushes the root, `next_leaf`
//! pops one frame and either yields a leaf or pushes the popped node's
//! children in reverse slot order so the leftmost child surfaces first.
//! Frames live at [`ITER_STACK`](crate::layout::ITER_STACK), so one cursor
//! per arena is live at a time.

use crate::arena::Arena;
use crate::layout::{BATCH_BUF, BATCH_BUF_SIZE, ITER_STACK, ITER_STACK_FRAMES, NULL};
use crate::node;

/// Bytes of one batched iteration record: `[leaf_ptr, key_len, val_len]`.
pub const ITER_RECORD_SIZE: u32 = 12;

/// Cursor over every leaf reachable from a root.
#[derive(Debug)]
pub struct LeafCursor {
    frames: u32,
}

impl LeafCursor {
    /// Starts an iteration by pushing `root` onto the frame stack.
    #[must_use]
    pub fn new(a: &mut Arena, root: u32) -> Self {
        if root == NULL {
            return Self { frames: 0 };
        }
        a.put_u32(ITER_STACK, root);
        Self { frames: 1 }
    }

    /// Yields the next leaf offset, or the null offset when exhausted.
    pub fn next_leaf(&mut self, a: &mut Arena) -> u32 {
        while self.frames > 0 {
            self.frames -= 1;
            let cur = a.u32_at(ITER_STACK + self.frames * 4);
            if node::is_leaf(a, cur) {
                return cur;
            }
            let count = node::child_count(a, cur);
            debug_assert!(
                self.frames + count <= ITER_STACK_FRAMES,
                "iterator stack overflow"
            );
            for i in (0..count).rev() {
                let child = node::child_at(a, cur, i);
                a.put_u32(ITER_STACK + self.frames * 4, child);
                self.frames += 1;
            }
        }
        NULL
    }

    /// Fills [`BATCH_BUF`](crate::layout::BATCH_BUF) with up to
    /// `max_records` `[leaf_ptr, key_len, val_len]` records and returns how
    /// many were written.
    ///
    /// Amortises per-leaf call overhead; a short count (including zero)
    /// means the cursor is exhausted.
    pub fn next_leaves(&mut self, a: &mut Arena, max_records: u32) -> u32 {
        let cap = BATCH_BUF_SIZE / ITER_RECORD_SIZE;
        let want = max_records.min(cap);
        let mut written = 0;
        while written < want {
            let leaf = self.next_leaf(a);
            if leaf == NULL {
                break;
            }
            let rec = BATCH_BUF + written * ITER_RECORD_SIZE;
            let key_len = node::leaf_key_len(a, leaf);
            let val_len = node::leaf_val_len(a, leaf);
            a.put_u32(rec, leaf);
            a.put_u32(rec + 4, key_len);
            a.put_u32(rec + 8, val_len);
            written += 1;
        }
        written
    }

    /// Frames still pending; zero once exhausted.
    #[must_use]
    pub const fn pending(&self) -> u32 {
        self.frames
    }
}
