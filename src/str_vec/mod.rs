//! Contiguous string pools.
//!
//! An ordered sequence of byte strings stored as one pool plus per-record
//! boundaries. Layout variants:
//!
//! - [`FixedLenStrVec`]: every record is exactly `L` bytes; the boundary
//!   array disappears entirely.
//! - [`SortedStrVec`]: pool + bit-packed non-decreasing offsets.
//! - [`ZoSortedStrVec`]: pool + delta-compressed offsets
//!   ([`crate::int_vec::SortedUintVec`]).
//! - [`SortableStrVec`]: the build-time form: records in arrival order
//!   with an index side-table, sortable by content, producing the rank
//!   map trie builders need.
//! - [`RevOrdStrVec`]: an adaptor presenting another pool in reverse
//!   index order (`nth(i)` = physical `len-1-i`).
//!
//! Sorted variants keep the invariant `nth(i) <= nth(i+1)`; offsets are
//! non-decreasing and bounded by the pool size.

mod fixed;
mod sortable;
mod sorted;

pub use fixed::FixedLenStrVec;
pub use sortable::SortableStrVec;
pub use sorted::{RevOrdStrVec, SortedStrVec, SortedStrVecBuilder, ZoSortedStrVec};

/// Shared query surface over an ordered string pool.
pub trait StrVecOps {
    fn len(&self) -> usize;
    fn nth(&self, i: usize) -> &[u8];

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn nth_size(&self, i: usize) -> usize {
        self.nth(i).len()
    }

    /// First index in `[lo, hi)` with `nth(i) >= key`. Requires the range
    /// to be sorted.
    fn lower_bound(&self, lo: usize, hi: usize, key: &[u8]) -> usize {
        let mut l = lo;
        let mut h = hi;
        while l < h {
            let m = (l + h) / 2;
            if self.nth(m) < key {
                l = m + 1;
            } else {
                h = m;
            }
        }
        l
    }

    /// First index in `[lo, hi)` with `nth(i) > key`.
    fn upper_bound(&self, lo: usize, hi: usize, key: &[u8]) -> usize {
        let mut l = lo;
        let mut h = hi;
        while l < h {
            let m = (l + h) / 2;
            if self.nth(m) <= key {
                l = m + 1;
            } else {
                h = m;
            }
        }
        l
    }

    /// First index in `[lo, hi)` whose byte at `pos` orders after `ch`.
    /// A record shorter than `pos + 1` orders before any byte. Used by
    /// LOUDS builders to split a sorted range into child groups.
    fn upper_bound_at_pos(&self, lo: usize, hi: usize, pos: usize, ch: u8) -> usize {
        let mut l = lo;
        let mut h = hi;
        while l < h {
            let m = (l + h) / 2;
            let s = self.nth(m);
            let le = match s.get(pos) {
                None => true,
                Some(&b) => b <= ch,
            };
            if le {
                l = m + 1;
            } else {
                h = m;
            }
        }
        l
    }

    /// Total payload bytes.
    fn total_size(&self) -> usize {
        (0..self.len()).map(|i| self.nth_size(i)).sum()
    }
}
