//! Succinct rank/select bitvectors.
//!
//! All variants answer the same query surface over an immutable bit array
//! of length `n`:
//!
//! - `rank1(i)`: set bits in `[0, i)`, defined for `0 <= i <= n`
//! - `select1(k)`: position of the `k`-th set bit (0-based)
//! - `is1(i)` / `is0(i)`: single-bit probes
//! - `one_seq_len(i)` / `zero_seq_len(i)`: run length starting at `i`
//! - `one_seq_revlen(i)` / `zero_seq_revlen(i)`: run length ending at `i`
//!
//! plus the `rank0`/`select0` mirrors and `max_rank0`/`max_rank1` totals.
//!
//! Layout variants trade cache behavior for density:
//!
//! - [`RankSelectSe256`] / [`RankSelectSe512`]: separated: bits and rank
//!   cache in distinct arrays.
//! - [`RankSelectIl256`]: interleaved: each 256-bit line carries its rank
//!   base in the same 40-byte record, one cache line per lookup.
//! - [`RankSelectMixedIl256`]: two logical bitvectors share a line to
//!   amortize the cache metadata.
//! - [`RankSelectFewZero`] / [`RankSelectFewOne`]: rare-bit position
//!   lists for heavily skewed vectors (rare ratio under a few percent).
//! - [`RankSelectAllZero`] / [`RankSelectAllOne`]: constant-space
//!   degenerates.
//!
//! A freshly built vector answers no queries until `build_cache` has run;
//! zero-copy loads arrive with caches already in the image.

mod bitvec;
mod degenerate;
mod few;
mod il;
mod mixed;
pub(crate) mod raw;
mod se;

pub use bitvec::BitVec;
pub use degenerate::{RankSelectAllOne, RankSelectAllZero};
pub use few::{RankSelectFew, RankSelectFewBuilder, RankSelectFewOne, RankSelectFewZero};
pub use il::RankSelectIl256;
pub use mixed::{MixedDim, RankSelectMixedIl256};
pub use se::{RankSelectSe256, RankSelectSe512};

use crate::error::Result;
use crate::region::ByteRegion;

/// Query surface shared by every rank/select variant.
///
/// Contract edge cases: `rank*(0) == 0`, `rank*(size()) == max_rank*()`;
/// `select*` with `k >= max_rank*()` returns `size()` (debug builds
/// assert first).
pub trait RankSelectOps {
    fn size(&self) -> usize;
    fn rank1(&self, pos: usize) -> usize;
    fn select1(&self, k: usize) -> usize;
    fn select0(&self, k: usize) -> usize;
    fn is1(&self, pos: usize) -> bool;
    fn max_rank1(&self) -> usize;

    fn rank0(&self, pos: usize) -> usize {
        pos - self.rank1(pos)
    }
    fn is0(&self, pos: usize) -> bool {
        !self.is1(pos)
    }
    fn max_rank0(&self) -> usize {
        self.size() - self.max_rank1()
    }

    /// Run of one bits starting at `pos` (0 if `pos` is clear or past end).
    fn one_seq_len(&self, pos: usize) -> usize;
    /// Run of zero bits starting at `pos`.
    fn zero_seq_len(&self, pos: usize) -> usize;
    /// Run of one bits immediately before `pos`.
    fn one_seq_revlen(&self, pos: usize) -> usize;
    /// Run of zero bits immediately before `pos`.
    fn zero_seq_revlen(&self, pos: usize) -> usize;

    /// Resident bytes (payload + caches).
    fn mem_size(&self) -> usize;
}

/// Construction/serialization surface needed by containers that embed a
/// rank/select index (tries, mixed-length stores).
pub trait RankSelectIndex: RankSelectOps + Sized {
    /// Freeze a bit array and build rank + both select caches.
    fn from_bitvec(bits: BitVec) -> Self;
    /// Append the serialized image (8-byte aligned) to `out`.
    fn save(&self, out: &mut Vec<u8>);
    /// Zero-copy load from an exact-sized region produced by `save`.
    fn load(region: ByteRegion) -> Result<Self>;
}

/// Word-granular access to the underlying bits; lets the run-length
/// helpers below work across storage layouts.
pub(crate) trait WordAccess {
    /// Number of valid bits.
    fn bit_size(&self) -> usize;
    /// The `i`-th 64-bit word (bits past `bit_size` are garbage).
    fn word(&self, i: usize) -> u64;
}

pub(crate) fn one_seq_len_at(w: &impl WordAccess, pos: usize) -> usize {
    let n = w.bit_size();
    if pos >= n {
        return 0;
    }
    let mut len = crate::bits::one_seq_len_in_word(w.word(pos / 64), pos % 64);
    if len == 64 - pos % 64 {
        // run continues into the next words
        let mut i = pos / 64 + 1;
        while (i * 64) < n && w.word(i) == u64::MAX {
            len += 64;
            i += 1;
        }
        if i * 64 < n {
            len += (!w.word(i)).trailing_zeros() as usize;
        }
    }
    len.min(n - pos)
}

pub(crate) fn zero_seq_len_at(w: &impl WordAccess, pos: usize) -> usize {
    let n = w.bit_size();
    if pos >= n {
        return 0;
    }
    let inv = Inverted(w);
    one_seq_len_at(&inv, pos)
}

pub(crate) fn one_seq_revlen_at(w: &impl WordAccess, pos: usize) -> usize {
    debug_assert!(pos <= w.bit_size());
    let mut len = 0usize;
    let mut bit = pos;
    while bit > 0 {
        let word_idx = (bit - 1) / 64;
        let hi = (bit - 1) % 64 + 1; // bits [0, hi) of this word precede `bit`
        let masked = if hi == 64 {
            w.word(word_idx)
        } else {
            w.word(word_idx) & ((1u64 << hi) - 1)
        };
        let flipped = !masked & (if hi == 64 { u64::MAX } else { (1u64 << hi) - 1 });
        if flipped == 0 {
            len += hi;
            bit -= hi;
        } else {
            len += hi - 1 - crate::bits::bsr(flipped);
            break;
        }
    }
    len
}

pub(crate) fn zero_seq_revlen_at(w: &impl WordAccess, pos: usize) -> usize {
    one_seq_revlen_at(&Inverted(w), pos)
}

struct Inverted<'a, W: WordAccess>(&'a W);

impl<W: WordAccess> WordAccess for Inverted<'_, W> {
    fn bit_size(&self) -> usize {
        self.0.bit_size()
    }
    fn word(&self, i: usize) -> u64 {
        !self.0.word(i)
    }
}
