//! Two bitvectors sharing one interleaved line.
//!
//! Containers often carry a pair of equally-sized routing vectors that are
//! queried together (topology bit + attribute bit for the same node).
//! Packing both into one 80-byte line record halves the cache metadata
//! and keeps the pair on the same cache lines:
//!
//! ```text
//! offset  0: base  [u32;2]  : rank1 at line start, per dimension
//! offset  8: rela  [[u8;4];2]: in-line word popcount prefixes
//! offset 16: bits  [u64;4] dim0 | [u64;4] dim1
//! ```
//!
//! Queries go through [`MixedDim`], a borrowed view implementing the full
//! [`RankSelectOps`] surface for one dimension.

use crate::bits::{popcount_trail, select_in_word};
use crate::error::{Error, Result};
use crate::region::ByteRegion;

use super::raw::{ByteStore, U32Store};
use super::{BitVec, RankSelectOps, WordAccess};

const LINE_BITS: usize = 256;
const LINE_BYTES: usize = 80;
const SEL_SAMPLE: usize = 512;

pub struct RankSelectMixedIl256 {
    lines: ByteStore,
    size: [usize; 2],
    max_rank1: [usize; 2],
    sel1_cache: [Option<U32Store>; 2],
    sel0_cache: [Option<U32Store>; 2],
}

impl RankSelectMixedIl256 {
    /// Freeze two bit arrays into the shared layout and build all select
    /// caches. The arrays may have different lengths.
    pub fn from_bitvecs(dim0: BitVec, dim1: BitVec) -> Self {
        let (w0, n0) = dim0.into_words();
        let (w1, n1) = dim1.into_words();
        let nlines = n0.max(n1).div_ceil(LINE_BITS);
        let mut lines = Vec::with_capacity(nlines * LINE_BYTES);
        let mut rank = [0u64; 2];
        for line in 0..nlines {
            for d in 0..2 {
                lines.extend_from_slice(&(rank[d] as u32).to_le_bytes());
            }
            for (d, words) in [&w0, &w1].iter().enumerate() {
                let mut acc = 0u32;
                for j in 0..4 {
                    lines.push(acc as u8);
                    acc += words.get(line * 4 + j).copied().unwrap_or(0).count_ones();
                }
                rank[d] += acc as u64;
            }
            for words in [&w0, &w1] {
                for j in 0..4 {
                    let w = words.get(line * 4 + j).copied().unwrap_or(0);
                    lines.extend_from_slice(&w.to_le_bytes());
                }
            }
        }
        let mut rs = RankSelectMixedIl256 {
            lines: ByteStore::Owned(lines),
            size: [n0, n1],
            max_rank1: [rank[0] as usize, rank[1] as usize],
            sel1_cache: [None, None],
            sel0_cache: [None, None],
        };
        for d in 0..2 {
            rs.sel1_cache[d] = Some(U32Store::Owned(rs.build_sel_cache(d, true)));
            rs.sel0_cache[d] = Some(U32Store::Owned(rs.build_sel_cache(d, false)));
        }
        rs
    }

    /// Borrowed single-dimension view. `dim` is 0 or 1.
    pub fn dim(&self, dim: usize) -> MixedDim<'_> {
        assert!(dim < 2);
        MixedDim { rs: self, dim }
    }

    fn num_lines(&self) -> usize {
        self.lines.len() / LINE_BYTES
    }

    #[inline]
    fn line_rank1(&self, dim: usize, line: usize) -> usize {
        if line >= self.num_lines() {
            self.max_rank1[dim]
        } else {
            self.lines.read_u32(line * LINE_BYTES + dim * 4) as usize
        }
    }

    #[inline]
    fn line_rela(&self, dim: usize, line: usize, j: usize) -> usize {
        self.lines.read_u8(line * LINE_BYTES + 8 + dim * 4 + j) as usize
    }

    #[inline]
    fn line_word(&self, dim: usize, line: usize, j: usize) -> u64 {
        self.lines.read_u64(line * LINE_BYTES + 16 + dim * 32 + j * 8)
    }

    fn rank_dim(&self, dim: usize, line: usize, ones: bool) -> usize {
        let r1 = self.line_rank1(dim, line);
        if ones {
            r1
        } else {
            (line * LINE_BITS).min(self.size[dim]) - r1
        }
    }

    fn build_sel_cache(&self, dim: usize, ones: bool) -> Vec<u32> {
        let max_rank = if ones {
            self.max_rank1[dim]
        } else {
            self.size[dim] - self.max_rank1[dim]
        };
        let nlines = self.num_lines();
        let len = max_rank.div_ceil(SEL_SAMPLE) + 1;
        let mut cache = vec![nlines as u32; len];
        let mut line = 0usize;
        for (j, slot) in cache.iter_mut().enumerate().take(len - 1) {
            let target = j * SEL_SAMPLE;
            while line + 1 < nlines && self.rank_dim(dim, line + 1, ones) <= target {
                line += 1;
            }
            *slot = line as u32;
        }
        cache
    }

    fn select_generic(&self, dim: usize, k: usize, ones: bool) -> usize {
        let max_rank = if ones {
            self.max_rank1[dim]
        } else {
            self.size[dim] - self.max_rank1[dim]
        };
        debug_assert!(k < max_rank);
        if k >= max_rank {
            return self.size[dim];
        }
        let nlines = self.num_lines();
        let cache = if ones {
            &self.sel1_cache[dim]
        } else {
            &self.sel0_cache[dim]
        };
        let (mut lo, mut hi) = match cache {
            Some(c) => {
                let j = k / SEL_SAMPLE;
                (c.get(j) as usize, (c.get(j + 1) as usize + 1).min(nlines))
            }
            None => (0, nlines),
        };
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.rank_dim(dim, mid, ones) <= k {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let mut rem = k - self.rank_dim(dim, lo, ones);
        for j in 0..4 {
            let w = if ones {
                self.line_word(dim, lo, j)
            } else {
                !self.line_word(dim, lo, j)
            };
            let cnt = w.count_ones() as usize;
            if rem < cnt {
                return lo * LINE_BITS + j * 64 + select_in_word(w, rem);
            }
            rem -= cnt;
        }
        self.size[dim]
    }

    /// Serialized image: header, lines, then per-dim select caches.
    pub fn save(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.size[0] as u64).to_le_bytes());
        out.extend_from_slice(&(self.size[1] as u64).to_le_bytes());
        out.extend_from_slice(&(self.max_rank1[0] as u64).to_le_bytes());
        out.extend_from_slice(&(self.max_rank1[1] as u64).to_le_bytes());
        self.lines.save(out);
        for d in 0..2 {
            self.sel0_cache[d].as_ref().unwrap().save_padded(out);
            self.sel1_cache[d].as_ref().unwrap().save_padded(out);
        }
    }

    pub fn load(region: ByteRegion) -> Result<Self> {
        if region.len() < 32 {
            return Err(Error::corrupt("rank_select_mixed image too small"));
        }
        let size = [region.read_u64(0) as usize, region.read_u64(8) as usize];
        let max_rank1 = [region.read_u64(16) as usize, region.read_u64(24) as usize];
        if max_rank1[0] > size[0] || max_rank1[1] > size[1] {
            return Err(Error::corrupt("rank_select_mixed: max_rank1 > size"));
        }
        let nlines = size[0].max(size[1]).div_ceil(LINE_BITS);
        let mut pos = 32usize;
        let lines = region.slice(pos, nlines * LINE_BYTES);
        pos += nlines * LINE_BYTES;
        let mut sel0_cache = [None, None];
        let mut sel1_cache = [None, None];
        for d in 0..2 {
            let n0 = (size[d] - max_rank1[d]).div_ceil(SEL_SAMPLE) + 1;
            let b0 = U32Store::padded_size(n0);
            sel0_cache[d] = Some(U32Store::Region(region.slice(pos, b0)));
            pos += b0;
            let n1 = max_rank1[d].div_ceil(SEL_SAMPLE) + 1;
            let b1 = U32Store::padded_size(n1);
            sel1_cache[d] = Some(U32Store::Region(region.slice(pos, b1)));
            pos += b1;
        }
        Ok(RankSelectMixedIl256 {
            lines: ByteStore::Region(lines),
            size,
            max_rank1,
            sel1_cache,
            sel0_cache,
        })
    }

    pub fn mem_size(&self) -> usize {
        self.lines.len()
            + self
                .sel0_cache
                .iter()
                .chain(self.sel1_cache.iter())
                .filter_map(|c| c.as_ref().map(|c| c.byte_size()))
                .sum::<usize>()
    }
}

/// One dimension of a [`RankSelectMixedIl256`].
#[derive(Clone, Copy)]
pub struct MixedDim<'a> {
    rs: &'a RankSelectMixedIl256,
    dim: usize,
}

impl WordAccess for MixedDim<'_> {
    fn bit_size(&self) -> usize {
        self.rs.size[self.dim]
    }
    fn word(&self, i: usize) -> u64 {
        self.rs.line_word(self.dim, i / 4, i % 4)
    }
}

impl RankSelectOps for MixedDim<'_> {
    fn size(&self) -> usize {
        self.rs.size[self.dim]
    }

    fn rank1(&self, pos: usize) -> usize {
        debug_assert!(pos <= self.size());
        if pos == self.size() {
            return self.rs.max_rank1[self.dim];
        }
        let line = pos / LINE_BITS;
        let j = (pos % LINE_BITS) / 64;
        let mut rank = self.rs.line_rank1(self.dim, line) + self.rs.line_rela(self.dim, line, j);
        if pos % 64 != 0 {
            rank += popcount_trail(self.rs.line_word(self.dim, line, j), pos % 64);
        }
        rank
    }

    fn select1(&self, k: usize) -> usize {
        self.rs.select_generic(self.dim, k, true)
    }

    fn select0(&self, k: usize) -> usize {
        self.rs.select_generic(self.dim, k, false)
    }

    fn is1(&self, pos: usize) -> bool {
        debug_assert!(pos < self.size());
        let line = pos / LINE_BITS;
        let j = (pos % LINE_BITS) / 64;
        self.rs.line_word(self.dim, line, j) & (1u64 << (pos % 64)) != 0
    }

    fn max_rank1(&self) -> usize {
        self.rs.max_rank1[self.dim]
    }

    fn one_seq_len(&self, pos: usize) -> usize {
        super::one_seq_len_at(self, pos)
    }
    fn zero_seq_len(&self, pos: usize) -> usize {
        super::zero_seq_len_at(self, pos)
    }
    fn one_seq_revlen(&self, pos: usize) -> usize {
        super::one_seq_revlen_at(self, pos)
    }
    fn zero_seq_revlen(&self, pos: usize) -> usize {
        super::zero_seq_revlen_at(self, pos)
    }

    fn mem_size(&self) -> usize {
        self.rs.mem_size() / 2
    }
}
