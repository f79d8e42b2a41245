//! Interleaved-layout rank/select.
//!
//! Each 256-bit line is a 40-byte record:
//!
//! ```text
//! offset 0: rank_base  u32  : rank1 at the line start
//! offset 4: rela       [u8;4]: popcount of the line's words before word j
//! offset 8: bits       [u64;4]
//! ```
//!
//! A rank query touches exactly one line record, so the common case is a
//! single cache-line miss. Select uses the same sampled line index as the
//! separated layout.

use crate::bits::{popcount_trail, select_in_word};
use crate::error::{Error, Result};
use crate::region::ByteRegion;

use super::raw::{ByteStore, U32Store};
use super::{BitVec, RankSelectIndex, RankSelectOps, WordAccess};

const LINE_BITS: usize = 256;
const LINE_BYTES: usize = 40;
const SEL_SAMPLE: usize = 512;

pub struct RankSelectIl256 {
    lines: ByteStore,
    size: usize,
    max_rank1: usize,
    sel0_cache: Option<U32Store>,
    sel1_cache: Option<U32Store>,
}

impl RankSelectIl256 {
    /// Freeze a bit array into the interleaved layout (rank cache is
    /// inherent to the layout; select caches are built on demand).
    pub fn new(bits: BitVec) -> Self {
        let (words, size) = bits.into_words();
        let nlines = size.div_ceil(LINE_BITS);
        let mut lines = Vec::with_capacity(nlines * LINE_BYTES);
        let mut rank = 0u64;
        for line in 0..nlines {
            lines.extend_from_slice(&(rank as u32).to_le_bytes());
            let mut rela = [0u8; 4];
            let mut acc = 0u32;
            for j in 0..4 {
                rela[j] = acc as u8;
                let w = words.get(line * 4 + j).copied().unwrap_or(0);
                acc += w.count_ones();
            }
            lines.extend_from_slice(&rela);
            for j in 0..4 {
                let w = words.get(line * 4 + j).copied().unwrap_or(0);
                lines.extend_from_slice(&w.to_le_bytes());
            }
            rank += acc as u64;
        }
        RankSelectIl256 {
            lines: ByteStore::Owned(lines),
            size,
            max_rank1: rank as usize,
            sel0_cache: None,
            sel1_cache: None,
        }
    }

    fn num_lines(&self) -> usize {
        self.size.div_ceil(LINE_BITS)
    }

    #[inline]
    fn line_rank1(&self, line: usize) -> usize {
        if line >= self.num_lines() {
            self.max_rank1
        } else {
            self.lines.read_u32(line * LINE_BYTES) as usize
        }
    }

    #[inline]
    fn line_word(&self, line: usize, j: usize) -> u64 {
        self.lines.read_u64(line * LINE_BYTES + 8 + j * 8)
    }

    #[inline]
    fn line_rela(&self, line: usize, j: usize) -> usize {
        self.lines.read_u8(line * LINE_BYTES + 4 + j) as usize
    }

    /// Build requested select caches. The rank cache is part of the line
    /// records and always present. Idempotent.
    pub fn build_cache(&mut self, speed_select0: bool, speed_select1: bool) {
        if speed_select1 && self.sel1_cache.is_none() {
            self.sel1_cache = Some(U32Store::Owned(self.build_sel_cache(true)));
        }
        if speed_select0 && self.sel0_cache.is_none() {
            self.sel0_cache = Some(U32Store::Owned(self.build_sel_cache(false)));
        }
    }

    fn rank_dim(&self, line: usize, ones: bool) -> usize {
        let r1 = self.line_rank1(line);
        if ones {
            r1
        } else {
            (line * LINE_BITS).min(self.size) - r1
        }
    }

    fn build_sel_cache(&self, ones: bool) -> Vec<u32> {
        let max_rank = if ones { self.max_rank1 } else { self.max_rank0() };
        let nlines = self.num_lines();
        let len = max_rank.div_ceil(SEL_SAMPLE) + 1;
        let mut cache = vec![nlines as u32; len];
        let mut line = 0usize;
        for (j, slot) in cache.iter_mut().enumerate().take(len - 1) {
            let target = j * SEL_SAMPLE;
            while line + 1 < nlines && self.rank_dim(line + 1, ones) <= target {
                line += 1;
            }
            *slot = line as u32;
        }
        cache
    }

    fn select_generic(&self, k: usize, ones: bool) -> usize {
        let max_rank = if ones { self.max_rank1 } else { self.max_rank0() };
        debug_assert!(k < max_rank, "select arg {k} >= max_rank {max_rank}");
        if k >= max_rank {
            return self.size;
        }
        let nlines = self.num_lines();
        let sel = if ones { &self.sel1_cache } else { &self.sel0_cache };
        let (mut lo, mut hi) = match sel {
            Some(cache) => {
                let j = k / SEL_SAMPLE;
                (
                    cache.get(j) as usize,
                    (cache.get(j + 1) as usize + 1).min(nlines),
                )
            }
            None => (0, nlines),
        };
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.rank_dim(mid, ones) <= k {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let mut rem = k - self.rank_dim(lo, ones);
        for j in 0..4 {
            let w = if ones {
                self.line_word(lo, j)
            } else {
                !self.line_word(lo, j)
            };
            let cnt = w.count_ones() as usize;
            if rem < cnt {
                return lo * LINE_BITS + j * 64 + select_in_word(w, rem);
            }
            rem -= cnt;
        }
        debug_assert!(false, "select fell off line {lo}");
        self.size
    }
}

impl WordAccess for RankSelectIl256 {
    fn bit_size(&self) -> usize {
        self.size
    }
    fn word(&self, i: usize) -> u64 {
        self.line_word(i / 4, i % 4)
    }
}

impl RankSelectOps for RankSelectIl256 {
    fn size(&self) -> usize {
        self.size
    }

    fn rank1(&self, pos: usize) -> usize {
        debug_assert!(pos <= self.size);
        if pos == self.size {
            return self.max_rank1;
        }
        let line = pos / LINE_BITS;
        let j = (pos % LINE_BITS) / 64;
        let mut rank = self.line_rank1(line) + self.line_rela(line, j);
        if pos % 64 != 0 {
            rank += popcount_trail(self.line_word(line, j), pos % 64);
        }
        rank
    }

    fn select1(&self, k: usize) -> usize {
        self.select_generic(k, true)
    }

    fn select0(&self, k: usize) -> usize {
        self.select_generic(k, false)
    }

    fn is1(&self, pos: usize) -> bool {
        debug_assert!(pos < self.size);
        let line = pos / LINE_BITS;
        let j = (pos % LINE_BITS) / 64;
        self.line_word(line, j) & (1u64 << (pos % 64)) != 0
    }

    fn max_rank1(&self) -> usize {
        self.max_rank1
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
        self.lines.len()
            + self.sel0_cache.as_ref().map_or(0, |c| c.byte_size())
            + self.sel1_cache.as_ref().map_or(0, |c| c.byte_size())
    }
}

// Serialized image:
//   u64 size | u64 max_rank1 | u8 has_sel0 | u8 has_sel1 | 6 pad
//   lines        num_lines * 40 bytes
//   [sel0_cache] [sel1_cache] as in the separated layout
impl RankSelectIndex for RankSelectIl256 {
    fn from_bitvec(bits: BitVec) -> Self {
        let mut rs = RankSelectIl256::new(bits);
        rs.build_cache(true, true);
        rs
    }

    fn save(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.size as u64).to_le_bytes());
        out.extend_from_slice(&(self.max_rank1 as u64).to_le_bytes());
        out.push(self.sel0_cache.is_some() as u8);
        out.push(self.sel1_cache.is_some() as u8);
        out.extend_from_slice(&[0u8; 6]);
        self.lines.save(out);
        if let Some(c) = &self.sel0_cache {
            c.save_padded(out);
        }
        if let Some(c) = &self.sel1_cache {
            c.save_padded(out);
        }
    }

    fn load(region: ByteRegion) -> Result<Self> {
        if region.len() < 24 {
            return Err(Error::corrupt("rank_select_il image too small"));
        }
        let size = region.read_u64(0) as usize;
        let max_rank1 = region.read_u64(8) as usize;
        if max_rank1 > size {
            return Err(Error::corrupt("rank_select_il: max_rank1 > size"));
        }
        let has_sel0 = region.as_slice()[16] != 0;
        let has_sel1 = region.as_slice()[17] != 0;
        let nlines = size.div_ceil(LINE_BITS);
        let mut pos = 24usize;
        let lines = region.slice(pos, nlines * LINE_BYTES);
        pos += nlines * LINE_BYTES;
        let max_rank0 = size - max_rank1;
        let mut take_sel = |present: bool, max_rank: usize| -> Option<ByteRegion> {
            if !present {
                return None;
            }
            let n = max_rank.div_ceil(SEL_SAMPLE) + 1;
            let bytes = U32Store::padded_size(n);
            let r = region.slice(pos, bytes);
            pos += bytes;
            Some(r)
        };
        let sel0 = take_sel(has_sel0, max_rank0);
        let sel1 = take_sel(has_sel1, max_rank1);
        Ok(RankSelectIl256 {
            lines: ByteStore::Region(lines),
            size,
            max_rank1,
            sel0_cache: sel0.map(U32Store::Region),
            sel1_cache: sel1.map(U32Store::Region),
        })
    }
}
