//! Separated-layout rank/select.
//!
//! Bits, rank cache, and select samples live in distinct arrays. The rank
//! cache holds the cumulative popcount at every line boundary (a line is
//! `LINE_BITS` bits, 256 or 512); select caches sample every 512th set
//! (or clear) bit down to a line index, turning `select` into a short
//! binary search plus an in-line word scan.

use crate::bits::{popcount_trail, select_in_word};
use crate::error::{Error, Result};
use crate::region::ByteRegion;

use super::raw::{U32Store, WordStore};
use super::{BitVec, RankSelectIndex, RankSelectOps, WordAccess};

/// Every `SEL_SAMPLE`-th set bit gets a select-cache entry.
const SEL_SAMPLE: usize = 512;

/// 256-bit lines, u32 rank entries.
pub type RankSelectSe256 = RankSelectSe<256>;
/// 512-bit lines; denser cache, one extra word scan on average.
pub type RankSelectSe512 = RankSelectSe<512>;

pub struct RankSelectSe<const LINE_BITS: usize> {
    bits: WordStore,
    size: usize,
    max_rank1: usize,
    rank_cache: Option<U32Store>,
    sel0_cache: Option<U32Store>,
    sel1_cache: Option<U32Store>,
}

impl<const LINE_BITS: usize> RankSelectSe<LINE_BITS> {
    const WORDS_PER_LINE: usize = LINE_BITS / 64;

    /// Wrap a frozen bit array. No queries are valid until
    /// [`build_cache`](Self::build_cache) has run.
    pub fn new(bits: BitVec) -> Self {
        let (words, size) = bits.into_words();
        let max_rank1 = words.iter().map(|w| w.count_ones() as usize).sum();
        RankSelectSe {
            bits: WordStore::Owned(words),
            size,
            max_rank1,
            rank_cache: None,
            sel0_cache: None,
            sel1_cache: None,
        }
    }

    fn num_lines(&self) -> usize {
        self.size.div_ceil(LINE_BITS)
    }

    /// Build the rank cache and the requested select caches. Idempotent.
    pub fn build_cache(&mut self, speed_select0: bool, speed_select1: bool) {
        if self.rank_cache.is_none() {
            let nlines = self.num_lines();
            let mut cache = Vec::with_capacity(nlines + 1);
            let mut rank = 0u64;
            for line in 0..nlines {
                cache.push(rank as u32);
                for w in 0..Self::WORDS_PER_LINE {
                    let idx = line * Self::WORDS_PER_LINE + w;
                    if idx < self.bits.len() {
                        rank += self.bits.get(idx).count_ones() as u64;
                    }
                }
            }
            cache.push(rank as u32);
            debug_assert_eq!(rank as usize, self.max_rank1);
            self.rank_cache = Some(U32Store::Owned(cache));
        }
        if speed_select1 && self.sel1_cache.is_none() {
            self.sel1_cache = Some(U32Store::Owned(self.build_sel_cache(true)));
        }
        if speed_select0 && self.sel0_cache.is_none() {
            self.sel0_cache = Some(U32Store::Owned(self.build_sel_cache(false)));
        }
    }

    // cache[j] = line containing the (j * SEL_SAMPLE)-th target bit;
    // trailing sentinel = num_lines.
    fn build_sel_cache(&self, ones: bool) -> Vec<u32> {
        let max_rank = if ones { self.max_rank1 } else { self.max_rank0() };
        let nlines = self.num_lines();
        let len = max_rank.div_ceil(SEL_SAMPLE) + 1;
        let mut cache = vec![nlines as u32; len];
        let rank_at = |line: usize| -> usize {
            let r1 = self.rank_cache.as_ref().unwrap().get(line) as usize;
            if ones {
                r1
            } else {
                line * LINE_BITS - r1
            }
        };
        let mut line = 0usize;
        for (j, slot) in cache.iter_mut().enumerate().take(len - 1) {
            let target = j * SEL_SAMPLE;
            while line + 1 < nlines && rank_at(line + 1) <= target {
                line += 1;
            }
            *slot = line as u32;
        }
        cache
    }

    #[inline]
    fn assert_cached(&self) {
        debug_assert!(self.rank_cache.is_some(), "build_cache not called");
    }

    fn select_generic(&self, k: usize, ones: bool) -> usize {
        self.assert_cached();
        let max_rank = if ones { self.max_rank1 } else { self.max_rank0() };
        debug_assert!(k < max_rank, "select arg {k} >= max_rank {max_rank}");
        if k >= max_rank {
            return self.size;
        }
        let rank_cache = self.rank_cache.as_ref().unwrap();
        let nlines = self.num_lines();
        let rank_at = |line: usize| -> usize {
            let r1 = rank_cache.get(line) as usize;
            if ones {
                r1
            } else {
                line * LINE_BITS - r1
            }
        };
        let sel = if ones { &self.sel1_cache } else { &self.sel0_cache };
        let (mut lo, mut hi) = match sel {
            Some(cache) => {
                let j = k / SEL_SAMPLE;
                let lo = cache.get(j) as usize;
                let hi = (cache.get(j + 1) as usize + 1).min(nlines);
                (lo, hi)
            }
            None => (0, nlines),
        };
        // last line with rank_at(line) <= k
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if rank_at(mid) <= k {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let mut rem = k - rank_at(lo);
        let word_lo = lo * Self::WORDS_PER_LINE;
        for wi in word_lo..self.bits.len() {
            let w = if ones { self.bits.get(wi) } else { !self.bits.get(wi) };
            let cnt = w.count_ones() as usize;
            if rem < cnt {
                return wi * 64 + select_in_word(w, rem);
            }
            rem -= cnt;
        }
        self.size
    }
}

impl<const LINE_BITS: usize> WordAccess for RankSelectSe<LINE_BITS> {
    fn bit_size(&self) -> usize {
        self.size
    }
    fn word(&self, i: usize) -> u64 {
        self.bits.get(i)
    }
}

impl<const LINE_BITS: usize> RankSelectOps for RankSelectSe<LINE_BITS> {
    fn size(&self) -> usize {
        self.size
    }

    fn rank1(&self, pos: usize) -> usize {
        self.assert_cached();
        debug_assert!(pos <= self.size);
        let line = pos / LINE_BITS;
        let mut rank = self.rank_cache.as_ref().unwrap().get(line) as usize;
        let word_lo = line * Self::WORDS_PER_LINE;
        let word_hi = pos / 64;
        for wi in word_lo..word_hi {
            rank += self.bits.get(wi).count_ones() as usize;
        }
        if pos % 64 != 0 {
            rank += popcount_trail(self.bits.get(word_hi), pos % 64);
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
        self.bits.get(pos / 64) & (1u64 << (pos % 64)) != 0
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
        self.bits.byte_size()
            + self.rank_cache.as_ref().map_or(0, |c| c.byte_size())
            + self.sel0_cache.as_ref().map_or(0, |c| c.byte_size())
            + self.sel1_cache.as_ref().map_or(0, |c| c.byte_size())
    }
}

// Serialized image:
//   u64 size | u64 max_rank1 | u8 has_sel0 | u8 has_sel1 | 6 pad
//   words            size.div_ceil(64) * 8 bytes
//   rank_cache       (num_lines + 1) u32, padded to 8
//   [sel0_cache]     (max_rank0.div_ceil(512) + 1) u32, padded to 8
//   [sel1_cache]     (max_rank1.div_ceil(512) + 1) u32, padded to 8
impl<const LINE_BITS: usize> RankSelectIndex for RankSelectSe<LINE_BITS> {
    fn from_bitvec(bits: BitVec) -> Self {
        let mut rs = RankSelectSe::new(bits);
        rs.build_cache(true, true);
        rs
    }

    fn save(&self, out: &mut Vec<u8>) {
        assert!(self.rank_cache.is_some(), "save requires build_cache");
        out.extend_from_slice(&(self.size as u64).to_le_bytes());
        out.extend_from_slice(&(self.max_rank1 as u64).to_le_bytes());
        out.push(self.sel0_cache.is_some() as u8);
        out.push(self.sel1_cache.is_some() as u8);
        out.extend_from_slice(&[0u8; 6]);
        self.bits.save(out);
        self.rank_cache.as_ref().unwrap().save_padded(out);
        if let Some(c) = &self.sel0_cache {
            c.save_padded(out);
        }
        if let Some(c) = &self.sel1_cache {
            c.save_padded(out);
        }
    }

    fn load(region: ByteRegion) -> Result<Self> {
        if region.len() < 24 {
            return Err(Error::corrupt("rank_select_se image too small"));
        }
        let size = region.read_u64(0) as usize;
        let max_rank1 = region.read_u64(8) as usize;
        if max_rank1 > size {
            return Err(Error::corrupt("rank_select_se: max_rank1 > size"));
        }
        let has_sel0 = region.as_slice()[16] != 0;
        let has_sel1 = region.as_slice()[17] != 0;
        let nwords = size.div_ceil(64);
        let nlines = size.div_ceil(LINE_BITS);
        let mut pos = 24usize;
        let bits = region.slice(pos, nwords * 8);
        pos += nwords * 8;
        let rank_bytes = U32Store::padded_size(nlines + 1);
        let rank_cache = region.slice(pos, rank_bytes);
        pos += rank_bytes;
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
        Ok(RankSelectSe {
            bits: WordStore::Region(bits),
            size,
            max_rank1,
            rank_cache: Some(U32Store::Region(rank_cache)),
            sel0_cache: sel0.map(U32Store::Region),
            sel1_cache: sel1.map(U32Store::Region),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pattern: &[bool]) -> RankSelectSe256 {
        let mut bv = BitVec::new();
        for &b in pattern {
            bv.push(b);
        }
        RankSelectSe256::from_bitvec(bv)
    }

    #[test]
    fn known_pattern_1011001() {
        let rs = build(&[true, false, true, true, false, false, true]);
        let rank1: Vec<usize> = (0..=7).map(|i| rs.rank1(i)).collect();
        assert_eq!(rank1, [0, 1, 1, 2, 3, 3, 3, 4]);
        let rank0: Vec<usize> = (0..=7).map(|i| rs.rank0(i)).collect();
        assert_eq!(rank0, [0, 0, 1, 1, 1, 2, 3, 3]);
        let sel1: Vec<usize> = (0..4).map(|k| rs.select1(k)).collect();
        assert_eq!(sel1, [0, 2, 3, 6]);
        let sel0: Vec<usize> = (0..3).map(|k| rs.select0(k)).collect();
        assert_eq!(sel0, [1, 4, 5]);
        assert_eq!(rs.max_rank1(), 4);
        assert_eq!(rs.max_rank0(), 3);
    }

    #[test]
    fn rank_select_identities_random() {
        // deterministic pseudo-random pattern spanning several lines
        let n = 5000;
        let mut bv = BitVec::new();
        let mut x = 0x9E3779B97F4A7C15u64;
        for _ in 0..n {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            bv.push(x & 3 == 0);
        }
        let rs = RankSelectSe256::from_bitvec(bv);
        assert_eq!(rs.rank1(n) + rs.rank0(n), n);
        for i in (0..=n).step_by(37) {
            assert_eq!(rs.rank1(i) + rs.rank0(i), i, "identity at {i}");
        }
        for k in 0..rs.max_rank1() {
            let p = rs.select1(k);
            assert!(rs.is1(p), "select1({k}) = {p} not set");
            assert_eq!(rs.rank1(p), k);
        }
        for k in (0..rs.max_rank0()).step_by(11) {
            let p = rs.select0(k);
            assert!(rs.is0(p));
            assert_eq!(rs.rank0(p), k);
        }
    }

    #[test]
    fn seq_len_queries() {
        let rs = build(&[true, true, true, false, false, true, true, false]);
        assert_eq!(rs.one_seq_len(0), 3);
        assert_eq!(rs.one_seq_len(1), 2);
        assert_eq!(rs.one_seq_len(3), 0);
        assert_eq!(rs.zero_seq_len(3), 2);
        assert_eq!(rs.one_seq_revlen(3), 3);
        assert_eq!(rs.zero_seq_revlen(5), 2);
        assert_eq!(rs.one_seq_revlen(7), 2);
    }

    #[test]
    fn save_load_roundtrip() {
        let n = 3000;
        let mut bv = BitVec::new();
        for i in 0..n {
            bv.push(i % 7 == 0 || i % 11 == 3);
        }
        let rs = RankSelectSe256::from_bitvec(bv);
        let mut img = Vec::new();
        rs.save(&mut img);
        assert_eq!(img.len() % 8, 0);
        let loaded = RankSelectSe256::load(ByteRegion::from_vec(img)).unwrap();
        assert_eq!(loaded.size(), rs.size());
        assert_eq!(loaded.max_rank1(), rs.max_rank1());
        for i in (0..=n).step_by(13) {
            assert_eq!(loaded.rank1(i), rs.rank1(i));
        }
        for k in (0..rs.max_rank1()).step_by(17) {
            assert_eq!(loaded.select1(k), rs.select1(k));
        }
    }

    #[test]
    fn se512_matches_se256() {
        let n = 2048;
        let mut bv256 = BitVec::new();
        let mut bv512 = BitVec::new();
        for i in 0..n {
            let bit = (i * i) % 5 == 1;
            bv256.push(bit);
            bv512.push(bit);
        }
        let a = RankSelectSe256::from_bitvec(bv256);
        let b = RankSelectSe512::from_bitvec(bv512);
        for i in (0..=n).step_by(19) {
            assert_eq!(a.rank1(i), b.rank1(i));
        }
        for k in 0..a.max_rank1() {
            assert_eq!(a.select1(k), b.select1(k));
        }
    }
}
