//! Rare-bit rank/select.
//!
//! When one bit value is rare (under a few percent), storing the dense
//! payload plus caches wastes space: the positions of the rare bits are
//! the whole story. `RankSelectFew<PIVOT, W>` stores them as a strictly
//! increasing array of `W`-byte integers, topped by a hierarchy with
//! fan-out 256 where each upper level holds the minimum of the 256-entry
//! block below it: `lower_bound` walks the ladder top-down.
//!
//! `PIVOT` names the rare bit: `RankSelectFewOne` stores set-bit
//! positions, `RankSelectFewZero` stores clear-bit positions. Ranks of
//! the common bit are derived by subtraction.
//!
//! The hint-cursor variants (`rank1_hint` and friends) let sequential
//! scans skip the search entirely when consecutive queries land in the
//! same neighborhood.

use crate::error::{Error, Result};
use crate::region::ByteRegion;

use super::raw::ByteStore;
use super::{BitVec, RankSelectIndex, RankSelectOps};

const FANOUT: usize = 256;

/// Rare clear bits, `W`-byte positions.
pub type RankSelectFewZero<const W: usize> = RankSelectFew<0, W>;
/// Rare set bits, `W`-byte positions.
pub type RankSelectFewOne<const W: usize> = RankSelectFew<1, W>;

/// Image layout (`W`-byte entries, all integers little-endian):
///
/// ```text
/// level0: num_rare entries (strictly increasing rare-bit positions)
/// level1: num_rare.div_ceil(256) block minima, repeated while > 256
/// ...
/// footer: u64 num0 | u64 num1 | u64 layer_off[n_layers] | u64 n_layers
/// ```
pub struct RankSelectFew<const PIVOT: u8, const W: usize> {
    pool: ByteStore,
    num0: u64,
    num1: u64,
    /// byte offset of each level in `pool`; `[0]` is level 0
    layer_off: Vec<u64>,
    /// entry count of each level
    layer_len: Vec<usize>,
}

impl<const PIVOT: u8, const W: usize> RankSelectFew<PIVOT, W> {
    fn num_rare(&self) -> usize {
        if PIVOT == 1 {
            self.num1 as usize
        } else {
            self.num0 as usize
        }
    }

    #[inline]
    fn val_at(&self, level: usize, idx: usize) -> usize {
        let off = self.layer_off[level] as usize + idx * W;
        let mask = if W >= 8 { u64::MAX } else { (1u64 << (W * 8)) - 1 };
        (self.pool.read_u64(off) & mask) as usize
    }

    /// First index in level 0 whose position is >= `val`.
    ///
    /// Walks the minima ladder top-down; each level narrows the search to
    /// one 256-entry block of the level below.
    fn lower_bound(&self, val: usize) -> usize {
        let n_layers = self.layer_off.len();
        let mut lo = 0usize;
        let mut hi = self.layer_len[n_layers - 1];
        for level in (0..n_layers).rev() {
            let mut l = lo;
            let mut h = hi;
            while l < h {
                let m = (l + h) / 2;
                if self.val_at(level, m) < val {
                    l = m + 1;
                } else {
                    h = m;
                }
            }
            if level == 0 {
                return l;
            }
            // the first entry >= val is in block l-1, or is block l's min
            let parent = l.saturating_sub(1);
            lo = parent * FANOUT;
            hi = ((parent + 1) * FANOUT).min(self.layer_len[level - 1]);
        }
        unreachable!()
    }

    /// `lower_bound` with a monotonic cursor for sequential access.
    fn lower_bound_hint(&self, val: usize, hint: &mut usize) -> usize {
        let n = self.num_rare();
        let h = *hint;
        if h <= n
            && (h == 0 || self.val_at(0, h - 1) < val)
            && (h == n || self.val_at(0, h) >= val)
        {
            return h;
        }
        // one step forward is the common sequential case
        if h < n && self.val_at(0, h) < val && (h + 1 == n || self.val_at(0, h + 1) >= val) {
            *hint = h + 1;
            return h + 1;
        }
        let r = self.lower_bound(val);
        *hint = r;
        r
    }

    fn rank_rare(&self, pos: usize) -> usize {
        self.lower_bound(pos)
    }

    fn is_rare(&self, pos: usize) -> bool {
        let i = self.lower_bound(pos);
        i < self.num_rare() && self.val_at(0, i) == pos
    }

    fn select_rare(&self, k: usize) -> usize {
        debug_assert!(k < self.num_rare());
        if k >= self.num_rare() {
            return self.size();
        }
        self.val_at(0, k)
    }

    /// Position of the `k`-th common bit: binary search the count of rare
    /// bits at or below the answer.
    fn select_common(&self, k: usize) -> usize {
        let n = self.num_rare();
        debug_assert!(k < self.size() - n);
        // smallest r with val(r) - r > k; answer is k + r
        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.val_at(0, mid) - mid <= k {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        k + lo
    }

    /// Run of rare bits starting at `pos` (consecutive stored positions).
    fn rare_seq_len(&self, pos: usize) -> usize {
        let i = self.lower_bound(pos);
        let n = self.num_rare();
        if i >= n || self.val_at(0, i) != pos {
            return 0;
        }
        let mut len = 1usize;
        while i + len < n && self.val_at(0, i + len) == pos + len {
            len += 1;
        }
        len
    }

    fn rare_seq_revlen(&self, pos: usize) -> usize {
        if pos == 0 {
            return 0;
        }
        let i = self.lower_bound(pos);
        let mut len = 0usize;
        while len < i && self.val_at(0, i - 1 - len) == pos - 1 - len {
            len += 1;
        }
        len
    }

    /// Run of common bits starting at `pos`: distance to the next rare bit.
    fn common_seq_len(&self, pos: usize) -> usize {
        if pos >= self.size() {
            return 0;
        }
        let i = self.lower_bound(pos);
        if i < self.num_rare() {
            let v = self.val_at(0, i);
            if v == pos {
                0
            } else {
                v - pos
            }
        } else {
            self.size() - pos
        }
    }

    fn common_seq_revlen(&self, pos: usize) -> usize {
        let i = self.lower_bound(pos);
        if i == 0 {
            pos
        } else {
            pos - 1 - self.val_at(0, i - 1)
        }
    }

    // ── hint-cursor query surface ───────────────────────────────────────

    /// `rank1` with a sequential-access cursor.
    pub fn rank1_hint(&self, pos: usize, hint: &mut usize) -> usize {
        let rare = self.lower_bound_hint(pos, hint);
        if PIVOT == 1 {
            rare
        } else {
            pos - rare
        }
    }

    /// `rank0` with a sequential-access cursor.
    pub fn rank0_hint(&self, pos: usize, hint: &mut usize) -> usize {
        pos - self.rank1_hint(pos, hint)
    }

    /// `is1` with a sequential-access cursor.
    pub fn is1_hint(&self, pos: usize, hint: &mut usize) -> bool {
        let i = self.lower_bound_hint(pos, hint);
        let hit = i < self.num_rare() && self.val_at(0, i) == pos;
        if PIVOT == 1 {
            hit
        } else {
            !hit
        }
    }
}

impl<const PIVOT: u8, const W: usize> RankSelectOps for RankSelectFew<PIVOT, W> {
    fn size(&self) -> usize {
        (self.num0 + self.num1) as usize
    }

    fn rank1(&self, pos: usize) -> usize {
        debug_assert!(pos <= self.size());
        let rare = self.rank_rare(pos);
        if PIVOT == 1 {
            rare
        } else {
            pos - rare
        }
    }

    fn select1(&self, k: usize) -> usize {
        if PIVOT == 1 {
            self.select_rare(k)
        } else {
            self.select_common(k)
        }
    }

    fn select0(&self, k: usize) -> usize {
        if PIVOT == 0 {
            self.select_rare(k)
        } else {
            self.select_common(k)
        }
    }

    fn is1(&self, pos: usize) -> bool {
        let hit = self.is_rare(pos);
        if PIVOT == 1 {
            hit
        } else {
            !hit
        }
    }

    fn max_rank1(&self) -> usize {
        self.num1 as usize
    }

    fn max_rank0(&self) -> usize {
        self.num0 as usize
    }

    fn one_seq_len(&self, pos: usize) -> usize {
        if PIVOT == 1 {
            self.rare_seq_len(pos)
        } else {
            self.common_seq_len(pos)
        }
    }

    fn zero_seq_len(&self, pos: usize) -> usize {
        if PIVOT == 0 {
            self.rare_seq_len(pos)
        } else {
            self.common_seq_len(pos)
        }
    }

    fn one_seq_revlen(&self, pos: usize) -> usize {
        if PIVOT == 1 {
            self.rare_seq_revlen(pos)
        } else {
            self.common_seq_revlen(pos)
        }
    }

    fn zero_seq_revlen(&self, pos: usize) -> usize {
        if PIVOT == 0 {
            self.rare_seq_revlen(pos)
        } else {
            self.common_seq_revlen(pos)
        }
    }

    fn mem_size(&self) -> usize {
        self.pool.len()
    }
}

/// Builder: insert rare-bit positions in strictly increasing order, then
/// `finish`.
pub struct RankSelectFewBuilder<const PIVOT: u8, const W: usize> {
    positions: Vec<u64>,
    num0: u64,
    num1: u64,
    last: Option<u64>,
}

impl<const PIVOT: u8, const W: usize> RankSelectFewBuilder<PIVOT, W> {
    /// `num0`/`num1` are the final totals of the represented bit array.
    pub fn new(num0: usize, num1: usize) -> Self {
        let rare = if PIVOT == 1 { num1 } else { num0 };
        RankSelectFewBuilder {
            positions: Vec::with_capacity(rare),
            num0: num0 as u64,
            num1: num1 as u64,
            last: None,
        }
    }

    /// Record the next rare-bit position. Must be strictly increasing.
    pub fn insert(&mut self, pos: usize) -> Result<()> {
        let pos = pos as u64;
        if let Some(last) = self.last {
            if pos <= last {
                return Err(Error::invalid(format!(
                    "rank_select_few positions must increase: {pos} after {last}"
                )));
            }
        }
        let limit = if W >= 8 { u64::MAX } else { (1u64 << (W * 8)) - 1 };
        if pos > limit {
            return Err(Error::LengthError {
                field: "rank_select_few position",
                value: pos,
                limit,
            });
        }
        self.last = Some(pos);
        self.positions.push(pos);
        Ok(())
    }

    pub fn finish(self) -> Result<RankSelectFew<PIVOT, W>> {
        let expect = if PIVOT == 1 { self.num1 } else { self.num0 };
        if self.positions.len() as u64 != expect {
            return Err(Error::invalid(format!(
                "rank_select_few: inserted {} positions, declared {expect}",
                self.positions.len()
            )));
        }
        let mut pool = Vec::new();
        let mut layer_off = Vec::new();
        let mut layer_len = Vec::new();
        let mut level: Vec<u64> = self.positions;
        loop {
            layer_off.push(pool.len() as u64);
            layer_len.push(level.len());
            for &v in &level {
                pool.extend_from_slice(&v.to_le_bytes()[..W]);
            }
            if level.len() <= FANOUT {
                break;
            }
            level = level.chunks(FANOUT).map(|c| c[0]).collect();
        }
        // pad so footer u64 reads (and W-byte tail reads) stay in-bounds
        while pool.len() % 8 != 0 {
            pool.push(0);
        }
        pool.extend_from_slice(&self.num0.to_le_bytes());
        pool.extend_from_slice(&self.num1.to_le_bytes());
        for off in &layer_off {
            pool.extend_from_slice(&off.to_le_bytes());
        }
        pool.extend_from_slice(&(layer_off.len() as u64).to_le_bytes());
        Ok(RankSelectFew {
            pool: ByteStore::Owned(pool),
            num0: self.num0,
            num1: self.num1,
            layer_off,
            layer_len,
        })
    }
}

impl<const PIVOT: u8, const W: usize> RankSelectIndex for RankSelectFew<PIVOT, W> {
    fn from_bitvec(bits: BitVec) -> Self {
        let ones = bits.count_ones();
        let n = bits.size();
        let mut b = RankSelectFewBuilder::<PIVOT, W>::new(n - ones, ones);
        for i in 0..n {
            if bits.get(i) == (PIVOT == 1) {
                b.insert(i).expect("bit positions are increasing");
            }
        }
        b.finish().expect("counts match by construction")
    }

    fn save(&self, out: &mut Vec<u8>) {
        self.pool.save(out);
    }

    fn load(region: ByteRegion) -> Result<Self> {
        let len = region.len();
        if len < 24 || len % 8 != 0 {
            return Err(Error::corrupt("rank_select_few image malformed"));
        }
        let n_layers = region.read_u64(len - 8) as usize;
        if n_layers == 0 || n_layers > 8 {
            return Err(Error::corrupt("rank_select_few: bad layer count"));
        }
        let footer = 8 + 8 * n_layers + 16;
        if len < footer {
            return Err(Error::corrupt("rank_select_few image too small"));
        }
        let num0 = region.read_u64(len - footer);
        let num1 = region.read_u64(len - footer + 8);
        let mut layer_off = Vec::with_capacity(n_layers);
        for i in 0..n_layers {
            layer_off.push(region.read_u64(len - footer + 16 + 8 * i));
        }
        let rare = (if PIVOT == 1 { num1 } else { num0 }) as usize;
        let mut layer_len = Vec::with_capacity(n_layers);
        let mut cnt = rare;
        for _ in 0..n_layers {
            layer_len.push(cnt);
            cnt = cnt.div_ceil(FANOUT);
        }
        Ok(RankSelectFew {
            pool: ByteStore::Region(region),
            num0,
            num1,
            layer_off,
            layer_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::RankSelectIl256;
    use super::*;

    fn sparse_bits(n: usize, stride: usize) -> BitVec {
        let mut bv = BitVec::with_size(n, false);
        let mut i = 3;
        while i < n {
            bv.set1(i);
            i += stride + i % 7;
        }
        bv
    }

    #[test]
    fn small_pattern_fewzero_matches_dense() {
        // 1011001: zeros are the rare bit here
        let mut bv = BitVec::new();
        for b in [true, false, true, true, false, false, true] {
            bv.push(b);
        }
        let few = RankSelectFewZero::<4>::from_bitvec(bv.clone());
        let dense = RankSelectIl256::from_bitvec(bv);
        for i in 0..=7 {
            assert_eq!(few.rank1(i), dense.rank1(i), "rank1({i})");
            assert_eq!(few.rank0(i), dense.rank0(i), "rank0({i})");
        }
        for k in 0..dense.max_rank1() {
            assert_eq!(few.select1(k), dense.select1(k), "select1({k})");
        }
        for k in 0..dense.max_rank0() {
            assert_eq!(few.select0(k), dense.select0(k), "select0({k})");
        }
        for i in 0..7 {
            assert_eq!(few.is1(i), dense.is1(i));
            assert_eq!(few.one_seq_len(i), dense.one_seq_len(i), "one_seq_len({i})");
            assert_eq!(few.zero_seq_len(i), dense.zero_seq_len(i));
            assert_eq!(few.one_seq_revlen(i), dense.one_seq_revlen(i));
            assert_eq!(few.zero_seq_revlen(i), dense.zero_seq_revlen(i));
        }
    }

    #[test]
    fn fewone_agrees_with_dense_large() {
        let n = 200_000;
        let bv = sparse_bits(n, 97);
        let few = RankSelectFewOne::<4>::from_bitvec(bv.clone());
        let dense = RankSelectIl256::from_bitvec(bv);
        assert_eq!(few.max_rank1(), dense.max_rank1());
        for i in (0..=n).step_by(997) {
            assert_eq!(few.rank1(i), dense.rank1(i), "rank1({i})");
        }
        for k in (0..few.max_rank1()).step_by(13) {
            assert_eq!(few.select1(k), dense.select1(k));
        }
        for k in (0..few.max_rank0()).step_by(9973) {
            assert_eq!(few.select0(k), dense.select0(k));
        }
    }

    #[test]
    fn hint_cursor_sequential_scan() {
        let n = 50_000;
        let bv = sparse_bits(n, 211);
        let few = RankSelectFewOne::<4>::from_bitvec(bv.clone());
        let mut hint = 0usize;
        for i in 0..n {
            assert_eq!(few.rank1_hint(i, &mut hint), few.rank1(i), "at {i}");
        }
        let mut hint = 0usize;
        for i in (0..n).step_by(3) {
            assert_eq!(few.is1_hint(i, &mut hint), bv.get(i));
        }
    }

    #[test]
    fn builder_rejects_disorder() {
        let mut b = RankSelectFewBuilder::<1, 4>::new(10, 2);
        b.insert(5).unwrap();
        assert!(b.insert(5).is_err());
        assert!(b.insert(3).is_err());
    }

    #[test]
    fn save_load_roundtrip() {
        let n = 70_000; // forces a second layer (> 256 rare bits)
        let bv = sparse_bits(n, 50);
        let few = RankSelectFewOne::<4>::from_bitvec(bv);
        assert!(few.max_rank1() > 256);
        let mut img = Vec::new();
        few.save(&mut img);
        let loaded = RankSelectFewOne::<4>::load(ByteRegion::from_vec(img)).unwrap();
        assert_eq!(loaded.size(), few.size());
        for k in (0..few.max_rank1()).step_by(7) {
            assert_eq!(loaded.select1(k), few.select1(k));
        }
        for i in (0..=n).step_by(591) {
            assert_eq!(loaded.rank1(i), few.rank1(i));
        }
    }
}
