//! Variable-length sorted string pools.
//!
//! `SortedStrVec` keeps record boundaries in a bit-packed offset array;
//! `ZoSortedStrVec` swaps that for a delta-compressed `SortedUintVec`,
//! which matters when the pool runs to hundreds of megabytes. Both are
//! immutable views built either from a builder or a serialized image.

use crate::error::{Error, Result};
use crate::int_vec::{SortedUintVec, SortedUintVecBuilder, UintVecMin0};
use crate::region::ByteRegion;

use super::StrVecOps;

enum Pool {
    Owned(Vec<u8>),
    Region(ByteRegion),
}

impl Pool {
    fn as_slice(&self) -> &[u8] {
        match self {
            Pool::Owned(v) => v,
            Pool::Region(r) => r.as_slice(),
        }
    }
}

/// Sorted pool with packed plain offsets (`size + 1` entries).
pub struct SortedStrVec {
    pool: Pool,
    offsets: UintVecMin0,
}

impl SortedStrVec {
    pub fn nth_offset(&self, i: usize) -> usize {
        self.offsets.get(i) as usize
    }

    pub fn nth_endpos(&self, i: usize) -> usize {
        self.offsets.get(i + 1) as usize
    }

    pub fn mem_size(&self) -> usize {
        self.pool.as_slice().len() + self.offsets.mem_size()
    }

    /// Image: `u64 offsets_bytes | offsets image | u64 pool_len | pool`
    /// (8-aligned).
    pub fn save(&self, out: &mut Vec<u8>) {
        let mut off_img = Vec::new();
        self.offsets.save(&mut off_img);
        out.extend_from_slice(&(off_img.len() as u64).to_le_bytes());
        out.extend_from_slice(&off_img);
        let pool = self.pool.as_slice();
        out.extend_from_slice(&(pool.len() as u64).to_le_bytes());
        out.extend_from_slice(pool);
        while out.len() % 8 != 0 {
            out.push(0);
        }
    }

    pub fn load(region: ByteRegion) -> Result<Self> {
        if region.len() < 16 {
            return Err(Error::corrupt("sorted_strvec image too small"));
        }
        let off_bytes = region.read_u64(0) as usize;
        if region.len() < 8 + off_bytes + 8 {
            return Err(Error::corrupt("sorted_strvec offsets truncated"));
        }
        let offsets = UintVecMin0::load(region.slice(8, off_bytes))?;
        let pool_len = region.read_u64(8 + off_bytes) as usize;
        if region.len() < 16 + off_bytes + pool_len {
            return Err(Error::corrupt("sorted_strvec pool truncated"));
        }
        if offsets.is_empty() {
            return Err(Error::corrupt("sorted_strvec: empty offset array"));
        }
        Ok(SortedStrVec {
            pool: Pool::Region(region.slice(16 + off_bytes, pool_len)),
            offsets,
        })
    }
}

impl StrVecOps for SortedStrVec {
    fn len(&self) -> usize {
        self.offsets.size() - 1
    }

    fn nth(&self, i: usize) -> &[u8] {
        debug_assert!(i < self.len());
        let [lo, hi] = self.offsets.get2(i);
        &self.pool.as_slice()[lo as usize..hi as usize]
    }

    fn total_size(&self) -> usize {
        self.offsets.get(self.offsets.size() - 1) as usize
    }
}

/// Builder for [`SortedStrVec`]; records must arrive in sorted order.
pub struct SortedStrVecBuilder {
    pool: Vec<u8>,
    offsets: Vec<u64>,
}

impl Default for SortedStrVecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SortedStrVecBuilder {
    pub fn new() -> Self {
        SortedStrVecBuilder {
            pool: Vec::new(),
            offsets: vec![0],
        }
    }

    pub fn push(&mut self, s: &[u8]) -> Result<()> {
        let prev_start = self.offsets[self.offsets.len() - 1] as usize;
        let prev = &self.pool[..];
        let prev_rec_start = if self.offsets.len() >= 2 {
            self.offsets[self.offsets.len() - 2] as usize
        } else {
            0
        };
        if self.offsets.len() >= 2 && s < &prev[prev_rec_start..prev_start] {
            return Err(Error::invalid("sorted_strvec records must be sorted"));
        }
        self.pool.extend_from_slice(s);
        self.offsets.push(self.pool.len() as u64);
        Ok(())
    }

    pub fn finish(self) -> SortedStrVec {
        SortedStrVec {
            pool: Pool::Owned(self.pool),
            offsets: UintVecMin0::build_from(&self.offsets),
        }
    }
}

/// Sorted pool with delta-compressed offsets.
pub struct ZoSortedStrVec {
    pool: Pool,
    offsets: SortedUintVec,
}

impl ZoSortedStrVec {
    /// Repack a [`SortedStrVec`]'s boundaries into `SortedUintVec` blocks.
    pub fn from_sorted(src: &SortedStrVec, block_units: usize) -> Result<Self> {
        let mut b = SortedUintVecBuilder::new(block_units)?;
        let n = src.len();
        for i in 0..=n {
            b.push(src.nth_offset_raw(i))?;
        }
        Ok(ZoSortedStrVec {
            pool: Pool::Owned(src.pool.as_slice().to_vec()),
            offsets: b.finish(),
        })
    }

    pub fn nth_offset(&self, i: usize) -> usize {
        self.offsets.get(i) as usize
    }

    pub fn nth_endpos(&self, i: usize) -> usize {
        self.offsets.get(i + 1) as usize
    }

    pub fn mem_size(&self) -> usize {
        self.pool.as_slice().len() + self.offsets.mem_size()
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        let mut off_img = Vec::new();
        self.offsets.save(&mut off_img);
        out.extend_from_slice(&(off_img.len() as u64).to_le_bytes());
        out.extend_from_slice(&off_img);
        let pool = self.pool.as_slice();
        out.extend_from_slice(&(pool.len() as u64).to_le_bytes());
        out.extend_from_slice(pool);
        while out.len() % 8 != 0 {
            out.push(0);
        }
    }

    pub fn load(region: ByteRegion) -> Result<Self> {
        if region.len() < 16 {
            return Err(Error::corrupt("zo_sorted_strvec image too small"));
        }
        let off_bytes = region.read_u64(0) as usize;
        if region.len() < 8 + off_bytes + 8 {
            return Err(Error::corrupt("zo_sorted_strvec offsets truncated"));
        }
        let offsets = SortedUintVec::load(region.slice(8, off_bytes))?;
        let pool_len = region.read_u64(8 + off_bytes) as usize;
        if region.len() < 16 + off_bytes + pool_len {
            return Err(Error::corrupt("zo_sorted_strvec pool truncated"));
        }
        if offsets.is_empty() {
            return Err(Error::corrupt("zo_sorted_strvec: empty offset array"));
        }
        Ok(ZoSortedStrVec {
            pool: Pool::Region(region.slice(16 + off_bytes, pool_len)),
            offsets,
        })
    }
}

impl StrVecOps for ZoSortedStrVec {
    fn len(&self) -> usize {
        self.offsets.size() - 1
    }

    fn nth(&self, i: usize) -> &[u8] {
        debug_assert!(i < self.len());
        let [lo, hi] = self.offsets.get2(i);
        &self.pool.as_slice()[lo as usize..hi as usize]
    }

    fn total_size(&self) -> usize {
        self.offsets.get(self.offsets.size() - 1) as usize
    }
}

impl SortedStrVec {
    fn nth_offset_raw(&self, i: usize) -> u64 {
        self.offsets.get(i)
    }
}

/// Reverse-index adaptor: `nth(i)` reads physical record `len-1-i`, so a
/// physically descending pool iterates ascending.
pub struct RevOrdStrVec<S>(pub S);

impl<S: StrVecOps> StrVecOps for RevOrdStrVec<S> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn nth(&self, i: usize) -> &[u8] {
        let n = self.0.len();
        debug_assert!(i < n);
        self.0.nth(n - 1 - i)
    }

    fn total_size(&self) -> usize {
        self.0.total_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(keys: &[&[u8]]) -> SortedStrVec {
        let mut b = SortedStrVecBuilder::new();
        for k in keys {
            b.push(k).unwrap();
        }
        b.finish()
    }

    #[test]
    fn bounds_on_unique_keys() {
        let v = build(&[b"ant", b"bee", b"cat", b"dog"]);
        for (i, k) in [b"ant", b"bee", b"cat", b"dog"].iter().enumerate() {
            assert_eq!(v.lower_bound(0, 4, *k), i, "lower {k:?}");
            assert_eq!(v.upper_bound(0, 4, *k), i + 1, "upper {k:?}");
        }
        assert_eq!(v.lower_bound(0, 4, b"bat"), 1);
        assert_eq!(v.lower_bound(0, 4, b"zzz"), 4);
        assert_eq!(v.total_size(), 12);
    }

    #[test]
    fn builder_rejects_unsorted() {
        let mut b = SortedStrVecBuilder::new();
        b.push(b"m").unwrap();
        assert!(b.push(b"a").is_err());
    }

    #[test]
    fn empty_strings_allowed() {
        let v = build(&[b"", b"", b"x"]);
        assert_eq!(v.len(), 3);
        assert_eq!(v.nth(0), b"");
        assert_eq!(v.nth(2), b"x");
    }

    #[test]
    fn zo_variant_matches_plain() {
        let keys: Vec<Vec<u8>> = (0..500u32)
            .map(|i| format!("key-{i:06}").into_bytes())
            .collect();
        let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let plain = build(&refs);
        let zo = ZoSortedStrVec::from_sorted(&plain, 64).unwrap();
        assert_eq!(zo.len(), plain.len());
        for i in (0..plain.len()).step_by(7) {
            assert_eq!(zo.nth(i), plain.nth(i));
            assert_eq!(zo.nth_offset(i), plain.nth_offset(i));
        }
        assert_eq!(
            zo.lower_bound(0, zo.len(), b"key-000250"),
            plain.lower_bound(0, plain.len(), b"key-000250")
        );
    }

    #[test]
    fn save_load_both_variants() {
        let v = build(&[b"alpha", b"beta", b"gamma"]);
        let mut img = Vec::new();
        v.save(&mut img);
        let loaded = SortedStrVec::load(ByteRegion::from_vec(img)).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.nth(1), b"beta");

        let zo = ZoSortedStrVec::from_sorted(&v, 128).unwrap();
        let mut img = Vec::new();
        zo.save(&mut img);
        let loaded = ZoSortedStrVec::load(ByteRegion::from_vec(img)).unwrap();
        assert_eq!(loaded.nth(2), b"gamma");
    }

    #[test]
    fn rev_ord_adaptor() {
        let v = build(&[b"a", b"b", b"c"]);
        let rev = RevOrdStrVec(v);
        assert_eq!(rev.nth(0), b"c");
        assert_eq!(rev.nth(2), b"a");
        assert_eq!(rev.len(), 3);
    }
}
