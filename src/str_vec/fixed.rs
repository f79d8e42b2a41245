//! Fixed-record-length string pool.
//!
//! The `i`-th record is the pool slice `[i*L, (i+1)*L)`; no boundary
//! array exists. Sorting permutes whole records in place.

use crate::error::{Error, Result};
use crate::region::ByteRegion;

use super::StrVecOps;

pub struct FixedLenStrVec {
    fixed_len: usize,
    pool: Pool,
    size: usize,
}

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

impl FixedLenStrVec {
    pub fn new(fixed_len: usize) -> Self {
        assert!(fixed_len > 0, "fixed record length must be positive");
        FixedLenStrVec {
            fixed_len,
            pool: Pool::Owned(Vec::new()),
            size: 0,
        }
    }

    pub fn fixed_len(&self) -> usize {
        self.fixed_len
    }

    pub fn push(&mut self, s: &[u8]) {
        assert_eq!(
            s.len(),
            self.fixed_len,
            "record length {} != fixed length {}",
            s.len(),
            self.fixed_len
        );
        match &mut self.pool {
            Pool::Owned(v) => v.extend_from_slice(s),
            Pool::Region(_) => panic!("push on a mapped FixedLenStrVec"),
        }
        self.size += 1;
    }

    /// Sort records lexicographically in place.
    pub fn sort(&mut self) {
        let fixed_len = self.fixed_len;
        let pool = match &mut self.pool {
            Pool::Owned(v) => v,
            Pool::Region(_) => panic!("sort on a mapped FixedLenStrVec"),
        };
        let mut order: Vec<usize> = (0..self.size).collect();
        order.sort_by(|&a, &b| {
            pool[a * fixed_len..(a + 1) * fixed_len]
                .cmp(&pool[b * fixed_len..(b + 1) * fixed_len])
        });
        let mut sorted = Vec::with_capacity(pool.len());
        for &i in &order {
            sorted.extend_from_slice(&pool[i * fixed_len..(i + 1) * fixed_len]);
        }
        *pool = sorted;
    }

    pub fn mem_size(&self) -> usize {
        self.pool.as_slice().len()
    }

    /// Image: `u64 size | u32 fixed_len | u32 pad | pool` (8-aligned).
    pub fn save(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.size as u64).to_le_bytes());
        out.extend_from_slice(&(self.fixed_len as u32).to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(self.pool.as_slice());
        while out.len() % 8 != 0 {
            out.push(0);
        }
    }

    pub fn load(region: ByteRegion) -> Result<Self> {
        if region.len() < 16 {
            return Err(Error::corrupt("fixed_strvec image too small"));
        }
        let size = region.read_u64(0) as usize;
        let fixed_len = region.read_u32(8) as usize;
        if fixed_len == 0 {
            return Err(Error::corrupt("fixed_strvec: zero record length"));
        }
        let need = size
            .checked_mul(fixed_len)
            .ok_or_else(|| Error::corrupt("fixed_strvec: size overflow"))?;
        if region.len() < 16 + need {
            return Err(Error::corrupt("fixed_strvec pool truncated"));
        }
        Ok(FixedLenStrVec {
            fixed_len,
            pool: Pool::Region(region.slice(16, need)),
            size,
        })
    }
}

impl StrVecOps for FixedLenStrVec {
    fn len(&self) -> usize {
        self.size
    }

    fn nth(&self, i: usize) -> &[u8] {
        debug_assert!(i < self.size);
        &self.pool.as_slice()[i * self.fixed_len..(i + 1) * self.fixed_len]
    }

    fn total_size(&self) -> usize {
        self.size * self.fixed_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FixedLenStrVec {
        let mut v = FixedLenStrVec::new(3);
        for s in [b"bca", b"abc", b"bca", b"abd"] {
            v.push(s);
        }
        v
    }

    #[test]
    fn sort_then_binary_search() {
        let mut v = sample();
        v.sort();
        let keys: Vec<&[u8]> = (0..4).map(|i| v.nth(i)).collect();
        assert_eq!(keys, [b"abc", b"abd", b"bca", b"bca"]);
        assert_eq!(v.lower_bound(0, 4, b"abd"), 1);
        assert_eq!(v.upper_bound(0, 4, b"abd"), 2);
        assert_eq!(v.upper_bound_at_pos(0, 4, 0, b'a'), 2);
    }

    #[test]
    fn upper_bound_at_pos_inner_position() {
        let mut v = FixedLenStrVec::new(2);
        for s in [b"aa", b"ab", b"ab", b"ac", b"ba"] {
            v.push(s);
        }
        assert_eq!(v.upper_bound_at_pos(0, 4, 1, b'b'), 3);
        assert_eq!(v.upper_bound_at_pos(0, 5, 0, b'a'), 4);
    }

    #[test]
    fn save_load_roundtrip() {
        let mut v = sample();
        v.sort();
        let mut img = Vec::new();
        v.save(&mut img);
        let loaded = FixedLenStrVec::load(ByteRegion::from_vec(img)).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.nth(0), b"abc");
        assert_eq!(loaded.nth(3), b"bca");
        assert_eq!(loaded.total_size(), 12);
    }
}
