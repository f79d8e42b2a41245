//! Constant-space degenerate bitvectors.
//!
//! When a container knows one of its routing vectors is uniformly zero or
//! uniformly one (every record fixed-length, every node linked, ...), the
//! whole rank/select surface collapses to arithmetic on the size.

use crate::error::{Error, Result};
use crate::region::ByteRegion;

use super::{BitVec, RankSelectIndex, RankSelectOps};

/// All bits clear.
#[derive(Clone, Copy, Debug, Default)]
pub struct RankSelectAllZero {
    size: usize,
}

/// All bits set.
#[derive(Clone, Copy, Debug, Default)]
pub struct RankSelectAllOne {
    size: usize,
}

impl RankSelectAllZero {
    pub fn with_size(size: usize) -> Self {
        RankSelectAllZero { size }
    }
}

impl RankSelectAllOne {
    pub fn with_size(size: usize) -> Self {
        RankSelectAllOne { size }
    }
}

impl RankSelectOps for RankSelectAllZero {
    fn size(&self) -> usize {
        self.size
    }
    fn rank1(&self, _pos: usize) -> usize {
        0
    }
    fn select1(&self, _k: usize) -> usize {
        debug_assert!(false, "select1 on all-zero vector");
        self.size
    }
    fn select0(&self, k: usize) -> usize {
        debug_assert!(k < self.size);
        k
    }
    fn is1(&self, pos: usize) -> bool {
        debug_assert!(pos < self.size);
        false
    }
    fn max_rank1(&self) -> usize {
        0
    }
    fn one_seq_len(&self, _pos: usize) -> usize {
        0
    }
    fn zero_seq_len(&self, pos: usize) -> usize {
        self.size - pos.min(self.size)
    }
    fn one_seq_revlen(&self, _pos: usize) -> usize {
        0
    }
    fn zero_seq_revlen(&self, pos: usize) -> usize {
        pos.min(self.size)
    }
    fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

impl RankSelectOps for RankSelectAllOne {
    fn size(&self) -> usize {
        self.size
    }
    fn rank1(&self, pos: usize) -> usize {
        debug_assert!(pos <= self.size);
        pos
    }
    fn select1(&self, k: usize) -> usize {
        debug_assert!(k < self.size);
        k
    }
    fn select0(&self, _k: usize) -> usize {
        debug_assert!(false, "select0 on all-one vector");
        self.size
    }
    fn is1(&self, pos: usize) -> bool {
        debug_assert!(pos < self.size);
        true
    }
    fn max_rank1(&self) -> usize {
        self.size
    }
    fn one_seq_len(&self, pos: usize) -> usize {
        self.size - pos.min(self.size)
    }
    fn zero_seq_len(&self, _pos: usize) -> usize {
        0
    }
    fn one_seq_revlen(&self, pos: usize) -> usize {
        pos.min(self.size)
    }
    fn zero_seq_revlen(&self, _pos: usize) -> usize {
        0
    }
    fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

// Image is just the bit count.
macro_rules! degenerate_index {
    ($ty:ident, $all_ones:expr, $name:literal) => {
        impl RankSelectIndex for $ty {
            fn from_bitvec(bits: BitVec) -> Self {
                let ones = bits.count_ones();
                let expect = if $all_ones { bits.size() } else { 0 };
                assert_eq!(ones, expect, concat!($name, ": payload not uniform"));
                $ty { size: bits.size() }
            }

            fn save(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&(self.size as u64).to_le_bytes());
            }

            fn load(region: ByteRegion) -> Result<Self> {
                if region.len() < 8 {
                    return Err(Error::corrupt(concat!($name, " image too small")));
                }
                Ok($ty {
                    size: region.read_u64(0) as usize,
                })
            }
        }
    };
}

degenerate_index!(RankSelectAllZero, false, "rank_select_allzero");
degenerate_index!(RankSelectAllOne, true, "rank_select_allone");
