//! Delta-compressed non-decreasing integer sequence.
//!
//! Elements are grouped into blocks of 64 or 128. Each block stores the
//! value of its first element (the block base) and every element as a
//! fixed-width delta against that base; the width is chosen per block
//! from the block's spread. Block bases form their own packed ladder, so
//! `lower_bound` skips to the right block before touching deltas.
//!
//! This is the offset-index representation used by the ZipOffset,
//! EntropyZip, and DictZip stores: offsets grow slowly, so deltas are
//! narrow even when absolute values need 40+ bits.

use crate::error::{Error, Result};
use crate::region::ByteRegion;

use super::{UintVecBuilder, UintVecMin0};

pub struct SortedUintVec {
    size: usize,
    units: usize,
    /// per block: value of the first element
    block_base: UintVecMin0,
    /// per block: bit offset of the block's deltas in `data`
    block_bits: UintVecMin0,
    /// per block: delta width in bits (0 = constant block)
    block_width: BlockWidths,
    data: DeltaBits,
}

enum BlockWidths {
    Owned(Vec<u8>),
    Region(ByteRegion),
}

impl BlockWidths {
    #[inline]
    fn get(&self, b: usize) -> usize {
        match self {
            BlockWidths::Owned(v) => v[b] as usize,
            BlockWidths::Region(r) => r.as_slice()[b] as usize,
        }
    }

    fn as_slice(&self) -> &[u8] {
        match self {
            BlockWidths::Owned(v) => v,
            BlockWidths::Region(r) => r.as_slice(),
        }
    }
}

enum DeltaBits {
    Owned(Vec<u8>),
    Region(ByteRegion),
}

impl DeltaBits {
    #[inline]
    fn read_u64(&self, pos: usize) -> u64 {
        match self {
            DeltaBits::Owned(v) => u64::from_le_bytes(v[pos..pos + 8].try_into().unwrap()),
            DeltaBits::Region(r) => r.read_u64(pos),
        }
    }

    fn as_slice(&self) -> &[u8] {
        match self {
            DeltaBits::Owned(v) => v,
            DeltaBits::Region(r) => r.as_slice(),
        }
    }

    /// Extract `width` bits at absolute bit offset `bit`.
    #[inline]
    fn extract(&self, bit: usize, width: usize) -> u64 {
        if width == 0 {
            return 0;
        }
        let byte = bit / 8;
        let shift = bit % 8;
        let mask = if width >= 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };
        if shift + width <= 64 {
            (self.read_u64(byte) >> shift) & mask
        } else {
            let lo = self.read_u64(byte) >> shift;
            let hi = self.read_u64(byte + 8) << (64 - shift);
            (lo | hi) & mask
        }
    }
}

impl SortedUintVec {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Elements per block (64 or 128).
    pub fn block_units(&self) -> usize {
        self.units
    }

    pub fn num_blocks(&self) -> usize {
        self.size.div_ceil(self.units)
    }

    pub fn mem_size(&self) -> usize {
        self.block_base.mem_size()
            + self.block_bits.mem_size()
            + self.block_width.as_slice().len()
            + self.data.as_slice().len()
    }

    #[inline]
    pub fn get(&self, i: usize) -> u64 {
        debug_assert!(i < self.size, "index {i} out of {}", self.size);
        let b = i / self.units;
        let w = self.block_width.get(b);
        let bit = self.block_bits.get(b) as usize + (i % self.units) * w;
        self.block_base.get(b) + self.data.extract(bit, w)
    }

    /// Adjacent pair in one block decode where possible.
    #[inline]
    pub fn get2(&self, i: usize) -> [u64; 2] {
        debug_assert!(i + 1 < self.size);
        let b = i / self.units;
        if (i + 1) / self.units == b {
            let w = self.block_width.get(b);
            let base = self.block_base.get(b);
            let bit = self.block_bits.get(b) as usize + (i % self.units) * w;
            [
                base + self.data.extract(bit, w),
                base + self.data.extract(bit + w, w),
            ]
        } else {
            [self.get(i), self.get(i + 1)]
        }
    }

    /// Decode block `b` into `out`; returns the element count (a tail
    /// block may be short).
    pub fn get_block(&self, b: usize, out: &mut [u64]) -> usize {
        debug_assert!(b < self.num_blocks());
        let count = (self.size - b * self.units).min(self.units);
        let base = self.block_base.get(b);
        let w = self.block_width.get(b);
        let start = self.block_bits.get(b) as usize;
        for (j, slot) in out.iter_mut().enumerate().take(count) {
            *slot = base + self.data.extract(start + j * w, w);
        }
        count
    }

    /// First index in `[lo, hi)` with `get(i) >= key`; uses the block-base
    /// ladder to skip whole blocks.
    pub fn lower_bound(&self, lo: usize, hi: usize, key: u64) -> usize {
        debug_assert!(lo <= hi && hi <= self.size);
        if lo >= hi {
            return lo;
        }
        // last block whose base <= key could still hold the answer
        let b_lo = lo / self.units;
        let b_hi = (hi - 1) / self.units + 1;
        let b = self.block_base.upper_bound(b_lo, b_hi, key).max(b_lo + 1) - 1;
        let mut l = (b * self.units).max(lo);
        // answer may be past this block when all its values are < key
        let mut h = hi;
        if b + 1 < b_hi {
            // values in later blocks are >= their base > key only if base > key;
            // the first such block bounds the search
            let nb = (b + 1) * self.units;
            if self.block_base.get(b + 1) > key {
                h = nb.min(hi);
            }
        }
        while l < h {
            let m = (l + h) / 2;
            if self.get(m) < key {
                l = m + 1;
            } else {
                h = m;
            }
        }
        l
    }

    /// First index in `[lo, hi)` with `get(i) > key`.
    pub fn upper_bound(&self, lo: usize, hi: usize, key: u64) -> usize {
        let mut l = lo;
        let mut h = hi;
        while l < h {
            let m = (l + h) / 2;
            if self.get(m) <= key {
                l = m + 1;
            } else {
                h = m;
            }
        }
        l
    }

    /// Serialized image:
    /// `u64 size | u32 units | u32 pad | u64 base_bytes | u64 bits_bytes |
    ///  u64 width_bytes | u64 data_bytes | sections...` (each 8-aligned).
    pub fn save(&self, out: &mut Vec<u8>) {
        let mut base_img = Vec::new();
        self.block_base.save(&mut base_img);
        let mut bits_img = Vec::new();
        self.block_bits.save(&mut bits_img);
        let widths = self.block_width.as_slice();
        let widths_padded = widths.len().div_ceil(8) * 8;
        let data = self.data.as_slice();
        let data_padded = data.len().div_ceil(8) * 8;

        out.extend_from_slice(&(self.size as u64).to_le_bytes());
        out.extend_from_slice(&(self.units as u32).to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(base_img.len() as u64).to_le_bytes());
        out.extend_from_slice(&(bits_img.len() as u64).to_le_bytes());
        out.extend_from_slice(&(widths_padded as u64).to_le_bytes());
        out.extend_from_slice(&(data_padded as u64).to_le_bytes());
        out.extend_from_slice(&base_img);
        out.extend_from_slice(&bits_img);
        out.extend_from_slice(widths);
        out.resize(out.len() + widths_padded - widths.len(), 0);
        out.extend_from_slice(data);
        out.resize(out.len() + data_padded - data.len(), 0);
    }

    pub fn load(region: ByteRegion) -> Result<Self> {
        if region.len() < 48 {
            return Err(Error::corrupt("sorted_uint_vec image too small"));
        }
        let size = region.read_u64(0) as usize;
        let units = region.read_u32(8) as usize;
        if units != 64 && units != 128 {
            return Err(Error::corrupt(format!(
                "sorted_uint_vec: bad block units {units}"
            )));
        }
        let base_bytes = region.read_u64(16) as usize;
        let bits_bytes = region.read_u64(24) as usize;
        let width_bytes = region.read_u64(32) as usize;
        let data_bytes = region.read_u64(40) as usize;
        let need = 48 + base_bytes + bits_bytes + width_bytes + data_bytes;
        if region.len() < need {
            return Err(Error::corrupt("sorted_uint_vec sections truncated"));
        }
        let mut pos = 48usize;
        let block_base = UintVecMin0::load(region.slice(pos, base_bytes))?;
        pos += base_bytes;
        let block_bits = UintVecMin0::load(region.slice(pos, bits_bytes))?;
        pos += bits_bytes;
        let nblocks = size.div_ceil(units);
        if width_bytes < nblocks {
            return Err(Error::corrupt("sorted_uint_vec width table truncated"));
        }
        let block_width = BlockWidths::Region(region.slice(pos, width_bytes));
        pos += width_bytes;
        let data = DeltaBits::Region(region.slice(pos, data_bytes));
        Ok(SortedUintVec {
            size,
            units,
            block_base,
            block_bits,
            block_width,
            data,
        })
    }
}

/// Accumulates a non-decreasing sequence and freezes it block by block.
pub struct SortedUintVecBuilder {
    units: usize,
    values: Vec<u64>,
    last: u64,
}

impl SortedUintVecBuilder {
    /// `units` must be 64 or 128.
    pub fn new(units: usize) -> Result<Self> {
        if units != 64 && units != 128 {
            return Err(Error::invalid(format!(
                "sorted_uint_vec block units must be 64 or 128, got {units}"
            )));
        }
        Ok(SortedUintVecBuilder {
            units,
            values: Vec::new(),
            last: 0,
        })
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn push(&mut self, val: u64) -> Result<()> {
        if val < self.last {
            return Err(Error::invalid(format!(
                "sorted_uint_vec values must be non-decreasing: {val} after {}",
                self.last
            )));
        }
        self.last = val;
        self.values.push(val);
        Ok(())
    }

    pub fn finish(self) -> SortedUintVec {
        let units = self.units;
        let nblocks = self.values.len().div_ceil(units);
        let mut bases = Vec::with_capacity(nblocks);
        let mut widths = Vec::with_capacity(nblocks);
        let mut bit_offsets = Vec::with_capacity(nblocks);
        let mut data = UintVecBuilderBits::new();
        for block in self.values.chunks(units) {
            let base = block[0];
            let spread = block[block.len() - 1] - base;
            let w = if spread == 0 {
                0
            } else {
                UintVecMin0::compute_width(spread)
            };
            bases.push(base);
            widths.push(w as u8);
            bit_offsets.push(data.bit_len() as u64);
            for &v in block {
                data.push_bits(v - base, w);
            }
        }
        let block_base = UintVecMin0::build_from(&bases);
        let block_bits = UintVecMin0::build_from(&bit_offsets);
        SortedUintVec {
            size: self.values.len(),
            units,
            block_base,
            block_bits,
            block_width: BlockWidths::Owned(widths),
            data: DeltaBits::Owned(data.finish()),
        }
    }
}

/// Little bit-appender for the delta payload.
struct UintVecBuilderBits {
    buf: Vec<u8>,
    acc: u64,
    cnt: usize,
    bits: usize,
}

impl UintVecBuilderBits {
    fn new() -> Self {
        UintVecBuilderBits {
            buf: Vec::new(),
            acc: 0,
            cnt: 0,
            bits: 0,
        }
    }

    fn bit_len(&self) -> usize {
        self.bits
    }

    fn push_bits(&mut self, val: u64, width: usize) {
        if width == 0 {
            return;
        }
        debug_assert!(width >= 64 || val < (1u64 << width));
        self.acc |= val << self.cnt;
        let fit = 64 - self.cnt;
        if fit > width {
            self.cnt += width;
        } else {
            self.buf.extend_from_slice(&self.acc.to_le_bytes());
            self.acc = if fit == 64 { 0 } else { val >> fit };
            self.cnt = width - fit;
        }
        self.bits += width;
    }

    fn finish(mut self) -> Vec<u8> {
        if self.cnt > 0 {
            self.buf.extend_from_slice(&self.acc.to_le_bytes());
        }
        // 8-byte tail margin for the two-load extract path
        self.buf.extend_from_slice(&[0u8; 8]);
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(vals: &[u64], units: usize) -> SortedUintVec {
        let mut b = SortedUintVecBuilder::new(units).unwrap();
        for &v in vals {
            b.push(v).unwrap();
        }
        b.finish()
    }

    #[test]
    fn single_block_get_and_bounds() {
        let vals = [0u64, 2, 5, 7, 7, 12, 18, 18, 21];
        let v = build(&vals, 128);
        assert_eq!(v.get(4), 7);
        assert_eq!(v.get2(3), [7, 7]);
        assert_eq!(v.lower_bound(0, 9, 7), 3);
        assert_eq!(v.upper_bound(0, 9, 7), 5);
    }

    #[test]
    fn multi_block_roundtrip() {
        let vals: Vec<u64> = (0..1000u64).scan(0u64, |acc, i| {
            *acc += i % 17;
            Some(*acc)
        }).collect();
        let v = build(&vals, 64);
        assert_eq!(v.num_blocks(), 1000usize.div_ceil(64));
        for (i, &x) in vals.iter().enumerate() {
            assert_eq!(v.get(i), x, "at {i}");
        }
        for i in 0..vals.len() - 1 {
            assert_eq!(v.get2(i), [vals[i], vals[i + 1]], "pair at {i}");
        }
    }

    #[test]
    fn get_block_bulk_decode() {
        let vals: Vec<u64> = (0..300u64).map(|i| i * i / 7).collect();
        let v = build(&vals, 128);
        let mut buf = [0u64; 128];
        let n = v.get_block(1, &mut buf);
        assert_eq!(n, 128);
        assert_eq!(&buf[..n], &vals[128..256]);
        let n = v.get_block(2, &mut buf);
        assert_eq!(n, 300 - 256);
        assert_eq!(&buf[..n], &vals[256..]);
    }

    #[test]
    fn lower_bound_across_blocks() {
        let vals: Vec<u64> = (0..500u64).map(|i| i * 3).collect();
        let v = build(&vals, 64);
        for key in [0u64, 1, 3, 100, 299, 300, 1496, 1497, 2000] {
            let expect = vals.partition_point(|&x| x < key);
            assert_eq!(v.lower_bound(0, vals.len(), key), expect, "key {key}");
        }
        // restricted range
        assert_eq!(v.lower_bound(10, 20, 0), 10);
        assert_eq!(v.lower_bound(10, 20, u64::MAX), 20);
    }

    #[test]
    fn constant_block_uses_zero_width() {
        let vals = vec![5u64; 200];
        let v = build(&vals, 64);
        for i in (0..200).step_by(13) {
            assert_eq!(v.get(i), 5);
        }
        // all-equal blocks pack no delta bits at all
        assert_eq!(v.data.as_slice().len(), 8);
    }

    #[test]
    fn builder_rejects_decreasing() {
        let mut b = SortedUintVecBuilder::new(64).unwrap();
        b.push(10).unwrap();
        assert!(b.push(9).is_err());
        assert!(SortedUintVecBuilder::new(100).is_err());
    }

    #[test]
    fn save_load_roundtrip() {
        let vals: Vec<u64> = (0..777u64).scan(1u64 << 33, |acc, i| {
            *acc += (i % 29) * 7;
            Some(*acc)
        }).collect();
        let v = build(&vals, 128);
        let mut img = Vec::new();
        v.save(&mut img);
        assert_eq!(img.len() % 8, 0);
        let loaded = SortedUintVec::load(ByteRegion::from_vec(img)).unwrap();
        assert_eq!(loaded.size(), v.size());
        assert_eq!(loaded.block_units(), 128);
        for i in (0..vals.len()).step_by(7) {
            assert_eq!(loaded.get(i), vals[i]);
        }
        assert_eq!(
            loaded.lower_bound(0, vals.len(), vals[500]),
            v.lower_bound(0, vals.len(), vals[500])
        );
    }
}
