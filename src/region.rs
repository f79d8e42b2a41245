//! Shared byte storage for loaded artifacts.
//!
//! Every persistent structure in this crate (bitvectors, packed integer
//! arrays, string pools, tries, blob stores) loads from a [`ByteRegion`]:
//! a cheaply-cloneable view into either heap bytes or a reference-counted
//! memory map. Sub-views are O(1), so a store can hand each of its
//! sections to a component without copying: the mmap image stays the
//! single backing allocation.
//!
//! On-disk integers are little-endian; the `read_*` helpers do unaligned
//! LE loads, which compile to plain loads on little-endian hosts.

use std::ops::Deref;
use std::sync::Arc;

use memmap2::Mmap;

#[derive(Clone)]
enum Owner {
    Empty,
    Heap(Arc<Vec<u8>>),
    Map(Arc<Mmap>),
}

/// A view into shared immutable bytes.
#[derive(Clone)]
pub struct ByteRegion {
    owner: Owner,
    offset: usize,
    len: usize,
}

impl ByteRegion {
    /// The empty region.
    pub fn empty() -> Self {
        ByteRegion {
            owner: Owner::Empty,
            offset: 0,
            len: 0,
        }
    }

    /// Take ownership of heap bytes.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        ByteRegion {
            owner: Owner::Heap(Arc::new(data)),
            offset: 0,
            len,
        }
    }

    /// View an entire memory map.
    pub fn from_mmap(map: Arc<Mmap>) -> Self {
        let len = map.len();
        ByteRegion {
            owner: Owner::Map(map),
            offset: 0,
            len,
        }
    }

    /// O(1) sub-view. Panics if the range is out of bounds.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len),
            "region slice [{offset}, {offset}+{len}) out of bounds (len {})",
            self.len
        );
        ByteRegion {
            owner: self.owner.clone(),
            offset: self.offset + offset,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.owner {
            Owner::Empty => &[],
            Owner::Heap(v) => &v[self.offset..self.offset + self.len],
            Owner::Map(m) => &m[self.offset..self.offset + self.len],
        }
    }

    /// Unaligned little-endian u64 at byte offset `pos`.
    #[inline]
    pub fn read_u64(&self, pos: usize) -> u64 {
        let s = self.as_slice();
        u64::from_le_bytes(s[pos..pos + 8].try_into().unwrap())
    }

    /// Unaligned little-endian u32 at byte offset `pos`.
    #[inline]
    pub fn read_u32(&self, pos: usize) -> u32 {
        let s = self.as_slice();
        u32::from_le_bytes(s[pos..pos + 4].try_into().unwrap())
    }

    /// Unaligned little-endian u16 at byte offset `pos`.
    #[inline]
    pub fn read_u16(&self, pos: usize) -> u16 {
        let s = self.as_slice();
        u16::from_le_bytes(s[pos..pos + 2].try_into().unwrap())
    }
}

impl Deref for ByteRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl std::fmt::Debug for ByteRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.owner {
            Owner::Empty => "empty",
            Owner::Heap(_) => "heap",
            Owner::Map(_) => "mmap",
        };
        write!(f, "ByteRegion({kind}, offset={}, len={})", self.offset, self.len)
    }
}

impl From<Vec<u8>> for ByteRegion {
    fn from(v: Vec<u8>) -> Self {
        ByteRegion::from_vec(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_of_slice_composes() {
        let r = ByteRegion::from_vec((0u8..32).collect());
        let a = r.slice(8, 16);
        let b = a.slice(4, 4);
        assert_eq!(b.as_slice(), &[12, 13, 14, 15]);
    }

    #[test]
    fn le_readers() {
        let mut v = vec![0u8; 16];
        v[3..11].copy_from_slice(&0x0102_0304_0506_0708u64.to_le_bytes());
        let r = ByteRegion::from_vec(v);
        assert_eq!(r.read_u64(3), 0x0102_0304_0506_0708);
        assert_eq!(r.read_u32(3), 0x0506_0708);
        assert_eq!(r.read_u16(3), 0x0708);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn slice_out_of_bounds_panics() {
        let r = ByteRegion::from_vec(vec![0; 4]);
        let _ = r.slice(2, 3);
    }
}
