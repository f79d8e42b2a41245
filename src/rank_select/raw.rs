//! Owned-or-mapped storage for rank/select payloads.
//!
//! Freshly built vectors own their arrays; zero-copy loads keep a
//! [`ByteRegion`] view into the file image. Both sides answer the same
//! indexed reads, so query code never branches on provenance beyond one
//! enum dispatch.

use crate::region::ByteRegion;

pub(crate) enum WordStore {
    Owned(Vec<u64>),
    Region(ByteRegion),
}

impl WordStore {
    #[inline]
    pub fn get(&self, i: usize) -> u64 {
        match self {
            WordStore::Owned(v) => v[i],
            WordStore::Region(r) => r.read_u64(i * 8),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            WordStore::Owned(v) => v.len(),
            WordStore::Region(r) => r.len() / 8,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.len() * 8
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        match self {
            WordStore::Owned(v) => {
                for w in v {
                    out.extend_from_slice(&w.to_le_bytes());
                }
            }
            WordStore::Region(r) => out.extend_from_slice(r.as_slice()),
        }
    }
}

/// Byte-granular owned-or-mapped storage, for interleaved layouts whose
/// records are not word-multiples (e.g. 40-byte lines).
pub(crate) enum ByteStore {
    Owned(Vec<u8>),
    Region(ByteRegion),
}

impl ByteStore {
    #[inline]
    pub fn read_u64(&self, pos: usize) -> u64 {
        match self {
            ByteStore::Owned(v) => u64::from_le_bytes(v[pos..pos + 8].try_into().unwrap()),
            ByteStore::Region(r) => r.read_u64(pos),
        }
    }

    #[inline]
    pub fn read_u32(&self, pos: usize) -> u32 {
        match self {
            ByteStore::Owned(v) => u32::from_le_bytes(v[pos..pos + 4].try_into().unwrap()),
            ByteStore::Region(r) => r.read_u32(pos),
        }
    }

    #[inline]
    pub fn read_u8(&self, pos: usize) -> u8 {
        match self {
            ByteStore::Owned(v) => v[pos],
            ByteStore::Region(r) => r.as_slice()[pos],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ByteStore::Owned(v) => v.len(),
            ByteStore::Region(r) => r.len(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            ByteStore::Owned(v) => v,
            ByteStore::Region(r) => r.as_slice(),
        }
    }

    pub fn save(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_slice());
    }
}

pub(crate) enum U32Store {
    Owned(Vec<u32>),
    Region(ByteRegion),
}

impl U32Store {
    #[inline]
    pub fn get(&self, i: usize) -> u32 {
        match self {
            U32Store::Owned(v) => v[i],
            U32Store::Region(r) => r.read_u32(i * 4),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            U32Store::Owned(v) => v.len(),
            U32Store::Region(r) => r.len() / 4,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.len() * 4
    }

    /// Serialize, padding to an 8-byte boundary with zeros.
    pub fn save_padded(&self, out: &mut Vec<u8>) {
        match self {
            U32Store::Owned(v) => {
                for w in v {
                    out.extend_from_slice(&w.to_le_bytes());
                }
            }
            U32Store::Region(r) => out.extend_from_slice(r.as_slice()),
        }
        if self.len() % 2 != 0 {
            out.extend_from_slice(&[0u8; 4]);
        }
    }

    /// Bytes occupied on disk for `n` entries, including pad.
    pub fn padded_size(n: usize) -> usize {
        n.div_ceil(2) * 8
    }
}
