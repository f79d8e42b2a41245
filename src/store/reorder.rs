//! Record permutation support.
//!
//! [`ZReorderMap`] is a packed new-index -> old-index permutation handed
//! to [`super::BlobStore::reorder_zip_data`]. The emit helper assembles a
//! permuted store image (header, sections, optional whole-data footer)
//! and streams it to the caller's sink.

use crate::crc::{crc32c_update, Crc16Digest};
use crate::error::{Error, Result};
use crate::int_vec::UintVecMin0;

use super::header::{ChecksumLevel, ChecksumType, FileHeader};

/// Packed permutation: `get(new_index) = old_index`.
pub struct ZReorderMap {
    map: UintVecMin0,
}

impl ZReorderMap {
    /// Build from an explicit permutation; every old index must appear
    /// exactly once.
    pub fn from_perm(perm: &[u64]) -> Result<Self> {
        let n = perm.len();
        let mut seen = vec![false; n];
        for &old in perm {
            let old = old as usize;
            if old >= n || seen[old] {
                return Err(Error::invalid(format!(
                    "reorder map is not a permutation (index {old})"
                )));
            }
            seen[old] = true;
        }
        Ok(ZReorderMap {
            map: UintVecMin0::build_from(perm),
        })
    }

    /// The identity permutation over `n` records.
    pub fn identity(n: usize) -> Self {
        let perm: Vec<u64> = (0..n as u64).collect();
        ZReorderMap {
            map: UintVecMin0::build_from(&perm),
        }
    }

    pub fn len(&self) -> usize {
        self.map.size()
    }

    pub fn is_empty(&self) -> bool {
        self.map.size() == 0
    }

    /// Old record id placed at `new_index`.
    pub fn get(&self, new_index: usize) -> usize {
        self.map.get(new_index) as usize
    }

    /// Old ids in new order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    pub(crate) fn check_domain(&self, num_records: usize) -> Result<()> {
        if self.len() != num_records {
            return Err(Error::invalid(format!(
                "reorder map covers {} records, store has {num_records}",
                self.len()
            )));
        }
        Ok(())
    }
}

/// Stream `header | sections... | [whole-data footer]` to `sink`.
pub(crate) fn emit_store(
    header: &FileHeader,
    sections: &[&[u8]],
    sink: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    sink(&header.encode())?;
    let mut crc32 = 0u32;
    let mut crc16 = Crc16Digest::new();
    for s in sections {
        sink(s)?;
        if header.checksum_level == ChecksumLevel::WholeData {
            match header.checksum_type {
                ChecksumType::Crc32c => crc32 = crc32c_update(crc32, s),
                ChecksumType::Crc16c => crc16.update(s),
            }
        }
    }
    if header.checksum_level == ChecksumLevel::WholeData {
        let v = match header.checksum_type {
            ChecksumType::Crc32c => crc32,
            ChecksumType::Crc16c => crc16.finalize() as u32,
        };
        let mut footer = [0u8; 8];
        footer[..4].copy_from_slice(&v.to_le_bytes());
        sink(&footer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_permutations() {
        assert!(ZReorderMap::from_perm(&[0, 0, 1]).is_err());
        assert!(ZReorderMap::from_perm(&[0, 3]).is_err());
        assert!(ZReorderMap::from_perm(&[2, 0, 1]).is_ok());
    }

    #[test]
    fn identity_iterates_in_order() {
        let m = ZReorderMap::identity(5);
        let v: Vec<usize> = m.iter().collect();
        assert_eq!(v, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn reverse_map() {
        let m = ZReorderMap::from_perm(&[3, 2, 1, 0]).unwrap();
        assert_eq!(m.get(0), 3);
        assert_eq!(m.get(3), 0);
    }
}
