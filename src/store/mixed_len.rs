//! Majority-fixed-length record store.
//!
//! Corpora where most records share one length L waste an offset entry
//! per record in the plain layout. Here records of length L go to a
//! contiguous slab indexed by multiplication; the rest go to a plain
//! variable section; a rank/select bitvector routes each record id to
//! its side.

use std::path::Path;

use crate::error::{Error, Result};
use crate::int_vec::UintVecMin0;
use crate::rank_select::{BitVec, RankSelectIl256, RankSelectIndex, RankSelectOps};
use crate::region::ByteRegion;

use super::header::{ChecksumLevel, ChecksumType, FileHeader, HEADER_SIZE};
use super::{record_trailer, trailer_size, verify_trailer, BlobStore, StoreWriter, ZReorderMap};

pub(crate) const CLASS_NAME: &str = "MixedLenBlobStore";

pub struct MixedLenBlobStore {
    header: FileHeader,
    fixed_len: usize,
    fixed_slab: ByteRegion,
    var_payload: ByteRegion,
    var_offsets: UintVecMin0,
    /// bit set => record id lives in the fixed slab
    is_fixed: RankSelectIl256,
}

impl MixedLenBlobStore {
    pub(crate) fn open(region: ByteRegion, header: FileHeader) -> Result<Self> {
        let content = header.content_size as usize;
        let offs = header.offset_size as usize;
        if region.len() < HEADER_SIZE + content + offs || offs < 16 {
            return Err(Error::corrupt("mixed_len store sections truncated"));
        }
        let index = region.slice(HEADER_SIZE + content, offs);
        let fixed_len = index.read_u32(0) as usize;
        let var_off_len = index.read_u64(8) as usize;
        if 16 + var_off_len > offs {
            return Err(Error::corrupt("mixed_len store: index sub-header bad"));
        }
        let var_offsets = UintVecMin0::load(index.slice(16, var_off_len))?;
        let is_fixed = RankSelectIl256::load(index.slice(16 + var_off_len, offs - 16 - var_off_len))?;
        if is_fixed.size() != header.num_records as usize {
            return Err(Error::corrupt("mixed_len store: routing bits mismatch"));
        }
        let stored_fixed = fixed_len + trailer_size(header.checksum_level);
        let slab_len = is_fixed.max_rank1() * stored_fixed;
        if slab_len > content {
            return Err(Error::corrupt("mixed_len store: slab exceeds content"));
        }
        if var_offsets.size() != is_fixed.max_rank0() + 1 {
            return Err(Error::corrupt("mixed_len store: var offset count mismatch"));
        }
        let fixed_slab = region.slice(HEADER_SIZE, slab_len);
        let var_payload = region.slice(HEADER_SIZE + slab_len, content - slab_len);
        Ok(MixedLenBlobStore {
            header,
            fixed_len,
            fixed_slab,
            var_payload,
            var_offsets,
            is_fixed,
        })
    }

    pub fn fixed_len(&self) -> usize {
        self.fixed_len
    }

    fn stored_record(&self, id: usize) -> Result<&[u8]> {
        if id >= self.header.num_records as usize {
            return Err(Error::invalid(format!(
                "record id {id} out of {}",
                self.header.num_records
            )));
        }
        if self.is_fixed.is1(id) {
            let idx = self.is_fixed.rank1(id);
            let w = self.fixed_len + trailer_size(self.header.checksum_level);
            Ok(&self.fixed_slab.as_slice()[idx * w..(idx + 1) * w])
        } else {
            let idx = self.is_fixed.rank0(id);
            let [lo, hi] = self.var_offsets.get2(idx);
            Ok(&self.var_payload.as_slice()[lo as usize..hi as usize])
        }
    }
}

impl BlobStore for MixedLenBlobStore {
    fn num_records(&self) -> usize {
        self.header.num_records as usize
    }

    fn total_data_size(&self) -> u64 {
        self.header.unzip_size
    }

    fn mem_size(&self) -> usize {
        HEADER_SIZE
            + self.fixed_slab.len()
            + self.var_payload.len()
            + self.var_offsets.mem_size()
            + self.is_fixed.mem_size()
    }

    fn get_record_append(&self, id: usize, out: &mut Vec<u8>) -> Result<()> {
        let stored = self.stored_record(id)?;
        let content = verify_trailer(
            self.header.checksum_type,
            self.header.checksum_level,
            stored,
        )?;
        out.extend_from_slice(content);
        Ok(())
    }

    fn reorder_zip_data(
        &self,
        map: &ZReorderMap,
        sink: &mut dyn FnMut(&[u8]) -> Result<()>,
        _tmp: Option<&Path>,
    ) -> Result<()> {
        map.check_domain(self.num_records())?;
        let mut slab = Vec::with_capacity(self.fixed_slab.len());
        let mut var = Vec::with_capacity(self.var_payload.len());
        let mut var_offsets: Vec<u64> = vec![0];
        let mut bits = BitVec::new();
        for old in map.iter() {
            let stored = self.stored_record(old)?;
            if self.is_fixed.is1(old) {
                bits.push(true);
                slab.extend_from_slice(stored);
            } else {
                bits.push(false);
                var.extend_from_slice(stored);
                var_offsets.push(var.len() as u64);
            }
        }
        let mut var_off_img = Vec::new();
        UintVecMin0::build_from(&var_offsets).save(&mut var_off_img);
        let mut bits_img = Vec::new();
        RankSelectIl256::from_bitvec(bits).save(&mut bits_img);
        let mut index = Vec::with_capacity(16 + var_off_img.len() + bits_img.len());
        index.extend_from_slice(&(self.fixed_len as u32).to_le_bytes());
        index.extend_from_slice(&[0u8; 4]);
        index.extend_from_slice(&(var_off_img.len() as u64).to_le_bytes());
        index.extend_from_slice(&var_off_img);
        index.extend_from_slice(&bits_img);
        let mut header = self.header.clone();
        header.content_size = (slab.len() + var.len()) as u64;
        header.offset_size = index.len() as u64;
        super::reorder::emit_store(&header, &[&slab, &var, &index], sink)
    }
}

/// Builder. `var_len_bytes` / `var_len_count` are capacity hints for the
/// variable section.
pub struct MixedLenBuilder {
    path: std::path::PathBuf,
    offset: u64,
    header: FileHeader,
    fixed_len: usize,
    slab: Vec<u8>,
    var: Vec<u8>,
    var_offsets: Vec<u64>,
    bits: BitVec,
    unzip: u64,
}

impl MixedLenBuilder {
    pub fn new(
        fixed_len: usize,
        var_len_bytes: usize,
        var_len_count: usize,
        path: &Path,
        offset: u64,
        checksum_level: ChecksumLevel,
        checksum_type: ChecksumType,
    ) -> Result<Self> {
        if fixed_len == 0 {
            return Err(Error::invalid("mixed_len fixed length must be positive"));
        }
        let mut header = FileHeader::new(CLASS_NAME);
        header.checksum_level = checksum_level;
        header.checksum_type = checksum_type;
        Ok(MixedLenBuilder {
            path: path.to_path_buf(),
            offset,
            header,
            fixed_len,
            slab: Vec::new(),
            var: Vec::with_capacity(var_len_bytes),
            var_offsets: {
                let mut v = Vec::with_capacity(var_len_count + 1);
                v.push(0);
                v
            },
            bits: BitVec::new(),
            unzip: 0,
        })
    }

    pub fn add_record(&mut self, rec: &[u8]) -> Result<()> {
        let trailer = trailer_size(self.header.checksum_level) != 0;
        if rec.len() == self.fixed_len {
            self.bits.push(true);
            self.slab.extend_from_slice(rec);
            if trailer {
                self.slab
                    .extend_from_slice(&record_trailer(self.header.checksum_type, rec));
            }
        } else {
            self.bits.push(false);
            self.var.extend_from_slice(rec);
            if trailer {
                self.var
                    .extend_from_slice(&record_trailer(self.header.checksum_type, rec));
            }
            self.var_offsets.push(self.var.len() as u64);
        }
        self.unzip += rec.len() as u64;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        let mut writer = StoreWriter::create(&self.path, self.offset, self.header.checksum_type)?;
        writer.write(&self.slab)?;
        writer.write(&self.var)?;
        let content_size = writer.written();
        let mut var_off_img = Vec::new();
        UintVecMin0::build_from(&self.var_offsets).save(&mut var_off_img);
        let mut bits_img = Vec::new();
        self.header.num_records = self.bits.size() as u64;
        RankSelectIl256::from_bitvec(std::mem::take(&mut self.bits)).save(&mut bits_img);
        writer.write(&(self.fixed_len as u32).to_le_bytes())?;
        writer.write(&[0u8; 4])?;
        writer.write(&(var_off_img.len() as u64).to_le_bytes())?;
        writer.write(&var_off_img)?;
        writer.write(&bits_img)?;
        self.header.content_size = content_size;
        self.header.offset_size = writer.written() - content_size;
        self.header.unzip_size = self.unzip;
        writer.write_data_footer(&self.header)?;
        writer.finish(&self.header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load_from_mmap;

    fn mixed_records() -> Vec<Vec<u8>> {
        (0..200usize)
            .map(|i| {
                if i % 5 == 3 {
                    format!("var-{i}-{}", "y".repeat(i % 23)).into_bytes()
                } else {
                    format!("fix{i:05}").into_bytes() // 8 bytes
                }
            })
            .collect()
    }

    #[test]
    fn roundtrip_mixed_records() {
        let recs = mixed_records();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut b = MixedLenBuilder::new(
            8,
            0,
            0,
            tmp.path(),
            0,
            ChecksumLevel::HeaderOnly,
            ChecksumType::Crc32c,
        )
        .unwrap();
        for r in &recs {
            b.add_record(r).unwrap();
        }
        b.finish().unwrap();
        let store = load_from_mmap(tmp.path(), false).unwrap();
        assert_eq!(store.num_records(), recs.len());
        for (i, r) in recs.iter().enumerate() {
            assert_eq!(store.get_record(i).unwrap(), *r, "record {i}");
        }
    }

    #[test]
    fn per_record_crc_on_both_sides() {
        let recs: Vec<Vec<u8>> = vec![b"12345678".to_vec(), b"variable-length".to_vec()];
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut b = MixedLenBuilder::new(
            8,
            0,
            0,
            tmp.path(),
            0,
            ChecksumLevel::PerRecord,
            ChecksumType::Crc32c,
        )
        .unwrap();
        for r in &recs {
            b.add_record(r).unwrap();
        }
        b.finish().unwrap();
        let store = load_from_mmap(tmp.path(), false).unwrap();
        assert_eq!(store.get_record(0).unwrap(), recs[0]);
        assert_eq!(store.get_record(1).unwrap(), recs[1]);
        // corrupt one byte inside the fixed slab
        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes[HEADER_SIZE] ^= 0x10;
        std::fs::write(tmp.path(), &bytes).unwrap();
        let store = load_from_mmap(tmp.path(), false).unwrap();
        assert!(store.get_record(0).unwrap_err().is_bad_checksum());
        assert_eq!(store.get_record(1).unwrap(), recs[1]);
    }

    #[test]
    fn all_fixed_records_have_empty_var_section() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut b = MixedLenBuilder::new(
            4,
            0,
            0,
            tmp.path(),
            0,
            ChecksumLevel::HeaderOnly,
            ChecksumType::Crc32c,
        )
        .unwrap();
        for i in 0..50u32 {
            b.add_record(&i.to_le_bytes()).unwrap();
        }
        b.finish().unwrap();
        let store = load_from_mmap(tmp.path(), false).unwrap();
        for i in 0..50u32 {
            assert_eq!(store.get_record(i as usize).unwrap(), i.to_le_bytes());
        }
    }
}
