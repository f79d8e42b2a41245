//! Trie-backed record store.
//!
//! Records are treated as keys of a [`NestLoudsTrieDawg`]; `get_record`
//! reconstructs the key from the trie, so the only payload beyond the
//! trie image is the record-id -> word-id map (input order need not be
//! sorted, and duplicate records share a word).

use std::path::Path;

use crate::error::{Error, Result};
use crate::int_vec::UintVecMin0;
use crate::region::ByteRegion;
use crate::str_vec::SortableStrVec;
use crate::trie::{NestLoudsTrieConfig, NestLoudsTrieDawg};

use super::header::{ChecksumLevel, ChecksumType, FileHeader, HEADER_SIZE};
use super::{BlobStore, StoreWriter, ZReorderMap};

pub(crate) const CLASS_NAME: &str = "NestLoudsTrieBlobStore";

pub struct NestLoudsTrieBlobStore {
    header: FileHeader,
    dawg: NestLoudsTrieDawg,
    idmap: UintVecMin0,
    record_crc: Option<ByteRegion>,
}

impl NestLoudsTrieBlobStore {
    pub(crate) fn open(region: ByteRegion, header: FileHeader) -> Result<Self> {
        let content = header.content_size as usize;
        let offs = header.offset_size as usize;
        if region.len() < HEADER_SIZE + content + offs {
            return Err(Error::corrupt("nlt store sections truncated"));
        }
        let dawg = NestLoudsTrieDawg::load(region.slice(HEADER_SIZE, content))?;
        let idmap = UintVecMin0::load(region.slice(HEADER_SIZE + content, offs))?;
        if idmap.size() != header.num_records as usize {
            return Err(Error::corrupt("nlt store: id map count mismatch"));
        }
        let record_crc = if header.checksum_level == ChecksumLevel::PerRecord {
            let pos = HEADER_SIZE + content + offs;
            if region.len() < pos + 8 {
                return Err(Error::corrupt("nlt store: crc section missing"));
            }
            let clen = region.read_u64(pos) as usize;
            if clen != header.num_records as usize * 4 || region.len() < pos + 8 + clen {
                return Err(Error::corrupt("nlt store: crc section malformed"));
            }
            Some(region.slice(pos + 8, clen))
        } else {
            None
        };
        Ok(NestLoudsTrieBlobStore {
            header,
            dawg,
            idmap,
            record_crc,
        })
    }

    /// The underlying dawg (lookups, iteration).
    pub fn dawg(&self) -> &NestLoudsTrieDawg {
        &self.dawg
    }

    /// Typed open from caller-provided bytes, for callers that need the
    /// dawg surface rather than the boxed [`BlobStore`].
    pub fn load_user_mem(region: ByteRegion) -> Result<Self> {
        let header = FileHeader::decode(region.as_slice())?;
        if header.class_name != CLASS_NAME {
            return Err(Error::corrupt(format!(
                "expected {CLASS_NAME}, found {}",
                header.class_name
            )));
        }
        Self::open(region, header)
    }
}

impl BlobStore for NestLoudsTrieBlobStore {
    fn num_records(&self) -> usize {
        self.header.num_records as usize
    }

    fn total_data_size(&self) -> u64 {
        self.header.unzip_size
    }

    fn mem_size(&self) -> usize {
        HEADER_SIZE
            + self.dawg.mem_size()
            + self.idmap.mem_size()
            + self.record_crc.as_ref().map_or(0, |c| c.len())
    }

    fn get_record_append(&self, id: usize, out: &mut Vec<u8>) -> Result<()> {
        if id >= self.num_records() {
            return Err(Error::invalid(format!(
                "record id {id} out of {}",
                self.header.num_records
            )));
        }
        let before = out.len();
        self.dawg.nth_word_append(self.idmap.get(id) as usize, out);
        if let Some(crcs) = &self.record_crc {
            let stored = crcs.read_u32(id * 4);
            let content = &out[before..];
            match self.header.checksum_type {
                ChecksumType::Crc32c => crate::crc::verify_crc32c("record", content, stored)?,
                ChecksumType::Crc16c => {
                    crate::crc::verify_crc16c("record", content, stored as u16)?
                }
            }
        }
        Ok(())
    }

    fn reorder_zip_data(
        &self,
        map: &ZReorderMap,
        sink: &mut dyn FnMut(&[u8]) -> Result<()>,
        _tmp: Option<&Path>,
    ) -> Result<()> {
        map.check_domain(self.num_records())?;
        // the trie image is order-free; only the id map permutes
        let perm: Vec<u64> = map.iter().map(|old| self.idmap.get(old)).collect();
        let mut idmap_img = Vec::new();
        UintVecMin0::build_from(&perm).save(&mut idmap_img);
        let mut dawg_img = Vec::new();
        self.dawg.save(&mut dawg_img);
        let mut tail = Vec::new();
        if let Some(crcs) = &self.record_crc {
            let mut permuted = Vec::with_capacity(crcs.len());
            for old in map.iter() {
                permuted.extend_from_slice(&crcs.as_slice()[old * 4..old * 4 + 4]);
            }
            tail.extend_from_slice(&(permuted.len() as u64).to_le_bytes());
            tail.extend_from_slice(&permuted);
        }
        let mut header = self.header.clone();
        header.content_size = dawg_img.len() as u64;
        header.offset_size = idmap_img.len() as u64;
        super::reorder::emit_store(&header, &[&dawg_img, &idmap_img, &tail], sink)
    }
}

/// Builder: records accumulate in memory (the trie build needs the whole
/// key set), then freeze into the trie at `finish`.
pub struct NltStoreBuilder {
    config: NestLoudsTrieConfig,
    path: std::path::PathBuf,
    offset: u64,
    checksum_level: ChecksumLevel,
    checksum_type: ChecksumType,
    keys: SortableStrVec,
    crcs: Vec<u8>,
    unzip: u64,
}

impl NltStoreBuilder {
    pub fn new(
        config: NestLoudsTrieConfig,
        path: &Path,
        offset: u64,
        checksum_level: ChecksumLevel,
        checksum_type: ChecksumType,
    ) -> Self {
        NltStoreBuilder {
            config,
            path: path.to_path_buf(),
            offset,
            checksum_level,
            checksum_type,
            keys: SortableStrVec::new(),
            crcs: Vec::new(),
            unzip: 0,
        }
    }

    pub fn add_record(&mut self, rec: &[u8]) {
        if self.checksum_level == ChecksumLevel::PerRecord {
            let v = match self.checksum_type {
                ChecksumType::Crc32c => crate::crc::crc32c_oneshot(rec),
                ChecksumType::Crc16c => crate::crc::crc16c_oneshot(rec) as u32,
            };
            self.crcs.extend_from_slice(&v.to_le_bytes());
        }
        self.unzip += rec.len() as u64;
        self.keys.push(rec);
    }

    pub fn finish(self) -> Result<()> {
        use crate::str_vec::StrVecOps;
        let num_records = self.keys.len();
        let (dawg, word_of_seq) =
            NestLoudsTrieDawg::<crate::rank_select::RankSelectIl256>::build_from(
                self.keys,
                &self.config,
            )?;
        let idmap =
            UintVecMin0::build_from(&word_of_seq.iter().map(|&w| w as u64).collect::<Vec<_>>());
        let mut dawg_img = Vec::new();
        dawg.save(&mut dawg_img);
        let mut idmap_img = Vec::new();
        idmap.save(&mut idmap_img);

        let mut header = FileHeader::new(CLASS_NAME);
        header.checksum_level = self.checksum_level;
        header.checksum_type = self.checksum_type;
        header.num_records = num_records as u64;
        header.content_size = dawg_img.len() as u64;
        header.offset_size = idmap_img.len() as u64;
        header.unzip_size = self.unzip;

        let mut writer = StoreWriter::create(&self.path, self.offset, self.checksum_type)?;
        writer.write(&dawg_img)?;
        writer.write(&idmap_img)?;
        if self.checksum_level == ChecksumLevel::PerRecord {
            writer.write(&(self.crcs.len() as u64).to_le_bytes())?;
            writer.write(&self.crcs)?;
        }
        writer.write_data_footer(&header)?;
        writer.finish(&header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load_from_mmap;

    fn build(records: &[&[u8]]) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut b = NltStoreBuilder::new(
            NestLoudsTrieConfig::default(),
            tmp.path(),
            0,
            ChecksumLevel::HeaderOnly,
            ChecksumType::Crc32c,
        );
        for r in records {
            b.add_record(r);
        }
        b.finish().unwrap();
        tmp
    }

    #[test]
    fn unsorted_input_keeps_record_order() {
        let records: &[&[u8]] = &[b"walnut", b"apple", b"mango", b"apple", b"banana"];
        let tmp = build(records);
        let store = load_from_mmap(tmp.path(), false).unwrap();
        assert_eq!(store.num_records(), 5);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(store.get_record(i).unwrap(), *r, "record {i}");
        }
        assert_eq!(store.total_data_size(), 27);
    }

    #[test]
    fn shared_prefixes_compress() {
        let records: Vec<Vec<u8>> = (0..500)
            .map(|i| format!("/var/lib/storage/segment/{:06}/data", i % 100).into_bytes())
            .collect();
        let refs: Vec<&[u8]> = records.iter().map(|r| r.as_slice()).collect();
        let tmp = build(&refs);
        let raw: usize = records.iter().map(|r| r.len()).sum();
        let file_len = std::fs::metadata(tmp.path()).unwrap().len() as usize;
        assert!(file_len < raw, "trie image {file_len} >= raw {raw}");
        let store = load_from_mmap(tmp.path(), false).unwrap();
        for i in (0..500).step_by(41) {
            assert_eq!(store.get_record(i).unwrap(), records[i]);
        }
    }
}
