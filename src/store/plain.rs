//! Uncompressed record store.
//!
//! Records live back-to-back in the payload; a bit-packed array of
//! `num_records + 1` byte offsets bounds each one. The baseline variant,
//! and the reference point for every compressed store's tests.

use std::path::Path;

use crate::error::{Error, Result};
use crate::int_vec::UintVecMin0;
use crate::region::ByteRegion;

use super::header::{ChecksumLevel, ChecksumType, FileHeader, HEADER_SIZE};
use super::{record_trailer, trailer_size, verify_trailer, BlobStore, StoreWriter, ZReorderMap};

pub(crate) const CLASS_NAME: &str = "PlainBlobStore";

pub struct PlainBlobStore {
    header: FileHeader,
    payload: ByteRegion,
    offsets: UintVecMin0,
}

impl PlainBlobStore {
    pub(crate) fn open(region: ByteRegion, header: FileHeader) -> Result<Self> {
        let content = header.content_size as usize;
        let offs = header.offset_size as usize;
        if region.len() < HEADER_SIZE + content + offs {
            return Err(Error::corrupt("plain store sections truncated"));
        }
        let payload = region.slice(HEADER_SIZE, content);
        let offsets = UintVecMin0::load(region.slice(HEADER_SIZE + content, offs))?;
        if offsets.size() != header.num_records as usize + 1 {
            return Err(Error::corrupt("plain store: offset count mismatch"));
        }
        if offsets.get(offsets.size() - 1) != header.content_size {
            return Err(Error::corrupt("plain store: final offset != content size"));
        }
        Ok(PlainBlobStore {
            header,
            payload,
            offsets,
        })
    }

    fn stored_record(&self, id: usize) -> Result<&[u8]> {
        if id >= self.header.num_records as usize {
            return Err(Error::invalid(format!(
                "record id {id} out of {}",
                self.header.num_records
            )));
        }
        let [lo, hi] = self.offsets.get2(id);
        Ok(&self.payload.as_slice()[lo as usize..hi as usize])
    }
}

impl BlobStore for PlainBlobStore {
    fn num_records(&self) -> usize {
        self.header.num_records as usize
    }

    fn total_data_size(&self) -> u64 {
        self.header.unzip_size
    }

    fn mem_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + self.offsets.mem_size()
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
        // stored record bytes (trailers included) move verbatim
        let mut payload: Vec<u8> = Vec::with_capacity(self.payload.len());
        let mut offsets: Vec<u64> = Vec::with_capacity(self.num_records() + 1);
        offsets.push(0);
        for old in map.iter() {
            payload.extend_from_slice(self.stored_record(old)?);
            offsets.push(payload.len() as u64);
        }
        let off_img = {
            let mut v = Vec::new();
            UintVecMin0::build_from(&offsets).save(&mut v);
            v
        };
        let mut header = self.header.clone();
        header.content_size = payload.len() as u64;
        header.offset_size = off_img.len() as u64;
        super::reorder::emit_store(&header, &[&payload, &off_img], sink)
    }
}

/// Append-only builder; `total_size`/`num_records` are capacity hints.
pub struct PlainBlobStoreBuilder {
    writer: StoreWriter,
    header: FileHeader,
    offsets: Vec<u64>,
    unzip: u64,
}

impl PlainBlobStoreBuilder {
    pub fn new(
        _total_size: u64,
        num_records: usize,
        path: &Path,
        offset: u64,
        checksum_level: ChecksumLevel,
        checksum_type: ChecksumType,
    ) -> Result<Self> {
        let mut header = FileHeader::new(CLASS_NAME);
        header.checksum_level = checksum_level;
        header.checksum_type = checksum_type;
        let writer = StoreWriter::create(path, offset, checksum_type)?;
        let mut offsets = Vec::with_capacity(num_records + 1);
        offsets.push(0);
        Ok(PlainBlobStoreBuilder {
            writer,
            header,
            offsets,
            unzip: 0,
        })
    }

    pub fn add_record(&mut self, rec: &[u8]) -> Result<()> {
        self.writer.write(rec)?;
        if trailer_size(self.header.checksum_level) != 0 {
            self.writer
                .write(&record_trailer(self.header.checksum_type, rec))?;
        }
        self.offsets.push(self.writer.written());
        self.unzip += rec.len() as u64;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        let content_size = self.writer.written();
        let mut off_img = Vec::new();
        UintVecMin0::build_from(&self.offsets).save(&mut off_img);
        self.writer.write(&off_img)?;
        self.header.num_records = (self.offsets.len() - 1) as u64;
        self.header.content_size = content_size;
        self.header.offset_size = off_img.len() as u64;
        self.header.unzip_size = self.unzip;
        self.writer.write_data_footer(&self.header)?;
        self.writer.finish(&self.header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load_from_mmap;

    fn build(records: &[&[u8]], level: ChecksumLevel) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut b = PlainBlobStoreBuilder::new(
            0,
            records.len(),
            tmp.path(),
            0,
            level,
            ChecksumType::Crc32c,
        )
        .unwrap();
        for r in records {
            b.add_record(r).unwrap();
        }
        b.finish().unwrap();
        tmp
    }

    #[test]
    fn roundtrip_all_records() {
        let records: &[&[u8]] = &[b"alpha", b"", b"gamma-long-record", b"d"];
        let tmp = build(records, ChecksumLevel::HeaderOnly);
        let store = load_from_mmap(tmp.path(), false).unwrap();
        assert_eq!(store.num_records(), 4);
        assert_eq!(store.total_data_size(), 23);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(store.get_record(i).unwrap(), *r, "record {i}");
        }
        assert!(store.get_record(4).is_err());
    }

    #[test]
    fn per_record_crc_detects_corruption() {
        let records: &[&[u8]] = &[b"first-record", b"second-record"];
        let tmp = build(records, ChecksumLevel::PerRecord);
        // corrupt a payload byte of record 0
        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes[HEADER_SIZE + 3] ^= 0xFF;
        std::fs::write(tmp.path(), &bytes).unwrap();
        let store = load_from_mmap(tmp.path(), false).unwrap();
        let err = store.get_record(0).unwrap_err();
        assert!(err.is_bad_checksum());
        // the other record is still fine
        assert_eq!(store.get_record(1).unwrap(), b"second-record");
    }

    #[test]
    fn whole_data_level_verifies_at_open() {
        let records: &[&[u8]] = &[b"aaaa", b"bbbb"];
        let tmp = build(records, ChecksumLevel::WholeData);
        assert!(load_from_mmap(tmp.path(), false).is_ok());
        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes[HEADER_SIZE + 1] ^= 1;
        std::fs::write(tmp.path(), &bytes).unwrap();
        let err = match load_from_mmap(tmp.path(), false) {
            Err(e) => e,
            Ok(_) => panic!("expected load_from_mmap to fail"),
        };
        assert!(err.is_bad_checksum());
    }

    #[test]
    fn build_at_nonzero_offset() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), vec![0xEEu8; 512]).unwrap();
        let mut b = PlainBlobStoreBuilder::new(
            0,
            1,
            tmp.path(),
            512,
            ChecksumLevel::HeaderOnly,
            ChecksumType::Crc32c,
        )
        .unwrap();
        b.add_record(b"shifted").unwrap();
        b.finish().unwrap();
        let bytes = std::fs::read(tmp.path()).unwrap();
        // prefix untouched, store parses from offset 512
        assert!(bytes[..512].iter().all(|&b| b == 0xEE));
        let region = ByteRegion::from_vec(bytes[512..].to_vec());
        let store = crate::store::load_user_mem(region).unwrap();
        assert_eq!(store.get_record(0).unwrap(), b"shifted");
    }
}
