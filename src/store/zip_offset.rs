//! Raw records with a compressed offset index.
//!
//! Payload bytes are stored untouched; only the offset array is
//! delta-compressed into `SortedUintVec` blocks (unit 64 or 128). Block
//! unit 0 falls back to a plain packed array. The flags field records
//! the unit so readers pick the right decoder.

use std::path::Path;

use crate::error::{Error, Result};
use crate::int_vec::{SortedUintVec, SortedUintVecBuilder, UintVecMin0};
use crate::region::ByteRegion;

use super::header::{ChecksumLevel, ChecksumType, FileHeader, HEADER_SIZE};
use super::{record_trailer, trailer_size, verify_trailer, BlobStore, StoreWriter, ZReorderMap};

pub(crate) const CLASS_NAME: &str = "ZipOffsetBlobStore";

pub(crate) enum OffsetIndex {
    Plain(UintVecMin0),
    Blocked(SortedUintVec),
}

impl OffsetIndex {
    pub fn size(&self) -> usize {
        match self {
            OffsetIndex::Plain(v) => v.size(),
            OffsetIndex::Blocked(v) => v.size(),
        }
    }

    pub fn get2(&self, i: usize) -> [u64; 2] {
        match self {
            OffsetIndex::Plain(v) => v.get2(i),
            OffsetIndex::Blocked(v) => v.get2(i),
        }
    }

    pub fn mem_size(&self) -> usize {
        match self {
            OffsetIndex::Plain(v) => v.mem_size(),
            OffsetIndex::Blocked(v) => v.mem_size(),
        }
    }

    pub fn build(offsets: &[u64], block_units: usize) -> Result<Vec<u8>> {
        let mut img = Vec::new();
        match block_units {
            0 => UintVecMin0::build_from(offsets).save(&mut img),
            64 | 128 => {
                let mut b = SortedUintVecBuilder::new(block_units)?;
                for &o in offsets {
                    b.push(o)?;
                }
                b.finish().save(&mut img);
            }
            other => {
                return Err(Error::invalid(format!(
                    "offset block units must be 0, 64 or 128, got {other}"
                )))
            }
        }
        Ok(img)
    }

    pub fn load(region: ByteRegion, block_units: usize) -> Result<Self> {
        match block_units {
            0 => Ok(OffsetIndex::Plain(UintVecMin0::load(region)?)),
            64 | 128 => Ok(OffsetIndex::Blocked(SortedUintVec::load(region)?)),
            other => Err(Error::corrupt(format!("bad offset block units {other}"))),
        }
    }
}

/// Block-unit code stored in the low bits of the header flags.
pub(crate) fn units_to_flags(units: usize) -> u16 {
    match units {
        0 => 0,
        64 => 1,
        128 => 2,
        _ => unreachable!("validated at build"),
    }
}

pub(crate) fn flags_to_units(flags: u16) -> Result<usize> {
    match flags & 0x3 {
        0 => Ok(0),
        1 => Ok(64),
        2 => Ok(128),
        _ => Err(Error::corrupt("bad offset-unit flag")),
    }
}

pub struct ZipOffsetBlobStore {
    header: FileHeader,
    payload: ByteRegion,
    offsets: OffsetIndex,
}

impl ZipOffsetBlobStore {
    pub(crate) fn open(region: ByteRegion, header: FileHeader) -> Result<Self> {
        let content = header.content_size as usize;
        let offs = header.offset_size as usize;
        if region.len() < HEADER_SIZE + content + offs {
            return Err(Error::corrupt("zip_offset store sections truncated"));
        }
        let payload = region.slice(HEADER_SIZE, content);
        let units = flags_to_units(header.flags)?;
        let offsets = OffsetIndex::load(region.slice(HEADER_SIZE + content, offs), units)?;
        if offsets.size() != header.num_records as usize + 1 {
            return Err(Error::corrupt("zip_offset store: offset count mismatch"));
        }
        Ok(ZipOffsetBlobStore {
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

impl BlobStore for ZipOffsetBlobStore {
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
        let units = flags_to_units(self.header.flags)?;
        let mut payload: Vec<u8> = Vec::with_capacity(self.payload.len());
        let mut offsets: Vec<u64> = Vec::with_capacity(self.num_records() + 1);
        offsets.push(0);
        for old in map.iter() {
            payload.extend_from_slice(self.stored_record(old)?);
            offsets.push(payload.len() as u64);
        }
        let off_img = OffsetIndex::build(&offsets, units)?;
        let mut header = self.header.clone();
        header.content_size = payload.len() as u64;
        header.offset_size = off_img.len() as u64;
        super::reorder::emit_store(&header, &[&payload, &off_img], sink)
    }
}

/// Builder; `block_units` is 0 (plain), 64, or 128.
pub struct ZipOffsetBuilder {
    writer: StoreWriter,
    header: FileHeader,
    block_units: usize,
    offsets: Vec<u64>,
    unzip: u64,
}

impl ZipOffsetBuilder {
    pub fn new(
        block_units: usize,
        path: &Path,
        offset: u64,
        checksum_level: ChecksumLevel,
        checksum_type: ChecksumType,
    ) -> Result<Self> {
        if !matches!(block_units, 0 | 64 | 128) {
            return Err(Error::invalid(format!(
                "offset block units must be 0, 64 or 128, got {block_units}"
            )));
        }
        let mut header = FileHeader::new(CLASS_NAME);
        header.checksum_level = checksum_level;
        header.checksum_type = checksum_type;
        header.flags = units_to_flags(block_units);
        let writer = StoreWriter::create(path, offset, checksum_type)?;
        Ok(ZipOffsetBuilder {
            writer,
            header,
            block_units,
            offsets: vec![0],
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
        let off_img = OffsetIndex::build(&self.offsets, self.block_units)?;
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

    fn build(records: &[Vec<u8>], units: usize) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut b = ZipOffsetBuilder::new(
            units,
            tmp.path(),
            0,
            ChecksumLevel::HeaderOnly,
            ChecksumType::Crc32c,
        )
        .unwrap();
        for r in records {
            b.add_record(r).unwrap();
        }
        b.finish().unwrap();
        tmp
    }

    fn records(n: usize) -> Vec<Vec<u8>> {
        (0..n)
            .map(|i| format!("record-{i:04}-{}", "x".repeat(i % 37)).into_bytes())
            .collect()
    }

    #[test]
    fn roundtrip_each_block_unit() {
        for units in [0usize, 64, 128] {
            let recs = records(300);
            let tmp = build(&recs, units);
            let store = load_from_mmap(tmp.path(), false).unwrap();
            assert_eq!(store.num_records(), 300, "units {units}");
            for (i, r) in recs.iter().enumerate() {
                assert_eq!(store.get_record(i).unwrap(), *r, "units {units} rec {i}");
            }
        }
    }

    #[test]
    fn rejects_bad_units() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let r = ZipOffsetBuilder::new(
            96,
            tmp.path(),
            0,
            ChecksumLevel::None,
            ChecksumType::Crc32c,
        );
        assert!(matches!(r, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn blocked_offsets_are_smaller_than_plain() {
        let recs = records(2000);
        let plain = build(&recs, 0);
        let blocked = build(&recs, 128);
        let plain_len = std::fs::metadata(plain.path()).unwrap().len();
        let blocked_len = std::fs::metadata(blocked.path()).unwrap().len();
        assert!(
            blocked_len < plain_len,
            "blocked {blocked_len} >= plain {plain_len}"
        );
    }
}
