//! Order-1 entropy-coded record store.
//!
//! The payload is one continuous Huffman bitstream over all records;
//! each record's exact start bit lives in the offset index, so random
//! access decodes from its own bit offset until the next record's
//! boundary. The 64 KB code-length matrix rides in its own section.
//!
//! At checksum level 2 a per-record CRC side array (over the decoded
//! bytes) is kept: the stream itself is bit-packed, so trailers cannot
//! sit inline.

use std::path::Path;

use crate::error::{Error, Result};
use crate::region::ByteRegion;

use super::entropy::{BitReader, BitWriter, FreqHistO1, HuffmanO1Decoder, HuffmanO1Encoder};
use super::header::{ChecksumLevel, ChecksumType, FileHeader, HEADER_SIZE};
use super::zip_offset::{flags_to_units, units_to_flags, OffsetIndex};
use super::{BlobStore, StoreWriter, ZReorderMap};

pub(crate) const CLASS_NAME: &str = "EntropyZipBlobStore";

pub struct EntropyZipBlobStore {
    header: FileHeader,
    stream: ByteRegion,
    offsets: OffsetIndex,
    decoder: HuffmanO1Decoder,
    table: ByteRegion,
    record_crc: Option<ByteRegion>,
}

impl EntropyZipBlobStore {
    pub(crate) fn open(region: ByteRegion, header: FileHeader) -> Result<Self> {
        let content = header.content_size as usize;
        let offs = header.offset_size as usize;
        if region.len() < HEADER_SIZE + content + offs + 8 {
            return Err(Error::corrupt("entropy store sections truncated"));
        }
        let stream = region.slice(HEADER_SIZE, content);
        let units = flags_to_units(header.flags)?;
        let offsets = OffsetIndex::load(region.slice(HEADER_SIZE + content, offs), units)?;
        if offsets.size() != header.num_records as usize + 1 {
            return Err(Error::corrupt("entropy store: offset count mismatch"));
        }
        let mut pos = HEADER_SIZE + content + offs;
        let table_len = region.read_u64(pos) as usize;
        pos += 8;
        if table_len != 256 * 256 || region.len() < pos + table_len {
            return Err(Error::corrupt("entropy store: table section malformed"));
        }
        let table = region.slice(pos, table_len);
        pos += table_len;
        let decoder = HuffmanO1Decoder::from_lengths(table.as_slice())?;
        let record_crc = if header.checksum_level == ChecksumLevel::PerRecord {
            if region.len() < pos + 8 {
                return Err(Error::corrupt("entropy store: crc section missing"));
            }
            let crc_len = region.read_u64(pos) as usize;
            pos += 8;
            if crc_len != header.num_records as usize * 4 || region.len() < pos + crc_len {
                return Err(Error::corrupt("entropy store: crc section malformed"));
            }
            Some(region.slice(pos, crc_len))
        } else {
            None
        };
        Ok(EntropyZipBlobStore {
            header,
            stream,
            offsets,
            decoder,
            table,
            record_crc,
        })
    }

    fn check_id(&self, id: usize) -> Result<()> {
        if id >= self.header.num_records as usize {
            return Err(Error::invalid(format!(
                "record id {id} out of {}",
                self.header.num_records
            )));
        }
        Ok(())
    }
}

impl BlobStore for EntropyZipBlobStore {
    fn num_records(&self) -> usize {
        self.header.num_records as usize
    }

    fn total_data_size(&self) -> u64 {
        self.header.unzip_size
    }

    fn mem_size(&self) -> usize {
        HEADER_SIZE
            + self.stream.len()
            + self.offsets.mem_size()
            + self.table.len()
            + self.record_crc.as_ref().map_or(0, |r| r.len())
    }

    fn get_record_append(&self, id: usize, out: &mut Vec<u8>) -> Result<()> {
        self.check_id(id)?;
        let [start, end] = self.offsets.get2(id);
        let mut r = BitReader::new(self.stream.as_slice());
        r.set_pos(start as usize);
        let before = out.len();
        self.decoder.decode_record(&mut r, end as usize, out)?;
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
        // repack each record's exact bit span at its new offset
        let mut w = BitWriter::new();
        let mut bounds: Vec<u64> = vec![0];
        let mut crcs: Vec<u8> = Vec::new();
        for old in map.iter() {
            let [start, end] = self.offsets.get2(old);
            w.copy_bits(
                self.stream.as_slice(),
                start as usize,
                (end - start) as usize,
            );
            bounds.push(w.bit_len() as u64);
            if let Some(arr) = &self.record_crc {
                crcs.extend_from_slice(&arr.as_slice()[old * 4..old * 4 + 4]);
            }
        }
        let stream = w.finish();
        let units = flags_to_units(self.header.flags)?;
        let off_img = OffsetIndex::build(&bounds, units)?;
        let mut table_sec = Vec::with_capacity(8 + self.table.len());
        table_sec.extend_from_slice(&(self.table.len() as u64).to_le_bytes());
        table_sec.extend_from_slice(self.table.as_slice());
        let mut crc_sec = Vec::new();
        if self.record_crc.is_some() {
            crc_sec.extend_from_slice(&(crcs.len() as u64).to_le_bytes());
            crc_sec.extend_from_slice(&crcs);
        }
        let mut header = self.header.clone();
        header.content_size = stream.len() as u64;
        header.offset_size = off_img.len() as u64;
        super::reorder::emit_store(&header, &[&stream, &off_img, &table_sec, &crc_sec], sink)
    }
}

/// Builder; needs the finished order-1 histogram of the whole corpus.
pub struct EntropyZipBuilder {
    writer: StoreWriter,
    header: FileHeader,
    block_units: usize,
    encoder: HuffmanO1Encoder,
    bits: BitWriter,
    bounds: Vec<u64>,
    crcs: Vec<u8>,
    unzip: u64,
}

impl EntropyZipBuilder {
    pub fn new(
        hist: &FreqHistO1,
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
        Ok(EntropyZipBuilder {
            writer,
            header,
            block_units,
            encoder: HuffmanO1Encoder::from_hist(hist),
            bits: BitWriter::new(),
            bounds: vec![0],
            crcs: Vec::new(),
            unzip: 0,
        })
    }

    pub fn add_record(&mut self, rec: &[u8]) -> Result<()> {
        self.encoder.encode_record(rec, &mut self.bits)?;
        self.bounds.push(self.bits.bit_len() as u64);
        if self.header.checksum_level == ChecksumLevel::PerRecord {
            let v = match self.header.checksum_type {
                ChecksumType::Crc32c => crate::crc::crc32c_oneshot(rec),
                ChecksumType::Crc16c => crate::crc::crc16c_oneshot(rec) as u32,
            };
            self.crcs.extend_from_slice(&v.to_le_bytes());
        }
        self.unzip += rec.len() as u64;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        let stream = std::mem::take(&mut self.bits).finish();
        self.writer.write(&stream)?;
        let content_size = self.writer.written();
        let off_img = OffsetIndex::build(&self.bounds, self.block_units)?;
        self.writer.write(&off_img)?;
        let table = self.encoder.lengths_table();
        self.writer.write(&(table.len() as u64).to_le_bytes())?;
        self.writer.write(table)?;
        if self.header.checksum_level == ChecksumLevel::PerRecord {
            self.writer.write(&(self.crcs.len() as u64).to_le_bytes())?;
            self.writer.write(&self.crcs)?;
        }
        self.header.num_records = (self.bounds.len() - 1) as u64;
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

    fn corpus() -> Vec<Vec<u8>> {
        (0..150usize)
            .map(|i| {
                format!(
                    "user:{:04} city:{} tags:{}",
                    i,
                    ["amsterdam", "berlin", "chicago"][i % 3],
                    "shared-tag,".repeat(i % 5)
                )
                .into_bytes()
            })
            .collect()
    }

    fn build(records: &[Vec<u8>], level: ChecksumLevel) -> tempfile::NamedTempFile {
        let mut hist = FreqHistO1::new();
        for r in records {
            hist.add_record(r);
        }
        hist.finish();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut b = EntropyZipBuilder::new(
            &hist,
            128,
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
        let recs = corpus();
        let tmp = build(&recs, ChecksumLevel::HeaderOnly);
        let store = load_from_mmap(tmp.path(), false).unwrap();
        assert_eq!(store.num_records(), recs.len());
        assert_eq!(
            store.total_data_size(),
            recs.iter().map(|r| r.len() as u64).sum::<u64>()
        );
        for (i, r) in recs.iter().enumerate() {
            assert_eq!(store.get_record(i).unwrap(), *r, "record {i}");
        }
    }

    #[test]
    fn compresses_redundant_text() {
        let recs = corpus();
        let raw: usize = recs.iter().map(|r| r.len()).sum();
        let tmp = build(&recs, ChecksumLevel::HeaderOnly);
        let header = FileHeader::decode(&std::fs::read(tmp.path()).unwrap()).unwrap();
        assert!(
            (header.content_size as usize) < raw,
            "stream {} >= raw {raw}",
            header.content_size
        );
    }

    #[test]
    fn per_record_crc_detects_payload_damage() {
        let recs = corpus();
        let tmp = build(&recs, ChecksumLevel::PerRecord);
        let store = load_from_mmap(tmp.path(), false).unwrap();
        assert_eq!(store.get_record(7).unwrap(), recs[7]);
        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes[HEADER_SIZE + 40] ^= 0x55;
        std::fs::write(tmp.path(), &bytes).unwrap();
        let store = load_from_mmap(tmp.path(), false).unwrap();
        // some record over the damaged span must fail
        let mut saw_error = false;
        for i in 0..store.num_records() {
            if store.get_record(i).is_err() {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error, "corruption went unnoticed");
    }
}
