//! Record-addressable blob stores.
//!
//! A blob store maps dense integer ids to immutable byte records inside
//! one memory-mappable artifact. Every variant shares the 128-byte
//! header ([`header::FileHeader`]), the checksum discipline, and the
//! [`BlobStore`] trait; they differ in how records and offsets are
//! encoded:
//!
//! | class | payload |
//! |---|---|
//! | [`PlainBlobStore`] | raw records + packed offset array |
//! | [`MixedLenBlobStore`] | fixed-length slab + variable section + routing bitvector |
//! | [`ZipOffsetBlobStore`] | raw records + delta-compressed offsets |
//! | [`EntropyZipBlobStore`] | order-1 Huffman stream + bit offsets |
//! | [`DictZipBlobStore`] | LZ dictionary compression + bit offsets |
//! | [`NestLoudsTrieBlobStore`] | keys stored as a nested LOUDS trie |

pub mod dict_zip;
pub mod entropy;
mod entropy_zip;
pub mod header;
mod match_finder;
mod mixed_len;
mod nlt_store;
mod plain;
mod reorder;
mod zip_offset;

pub use dict_zip::{DictZipBlobStore, DictZipBuilder, DictZipOptions, EntropyAlgo, FinishFlags};
pub use entropy_zip::{EntropyZipBlobStore, EntropyZipBuilder};
pub use header::{ChecksumLevel, ChecksumType, FileHeader};
pub use mixed_len::{MixedLenBlobStore, MixedLenBuilder};
pub use nlt_store::{NestLoudsTrieBlobStore, NltStoreBuilder};
pub use plain::{PlainBlobStore, PlainBlobStoreBuilder};
pub use reorder::ZReorderMap;
pub use zip_offset::{ZipOffsetBlobStore, ZipOffsetBuilder};

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::crc::{crc16c_oneshot, crc32c_oneshot, crc32c_update};
use crate::error::{Error, Result};
use crate::mmap::MmapWholeFile;
use crate::region::ByteRegion;

use header::HEADER_SIZE;

/// Common read surface of every store variant.
pub trait BlobStore: Send + Sync {
    fn num_records(&self) -> usize;

    /// Total uncompressed record bytes (`unzip_size`).
    fn total_data_size(&self) -> u64;

    /// Resident bytes of the loaded store.
    fn mem_size(&self) -> usize;

    /// Append record `id` to `out` (avoids per-call allocation).
    fn get_record_append(&self, id: usize, out: &mut Vec<u8>) -> Result<()>;

    fn get_record(&self, id: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.get_record_append(id, &mut out)?;
        Ok(out)
    }

    /// The shared dictionary, if the variant has one.
    fn get_dict(&self) -> &[u8] {
        &[]
    }

    /// Emit a permuted copy of this store. `map` yields old record ids in
    /// new order; the rebuilt image is streamed to `sink` in chunks.
    /// `tmp` is a scratch path hint for variants that need one.
    fn reorder_zip_data(
        &self,
        map: &ZReorderMap,
        sink: &mut dyn FnMut(&[u8]) -> Result<()>,
        tmp: Option<&Path>,
    ) -> Result<()>;
}

/// Open a store file, dispatching on the header's class name.
pub fn load_from_mmap(path: &Path, populate: bool) -> Result<Box<dyn BlobStore>> {
    let mm = MmapWholeFile::open(path, populate)?;
    load_dispatch(mm.region(), Some(path))
}

/// Borrow a store from caller-provided bytes (no file, no dictionary
/// sidecar resolution).
pub fn load_user_mem(region: ByteRegion) -> Result<Box<dyn BlobStore>> {
    load_dispatch(region, None)
}

fn load_dispatch(region: ByteRegion, path: Option<&Path>) -> Result<Box<dyn BlobStore>> {
    let header = FileHeader::decode(region.as_slice())?;
    verify_whole_data(&region, &header)?;
    match header.class_name.as_str() {
        plain::CLASS_NAME => Ok(Box::new(PlainBlobStore::open(region, header)?)),
        mixed_len::CLASS_NAME => Ok(Box::new(MixedLenBlobStore::open(region, header)?)),
        zip_offset::CLASS_NAME => Ok(Box::new(ZipOffsetBlobStore::open(region, header)?)),
        entropy_zip::CLASS_NAME => Ok(Box::new(EntropyZipBlobStore::open(region, header)?)),
        dict_zip::CLASS_NAME => Ok(Box::new(DictZipBlobStore::open(region, header, path)?)),
        nlt_store::CLASS_NAME => Ok(Box::new(NestLoudsTrieBlobStore::open(region, header)?)),
        other => Err(Error::corrupt(format!("unknown store class {other:?}"))),
    }
}

/// Level-3 verification: one CRC over everything between the header and
/// the 8-byte footer.
fn verify_whole_data(region: &ByteRegion, header: &FileHeader) -> Result<()> {
    if header.checksum_level != ChecksumLevel::WholeData {
        return Ok(());
    }
    if region.len() < HEADER_SIZE + 8 {
        return Err(Error::corrupt("file too small for whole-data footer"));
    }
    let body = &region.as_slice()[HEADER_SIZE..region.len() - 8];
    let stored = region.read_u32(region.len() - 8);
    match header.checksum_type {
        ChecksumType::Crc32c => crate::crc::verify_crc32c("data region", body, stored),
        ChecksumType::Crc16c => {
            crate::crc::verify_crc16c("data region", body, stored as u16)
        }
    }
}

// ── shared record-trailer helpers ───────────────────────────────────────

/// Stored-record trailer bytes at the given checksum level.
pub(crate) fn trailer_size(level: ChecksumLevel) -> usize {
    if level == ChecksumLevel::PerRecord {
        4
    } else {
        0
    }
}

/// The 4-byte record trailer (CRC16 values are zero-extended).
pub(crate) fn record_trailer(ty: ChecksumType, bytes: &[u8]) -> [u8; 4] {
    let v = match ty {
        ChecksumType::Crc32c => crc32c_oneshot(bytes),
        ChecksumType::Crc16c => crc16c_oneshot(bytes) as u32,
    };
    v.to_le_bytes()
}

/// Split a stored record into content + verified trailer.
pub(crate) fn verify_trailer<'a>(
    ty: ChecksumType,
    level: ChecksumLevel,
    stored: &'a [u8],
) -> Result<&'a [u8]> {
    if level != ChecksumLevel::PerRecord {
        return Ok(stored);
    }
    if stored.len() < 4 {
        return Err(Error::corrupt("record shorter than its checksum trailer"));
    }
    let (content, tail) = stored.split_at(stored.len() - 4);
    let stored_crc = u32::from_le_bytes(tail.try_into().unwrap());
    match ty {
        ChecksumType::Crc32c => crate::crc::verify_crc32c("record", content, stored_crc)?,
        ChecksumType::Crc16c => {
            crate::crc::verify_crc16c("record", content, stored_crc as u16)?
        }
    }
    Ok(content)
}

// ── builder-side file writer ────────────────────────────────────────────

/// Streams a store file: placeholder header, sections, then the real
/// header and an fsync. Tracks the running whole-data CRC so level 3
/// costs no second pass.
pub(crate) struct StoreWriter {
    file: File,
    path: PathBuf,
    base: u64,
    written: u64,
    crc32: u32,
    crc16_buf: Option<Vec<u8>>,
}

impl StoreWriter {
    pub fn create(path: &Path, offset: u64, checksum_type: ChecksumType) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(offset == 0)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| Error::io(path, e))?;
        file.write_all(&[0u8; HEADER_SIZE])
            .map_err(|e| Error::io(path, e))?;
        // CRC16 has no cheap incremental form in the pinned instance;
        // buffer only when that type is selected
        let crc16_buf = match checksum_type {
            ChecksumType::Crc16c => Some(Vec::new()),
            ChecksumType::Crc32c => None,
        };
        Ok(StoreWriter {
            file,
            path: path.to_path_buf(),
            base: offset,
            written: 0,
            crc32: 0,
            crc16_buf,
        })
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .map_err(|e| Error::io(&self.path, e))?;
        self.crc32 = crc32c_update(self.crc32, bytes);
        if let Some(buf) = &mut self.crc16_buf {
            buf.extend_from_slice(bytes);
        }
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Bytes written after the header so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append the level-3 footer if the header asks for one.
    pub fn write_data_footer(&mut self, header: &FileHeader) -> Result<()> {
        if header.checksum_level != ChecksumLevel::WholeData {
            return Ok(());
        }
        let v = match header.checksum_type {
            ChecksumType::Crc32c => self.crc32,
            ChecksumType::Crc16c => {
                crc16c_oneshot(self.crc16_buf.as_deref().unwrap_or(&[])) as u32
            }
        };
        let mut footer = [0u8; 8];
        footer[..4].copy_from_slice(&v.to_le_bytes());
        self.file
            .write_all(&footer)
            .map_err(|e| Error::io(&self.path, e))?;
        self.written += 8;
        Ok(())
    }

    /// Seek back, write the final header, fsync.
    pub fn finish(mut self, header: &FileHeader) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.base))
            .map_err(|e| Error::io(&self.path, e))?;
        self.file
            .write_all(&header.encode())
            .map_err(|e| Error::io(&self.path, e))?;
        self.file.sync_all().map_err(|e| Error::io(&self.path, e))
    }
}
