//! Dictionary-compressed record store.
//!
//! Records are LZ-coded against one shared dictionary built from a
//! sampled slice of the corpus, which keeps random access O(record):
//! decompression copies from the dictionary, never from other records.
//!
//! Builder lifecycle (two passes over the input):
//!
//! 1. `add_sample` / `add_sample_record`: collect up to ~100 MB of
//!    sample bytes (the latter draws records with a fixed-seed Bernoulli
//!    sampler).
//! 2. `finish_sample`: freeze the dictionary and build the match index
//!    (suffix array or hash chains).
//! 3. `prepare(num_records, path)`: open the output file.
//! 4. `add_record`: greedy longest-match encoding.
//! 5. `finish(flags)`: offsets, dictionary (embedded or `-dict`
//!    sidecar), final header, fsync.
//!
//! The op stream uses the new reference encoding:
//!
//! ```text
//! 0xxxxxxx                      literal run of x+1 bytes, bytes follow
//! 1cclllll off[cc+1] (varint)   match: cc+1 offset bytes little-endian;
//!                               lllll < 31: len = min_match + lllll
//!                               lllll = 31: len = min_match + 31 + varint
//! ```
//!
//! A mis-ordered builder call poisons the builder: every later call
//! fails with the same `InvalidArgument` shape.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::mmap::MmapWholeFile;
use crate::region::ByteRegion;

use super::entropy::{BitReader, BitWriter, FreqHistO1, HuffmanO1Decoder, HuffmanO1Encoder};
use super::header::{ChecksumLevel, ChecksumType, FileHeader, HEADER_SIZE};
use super::match_finder::MatchFinder;
use super::zip_offset::{flags_to_units, units_to_flags, OffsetIndex};
use super::{record_trailer, trailer_size, verify_trailer, BlobStore, StoreWriter, ZReorderMap};

pub(crate) const CLASS_NAME: &str = "DictZipBlobStore";
const DICT_CLASS_NAME: &str = "DictZipDict";

/// Sample accumulation cap.
const SAMPLE_CAP: usize = 100 << 20;

/// Fixed sampler seed: builds are reproducible run to run.
const SAMPLE_SEED: u64 = 0x1F2E_3D4C_5B6A_7988;

const FLAG_ENTROPY: u16 = 1 << 2;
const FLAG_EMBED_DICT: u16 = 1 << 3;
const FLAG_NEW_REF: u16 = 1 << 5;
const FLAG_SA_FINDER: u16 = 1 << 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntropyAlgo {
    None,
    HuffmanO1,
}

#[derive(Clone, Debug)]
pub struct DictZipOptions {
    pub checksum_level: ChecksumLevel,
    pub checksum_type: ChecksumType,
    /// 0 (plain), 64, or 128.
    pub offset_block_units: usize,
    pub entropy_algo: EntropyAlgo,
    /// Bernoulli inclusion probability for `add_sample_record`.
    pub sample_ratio: f64,
    pub min_match_len: usize,
    /// Hash-chain probe bound (hash finder only).
    pub max_probe: usize,
    /// Suffix-array finder when true, hash chains otherwise.
    pub use_suffix_array: bool,
    /// Dictionary stored inside the main file instead of a sidecar.
    pub embedded_dict: bool,
    /// Accepted for config compatibility; the dictionary is stored raw.
    pub compress_global_dict: bool,
    /// Accepted for config compatibility; only the new encoding is
    /// emitted.
    pub use_new_ref_encoding: bool,
}

impl Default for DictZipOptions {
    fn default() -> Self {
        DictZipOptions {
            checksum_level: ChecksumLevel::HeaderOnly,
            checksum_type: ChecksumType::Crc32c,
            offset_block_units: 128,
            entropy_algo: EntropyAlgo::None,
            sample_ratio: 0.03,
            min_match_len: 6,
            max_probe: 32,
            use_suffix_array: true,
            embedded_dict: false,
            compress_global_dict: false,
            use_new_ref_encoding: true,
        }
    }
}

/// `finish` behavior bits; combine with `|`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinishFlags(pub u32);

impl FinishFlags {
    pub const NONE: FinishFlags = FinishFlags(0);
    pub const FREE_DICT: FinishFlags = FinishFlags(1);
    pub const WRITE_DICT_FILE: FinishFlags = FinishFlags(2);

    pub fn contains(self, other: FinishFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for FinishFlags {
    type Output = FinishFlags;
    fn bitor(self, rhs: FinishFlags) -> FinishFlags {
        FinishFlags(self.0 | rhs.0)
    }
}

// ── op-stream codec ─────────────────────────────────────────────────────

fn emit_literals(lit: &[u8], out: &mut Vec<u8>) {
    for chunk in lit.chunks(128) {
        out.push((chunk.len() - 1) as u8);
        out.extend_from_slice(chunk);
    }
}

fn emit_match(off: usize, len: usize, min_match: usize, out: &mut Vec<u8>) {
    debug_assert!(len >= min_match);
    let off_bytes = match off {
        0..=0xFF => 1usize,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    };
    let len_code = (len - min_match).min(31);
    out.push(0x80 | ((off_bytes as u8 - 1) << 5) | len_code as u8);
    out.extend_from_slice(&(off as u32).to_le_bytes()[..off_bytes]);
    if len_code == 31 {
        write_varint((len - min_match - 31) as u64, out);
    }
}

fn write_varint(mut v: u64, out: &mut Vec<u8>) {
    loop {
        let b = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(b);
            return;
        }
        out.push(b | 0x80);
    }
}

fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64> {
    let mut v = 0u64;
    let mut shift = 0u32;
    loop {
        let b = *data
            .get(*pos)
            .ok_or_else(|| Error::corrupt("dict_zip: varint truncated"))?;
        *pos += 1;
        v |= u64::from(b & 0x7F) << shift;
        if b & 0x80 == 0 {
            return Ok(v);
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::corrupt("dict_zip: varint too long"));
        }
    }
}

fn compress_record(
    rec: &[u8],
    dict: &[u8],
    finder: &MatchFinder,
    min_match: usize,
    out: &mut Vec<u8>,
) {
    let mut i = 0usize;
    let mut lit_start = 0usize;
    while i < rec.len() {
        if rec.len() - i >= min_match {
            if let Some((off, len)) = finder.longest_match(dict, &rec[i..], min_match) {
                emit_literals(&rec[lit_start..i], out);
                emit_match(off, len, min_match, out);
                i += len;
                lit_start = i;
                continue;
            }
        }
        i += 1;
    }
    emit_literals(&rec[lit_start..], out);
}

fn decompress_record(ops: &[u8], dict: &[u8], min_match: usize, out: &mut Vec<u8>) -> Result<()> {
    let mut pos = 0usize;
    while pos < ops.len() {
        let b0 = ops[pos];
        pos += 1;
        if b0 & 0x80 == 0 {
            let n = b0 as usize + 1;
            let lit = ops
                .get(pos..pos + n)
                .ok_or_else(|| Error::corrupt("dict_zip: literal run truncated"))?;
            out.extend_from_slice(lit);
            pos += n;
        } else {
            let off_bytes = ((b0 >> 5) & 0x3) as usize + 1;
            let len_code = (b0 & 0x1F) as usize;
            let raw = ops
                .get(pos..pos + off_bytes)
                .ok_or_else(|| Error::corrupt("dict_zip: match offset truncated"))?;
            pos += off_bytes;
            let mut off = 0usize;
            for (k, &byte) in raw.iter().enumerate() {
                off |= (byte as usize) << (8 * k);
            }
            let len = if len_code < 31 {
                min_match + len_code
            } else {
                min_match + 31 + read_varint(ops, &mut pos)? as usize
            };
            let src = dict
                .get(off..off + len)
                .ok_or_else(|| Error::corrupt("dict_zip: match outside dictionary"))?;
            out.extend_from_slice(src);
        }
    }
    Ok(())
}

// ── builder ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Debug)]
enum Phase {
    Sampling,
    SampleDone,
    Prepared,
    Finished,
    Poisoned,
}

pub struct DictZipBuilder {
    opt: DictZipOptions,
    phase: Phase,
    rng: StdRng,
    sample: Vec<u8>,
    dict: Vec<u8>,
    finder: Option<MatchFinder>,
    writer: Option<StoreWriter>,
    path: Option<PathBuf>,
    declared_records: u64,
    records_added: u64,
    /// record bit boundaries into the payload
    bounds: Vec<u64>,
    // entropy mode: op streams buffered until finish
    op_buf: Vec<u8>,
    op_bounds: Vec<usize>,
    hist: FreqHistO1,
    side_crcs: Vec<u8>,
    scratch: Vec<u8>,
    unzip: u64,
}

impl DictZipBuilder {
    fn expect_phase(&mut self, want: Phase, what: &str) -> Result<()> {
        if self.phase != want {
            let was = self.phase;
            self.phase = Phase::Poisoned;
            return Err(Error::invalid(format!(
                "dict_zip builder: {what} called in phase {was:?}"
            )));
        }
        Ok(())
    }

    /// Feed raw sample bytes (caller-side sampling).
    pub fn add_sample(&mut self, bytes: &[u8]) -> Result<()> {
        self.expect_phase(Phase::Sampling, "add_sample")?;
        let room = SAMPLE_CAP.saturating_sub(self.sample.len());
        let take = bytes.len().min(room);
        self.sample.extend_from_slice(&bytes[..take]);
        Ok(())
    }

    /// Bernoulli record sampling at `opt.sample_ratio`; returns whether
    /// the record was taken.
    pub fn add_sample_record(&mut self, rec: &[u8]) -> Result<bool> {
        self.expect_phase(Phase::Sampling, "add_sample_record")?;
        if self.rng.gen::<f64>() < self.opt.sample_ratio {
            self.add_sample(rec)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Freeze the dictionary and build the match index.
    pub fn finish_sample(&mut self) -> Result<()> {
        self.expect_phase(Phase::Sampling, "finish_sample")?;
        self.dict = std::mem::take(&mut self.sample);
        self.build_finder();
        self.phase = Phase::SampleDone;
        Ok(())
    }

    /// Use `bytes` as the dictionary verbatim (the `dict:<file>` path),
    /// skipping sampling.
    pub fn use_dict(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.expect_phase(Phase::Sampling, "use_dict")?;
        self.dict = bytes;
        self.build_finder();
        self.phase = Phase::SampleDone;
        Ok(())
    }

    fn build_finder(&mut self) {
        self.finder = Some(if self.opt.use_suffix_array {
            MatchFinder::build_suffix_array(&self.dict)
        } else {
            MatchFinder::build_hash(&self.dict, self.opt.min_match_len, self.opt.max_probe)
        });
    }

    pub fn prepare(&mut self, num_records: usize, path: &Path) -> Result<()> {
        self.prepare_at(num_records, path, 0)
    }

    pub fn prepare_at(&mut self, num_records: usize, path: &Path, offset: u64) -> Result<()> {
        self.expect_phase(Phase::SampleDone, "prepare")?;
        self.writer = Some(StoreWriter::create(path, offset, self.opt.checksum_type)?);
        self.path = Some(path.to_path_buf());
        self.declared_records = num_records as u64;
        self.phase = Phase::Prepared;
        Ok(())
    }

    pub fn add_record(&mut self, rec: &[u8]) -> Result<()> {
        self.expect_phase(Phase::Prepared, "add_record")?;
        let finder = self.finder.as_ref().expect("finder built at finish_sample");
        self.scratch.clear();
        compress_record(
            rec,
            &self.dict,
            finder,
            self.opt.min_match_len,
            &mut self.scratch,
        );
        match self.opt.entropy_algo {
            EntropyAlgo::None => {
                let w = self.writer.as_mut().unwrap();
                w.write(&self.scratch)?;
                if trailer_size(self.opt.checksum_level) != 0 {
                    w.write(&record_trailer(self.opt.checksum_type, &self.scratch))?;
                }
                self.bounds.push(w.written() * 8);
            }
            EntropyAlgo::HuffmanO1 => {
                self.hist.add_record(&self.scratch);
                self.op_buf.extend_from_slice(&self.scratch);
                self.op_bounds.push(self.op_buf.len());
                if self.opt.checksum_level == ChecksumLevel::PerRecord {
                    let v = match self.opt.checksum_type {
                        ChecksumType::Crc32c => crate::crc::crc32c_oneshot(&self.scratch),
                        ChecksumType::Crc16c => {
                            crate::crc::crc16c_oneshot(&self.scratch) as u32
                        }
                    };
                    self.side_crcs.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        self.records_added += 1;
        self.unzip += rec.len() as u64;
        Ok(())
    }

    pub fn finish(mut self, flags: FinishFlags) -> Result<()> {
        self.expect_phase(Phase::Prepared, "finish")?;
        if self.records_added != self.declared_records {
            self.phase = Phase::Poisoned;
            return Err(Error::invalid(format!(
                "dict_zip builder: prepared for {} records, got {}",
                self.declared_records, self.records_added
            )));
        }
        let mut header = FileHeader::new(CLASS_NAME);
        header.checksum_level = self.opt.checksum_level;
        header.checksum_type = self.opt.checksum_type;
        header.num_records = self.records_added;
        header.unzip_size = self.unzip;
        header.flags = units_to_flags(self.opt.offset_block_units) | FLAG_NEW_REF;
        if self.opt.use_suffix_array {
            header.flags |= FLAG_SA_FINDER;
        }
        // decoders need the builder's minimum match length
        header.flags |= (self.opt.min_match_len as u16) << 8;

        let mut writer = self.writer.take().unwrap();

        // entropy pass over the buffered op streams
        let mut table: Option<Vec<u8>> = None;
        if self.opt.entropy_algo == EntropyAlgo::HuffmanO1 {
            header.flags |= FLAG_ENTROPY;
            self.hist.finish();
            let enc = HuffmanO1Encoder::from_hist(&self.hist);
            let mut w = BitWriter::new();
            let mut start = 0usize;
            for &end in &self.op_bounds {
                enc.encode_record(&self.op_buf[start..end], &mut w)?;
                self.bounds.push(w.bit_len() as u64);
                start = end;
            }
            let stream = w.finish();
            writer.write(&stream)?;
            table = Some(enc.lengths_table().to_vec());
        }
        header.content_size = writer.written();

        // offset index over bit boundaries
        let mut all_bounds = Vec::with_capacity(self.bounds.len() + 1);
        all_bounds.push(0u64);
        all_bounds.extend_from_slice(&self.bounds);
        let off_img = OffsetIndex::build(&all_bounds, self.opt.offset_block_units)?;
        writer.write(&off_img)?;
        header.offset_size = off_img.len() as u64;

        if let Some(table) = &table {
            writer.write(&(table.len() as u64).to_le_bytes())?;
            writer.write(table)?;
        }
        if self.opt.checksum_level == ChecksumLevel::PerRecord
            && self.opt.entropy_algo == EntropyAlgo::HuffmanO1
        {
            writer.write(&(self.side_crcs.len() as u64).to_le_bytes())?;
            writer.write(&self.side_crcs)?;
        }

        // dictionary: embedded or sidecar
        if self.opt.embedded_dict {
            header.flags |= FLAG_EMBED_DICT;
            header.embed_dict_offset = HEADER_SIZE as u64 + writer.written();
            header.embed_dict_size = self.dict.len() as u64;
            writer.write(&self.dict)?;
        } else {
            header.embed_dict_size = self.dict.len() as u64;
            if flags.contains(FinishFlags::WRITE_DICT_FILE) {
                self.write_dict_sidecar()?;
            }
        }

        writer.write_data_footer(&header)?;
        writer.finish(&header)?;
        if flags.contains(FinishFlags::FREE_DICT) {
            self.dict = Vec::new();
        }
        self.phase = Phase::Finished;
        Ok(())
    }

    fn write_dict_sidecar(&self) -> Result<()> {
        let main = self.path.as_ref().unwrap();
        let mut side = main.as_os_str().to_owned();
        side.push("-dict");
        let side = PathBuf::from(side);
        let mut w = StoreWriter::create(&side, 0, self.opt.checksum_type)?;
        w.write(&self.dict)?;
        let crc = crate::crc::crc32c_oneshot(&self.dict);
        let mut footer = [0u8; 8];
        footer[..4].copy_from_slice(&crc.to_le_bytes());
        w.write(&footer)?;
        let mut h = FileHeader::new(DICT_CLASS_NAME);
        h.checksum_type = self.opt.checksum_type;
        h.checksum_level = ChecksumLevel::HeaderOnly;
        h.content_size = self.dict.len() as u64;
        h.unzip_size = self.dict.len() as u64;
        w.finish(&h)
    }
}

// ── reader ──────────────────────────────────────────────────────────────

enum DictSource {
    Embedded(ByteRegion),
    Sidecar {
        _file: MmapWholeFile,
        region: ByteRegion,
    },
    Empty,
}

impl DictSource {
    fn as_slice(&self) -> &[u8] {
        match self {
            DictSource::Embedded(r) => r.as_slice(),
            DictSource::Sidecar { region, .. } => region.as_slice(),
            DictSource::Empty => &[],
        }
    }
}

pub struct DictZipBlobStore {
    header: FileHeader,
    payload: ByteRegion,
    offsets: OffsetIndex,
    dict: DictSource,
    decoder: Option<HuffmanO1Decoder>,
    table: Option<ByteRegion>,
    side_crcs: Option<ByteRegion>,
    min_match: usize,
}

impl DictZipBlobStore {
    /// Create a builder for a new store.
    pub fn create_zip_builder(opt: DictZipOptions) -> Result<DictZipBuilder> {
        if !matches!(opt.offset_block_units, 0 | 64 | 128) {
            return Err(Error::invalid(format!(
                "offset block units must be 0, 64 or 128, got {}",
                opt.offset_block_units
            )));
        }
        if !(0.0..=1.0).contains(&opt.sample_ratio) {
            return Err(Error::invalid("sample ratio must be within [0, 1]"));
        }
        if !(2..=255).contains(&opt.min_match_len) {
            return Err(Error::invalid("min match length must be in [2, 255]"));
        }
        Ok(DictZipBuilder {
            opt,
            phase: Phase::Sampling,
            rng: StdRng::seed_from_u64(SAMPLE_SEED),
            sample: Vec::new(),
            dict: Vec::new(),
            finder: None,
            writer: None,
            path: None,
            declared_records: 0,
            records_added: 0,
            bounds: Vec::new(),
            op_buf: Vec::new(),
            op_bounds: Vec::new(),
            hist: FreqHistO1::new(),
            side_crcs: Vec::new(),
            scratch: Vec::new(),
            unzip: 0,
        })
    }

    pub(crate) fn open(
        region: ByteRegion,
        header: FileHeader,
        path: Option<&Path>,
    ) -> Result<Self> {
        let content = header.content_size as usize;
        let offs = header.offset_size as usize;
        if region.len() < HEADER_SIZE + content + offs {
            return Err(Error::corrupt("dict_zip store sections truncated"));
        }
        let payload = region.slice(HEADER_SIZE, content);
        let units = flags_to_units(header.flags)?;
        let offsets = OffsetIndex::load(region.slice(HEADER_SIZE + content, offs), units)?;
        if offsets.size() != header.num_records as usize + 1 {
            return Err(Error::corrupt("dict_zip store: offset count mismatch"));
        }
        if header.flags & FLAG_NEW_REF == 0 {
            return Err(Error::corrupt(
                "dict_zip store: legacy reference encoding is not supported",
            ));
        }
        let mut pos = HEADER_SIZE + content + offs;
        let entropy = header.flags & FLAG_ENTROPY != 0;
        let (decoder, table) = if entropy {
            if region.len() < pos + 8 {
                return Err(Error::corrupt("dict_zip store: entropy table missing"));
            }
            let tlen = region.read_u64(pos) as usize;
            pos += 8;
            if tlen != 256 * 256 || region.len() < pos + tlen {
                return Err(Error::corrupt("dict_zip store: entropy table malformed"));
            }
            let t = region.slice(pos, tlen);
            pos += tlen;
            (Some(HuffmanO1Decoder::from_lengths(t.as_slice())?), Some(t))
        } else {
            (None, None)
        };
        let side_crcs = if entropy && header.checksum_level == ChecksumLevel::PerRecord {
            if region.len() < pos + 8 {
                return Err(Error::corrupt("dict_zip store: crc section missing"));
            }
            let clen = region.read_u64(pos) as usize;
            pos += 8;
            if clen != header.num_records as usize * 4 || region.len() < pos + clen {
                return Err(Error::corrupt("dict_zip store: crc section malformed"));
            }
            let c = region.slice(pos, clen);
            pos += clen;
            Some(c)
        } else {
            None
        };
        let _ = pos;
        let dict = if header.flags & FLAG_EMBED_DICT != 0 {
            let off = header.embed_dict_offset as usize;
            let len = header.embed_dict_size as usize;
            if region.len() < off + len {
                return Err(Error::corrupt("dict_zip store: embedded dict truncated"));
            }
            DictSource::Embedded(region.slice(off, len))
        } else if header.embed_dict_size == 0 {
            DictSource::Empty
        } else {
            let path = path.ok_or_else(|| {
                Error::invalid("dict_zip store with sidecar dictionary needs a file path")
            })?;
            Self::open_sidecar(path, header.embed_dict_size as usize)?
        };
        let min_match = ((header.flags >> 8) & 0xFF) as usize;
        if min_match < 2 {
            return Err(Error::corrupt("dict_zip store: bad minimum match length"));
        }
        Ok(DictZipBlobStore {
            header,
            payload,
            offsets,
            dict,
            decoder,
            table,
            side_crcs,
            min_match,
        })
    }

    fn open_sidecar(main: &Path, expect_len: usize) -> Result<DictSource> {
        let mut side = main.as_os_str().to_owned();
        side.push("-dict");
        let side = PathBuf::from(side);
        let file = MmapWholeFile::open(&side, false)?;
        let region = file.region();
        let h = FileHeader::decode(region.as_slice())?;
        if h.class_name != DICT_CLASS_NAME {
            return Err(Error::corrupt("dictionary sidecar has wrong class"));
        }
        let len = h.content_size as usize;
        if len != expect_len {
            return Err(Error::corrupt(format!(
                "dictionary sidecar length {len} != expected {expect_len}"
            )));
        }
        if region.len() < HEADER_SIZE + len + 8 {
            return Err(Error::corrupt("dictionary sidecar truncated"));
        }
        let dict = region.slice(HEADER_SIZE, len);
        let stored = region.read_u32(HEADER_SIZE + len);
        crate::crc::verify_crc32c("dictionary", dict.as_slice(), stored)?;
        Ok(DictSource::Sidecar {
            _file: file,
            region: dict,
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

impl BlobStore for DictZipBlobStore {
    fn num_records(&self) -> usize {
        self.header.num_records as usize
    }

    fn total_data_size(&self) -> u64 {
        self.header.unzip_size
    }

    fn mem_size(&self) -> usize {
        HEADER_SIZE
            + self.payload.len()
            + self.offsets.mem_size()
            + self.dict.as_slice().len()
            + self.table.as_ref().map_or(0, |t| t.len())
            + self.side_crcs.as_ref().map_or(0, |c| c.len())
    }

    fn get_record_append(&self, id: usize, out: &mut Vec<u8>) -> Result<()> {
        self.check_id(id)?;
        let [start, end] = self.offsets.get2(id);
        match &self.decoder {
            None => {
                debug_assert!(start % 8 == 0 && end % 8 == 0);
                let stored =
                    &self.payload.as_slice()[(start / 8) as usize..(end / 8) as usize];
                let ops = verify_trailer(
                    self.header.checksum_type,
                    self.header.checksum_level,
                    stored,
                )?;
                decompress_record(ops, self.dict.as_slice(), self.min_match, out)
            }
            Some(decoder) => {
                let mut ops = Vec::new();
                let mut r = BitReader::new(self.payload.as_slice());
                r.set_pos(start as usize);
                decoder.decode_record(&mut r, end as usize, &mut ops)?;
                if let Some(crcs) = &self.side_crcs {
                    let stored = crcs.read_u32(id * 4);
                    match self.header.checksum_type {
                        ChecksumType::Crc32c => {
                            crate::crc::verify_crc32c("record", &ops, stored)?
                        }
                        ChecksumType::Crc16c => {
                            crate::crc::verify_crc16c("record", &ops, stored as u16)?
                        }
                    }
                }
                decompress_record(&ops, self.dict.as_slice(), self.min_match, out)
            }
        }
    }

    fn get_dict(&self) -> &[u8] {
        self.dict.as_slice()
    }

    fn reorder_zip_data(
        &self,
        map: &ZReorderMap,
        sink: &mut dyn FnMut(&[u8]) -> Result<()>,
        _tmp: Option<&Path>,
    ) -> Result<()> {
        map.check_domain(self.num_records())?;
        let units = flags_to_units(self.header.flags)?;
        let entropy = self.decoder.is_some();
        let mut bounds: Vec<u64> = vec![0];
        let payload: Vec<u8>;
        let mut crcs: Vec<u8> = Vec::new();
        if entropy {
            let mut w = BitWriter::new();
            for old in map.iter() {
                let [s, e] = self.offsets.get2(old);
                w.copy_bits(self.payload.as_slice(), s as usize, (e - s) as usize);
                bounds.push(w.bit_len() as u64);
                if let Some(arr) = &self.side_crcs {
                    crcs.extend_from_slice(&arr.as_slice()[old * 4..old * 4 + 4]);
                }
            }
            payload = w.finish();
        } else {
            let mut p = Vec::with_capacity(self.payload.len());
            for old in map.iter() {
                let [s, e] = self.offsets.get2(old);
                p.extend_from_slice(
                    &self.payload.as_slice()[(s / 8) as usize..(e / 8) as usize],
                );
                bounds.push(p.len() as u64 * 8);
            }
            payload = p;
        }
        let off_img = OffsetIndex::build(&bounds, units)?;
        let mut tail: Vec<u8> = Vec::new();
        if let Some(t) = &self.table {
            tail.extend_from_slice(&(t.len() as u64).to_le_bytes());
            tail.extend_from_slice(t.as_slice());
        }
        if self.side_crcs.is_some() {
            tail.extend_from_slice(&(crcs.len() as u64).to_le_bytes());
            tail.extend_from_slice(&crcs);
        }
        let mut header = self.header.clone();
        header.content_size = payload.len() as u64;
        header.offset_size = off_img.len() as u64;
        if header.flags & FLAG_EMBED_DICT != 0 {
            // the dictionary moves verbatim; only its offset shifts
            header.embed_dict_offset =
                (HEADER_SIZE + payload.len() + off_img.len() + tail.len()) as u64;
            tail.extend_from_slice(self.dict.as_slice());
        }
        super::reorder::emit_store(&header, &[&payload, &off_img, &tail], sink)
    }
}
