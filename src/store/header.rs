//! The 128-byte artifact header.
//!
//! Every store file begins with this fixed little-endian header; the
//! final four bytes are a CRC32C over bytes `0..124`, so any header
//! corruption is caught before a single payload byte is trusted.
//!
//! ```text
//!   0..16   magic  b"ZbsBlobStore\0\0\0\0"
//!  16..20   format version (u32)
//!  20..52   class name, null-padded ASCII
//!  52..60   num_records
//!  60..68   content_size  : payload section bytes
//!  68..76   offset_size   : offset-index section bytes
//!  76..84   unzip_size    : total uncompressed record bytes
//!  84       checksum type  (0 = CRC32C, 1 = CRC16C)
//!  85       checksum level (0..=3)
//!  86..88   flags, variant-specific
//!  88..96   embedded dict offset (0 = none)
//!  96..104  embedded dict size
//! 104..124  reserved, zero
//! 124..128  CRC32C of bytes 0..124
//! ```

use crate::crc::{crc32c_oneshot, verify_crc32c};
use crate::error::{Error, Result};

pub const MAGIC: [u8; 16] = *b"ZbsBlobStore\0\0\0\0";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 128;

/// Which CRC flavor protects records and data regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumType {
    Crc32c = 0,
    Crc16c = 1,
}

impl ChecksumType {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(ChecksumType::Crc32c),
            1 => Ok(ChecksumType::Crc16c),
            _ => Err(Error::corrupt(format!("unknown checksum type {v}"))),
        }
    }
}

/// Granularity of checksum verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd)]
pub enum ChecksumLevel {
    /// No checksums beyond nothing at all.
    None = 0,
    /// Header CRC only.
    HeaderOnly = 1,
    /// Header plus a 4-byte trailer per record.
    PerRecord = 2,
    /// Header plus one CRC over the whole data region.
    WholeData = 3,
}

impl ChecksumLevel {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(ChecksumLevel::None),
            1 => Ok(ChecksumLevel::HeaderOnly),
            2 => Ok(ChecksumLevel::PerRecord),
            3 => Ok(ChecksumLevel::WholeData),
            _ => Err(Error::corrupt(format!("unknown checksum level {v}"))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FileHeader {
    pub class_name: String,
    pub num_records: u64,
    pub content_size: u64,
    pub offset_size: u64,
    pub unzip_size: u64,
    pub checksum_type: ChecksumType,
    pub checksum_level: ChecksumLevel,
    pub flags: u16,
    pub embed_dict_offset: u64,
    pub embed_dict_size: u64,
}

impl FileHeader {
    pub fn new(class_name: &str) -> Self {
        debug_assert!(class_name.len() <= 32);
        FileHeader {
            class_name: class_name.to_string(),
            num_records: 0,
            content_size: 0,
            offset_size: 0,
            unzip_size: 0,
            checksum_type: ChecksumType::Crc32c,
            checksum_level: ChecksumLevel::HeaderOnly,
            flags: 0,
            embed_dict_offset: 0,
            embed_dict_size: 0,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut h = [0u8; HEADER_SIZE];
        h[0..16].copy_from_slice(&MAGIC);
        h[16..20].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        let name = self.class_name.as_bytes();
        assert!(name.len() <= 32, "class name too long");
        h[20..20 + name.len()].copy_from_slice(name);
        h[52..60].copy_from_slice(&self.num_records.to_le_bytes());
        h[60..68].copy_from_slice(&self.content_size.to_le_bytes());
        h[68..76].copy_from_slice(&self.offset_size.to_le_bytes());
        h[76..84].copy_from_slice(&self.unzip_size.to_le_bytes());
        h[84] = self.checksum_type as u8;
        h[85] = self.checksum_level as u8;
        h[86..88].copy_from_slice(&self.flags.to_le_bytes());
        h[88..96].copy_from_slice(&self.embed_dict_offset.to_le_bytes());
        h[96..104].copy_from_slice(&self.embed_dict_size.to_le_bytes());
        let crc = crc32c_oneshot(&h[..124]);
        h[124..128].copy_from_slice(&crc.to_le_bytes());
        h
    }

    /// Parse and validate: magic, version, header CRC.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::corrupt("file shorter than the 128-byte header"));
        }
        let h = &bytes[..HEADER_SIZE];
        if h[0..16] != MAGIC {
            return Err(Error::corrupt("bad magic"));
        }
        let stored = u32::from_le_bytes(h[124..128].try_into().unwrap());
        verify_crc32c("header", &h[..124], stored)?;
        let version = u32::from_le_bytes(h[16..20].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(Error::corrupt(format!(
                "unsupported format version {version}"
            )));
        }
        let name_end = h[20..52].iter().position(|&b| b == 0).unwrap_or(32);
        let class_name = std::str::from_utf8(&h[20..20 + name_end])
            .map_err(|_| Error::corrupt("class name not ASCII"))?
            .to_string();
        Ok(FileHeader {
            class_name,
            num_records: u64::from_le_bytes(h[52..60].try_into().unwrap()),
            content_size: u64::from_le_bytes(h[60..68].try_into().unwrap()),
            offset_size: u64::from_le_bytes(h[68..76].try_into().unwrap()),
            unzip_size: u64::from_le_bytes(h[76..84].try_into().unwrap()),
            checksum_type: ChecksumType::from_u8(h[84])?,
            checksum_level: ChecksumLevel::from_u8(h[85])?,
            flags: u16::from_le_bytes(h[86..88].try_into().unwrap()),
            embed_dict_offset: u64::from_le_bytes(h[88..96].try_into().unwrap()),
            embed_dict_size: u64::from_le_bytes(h[96..104].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileHeader {
        let mut h = FileHeader::new("PlainBlobStore");
        h.num_records = 42;
        h.content_size = 1000;
        h.offset_size = 64;
        h.unzip_size = 1000;
        h.checksum_level = ChecksumLevel::PerRecord;
        h.flags = 0x0102;
        h
    }

    #[test]
    fn encode_decode_roundtrip() {
        let h = sample();
        let img = h.encode();
        let d = FileHeader::decode(&img).unwrap();
        assert_eq!(d.class_name, "PlainBlobStore");
        assert_eq!(d.num_records, 42);
        assert_eq!(d.content_size, 1000);
        assert_eq!(d.checksum_level, ChecksumLevel::PerRecord);
        assert_eq!(d.flags, 0x0102);
    }

    #[test]
    fn any_byte_flip_breaks_crc() {
        let img = sample().encode();
        for i in 0..124 {
            let mut broken = img;
            broken[i] ^= 0x40;
            let r = FileHeader::decode(&broken);
            assert!(r.is_err(), "flip at byte {i} went unnoticed");
        }
    }

    #[test]
    fn bad_magic_rejected_before_crc() {
        let mut img = sample().encode();
        img[0] = b'X';
        let err = FileHeader::decode(&img).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut h = sample().encode();
        h[16..20].copy_from_slice(&99u32.to_le_bytes());
        let crc = crate::crc::crc32c_oneshot(&h[..124]);
        h[124..128].copy_from_slice(&crc.to_le_bytes());
        assert!(FileHeader::decode(&h).is_err());
    }
}
