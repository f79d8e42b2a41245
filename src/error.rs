//! Library-wide error type.
//!
//! Checksum mismatches carry both the stored and the recomputed value so
//! callers can log the pair; I/O errors carry the path they happened on.
//! Usage errors that indicate a broken caller (out-of-range record ids,
//! rank/select contract violations) are debug-asserted, not represented
//! here.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Stored CRC32C does not match the recomputed one.
    #[error("bad crc32c on {what}: stored {stored:#010x}, computed {computed:#010x}")]
    BadCrc32c {
        what: &'static str,
        stored: u32,
        computed: u32,
    },

    /// Stored CRC16 does not match the recomputed one.
    #[error("bad crc16c on {what}: stored {stored:#06x}, computed {computed:#06x}")]
    BadCrc16c {
        what: &'static str,
        stored: u16,
        computed: u16,
    },

    /// A configuration or call-ordering mistake at a builder/reader API.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A value no longer fits the integer width chosen at build time.
    #[error("length overflow in {field}: value {value} exceeds {limit}")]
    LengthError {
        field: &'static str,
        value: u64,
        limit: u64,
    },

    /// Structurally impossible on-disk data (bad magic, version, counts).
    #[error("corrupt artifact: {0}")]
    Corrupt(String),

    /// An OS-level failure, annotated with the path involved.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// True for either checksum-mismatch variant.
    pub fn is_bad_checksum(&self) -> bool {
        matches!(self, Error::BadCrc32c { .. } | Error::BadCrc16c { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_predicate() {
        let e = Error::BadCrc32c {
            what: "header",
            stored: 1,
            computed: 2,
        };
        assert!(e.is_bad_checksum());
        assert!(!Error::invalid("x").is_bad_checksum());
    }

    #[test]
    fn display_carries_both_values() {
        let e = Error::BadCrc32c {
            what: "record",
            stored: 0xAABBCCDD,
            computed: 0x11223344,
        };
        let s = e.to_string();
        assert!(s.contains("0xaabbccdd"));
        assert!(s.contains("0x11223344"));
    }
}
