//! Checksum wrappers.
//!
//! Thin re-export layer over the `crc32c` and `crc` crates, so call sites
//! stay one-line and the algorithm instances are pinned in a single place.

pub use crc32c::crc32c as crc32c_oneshot;

use crate::error::{Error, Result};

static CRC16: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

/// Incremental CRC-16 over the same pinned instance as
/// [`crc16c_oneshot`].
pub struct Crc16Digest(crc::Digest<'static, u16>);

impl Crc16Digest {
    pub fn new() -> Self {
        Crc16Digest(CRC16.digest())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> u16 {
        self.0.finalize()
    }
}

impl Default for Crc16Digest {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental CRC32C: extend `seed` with `data`.
#[inline]
pub fn crc32c_update(seed: u32, data: &[u8]) -> u32 {
    crc32c::crc32c_append(seed, data)
}

/// One-shot CRC-16 (IBM-3740 instance, the 16-bit checksum flavor).
#[inline]
pub fn crc16c_oneshot(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Verify a stored CRC32C, returning `BadCrc32c` with both values on
/// mismatch. `what` names the protected region for the error message.
#[inline]
pub fn verify_crc32c(what: &'static str, data: &[u8], stored: u32) -> Result<()> {
    let computed = crc32c_oneshot(data);
    if computed != stored {
        return Err(Error::BadCrc32c {
            what,
            stored,
            computed,
        });
    }
    Ok(())
}

/// Verify a stored CRC-16, returning `BadCrc16c` with both values on
/// mismatch.
#[inline]
pub fn verify_crc16c(what: &'static str, data: &[u8], stored: u16) -> Result<()> {
    let computed = crc16c_oneshot(data);
    if computed != stored {
        return Err(Error::BadCrc16c {
            what,
            stored,
            computed,
        });
    }
    Ok(())
}
