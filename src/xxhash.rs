//! Thin wrapper around the `xxhash-rust` crate, pinning the variant used
//! in this crate. The DictZip hash-chain match finder fingerprints
//! min-match windows with one-shot XXH64.

pub use xxhash_rust::xxh64::Xxh64 as Xxh64State;

/// One-shot XXH64.
#[inline]
pub fn xxh64_oneshot(data: &[u8], seed: u64) -> u64 {
    xxhash_rust::xxh64::xxh64(data, seed)
}
