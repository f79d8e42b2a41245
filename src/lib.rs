// zbs: succinct data structures and compressed blob stores

pub mod bits;
pub mod crc;
pub mod error;
pub mod int_vec;
pub mod mmap;
pub mod rank_select;
pub mod region;
pub mod store;
pub mod str_vec;
pub mod trie;
pub mod xxhash;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Crate-wide error and result types.
pub use error::{Error, Result};

/// Shared view into owned or memory-mapped bytes; the storage substrate
/// behind every zero-copy load.
pub use region::ByteRegion;

/// Whole-file read-only memory map with an optional populate hint.
pub use mmap::MmapWholeFile;

/// Rank/select query surface and the default interleaved bitvector.
pub use rank_select::{BitVec, RankSelectIl256, RankSelectOps};

/// Bit-packed integer arrays.
pub use int_vec::{SortedUintVec, UintVecMin0};

/// String pools.
pub use str_vec::{FixedLenStrVec, SortableStrVec, SortedStrVec, StrVecOps};

/// Nested LOUDS trie with the key <-> id bijection.
pub use trie::{NestLoudsTrieConfig, NestLoudsTrieDawg};

/// Record-addressable stores: the common trait, the loader, and the
/// builders of every variant.
pub use store::{
    load_from_mmap, load_user_mem, BlobStore, ChecksumLevel, ChecksumType, DictZipBlobStore,
    DictZipOptions, EntropyZipBlobStore, MixedLenBlobStore, NestLoudsTrieBlobStore,
    PlainBlobStore, ZReorderMap, ZipOffsetBlobStore,
};

/// Current library version string.
pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");
