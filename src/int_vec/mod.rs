//! Bit-packed integer arrays.
//!
//! [`UintVecMin0`] stores unsigned integers at a fixed bit width chosen at
//! build time ("min0": values are stored as-is against a zero floor).
//! [`SortedUintVec`] adds per-block delta compression for non-decreasing
//! sequences: the workhorse behind every compressed offset index in the
//! blob stores.

mod sorted_uint_vec;
mod uint_vec;

pub use sorted_uint_vec::{SortedUintVec, SortedUintVecBuilder};
pub use uint_vec::{UintVecBuilder, UintVecMin0};
