//! Nested LOUDS tries.
//!
//! A [`NestLoudsTrie`] stores a sorted string set as LOUDS topology bits,
//! per-node labels, and compressed single-child chains (zpaths). It
//! compresses itself recursively: the pool of outlined zpath fragments
//! becomes the key set of an inner trie, down to a configurable depth.
//!
//! [`NestLoudsTrieDawg`] adds a terminal bitvector for the key <-> dense
//! id bijection, point lookup, prefix matching, and the ordered iterator.

mod build;
mod config;
mod dawg;
mod iter;
mod louds;

pub use config::NestLoudsTrieConfig;
pub use dawg::NestLoudsTrieDawg;
pub use iter::NltIterator;
pub use louds::NestLoudsTrie;

use crate::rank_select::{RankSelectIl256, RankSelectSe256, RankSelectSe512};

/// Interleaved-rank-select trie, the default configuration.
pub type NestLoudsTrieDawgIl256 = NestLoudsTrieDawg<RankSelectIl256>;
/// Separated-layout variants for callers that prefer denser bits.
pub type NestLoudsTrieDawgSe256 = NestLoudsTrieDawg<RankSelectSe256>;
pub type NestLoudsTrieDawgSe512 = NestLoudsTrieDawg<RankSelectSe512>;
