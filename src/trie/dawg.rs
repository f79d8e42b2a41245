//! DAWG view over a nested LOUDS trie.
//!
//! Adds a terminal bitvector and with it the bijection between keys and
//! dense word ids: `index(key)` -> id, `nth_word(id)` -> key. Ids are
//! assigned in trie state order (`is_term.rank1`); lexicographic
//! traversal is the iterator's job.

use crate::error::{Error, Result};
use crate::rank_select::{BitVec, RankSelectIl256, RankSelectIndex, RankSelectOps};
use crate::region::ByteRegion;
use crate::str_vec::{SortableStrVec, StrVecOps};

use super::build::build_trie;
use super::config::NestLoudsTrieConfig;
use super::iter::NltIterator;
use super::louds::{load_section, save_section, NestLoudsTrie, Zpath};

pub struct NestLoudsTrieDawg<R: RankSelectIndex = RankSelectIl256> {
    pub(crate) trie: NestLoudsTrie<R>,
    pub(crate) is_term: R,
}

impl<R: RankSelectIndex> NestLoudsTrieDawg<R> {
    /// Build from a key set. Returns the dawg and, for each input record
    /// (arrival order), the word id it maps to. Duplicate keys share a
    /// word id. With `config.is_input_sorted` the container is trusted to
    /// be sorted already and the sort is skipped.
    pub fn build_from(
        mut keys: SortableStrVec,
        config: &NestLoudsTrieConfig,
    ) -> Result<(Self, Vec<u32>)> {
        let n = keys.len();
        let rank: Vec<u32> = if config.is_input_sorted {
            (0..n as u32).collect()
        } else {
            keys.sort_by_content()
        };
        let out = build_trie::<R>(&keys, config.effective_nest_level(), config)?;
        let mut term = BitVec::with_size(out.trie.total_states().max(1), false);
        for &node in &out.node_of_key {
            term.set1(node as usize);
        }
        let is_term = R::from_bitvec(term);
        let word_of_seq: Vec<u32> = (0..n)
            .map(|seq| {
                let node = out.node_of_key[rank[seq] as usize] as usize;
                is_term.rank1(node) as u32
            })
            .collect();
        Ok((
            NestLoudsTrieDawg {
                trie: out.trie,
                is_term,
            },
            word_of_seq,
        ))
    }

    pub fn num_words(&self) -> usize {
        self.is_term.max_rank1()
    }

    pub fn total_states(&self) -> usize {
        self.trie.total_states()
    }

    pub fn total_zpath_len(&self) -> u64 {
        self.trie.total_zpath_len()
    }

    pub fn nest_level(&self) -> usize {
        self.trie.nest_level()
    }

    pub fn mem_size(&self) -> usize {
        self.trie.mem_size() + self.is_term.mem_size()
    }

    pub(crate) fn is_term_state(&self, s: usize) -> bool {
        self.is_term.is1(s)
    }

    /// Word id of a terminal state.
    pub fn word_of_state(&self, s: usize) -> usize {
        debug_assert!(self.is_term_state(s));
        self.is_term.rank1(s)
    }

    /// Terminal state of a word id.
    pub fn state_of_word(&self, id: usize) -> usize {
        debug_assert!(id < self.num_words());
        self.is_term.select1(id)
    }

    /// Word id of `key`, or `None` when `key` is not in the set.
    /// Never fails on malformed input; absent keys are just absent.
    pub fn index(&self, key: &[u8]) -> Option<usize> {
        let mut s = 0usize;
        let mut pos = 0usize;
        let mut zbuf: Vec<u8> = Vec::new();
        loop {
            match self.trie.zpath_ref(s) {
                Zpath::None => {}
                Zpath::Core(z) => {
                    if !key[pos..].starts_with(z) {
                        return None;
                    }
                    pos += z.len();
                }
                Zpath::Nested(_) => {
                    zbuf.clear();
                    self.trie.zpath_append(s, &mut zbuf);
                    if !key[pos..].starts_with(&zbuf) {
                        return None;
                    }
                    pos += zbuf.len();
                }
            }
            if pos == key.len() {
                return if self.is_term.is1(s) {
                    Some(self.is_term.rank1(s))
                } else {
                    None
                };
            }
            s = self.trie.state_move(s, key[pos])?;
            pos += 1;
        }
    }

    /// Reconstruct word `id`.
    pub fn nth_word(&self, id: usize) -> Vec<u8> {
        let mut out = Vec::new();
        self.nth_word_append(id, &mut out);
        out
    }

    /// Append form of [`nth_word`](Self::nth_word).
    pub fn nth_word_append(&self, id: usize, out: &mut Vec<u8>) {
        let s = self.state_of_word(id);
        self.trie.restore_string_append(s, out);
    }

    /// Longest prefix of `key` that is itself a word: returns the prefix
    /// length and its word id, or `(0, None)` when no prefix matches.
    pub fn match_max_prefix(&self, key: &[u8]) -> (usize, Option<usize>) {
        let mut best = (0usize, None);
        let mut s = 0usize;
        let mut pos = 0usize;
        let mut zbuf: Vec<u8> = Vec::new();
        loop {
            match self.trie.zpath_ref(s) {
                Zpath::None => {}
                Zpath::Core(z) => {
                    if !key[pos..].starts_with(z) {
                        return best;
                    }
                    pos += z.len();
                }
                Zpath::Nested(_) => {
                    zbuf.clear();
                    self.trie.zpath_append(s, &mut zbuf);
                    if !key[pos..].starts_with(&zbuf) {
                        return best;
                    }
                    pos += zbuf.len();
                }
            }
            if self.is_term.is1(s) {
                best = (pos, Some(self.is_term.rank1(s)));
            }
            if pos == key.len() {
                return best;
            }
            match self.trie.state_move(s, key[pos]) {
                Some(next) => {
                    s = next;
                    pos += 1;
                }
                None => return best,
            }
        }
    }

    /// Lexicographic iterator; one per thread.
    pub fn iter(&self) -> NltIterator<'_, R> {
        NltIterator::new(self)
    }

    /// Image: length-prefixed trie image + is_term image.
    pub fn save(&self, out: &mut Vec<u8>) {
        save_section(out, |o| self.trie.save(o));
        save_section(out, |o| self.is_term.save(o));
    }

    pub fn load(region: ByteRegion) -> Result<Self> {
        let mut pos = 0usize;
        let trie = NestLoudsTrie::load(load_section(&region, &mut pos)?)?;
        let is_term = R::load(load_section(&region, &mut pos)?)?;
        if is_term.size() != trie.total_states() {
            return Err(Error::corrupt("dawg: is_term size != state count"));
        }
        Ok(NestLoudsTrieDawg { trie, is_term })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dawg(keys: &[&[u8]]) -> (NestLoudsTrieDawg, Vec<u32>) {
        let mut v = SortableStrVec::new();
        for k in keys {
            v.push(k);
        }
        NestLoudsTrieDawg::build_from(v, &NestLoudsTrieConfig::default()).unwrap()
    }

    #[test]
    fn index_nth_word_bijection() {
        let keys: &[&[u8]] = &[b"a", b"ab", b"abc", b"b", b"ba", b"cherry"];
        let (d, _) = dawg(keys);
        assert_eq!(d.num_words(), 6);
        for k in keys {
            let id = d.index(k).unwrap();
            assert!(id < d.num_words());
            assert_eq!(d.nth_word(id), *k, "word {k:?}");
        }
        assert_eq!(d.index(b"ac"), None);
        assert_eq!(d.index(b"abcd"), None);
        assert_eq!(d.index(b""), None);
        assert_eq!(d.index(b"cherr"), None);
    }

    #[test]
    fn all_ids_distinct() {
        let keys: &[&[u8]] = &[b"x", b"xx", b"xy", b"y", b"yy"];
        let (d, _) = dawg(keys);
        let mut ids: Vec<usize> = keys.iter().map(|k| d.index(k).unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn word_of_seq_handles_unsorted_input() {
        let keys: &[&[u8]] = &[b"pear", b"apple", b"quince", b"apple"];
        let mut v = SortableStrVec::new();
        for k in keys {
            v.push(k);
        }
        let (d, word_of_seq) =
            NestLoudsTrieDawg::<crate::rank_select::RankSelectIl256>::build_from(
                v,
                &NestLoudsTrieConfig::default(),
            )
            .unwrap();
        assert_eq!(d.num_words(), 3);
        for (seq, k) in keys.iter().enumerate() {
            assert_eq!(d.nth_word(word_of_seq[seq] as usize), *k, "seq {seq}");
        }
        // duplicates share an id
        assert_eq!(word_of_seq[1], word_of_seq[3]);
    }

    #[test]
    fn match_max_prefix_walks_terminals() {
        let (d, _) = dawg(&[b"a", b"abc", b"abcdef"]);
        assert_eq!(d.match_max_prefix(b"abcdexx").0, 3);
        assert_eq!(d.match_max_prefix(b"abcdefgh").0, 6);
        assert_eq!(d.match_max_prefix(b"ab").0, 1);
        assert_eq!(d.match_max_prefix(b"zzz"), (0, None));
        let (len, id) = d.match_max_prefix(b"abc");
        assert_eq!(len, 3);
        assert_eq!(d.nth_word(id.unwrap()), b"abc");
    }

    #[test]
    fn save_load_preserves_lookups() {
        let keys: Vec<Vec<u8>> = (0..300u32)
            .map(|i| format!("/usr/share/dict/word-{:05}", i * 7 % 300).into_bytes())
            .collect();
        let mut v = SortableStrVec::new();
        for k in &keys {
            v.push(k);
        }
        let (d, _) =
            NestLoudsTrieDawg::<crate::rank_select::RankSelectIl256>::build_from(
                v,
                &NestLoudsTrieConfig::default(),
            )
            .unwrap();
        let mut img = Vec::new();
        d.save(&mut img);
        let loaded =
            NestLoudsTrieDawg::<crate::rank_select::RankSelectIl256>::load(ByteRegion::from_vec(
                img,
            ))
            .unwrap();
        assert_eq!(loaded.num_words(), d.num_words());
        for k in &keys {
            assert_eq!(loaded.index(k), d.index(k));
        }
        for id in (0..d.num_words()).step_by(17) {
            assert_eq!(loaded.nth_word(id), d.nth_word(id));
        }
    }

    #[test]
    fn deep_nesting_still_restores() {
        // shared long fragments make the nest gate fire
        let mut cfg = NestLoudsTrieConfig::default();
        cfg.nest_level = 4;
        let keys: Vec<Vec<u8>> = (0..120u32)
            .map(|i| {
                format!(
                    "/very/long/common/directory/prefix/app-{:02}/settings/profile-{}",
                    i % 40,
                    i % 3
                )
                .into_bytes()
            })
            .collect();
        let mut v = SortableStrVec::new();
        for k in &keys {
            v.push(k);
        }
        let (d, _) = NestLoudsTrieDawg::<crate::rank_select::RankSelectIl256>::build_from(
            v, &cfg,
        )
        .unwrap();
        for k in &keys {
            let id = d.index(k).expect("present");
            assert_eq!(d.nth_word(id), *k);
        }
    }
}
