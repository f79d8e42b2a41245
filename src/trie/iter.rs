//! Lexicographic iterator over a DAWG.
//!
//! Keeps an explicit stack of `(state, child_index, word_len)` entries
//! (the path from the root to the current terminal) plus the
//! materialized word bytes. Seeks are O(|key|); `incr`/`decr` are
//! amortized O(output growth). One iterator per thread; it borrows the
//! dawg immutably.

use crate::rank_select::RankSelectIndex;

use super::dawg::NestLoudsTrieDawg;

#[derive(Clone, Copy)]
struct Entry {
    state: u32,
    /// index of `state` among its parent's children
    nth_child: u32,
    /// word length after appending this node's label and zpath
    word_len: u32,
}

pub struct NltIterator<'a, R: RankSelectIndex> {
    dawg: &'a NestLoudsTrieDawg<R>,
    stack: Vec<Entry>,
    word: Vec<u8>,
}

impl<'a, R: RankSelectIndex> NltIterator<'a, R> {
    pub(crate) fn new(dawg: &'a NestLoudsTrieDawg<R>) -> Self {
        NltIterator {
            dawg,
            stack: Vec::new(),
            word: Vec::new(),
        }
    }

    /// Current word. Valid after a successful seek/incr/decr.
    pub fn word(&self) -> &[u8] {
        &self.word
    }

    /// Terminal state of the current word.
    pub fn word_state(&self) -> usize {
        self.stack.last().expect("iterator not positioned").state as usize
    }

    /// Dense id of the current word.
    pub fn word_id(&self) -> usize {
        self.dawg.word_of_state(self.word_state())
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.word.clear();
    }

    fn top_state(&self) -> usize {
        self.stack.last().unwrap().state as usize
    }

    /// Push a child (or the root) and append its label + zpath.
    fn push_state(&mut self, state: usize, nth_child: usize) {
        let d = self.dawg;
        if state != 0 {
            let parent = self.top_state();
            let (child0, deg) = d.trie.children(parent);
            self.word.push(d.trie.nth_label(child0, deg, nth_child));
        }
        d.trie.zpath_append(state, &mut self.word);
        self.stack.push(Entry {
            state: state as u32,
            nth_child: nth_child as u32,
            word_len: self.word.len() as u32,
        });
    }

    /// Pop the top entry, truncating the word to the new top.
    fn pop_state(&mut self) -> Entry {
        let e = self.stack.pop().expect("pop on empty iterator");
        let new_len = self.stack.last().map_or(0, |p| p.word_len as usize);
        self.word.truncate(new_len);
        e
    }

    /// Descend to the smallest terminal in the current subtree.
    fn to_min(&mut self) -> bool {
        while !self.dawg.is_term_state(self.top_state()) {
            let (child0, deg) = self.dawg.trie.children(self.top_state());
            debug_assert!(deg > 0, "non-terminal leaf");
            if deg == 0 {
                return false;
            }
            self.push_state(child0, 0);
        }
        true
    }

    /// Descend to the largest terminal in the current subtree.
    fn to_max(&mut self) -> bool {
        loop {
            let (child0, deg) = self.dawg.trie.children(self.top_state());
            if deg == 0 {
                debug_assert!(self.dawg.is_term_state(self.top_state()));
                return true;
            }
            self.push_state(child0 + deg - 1, deg - 1);
        }
    }

    /// Pop until an unvisited right sibling exists, then take its
    /// subtree's minimum. False when the traversal is exhausted.
    fn advance_to_next_subtree(&mut self) -> bool {
        loop {
            let e = self.pop_state();
            if self.stack.is_empty() {
                return false;
            }
            let parent = self.top_state();
            let (child0, deg) = self.dawg.trie.children(parent);
            let next = e.nth_child as usize + 1;
            if next < deg {
                self.push_state(child0 + next, next);
                return self.to_min();
            }
        }
    }

    /// Position at the first word. False on an empty dictionary.
    pub fn seek_begin(&mut self) -> bool {
        self.reset();
        if self.dawg.num_words() == 0 {
            return false;
        }
        self.push_state(0, 0);
        self.to_min()
    }

    /// Position at the last word. False on an empty dictionary.
    pub fn seek_end(&mut self) -> bool {
        self.reset();
        if self.dawg.num_words() == 0 {
            return false;
        }
        self.push_state(0, 0);
        self.to_max()
    }

    /// Position at the smallest word >= `key`. False when every word is
    /// smaller (the iterator is then unpositioned).
    pub fn seek_lower_bound(&mut self, key: &[u8]) -> bool {
        self.reset();
        if self.dawg.num_words() == 0 {
            return false;
        }
        self.push_state(0, 0);
        let mut pos = 0usize;
        loop {
            // compare this node's unmatched segment (label already matched)
            let w = &self.word[pos..];
            let k = &key[pos..];
            let m = common_prefix(w, k);
            if m < w.len() {
                return if m == k.len() || w[m] > k[m] {
                    // whole subtree orders at or after key
                    self.to_min()
                } else {
                    self.advance_to_next_subtree()
                };
            }
            pos += m;
            if pos == key.len() {
                if self.dawg.is_term_state(self.top_state()) {
                    return true;
                }
                return self.to_min();
            }
            match self
                .dawg
                .trie
                .state_move_lower_bound(self.top_state(), key[pos])
            {
                Some((child, exact)) => {
                    let (child0, _) = self.dawg.trie.children(self.top_state());
                    let nth = child - child0;
                    self.push_state(child, nth);
                    if exact {
                        pos += 1;
                    } else {
                        return self.to_min();
                    }
                }
                None => return self.advance_to_next_subtree(),
            }
        }
    }

    /// Step to the next word in lexicographic order.
    pub fn incr(&mut self) -> bool {
        debug_assert!(!self.stack.is_empty(), "incr before seek");
        let (child0, deg) = self.dawg.trie.children(self.top_state());
        if deg > 0 {
            self.push_state(child0, 0);
            return self.to_min();
        }
        self.advance_to_next_subtree()
    }

    /// Step to the previous word; false at the first word (the iterator
    /// is re-positioned at the beginning).
    pub fn decr(&mut self) -> bool {
        debug_assert!(!self.stack.is_empty(), "decr before seek");
        loop {
            let e = self.pop_state();
            if self.stack.is_empty() {
                self.seek_begin();
                return false;
            }
            if e.nth_child > 0 {
                let parent = self.top_state();
                let (child0, _) = self.dawg.trie.children(parent);
                let nth = e.nth_child as usize - 1;
                self.push_state(child0 + nth, nth);
                return self.to_max();
            }
            if self.dawg.is_term_state(self.top_state()) {
                return true;
            }
        }
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len());
    let mut i = 0;
    while i < n && a[i] == b[i] {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::super::config::NestLoudsTrieConfig;
    use super::super::dawg::NestLoudsTrieDawg;
    use crate::str_vec::SortableStrVec;

    fn dawg(keys: &[&[u8]]) -> NestLoudsTrieDawg {
        let mut v = SortableStrVec::new();
        for k in keys {
            v.push(k);
        }
        NestLoudsTrieDawg::build_from(v, &NestLoudsTrieConfig::default())
            .unwrap()
            .0
    }

    fn collect_forward(d: &NestLoudsTrieDawg) -> Vec<Vec<u8>> {
        let mut it = d.iter();
        let mut out = Vec::new();
        let mut more = it.seek_begin();
        while more {
            out.push(it.word().to_vec());
            more = it.incr();
        }
        out
    }

    #[test]
    fn forward_iteration_is_sorted() {
        let keys: &[&[u8]] = &[b"bed", b"a", b"apple", b"ant", b"bee", b"z", b"app"];
        let d = dawg(keys);
        let words = collect_forward(&d);
        let mut expect: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
        expect.sort();
        assert_eq!(words, expect);
    }

    #[test]
    fn backward_iteration_mirrors_forward() {
        let keys: &[&[u8]] = &[b"m", b"mm", b"mmm", b"ma", b"mz", b"a", b"zz"];
        let d = dawg(keys);
        let forward = collect_forward(&d);
        let mut it = d.iter();
        let mut back = Vec::new();
        let mut more = it.seek_end();
        while more {
            back.push(it.word().to_vec());
            more = it.decr();
        }
        back.reverse();
        assert_eq!(back, forward);
    }

    #[test]
    fn lower_bound_positions() {
        let keys: &[&[u8]] = &[b"ant", b"bee", b"cat", b"cow", b"dog"];
        let d = dawg(keys);
        let mut it = d.iter();
        assert!(it.seek_lower_bound(b"bee"));
        assert_eq!(it.word(), b"bee");
        assert!(it.seek_lower_bound(b"bat"));
        assert_eq!(it.word(), b"bee");
        assert!(it.seek_lower_bound(b""));
        assert_eq!(it.word(), b"ant");
        assert!(it.seek_lower_bound(b"cz"));
        assert_eq!(it.word(), b"dog");
        assert!(!it.seek_lower_bound(b"dzz"));
    }

    #[test]
    fn lower_bound_inside_zpath() {
        let keys: &[&[u8]] = &[b"prefix-aaa", b"prefix-bbb", b"prefix-ccc"];
        let d = dawg(keys);
        let mut it = d.iter();
        // mismatch inside the shared zpath, ordering before
        assert!(it.seek_lower_bound(b"pre"));
        assert_eq!(it.word(), b"prefix-aaa");
        // inside zpath, ordering after everything
        assert!(!it.seek_lower_bound(b"prf"));
        // exact mid-word
        assert!(it.seek_lower_bound(b"prefix-b"));
        assert_eq!(it.word(), b"prefix-bbb");
    }

    #[test]
    fn incr_past_end_then_word_id_roundtrip() {
        let keys: &[&[u8]] = &[b"k1", b"k2", b"k3"];
        let d = dawg(keys);
        let mut it = d.iter();
        assert!(it.seek_begin());
        let mut seen = Vec::new();
        loop {
            seen.push(it.word_id());
            if !it.incr() {
                break;
            }
        }
        assert_eq!(seen.len(), 3);
        for (i, id) in seen.iter().enumerate() {
            // iteration order is lexicographic; ids are a bijection
            assert_eq!(d.index(keys[i]).unwrap(), *id);
        }
    }

    #[test]
    fn prefix_keys_come_first() {
        let keys: &[&[u8]] = &[b"a", b"aa", b"aaa", b"ab"];
        let d = dawg(keys);
        let words = collect_forward(&d);
        assert_eq!(
            words,
            vec![b"a".to_vec(), b"aa".to_vec(), b"aaa".to_vec(), b"ab".to_vec()]
        );
    }
}
