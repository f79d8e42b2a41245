//! Longest-match search over the DictZip dictionary.
//!
//! Two interchangeable strategies:
//!
//! - **Suffix array** (best matches): a prefix-doubling suffix array over
//!   the dictionary; the longest match for a window is found at the
//!   window's insertion point among sorted suffixes, so only the two
//!   neighbors need extending.
//! - **Hash chains** (fast path): XXH64 fingerprints of min-match-length
//!   windows with a bounded probe list per fingerprint.

use std::collections::HashMap;

use crate::xxhash::xxh64_oneshot;

pub(crate) enum MatchFinder {
    SuffixArray { sa: Vec<u32> },
    Hash {
        table: HashMap<u64, Vec<u32>>,
        window: usize,
        probe: usize,
    },
}

impl MatchFinder {
    pub fn build_suffix_array(dict: &[u8]) -> Self {
        MatchFinder::SuffixArray {
            sa: suffix_array(dict),
        }
    }

    pub fn build_hash(dict: &[u8], window: usize, probe: usize) -> Self {
        debug_assert!(window >= 2);
        let mut table: HashMap<u64, Vec<u32>> = HashMap::new();
        if dict.len() >= window {
            for i in 0..=dict.len() - window {
                let fp = xxh64_oneshot(&dict[i..i + window], 0);
                table.entry(fp).or_default().push(i as u32);
            }
        }
        MatchFinder::Hash {
            table,
            window,
            probe,
        }
    }

    /// Longest dictionary match for a prefix of `input`; `None` unless at
    /// least `min_len` bytes match.
    pub fn longest_match(
        &self,
        dict: &[u8],
        input: &[u8],
        min_len: usize,
    ) -> Option<(usize, usize)> {
        if input.len() < min_len || dict.is_empty() {
            return None;
        }
        let (off, len) = match self {
            MatchFinder::SuffixArray { sa } => sa_longest(sa, dict, input),
            MatchFinder::Hash {
                table,
                window,
                probe,
            } => hash_longest(table, *window, *probe, dict, input),
        }?;
        if len >= min_len {
            Some((off, len))
        } else {
            None
        }
    }
}

fn common_len(a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len());
    let mut i = 0;
    while i < n && a[i] == b[i] {
        i += 1;
    }
    i
}

fn sa_longest(sa: &[u32], dict: &[u8], input: &[u8]) -> Option<(usize, usize)> {
    if sa.is_empty() {
        return None;
    }
    // first suffix >= input
    let p = sa.partition_point(|&s| dict[s as usize..].lt(input));
    let mut best: Option<(usize, usize)> = None;
    for cand in [p.checked_sub(1), (p < sa.len()).then_some(p)].into_iter().flatten() {
        let off = sa[cand] as usize;
        let l = common_len(&dict[off..], input);
        if l > 0 && best.map_or(true, |(_, bl)| l > bl) {
            best = Some((off, l));
        }
    }
    best
}

fn hash_longest(
    table: &HashMap<u64, Vec<u32>>,
    window: usize,
    probe: usize,
    dict: &[u8],
    input: &[u8],
) -> Option<(usize, usize)> {
    if input.len() < window {
        return None;
    }
    let fp = xxh64_oneshot(&input[..window], 0);
    let chain = table.get(&fp)?;
    let mut best: Option<(usize, usize)> = None;
    for &pos in chain.iter().rev().take(probe) {
        let off = pos as usize;
        let l = common_len(&dict[off..], input);
        if l >= window && best.map_or(true, |(_, bl)| l > bl) {
            best = Some((off, l));
        }
    }
    best
}

/// Prefix-doubling suffix array, O(n log^2 n). Good enough for
/// dictionaries in the tens of megabytes.
pub(crate) fn suffix_array(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<u32> = (0..n as u32).collect();
    let mut rank: Vec<i64> = text.iter().map(|&b| b as i64).collect();
    let mut tmp = vec![0i64; n];
    let mut k = 1usize;
    loop {
        let key = |i: usize| -> (i64, i64) {
            let second = if i + k < n { rank[i + k] } else { -1 };
            (rank[i], second)
        };
        sa.sort_unstable_by_key(|&i| key(i as usize));
        tmp[sa[0] as usize] = 0;
        for w in 1..n {
            let prev = sa[w - 1] as usize;
            let cur = sa[w] as usize;
            tmp[cur] = tmp[prev] + i64::from(key(prev) != key(cur));
        }
        rank.copy_from_slice(&tmp);
        if rank[sa[n - 1] as usize] as usize == n - 1 {
            return sa;
        }
        k *= 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_array_of_banana() {
        let sa = suffix_array(b"banana");
        // a ana anana banana na nana
        assert_eq!(sa, [5, 3, 1, 0, 4, 2]);
    }

    #[test]
    fn suffix_array_matches_naive_sort() {
        let text = b"abracadabra-abracadabra";
        let sa = suffix_array(text);
        let mut naive: Vec<u32> = (0..text.len() as u32).collect();
        naive.sort_by(|&a, &b| text[a as usize..].cmp(&text[b as usize..]));
        assert_eq!(sa, naive);
    }

    #[test]
    fn sa_finder_finds_longest() {
        let dict = b"the quick brown fox jumps over the lazy dog";
        let f = MatchFinder::build_suffix_array(dict);
        let (off, len) = f.longest_match(dict, b"the lazy dogs bark", 4).unwrap();
        assert_eq!(&dict[off..off + len], b"the lazy dog");
        assert_eq!(len, 12);
        assert!(f.longest_match(dict, b"zzzzzz", 4).is_none());
    }

    #[test]
    fn hash_finder_agrees_on_window_matches() {
        let dict = b"abcdefgh-123456-abcdefgh-zz";
        let f = MatchFinder::build_hash(dict, 6, 16);
        let (off, len) = f.longest_match(dict, b"123456-abc!!", 6).unwrap();
        assert_eq!(&dict[off..off + len], b"123456-abc");
        assert_eq!(len, 10);
    }

    #[test]
    fn min_len_gates_short_matches() {
        let dict = b"hello world";
        let f = MatchFinder::build_suffix_array(dict);
        assert!(f.longest_match(dict, b"worxyz", 6).is_none());
        assert!(f.longest_match(dict, b"world!", 5).is_some());
    }

    #[test]
    fn empty_dict_never_matches() {
        let f = MatchFinder::build_suffix_array(b"");
        assert!(f.longest_match(b"", b"anything", 4).is_none());
        let f = MatchFinder::build_hash(b"", 6, 8);
        assert!(f.longest_match(b"", b"anything", 4).is_none());
    }
}
