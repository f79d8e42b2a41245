//! Nested LOUDS trie construction.
//!
//! One BFS pass over a sorted string set emits the LOUDS bits, per-node
//! labels, and the zpath fragment list; fragment routing then decides,
//! per level, what lands in the core pool and what becomes the string
//! set of the nested trie. Node ids equal BFS enqueue order, so labels
//! can be written the moment a child is discovered.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::int_vec::UintVecMin0;
use crate::rank_select::raw::ByteStore;
use crate::rank_select::{BitVec, RankSelectIndex};
use crate::str_vec::{SortableStrVec, StrVecOps};

use super::config::NestLoudsTrieConfig;
use super::louds::{NestLoudsTrie, FAT_FANOUT};

pub(crate) struct TrieBuildOutput<R: RankSelectIndex> {
    pub trie: NestLoudsTrie<R>,
    /// For each input string (in the builder's sorted order), the node it
    /// ends at.
    pub node_of_key: Vec<u32>,
}

/// A zpath fragment, referenced into the input pool.
#[derive(Clone, Copy)]
struct Frag {
    key: u32,
    pos: u32,
    len: u32,
}

/// Build one trie level (and, recursively, its nest) from sorted input.
pub(crate) fn build_trie<R: RankSelectIndex>(
    strs: &SortableStrVec,
    level_remaining: usize,
    config: &NestLoudsTrieConfig,
) -> Result<TrieBuildOutput<R>> {
    debug_assert!(level_remaining >= 1);
    let n = strs.len();
    if n > u32::MAX as usize {
        return Err(Error::LengthError {
            field: "trie key count",
            value: n as u64,
            limit: u32::MAX as u64,
        });
    }

    let mut louds = BitVec::new();
    louds.push(true); // super-root edge to the root
    louds.push(false);
    let mut labels: Vec<u8> = vec![0]; // root slot, unused
    let mut is_link = BitVec::new();
    let mut fragments: Vec<Frag> = Vec::new();
    let mut node_of_key = vec![0u32; n];
    let mut total_zpath = 0u64;

    let mut queue: VecDeque<(u32, u32, u32)> = VecDeque::new();
    queue.push_back((0, n as u32, 0));
    let mut enqueued = 1usize;
    let mut node_id = 0usize;

    while let Some((lo, hi, pos)) = queue.pop_front() {
        let s = node_id;
        node_id += 1;
        let (lo, hi, pos) = (lo as usize, hi as usize, pos as usize);
        if lo == hi {
            // only the root of an empty key set
            is_link.push(false);
            louds.push(false);
            continue;
        }
        // sorted range: its common prefix is lcp(first, last)
        let first = strs.nth(lo);
        let last = strs.nth(hi - 1);
        let lcp = common_prefix(&first[pos..], &last[pos..]);
        let zlen = cap_fragment(&first[pos..pos + lcp], config);
        is_link.push(zlen > 0);
        if zlen > 0 {
            fragments.push(Frag {
                key: lo as u32,
                pos: pos as u32,
                len: zlen as u32,
            });
            total_zpath += zlen as u64;
        }
        let pos2 = pos + zlen;

        // keys ending at this node come first in the range
        let ends = {
            let mut l = lo;
            let mut h = hi;
            while l < h {
                let m = (l + h) / 2;
                if strs.nth_size(m) <= pos2 {
                    l = m + 1;
                } else {
                    h = m;
                }
            }
            l
        };
        for slot in node_of_key.iter_mut().take(ends).skip(lo) {
            *slot = s as u32;
        }

        // children: one per distinct next byte, ascending
        let child_start_id = enqueued;
        let mut deg = 0usize;
        let mut i = ends;
        while i < hi {
            let c = strs.nth(i)[pos2];
            let j = strs.upper_bound_at_pos(i, hi, pos2, c);
            labels.push(c);
            louds.push(true);
            queue.push_back((i as u32, j as u32, (pos2 + 1) as u32));
            enqueued += 1;
            deg += 1;
            i = j;
        }
        louds.push(false);
        if deg >= FAT_FANOUT {
            install_label_bitmap(&mut labels, child_start_id, deg);
        }
    }
    debug_assert_eq!(node_id, enqueued);
    debug_assert_eq!(labels.len(), enqueued);
    let num_nodes = enqueued;

    // ── fragment routing ────────────────────────────────────────────────
    let frag_bytes: usize = fragments.iter().map(|f| f.len as usize).sum();
    let pool_cur = strs.total_size().max(1);
    // pool-shrink gate: nesting pays off only when the fragment pool is a
    // substantial share of the input pool
    let gate_ok = frag_bytes * (config.nest_scale.max(1) as usize) >= pool_cur;
    let do_nest = level_remaining > 1 && !fragments.is_empty() && gate_ok;
    let to_nested = |len: usize| -> bool {
        do_nest && (!config.use_mixed_core_link || len >= config.min_link_str_len)
    };

    let mut core_frags: Vec<usize> = Vec::new();
    let mut nested_frags: Vec<usize> = Vec::new();
    for (fi, f) in fragments.iter().enumerate() {
        if to_nested(f.len as usize) {
            nested_frags.push(fi);
        } else {
            core_frags.push(fi);
        }
    }

    let frag_bytes_of = |f: &Frag| -> &[u8] {
        let k = strs.nth(f.key as usize);
        &k[f.pos as usize..(f.pos + f.len) as usize]
    };

    // core pool: length-prefixed records, identical fragments shared
    let (core, core_min_len, core_len_bytes, core_offsets) = {
        let mut min_len = usize::MAX;
        let mut max_len = 0usize;
        for &fi in &core_frags {
            let l = fragments[fi].len as usize;
            min_len = min_len.min(l);
            max_len = max_len.max(l);
        }
        if core_frags.is_empty() {
            min_len = 0;
        }
        let delta = max_len.saturating_sub(min_len);
        let len_bytes = if delta == 0 {
            0usize
        } else {
            (UintVecMin0::compute_width(delta as u64) + 7) / 8
        };
        let mut pool: Vec<u8> = Vec::new();
        let mut offsets: HashMap<usize, usize> = HashMap::new(); // frag idx -> offset
        let mut dedup: HashMap<&[u8], usize> = HashMap::new();
        for &fi in &core_frags {
            let bytes = frag_bytes_of(&fragments[fi]);
            let off = *dedup.entry(bytes).or_insert_with(|| {
                let off = pool.len();
                let biased = (bytes.len() - min_len) as u64;
                pool.extend_from_slice(&biased.to_le_bytes()[..len_bytes]);
                pool.extend_from_slice(bytes);
                off
            });
            offsets.insert(fi, off);
        }
        (pool, min_len, len_bytes, offsets)
    };

    // nested pool: recurse
    let (next_trie, nested_states) = if nested_frags.is_empty() {
        (None, HashMap::new())
    } else {
        let mut pool = SortableStrVec::with_capacity(nested_frags.len(), frag_bytes);
        for &fi in &nested_frags {
            pool.push(frag_bytes_of(&fragments[fi]));
        }
        let mut pool = stage_through_tmp(pool, config)?;
        let rank = pool.sort_by_content();
        let inner: TrieBuildOutput<R> = build_trie(&pool, level_remaining - 1, config)?;
        let mut states: HashMap<usize, usize> = HashMap::with_capacity(nested_frags.len());
        for (ni, &fi) in nested_frags.iter().enumerate() {
            let sorted_idx = rank[ni] as usize;
            states.insert(fi, inner.node_of_key[sorted_idx] as usize);
        }
        (Some(Box::new(inner.trie)), states)
    };

    // link values in node order, tagged: even = nested state, odd = core
    let mut link_vals: Vec<u64> = Vec::with_capacity(fragments.len());
    for fi in 0..fragments.len() {
        let v = if let Some(&st) = nested_states.get(&fi) {
            (st as u64) << 1
        } else {
            let off = core_offsets[&fi] as u64;
            (off << 1) | 1
        };
        link_vals.push(v);
    }
    let next_link = UintVecMin0::build_from(&link_vals);

    debug_assert_eq!(louds.size(), 2 * num_nodes + 1);
    let trie = NestLoudsTrie {
        louds: R::from_bitvec(louds),
        is_link: R::from_bitvec(is_link),
        next_link,
        labels: ByteStore::Owned(labels),
        core: ByteStore::Owned(core),
        core_min_len: core_min_len as u32,
        core_len_bytes: core_len_bytes as u8,
        total_zpath_len: total_zpath,
        next_trie,
    };
    Ok(TrieBuildOutput { trie, node_of_key })
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len());
    let mut i = 0;
    while i < n && a[i] == b[i] {
        i += 1;
    }
    i
}

/// Cap a zpath at `max_frag_len`, preferring to cut just after a
/// delimiter byte when one lies in `[min_frag_len, cap)`.
fn cap_fragment(z: &[u8], config: &NestLoudsTrieConfig) -> usize {
    if z.len() <= config.max_frag_len {
        return z.len();
    }
    let cap = config.max_frag_len.max(1);
    let floor = config.min_frag_len.clamp(1, cap);
    for i in (floor..cap).rev() {
        if config.is_best_delim(z[i - 1]) {
            return i;
        }
    }
    cap
}

/// Replace the raw child labels with the fat-node layout: 4 prefix
/// popcount bytes + a 32-byte bitmap keyed by label value.
fn install_label_bitmap(labels: &mut [u8], child0: usize, deg: usize) {
    debug_assert!(deg >= FAT_FANOUT);
    let mut bm = [0u64; 4];
    for j in 0..deg {
        let c = labels[child0 + j] as usize;
        bm[c / 64] |= 1u64 << (c % 64);
    }
    let mut acc = 0u8;
    for j in 0..4 {
        labels[child0 + j] = acc;
        acc = acc.wrapping_add(bm[j].count_ones() as u8);
        labels[child0 + 4 + j * 8..child0 + 12 + j * 8].copy_from_slice(&bm[j].to_le_bytes());
    }
}

/// At `tmp_level >= 2` with a `tmp_dir`, spill the fragment pool to disk
/// and read it back, bounding peak memory between levels.
fn stage_through_tmp(pool: SortableStrVec, config: &NestLoudsTrieConfig) -> Result<SortableStrVec> {
    let dir = match (&config.tmp_dir, config.tmp_level >= 2) {
        (Some(dir), true) => dir.clone(),
        _ => return Ok(pool),
    };
    let path = dir.join(format!("zbs-nlt-pool-{}.tmp", std::process::id()));
    {
        let mut f = std::fs::File::create(&path).map_err(|e| Error::io(&path, e))?;
        for i in 0..pool.len() {
            let s = pool.nth(i);
            f.write_all(&(s.len() as u32).to_le_bytes())
                .map_err(|e| Error::io(&path, e))?;
            f.write_all(s).map_err(|e| Error::io(&path, e))?;
        }
        f.flush().map_err(|e| Error::io(&path, e))?;
    }
    let count = pool.len();
    drop(pool);
    let mut bytes = Vec::new();
    std::fs::File::open(&path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(|e| Error::io(&path, e))?;
    let _ = std::fs::remove_file(&path);
    let mut restored = SortableStrVec::with_capacity(count, bytes.len());
    let mut off = 0usize;
    for _ in 0..count {
        if off + 4 > bytes.len() {
            return Err(Error::corrupt("trie tmp pool truncated"));
        }
        let len = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()) as usize;
        off += 4;
        if off + len > bytes.len() {
            return Err(Error::corrupt("trie tmp pool truncated"));
        }
        restored.push(&bytes[off..off + len]);
        off += len;
    }
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank_select::RankSelectIl256;

    fn build(keys: &[&[u8]]) -> TrieBuildOutput<RankSelectIl256> {
        let mut v = SortableStrVec::new();
        for k in keys {
            v.push(k);
        }
        v.sort_by_content();
        build_trie(&v, 3, &NestLoudsTrieConfig::default()).unwrap()
    }

    #[test]
    fn single_key_collapses_to_zpath() {
        let out = build(&[b"hello-world"]);
        assert_eq!(out.trie.total_states(), 1);
        assert_eq!(out.trie.restore_string(0), b"hello-world");
        assert_eq!(out.trie.total_zpath_len(), 11);
    }

    #[test]
    fn sibling_keys_share_prefix_node() {
        let out = build(&[b"abcx", b"abcy"]);
        // root with zpath "abc", two children x/y
        let t = &out.trie;
        assert_eq!(t.total_states(), 3);
        assert!(t.is_pzip(0));
        let (child0, deg) = t.children(0);
        assert_eq!((child0, deg), (1, 2));
        assert_eq!(t.restore_string(t.state_move(0, b'x').unwrap()), b"abcx");
        assert_eq!(t.restore_string(t.state_move(0, b'y').unwrap()), b"abcy");
        assert_eq!(t.state_move(0, b'z'), None);
    }

    #[test]
    fn node_of_key_maps_every_input() {
        let keys: &[&[u8]] = &[b"a", b"ab", b"abc", b"b", b"ba"];
        let out = build(keys);
        for (i, k) in keys.iter().enumerate() {
            let node = out.node_of_key[i] as usize;
            assert_eq!(out.trie.restore_string(node), *k, "key {i}");
        }
    }

    #[test]
    fn fat_node_bitmap_layout() {
        // 200 children of the root forces the bitmap path
        let keys: Vec<Vec<u8>> = (0..200u16)
            .map(|i| vec![(i % 250) as u8, (i / 250) as u8, b'x'])
            .collect();
        let mut v = SortableStrVec::new();
        for k in &keys {
            v.push(k);
        }
        v.sort_by_content();
        let out: TrieBuildOutput<RankSelectIl256> =
            build_trie(&v, 2, &NestLoudsTrieConfig::default()).unwrap();
        let t = &out.trie;
        let (_, deg) = t.children(0);
        assert!(deg >= FAT_FANOUT);
        for i in 0..v.len() {
            let node = out.node_of_key[i] as usize;
            assert_eq!(t.restore_string(node), v.nth(i), "key {i}");
        }
        // transitions agree with labels
        assert!(t.state_move(0, 0).is_some());
        assert!(t.state_move(0, 251).is_none());
    }

    #[test]
    fn long_zpath_splits_at_max_frag_len() {
        let mut cfg = NestLoudsTrieConfig {
            max_frag_len: 8,
            ..Default::default()
        };
        cfg.nest_level = 1;
        let long: Vec<u8> = (0..50u8).collect();
        let mut v = SortableStrVec::new();
        v.push(&long);
        v.sort_by_content();
        let out: TrieBuildOutput<RankSelectIl256> = build_trie(&v, 1, &cfg).unwrap();
        // chain of nodes, each zpath <= 8
        assert!(out.trie.total_states() > 1);
        assert_eq!(out.trie.restore_string(out.node_of_key[0] as usize), long);
    }

    #[test]
    fn delimiter_guides_fragment_cut() {
        let mut cfg = NestLoudsTrieConfig {
            max_frag_len: 10,
            min_frag_len: 2,
            ..Default::default()
        };
        cfg.set_best_delims(b"/");
        assert_eq!(cap_fragment(b"abc/defghijklm", &cfg), 4);
        assert_eq!(cap_fragment(b"abcdefghijklmn", &cfg), 10);
        assert_eq!(cap_fragment(b"short", &cfg), 5);
    }

    #[test]
    fn duplicates_share_a_terminal() {
        let out = build(&[b"dup", b"dup", b"dup"]);
        assert_eq!(out.node_of_key[0], out.node_of_key[1]);
        assert_eq!(out.node_of_key[1], out.node_of_key[2]);
    }
}
