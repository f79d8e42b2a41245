//! Nested LOUDS trie: topology, navigation, and string reconstruction.
//!
//! The LOUDS bit sequence is `10` for the super-root followed by
//! `1^degree 0` per node in BFS order, so node ids and bit positions
//! convert through rank/select:
//!
//! - children of `s`: `bp = select0(s)`, `child0 = bp - s`,
//!   `degree = one_seq_len(bp + 1)`
//! - parent of `c`: `rank0(select1(c)) - 1`
//!
//! Every non-root node has a one-byte incoming label in `labels[node]`.
//! Nodes with fan-out >= 36 switch to a 256-bit child bitmap stored in
//! the children's label slots: 4 prefix-popcount bytes, then 32 bitmap
//! bytes keyed by byte value.
//!
//! A node's zpath (the compressed single-child chain that follows it) is
//! flagged in `is_link` and resolved through `next_link`: even values
//! point into the nested trie, odd values into this level's core pool.
//! Core records are a little-endian length field of `core_len_bytes`
//! bytes (biased by `core_min_len`) followed by the content.

use crate::error::{Error, Result};
use crate::int_vec::UintVecMin0;
use crate::rank_select::raw::ByteStore;
use crate::rank_select::{RankSelectIl256, RankSelectIndex, RankSelectOps};
use crate::region::ByteRegion;

/// Fan-out at or above which a node's children use the label bitmap.
pub(crate) const FAT_FANOUT: usize = 36;

pub struct NestLoudsTrie<R: RankSelectIndex = RankSelectIl256> {
    pub(crate) louds: R,
    pub(crate) is_link: R,
    pub(crate) next_link: UintVecMin0,
    pub(crate) labels: ByteStore,
    pub(crate) core: ByteStore,
    pub(crate) core_min_len: u32,
    pub(crate) core_len_bytes: u8,
    pub(crate) total_zpath_len: u64,
    pub(crate) next_trie: Option<Box<NestLoudsTrie<R>>>,
}

/// Where a node's zpath content lives.
pub(crate) enum Zpath<'a> {
    None,
    Core(&'a [u8]),
    /// State id in the nested trie.
    Nested(usize),
}

impl<R: RankSelectIndex> NestLoudsTrie<R> {
    /// Number of nodes (the root included).
    pub fn total_states(&self) -> usize {
        self.is_link.size()
    }

    /// Nesting depth of this trie, itself included.
    pub fn nest_level(&self) -> usize {
        1 + self.next_trie.as_ref().map_or(0, |t| t.nest_level())
    }

    /// Sum of all zpath lengths at this level.
    pub fn total_zpath_len(&self) -> u64 {
        self.total_zpath_len
    }

    /// Number of nodes carrying a zpath.
    pub fn num_zpath_states(&self) -> usize {
        self.is_link.max_rank1()
    }

    pub fn core_mem_size(&self) -> usize {
        self.core.len()
    }

    pub fn mem_size(&self) -> usize {
        self.louds.mem_size()
            + self.is_link.mem_size()
            + self.next_link.mem_size()
            + self.labels.len()
            + self.core.len()
            + self.next_trie.as_ref().map_or(0, |t| t.mem_size())
    }

    // ── topology ────────────────────────────────────────────────────────

    /// `(first_child_id, child_count)` of `s`; count 0 for leaves.
    #[inline]
    pub fn children(&self, s: usize) -> (usize, usize) {
        debug_assert!(s < self.total_states());
        let bp = self.louds.select0(s);
        let child0 = bp - s;
        let deg = self.louds.one_seq_len(bp + 1);
        (child0, deg)
    }

    pub fn num_children(&self, s: usize) -> usize {
        self.children(s).1
    }

    pub fn has_children(&self, s: usize) -> bool {
        self.num_children(s) != 0
    }

    /// Parent id; `s` must not be the root.
    #[inline]
    pub fn get_parent(&self, s: usize) -> usize {
        debug_assert!(s > 0 && s < self.total_states());
        let pos = self.louds.select1(s);
        self.louds.rank0(pos) - 1
    }

    // ── labels ──────────────────────────────────────────────────────────

    #[inline]
    fn bitmap_word(&self, child0: usize, j: usize) -> u64 {
        self.labels.read_u64(child0 + 4 + j * 8)
    }

    #[inline]
    fn bitmap_prefix(&self, child0: usize, j: usize) -> usize {
        self.labels.read_u8(child0 + j) as usize
    }

    /// Label byte of the `nth` child of a bitmap node.
    fn nth_label_fat(&self, child0: usize, nth: usize) -> u8 {
        for j in 0..4 {
            let w = self.bitmap_word(child0, j);
            let base = self.bitmap_prefix(child0, j);
            let cnt = w.count_ones() as usize;
            if nth < base + cnt {
                return (j * 64 + crate::bits::select_in_word(w, nth - base)) as u8;
            }
        }
        debug_assert!(false, "child rank {nth} outside bitmap at {child0}");
        0
    }

    /// Incoming edge label of node `s` (root has none; returns 0).
    pub fn label_of(&self, s: usize) -> u8 {
        debug_assert!(s > 0);
        let p = self.get_parent(s);
        let (child0, deg) = self.children(p);
        if deg >= FAT_FANOUT {
            self.nth_label_fat(child0, s - child0)
        } else {
            self.labels.read_u8(s)
        }
    }

    /// Label byte of child number `nth` of a node with known layout.
    pub(crate) fn nth_label(&self, child0: usize, deg: usize, nth: usize) -> u8 {
        if deg >= FAT_FANOUT {
            self.nth_label_fat(child0, nth)
        } else {
            self.labels.read_u8(child0 + nth)
        }
    }

    // ── transitions ─────────────────────────────────────────────────────

    /// Child of `s` labelled `ch`, if any.
    pub fn state_move(&self, s: usize, ch: u8) -> Option<usize> {
        let (child0, deg) = self.children(s);
        if deg == 0 {
            return None;
        }
        if deg >= FAT_FANOUT {
            let j = ch as usize / 64;
            let w = self.bitmap_word(child0, j);
            if w & (1u64 << (ch as usize % 64)) == 0 {
                return None;
            }
            let nth = self.bitmap_prefix(child0, j)
                + crate::bits::popcount_trail(w, ch as usize % 64);
            Some(child0 + nth)
        } else {
            for j in 0..deg {
                let l = self.labels.read_u8(child0 + j);
                if l == ch {
                    return Some(child0 + j);
                }
                if l > ch {
                    return None;
                }
            }
            None
        }
    }

    /// Smallest child of `s` with label >= `ch`, plus an exact-match flag.
    pub fn state_move_lower_bound(&self, s: usize, ch: u8) -> Option<(usize, bool)> {
        let (child0, deg) = self.children(s);
        if deg == 0 {
            return None;
        }
        if deg >= FAT_FANOUT {
            let start = ch as usize / 64;
            for j in start..4 {
                let mut w = self.bitmap_word(child0, j);
                if j == start {
                    let off = ch as usize % 64;
                    w &= !0u64 << off;
                }
                if w != 0 {
                    let bit = crate::bits::ctz(w);
                    let full = self.bitmap_word(child0, j);
                    let nth = self.bitmap_prefix(child0, j)
                        + crate::bits::popcount_trail(full, bit);
                    let label = (j * 64 + bit) as u8;
                    return Some((child0 + nth, label == ch));
                }
            }
            None
        } else {
            for j in 0..deg {
                let l = self.labels.read_u8(child0 + j);
                if l >= ch {
                    return Some((child0 + j, l == ch));
                }
            }
            None
        }
    }

    // ── zpaths ──────────────────────────────────────────────────────────

    /// Node carries a zpath.
    #[inline]
    pub fn is_pzip(&self, s: usize) -> bool {
        debug_assert!(s < self.total_states());
        self.is_link.is1(s)
    }

    fn link_val(&self, s: usize) -> u64 {
        let li = self.is_link.rank1(s);
        self.next_link.get(li)
    }

    fn core_record(&self, off: usize) -> &[u8] {
        let nb = self.core_len_bytes as usize;
        let mut len = 0usize;
        for k in 0..nb {
            len |= (self.core.read_u8(off + k) as usize) << (8 * k);
        }
        len += self.core_min_len as usize;
        &self.core.as_slice()[off + nb..off + nb + len]
    }

    pub(crate) fn zpath_ref(&self, s: usize) -> Zpath<'_> {
        if !self.is_pzip(s) {
            return Zpath::None;
        }
        let v = self.link_val(s);
        if v & 1 == 1 {
            Zpath::Core(self.core_record((v >> 1) as usize))
        } else {
            Zpath::Nested((v >> 1) as usize)
        }
    }

    /// Append the zpath of `s` (forward order) to `out`.
    pub fn zpath_append(&self, s: usize, out: &mut Vec<u8>) {
        match self.zpath_ref(s) {
            Zpath::None => {}
            Zpath::Core(bytes) => out.extend_from_slice(bytes),
            Zpath::Nested(inner) => {
                let t = self.next_trie.as_ref().expect("nested link without trie");
                let start = out.len();
                t.restore_rev(inner, out);
                out[start..].reverse();
            }
        }
    }

    /// ZPath length without materializing nested content.
    pub fn zpath_len(&self, s: usize) -> usize {
        match self.zpath_ref(s) {
            Zpath::None => 0,
            Zpath::Core(bytes) => bytes.len(),
            Zpath::Nested(inner) => {
                let t = self.next_trie.as_ref().expect("nested link without trie");
                t.path_len(inner)
            }
        }
    }

    fn path_len(&self, s: usize) -> usize {
        let mut len = 0usize;
        let mut v = s;
        loop {
            len += self.zpath_len(v);
            if v == 0 {
                return len;
            }
            len += 1;
            v = self.get_parent(v);
        }
    }

    /// Append the reversed root-to-`s` string. The up-walk at each level
    /// is a loop; only the nesting descent recurses, bounded by the
    /// nest-level cap.
    pub(crate) fn restore_rev(&self, s: usize, out: &mut Vec<u8>) {
        let mut v = s;
        loop {
            match self.zpath_ref(v) {
                Zpath::None => {}
                Zpath::Core(bytes) => out.extend(bytes.iter().rev()),
                Zpath::Nested(inner) => {
                    let t = self.next_trie.as_ref().expect("nested link without trie");
                    t.restore_rev(inner, out);
                }
            }
            if v == 0 {
                return;
            }
            out.push(self.label_of(v));
            v = self.get_parent(v);
        }
    }

    /// The full string spelled by the path from the root to `s`.
    pub fn restore_string(&self, s: usize) -> Vec<u8> {
        let mut out = Vec::new();
        self.restore_string_append(s, &mut out);
        out
    }

    /// Append form of [`restore_string`](Self::restore_string).
    pub fn restore_string_append(&self, s: usize, out: &mut Vec<u8>) {
        let start = out.len();
        self.restore_rev(s, out);
        out[start..].reverse();
    }

    // ── serialization ───────────────────────────────────────────────────

    /// Image: fixed 16-byte meta, then length-prefixed sections
    /// (louds, is_link, next_link, labels, core, nested image).
    pub fn save(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.total_zpath_len.to_le_bytes());
        out.extend_from_slice(&self.core_min_len.to_le_bytes());
        out.push(self.core_len_bytes);
        out.push(self.next_trie.is_some() as u8);
        out.extend_from_slice(&[0u8; 2]);
        save_section(out, |o| self.louds.save(o));
        save_section(out, |o| self.is_link.save(o));
        save_section(out, |o| self.next_link.save(o));
        save_section(out, |o| {
            o.extend_from_slice(self.labels.as_slice());
            while o.len() % 8 != 0 {
                o.push(0);
            }
        });
        save_section(out, |o| {
            o.extend_from_slice(self.core.as_slice());
            while o.len() % 8 != 0 {
                o.push(0);
            }
        });
        if let Some(t) = &self.next_trie {
            save_section(out, |o| t.save(o));
        }
    }

    pub fn load(region: ByteRegion) -> Result<Self> {
        if region.len() < 16 {
            return Err(Error::corrupt("nest_louds_trie image too small"));
        }
        let total_zpath_len = region.read_u64(0);
        let core_min_len = region.read_u32(8);
        let core_len_bytes = region.as_slice()[12];
        let has_next = region.as_slice()[13] != 0;
        if core_len_bytes > 4 {
            return Err(Error::corrupt("nest_louds_trie: bad core length width"));
        }
        let mut pos = 16usize;
        let louds = R::load(load_section(&region, &mut pos)?)?;
        let is_link = R::load(load_section(&region, &mut pos)?)?;
        let next_link = UintVecMin0::load(load_section(&region, &mut pos)?)?;
        let labels = ByteStore::Region(load_section(&region, &mut pos)?);
        let core = ByteStore::Region(load_section(&region, &mut pos)?);
        let next_trie = if has_next {
            let sub = load_section(&region, &mut pos)?;
            Some(Box::new(NestLoudsTrie::load(sub)?))
        } else {
            None
        };
        let trie = NestLoudsTrie {
            louds,
            is_link,
            next_link,
            labels,
            core,
            core_min_len,
            core_len_bytes,
            total_zpath_len,
            next_trie,
        };
        let n = trie.total_states();
        if n == 0 || trie.louds.size() != 2 * n + 1 {
            return Err(Error::corrupt("nest_louds_trie: topology size mismatch"));
        }
        Ok(trie)
    }
}

pub(crate) fn save_section(out: &mut Vec<u8>, f: impl FnOnce(&mut Vec<u8>)) {
    let len_pos = out.len();
    out.extend_from_slice(&[0u8; 8]);
    let start = out.len();
    f(out);
    let len = (out.len() - start) as u64;
    out[len_pos..len_pos + 8].copy_from_slice(&len.to_le_bytes());
}

pub(crate) fn load_section(region: &ByteRegion, pos: &mut usize) -> Result<ByteRegion> {
    if region.len() < *pos + 8 {
        return Err(Error::corrupt("section header truncated"));
    }
    let len = region.read_u64(*pos) as usize;
    if region.len() < *pos + 8 + len {
        return Err(Error::corrupt("section body truncated"));
    }
    let r = region.slice(*pos + 8, len);
    *pos += 8 + len;
    Ok(r)
}
