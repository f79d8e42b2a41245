//! Order-1 Huffman coding.
//!
//! Each byte is coded in the context of its predecessor (context 0 for a
//! record's first byte): 256 canonical Huffman tables built from a
//! [`FreqHistO1`] histogram. Streams are MSB-first bit sequences with no
//! per-record padding: record boundaries are exact bit offsets kept by
//! the caller, and decoding runs until the cursor reaches the boundary.
//!
//! Tables serialize as the flat 256x256 code-length matrix; decoders
//! rebuild the canonical codes from lengths alone.

use crate::error::{Error, Result};

/// Longest admissible code; histograms skewed enough to exceed it are
/// rescaled until they fit.
const MAX_CODE_LEN: u32 = 56;

/// Order-1 byte histogram.
pub struct FreqHistO1 {
    counts: Vec<u64>, // [ctx * 256 + sym]
    finished: bool,
}

impl Default for FreqHistO1 {
    fn default() -> Self {
        Self::new()
    }
}

impl FreqHistO1 {
    pub fn new() -> Self {
        FreqHistO1 {
            counts: vec![0u64; 256 * 256],
            finished: false,
        }
    }

    pub fn add_record(&mut self, bytes: &[u8]) {
        debug_assert!(!self.finished);
        let mut ctx = 0usize;
        for &b in bytes {
            self.counts[ctx * 256 + b as usize] += 1;
            ctx = b as usize;
        }
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    fn context(&self, ctx: usize) -> &[u64] {
        &self.counts[ctx * 256..(ctx + 1) * 256]
    }
}

// ── bit I/O (MSB-first) ─────────────────────────────────────────────────

pub struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    cnt: u32,
    bits: usize,
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter {
            bytes: Vec::new(),
            acc: 0,
            cnt: 0,
            bits: 0,
        }
    }

    /// Total bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bits
    }

    #[inline]
    pub fn write_bits(&mut self, code: u64, len: u32) {
        debug_assert!(len <= MAX_CODE_LEN);
        debug_assert!(len == 64 || code < (1u64 << len));
        self.acc |= code << (64 - self.cnt - len);
        self.cnt += len;
        self.bits += len as usize;
        while self.cnt >= 8 {
            self.bytes.push((self.acc >> 56) as u8);
            self.acc <<= 8;
            self.cnt -= 8;
        }
    }

    /// Copy `n` bits from `src` starting at `start_bit`.
    pub fn copy_bits(&mut self, src: &[u8], start_bit: usize, n: usize) {
        let mut pos = start_bit;
        let mut left = n;
        while left > 0 {
            let take = left.min(32);
            let v = read_bits_at(src, pos, take as u32);
            self.write_bits(v, take as u32);
            pos += take;
            left -= take;
        }
    }

    /// Pad to a byte boundary and return the buffer.
    pub fn finish(mut self) -> Vec<u8> {
        if self.cnt > 0 {
            self.bytes.push((self.acc >> 56) as u8);
        }
        self.bytes
    }
}

/// `n <= 57` bits at `pos`, MSB-first; bits past the buffer read as zero.
pub(crate) fn read_bits_at(data: &[u8], pos: usize, n: u32) -> u64 {
    debug_assert!(n <= 57);
    let mut v = 0u64;
    for i in 0..n as usize {
        let p = pos + i;
        let bit = if p / 8 < data.len() {
            (data[p / 8] >> (7 - p % 8)) & 1
        } else {
            0
        };
        v = (v << 1) | bit as u64;
    }
    v
}

pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn read_bit(&mut self) -> u64 {
        let p = self.pos;
        self.pos += 1;
        if p / 8 < self.data.len() {
            ((self.data[p / 8] >> (7 - p % 8)) & 1) as u64
        } else {
            0
        }
    }
}

// ── code-length computation ─────────────────────────────────────────────

/// Huffman code lengths for one context, rescaling until the longest
/// code fits `MAX_CODE_LEN`. Zero-frequency symbols get length 0.
fn code_lengths(freqs: &[u64]) -> [u8; 256] {
    let mut scaled: Vec<u64> = freqs.to_vec();
    loop {
        let lens = tree_lengths(&scaled);
        let max = lens.iter().copied().max().unwrap_or(0);
        if (max as u32) <= MAX_CODE_LEN {
            return lens;
        }
        for f in scaled.iter_mut() {
            if *f > 0 {
                *f = *f / 2 + 1;
            }
        }
    }
}

fn tree_lengths(freqs: &[u64]) -> [u8; 256] {
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    let mut lens = [0u8; 256];
    let present: Vec<usize> = (0..256).filter(|&s| freqs[s] > 0).collect();
    match present.len() {
        0 => return lens,
        1 => {
            lens[present[0]] = 1;
            return lens;
        }
        _ => {}
    }
    // internal tree over (count, node); parents chain gives depths
    struct Node {
        left: i32,
        right: i32,
    }
    let mut nodes: Vec<Node> = Vec::with_capacity(present.len() * 2);
    let mut heap: BinaryHeap<Reverse<(u64, i32)>> = BinaryHeap::new();
    for &s in &present {
        nodes.push(Node {
            left: !(s as i32), // leaf marker: bitwise-not of the symbol
            right: 0,
        });
        heap.push(Reverse((freqs[s], (nodes.len() - 1) as i32)));
    }
    while heap.len() > 1 {
        let Reverse((ca, a)) = heap.pop().unwrap();
        let Reverse((cb, b)) = heap.pop().unwrap();
        nodes.push(Node { left: a, right: b });
        heap.push(Reverse((ca + cb, (nodes.len() - 1) as i32)));
    }
    let root = heap.pop().unwrap().0 .1;
    // iterative depth assignment
    let mut stack: Vec<(i32, u8)> = vec![(root, 0)];
    while let Some((n, depth)) = stack.pop() {
        let node = &nodes[n as usize];
        if node.left < 0 && node.right == 0 && (n as usize) < present.len() {
            lens[(!node.left) as usize] = depth.max(1);
        } else {
            stack.push((node.left, depth + 1));
            stack.push((node.right, depth + 1));
        }
    }
    lens
}

/// Canonical code values for a length assignment: symbols sorted by
/// (length, value), codes assigned in order.
fn canonical_codes(lens: &[u8; 256]) -> [u64; 256] {
    let mut codes = [0u64; 256];
    let mut order: Vec<usize> = (0..256).filter(|&s| lens[s] > 0).collect();
    order.sort_by_key(|&s| (lens[s], s));
    let mut code = 0u64;
    let mut prev_len = 0u8;
    for &s in &order {
        code <<= lens[s] - prev_len;
        codes[s] = code;
        code += 1;
        prev_len = lens[s];
    }
    codes
}

// ── encoder / decoder ───────────────────────────────────────────────────

pub struct HuffmanO1Encoder {
    codes: Vec<u64>, // [ctx * 256 + sym]
    lens: Vec<u8>,
}

impl HuffmanO1Encoder {
    pub fn from_hist(hist: &FreqHistO1) -> Self {
        let mut codes = vec![0u64; 256 * 256];
        let mut lens = vec![0u8; 256 * 256];
        for ctx in 0..256 {
            let cl = code_lengths(hist.context(ctx));
            let cc = canonical_codes(&cl);
            lens[ctx * 256..(ctx + 1) * 256].copy_from_slice(&cl);
            codes[ctx * 256..(ctx + 1) * 256].copy_from_slice(&cc);
        }
        HuffmanO1Encoder { codes, lens }
    }

    /// The flat length matrix the decoder rebuilds from.
    pub fn lengths_table(&self) -> &[u8] {
        &self.lens
    }

    pub fn encode_record(&self, bytes: &[u8], w: &mut BitWriter) -> Result<()> {
        let mut ctx = 0usize;
        for &b in bytes {
            let i = ctx * 256 + b as usize;
            let len = self.lens[i];
            if len == 0 {
                return Err(Error::invalid(format!(
                    "symbol {b:#04x} in context {ctx:#04x} has no code (histogram mismatch)"
                )));
            }
            w.write_bits(self.codes[i], len as u32);
            ctx = b as usize;
        }
        Ok(())
    }
}

/// Canonical decode tables per context.
pub struct HuffmanO1Decoder {
    // per ctx, per length 1..=MAX: first canonical code and symbol base
    first_code: Vec<u64>, // [ctx * 57 + len]
    count: Vec<u16>,      // [ctx * 57 + len]
    sym_base: Vec<u16>,   // [ctx * 57 + len]
    syms: Vec<u8>,        // symbols sorted by (len, value), per ctx
    syms_off: Vec<u32>,   // [ctx] start into syms
    max_len: Vec<u8>,     // [ctx]
}

impl HuffmanO1Decoder {
    pub fn from_lengths(lens: &[u8]) -> Result<Self> {
        if lens.len() != 256 * 256 {
            return Err(Error::corrupt("entropy table must be 65536 bytes"));
        }
        let l = MAX_CODE_LEN as usize + 1;
        let mut d = HuffmanO1Decoder {
            first_code: vec![0; 256 * l],
            count: vec![0; 256 * l],
            sym_base: vec![0; 256 * l],
            syms: Vec::new(),
            syms_off: vec![0; 256],
            max_len: vec![0; 256],
        };
        for ctx in 0..256 {
            d.syms_off[ctx] = d.syms.len() as u32;
            let cl = &lens[ctx * 256..(ctx + 1) * 256];
            let mut order: Vec<usize> = (0..256).filter(|&s| cl[s] > 0).collect();
            order.sort_by_key(|&s| (cl[s], s));
            let mut code = 0u64;
            let mut prev_len = 0u8;
            let mut base = 0u16;
            for &s in &order {
                let len = cl[s];
                if len as u32 > MAX_CODE_LEN {
                    return Err(Error::corrupt("entropy table code length too long"));
                }
                if len != prev_len {
                    code <<= len - prev_len;
                    d.first_code[ctx * l + len as usize] = code;
                    d.sym_base[ctx * l + len as usize] = base;
                    prev_len = len;
                }
                d.count[ctx * l + len as usize] += 1;
                d.syms.push(s as u8);
                code += 1;
                base += 1;
                d.max_len[ctx] = len;
            }
        }
        Ok(d)
    }

    #[inline]
    fn decode_symbol(&self, ctx: usize, r: &mut BitReader<'_>) -> Result<u8> {
        let l = MAX_CODE_LEN as usize + 1;
        let mut code = 0u64;
        for len in 1..=self.max_len[ctx] as usize {
            code = (code << 1) | r.read_bit();
            let cnt = self.count[ctx * l + len] as u64;
            if cnt > 0 {
                let first = self.first_code[ctx * l + len];
                if code >= first && code - first < cnt {
                    let idx = self.sym_base[ctx * l + len] as u64 + (code - first);
                    return Ok(self.syms[self.syms_off[ctx] as usize + idx as usize]);
                }
            }
        }
        Err(Error::corrupt(format!(
            "invalid entropy code in context {ctx:#04x}"
        )))
    }

    /// Decode bytes until the cursor reaches `end_bit` exactly.
    pub fn decode_record(
        &self,
        r: &mut BitReader<'_>,
        end_bit: usize,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let mut ctx = 0usize;
        while r.pos() < end_bit {
            let b = self.decode_symbol(ctx, r)?;
            out.push(b);
            ctx = b as usize;
        }
        if r.pos() != end_bit {
            return Err(Error::corrupt("entropy record overran its bit boundary"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(records: &[&[u8]]) {
        let mut hist = FreqHistO1::new();
        for r in records {
            hist.add_record(r);
        }
        hist.finish();
        let enc = HuffmanO1Encoder::from_hist(&hist);
        let mut w = BitWriter::new();
        let mut bounds = vec![0usize];
        for r in records {
            enc.encode_record(r, &mut w).unwrap();
            bounds.push(w.bit_len());
        }
        let stream = w.finish();
        let dec = HuffmanO1Decoder::from_lengths(enc.lengths_table()).unwrap();
        let mut rd = BitReader::new(&stream);
        for (i, r) in records.iter().enumerate() {
            rd.set_pos(bounds[i]);
            let mut out = Vec::new();
            dec.decode_record(&mut rd, bounds[i + 1], &mut out).unwrap();
            assert_eq!(out, *r, "record {i}");
        }
    }

    #[test]
    fn roundtrip_text_records() {
        roundtrip(&[
            b"the quick brown fox jumps over the lazy dog",
            b"the quick brown fox",
            b"jumps over",
            b"",
            b"the the the the",
        ]);
    }

    #[test]
    fn roundtrip_binary_records() {
        let r1: Vec<u8> = (0..=255).collect();
        let r2: Vec<u8> = (0..=255).rev().collect();
        let r3 = vec![0u8; 300];
        roundtrip(&[&r1, &r2, &r3]);
    }

    #[test]
    fn single_symbol_context() {
        // every byte identical: one-symbol tables all the way down
        roundtrip(&[&[7u8; 100]]);
    }

    #[test]
    fn bitwriter_msb_first_layout() {
        let mut w = BitWriter::new();
        w.write_bits(0b101, 3);
        w.write_bits(0b00001, 5);
        let bytes = w.finish();
        assert_eq!(bytes, vec![0b1010_0001]);
    }

    #[test]
    fn copy_bits_extracts_spans() {
        let mut w = BitWriter::new();
        w.write_bits(0xABCD, 16);
        w.write_bits(0x3, 2);
        let src = w.finish();
        let mut w2 = BitWriter::new();
        w2.copy_bits(&src, 4, 8); // the 0xBC nibbles
        let out = w2.finish();
        assert_eq!(out, vec![0xBC]);
    }

    #[test]
    fn decoder_rejects_garbage() {
        let mut hist = FreqHistO1::new();
        hist.add_record(b"aabb");
        hist.finish();
        let enc = HuffmanO1Encoder::from_hist(&hist);
        let dec = HuffmanO1Decoder::from_lengths(enc.lengths_table()).unwrap();
        // context 'a' only knows 'a' and 'b'; an impossible stream errors
        let data = [0xFFu8; 4];
        let mut r = BitReader::new(&data);
        let mut out = Vec::new();
        // 'x' (0x78) never seen in context 0
        let res = dec.decode_record(&mut r, 32, &mut out);
        let _ = res; // either way, no panic; exact outcome depends on tables
    }
}
