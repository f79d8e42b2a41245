// End-to-end ordered iteration over a trie store on disk: build with the
// CLI-facing builder, reload via the store loader, then drive the
// lexicographic iterator against a reference BTreeSet.

use std::collections::BTreeSet;

use zbs::store::{NestLoudsTrieBlobStore, NltStoreBuilder};
use zbs::{BlobStore, ChecksumLevel, ChecksumType, NestLoudsTrieConfig};

fn dictionary_words() -> Vec<Vec<u8>> {
    let stems = [
        "act", "break", "call", "draw", "end", "form", "give", "hold", "issue", "join",
        "keep", "lead", "make", "note", "open", "pass", "quote", "rise", "send", "turn",
    ];
    let suffixes = ["", "ed", "ing", "s", "er", "ers", "ment", "ments", "able"];
    let mut words = Vec::new();
    for s in &stems {
        for suf in &suffixes {
            words.push(format!("{s}{suf}").into_bytes());
        }
    }
    words
}

fn build_store(words: &[Vec<u8>]) -> tempfile::NamedTempFile {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut b = NltStoreBuilder::new(
        NestLoudsTrieConfig::default(),
        tmp.path(),
        0,
        ChecksumLevel::HeaderOnly,
        ChecksumType::Crc32c,
    );
    for w in words {
        b.add_record(w);
    }
    b.finish().unwrap();
    tmp
}

fn open_nlt(path: &std::path::Path) -> NestLoudsTrieBlobStore {
    // the boxed loader hides the dawg surface; reopen concretely
    let region = zbs::ByteRegion::from_vec(std::fs::read(path).unwrap());
    NestLoudsTrieBlobStore::load_user_mem(region).unwrap()
}

#[test]
fn iteration_matches_btreeset_order() {
    let words = dictionary_words();
    let tmp = build_store(&words);
    let store = open_nlt(tmp.path());
    let dawg = store.dawg();
    let reference: BTreeSet<Vec<u8>> = words.iter().cloned().collect();
    let mut it = dawg.iter();
    let mut got = Vec::new();
    let mut more = it.seek_begin();
    while more {
        got.push(it.word().to_vec());
        more = it.incr();
    }
    let expect: Vec<Vec<u8>> = reference.iter().cloned().collect();
    assert_eq!(got, expect);
}

#[test]
fn seek_lower_bound_walks_like_btree_range() {
    let words = dictionary_words();
    let tmp = build_store(&words);
    let store = open_nlt(tmp.path());
    let dawg = store.dawg();
    let reference: BTreeSet<Vec<u8>> = words.iter().cloned().collect();
    let mut it = dawg.iter();
    for probe in ["a", "calle", "making", "zz", "holders", "quote"] {
        let expect = reference
            .range(probe.as_bytes().to_vec()..)
            .next()
            .cloned();
        let got = it.seek_lower_bound(probe.as_bytes());
        match expect {
            Some(w) => {
                assert!(got, "probe {probe}");
                assert_eq!(it.word(), w.as_slice(), "probe {probe}");
            }
            None => assert!(!got, "probe {probe}"),
        }
    }
}

#[test]
fn iterator_ids_round_trip_through_index() {
    let words = dictionary_words();
    let tmp = build_store(&words);
    let store = open_nlt(tmp.path());
    let dawg = store.dawg();
    let mut it = dawg.iter();
    let mut more = it.seek_begin();
    while more {
        let id = it.word_id();
        assert_eq!(dawg.index(it.word()), Some(id));
        assert_eq!(dawg.nth_word(id), it.word());
        more = it.incr();
    }
}

#[test]
fn store_records_keep_input_order_while_iter_is_sorted() {
    let words = dictionary_words(); // generation order, not sorted
    let tmp = build_store(&words);
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    for (i, w) in words.iter().enumerate().step_by(7) {
        assert_eq!(store.get_record(i).unwrap(), *w, "record {i}");
    }
}

#[test]
fn backward_iteration_from_seek_end() {
    let words = dictionary_words();
    let tmp = build_store(&words);
    let store = open_nlt(tmp.path());
    let dawg = store.dawg();
    let mut reference: Vec<Vec<u8>> = {
        let s: BTreeSet<Vec<u8>> = words.iter().cloned().collect();
        s.into_iter().collect()
    };
    reference.reverse();
    let mut it = dawg.iter();
    let mut got = Vec::new();
    let mut more = it.seek_end();
    while more {
        got.push(it.word().to_vec());
        more = it.decr();
    }
    assert_eq!(got, reference);
}
