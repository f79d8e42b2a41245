// Nested-LOUDS-trie DAWG invariants over realistic key sets.
//
//   - index(k) < num_words and nth_word(index(k)) == k for every key
//   - index of an absent key is None
//   - ordered iteration yields the key set ascending
//   - zero-copy reload answers identically

use zbs::trie::NestLoudsTrieDawg;
use zbs::{ByteRegion, NestLoudsTrieConfig, SortableStrVec};

fn build(keys: &[Vec<u8>], config: &NestLoudsTrieConfig) -> NestLoudsTrieDawg {
    let mut v = SortableStrVec::new();
    for k in keys {
        v.push(k);
    }
    NestLoudsTrieDawg::build_from(v, config).unwrap().0
}

fn url_keys(n: usize) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| {
            format!(
                "https://example.org/{}/{}/item-{:06}?session={}",
                ["api", "static", "cdn"][i % 3],
                ["v1/users", "v2/orders", "v1/assets/images"][i % 3],
                i * 7 % n.max(1),
                i % 17
            )
            .into_bytes()
        })
        .collect()
}

#[test]
fn bijection_and_absence() {
    let mut keys = url_keys(2000);
    keys.sort();
    keys.dedup();
    let dawg = build(&keys, &NestLoudsTrieConfig::default());
    assert_eq!(dawg.num_words(), keys.len());
    for k in &keys {
        let id = dawg.index(k).expect("present key");
        assert!(id < dawg.num_words());
        assert_eq!(dawg.nth_word(id), *k);
    }
    for k in &keys {
        let mut missing = k.clone();
        missing.push(0xFF);
        assert_eq!(dawg.index(&missing), None);
        let truncated = &k[..k.len() - 1];
        if !keys.iter().any(|x| x.as_slice() == truncated) {
            assert_eq!(dawg.index(truncated), None);
        }
    }
}

#[test]
fn ordered_iteration_is_ascending_and_complete() {
    let mut keys = url_keys(1500);
    keys.sort();
    keys.dedup();
    let dawg = build(&keys, &NestLoudsTrieConfig::default());
    let mut it = dawg.iter();
    let mut seen = Vec::with_capacity(keys.len());
    let mut more = it.seek_begin();
    while more {
        seen.push(it.word().to_vec());
        more = it.incr();
    }
    assert_eq!(seen, keys);
}

#[test]
fn lower_bound_matches_reference_search() {
    let mut keys = url_keys(800);
    keys.sort();
    keys.dedup();
    let dawg = build(&keys, &NestLoudsTrieConfig::default());
    let mut it = dawg.iter();
    let probes: Vec<Vec<u8>> = keys
        .iter()
        .step_by(29)
        .flat_map(|k| {
            let mut shorter = k.clone();
            shorter.pop();
            let mut bigger = k.clone();
            bigger.push(b'~');
            [k.clone(), shorter, bigger]
        })
        .collect();
    for p in &probes {
        let expect = keys.iter().position(|k| k.as_slice() >= p.as_slice());
        let got = it.seek_lower_bound(p);
        match expect {
            Some(idx) => {
                assert!(got, "probe {:?}", String::from_utf8_lossy(p));
                assert_eq!(it.word(), keys[idx].as_slice());
            }
            None => assert!(!got),
        }
    }
}

#[test]
fn nest_levels_change_image_not_answers() {
    let mut keys = url_keys(600);
    keys.sort();
    keys.dedup();
    let flat = build(
        &keys,
        &NestLoudsTrieConfig {
            nest_level: 1,
            ..Default::default()
        },
    );
    let nested = build(
        &keys,
        &NestLoudsTrieConfig {
            nest_level: 4,
            ..Default::default()
        },
    );
    for k in keys.iter().step_by(7) {
        assert_eq!(flat.index(k).is_some(), nested.index(k).is_some());
        let id_f = flat.index(k).unwrap();
        let id_n = nested.index(k).unwrap();
        assert_eq!(flat.nth_word(id_f), nested.nth_word(id_n));
    }
    assert_eq!(flat.nest_level(), 1);
}

#[test]
fn sorted_input_flag_skips_resort() {
    let mut keys = url_keys(300);
    keys.sort();
    keys.dedup();
    let cfg = NestLoudsTrieConfig {
        is_input_sorted: true,
        ..Default::default()
    };
    let dawg = build(&keys, &cfg);
    for k in keys.iter().step_by(11) {
        assert!(dawg.index(k).is_some());
    }
}

#[test]
fn reload_answers_identically() {
    let mut keys = url_keys(1000);
    keys.sort();
    keys.dedup();
    let dawg = build(&keys, &NestLoudsTrieConfig::default());
    let mut img = Vec::new();
    dawg.save(&mut img);
    let loaded: NestLoudsTrieDawg = NestLoudsTrieDawg::load(ByteRegion::from_vec(img)).unwrap();
    assert_eq!(loaded.num_words(), dawg.num_words());
    assert_eq!(loaded.total_zpath_len(), dawg.total_zpath_len());
    for k in keys.iter().step_by(3) {
        assert_eq!(loaded.index(k), dawg.index(k));
    }
    let mut it = loaded.iter();
    assert!(it.seek_end());
    assert_eq!(it.word(), keys.last().unwrap().as_slice());
    let mut count = 1;
    while it.decr() {
        count += 1;
    }
    assert_eq!(count, keys.len());
}

#[test]
fn tmp_dir_staging_produces_same_trie() {
    let tmp = tempfile::tempdir().unwrap();
    let mut keys = url_keys(400);
    keys.sort();
    keys.dedup();
    let plain = build(&keys, &NestLoudsTrieConfig::default());
    let staged = build(
        &keys,
        &NestLoudsTrieConfig {
            tmp_dir: Some(tmp.path().to_path_buf()),
            tmp_level: 2,
            ..Default::default()
        },
    );
    for k in keys.iter().step_by(13) {
        assert_eq!(plain.index(k), staged.index(k));
    }
}

#[test]
fn match_max_prefix_over_nested_paths() {
    let keys: Vec<Vec<u8>> = vec![
        b"/usr".to_vec(),
        b"/usr/share".to_vec(),
        b"/usr/share/doc".to_vec(),
    ];
    let dawg = build(&keys, &NestLoudsTrieConfig::default());
    let (len, id) = dawg.match_max_prefix(b"/usr/share/doc/readme");
    assert_eq!(len, b"/usr/share/doc".len());
    assert_eq!(dawg.nth_word(id.unwrap()), b"/usr/share/doc");
    let (len, _) = dawg.match_max_prefix(b"/usr/sha");
    assert_eq!(len, 4);
    assert_eq!(dawg.match_max_prefix(b"/opt"), (0, None));
}
