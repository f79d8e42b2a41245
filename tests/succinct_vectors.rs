// Packed integer arrays and string pools against their naive models.

use zbs::int_vec::{SortedUintVecBuilder, UintVecMin0};
use zbs::str_vec::{RevOrdStrVec, SortedStrVecBuilder, ZoSortedStrVec};
use zbs::{ByteRegion, FixedLenStrVec, SortedUintVec, StrVecOps};

// ── SortedUintVec ───────────────────────────────────────────────────────

fn sorted_vec(vals: &[u64], units: usize) -> SortedUintVec {
    let mut b = SortedUintVecBuilder::new(units).unwrap();
    for &v in vals {
        b.push(v).unwrap();
    }
    b.finish()
}

#[test]
fn sorted_uint_vec_single_block_queries() {
    let vals = [0u64, 2, 5, 7, 7, 12, 18, 18, 21];
    let v = sorted_vec(&vals, 128);
    assert_eq!(v.get(4), 7);
    assert_eq!(v.get2(3), [7, 7]);
    assert_eq!(v.lower_bound(0, 9, 7), 3);
    assert_eq!(v.upper_bound(0, 9, 7), 5);
}

#[test]
fn sorted_uint_vec_matches_truth_across_blocks() {
    for units in [64usize, 128] {
        let truth: Vec<u64> = (0..5000u64).scan(0, |acc, i| {
            *acc += i % 37;
            Some(*acc)
        }).collect();
        let v = sorted_vec(&truth, units);
        for (i, &t) in truth.iter().enumerate() {
            assert_eq!(v.get(i), t, "units {units} at {i}");
        }
        let mut buf = vec![0u64; units];
        for b in 0..v.num_blocks() {
            let n = v.get_block(b, &mut buf);
            assert_eq!(&buf[..n], &truth[b * units..(b * units + n)], "block {b}");
        }
        for key in [0u64, 1, truth[1234], truth[4999], truth[4999] + 10] {
            assert_eq!(
                v.lower_bound(0, truth.len(), key),
                truth.partition_point(|&x| x < key),
                "units {units} key {key}"
            );
        }
    }
}

#[test]
fn uint_vec_equal_range() {
    let vals = [1u64, 3, 3, 3, 9, 9, 20];
    let v = UintVecMin0::build_from(&vals);
    assert_eq!(v.equal_range(0, 7, 3), (1, 4));
    assert_eq!(v.equal_range(0, 7, 9), (4, 6));
    assert_eq!(v.equal_range(0, 7, 4), (4, 4));
}

// ── StrVec family ───────────────────────────────────────────────────────

#[test]
fn fixed_len_sort_and_bsearch() {
    let mut v = FixedLenStrVec::new(3);
    for s in [b"bca", b"abc", b"bca", b"abd"] {
        v.push(s);
    }
    v.sort();
    assert_eq!(v.lower_bound(0, 4, b"abd"), 1);
    assert_eq!(v.upper_bound(0, 4, b"abd"), 2);
    assert_eq!(v.upper_bound_at_pos(0, 4, 0, b'a'), 2);
}

#[test]
fn sorted_strvec_bounds_are_bijective_on_unique_keys() {
    let keys: Vec<Vec<u8>> = (0..400u32)
        .map(|i| format!("unique-{i:05}").into_bytes())
        .collect();
    let mut b = SortedStrVecBuilder::new();
    for k in &keys {
        b.push(k).unwrap();
    }
    let v = b.finish();
    for (i, k) in keys.iter().enumerate() {
        assert_eq!(v.lower_bound(0, v.len(), k), i);
        assert_eq!(v.upper_bound(0, v.len(), k), i + 1);
    }
}

#[test]
fn upper_bound_at_pos_agrees_with_linear_definition() {
    let keys: Vec<&[u8]> = vec![
        b"aa", b"ab", b"abc", b"ac", b"b", b"ba", b"bb", b"bbb", b"c",
    ];
    let mut b = SortedStrVecBuilder::new();
    for k in &keys {
        b.push(k).unwrap();
    }
    let v = b.finish();
    for pos in 0..3usize {
        for ch in [b'a', b'b', b'c', b'z'] {
            let linear = keys
                .iter()
                .position(|k| match k.get(pos) {
                    None => false,
                    Some(&b) => b > ch,
                })
                .unwrap_or(keys.len());
            assert_eq!(
                v.upper_bound_at_pos(0, v.len(), pos, ch),
                linear,
                "pos {pos} ch {ch}"
            );
        }
    }
}

#[test]
fn zo_sorted_offsets_survive_mmap_image() {
    let keys: Vec<Vec<u8>> = (0..800u32)
        .map(|i| format!("record/{:04}/{}", i, "pad".repeat(i as usize % 9)).into_bytes())
        .collect();
    let mut b = SortedStrVecBuilder::new();
    for k in &keys {
        b.push(k).unwrap();
    }
    let plain = b.finish();
    let zo = ZoSortedStrVec::from_sorted(&plain, 128).unwrap();
    let mut img = Vec::new();
    zo.save(&mut img);
    let loaded = ZoSortedStrVec::load(ByteRegion::from_vec(img)).unwrap();
    assert_eq!(loaded.len(), keys.len());
    for i in (0..keys.len()).step_by(13) {
        assert_eq!(loaded.nth(i), keys[i].as_slice(), "record {i}");
        assert!(loaded.nth_offset(i) <= loaded.nth_endpos(i));
    }
}

#[test]
fn rev_ord_iterates_descending_pool_ascending() {
    let mut b = SortedStrVecBuilder::new();
    for k in [b"a".as_slice(), b"m", b"z"] {
        b.push(k).unwrap();
    }
    let v = b.finish();
    let rev = RevOrdStrVec(v);
    assert_eq!(rev.nth(0), b"z");
    assert_eq!(rev.nth(1), b"m");
    assert_eq!(rev.nth(2), b"a");
}
