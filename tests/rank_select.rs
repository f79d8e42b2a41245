// Cross-variant rank/select invariants.
//
// Verifies, for every layout:
//   - rank1(i) + rank0(i) == i for all 0 <= i <= N
//   - B[select1(k)] == 1 and rank1(select1(k)) == k for all valid k
//   - FewZero/FewOne agree with a dense interleaved reference on the
//     same bits
//   - sequence-length queries match a naive scan

use zbs::rank_select::{
    BitVec, RankSelectFewOne, RankSelectFewZero, RankSelectIl256, RankSelectIndex,
    RankSelectMixedIl256, RankSelectSe256, RankSelectSe512,
};
use zbs::RankSelectOps;

fn patterns() -> Vec<(String, BitVec)> {
    let mut out = Vec::new();
    let mk = |name: &str, bits: &[bool]| {
        let mut bv = BitVec::new();
        for &b in bits {
            bv.push(b);
        }
        (name.to_string(), bv)
    };
    out.push(mk("pattern-1011001", &[true, false, true, true, false, false, true]));
    out.push(mk("empty", &[]));
    out.push(mk("single-one", &[true]));
    out.push(mk("single-zero", &[false]));

    let mut dense = BitVec::new();
    let mut sparse = BitVec::new();
    let mut runs = BitVec::new();
    let mut x = 88172645463325252u64;
    for i in 0..20_000usize {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        dense.push(x & 1 == 0);
        sparse.push(x % 61 == 0);
        runs.push((i / 97) % 2 == 0);
    }
    out.push(("dense-random".into(), dense));
    out.push(("sparse-random".into(), sparse));
    out.push(("long-runs".into(), runs));
    out
}

fn naive_one_seq_len(bv: &BitVec, pos: usize) -> usize {
    let mut n = 0;
    while pos + n < bv.size() && bv.get(pos + n) {
        n += 1;
    }
    n
}

fn check_variant<R: RankSelectOps>(name: &str, rs: &R, bv: &BitVec) {
    let n = bv.size();
    assert_eq!(rs.size(), n, "{name}: size");
    let ones = bv.count_ones();
    assert_eq!(rs.max_rank1(), ones, "{name}: max_rank1");
    assert_eq!(rs.max_rank0(), n - ones, "{name}: max_rank0");
    let step = (n / 257).max(1);
    for i in (0..=n).step_by(step) {
        assert_eq!(rs.rank1(i) + rs.rank0(i), i, "{name}: identity at {i}");
    }
    assert_eq!(rs.rank1(n), ones, "{name}: rank1(N)");
    for k in (0..ones).step_by((ones / 191).max(1)) {
        let p = rs.select1(k);
        assert!(rs.is1(p), "{name}: bit at select1({k})");
        assert_eq!(rs.rank1(p), k, "{name}: rank of select1({k})");
    }
    for k in (0..n - ones).step_by(((n - ones) / 191).max(1)) {
        let p = rs.select0(k);
        assert!(rs.is0(p), "{name}: bit at select0({k})");
        assert_eq!(rs.rank0(p), k, "{name}: rank of select0({k})");
    }
    for i in (0..n).step_by((n / 101).max(1)) {
        assert_eq!(rs.is1(i), bv.get(i), "{name}: is1({i})");
        assert_eq!(
            rs.one_seq_len(i),
            naive_one_seq_len(bv, i),
            "{name}: one_seq_len({i})"
        );
    }
}

#[test]
fn dense_layouts_hold_invariants() {
    for (name, bv) in patterns() {
        check_variant(
            &format!("se256/{name}"),
            &RankSelectSe256::from_bitvec(bv.clone()),
            &bv,
        );
        check_variant(
            &format!("se512/{name}"),
            &RankSelectSe512::from_bitvec(bv.clone()),
            &bv,
        );
        check_variant(
            &format!("il256/{name}"),
            &RankSelectIl256::from_bitvec(bv.clone()),
            &bv,
        );
    }
}

#[test]
fn few_variants_match_dense_reference() {
    for (name, bv) in patterns() {
        let dense = RankSelectIl256::from_bitvec(bv.clone());
        let ones = bv.count_ones();
        let n = bv.size();
        // pick the representation that treats the minority as rare
        if ones * 2 <= n {
            let few = RankSelectFewOne::<4>::from_bitvec(bv.clone());
            check_variant(&format!("fewone/{name}"), &few, &bv);
            for i in (0..=n).step_by((n / 113).max(1)) {
                assert_eq!(few.rank1(i), dense.rank1(i), "{name}: rank1({i})");
            }
        } else {
            let few = RankSelectFewZero::<4>::from_bitvec(bv.clone());
            check_variant(&format!("fewzero/{name}"), &few, &bv);
            for k in (0..dense.max_rank0()).step_by((dense.max_rank0() / 97).max(1)) {
                assert_eq!(few.select0(k), dense.select0(k), "{name}: select0({k})");
            }
        }
    }
}

#[test]
fn mixed_dims_match_standalone() {
    let pats = patterns();
    let (_, a) = &pats[4];
    let (_, b) = &pats[5];
    let mixed = RankSelectMixedIl256::from_bitvecs(a.clone(), b.clone());
    check_variant("mixed/dim0", &mixed.dim(0), a);
    check_variant("mixed/dim1", &mixed.dim(1), b);
}

#[test]
fn pattern_1011001_exact_values() {
    let mut bv = BitVec::new();
    for b in [true, false, true, true, false, false, true] {
        bv.push(b);
    }
    let rs = RankSelectSe256::from_bitvec(bv);
    assert_eq!((0..=7).map(|i| rs.rank1(i)).collect::<Vec<_>>(), [0, 1, 1, 2, 3, 3, 3, 4]);
    assert_eq!((0..=7).map(|i| rs.rank0(i)).collect::<Vec<_>>(), [0, 0, 1, 1, 1, 2, 3, 3]);
    assert_eq!((0..4).map(|k| rs.select1(k)).collect::<Vec<_>>(), [0, 2, 3, 6]);
    assert_eq!((0..3).map(|k| rs.select0(k)).collect::<Vec<_>>(), [1, 4, 5]);
}
