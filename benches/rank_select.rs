//! Rank/select microbenchmarks: interleaved vs separated layouts and the
//! sparse representation, over a 4 Mbit vector.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use zbs::rank_select::{BitVec, RankSelectFewOne, RankSelectIl256, RankSelectIndex, RankSelectSe256};
use zbs::RankSelectOps;

const N: usize = 4 << 20;

fn dense_bits() -> BitVec {
    let mut bv = BitVec::with_capacity(N);
    let mut x = 0x9E3779B97F4A7C15u64;
    for _ in 0..N {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        bv.push(x & 3 == 0);
    }
    bv
}

fn sparse_bits() -> BitVec {
    let mut bv = BitVec::with_size(N, false);
    let mut i = 11usize;
    while i < N {
        bv.set1(i);
        i += 89 + i % 41;
    }
    bv
}

fn bench_rank(c: &mut Criterion) {
    let il = RankSelectIl256::from_bitvec(dense_bits());
    let se = RankSelectSe256::from_bitvec(dense_bits());
    let mut group = c.benchmark_group("rank1");
    group.bench_function("il_256", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i * 2654435761 + 7) % N;
            black_box(il.rank1(i))
        })
    });
    group.bench_function("se_256", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i * 2654435761 + 7) % N;
            black_box(se.rank1(i))
        })
    });
    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let il = RankSelectIl256::from_bitvec(dense_bits());
    let few = RankSelectFewOne::<4>::from_bitvec(sparse_bits());
    let mut group = c.benchmark_group("select1");
    let il_max = il.max_rank1();
    group.bench_function("il_256_dense", |b| {
        let mut k = 0usize;
        b.iter(|| {
            k = (k * 2654435761 + 13) % il_max;
            black_box(il.select1(k))
        })
    });
    let few_max = few.max_rank1();
    group.bench_function("few_one_sparse", |b| {
        let mut k = 0usize;
        b.iter(|| {
            k = (k * 2654435761 + 13) % few_max;
            black_box(few.select1(k))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_rank, bench_select);
criterion_main!(benches);
