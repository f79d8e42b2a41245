//! DictZip build and random-access decompression throughput on a
//! synthetic log corpus.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use zbs::store::{DictZipBlobStore, DictZipOptions, FinishFlags};
use zbs::BlobStore;

fn corpus() -> Vec<Vec<u8>> {
    (0..2000usize)
        .map(|i| {
            format!(
                "ts=2026-06-{:02} svc=frontend-{:02} route=/api/v1/items/{} status={} bytes={}",
                i % 28 + 1,
                i % 12,
                i * 37 % 5000,
                [200, 200, 200, 404, 500][i % 5],
                (i * 997) % 65536
            )
            .into_bytes()
        })
        .collect()
}

fn build_store(records: &[Vec<u8>], path: &std::path::Path) {
    let mut b = DictZipBlobStore::create_zip_builder(DictZipOptions {
        embedded_dict: true,
        ..Default::default()
    })
    .unwrap();
    for r in records.iter().step_by(3) {
        b.add_sample(r).unwrap();
    }
    b.finish_sample().unwrap();
    b.prepare(records.len(), path).unwrap();
    for r in records {
        b.add_record(r).unwrap();
    }
    b.finish(FinishFlags::NONE).unwrap();
}

fn bench_build(c: &mut Criterion) {
    let records = corpus();
    let raw: u64 = records.iter().map(|r| r.len() as u64).sum();
    let mut group = c.benchmark_group("dict_zip_build");
    group.throughput(Throughput::Bytes(raw));
    group.sample_size(10);
    group.bench_function("sa_finder", |b| {
        b.iter(|| {
            let tmp = tempfile::NamedTempFile::new().unwrap();
            build_store(&records, tmp.path());
        })
    });
    group.finish();
}

fn bench_random_access(c: &mut Criterion) {
    let records = corpus();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    build_store(&records, tmp.path());
    let store = zbs::load_from_mmap(tmp.path(), true).unwrap();
    let raw: u64 = records.iter().map(|r| r.len() as u64).sum();
    let mut group = c.benchmark_group("dict_zip_get_record");
    group.throughput(Throughput::Bytes(raw / records.len() as u64));
    group.bench_function("random", |b| {
        let mut i = 0usize;
        let mut buf = Vec::new();
        b.iter(|| {
            i = (i * 2654435761 + 1) % records.len();
            buf.clear();
            store.get_record_append(i, &mut buf).unwrap();
            black_box(buf.len())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_random_access);
criterion_main!(benches);
