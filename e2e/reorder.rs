// Reorder round-trips: (build + reorder by π)(i) == build(π(i)), and the
// identity permutation reproduces the original image byte for byte.

use std::path::Path;

use zbs::store::{
    DictZipBlobStore, DictZipOptions, FinishFlags, NltStoreBuilder, PlainBlobStoreBuilder,
    ZipOffsetBuilder, ZReorderMap,
};
use zbs::{BlobStore, ChecksumLevel, ChecksumType, NestLoudsTrieConfig};

fn corpus() -> Vec<Vec<u8>> {
    (0..260usize)
        .map(|i| format!("payload-{i:04}-{}", "z".repeat(i % 19)).into_bytes())
        .collect()
}

fn build_plain(records: &[Vec<u8>], path: &Path, level: ChecksumLevel) {
    let mut b =
        PlainBlobStoreBuilder::new(0, records.len(), path, 0, level, ChecksumType::Crc32c)
            .unwrap();
    for r in records {
        b.add_record(r).unwrap();
    }
    b.finish().unwrap();
}

fn build_zip_offset(records: &[Vec<u8>], path: &Path) {
    let mut b = ZipOffsetBuilder::new(
        64,
        path,
        0,
        ChecksumLevel::HeaderOnly,
        ChecksumType::Crc32c,
    )
    .unwrap();
    for r in records {
        b.add_record(r).unwrap();
    }
    b.finish().unwrap();
}

fn build_dict_zip(records: &[Vec<u8>], path: &Path) {
    let mut b = DictZipBlobStore::create_zip_builder(DictZipOptions {
        embedded_dict: true,
        ..Default::default()
    })
    .unwrap();
    for r in records {
        b.add_sample(r).unwrap();
    }
    b.finish_sample().unwrap();
    b.prepare(records.len(), path).unwrap();
    for r in records {
        b.add_record(r).unwrap();
    }
    b.finish(FinishFlags::NONE).unwrap();
}

fn build_nlt(records: &[Vec<u8>], path: &Path) {
    let mut b = NltStoreBuilder::new(
        NestLoudsTrieConfig::default(),
        path,
        0,
        ChecksumLevel::HeaderOnly,
        ChecksumType::Crc32c,
    );
    for r in records {
        b.add_record(r);
    }
    b.finish().unwrap();
}

fn reorder_to_bytes(store: &dyn BlobStore, map: &ZReorderMap) -> Vec<u8> {
    let mut out = Vec::new();
    store
        .reorder_zip_data(
            map,
            &mut |chunk: &[u8]| {
                out.extend_from_slice(chunk);
                Ok(())
            },
            None,
        )
        .unwrap();
    out
}

fn reversed_perm(n: usize) -> ZReorderMap {
    let perm: Vec<u64> = (0..n as u64).rev().collect();
    ZReorderMap::from_perm(&perm).unwrap()
}

#[test]
fn identity_reorder_is_byte_equal_plain() {
    let records = corpus();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    build_plain(&records, tmp.path(), ChecksumLevel::PerRecord);
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    let out = reorder_to_bytes(store.as_ref(), &ZReorderMap::identity(records.len()));
    assert_eq!(out, std::fs::read(tmp.path()).unwrap());
}

#[test]
fn identity_reorder_is_byte_equal_dict_zip() {
    let records = corpus();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    build_dict_zip(&records, tmp.path());
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    let out = reorder_to_bytes(store.as_ref(), &ZReorderMap::identity(records.len()));
    assert_eq!(out, std::fs::read(tmp.path()).unwrap());
}

#[test]
fn reversed_reorder_permutes_records() {
    let records = corpus();
    let n = records.len();
    type BuildFn = fn(&[Vec<u8>], &Path);
    let builders: &[(&str, BuildFn)] = &[
        ("zip_offset", build_zip_offset as BuildFn),
        ("dict_zip", build_dict_zip as BuildFn),
        ("nlt", build_nlt as BuildFn),
    ];
    for (kind, build) in builders {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        build(&records, tmp.path());
        let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
        let out = reorder_to_bytes(store.as_ref(), &reversed_perm(n));
        let reordered = zbs::load_user_mem(zbs::ByteRegion::from_vec(out)).unwrap();
        assert_eq!(reordered.num_records(), n, "{kind}");
        for i in 0..n {
            assert_eq!(
                reordered.get_record(i).unwrap(),
                records[n - 1 - i],
                "{kind}: record {i}"
            );
        }
    }
}

#[test]
fn reorder_preserves_per_record_checksums() {
    let records = corpus();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    build_plain(&records, tmp.path(), ChecksumLevel::PerRecord);
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    let out = reorder_to_bytes(store.as_ref(), &reversed_perm(records.len()));
    let reordered = zbs::load_user_mem(zbs::ByteRegion::from_vec(out)).unwrap();
    for i in (0..records.len()).step_by(17) {
        assert_eq!(
            reordered.get_record(i).unwrap(),
            records[records.len() - 1 - i]
        );
    }
}

#[test]
fn reorder_rejects_wrong_domain() {
    let records = corpus();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    build_plain(&records, tmp.path(), ChecksumLevel::HeaderOnly);
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    let small = ZReorderMap::identity(3);
    let mut sink = |_: &[u8]| Ok(());
    assert!(store.reorder_zip_data(&small, &mut sink, None).is_err());
}

#[test]
fn double_reverse_restores_original_records() {
    let records = corpus();
    let n = records.len();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    build_zip_offset(&records, tmp.path());
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    let once = reorder_to_bytes(store.as_ref(), &reversed_perm(n));
    let mid = zbs::load_user_mem(zbs::ByteRegion::from_vec(once)).unwrap();
    let twice = reorder_to_bytes(mid.as_ref(), &reversed_perm(n));
    let fin = zbs::load_user_mem(zbs::ByteRegion::from_vec(twice)).unwrap();
    for i in (0..n).step_by(11) {
        assert_eq!(fin.get_record(i).unwrap(), records[i]);
    }
}
