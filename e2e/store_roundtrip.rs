// End-to-end: build every store variant on disk, reload through the
// class-dispatching loader, and verify the record contract:
//   get_record(i) == original[i], num_records, total_data_size,
//   header tamper detection.

use std::path::Path;

use zbs::store::entropy::FreqHistO1;
use zbs::store::{
    DictZipBlobStore, DictZipOptions, EntropyZipBuilder, FinishFlags, MixedLenBuilder,
    NltStoreBuilder, PlainBlobStoreBuilder, ZipOffsetBuilder,
};
use zbs::{BlobStore, ChecksumLevel, ChecksumType, NestLoudsTrieConfig};

fn corpus() -> Vec<Vec<u8>> {
    (0..500usize)
        .map(|i| {
            if i % 11 == 5 {
                Vec::new() // empty records must survive every variant
            } else {
                format!(
                    "row={{id:{i:05}, shard:{}, path:\"/data/part-{:03}\", note:\"{}\"}}",
                    i % 8,
                    i % 40,
                    "lorem ipsum ".repeat(i % 4)
                )
                .into_bytes()
            }
        })
        .collect()
}

fn build_variant(kind: &str, records: &[Vec<u8>], path: &Path, level: ChecksumLevel) {
    let ty = ChecksumType::Crc32c;
    match kind {
        "plain" => {
            let mut b = PlainBlobStoreBuilder::new(0, records.len(), path, 0, level, ty).unwrap();
            for r in records {
                b.add_record(r).unwrap();
            }
            b.finish().unwrap();
        }
        "mixed_len" => {
            let mut b = MixedLenBuilder::new(16, 0, 0, path, 0, level, ty).unwrap();
            for r in records {
                b.add_record(r).unwrap();
            }
            b.finish().unwrap();
        }
        "zip_offset" => {
            let mut b = ZipOffsetBuilder::new(128, path, 0, level, ty).unwrap();
            for r in records {
                b.add_record(r).unwrap();
            }
            b.finish().unwrap();
        }
        "entropy_zip" => {
            let mut hist = FreqHistO1::new();
            for r in records {
                hist.add_record(r);
            }
            hist.finish();
            let mut b = EntropyZipBuilder::new(&hist, 64, path, 0, level, ty).unwrap();
            for r in records {
                b.add_record(r).unwrap();
            }
            b.finish().unwrap();
        }
        "dict_zip" => {
            let opt = DictZipOptions {
                checksum_level: level,
                embedded_dict: true,
                ..Default::default()
            };
            let mut b = DictZipBlobStore::create_zip_builder(opt).unwrap();
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
        "nlt" => {
            let mut b =
                NltStoreBuilder::new(NestLoudsTrieConfig::default(), path, 0, level, ty);
            for r in records {
                b.add_record(r);
            }
            b.finish().unwrap();
        }
        other => panic!("unknown variant {other}"),
    }
}

const VARIANTS: &[&str] = &[
    "plain",
    "mixed_len",
    "zip_offset",
    "entropy_zip",
    "dict_zip",
    "nlt",
];

#[test]
fn every_variant_roundtrips() {
    let records = corpus();
    let total: u64 = records.iter().map(|r| r.len() as u64).sum();
    for kind in VARIANTS {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        build_variant(kind, &records, tmp.path(), ChecksumLevel::HeaderOnly);
        let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
        assert_eq!(store.num_records(), records.len(), "{kind}: num_records");
        assert_eq!(store.total_data_size(), total, "{kind}: total_data_size");
        for (i, r) in records.iter().enumerate() {
            assert_eq!(store.get_record(i).unwrap(), *r, "{kind}: record {i}");
        }
        assert!(store.mem_size() > 0, "{kind}: mem_size");
    }
}

#[test]
fn populate_flag_load_works() {
    let records = corpus();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    build_variant("plain", &records, tmp.path(), ChecksumLevel::HeaderOnly);
    let store = zbs::load_from_mmap(tmp.path(), true).unwrap();
    assert_eq!(store.get_record(3).unwrap(), records[3]);
}

#[test]
fn user_mem_load_borrows_buffer() {
    let records = corpus();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    build_variant("zip_offset", &records, tmp.path(), ChecksumLevel::HeaderOnly);
    let bytes = std::fs::read(tmp.path()).unwrap();
    let store = zbs::load_user_mem(zbs::ByteRegion::from_vec(bytes)).unwrap();
    assert_eq!(store.num_records(), records.len());
    assert_eq!(store.get_record(42).unwrap(), records[42]);
}

#[test]
fn header_corruption_is_rejected_for_all_variants() {
    let records = corpus();
    for kind in VARIANTS {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        build_variant(kind, &records, tmp.path(), ChecksumLevel::HeaderOnly);
        let mut bytes = std::fs::read(tmp.path()).unwrap();
        bytes[60] ^= 0x01; // content_size field
        std::fs::write(tmp.path(), &bytes).unwrap();
        let err = match zbs::load_from_mmap(tmp.path(), false) {
            Err(e) => e,
            Ok(_) => panic!("{kind}: expected load_from_mmap to fail"),
        };
        assert!(err.is_bad_checksum(), "{kind}: header flip not caught");
    }
}

#[test]
fn per_record_level_detects_single_byte_damage() {
    let records = corpus();
    for kind in ["plain", "mixed_len", "zip_offset", "dict_zip", "entropy_zip"] {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        build_variant(kind, &records, tmp.path(), ChecksumLevel::PerRecord);
        // sanity: everything still reads back
        let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
        for (i, r) in records.iter().enumerate().step_by(37) {
            assert_eq!(store.get_record(i).unwrap(), *r, "{kind}: record {i}");
        }
        drop(store);
        // flip one payload byte; some record must now fail checksum
        let mut bytes = std::fs::read(tmp.path()).unwrap();
        let idx = 128 + bytes.len() % 97;
        bytes[idx] ^= 0x80;
        std::fs::write(tmp.path(), &bytes).unwrap();
        let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
        let mut failures = 0;
        for i in 0..store.num_records() {
            if store.get_record(i).is_err() {
                failures += 1;
            }
        }
        assert!(failures > 0, "{kind}: corruption went unnoticed");
    }
}

#[test]
fn whole_data_level_verifies_at_load() {
    let records = corpus();
    for kind in ["plain", "zip_offset", "dict_zip"] {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        build_variant(kind, &records, tmp.path(), ChecksumLevel::WholeData);
        assert!(zbs::load_from_mmap(tmp.path(), false).is_ok(), "{kind}");
        let mut bytes = std::fs::read(tmp.path()).unwrap();
        let mid = 128 + (bytes.len() - 140) / 2;
        bytes[mid] ^= 0x04;
        std::fs::write(tmp.path(), &bytes).unwrap();
        let err = match zbs::load_from_mmap(tmp.path(), false) {
            Err(e) => e,
            Ok(_) => panic!("{kind}: expected load_from_mmap to fail"),
        };
        assert!(err.is_bad_checksum(), "{kind}: body flip not caught at load");
    }
}

#[test]
fn crc16_type_roundtrips_and_detects() {
    let records = corpus();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut b = PlainBlobStoreBuilder::new(
        0,
        records.len(),
        tmp.path(),
        0,
        ChecksumLevel::PerRecord,
        ChecksumType::Crc16c,
    )
    .unwrap();
    for r in &records {
        b.add_record(r).unwrap();
    }
    b.finish().unwrap();
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    assert_eq!(store.get_record(17).unwrap(), records[17]);
    let mut bytes = std::fs::read(tmp.path()).unwrap();
    bytes[130] ^= 0xFF;
    std::fs::write(tmp.path(), &bytes).unwrap();
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    let mut saw = false;
    for i in 0..4 {
        if let Err(e) = store.get_record(i) {
            assert!(matches!(e, zbs::Error::BadCrc16c { .. }));
            saw = true;
        }
    }
    assert!(saw);
}
