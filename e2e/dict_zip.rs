// End-to-end DictZip scenarios: a small record set, sidecar vs embedded
// dictionaries, the entropy layer, deterministic rebuilds, and builder
// misuse.

use zbs::store::{DictZipBlobStore, DictZipOptions, EntropyAlgo, FinishFlags};
use zbs::{BlobStore, ChecksumLevel};

fn build_file(
    records: &[&[u8]],
    opt: DictZipOptions,
    flags: FinishFlags,
) -> tempfile::NamedTempFile {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut b = DictZipBlobStore::create_zip_builder(opt).unwrap();
    for r in records {
        b.add_sample(r).unwrap();
    }
    b.finish_sample().unwrap();
    b.prepare(records.len(), tmp.path()).unwrap();
    for r in records {
        b.add_record(r).unwrap();
    }
    b.finish(flags).unwrap();
    tmp
}

#[test]
fn four_record_roundtrip() {
    // records ["foobar","foobaz","foo","barfoo"], sample ratio 1.0
    let records: &[&[u8]] = &[b"foobar", b"foobaz", b"foo", b"barfoo"];
    let opt = DictZipOptions {
        sample_ratio: 1.0,
        min_match_len: 3,
        embedded_dict: true,
        ..Default::default()
    };
    let tmp = build_file(records, opt, FinishFlags::NONE);
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    assert_eq!(store.num_records(), 4);
    assert_eq!(store.get_record(0).unwrap(), b"foobar");
    assert_eq!(store.get_record(3).unwrap(), b"barfoo");
    assert_eq!(store.total_data_size(), 21);
}

#[test]
fn four_record_checksum_corruption() {
    let records: &[&[u8]] = &[b"foobar", b"foobaz", b"foo", b"barfoo"];
    let opt = DictZipOptions {
        sample_ratio: 1.0,
        min_match_len: 3,
        embedded_dict: true,
        checksum_level: ChecksumLevel::PerRecord,
        ..Default::default()
    };
    let tmp = build_file(records, opt, FinishFlags::NONE);
    let mut bytes = std::fs::read(tmp.path()).unwrap();
    bytes[128 + 2] ^= 0x20;
    std::fs::write(tmp.path(), &bytes).unwrap();
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    let broke = (0..4).any(|i| {
        store
            .get_record(i)
            .err()
            .is_some_and(|e| e.is_bad_checksum())
    });
    assert!(broke, "payload corruption must raise a checksum error");
}

#[test]
fn sidecar_dict_reload_and_get_dict() {
    let records: Vec<Vec<u8>> = (0..300usize)
        .map(|i| {
            format!(
                "GET /index/{}/page-{:04} HTTP/1.1 host=cache-{:02}.internal",
                ["hot", "warm", "cold"][i % 3],
                i,
                i % 16
            )
            .into_bytes()
        })
        .collect();
    let refs: Vec<&[u8]> = records.iter().map(|r| r.as_slice()).collect();
    let tmp = build_file(
        &refs,
        DictZipOptions::default(),
        FinishFlags::WRITE_DICT_FILE | FinishFlags::FREE_DICT,
    );
    let mut side = tmp.path().as_os_str().to_owned();
    side.push("-dict");
    let side_path = std::path::PathBuf::from(&side);
    assert!(side_path.exists(), "sidecar dictionary missing");

    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    assert!(!store.get_dict().is_empty());
    for (i, r) in records.iter().enumerate() {
        assert_eq!(store.get_record(i).unwrap(), *r, "record {i}");
    }

    // a corrupted sidecar must fail at open
    let mut dict_bytes = std::fs::read(&side_path).unwrap();
    let n = dict_bytes.len();
    dict_bytes[n - 20] ^= 1;
    std::fs::write(&side_path, &dict_bytes).unwrap();
    assert!(zbs::load_from_mmap(tmp.path(), false).is_err());
    std::fs::remove_file(&side_path).unwrap();
}

#[test]
fn entropy_layer_improves_ratio_on_text() {
    let records: Vec<Vec<u8>> = (0..400usize)
        .map(|i| {
            format!(
                "ts=2026-07-{:02}T12:{:02}:{:02}Z level=info msg=\"request served\" latency_ms={}",
                i % 28 + 1,
                i % 60,
                (i * 7) % 60,
                i % 250
            )
            .into_bytes()
        })
        .collect();
    let refs: Vec<&[u8]> = records.iter().map(|r| r.as_slice()).collect();
    let base = DictZipOptions {
        embedded_dict: true,
        ..Default::default()
    };
    let plain_tmp = build_file(&refs, base.clone(), FinishFlags::NONE);
    let entropy_tmp = build_file(
        &refs,
        DictZipOptions {
            entropy_algo: EntropyAlgo::HuffmanO1,
            ..base
        },
        FinishFlags::NONE,
    );
    let store = zbs::load_from_mmap(entropy_tmp.path(), false).unwrap();
    for (i, r) in records.iter().enumerate() {
        assert_eq!(store.get_record(i).unwrap(), *r, "record {i}");
    }
    let plain_hdr =
        zbs::store::header::FileHeader::decode(&std::fs::read(plain_tmp.path()).unwrap()).unwrap();
    let entropy_hdr =
        zbs::store::header::FileHeader::decode(&std::fs::read(entropy_tmp.path()).unwrap())
            .unwrap();
    assert!(
        entropy_hdr.content_size < plain_hdr.content_size,
        "entropy stream {} >= plain {}",
        entropy_hdr.content_size,
        plain_hdr.content_size
    );
}

#[test]
fn rebuilds_are_byte_identical() {
    let records: Vec<Vec<u8>> = (0..120usize)
        .map(|i| format!("deterministic-record-{i:04}").into_bytes())
        .collect();
    let refs: Vec<&[u8]> = records.iter().map(|r| r.as_slice()).collect();
    let opt = DictZipOptions {
        embedded_dict: true,
        ..Default::default()
    };
    let a = build_file(&refs, opt.clone(), FinishFlags::NONE);
    let b = build_file(&refs, opt, FinishFlags::NONE);
    assert_eq!(
        std::fs::read(a.path()).unwrap(),
        std::fs::read(b.path()).unwrap()
    );
}

#[test]
fn builder_phase_errors() {
    let mut b = DictZipBlobStore::create_zip_builder(DictZipOptions::default()).unwrap();
    b.add_sample(b"sample bytes").unwrap();
    // prepare before finish_sample is out of order
    let tmp = tempfile::NamedTempFile::new().unwrap();
    assert!(b.prepare(1, tmp.path()).is_err());
    // poisoned: even previously-valid calls now fail
    assert!(b.add_sample(b"more").is_err());
    assert!(b.finish_sample().is_err());
}

#[test]
fn unknown_block_units_rejected() {
    let r = DictZipBlobStore::create_zip_builder(DictZipOptions {
        offset_block_units: 32,
        ..Default::default()
    });
    assert!(r.is_err());
}

#[test]
fn large_corpus_with_long_matches() {
    // records longer than the 31-length escape threshold exercise the
    // varint extension path
    let page = "abcdefghijklmnopqrstuvwxyz0123456789-".repeat(20);
    let records: Vec<Vec<u8>> = (0..50usize)
        .map(|i| format!("{page}#{i}").into_bytes())
        .collect();
    let refs: Vec<&[u8]> = records.iter().map(|r| r.as_slice()).collect();
    let tmp = build_file(
        &refs,
        DictZipOptions {
            embedded_dict: true,
            ..Default::default()
        },
        FinishFlags::NONE,
    );
    let store = zbs::load_from_mmap(tmp.path(), false).unwrap();
    for (i, r) in records.iter().enumerate() {
        assert_eq!(store.get_record(i).unwrap(), *r, "record {i}");
    }
    // long repeated content compresses far below raw size
    let hdr =
        zbs::store::header::FileHeader::decode(&std::fs::read(tmp.path()).unwrap()).unwrap();
    let raw: u64 = records.iter().map(|r| r.len() as u64).sum();
    assert!(hdr.content_size * 5 < raw);
}
