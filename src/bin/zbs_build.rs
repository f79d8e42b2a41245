//! Build a blob store from a record file.
//!
//! Input is line-based by default (one record per line, line breaks
//! stripped). Exit codes: 0 success, 1 usage error, 3 build or I/O
//! failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;

use zbs::store::{
    DictZipBlobStore, DictZipOptions, EntropyAlgo, EntropyZipBuilder, FinishFlags,
    MixedLenBuilder, NltStoreBuilder, PlainBlobStoreBuilder, ZipOffsetBuilder,
};
use zbs::store::entropy::FreqHistO1;
use zbs::{ChecksumLevel, ChecksumType, NestLoudsTrieConfig};

#[derive(Clone, Copy, PartialEq, clap::ValueEnum)]
enum StoreType {
    Plain,
    Mixedlen,
    Zipoffset,
    Entropy,
    Dictzip,
    Nlt,
}

#[derive(Parser)]
#[command(name = "zbs_build", about = "Build a zbs blob store from a record file")]
struct Args {
    /// Store variant to build.
    #[arg(short = 'T', long = "type", value_enum, default_value = "dictzip")]
    store_type: StoreType,

    /// DictZip sampling: a ratio ("0.03"), "@file" (file is the sample),
    /// or "dict:file" (file is the dictionary verbatim).
    #[arg(short = 'S', long = "sample", default_value = "0.03")]
    sample: String,

    /// Checksum level 0..=3.
    #[arg(short = 'c', long = "checksum-level", default_value_t = 1)]
    checksum_level: u8,

    /// Checksum type: 0 = CRC32C, 1 = CRC16C.
    #[arg(short = 't', long = "checksum-type", default_value_t = 0)]
    checksum_type: u8,

    /// Entropy algorithm for DictZip: none or huffman.
    #[arg(short = 'e', long = "entropy", default_value = "none")]
    entropy: String,

    /// Offset index block units: 0, 64 or 128.
    #[arg(short = 'j', long = "block-units", default_value_t = 128)]
    block_units: usize,

    /// Request the new reference encoding explicitly (the default; the
    /// flag is kept for compatibility).
    #[arg(short = 'U', long = "new-ref")]
    new_ref: bool,

    /// Compress the global dictionary (accepted; stored raw).
    #[arg(short = 'Z', long = "compress-dict")]
    compress_dict: bool,

    /// Embed the dictionary in the main file instead of a sidecar.
    #[arg(short = 'E', long = "embed-dict")]
    embed_dict: bool,

    /// Trie nesting depth (NLT store).
    #[arg(short = 'n', long = "nest-level", default_value_t = 3)]
    nest_level: u8,

    /// Output path; defaults to `<input>.zbs`.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Input record file, one record per line.
    input: PathBuf,
}

fn read_records(path: &PathBuf) -> anyhow::Result<Vec<Vec<u8>>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut records = Vec::new();
    for line in bytes.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        records.push(line.to_vec());
    }
    // a trailing newline produces one empty phantom record
    if records.last().is_some_and(|r| r.is_empty()) {
        records.pop();
    }
    Ok(records)
}

fn run(args: &Args) -> anyhow::Result<()> {
    let level = ChecksumLevel::from_u8(args.checksum_level)?;
    let ty = ChecksumType::from_u8(args.checksum_type)?;
    let records = read_records(&args.input)?;
    let out = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("zbs"));

    match args.store_type {
        StoreType::Plain => {
            let total: u64 = records.iter().map(|r| r.len() as u64).sum();
            let mut b =
                PlainBlobStoreBuilder::new(total, records.len(), &out, 0, level, ty)?;
            for r in &records {
                b.add_record(r)?;
            }
            b.finish()?;
        }
        StoreType::Mixedlen => {
            // majority length becomes the fixed slab width
            let mut hist = std::collections::HashMap::new();
            for r in &records {
                *hist.entry(r.len()).or_insert(0usize) += 1;
            }
            let fixed_len = hist
                .into_iter()
                .max_by_key(|&(len, n)| (n, len))
                .map(|(len, _)| len.max(1))
                .unwrap_or(1);
            let mut b = MixedLenBuilder::new(fixed_len, 0, 0, &out, 0, level, ty)?;
            for r in &records {
                b.add_record(r)?;
            }
            b.finish()?;
        }
        StoreType::Zipoffset => {
            let mut b = ZipOffsetBuilder::new(args.block_units, &out, 0, level, ty)?;
            for r in &records {
                b.add_record(r)?;
            }
            b.finish()?;
        }
        StoreType::Entropy => {
            let mut hist = FreqHistO1::new();
            for r in &records {
                hist.add_record(r);
            }
            hist.finish();
            let mut b = EntropyZipBuilder::new(&hist, args.block_units, &out, 0, level, ty)?;
            for r in &records {
                b.add_record(r)?;
            }
            b.finish()?;
        }
        StoreType::Dictzip => {
            if args.compress_dict {
                eprintln!("zbs_build: -Z accepted; the dictionary is stored raw");
            }
            let entropy_algo = match args.entropy.as_str() {
                "none" => EntropyAlgo::None,
                "huffman" | "huffman_o1" => EntropyAlgo::HuffmanO1,
                other => bail!("unknown entropy algorithm {other:?}"),
            };
            let mut opt = DictZipOptions {
                checksum_level: level,
                checksum_type: ty,
                offset_block_units: args.block_units,
                entropy_algo,
                embedded_dict: args.embed_dict,
                compress_global_dict: args.compress_dict,
                use_new_ref_encoding: args.new_ref,
                ..Default::default()
            };
            let mut dict_file: Option<PathBuf> = None;
            let mut sample_file: Option<PathBuf> = None;
            if let Some(f) = args.sample.strip_prefix("dict:") {
                dict_file = Some(PathBuf::from(f));
            } else if let Some(f) = args.sample.strip_prefix('@') {
                sample_file = Some(PathBuf::from(f));
            } else {
                opt.sample_ratio = args
                    .sample
                    .parse::<f64>()
                    .with_context(|| format!("bad sample ratio {:?}", args.sample))?;
            }
            let mut b = DictZipBlobStore::create_zip_builder(opt)?;
            if let Some(f) = dict_file {
                b.use_dict(std::fs::read(&f).with_context(|| format!("reading {}", f.display()))?)?;
            } else if let Some(f) = sample_file {
                b.add_sample(&std::fs::read(&f).with_context(|| format!("reading {}", f.display()))?)?;
                b.finish_sample()?;
            } else {
                for r in &records {
                    b.add_sample_record(r)?;
                }
                b.finish_sample()?;
            }
            b.prepare(records.len(), &out)?;
            for r in &records {
                b.add_record(r)?;
            }
            b.finish(FinishFlags::FREE_DICT | FinishFlags::WRITE_DICT_FILE)?;
        }
        StoreType::Nlt => {
            let config = NestLoudsTrieConfig {
                nest_level: args.nest_level,
                ..Default::default()
            };
            let mut b = NltStoreBuilder::new(config, &out, 0, level, ty);
            for r in &records {
                b.add_record(r);
            }
            b.finish()?;
        }
    }
    eprintln!(
        "zbs_build: {} records -> {}",
        records.len(),
        out.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(a) => a,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("zbs_build: {e:#}");
            ExitCode::from(3)
        }
    }
}
