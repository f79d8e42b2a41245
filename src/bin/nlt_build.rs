//! Build or dump a trie-backed store.
//!
//! `encode` turns a key file into a NestLoudsTrieBlobStore; `decode`
//! reconstructs every record from a store. Records are newline-separated
//! (`line`) or `u32 length || bytes` framed (`binary`).

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;

use zbs::store::{BlobStore, NltStoreBuilder};
use zbs::{ChecksumLevel, ChecksumType, NestLoudsTrieConfig};

#[derive(Clone, Copy, PartialEq, clap::ValueEnum)]
enum Mode {
    Encode,
    Decode,
}

#[derive(Clone, Copy, PartialEq, clap::ValueEnum)]
enum Format {
    Line,
    Binary,
}

#[derive(Parser)]
#[command(name = "nlt_build", about = "Build or dump a nested-LOUDS-trie store")]
struct Args {
    #[arg(value_enum)]
    mode: Mode,

    #[arg(value_enum)]
    format: Format,

    input: PathBuf,

    output: PathBuf,

    /// Trie nesting depth.
    #[arg(short = 'n', long = "nest-level", default_value_t = 3)]
    nest_level: u8,
}

fn parse_records(bytes: &[u8], format: Format) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut records = Vec::new();
    match format {
        Format::Line => {
            for line in bytes.split(|&b| b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                records.push(line.to_vec());
            }
            if records.last().is_some_and(|r| r.is_empty()) {
                records.pop();
            }
        }
        Format::Binary => {
            let mut pos = 0usize;
            while pos < bytes.len() {
                if pos + 4 > bytes.len() {
                    bail!("truncated length prefix at byte {pos}");
                }
                let len =
                    u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
                pos += 4;
                if pos + len > bytes.len() {
                    bail!("truncated record at byte {pos}");
                }
                records.push(bytes[pos..pos + len].to_vec());
                pos += len;
            }
        }
    }
    Ok(records)
}

fn run(args: &Args) -> anyhow::Result<()> {
    match args.mode {
        Mode::Encode => {
            let bytes = std::fs::read(&args.input)
                .with_context(|| format!("reading {}", args.input.display()))?;
            let records = parse_records(&bytes, args.format)?;
            let config = NestLoudsTrieConfig {
                nest_level: args.nest_level,
                ..Default::default()
            };
            let mut b = NltStoreBuilder::new(
                config,
                &args.output,
                0,
                ChecksumLevel::HeaderOnly,
                ChecksumType::Crc32c,
            );
            for r in &records {
                b.add_record(r);
            }
            b.finish()?;
            eprintln!(
                "nlt_build: {} records -> {}",
                records.len(),
                args.output.display()
            );
        }
        Mode::Decode => {
            let store = zbs::load_from_mmap(&args.input, false)?;
            let file = std::fs::File::create(&args.output)
                .with_context(|| format!("creating {}", args.output.display()))?;
            let mut out = std::io::BufWriter::new(file);
            let mut buf = Vec::new();
            for id in 0..store.num_records() {
                buf.clear();
                store.get_record_append(id, &mut buf)?;
                match args.format {
                    Format::Line => {
                        out.write_all(&buf)?;
                        out.write_all(b"\n")?;
                    }
                    Format::Binary => {
                        out.write_all(&(buf.len() as u32).to_le_bytes())?;
                        out.write_all(&buf)?;
                    }
                }
            }
            out.flush()?;
        }
    }
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
            eprintln!("nlt_build: {e:#}");
            ExitCode::from(3)
        }
    }
}
