//! Dump records from a blob store.
//!
//! With ids, prints just those records; with `-r`, every record. `-B`
//! switches to binary framing (`u32 length || bytes`) instead of
//! newline-terminated lines; `-b N` re-reads everything N times (a
//! quick decompression benchmark).

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use zbs::BlobStore;

#[derive(Parser)]
#[command(name = "zbs_unzip", about = "Dump records from a zbs blob store")]
struct Args {
    /// Decompression loop count (benchmarking).
    #[arg(short = 'b', long = "bench-loops", default_value_t = 1)]
    loops: usize,

    /// Binary output framing: u32 little-endian length before each record.
    #[arg(short = 'B', long = "binary")]
    binary: bool,

    /// Dump all records.
    #[arg(short = 'r', long = "all")]
    all: bool,

    /// Prefault the mapping.
    #[arg(short = 'p', long = "populate")]
    populate: bool,

    /// Store file.
    store: PathBuf,

    /// Record ids to dump (ignored with -r).
    ids: Vec<usize>,
}

fn run(args: &Args) -> anyhow::Result<()> {
    let store = zbs::load_from_mmap(&args.store, args.populate)?;
    let ids: Vec<usize> = if args.all || args.ids.is_empty() {
        (0..store.num_records()).collect()
    } else {
        args.ids.clone()
    };
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    let mut buf = Vec::new();
    for pass in 0..args.loops.max(1) {
        for &id in &ids {
            buf.clear();
            store.get_record_append(id, &mut buf)?;
            // only the last pass prints; earlier passes just decompress
            if pass + 1 == args.loops.max(1) {
                if args.binary {
                    out.write_all(&(buf.len() as u32).to_le_bytes())?;
                    out.write_all(&buf)?;
                } else {
                    out.write_all(&buf)?;
                    out.write_all(b"\n")?;
                }
            }
        }
    }
    out.flush()?;
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
            eprintln!("zbs_unzip: {e:#}");
            ExitCode::from(3)
        }
    }
}
