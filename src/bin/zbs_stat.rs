//! Print the decoded header of a blob store file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use zbs::store::header::FileHeader;

#[derive(Parser)]
#[command(name = "zbs_stat", about = "Decode and print a zbs store header")]
struct Args {
    /// Store file.
    store: PathBuf,
}

fn run(args: &Args) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.store)
        .with_context(|| format!("reading {}", args.store.display()))?;
    let h = FileHeader::decode(&bytes)?;
    let file_len = bytes.len() as u64;
    println!("file:           {}", args.store.display());
    println!("class:          {}", h.class_name);
    println!("num_records:    {}", h.num_records);
    println!("unzip_size:     {}", h.unzip_size);
    println!("content_size:   {}", h.content_size);
    println!("offset_size:    {}", h.offset_size);
    println!("checksum:       type={:?} level={:?}", h.checksum_type, h.checksum_level);
    println!("flags:          {:#06x}", h.flags);
    if h.embed_dict_offset != 0 || h.embed_dict_size != 0 {
        println!(
            "dict:           offset={} size={}{}",
            h.embed_dict_offset,
            h.embed_dict_size,
            if h.embed_dict_offset == 0 { " (sidecar)" } else { "" }
        );
    }
    if h.unzip_size > 0 {
        println!(
            "ratio:          {:.4}",
            file_len as f64 / h.unzip_size as f64
        );
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
            eprintln!("zbs_stat: {e:#}");
            ExitCode::from(3)
        }
    }
}
