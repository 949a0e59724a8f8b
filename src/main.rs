use clap::{Parser, Subcommand};
use miniar::archive::{self, ArchiveOptions};
use miniar::codec::{CodecId, DEFAULT_COMPRESSION_LEVEL};
use miniar::io_stream::DEFAULT_CHUNK_SIZE;
use miniar::locate::Located;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Upper bound for `--chunk-size`: 64 MiB.
const MAX_CHUNK_KIB: i64 = 64 * 1024;

#[derive(Parser)]
#[command(name = "miniar", about = "Pack directory trees into a minimal streaming container", version)]
struct Cli {
    /// Log every entry as it is written or restored
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a directory tree into a container file
    Archive {
        root: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Transform: gzip (default), zstd, lz4, none
        #[arg(short, long, default_value = "gzip")]
        codec: String,
        #[arg(short, long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
        level: i32,
        /// Store the root directory's own name as the first path segment
        #[arg(long)]
        include_root: bool,
        /// Streaming buffer size in KiB (1 to 65536)
        #[arg(
            long,
            default_value_t = (DEFAULT_CHUNK_SIZE / 1024) as u32,
            value_parser = clap::value_parser!(u32).range(1..=MAX_CHUNK_KIB),
        )]
        chunk_size: u32,
    },
    /// Restore a container file into a directory
    Unarchive {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// List container entries
    List {
        input: PathBuf,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write one entry's content to stdout
    Cat {
        input: PathBuf,
        path: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {

        // ── Archive ──────────────────────────────────────────────────────────
        Commands::Archive { root, output, codec, level, include_root, chunk_size } => {
            let opts = ArchiveOptions {
                codec: parse_codec(&codec)?,
                level,
                include_root,
                chunk_size: chunk_size as usize * 1024,
            };
            let summary = archive::create(&root, &output, &opts)?;
            println!(
                "Archived {} dir(s), {} file(s), {} byte(s) → {}",
                summary.directories, summary.files, summary.content_bytes, output.display()
            );
            if summary.skipped > 0 {
                println!("  skipped {} file(s) that vanished during archiving", summary.skipped);
            }
        }

        // ── Unarchive ────────────────────────────────────────────────────────
        Commands::Unarchive { input, output_dir } => {
            let summary = archive::extract(&input, &output_dir)?;
            println!(
                "Restored {} dir(s), {} file(s) to {}",
                summary.directories, summary.files, output_dir.display()
            );
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json } => {
            let entries = archive::list_file(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{:<5} {:>12}  Path", "Kind", "Size");
                for e in &entries {
                    let kind = if e.is_dir() { "dir" } else { "file" };
                    println!("{:<5} {:>12}  {}", kind, e.content_len(), e.path());
                }
            }
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { input, path } => {
            match archive::open_entry(&input, &path)? {
                Located::Found { mut reader, .. } => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    io::copy(&mut reader, &mut out)?;
                    out.flush()?;
                }
                Located::NotFound => {
                    eprintln!("{path}: not found in {}", input.display());
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn parse_codec(s: &str) -> Result<CodecId, String> {
    CodecId::from_name(s).ok_or_else(|| format!("unknown codec '{s}' (expected gzip, zstd, lz4 or none)"))
}
