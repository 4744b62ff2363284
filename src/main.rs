use clap::{Parser, Subcommand};
use lar::archive::{self, PackOptions, UnpackOptions};
use lar::{ArchiveError, ArchiveHeader, CodecOptions, CompressorKind, DigestKind, TocEntry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lar", about = "Pack directories into .lar archives and extract them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Compressor: bzip2 (default), zstd, lz4, none.  Must match on extraction.
    #[arg(long, global = true, env = "LAR_CODEC", default_value = "bzip2", value_parser = parse_codec)]
    codec: CompressorKind,
    /// Compression level (bzip2 1-9; zstd 1-22; ignored for lz4/none)
    #[arg(long, global = true, env = "LAR_LEVEL")]
    level: Option<i32>,
    /// Digest: sha256 (default) or blake3.  Must match on extraction.
    #[arg(long, global = true, env = "LAR_DIGEST", default_value = "sha256", value_parser = parse_digest)]
    digest: DigestKind,
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the content of a directory into <directory>.lar recursively
    #[command(name = "a")]
    Add {
        directory: PathBuf,
        /// Archive path (default: <directory name>.lar in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract all files from an archive
    #[command(name = "e")]
    Extract {
        archive: PathBuf,
        /// Target subdirectory, relative to the current directory
        subdir: Option<PathBuf>,
        /// Skip the aggregate hash check (per-file hashes are still verified)
        #[arg(long)]
        no_verify_aggregate: bool,
        /// Do not restore stored permission bits
        #[arg(long)]
        no_permissions: bool,
    },
    /// List archive contents
    #[command(name = "l")]
    List {
        archive: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct Listing<'a> {
    archive: String,
    header:  &'a ArchiveHeader,
    entries: &'a [TocEntry],
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(e.kind().exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), ArchiveError> {
    let codecs = CodecOptions {
        compressor: cli.codec,
        level:      cli.level.unwrap_or_else(|| cli.codec.default_level()),
        digest:     cli.digest,
    };

    match cli.command {
        Commands::Add { directory, output } => {
            let output = match output {
                Some(path) => path,
                None => default_archive_name(&directory)?,
            };
            let opts = PackOptions { codecs, include_root: true, ..PackOptions::default() };
            let header = archive::pack(&directory, &output, &opts)?;
            println!("Created: {} ({} entries)", output.display(), header.entry_count);
        }

        Commands::Extract { archive: path, subdir, no_verify_aggregate, no_permissions } => {
            let target = subdir.unwrap_or_else(|| PathBuf::from("."));
            let opts = UnpackOptions {
                codecs,
                verify_aggregate:    !no_verify_aggregate,
                restore_permissions: !no_permissions,
            };
            let header = archive::unpack(&path, &target, &opts)?;
            println!("Unpacked {} entries to: {}", header.entry_count, target.display());
        }

        Commands::List { archive: path, json } => {
            let (header, entries) = archive::list(&path, &codecs)?;
            if json {
                let listing = Listing { archive: path.display().to_string(), header: &header, entries: &entries };
                let text = serde_json::to_string_pretty(&listing)
                    .map_err(|e| ArchiveError::InvalidArgument(e.to_string()))?;
                println!("{text}");
            } else {
                println!("Archive: {}  ({} entries, aggregate {})",
                         path.display(), header.entry_count, hex::encode(&header.aggregate_hash[..8]));
                println!("{:<40} {:>12} {:>12} {:>6}  Hash", "Name", "Size", "Compressed", "Mode");
                for e in &entries {
                    println!("{:<40} {:>12} {:>12} {:>6o}  {}",
                             e.relative_path, e.file_size, e.compressed_size, e.permissions,
                             hex::encode(&e.file_hash[..6]));
                }
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// `<directory name>.lar` in the current directory.
fn default_archive_name(directory: &Path) -> Result<PathBuf, ArchiveError> {
    let name = match directory.file_name() {
        Some(name) => name.to_owned(),
        None => std::fs::canonicalize(directory)
            .map_err(|e| ArchiveError::InvalidArgument(format!("{}: {e}", directory.display())))?
            .file_name()
            .ok_or_else(|| ArchiveError::InvalidArgument(format!("{} has no name", directory.display())))?
            .to_owned(),
    };
    let mut file = name;
    file.push(".lar");
    Ok(PathBuf::from(file))
}

fn parse_codec(s: &str) -> Result<CompressorKind, String> {
    s.parse()
}

fn parse_digest(s: &str) -> Result<DigestKind, String> {
    s.parse()
}
