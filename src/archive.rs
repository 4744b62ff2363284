//! Filesystem-facing [`pack`] / [`unpack`] / [`list`] — the primary
//! embedding surface.
//!
//! ```no_run
//! use lar::archive::{pack, unpack, PackOptions, UnpackOptions};
//!
//! let header = pack("docs", "docs.lar", &PackOptions::default())?;
//! println!("{} entries", header.entry_count);
//! unpack("docs.lar", "restored", &UnpackOptions::default())?;
//! # Ok::<(), lar::ArchiveError>(())
//! ```

use std::fs::{self, File, Metadata};
use std::io::{BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ArchiveError, IoContext, Result};
use crate::header::ArchiveHeader;
use crate::io_stream::{CodecOptions, LarReader, LarWriter};
use crate::scratch::ScratchKind;
use crate::sys;
use crate::toc::TocEntry;

// ── Options ───────────────────────────────────────────────────────────────────

/// Configuration for [`pack`].
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    pub codecs:      CodecOptions,
    pub scratch:     ScratchKind,
    /// Directory for disk scratch files; system temp dir when `None`.
    pub scratch_dir: Option<PathBuf>,
    /// Overrides the probed available memory (bytes).  Files larger than a
    /// third of it are refused.
    pub available_memory: Option<u64>,
    /// Prefix every stored path with the source directory's own name.
    pub include_root: bool,
}

/// Configuration for [`unpack`].
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    pub codecs:              CodecOptions,
    /// Check the header's aggregate hash against the TOC before extracting.
    pub verify_aggregate:    bool,
    pub restore_permissions: bool,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            codecs:              CodecOptions::default(),
            verify_aggregate:    true,
            restore_permissions: true,
        }
    }
}

// ── Pack ──────────────────────────────────────────────────────────────────────

/// Pack every regular file under `source` into a new archive at `archive`.
///
/// Files are visited in file-name order at each directory level.  The
/// archive file is only created once every entry has been compressed, so a
/// refused or unreadable input leaves no archive behind.
pub fn pack<S: AsRef<Path>, A: AsRef<Path>>(source: S, archive: A, opts: &PackOptions) -> Result<ArchiveHeader> {
    let source = source.as_ref();
    let archive = archive.as_ref();

    let meta = fs::metadata(source).context(|| format!("Can't open directory: {}", source.display()))?;
    if !meta.is_dir() {
        return Err(ArchiveError::InvalidArgument(format!("{} is not a directory", source.display())));
    }
    let root = if opts.include_root { Some(root_name(source)?) } else { None };
    let limit = sys::pack_size_limit(opts.available_memory.or_else(sys::available_memory));

    let mut writer = LarWriter::with_scratch(&opts.codecs, opts.scratch, opts.scratch_dir.as_deref())?;

    for dentry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let dentry = dentry?;
        let file_type = dentry.file_type();
        if !file_type.is_file() {
            if !file_type.is_dir() {
                warn!("Skipping non-regular file: {}", dentry.path().display());
            }
            continue;
        }

        let path = dentry.path();
        let relative = relative_name(source, path, root.as_deref())?;
        let meta = dentry.metadata()?;
        if let Some(limit) = limit {
            if meta.len() > limit {
                return Err(ArchiveError::FileTooLarge { path: path.to_owned(), size: meta.len(), limit });
            }
        }

        let data = fs::read(path).context(|| format!("Can't open file: {}", path.display()))?;
        writer.add_file(relative, mode_of(&meta), &data)?;
        info!("New archive entry: {}", path.display());
    }

    let finished = writer.finalize()?;
    let header = finished.header.clone();
    let name = archive.display().to_string();
    let file = File::create(archive).context(|| format!("Can't create archive {name}"))?;
    let written = finished.write_to(BufWriter::new(file), &name)?;
    info!("Created {name}: {} entries, {written} bytes", header.entry_count);
    Ok(header)
}

fn root_name(source: &Path) -> Result<String> {
    let canonical;
    let dir = match source.file_name() {
        Some(name) => name,
        None => {
            canonical = fs::canonicalize(source)
                .context(|| format!("Can't resolve {}", source.display()))?;
            canonical.file_name().ok_or_else(|| {
                ArchiveError::InvalidArgument(format!("{} has no directory name", source.display()))
            })?
        }
    };
    dir.to_str()
        .map(str::to_owned)
        .ok_or_else(|| ArchiveError::NonUtf8Path(source.to_owned()))
}

/// `/`-joined path of `path` below `source`, optionally under `root`.
fn relative_name(source: &Path, path: &Path, root: Option<&str>) -> Result<String> {
    let below = path.strip_prefix(source).map_err(|_| {
        ArchiveError::InvalidArgument(format!("{} is outside {}", path.display(), source.display()))
    })?;
    let mut parts: Vec<&str> = root.into_iter().collect();
    for component in below.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_str().ok_or_else(|| ArchiveError::NonUtf8Path(path.to_owned()))?);
        }
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn mode_of(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() { 0o444 } else { 0o644 }
}

// ── Unpack ────────────────────────────────────────────────────────────────────

/// Extract every entry of `archive` below `target`, creating it if needed.
///
/// Each entry is verified against its stored hash before it is written; the
/// first failure aborts the extraction.
pub fn unpack<A: AsRef<Path>, T: AsRef<Path>>(archive: A, target: T, opts: &UnpackOptions) -> Result<ArchiveHeader> {
    let archive = archive.as_ref();
    let target = target.as_ref();
    let name = archive.display().to_string();

    let file = File::open(archive).context(|| format!("Can't read {name}"))?;
    let mut reader = LarReader::open(BufReader::new(file), name.clone(), &opts.codecs)?;
    if opts.verify_aggregate {
        reader.verify_aggregate()?;
    }
    for entry in &reader.entries {
        checked_output_path(&name, entry)?;
    }

    fs::create_dir_all(target).context(|| format!("Can not create directory: {}", target.display()))?;
    reader.extract(|entry, data| {
        let file_path = target.join(checked_output_path(&name, entry)?);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .context(|| format!("Can not create directory: {}", parent.display()))?;
        }
        fs::write(&file_path, &data).context(|| format!("Can not unpack file: {}", file_path.display()))?;
        if opts.restore_permissions {
            set_mode(&file_path, entry.permissions)?;
        }
        debug!("Extracted {} ({} bytes)", file_path.display(), data.len());
        Ok(())
    })?;

    let (header, entries) = reader.into_parts();
    info!("Unpacked {} entries from {name} into {}", entries.len(), target.display());
    Ok(header)
}

fn checked_output_path(archive: &str, entry: &TocEntry) -> Result<PathBuf> {
    entry
        .output_path()
        .map_err(|source| ArchiveError::Toc { archive: archive.to_owned(), source })
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        .context(|| format!("Can not set permissions of {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    let mut perms = fs::metadata(path)
        .context(|| format!("Can not set permissions of {}", path.display()))?
        .permissions();
    perms.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, perms).context(|| format!("Can not set permissions of {}", path.display()))
}

// ── List ──────────────────────────────────────────────────────────────────────

/// Parse the header and TOC of `archive` without touching the content.
pub fn list<A: AsRef<Path>>(archive: A, codecs: &CodecOptions) -> Result<(ArchiveHeader, Vec<TocEntry>)> {
    let archive = archive.as_ref();
    let name = archive.display().to_string();
    let file = File::open(archive).context(|| format!("Can't read {name}"))?;
    Ok(LarReader::open(BufReader::new(file), name, codecs)?.into_parts())
}
