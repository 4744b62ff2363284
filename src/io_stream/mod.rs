//! Streaming archive engine — writer and reader.
//!
//! # Writer
//! [`LarWriter`] accepts files one at a time, hashes and compresses each,
//! and appends the compressed block to a scratch accumulator.  Nothing is
//! written to the destination until [`LarWriter::finalize`] has produced the
//! final header; [`FinishedArchive::write_to`] then streams
//! header → compressed TOC → content.
//!
//! # Reader
//! [`LarReader`] decodes the header and the whole TOC up front, then walks
//! the content section sequentially.  Block offsets are never stored: the
//! Nth block starts where the (N-1)th ended.
//!
//! # Endianness
//! All binary I/O is strictly little-endian; see `header.rs` and `toc/`
//! for field-level documentation.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::codec::{get_compressor, CodecError, Compressor, CompressorKind};
use crate::digest::{get_digest, Digest, DigestKind};
use crate::error::{ArchiveError, IoContext, Result};
use crate::header::{ArchiveHeader, HEADER_SIZE};
use crate::scratch::{ScratchBuffer, ScratchKind};
use crate::toc::{aggregate_input, decode_toc, encode_toc, TocEntry};

// ── CodecOptions ──────────────────────────────────────────────────────────────

/// Compressor and digest selection.  Not recorded in the container, so a
/// reader must use the same values as the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    pub compressor: CompressorKind,
    pub level:      i32,
    pub digest:     DigestKind,
}

impl Default for CodecOptions {
    fn default() -> Self {
        let compressor = CompressorKind::default();
        Self {
            compressor,
            level:  compressor.default_level(),
            digest: DigestKind::default(),
        }
    }
}

impl CodecOptions {
    pub fn compressor(&self) -> Box<dyn Compressor> {
        get_compressor(self.compressor, self.level)
    }

    pub fn digest(&self) -> Box<dyn Digest> {
        get_digest(self.digest)
    }
}

fn fit_u32(what: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| ArchiveError::Overflow { what, value: value as u64 })
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct LarWriter {
    compressor: Box<dyn Compressor>,
    digest:     Box<dyn Digest>,
    content:    ScratchBuffer,
    toc:        ScratchBuffer,
    pub entries: Vec<TocEntry>,
}

impl LarWriter {
    /// Writer with disk-backed scratch in the system temporary directory.
    pub fn new(codecs: &CodecOptions) -> Result<Self> {
        Self::with_scratch(codecs, ScratchKind::Disk, None)
    }

    pub fn with_scratch(codecs: &CodecOptions, kind: ScratchKind, dir: Option<&Path>) -> Result<Self> {
        let scratch = || ScratchBuffer::new(kind, dir).context(|| "Can't create temporary file".to_owned());
        Ok(Self {
            compressor: codecs.compressor(),
            digest:     codecs.digest(),
            content:    scratch()?,
            toc:        scratch()?,
            entries:    Vec::new(),
        })
    }

    /// Hash, compress and append one file.  Entries keep the order in which
    /// they are added.
    pub fn add_file(&mut self, relative_path: String, permissions: u32, data: &[u8]) -> Result<&TocEntry> {
        let mut entry = TocEntry::new(relative_path, data.len() as u64, permissions);
        entry.path_length().map_err(|e| ArchiveError::InvalidArgument(e.to_string()))?;
        entry.file_hash = self.digest.digest(data);

        let compressed = self.compressor.compress(data).map_err(|source| ArchiveError::Compress {
            path: entry.relative_path.clone(),
            source,
        })?;
        entry.compressed_size = compressed.len() as u64;
        self.content.append(&compressed).context(|| {
            format!("File [{}] error on writing to scratch content", entry.relative_path)
        })?;

        debug!(
            "{}: {} -> {} bytes",
            entry.relative_path, entry.file_size, entry.compressed_size
        );
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Compute the aggregate hash, serialize and compress the TOC, and fix
    /// every header field.  The destination is not touched yet.
    pub fn finalize(mut self) -> Result<FinishedArchive> {
        let mut header = ArchiveHeader::new();
        header.entry_count = fit_u32("entry count", self.entries.len())?;
        header.aggregate_hash = self.digest.digest(&aggregate_input(&self.entries));

        let toc = encode_toc(&self.entries).map_err(|e| ArchiveError::InvalidArgument(e.to_string()))?;
        header.toc_size = fit_u32("TOC size", toc.len())?;

        let compressed_toc = self.compressor.compress(&toc).map_err(|source| ArchiveError::Compress {
            path: "TOC".to_owned(),
            source,
        })?;
        header.toc_compressed_size = fit_u32("compressed TOC size", compressed_toc.len())?;
        self.toc
            .append(&compressed_toc)
            .context(|| "error on writing TOC to scratch".to_owned())?;

        debug!(
            "TOC: {} entries, {} -> {} bytes, content {} bytes",
            header.entry_count,
            header.toc_size,
            header.toc_compressed_size,
            self.content.len()
        );
        Ok(FinishedArchive {
            header,
            entries: self.entries,
            toc:     self.toc,
            content: self.content,
        })
    }
}

/// A fully assembled archive waiting in scratch storage.
pub struct FinishedArchive {
    pub header:  ArchiveHeader,
    pub entries: Vec<TocEntry>,
    toc:         ScratchBuffer,
    content:     ScratchBuffer,
}

impl FinishedArchive {
    /// Total size of the archive once written.
    pub fn archive_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.toc.len() + self.content.len()
    }

    /// Stream header, compressed TOC and content into `out`.  Returns the
    /// number of bytes written.  `name` is used in error messages.
    pub fn write_to<W: Write>(mut self, mut out: W, name: &str) -> Result<u64> {
        out.write_all(&self.header.to_bytes())
            .context(|| format!("error on writing header to {name}"))?;
        let toc_len = self.toc.copy_to(&mut out)
            .context(|| format!("error on writing TOC to {name}"))?;
        let content_len = self.content.copy_to(&mut out)
            .context(|| format!("error on writing content to {name}"))?;
        out.flush().context(|| format!("error on flushing {name}"))?;
        Ok(HEADER_SIZE as u64 + toc_len + content_len)
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct LarReader<R: Read + Seek> {
    reader:      R,
    name:        String,
    compressor:  Box<dyn Compressor>,
    digest:      Box<dyn Digest>,
    pub header:  ArchiveHeader,
    pub entries: Vec<TocEntry>,
}

/// Read exactly `len` bytes, reporting how many were available on a short
/// read instead of allocating `len` up front.
fn read_exact_len<R: Read>(reader: &mut R, len: u64) -> std::io::Result<std::result::Result<Vec<u8>, u64>> {
    let mut buf = Vec::new();
    reader.take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Ok(Err(buf.len() as u64));
    }
    Ok(Ok(buf))
}

impl<R: Read + Seek> LarReader<R> {
    /// Parse the header and the whole TOC.  `name` is used in error messages.
    pub fn open(mut reader: R, name: impl Into<String>, codecs: &CodecOptions) -> Result<Self> {
        let name = name.into();
        let compressor = codecs.compressor();
        let digest = codecs.digest();

        reader.seek(SeekFrom::Start(0)).context(|| format!("Can't read {name}"))?;
        let header = ArchiveHeader::read(&mut reader)
            .map_err(|source| ArchiveError::Header { archive: name.clone(), source })?;

        let expected = header.toc_compressed_size as u64;
        let compressed_toc = match read_exact_len(&mut reader, expected)
            .context(|| format!("Can't read TOC of {name}"))?
        {
            Ok(buf)    => buf,
            Err(actual) => return Err(ArchiveError::TocTruncated { archive: name, expected, actual }),
        };

        let toc = compressor
            .decompress(&compressed_toc, header.toc_size as usize)
            .map_err(|source| ArchiveError::TocDecompress { archive: name.clone(), source })?;
        let entries = decode_toc(&toc)
            .map_err(|source| ArchiveError::Toc { archive: name.clone(), source })?;
        if entries.len() != header.entry_count as usize {
            return Err(ArchiveError::EntryCountMismatch {
                archive: name,
                declared: header.entry_count,
                actual: entries.len(),
            });
        }

        Ok(Self { reader, name, compressor, digest, header, entries })
    }

    /// Recompute the aggregate hash from the TOC's per-file hashes and
    /// compare it with the header.
    pub fn verify_aggregate(&self) -> Result<()> {
        if self.digest.digest(&aggregate_input(&self.entries)) != self.header.aggregate_hash {
            return Err(ArchiveError::AggregateMismatch { archive: self.name.clone() });
        }
        Ok(())
    }

    /// Decompress and verify every entry in TOC order, handing each one to
    /// `sink`.  Stops at the first error; entries after a corrupt one are
    /// never passed on.
    pub fn extract<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(&TocEntry, Vec<u8>) -> Result<()>,
    {
        let name = &self.name;
        self.reader
            .seek(SeekFrom::Start(self.header.content_offset()))
            .context(|| format!("Can't seek to content of {name}"))?;

        for entry in &self.entries {
            let compressed = match read_exact_len(&mut self.reader, entry.compressed_size)
                .context(|| format!("Can't read {} from {name}", entry.relative_path))?
            {
                Ok(buf) => buf,
                Err(actual) => {
                    return Err(ArchiveError::ContentTruncated {
                        archive:  name.clone(),
                        path:     entry.relative_path.clone(),
                        expected: entry.compressed_size,
                        actual,
                    })
                }
            };

            let corrupt = |source: CodecError| ArchiveError::CorruptEntry {
                path: entry.relative_path.clone(),
                source,
            };
            let expected_len = usize::try_from(entry.file_size).map_err(|_| ArchiveError::Overflow {
                what:  "file size",
                value: entry.file_size,
            })?;
            let data = self.compressor.decompress(&compressed, expected_len).map_err(corrupt)?;

            if self.digest.digest(&data) != entry.file_hash {
                return Err(ArchiveError::HashMismatch { path: entry.relative_path.clone() });
            }
            sink(entry, data)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_parts(self) -> (ArchiveHeader, Vec<TocEntry>) {
        (self.header, self.entries)
    }
}
