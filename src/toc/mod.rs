//! Table of contents: one fixed-prefix record per archived file.
//!
//! # Record layout (little-endian)
//! ```text
//! offset  size  field
//!      0     8  file_size
//!      8     8  compressed_size
//!     16     4  path_length
//!     20     4  permissions
//!     24    32  file_hash
//!     56     n  relative_path (path_length bytes, UTF-8, no terminator)
//! ```
//! Records are concatenated with no separators.  The order of records is the
//! order of compressed blocks in the content section.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Serialize, Serializer};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::digest::{HashSum, HASH_LEN};

/// Size of the fixed part of every TOC record.
pub const ENTRY_PREFIX_SIZE: usize = 56;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TocError {
    #[error("TOC buffer too small: record at offset {offset} needs {needed} bytes, {available} available")]
    BufferTooSmall { offset: usize, needed: usize, available: usize },
    #[error("TOC record at offset {offset} has a non UTF-8 path")]
    NonUtf8Path { offset: usize },
    #[error("Path too long for a TOC record: {0} bytes")]
    PathTooLong(usize),
    #[error("Unsafe path in TOC: {0:?}")]
    UnsafePath(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub file_size: u64,
    pub compressed_size: u64,
    /// POSIX mode bits of the source file.
    pub permissions: u32,
    #[serde(serialize_with = "serialize_hash")]
    pub file_hash: HashSum,
    /// `/`-separated path relative to the archive root.
    pub relative_path: String,
}

pub(crate) fn serialize_hash<S: Serializer>(hash: &HashSum, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(hash))
}

impl TocEntry {
    pub fn new(relative_path: String, file_size: u64, permissions: u32) -> Self {
        Self {
            file_size,
            compressed_size: 0,
            permissions,
            file_hash: [0u8; HASH_LEN],
            relative_path,
        }
    }

    pub fn path_length(&self) -> Result<u32, TocError> {
        let len = self.relative_path.len();
        u32::try_from(len).map_err(|_| TocError::PathTooLong(len))
    }

    /// Encoded size of this record.
    pub fn record_len(&self) -> usize {
        ENTRY_PREFIX_SIZE + self.relative_path.len()
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), TocError> {
        let path_length = self.path_length()?;
        let mut prefix = [0u8; ENTRY_PREFIX_SIZE];
        LittleEndian::write_u64(&mut prefix[0..8], self.file_size);
        LittleEndian::write_u64(&mut prefix[8..16], self.compressed_size);
        LittleEndian::write_u32(&mut prefix[16..20], path_length);
        LittleEndian::write_u32(&mut prefix[20..24], self.permissions);
        prefix[24..56].copy_from_slice(&self.file_hash);

        out.reserve(self.record_len());
        out.extend_from_slice(&prefix);
        out.extend_from_slice(self.relative_path.as_bytes());
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TocError> {
        let mut out = Vec::with_capacity(self.record_len());
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode the record starting at `offset`.  Returns the entry and the
    /// offset of the next record.
    pub fn decode(buf: &[u8], offset: usize) -> Result<(Self, usize), TocError> {
        let available = buf.len().saturating_sub(offset);
        let too_small = |needed: usize| TocError::BufferTooSmall { offset, needed, available };

        if available < ENTRY_PREFIX_SIZE {
            return Err(too_small(ENTRY_PREFIX_SIZE));
        }
        let prefix = &buf[offset..offset + ENTRY_PREFIX_SIZE];
        let file_size = LittleEndian::read_u64(&prefix[0..8]);
        let compressed_size = LittleEndian::read_u64(&prefix[8..16]);
        let path_length = LittleEndian::read_u32(&prefix[16..20]) as usize;
        let permissions = LittleEndian::read_u32(&prefix[20..24]);
        let mut file_hash = [0u8; HASH_LEN];
        file_hash.copy_from_slice(&prefix[24..56]);

        let needed = ENTRY_PREFIX_SIZE
            .checked_add(path_length)
            .ok_or_else(|| too_small(usize::MAX))?;
        if available < needed {
            return Err(too_small(needed));
        }
        let path_start = offset + ENTRY_PREFIX_SIZE;
        let path_bytes = &buf[path_start..path_start + path_length];
        let relative_path = std::str::from_utf8(path_bytes)
            .map_err(|_| TocError::NonUtf8Path { offset })?
            .to_owned();

        let entry = Self {
            file_size,
            compressed_size,
            permissions,
            file_hash,
            relative_path,
        };
        Ok((entry, offset + needed))
    }

    /// The stored path as a relative `PathBuf`, rejecting anything that could
    /// escape the extraction directory.
    pub fn output_path(&self) -> Result<PathBuf, TocError> {
        let unsafe_path = || TocError::UnsafePath(self.relative_path.clone());
        if self.relative_path.is_empty() || self.relative_path.contains('\\') {
            return Err(unsafe_path());
        }
        let mut out = PathBuf::new();
        for component in Path::new(&self.relative_path).components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                _ => return Err(unsafe_path()),
            }
        }
        if out.as_os_str().is_empty() {
            return Err(unsafe_path());
        }
        Ok(out)
    }
}

/// Concatenate the encoded records of `entries` in order.
pub fn encode_toc(entries: &[TocEntry]) -> Result<Vec<u8>, TocError> {
    let mut out = Vec::with_capacity(entries.iter().map(TocEntry::record_len).sum());
    for entry in entries {
        entry.encode(&mut out)?;
    }
    Ok(out)
}

/// Decode records from offset 0 until the whole buffer is consumed.
pub fn decode_toc(buf: &[u8]) -> Result<Vec<TocEntry>, TocError> {
    let mut entries = Vec::new();
    let mut offset = 0;
    while offset < buf.len() {
        let (entry, next) = TocEntry::decode(buf, offset)?;
        entries.push(entry);
        offset = next;
    }
    Ok(entries)
}

/// Concatenation of every entry's `file_hash`, in TOC order.  The header's
/// aggregate hash is the digest of this buffer.
pub fn aggregate_input(entries: &[TocEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * HASH_LEN);
    for entry in entries {
        out.extend_from_slice(&entry.file_hash);
    }
    out
}
