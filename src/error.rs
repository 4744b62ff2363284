use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;
use crate::header::HeaderError;
use crate::toc::TocError;

/// Coarse classification of every [`ArchiveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidFormat,
    IntegrityFailure,
    ResourceExceeded,
    IoFailure,
}

impl ErrorKind {
    /// Process exit status used by the CLI.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::InvalidArgument  => 2,
            ErrorKind::InvalidFormat    => 3,
            ErrorKind::IntegrityFailure => 4,
            ErrorKind::ResourceExceeded => 5,
            ErrorKind::IoFailure        => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("{archive}: {source}")]
    Header { archive: String, #[source] source: HeaderError },
    #[error("{archive}: {source}")]
    Toc { archive: String, #[source] source: TocError },
    #[error("{archive}: TOC truncated, expected {expected} compressed bytes, found {actual}")]
    TocTruncated { archive: String, expected: u64, actual: u64 },
    #[error("{archive}: cannot decompress TOC: {source}")]
    TocDecompress { archive: String, #[source] source: CodecError },
    #[error("{archive}: header declares {declared} entries, TOC holds {actual}")]
    EntryCountMismatch { archive: String, declared: u32, actual: usize },
    #[error("{archive}: content of {path} truncated, expected {expected} bytes, found {actual}")]
    ContentTruncated { archive: String, path: String, expected: u64, actual: u64 },

    #[error("Corrupt archive, hashsum is incorrect for {path}")]
    HashMismatch { path: String },
    #[error("Corrupt archive, cannot decompress {path}: {source}")]
    CorruptEntry { path: String, #[source] source: CodecError },
    #[error("{archive}: corrupt archive, aggregate hashsum is incorrect")]
    AggregateMismatch { archive: String },

    #[error("File [{}] size {size} is too large (larger than a third of available memory, limit {limit})", .path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("{what} of {value} does not fit the archive format")]
    Overflow { what: &'static str, value: u64 },

    #[error("{context}: {source}")]
    Io { context: String, #[source] source: io::Error },
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Cannot compress {path}: {source}")]
    Compress { path: String, #[source] source: CodecError },
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::InvalidArgument(_) | ArchiveError::NonUtf8Path(_) => ErrorKind::InvalidArgument,
            ArchiveError::Header { source: HeaderError::Io(_), .. } => ErrorKind::IoFailure,
            ArchiveError::Header { .. }
            | ArchiveError::Toc { .. }
            | ArchiveError::TocTruncated { .. }
            | ArchiveError::TocDecompress { .. }
            | ArchiveError::EntryCountMismatch { .. }
            | ArchiveError::ContentTruncated { .. } => ErrorKind::InvalidFormat,
            ArchiveError::HashMismatch { .. }
            | ArchiveError::CorruptEntry { .. }
            | ArchiveError::AggregateMismatch { .. } => ErrorKind::IntegrityFailure,
            ArchiveError::FileTooLarge { .. } | ArchiveError::Overflow { .. } => ErrorKind::ResourceExceeded,
            ArchiveError::Io { .. } | ArchiveError::Walk(_) | ArchiveError::Compress { .. } => ErrorKind::IoFailure,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ArchiveError::Io { context: context.into(), source }
    }
}

/// Attach context to an `io::Result`.
pub(crate) trait IoContext<T> {
    fn context<F: FnOnce() -> String>(self, f: F) -> Result<T, ArchiveError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn context<F: FnOnce() -> String>(self, f: F) -> Result<T, ArchiveError> {
        self.map_err(|e| ArchiveError::io(f(), e))
    }
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;
