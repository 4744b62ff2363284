//! Scratch accumulators used while packing.
//!
//! The compressed content stream (and the compressed TOC) are appended to a
//! [`ScratchBuffer`] and copied into the final archive in fixed-size chunks,
//! so peak memory during assembly does not grow with the archive size.
//! Disk-backed buffers are anonymous temporary files: the OS reclaims them
//! when the buffer is dropped, on every exit path.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Chunk size used when copying a scratch buffer into the archive.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScratchKind {
    #[default]
    Disk,
    Memory,
}

enum Backing {
    Disk(File),
    Memory(Cursor<Vec<u8>>),
}

pub struct ScratchBuffer {
    backing: Backing,
    len: u64,
}

impl ScratchBuffer {
    /// Create an empty buffer.  Disk buffers live in `dir`, or the system
    /// temporary directory when `dir` is `None`.
    pub fn new(kind: ScratchKind, dir: Option<&Path>) -> io::Result<Self> {
        let backing = match kind {
            ScratchKind::Disk => Backing::Disk(match dir {
                Some(dir) => tempfile::tempfile_in(dir)?,
                None      => tempfile::tempfile()?,
            }),
            ScratchKind::Memory => Backing::Memory(Cursor::new(Vec::new())),
        };
        Ok(Self { backing, len: 0 })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &mut self.backing {
            Backing::Disk(f)   => f.write_all(bytes)?,
            Backing::Memory(c) => c.write_all(bytes)?,
        }
        self.len += bytes.len() as u64;
        Ok(())
    }

    /// Copy the whole buffer to `out` in [`COPY_CHUNK_SIZE`] chunks.
    /// Returns the number of bytes copied.
    pub fn copy_to<W: Write>(&mut self, out: &mut W) -> io::Result<u64> {
        match &mut self.backing {
            Backing::Disk(f) => {
                f.flush()?;
                f.seek(SeekFrom::Start(0))?;
                copy_chunked(f, out, self.len)
            }
            Backing::Memory(c) => {
                c.seek(SeekFrom::Start(0))?;
                copy_chunked(c, out, self.len)
            }
        }
    }
}

fn copy_chunked<R: Read, W: Write>(src: &mut R, out: &mut W, len: u64) -> io::Result<u64> {
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(COPY_CHUNK_SIZE as u64) as usize;
        src.read_exact(&mut buf[..want])?;
        out.write_all(&buf[..want])?;
        remaining -= want as u64;
    }
    Ok(len)
}
