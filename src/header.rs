use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::digest::{HashSum, HASH_LEN};

pub const MAGIC: &[u8; 3] = b"LAR";
pub const VERSION: u8 = 1;
/// magic(3) + version(1) + toc_size(4) + toc_compressed_size(4) + entry_count(4) + hash(32)
pub const HEADER_SIZE: usize = 48;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Archive header too short: {len} of {HEADER_SIZE} bytes")]
    TooShort { len: usize },
    #[error("Invalid magic number {0:02x?}")]
    InvalidMagic([u8; 3]),
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveHeader {
    #[serde(skip)]
    pub magic: [u8; 3],
    pub version: u8,
    pub toc_size: u32,
    pub toc_compressed_size: u32,
    pub entry_count: u32,
    #[serde(serialize_with = "crate::toc::serialize_hash")]
    pub aggregate_hash: HashSum,
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveHeader {
    pub fn new() -> Self {
        Self {
            magic: *MAGIC,
            version: VERSION,
            toc_size: 0,
            toc_compressed_size: 0,
            entry_count: 0,
            aggregate_hash: [0u8; HASH_LEN],
        }
    }

    pub fn valid(&self) -> bool {
        &self.magic == MAGIC && self.version == VERSION
    }

    /// Byte offset of the content section.
    pub fn content_offset(&self) -> u64 {
        HEADER_SIZE as u64 + self.toc_compressed_size as u64
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u8(self.version)?;
        writer.write_u32::<LittleEndian>(self.toc_size)?;
        writer.write_u32::<LittleEndian>(self.toc_compressed_size)?;
        writer.write_u32::<LittleEndian>(self.entry_count)?;
        writer.write_all(&self.aggregate_hash)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        // Writing into a correctly sized slice cannot fail.
        let _ = self.write(&mut out[..]);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::TooShort { len: bytes.len() });
        }
        let mut reader = &bytes[..HEADER_SIZE];

        let mut magic = [0u8; 3];
        reader.read_exact(&mut magic)?;
        let version = reader.read_u8()?;
        let toc_size = reader.read_u32::<LittleEndian>()?;
        let toc_compressed_size = reader.read_u32::<LittleEndian>()?;
        let entry_count = reader.read_u32::<LittleEndian>()?;
        let mut aggregate_hash = [0u8; HASH_LEN];
        reader.read_exact(&mut aggregate_hash)?;

        let header = Self {
            magic,
            version,
            toc_size,
            toc_compressed_size,
            entry_count,
            aggregate_hash,
        };
        if &header.magic != MAGIC {
            return Err(HeaderError::InvalidMagic(header.magic));
        }
        if header.version != VERSION {
            return Err(HeaderError::UnsupportedVersion(header.version));
        }
        Ok(header)
    }

    /// Read the header from the start of `reader`.  A stream shorter than
    /// [`HEADER_SIZE`] yields [`HeaderError::TooShort`].
    pub fn read<R: Read>(reader: R) -> Result<Self, HeaderError> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        reader.take(HEADER_SIZE as u64).read_to_end(&mut buf)?;
        Self::from_bytes(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArchiveHeader {
        ArchiveHeader {
            toc_size: 0x0102_0304,
            toc_compressed_size: 77,
            entry_count: 3,
            aggregate_hash: [0xab; HASH_LEN],
            ..ArchiveHeader::new()
        }
    }

    #[test]
    fn layout_is_fixed_little_endian() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..3], b"LAR");
        assert_eq!(bytes[3], 1);
        assert_eq!(&bytes[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[8..12], &77u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(&bytes[16..48], &[0xab; 32]);
    }

    #[test]
    fn decode_restores_fields() {
        let h = sample();
        let back = ArchiveHeader::from_bytes(&h.to_bytes()).unwrap();
        assert!(back.valid());
        assert_eq!(back, h);
        assert_eq!(back.content_offset(), HEADER_SIZE as u64 + 77);
    }

    #[test]
    fn short_input_is_distinguished_from_bad_magic() {
        let bytes = sample().to_bytes();
        assert!(matches!(
            ArchiveHeader::from_bytes(&bytes[..HEADER_SIZE - 1]),
            Err(HeaderError::TooShort { len: 47 })
        ));
        assert!(matches!(
            ArchiveHeader::read(&bytes[..10]),
            Err(HeaderError::TooShort { len: 10 })
        ));

        let mut bad = bytes;
        bad[0] = b'Z';
        assert!(matches!(ArchiveHeader::from_bytes(&bad), Err(HeaderError::InvalidMagic(_))));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[3] = 2;
        assert!(matches!(
            ArchiveHeader::from_bytes(&bytes),
            Err(HeaderError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = sample().to_bytes().to_vec();
        bytes.extend_from_slice(b"content follows");
        assert_eq!(ArchiveHeader::from_bytes(&bytes).unwrap(), sample());
    }
}
