//! Compressor port: a black-box `compress` / `decompress` pair.
//!
//! # Identity rules
//! The container does not record which compressor produced it.  A reader
//! must be configured with the same [`CompressorKind`] the writer used;
//! `bzip2` is the format default.
//!
//! # Bounded decompression
//! Every decompression is given the exact expected output length (taken
//! from the TOC or header).  Output is read through `Read::take` so a
//! corrupt stream can never inflate past `expected_len + 1` bytes.

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;
use thiserror::Error;

/// Largest up-front allocation made from an untrusted length field.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

// ── CompressorKind ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressorKind {
    /// Payload stored verbatim.
    None,
    /// bzip2, the format default.
    #[default]
    Bzip2,
    Zstd,
    /// LZ4 frame format.
    Lz4,
}

impl CompressorKind {
    /// Human-readable name (also the CLI spelling).
    pub fn name(self) -> &'static str {
        match self {
            CompressorKind::None  => "none",
            CompressorKind::Bzip2 => "bzip2",
            CompressorKind::Zstd  => "zstd",
            CompressorKind::Lz4   => "lz4",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none"         => Some(CompressorKind::None),
            "bzip2" | "bz2" => Some(CompressorKind::Bzip2),
            "zstd"         => Some(CompressorKind::Zstd),
            "lz4"          => Some(CompressorKind::Lz4),
            _              => None,
        }
    }

    /// Default level: bzip2 block size 9, zstd level 3.  Ignored for lz4/none.
    pub fn default_level(self) -> i32 {
        match self {
            CompressorKind::Bzip2 => 9,
            CompressorKind::Zstd  => 3,
            _                     => 0,
        }
    }
}

impl fmt::Display for CompressorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown compressor '{s}' (expected none, bzip2, zstd or lz4)"))
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Decompressed size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

// ── Compressor trait ─────────────────────────────────────────────────────────

pub trait Compressor: Send + Sync {
    fn kind(&self) -> CompressorKind;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    /// Decompress `data`, which must inflate to exactly `expected_len` bytes.
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError>;
}

fn read_bounded<R: Read>(reader: R, expected_len: usize) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(expected_len.min(MAX_PREALLOC));
    reader
        .take(expected_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Decompression(e.to_string()))?;
    if out.len() != expected_len {
        return Err(CodecError::SizeMismatch { expected: expected_len, actual: out.len() });
    }
    Ok(out)
}

fn compression_err(e: io::Error) -> CodecError {
    CodecError::Compression(e.to_string())
}

// ── Built-in implementations ─────────────────────────────────────────────────

pub struct NoneCompressor;
impl Compressor for NoneCompressor {
    fn kind(&self) -> CompressorKind { CompressorKind::None }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        read_bounded(data, expected_len)
    }
}

pub struct Bzip2Compressor {
    pub level: u32,
}
impl Compressor for Bzip2Compressor {
    fn kind(&self) -> CompressorKind { CompressorKind::Bzip2 }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::new(self.level));
        enc.write_all(data).map_err(compression_err)?;
        enc.finish().map_err(compression_err)
    }
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        read_bounded(bzip2::read::BzDecoder::new(data), expected_len)
    }
}

pub struct ZstdCompressor {
    pub level: i32,
}
impl Compressor for ZstdCompressor {
    fn kind(&self) -> CompressorKind { CompressorKind::Zstd }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, self.level).map_err(compression_err)
    }
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        let decoder = zstd::stream::read::Decoder::new(data)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        read_bounded(decoder, expected_len)
    }
}

pub struct Lz4Compressor;
impl Compressor for Lz4Compressor {
    fn kind(&self) -> CompressorKind { CompressorKind::Lz4 }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut enc = lz4_flex::frame::FrameEncoder::new(Vec::new());
        enc.write_all(data).map_err(compression_err)?;
        enc.finish().map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
        read_bounded(lz4_flex::frame::FrameDecoder::new(data), expected_len)
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a kind and level to a built-in compressor.
pub fn get_compressor(kind: CompressorKind, level: i32) -> Box<dyn Compressor> {
    match kind {
        CompressorKind::None  => Box::new(NoneCompressor),
        CompressorKind::Bzip2 => Box::new(Bzip2Compressor { level: level.clamp(1, 9) as u32 }),
        CompressorKind::Zstd  => Box::new(ZstdCompressor { level: level.clamp(1, 22) }),
        CompressorKind::Lz4   => Box::new(Lz4Compressor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [CompressorKind; 4] = [
        CompressorKind::None,
        CompressorKind::Bzip2,
        CompressorKind::Zstd,
        CompressorKind::Lz4,
    ];

    #[test]
    fn every_compressor_round_trips() {
        let data: Vec<u8> = b"the quick brown fox ".iter().cycle().take(10_000).copied().collect();
        for kind in ALL {
            let c = get_compressor(kind, kind.default_level());
            let packed = c.compress(&data).unwrap();
            assert_eq!(c.decompress(&packed, data.len()).unwrap(), data, "{kind}");
        }
    }

    #[test]
    fn empty_input_round_trips() {
        for kind in ALL {
            let c = get_compressor(kind, kind.default_level());
            let packed = c.compress(b"").unwrap();
            assert!(c.decompress(&packed, 0).unwrap().is_empty(), "{kind}");
        }
    }

    #[test]
    fn wrong_expected_length_is_rejected() {
        for kind in ALL {
            let c = get_compressor(kind, kind.default_level());
            let packed = c.compress(b"twelve bytes").unwrap();
            assert!(matches!(
                c.decompress(&packed, 5),
                Err(CodecError::SizeMismatch { expected: 5, .. })
            ), "{kind}");
            assert!(c.decompress(&packed, 100).is_err(), "{kind}");
        }
    }

    #[test]
    fn names_parse_back() {
        for kind in ALL {
            assert_eq!(kind.name().parse::<CompressorKind>().unwrap(), kind);
        }
        assert_eq!(CompressorKind::from_name("BZ2"), Some(CompressorKind::Bzip2));
        assert!("brotli".parse::<CompressorKind>().is_err());
    }
}
