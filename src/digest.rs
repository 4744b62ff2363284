//! Digest port: 32-byte content hashes.
//!
//! Two interchangeable backends share one contract.  SHA-256 is the format
//! default; BLAKE3 is faster but yields archives only a BLAKE3 reader can
//! verify, since the container does not record the digest algorithm.

use std::fmt;
use std::str::FromStr;

use sha2::Digest as _;

/// Byte length of every digest stored in the container.
pub const HASH_LEN: usize = 32;

pub type HashSum = [u8; HASH_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestKind {
    #[default]
    Sha256,
    Blake3,
}

impl DigestKind {
    pub fn name(self) -> &'static str {
        match self {
            DigestKind::Sha256 => "sha256",
            DigestKind::Blake3 => "blake3",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Some(DigestKind::Sha256),
            "blake3"             => Some(DigestKind::Blake3),
            _                    => None,
        }
    }
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown digest '{s}' (expected sha256 or blake3)"))
    }
}

pub trait Digest: Send + Sync {
    fn kind(&self) -> DigestKind;
    fn digest(&self, data: &[u8]) -> HashSum;
}

pub struct Sha256Digest;
impl Digest for Sha256Digest {
    fn kind(&self) -> DigestKind { DigestKind::Sha256 }
    fn digest(&self, data: &[u8]) -> HashSum {
        sha2::Sha256::digest(data).into()
    }
}

pub struct Blake3Digest;
impl Digest for Blake3Digest {
    fn kind(&self) -> DigestKind { DigestKind::Blake3 }
    fn digest(&self, data: &[u8]) -> HashSum {
        blake3::hash(data).into()
    }
}

pub fn get_digest(kind: DigestKind) -> Box<dyn Digest> {
    match kind {
        DigestKind::Sha256 => Box::new(Sha256Digest),
        DigestKind::Blake3 => Box::new(Blake3Digest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            hex::encode(Sha256Digest.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn backends_differ_but_are_deterministic() {
        let a = get_digest(DigestKind::Sha256);
        let b = get_digest(DigestKind::Blake3);
        assert_eq!(a.digest(b"data"), a.digest(b"data"));
        assert_eq!(b.digest(b"data"), b.digest(b"data"));
        assert_ne!(a.digest(b"data"), b.digest(b"data"));
    }
}
