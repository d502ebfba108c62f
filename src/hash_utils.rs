//! Hash Utilities for document sealing
//! Provides the content digest that signatures and verification are built on
//! Author: kartik4091
//! Created: 2026-03-02

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Digest length in bytes (SHA-256)
pub const HASH_LEN: usize = 32;

const READ_BUFFER: usize = 64 * 1024;

/// SHA-256 digest of a document's bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Parses a hex digest; accepts either case
    pub fn from_hex(value: &str) -> Result<Self> {
        let raw = hex::decode(value.trim())
            .map_err(|e| Error::MalformedPayload(format!("hash is not hex: {}", e)))?;
        Self::from_slice(&raw)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let bytes: [u8; HASH_LEN] = raw.try_into().map_err(|_| {
            Error::MalformedPayload(format!(
                "hash must be {} bytes, got {}",
                HASH_LEN,
                raw.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Constant-time comparison
    pub fn matches(&self, other: &ContentHash) -> bool {
        openssl::memcmp::eq(&self.0, &other.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_hex()
    }
}

/// Hashes a byte slice
pub fn digest(data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentHash(hasher.finalize().into())
}

/// Hashes file content at the given path without loading it whole
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUFFER];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(ContentHash(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_digest_is_deterministic() {
        let input = b"%PDF-1.7 sealed content";
        assert_eq!(digest(input), digest(input));
    }

    #[test]
    fn test_single_bit_change_changes_digest() {
        let original = b"%PDF-1.7 sealed content".to_vec();
        let mut flipped = original.clone();
        flipped[10] ^= 0x01;
        assert_ne!(digest(&original), digest(&flipped));
    }

    #[test]
    fn test_distinct_inputs_do_not_collide() {
        let hashes: std::collections::HashSet<_> =
            (0u32..500).map(|i| digest(&i.to_le_bytes())).collect();
        assert_eq!(hashes.len(), 500);
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(
            digest(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hex_parsing() {
        let hash = digest(b"integrity");
        let upper = hash.to_hex().to_uppercase();
        assert_eq!(ContentHash::from_hex(&upper).unwrap(), hash);
        assert!(ContentHash::from_hex("abcdef").is_err());
        assert!(ContentHash::from_hex("not hex at all").is_err());
    }

    #[test]
    fn test_matches() {
        let a = digest(b"one");
        let b = digest(b"two");
        assert!(a.matches(&a));
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_hash_file_matches_digest() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        assert_eq!(hash_file(file.path()).unwrap(), digest(&data));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = digest(b"serde");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
