//! Identity codec
//!
//! Node values are reduced to fixed-width hex digests, and a quad is
//! identified by the concatenation of its four node digests:
//!
//! ```text
//! [ subject | predicate | object | label ]
//!   0         W           2W       3W      4W
//! ```
//!
//! Because every segment has the same width, any component of any compound
//! key can be sliced out without touching storage. The primitive iterators
//! rely on this to answer `check` in memory.

use crate::error::{QuadStoreError, Result};
use crate::types::{Direction, Quad, Value};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

/// Digest algorithm used for node hashes.
///
/// Fixed when a store is created; every compound key in the store depends
/// on its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    /// Non-cryptographic, 8-byte digest
    Xxh64,
}

impl HashAlgorithm {
    /// Raw digest size in bytes
    pub fn size(&self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
            HashAlgorithm::Xxh64 => 8,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha224 => Sha224::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
            HashAlgorithm::Xxh64 => xxhash_rust::xxh64::xxh64(data, 0).to_be_bytes().to_vec(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Xxh64 => "xxh64",
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = QuadStoreError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha224" => Ok(HashAlgorithm::Sha224),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "xxh64" => Ok(HashAlgorithm::Xxh64),
            "" => Err(QuadStoreError::Config("no hash algorithm set".to_string())),
            other => Err(QuadStoreError::Config(format!(
                "unknown hash algorithm '{}'",
                other
            ))),
        }
    }
}

/// Builds and slices compound keys for one hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCodec {
    algorithm: HashAlgorithm,
}

impl KeyCodec {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        KeyCodec { algorithm }
    }

    /// Codec for an algorithm given by name; unknown names are a config error.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(KeyCodec::new(name.parse()?))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hex width of one segment (`W`)
    pub fn segment_width(&self) -> usize {
        self.algorithm.size() * 2
    }

    /// Total compound key width (`4W`)
    pub fn key_width(&self) -> usize {
        self.segment_width() * 4
    }

    /// Hex-encoded digest of a node name
    pub fn hash(&self, name: &str) -> Value {
        Value(hex::encode(self.algorithm.digest(name.as_bytes())))
    }

    pub fn compound_key(&self, subject: &str, predicate: &str, object: &str, label: &str) -> Value {
        let mut key = String::with_capacity(self.key_width());
        for name in [subject, predicate, object, label] {
            key.push_str(&hex::encode(self.algorithm.digest(name.as_bytes())));
        }
        Value(key)
    }

    pub fn quad_key(&self, quad: &Quad) -> Value {
        self.compound_key(&quad.subject, &quad.predicate, &quad.object, &quad.label)
    }

    /// Byte offset of the segment for `dir`.
    pub fn offset(&self, dir: Direction) -> Result<usize> {
        dir.index()
            .map(|i| i * self.segment_width())
            .ok_or_else(|| {
                QuadStoreError::ContractViolation(
                    "cannot extract a key segment for direction any".to_string(),
                )
            })
    }

    /// The `W`-wide segment of `key` holding the node hash for `dir`.
    pub fn segment<'a>(&self, key: &'a str, dir: Direction) -> Result<&'a str> {
        let offset = self.offset(dir)?;
        let width = self.segment_width();
        if key.len() < self.key_width() {
            return Err(QuadStoreError::ContractViolation(format!(
                "compound key of length {} is shorter than {}",
                key.len(),
                self.key_width()
            )));
        }
        key.get(offset..offset + width).ok_or_else(|| {
            QuadStoreError::ContractViolation(format!(
                "compound key is not hex at {}..{}",
                offset,
                offset + width
            ))
        })
    }

    /// All four segments in direction order.
    pub fn split<'a>(&self, key: &'a str) -> Result<[&'a str; 4]> {
        Ok([
            self.segment(key, Direction::Subject)?,
            self.segment(key, Direction::Predicate)?,
            self.segment(key, Direction::Object)?,
            self.segment(key, Direction::Label)?,
        ])
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        KeyCodec::new(HashAlgorithm::default())
    }
}
