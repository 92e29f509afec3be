use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Width of an [`Identifier`] in bytes (SHA-256 output).
pub const ID_SIZE: usize = 32;

/// Content-addressed identifier for a stored blob.
///
/// An `Identifier` is the SHA-256 hash of a blob's content. Identical content
/// always produces the same `Identifier`, which is what lets the store
/// collapse repeated writes into a single copy. Ordering is lexicographic
/// over the raw bytes, so sorted listings are deterministic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier([u8; ID_SIZE]);

impl Identifier {
    /// Compute the `Identifier` of an in-memory buffer.
    pub fn from_content(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut arr = [0u8; ID_SIZE];
        arr.copy_from_slice(&digest);
        Self(arr)
    }

    /// Create an `Identifier` from a pre-computed hash.
    pub const fn from_hash(hash: [u8; ID_SIZE]) -> Self {
        Self(hash)
    }

    /// Create an `Identifier` from a finalized digest of unknown width.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; ID_SIZE] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: ID_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// Lowercase hex representation, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters), for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string of exactly `2 * ID_SIZE` characters.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != ID_SIZE * 2 {
            return Err(TypeError::InvalidLength {
                expected: ID_SIZE * 2,
                actual: s.len(),
            });
        }
        let mut arr = [0u8; ID_SIZE];
        hex::decode_to_slice(s, &mut arr).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self(arr))
    }

    /// Returns `true` if the hex form of this id starts with `prefix`.
    pub fn has_hex_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.short_hex())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Identifier {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; ID_SIZE]> for Identifier {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Identifier> for [u8; ID_SIZE] {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

// Serialized as the hex text form so ids read naturally in JSON documents.
impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
