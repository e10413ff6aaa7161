//! Content checksum type using BLAKE3

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const COMBINE_TAG: &[u8] = b"kiln:combine:v1";
const ADD_TAG: &[u8] = b"kiln:add:v1";
const EMPTY_SET_TAG: &[u8] = b"kiln:empty-set:v1";

/// A 32-byte BLAKE3 digest used as a fingerprint and cache-key component
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// The zero checksum. Real content never digests to it; seeing it means corruption.
    pub const ZERO: Checksum = Checksum([0u8; 32]);

    /// Create a checksum from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Checksum(bytes)
    }

    /// Hash arbitrary data
    pub fn digest(data: &[u8]) -> Self {
        Checksum(*blake3::hash(data).as_bytes())
    }

    /// Hash multiple pieces of data as one stream
    pub fn digest_many(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Checksum(*hasher.finalize().as_bytes())
    }

    /// Stand-in for a node that has nothing to combine (no files, no dependencies)
    pub fn empty_set() -> Self {
        Self::digest(EMPTY_SET_TAG)
    }

    /// Fold a sequence of checksums into one. Order matters.
    pub fn combine<'a, I>(checksums: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Checksum>,
    {
        let mut iter = checksums.into_iter();
        let first = iter.next().ok_or(Error::EmptyInput)?;
        Ok(Self::fold(first, iter))
    }

    /// Like [`Checksum::combine`], but yields [`Checksum::empty_set`] for an empty sequence
    pub fn aggregate<'a, I>(checksums: I) -> Self
    where
        I: IntoIterator<Item = &'a Checksum>,
    {
        let mut iter = checksums.into_iter();
        match iter.next() {
            Some(first) => Self::fold(first, iter),
            None => Self::empty_set(),
        }
    }

    fn fold<'a>(first: &Checksum, rest: impl Iterator<Item = &'a Checksum>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(COMBINE_TAG);
        hasher.update(&first.0);
        let mut count: u64 = 1;
        for checksum in rest {
            hasher.update(&checksum.0);
            count += 1;
        }
        hasher.update(&count.to_le_bytes());
        Checksum(*hasher.finalize().as_bytes())
    }

    /// Mix another checksum into this one without access to the original inputs
    pub fn add(&self, other: &Checksum) -> Checksum {
        Self::digest_many(&[ADD_TAG, &self.0, &other.0])
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidHash(format!("{}: {}", s, e)))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidHash(format!("{}: expected 32 bytes", s)))?;
        Ok(Checksum(arr))
    }

    /// Get a short prefix for display (first 7 chars, like git)
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }

    /// Check if this is the zero checksum
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.short())
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Checksum::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
