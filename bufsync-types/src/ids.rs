//! Identity and drift-detection digests.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::HashParseError;

/// Identity digest of a buffer's exact byte contents.
///
/// BLAKE3 over the raw bytes, displayed as lowercase hex. Used as the
/// "state" a client refers back to and as a component of the file-state
/// cache key. Not an integrity guarantee.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash the given bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Create a ContentHash from raw digest bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() == 32 {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(bytes);
            Some(Self(arr))
        } else {
            None
        }
    }

    /// Get the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..8])
    }
}

impl FromStr for ContentHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| HashParseError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes).ok_or(HashParseError::InvalidLength(bytes.len()))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Fast 64-bit checksum used only to detect transmission drift.
///
/// XXH3-64 over the raw bytes. Never used for identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(u64);

impl Checksum {
    /// Checksum the given bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(bytes))
    }

    /// Create a checksum from a raw value (e.g. one declared by a sender).
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(ContentHash::of(b"d"), ContentHash::of(b"d"));
        assert_ne!(ContentHash::of(b"d"), ContentHash::of(b"dd"));
    }

    #[test]
    fn content_hash_of_empty_is_defined() {
        let empty = ContentHash::of(b"");
        assert_eq!(empty.to_hex().len(), 64);
    }

    #[test]
    fn content_hash_hex_roundtrip() {
        let hash = ContentHash::of(b"print('hello')");
        let parsed: ContentHash = hash.to_hex().parse().unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn content_hash_rejects_bad_hex() {
        assert!(matches!(
            "zz".parse::<ContentHash>(),
            Err(HashParseError::InvalidHex(_))
        ));
        assert_eq!(
            "abcd".parse::<ContentHash>(),
            Err(HashParseError::InvalidLength(2))
        );
    }

    #[test]
    fn content_hash_serializes_as_hex_string() {
        let hash = ContentHash::of(b"x");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));

        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn checksum_matches_xxh3() {
        let text = b"import json";
        assert_eq!(
            Checksum::of(text).value(),
            xxhash_rust::xxh3::xxh3_64(text)
        );
    }

    #[test]
    fn checksum_is_transparent_in_json() {
        let checksum = Checksum::new(42);
        assert_eq!(serde_json::to_string(&checksum).unwrap(), "42");
    }
}
