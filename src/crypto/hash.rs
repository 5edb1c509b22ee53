//! Hashing primitives.
//!
//! BLAKE3 is used for content digests (proof hashes, snapshot roots).
//! Keccak-256 is used for structured-message hashing so that the signing
//! layout matches what wallet tooling already produces.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// A 32-byte hash digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The zero hash
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a hash from raw bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string (an optional `0x` prefix is accepted)
    ///
    /// # Errors
    /// Returns error if hex string is invalid or wrong length
    pub fn from_hex(s: &str) -> Result<Self, super::CryptoError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| super::CryptoError::InvalidHash(e.to_string()))?;

        if bytes.len() != 32 {
            return Err(super::CryptoError::InvalidHash(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hasher for incremental BLAKE3 hashing
pub struct Hasher {
    inner: blake3::Hasher,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a new hasher
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Update the hasher with data
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and get the hash
    #[must_use]
    pub fn finalize(self) -> Hash {
        let result = self.inner.finalize();
        Hash::from_bytes(*result.as_bytes())
    }
}

/// Hash arbitrary data with BLAKE3
#[must_use]
pub fn hash_data(data: &[u8]) -> Hash {
    let result = blake3::hash(data);
    Hash::from_bytes(*result.as_bytes())
}

/// Keccak-256 over the concatenation of `parts`
#[must_use]
pub fn keccak256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash::from_bytes(bytes)
}

/// Encode an unsigned integer as a 32-byte big-endian word
#[must_use]
pub fn u256_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Compute Merkle root from a list of hashes
///
/// Uses a standard binary Merkle tree construction.
/// Empty list returns zero hash.
#[must_use]
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return Hash::ZERO;
    }

    if hashes.len() == 1 {
        return hashes[0];
    }

    let mut current_level: Vec<Hash> = hashes.to_vec();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity(current_level.len().div_ceil(2));

        for chunk in current_level.chunks(2) {
            let right = chunk.get(1).unwrap_or(&chunk[0]);
            let mut merkle_hasher = Hasher::new();
            merkle_hasher.update(chunk[0].as_bytes());
            merkle_hasher.update(right.as_bytes());
            next_level.push(merkle_hasher.finalize());
        }

        current_level = next_level;
    }

    current_level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"test data";
        assert_eq!(hash_data(data), hash_data(data));
        assert_ne!(hash_data(b"data1"), hash_data(b"data2"));
    }

    #[test]
    fn test_keccak_known_vector() {
        // keccak256("") is a well-known constant
        let empty = keccak256(&[]);
        assert_eq!(
            empty.to_hex(),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak_concatenates_parts() {
        assert_eq!(keccak256(&[b"learn", b"chain"]), keccak256(&[b"learnchain"]));
    }

    #[test]
    fn test_u256_word_is_big_endian() {
        let word = u256_word(0x0102);
        assert_eq!(word[30], 0x01);
        assert_eq!(word[31], 0x02);
        assert!(word[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_merkle_shapes() {
        assert_eq!(merkle_root(&[]), Hash::ZERO);

        let h = hash_data(b"single");
        assert_eq!(merkle_root(&[h]), h);

        let hashes: Vec<Hash> = (0..5u8).map(|i| hash_data(&[i])).collect();
        assert_eq!(merkle_root(&hashes), merkle_root(&hashes));
        assert_ne!(merkle_root(&hashes), merkle_root(&hashes[..4]));
    }

    #[test]
    fn test_hex_roundtrip_with_prefix() {
        let original = hash_data(b"test");
        let parsed = Hash::from_hex(&original.to_string()).unwrap();
        assert_eq!(original, parsed);
    }
}
