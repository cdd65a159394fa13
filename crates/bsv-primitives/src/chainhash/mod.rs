//! Chain hash type for transaction, block and Merkle node identification.
//!
//! A `Hash` stores its 32 bytes in internal order (the order they travel on
//! the wire and are fed to `sha256d`). Its string form is display order:
//! the bytes reversed, then hex encoded, which is how explorers print txids,
//! block hashes and Merkle roots. Conversions between the two orders happen
//! only here, at the rendering / parsing boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hash::{sha256, sha256d};
use crate::PrimitivesError;

/// Size of a Hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Length of a display-order hex string (64 characters).
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// A 32-byte hash in internal byte order.
///
/// Displayed (and parsed) as byte-reversed hex, matching Bitcoin's
/// convention for txids and block hashes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Create a Hash from 32 bytes already in internal order.
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    /// Create a Hash from a byte slice in internal order.
    ///
    /// # Arguments
    /// * `bytes` - A slice that must be exactly 32 bytes.
    ///
    /// # Returns
    /// `Ok(Hash)` if the slice is 32 bytes, or `InvalidHash` otherwise.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let arr: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| {
            PrimitivesError::InvalidHash(format!(
                "invalid hash length of {}, want {}",
                bytes.len(),
                HASH_SIZE
            ))
        })?;
        Ok(Hash(arr))
    }

    /// Create a Hash from 32 bytes in display order (reversing them).
    pub fn from_display_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let mut h = Self::from_bytes(bytes)?;
        h.0.reverse();
        Ok(h)
    }

    /// Parse a display-order hex string (64 hex characters).
    ///
    /// # Arguments
    /// * `hex_str` - Hex of the reversed hash, as printed by explorers.
    ///
    /// # Returns
    /// `Ok(Hash)` in internal order, or an error for bad length or characters.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        if hex_str.len() != HASH_HEX_SIZE {
            return Err(PrimitivesError::InvalidHash(format!(
                "hash hex must be {} characters, got {}",
                HASH_HEX_SIZE,
                hex_str.len()
            )));
        }
        let decoded = hex::decode(hex_str)?;
        Self::from_display_bytes(&decoded)
    }

    /// Access the bytes in internal order.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Return the bytes in display order.
    pub fn to_display_bytes(&self) -> [u8; HASH_SIZE] {
        let mut out = self.0;
        out.reverse();
        out
    }

    /// Return a copy with the bytes flipped end for end.
    ///
    /// Useful when a value arrives in the opposite convention from the one
    /// its producer claims, e.g. a root supplied as internal-order hex.
    pub fn reversed(&self) -> Self {
        Hash(self.to_display_bytes())
    }
}

/// Display the hash as byte-reversed hex.
impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_display_bytes()))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// SHA-256 of the input as a Hash.
pub fn hash_h(data: &[u8]) -> Hash {
    Hash(sha256(data))
}

/// Double SHA-256 of the input as a Hash (txid / block hash / Merkle node).
pub fn double_hash_h(data: &[u8]) -> Hash {
    Hash(sha256d(data))
}
