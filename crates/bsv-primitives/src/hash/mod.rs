//! Hash function primitives.
//!
//! SHA-256 and double SHA-256 are the only digests the Merkle, BUMP and
//! BEEF layers need: txids, block hashes and every interior Merkle node
//! are `sha256d` outputs.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of the input data.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA-256 (SHA-256d) hash of the input data.
///
/// This is the hash used for transaction IDs, block hashes and Merkle
/// tree nodes. Computes SHA-256(SHA-256(data)). The result is in internal
/// byte order; reverse it for display.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte double-SHA-256 digest.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}
