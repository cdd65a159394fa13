//! Merkle tree parent computation.
//!
//! Every interior node in a Bitcoin Merkle tree is `sha256d(left ∥ right)`
//! over the children's internal-order bytes. The `Hash` variant is the one
//! the tree, BUMP and proof code use; the hex variant accepts display-order
//! strings as printed by explorers.

use bsv_primitives::chainhash::Hash;
use bsv_primitives::hash::sha256d;

use crate::SpvError;

/// Compute the Merkle tree parent of two `Hash` values.
///
/// The hashes are in internal (little-endian) byte order and are
/// concatenated directly, then double-SHA256'd.
pub fn merkle_tree_parent(left: &Hash, right: &Hash) -> Hash {
    let mut concatenated = [0u8; 64];
    concatenated[..32].copy_from_slice(left.as_bytes());
    concatenated[32..].copy_from_slice(right.as_bytes());
    Hash::new(sha256d(&concatenated))
}

/// Compute the Merkle tree parent of two display-order hex hashes.
///
/// Both inputs are parsed (and reversed) into internal order, combined,
/// and the result rendered back in display order.
pub fn merkle_tree_parent_str(left: &str, right: &str) -> Result<String, SpvError> {
    let l = Hash::from_hex(left)?;
    let r = Hash::from_hex(right)?;
    Ok(merkle_tree_parent(&l, &r).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEFT: &str = "d6c79a6ef05572f0cb8e9a450c561fc40b0a8a7d48faad95e20d93ddeb08c231";
    const RIGHT: &str = "b1ed931b79056438b990d8981ba46fae97e5574b142445a74a44b978af284f98";
    const PARENT: &str = "b0d537b3ee52e472507f453df3d69561720346118a5a8c4d85ca0de73bc792be";

    #[test]
    fn test_merkle_tree_parent_str() {
        assert_eq!(merkle_tree_parent_str(LEFT, RIGHT).unwrap(), PARENT);
    }

    #[test]
    fn test_merkle_tree_parent_hash() {
        let left = Hash::from_hex(LEFT).unwrap();
        let right = Hash::from_hex(RIGHT).unwrap();
        assert_eq!(merkle_tree_parent(&left, &right), Hash::from_hex(PARENT).unwrap());
    }

    #[test]
    fn test_order_matters() {
        let left = Hash::from_hex(LEFT).unwrap();
        let right = Hash::from_hex(RIGHT).unwrap();
        assert_ne!(merkle_tree_parent(&left, &right), merkle_tree_parent(&right, &left));
    }

    #[test]
    fn test_invalid_hex_is_error() {
        assert!(merkle_tree_parent_str("zz", RIGHT).is_err());
        assert!(merkle_tree_parent_str(LEFT, "abcd").is_err());
    }
}
