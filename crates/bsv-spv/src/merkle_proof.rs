//! TSC-style Merkle proofs: the JSON shape explorers and wallets exchange.
//!
//! ```json
//! { "index": 2, "txOrId": "<txid>", "target": "<root>", "targetType": "merkleRoot",
//!   "nodes": ["<hash>", "*", "<hash>"] }
//! ```
//!
//! A `"*"` node means "pair the working hash with itself", which is how
//! the odd-level padding copy shows up in a single-leaf proof.

use bsv_primitives::chainhash::Hash;
use bsv_primitives::hash::sha256d;
use serde::{Deserialize, Serialize};

use crate::merkle_tree::{verify_path, MerkleTree, PathValidation};
use crate::merkle_tree_parent::merkle_tree_parent;
use crate::SpvError;

/// Marker for a duplicated node.
pub const DUPLICATE_NODE: &str = "*";

/// What the proof's `target` field names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetType {
    /// A block hash. Assumed when a proof omits `targetType`.
    #[default]
    Hash,
    /// A full 80-byte block header.
    Header,
    MerkleRoot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TscProof {
    /// Position of the transaction in the block.
    pub index: u64,
    /// A display-order txid, or the full raw transaction hex.
    pub tx_or_id: String,
    pub target: String,
    #[serde(default)]
    pub target_type: TargetType,
    /// Sibling hashes in display order, or [`DUPLICATE_NODE`].
    pub nodes: Vec<String>,
}

impl TscProof {
    /// Build the proof for `leaf_index` targeting the tree's Merkle root.
    pub fn from_tree(tree: &MerkleTree, leaf_index: usize) -> Result<Self, SpvError> {
        let path = tree.auth_path(leaf_index)?;
        let leaf = tree
            .node(0, leaf_index)
            .ok_or(SpvError::IndexOutOfRange {
                index: leaf_index,
                count: tree.leaf_count(),
            })?;

        let mut position = leaf_index;
        let mut nodes = Vec::with_capacity(path.siblings.len());
        for (level, sibling) in path.siblings.iter().enumerate() {
            if tree.sibling_is_duplicate(level, position) {
                nodes.push(DUPLICATE_NODE.to_string());
            } else {
                nodes.push(sibling.to_string());
            }
            position /= 2;
        }

        Ok(TscProof {
            index: leaf_index as u64,
            tx_or_id: leaf.hash.to_string(),
            target: tree.root().to_string(),
            target_type: TargetType::MerkleRoot,
            nodes,
        })
    }

    /// The txid this proof is about.
    ///
    /// A 64-character `tx_or_id` is taken as a txid; anything longer is a
    /// raw transaction and is hashed.
    pub fn txid(&self) -> Result<Hash, SpvError> {
        if self.tx_or_id.len() == 64 {
            Ok(Hash::from_hex(&self.tx_or_id)?)
        } else {
            let raw = hex::decode(&self.tx_or_id)?;
            Ok(Hash::new(sha256d(&raw)))
        }
    }

    /// Fold the nodes up from the transaction to a Merkle root.
    pub fn compute_root(&self) -> Result<Hash, SpvError> {
        let mut current = self.txid()?;
        let mut index = self.index;
        for node in &self.nodes {
            let sibling = if node == DUPLICATE_NODE {
                current
            } else {
                Hash::from_hex(node)?
            };
            current = if index % 2 == 0 {
                merkle_tree_parent(&current, &sibling)
            } else {
                merkle_tree_parent(&sibling, &current)
            };
            index /= 2;
        }
        if index != 0 {
            return Err(SpvError::InvalidProof(format!(
                "index {} needs more than {} nodes",
                self.index,
                self.nodes.len()
            )));
        }
        Ok(current)
    }

    /// Check the proof against a known Merkle root.
    pub fn verify_against_root(&self, root: &Hash) -> Result<PathValidation, SpvError> {
        let calculated = self.compute_root()?;
        Ok(verify_path(&calculated, &[], 0, root))
    }

    /// The Merkle root named by the target, when it can be read without
    /// chain data. `None` for block-hash targets.
    pub fn target_root(&self) -> Result<Option<Hash>, SpvError> {
        match self.target_type {
            TargetType::MerkleRoot => Ok(Some(Hash::from_hex(&self.target)?)),
            TargetType::Header => {
                let header = hex::decode(&self.target)?;
                if header.len() != HEADER_LEN {
                    return Err(SpvError::InvalidProof(format!(
                        "block header is {} bytes, expected {}",
                        header.len(),
                        HEADER_LEN
                    )));
                }
                let root = Hash::from_bytes(&header[36..68])?;
                Ok(Some(root))
            }
            TargetType::Hash => Ok(None),
        }
    }

    /// Check a proof whose target carries its own Merkle root.
    ///
    /// Block-hash targets need a chain lookup and are rejected; use
    /// [`TscProof::verify_against_root`] with the block's root instead.
    pub fn verify(&self) -> Result<PathValidation, SpvError> {
        match self.target_root()? {
            Some(root) => self.verify_against_root(&root),
            None => Err(SpvError::InvalidProof(
                "block hash target cannot be verified without block data".to_string(),
            )),
        }
    }
}

const HEADER_LEN: usize = 80;

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Hash> {
        (0..n).map(|i| Hash::new(sha256d(&[i as u8]))).collect()
    }

    #[test]
    fn test_duplicate_marker_for_last_odd_leaf() {
        let tree = MerkleTree::from_hashes(&leaves(3)).unwrap();
        let proof = TscProof::from_tree(&tree, 2).unwrap();
        assert_eq!(proof.nodes[0], DUPLICATE_NODE);
        assert_ne!(proof.nodes[1], DUPLICATE_NODE);
        assert!(proof.verify().unwrap().valid);
    }

    #[test]
    fn test_all_indices_verify() {
        for n in 1..=9 {
            let tree = MerkleTree::from_hashes(&leaves(n)).unwrap();
            for i in 0..n {
                let proof = TscProof::from_tree(&tree, i).unwrap();
                assert_eq!(proof.compute_root().unwrap(), tree.root(), "n={} i={}", n, i);
            }
        }
    }

    #[test]
    fn test_json_shape() {
        let tree = MerkleTree::from_hashes(&leaves(3)).unwrap();
        let proof = TscProof::from_tree(&tree, 2).unwrap();
        let value = serde_json::to_value(&proof).unwrap();
        assert_eq!(value["index"], 2);
        assert_eq!(value["targetType"], "merkleRoot");
        assert_eq!(value["nodes"][0], "*");
        assert!(value["txOrId"].is_string());

        let back: TscProof = serde_json::from_value(value).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn test_raw_transaction_form() {
        let raw = vec![0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let txid = Hash::new(sha256d(&raw));
        let tree = MerkleTree::from_hashes(&[txid, leaves(1)[0]]).unwrap();
        let mut proof = TscProof::from_tree(&tree, 0).unwrap();
        proof.tx_or_id = hex::encode(&raw);
        assert_eq!(proof.txid().unwrap(), txid);
        assert!(proof.verify().unwrap().valid);
    }

    #[test]
    fn test_wrong_root_is_invalid_not_error() {
        let tree = MerkleTree::from_hashes(&leaves(4)).unwrap();
        let proof = TscProof::from_tree(&tree, 1).unwrap();
        let result = proof.verify_against_root(&Hash::new([0u8; 32])).unwrap();
        assert!(!result.valid);
        assert!(result.reason.is_some());
    }

    #[test]
    fn test_too_few_nodes() {
        let tree = MerkleTree::from_hashes(&leaves(4)).unwrap();
        let mut proof = TscProof::from_tree(&tree, 3).unwrap();
        proof.nodes.pop();
        assert!(matches!(proof.compute_root(), Err(SpvError::InvalidProof(_))));
    }

    #[test]
    fn test_header_target() {
        let tree = MerkleTree::from_hashes(&leaves(2)).unwrap();
        let mut proof = TscProof::from_tree(&tree, 0).unwrap();

        let mut header = vec![0u8; 80];
        header[0] = 1;
        header[36..68].copy_from_slice(tree.root().as_bytes());
        proof.target = hex::encode(&header);
        proof.target_type = TargetType::Header;
        assert_eq!(proof.target_root().unwrap(), Some(tree.root()));
        assert!(proof.verify().unwrap().valid);

        proof.target = hex::encode(&header[..79]);
        assert!(matches!(proof.verify(), Err(SpvError::InvalidProof(_))));
    }

    #[test]
    fn test_hash_target_needs_chain_data() {
        let tree = MerkleTree::from_hashes(&leaves(2)).unwrap();
        let mut proof = TscProof::from_tree(&tree, 0).unwrap();
        proof.target_type = TargetType::Hash;
        assert_eq!(proof.target_root().unwrap(), None);
        assert!(proof.verify().is_err());
        assert!(proof.verify_against_root(&tree.root()).unwrap().valid);
    }

    #[test]
    fn test_missing_target_type_means_block_hash() {
        let json = serde_json::json!({
            "index": 0,
            "txOrId": "00".repeat(32),
            "target": "11".repeat(32),
            "nodes": []
        });
        let proof: TscProof = serde_json::from_value(json).unwrap();
        assert_eq!(proof.target_type, TargetType::Hash);
    }
}
