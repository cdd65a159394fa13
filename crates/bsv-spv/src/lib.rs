//! SPV building blocks for BSV analysis tooling.
//!
//! Merkle trees and authentication paths, TSC proofs, BUMP (BRC-74)
//! Merkle paths, BEEF (BRC-62/95/96) bundles, and the provider traits
//! through which chain data is fetched.

pub mod error;
pub mod merkle_tree_parent;
pub mod merkle_tree;
pub mod merkle_proof;
pub mod merkle_path;
pub mod beef;
pub mod provider;
pub mod chain_tracker;

pub use error::SpvError;
pub use merkle_tree_parent::{merkle_tree_parent, merkle_tree_parent_str};
pub use merkle_tree::{
    build_tree, build_tree_from_data, calculate_root_from_path, compute_auth_path,
    compute_auth_path_hex, validate_path, verify_path, verify_path_hex, AuthPath, MerkleNode,
    MerkleTree, PathValidation,
};
pub use merkle_proof::{TargetType, TscProof, DUPLICATE_NODE};
pub use merkle_path::{BumpValidation, MerklePath, PathElement, TxidCheck};
pub use beef::{Beef, BeefTx, DataFormat, ATOMIC_BEEF, BEEF_V1, BEEF_V2};
pub use provider::{
    BlockId, BlockInfo, BlockchainProvider, InputRecord, OutputRecord, ProviderError,
    SpentStatus, TransactionRecord,
};
pub use chain_tracker::{ChainTracker, ProviderChainTracker};
