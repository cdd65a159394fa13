//! Full Merkle tree construction, authentication paths and path validation.
//!
//! The tree is stored as an arena of levels: `levels[0]` holds the leaves,
//! the last level holds the root, and a node is addressed by
//! `(level, position)`. Its children are `(level - 1, 2 * position)` and
//! `(level - 1, 2 * position + 1)`.
//!
//! Odd-length levels are padded with a value copy of their last hash before
//! pairing. This is Bitcoin's consensus rule and it carries the
//! CVE-2012-2459 ambiguity: the lists `[A, B, C]` and `[A, B, C, C]` produce
//! the same root. The behavior is kept bit for bit because every block
//! header on chain depends on it; callers that need to tell the two lists
//! apart must compare leaf counts, not roots.

use bsv_primitives::chainhash::Hash;
use bsv_primitives::hash::sha256d;
use serde::{Deserialize, Serialize};

use crate::merkle_tree_parent::merkle_tree_parent;
use crate::SpvError;

/// One level of the arena.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Level {
    hashes: Vec<Hash>,
    /// The last entry is a padding copy of the one before it.
    padded: bool,
}

/// A node addressed by `(level, position)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleNode {
    /// Synthetic identifier, `"L{level}:P{position}"`; padding copies carry
    /// a `":dup"` suffix so they never share an identity with the original.
    pub id: String,
    pub hash: Hash,
    /// 0 for leaves.
    pub level: usize,
    pub position: usize,
    /// Index into the original leaf list, only for real level-0 nodes.
    pub leaf_index: Option<usize>,
    pub is_duplicate: bool,
}

/// An authentication path: the sibling hashes from the leaf level upward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPath {
    pub leaf_index: usize,
    pub siblings: Vec<Hash>,
}

/// Outcome of checking a path against an expected root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathValidation {
    pub valid: bool,
    pub calculated_root: Hash,
    pub expected_root: Hash,
    /// Set when `valid` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// An immutable Merkle tree built from an ordered leaf list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Level>,
}

impl MerkleTree {
    /// Build a tree whose leaves are already-computed hashes (e.g. txids).
    ///
    /// A single leaf is its own root; no hashing happens.
    pub fn from_hashes(leaves: &[Hash]) -> Result<Self, SpvError> {
        if leaves.is_empty() {
            return Err(SpvError::EmptyInput);
        }

        let mut levels = Vec::new();
        let mut current = leaves.to_vec();
        while current.len() > 1 {
            let padded = current.len() % 2 == 1;
            if padded {
                // Same value, not a fresh hash (CVE-2012-2459, see module docs).
                let last = current[current.len() - 1];
                current.push(last);
            }
            let next: Vec<Hash> = current
                .chunks_exact(2)
                .map(|pair| merkle_tree_parent(&pair[0], &pair[1]))
                .collect();
            levels.push(Level {
                hashes: current,
                padded,
            });
            current = next;
        }
        levels.push(Level {
            hashes: current,
            padded: false,
        });

        Ok(MerkleTree { levels })
    }

    /// Build a tree over raw data leaves, hashing each with `sha256d` first.
    pub fn from_data<T: AsRef<[u8]>>(leaves: &[T]) -> Result<Self, SpvError> {
        let hashed: Vec<Hash> = leaves
            .iter()
            .map(|leaf| Hash::new(sha256d(leaf.as_ref())))
            .collect();
        Self::from_hashes(&hashed)
    }

    /// Build a tree from display-order hex txids.
    pub fn from_hex_leaves<S: AsRef<str>>(leaves: &[S]) -> Result<Self, SpvError> {
        let hashes = leaves
            .iter()
            .map(|s| Hash::from_hex(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_hashes(&hashes)
    }

    pub fn root(&self) -> Hash {
        // `from_hashes` always leaves a single-entry top level.
        self.levels
            .last()
            .and_then(|level| level.hashes.first())
            .copied()
            .unwrap_or_default()
    }

    /// Number of original leaves (padding excluded).
    pub fn leaf_count(&self) -> usize {
        self.real_len(0)
    }

    /// Number of levels above the leaves; 0 for a single-leaf tree.
    pub fn height(&self) -> usize {
        self.levels.len() - 1
    }

    /// The hashes at `level`, padding copy included.
    pub fn level(&self, level: usize) -> Option<&[Hash]> {
        self.levels.get(level).map(|l| l.hashes.as_slice())
    }

    /// Look up a node by arena coordinates.
    pub fn node(&self, level: usize, position: usize) -> Option<MerkleNode> {
        let lvl = self.levels.get(level)?;
        let hash = *lvl.hashes.get(position)?;
        let is_duplicate = lvl.padded && position == lvl.hashes.len() - 1;
        let id = if is_duplicate {
            format!("L{}:P{}:dup", level, position)
        } else {
            format!("L{}:P{}", level, position)
        };
        Some(MerkleNode {
            id,
            hash,
            level,
            position,
            leaf_index: (level == 0 && !is_duplicate).then_some(position),
            is_duplicate,
        })
    }

    /// The two children of a node, or `None` for leaves.
    pub fn children(&self, node: &MerkleNode) -> Option<(MerkleNode, MerkleNode)> {
        if node.level == 0 {
            return None;
        }
        let left = self.node(node.level - 1, node.position * 2)?;
        let right = self.node(node.level - 1, node.position * 2 + 1)?;
        Some((left, right))
    }

    /// Whether the sibling used at `level` for a path through `position` is
    /// a padding copy (i.e. equal to the working hash itself).
    pub(crate) fn sibling_is_duplicate(&self, level: usize, position: usize) -> bool {
        match self.levels.get(level) {
            Some(lvl) => lvl.padded && (position ^ 1) == lvl.hashes.len() - 1,
            None => false,
        }
    }

    /// Compute the authentication path for `leaf_index`.
    pub fn auth_path(&self, leaf_index: usize) -> Result<AuthPath, SpvError> {
        let count = self.leaf_count();
        if leaf_index >= count {
            return Err(SpvError::IndexOutOfRange {
                index: leaf_index,
                count,
            });
        }

        let mut siblings = Vec::with_capacity(self.height());
        let mut index = leaf_index;
        for level in &self.levels[..self.height()] {
            siblings.push(level.hashes[index ^ 1]);
            index /= 2;
        }

        Ok(AuthPath {
            leaf_index,
            siblings,
        })
    }

    fn real_len(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, |l| {
            if l.padded {
                l.hashes.len() - 1
            } else {
                l.hashes.len()
            }
        })
    }
}

/// Build a tree over already-hashed leaves.
pub fn build_tree(leaves: &[Hash]) -> Result<MerkleTree, SpvError> {
    MerkleTree::from_hashes(leaves)
}

/// Build a tree over raw data, hashing each leaf with `sha256d`.
pub fn build_tree_from_data<T: AsRef<[u8]>>(leaves: &[T]) -> Result<MerkleTree, SpvError> {
    MerkleTree::from_data(leaves)
}

/// Compute the sibling hashes proving `leaves[leaf_index]`.
///
/// `leaf_count` must equal `leaves.len()`; it is checked explicitly so a
/// caller working from block metadata catches a stale transaction list.
pub fn compute_auth_path(
    leaf_index: usize,
    leaf_count: usize,
    leaves: &[Hash],
) -> Result<Vec<Hash>, SpvError> {
    if leaves.is_empty() {
        return Err(SpvError::EmptyInput);
    }
    if leaf_count != leaves.len() {
        return Err(SpvError::LeafCountMismatch {
            declared: leaf_count,
            actual: leaves.len(),
        });
    }
    if leaf_index >= leaf_count {
        return Err(SpvError::IndexOutOfRange {
            index: leaf_index,
            count: leaf_count,
        });
    }
    Ok(MerkleTree::from_hashes(leaves)?.auth_path(leaf_index)?.siblings)
}

/// Fold a leaf and its siblings up to a root.
///
/// An even index means the working hash is the left child.
pub fn calculate_root_from_path(leaf: &Hash, siblings: &[Hash], leaf_index: usize) -> Hash {
    let mut current = *leaf;
    let mut index = leaf_index;
    for sibling in siblings {
        current = if index % 2 == 0 {
            merkle_tree_parent(&current, sibling)
        } else {
            merkle_tree_parent(sibling, &current)
        };
        index /= 2;
    }
    current
}

/// Check a leaf + path against an expected root.
///
/// A mismatch is an ordinary `false`, never an error.
pub fn validate_path(
    leaf: &Hash,
    siblings: &[Hash],
    leaf_index: usize,
    expected_root: &Hash,
) -> bool {
    calculate_root_from_path(leaf, siblings, leaf_index) == *expected_root
}

/// Like [`validate_path`], with the calculated root and a reason on failure.
pub fn verify_path(
    leaf: &Hash,
    siblings: &[Hash],
    leaf_index: usize,
    expected_root: &Hash,
) -> PathValidation {
    let calculated_root = calculate_root_from_path(leaf, siblings, leaf_index);
    let valid = calculated_root == *expected_root;
    PathValidation {
        valid,
        calculated_root,
        expected_root: *expected_root,
        reason: (!valid).then(|| {
            format!(
                "calculated root {} does not match expected root {}",
                calculated_root, expected_root
            )
        }),
    }
}

/// Hex front end for [`compute_auth_path`]: display-order txids in,
/// display-order sibling hashes out.
pub fn compute_auth_path_hex<S: AsRef<str>>(
    leaf_index: usize,
    leaves: &[S],
) -> Result<Vec<String>, SpvError> {
    let tree = MerkleTree::from_hex_leaves(leaves)?;
    let path = tree.auth_path(leaf_index)?;
    Ok(path.siblings.iter().map(Hash::to_string).collect())
}

/// Hex front end for [`verify_path`]. Malformed hex is an error; a
/// well-formed path that does not reach the root is a failed validation.
pub fn verify_path_hex<S: AsRef<str>>(
    leaf: &str,
    siblings: &[S],
    leaf_index: usize,
    expected_root: &str,
) -> Result<PathValidation, SpvError> {
    let leaf = Hash::from_hex(leaf)?;
    let siblings = siblings
        .iter()
        .map(|s| Hash::from_hex(s.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let root = Hash::from_hex(expected_root)?;
    Ok(verify_path(&leaf, &siblings, leaf_index, &root))
}
