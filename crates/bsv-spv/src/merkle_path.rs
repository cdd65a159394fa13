//! Merkle path (BUMP, BRC-74) types, codec and verification.
//!
//! A BUMP is a sparse view of one block's Merkle tree: per level, only the
//! hashes needed to lift the flagged client transactions to the root.
//! Leaves are kept in the order they were decoded, so decoding and
//! re-encoding a BUMP reproduces its bytes exactly.

use std::collections::{HashMap, HashSet};

use bsv_primitives::chainhash::Hash;
use bsv_primitives::util::{BsvReader, BsvWriter, VarInt};
use serde::{Deserialize, Serialize};

use crate::error::SpvError;
use crate::merkle_tree::MerkleTree;
use crate::merkle_tree_parent::merkle_tree_parent;
use crate::provider::BlockInfo;

const FLAG_DUPLICATE: u8 = 0x01;
const FLAG_CLIENT_TXID: u8 = 0x02;

/// A single element in a Merkle path level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElement {
    /// Position offset within this tree level.
    pub offset: u64,
    /// Hash value at this position (absent iff `duplicate` is set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<Hash>,
    /// This leaf is one of the client's transactions.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub txid: bool,
    /// This position duplicates its pair partner (odd level).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

impl PathElement {
    pub fn with_hash(offset: u64, hash: Hash) -> Self {
        PathElement {
            offset,
            hash: Some(hash),
            txid: false,
            duplicate: false,
        }
    }

    /// A client-txid leaf.
    pub fn client_txid(offset: u64, hash: Hash) -> Self {
        PathElement {
            txid: true,
            ..Self::with_hash(offset, hash)
        }
    }

    pub fn duplicate(offset: u64) -> Self {
        PathElement {
            offset,
            hash: None,
            txid: false,
            duplicate: true,
        }
    }

    fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.duplicate {
            flags |= FLAG_DUPLICATE;
        }
        if self.txid {
            flags |= FLAG_CLIENT_TXID;
        }
        flags
    }
}

/// A Merkle path (BUMP) associating transactions with a block via a
/// sequence of hashes at each tree level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerklePath {
    /// Block height at which the transactions were mined.
    pub block_height: u64,
    /// Path levels from leaf (index 0) to root.
    pub path: Vec<Vec<PathElement>>,
}

/// Root computation outcome for one client txid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxidCheck {
    pub txid: Hash,
    /// `None` when the BUMP lacks the hashes to reach a root.
    pub calculated_root: Option<Hash>,
    pub matches: bool,
}

/// Result of cross-checking a BUMP against a block fetched from a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BumpValidation {
    pub valid: bool,
    pub block_root: Hash,
    pub checks: Vec<TxidCheck>,
    /// Client txids that do not appear in the block's transaction list.
    pub missing_from_block: Vec<Hash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Indexed path for offset lookups with recursive computation.
struct IndexedPath(Vec<HashMap<u64, PathElement>>);

impl IndexedPath {
    fn from_merkle_path(mp: &MerklePath) -> Self {
        IndexedPath(
            mp.path
                .iter()
                .map(|level| level.iter().map(|e| (e.offset, e.clone())).collect())
                .collect(),
        )
    }

    /// Find the element at `(layer, offset)`, deriving it from the level
    /// below when it is not stored.
    fn get_offset_leaf(&self, layer: usize, offset: u64) -> Option<PathElement> {
        if let Some(leaf) = self.0.get(layer)?.get(&offset) {
            return Some(leaf.clone());
        }
        if layer == 0 {
            return None;
        }
        let prev_offset = offset * 2;
        let left = self.get_offset_leaf(layer - 1, prev_offset)?;
        let right = self.get_offset_leaf(layer - 1, prev_offset + 1)?;
        let left_hash = left.hash.as_ref()?;
        let parent_hash = if right.duplicate {
            merkle_tree_parent(left_hash, left_hash)
        } else {
            merkle_tree_parent(left_hash, right.hash.as_ref()?)
        };
        Some(PathElement::with_hash(offset, parent_hash))
    }
}

impl MerklePath {
    pub fn new(block_height: u64, path: Vec<Vec<PathElement>>) -> Self {
        MerklePath { block_height, path }
    }

    /// Build a single-transaction BUMP from a full tree.
    ///
    /// Level 0 carries the flagged leaf and its sibling; every level above
    /// carries just the sibling needed to climb.
    pub fn from_auth_path(
        tree: &MerkleTree,
        leaf_index: usize,
        block_height: u64,
    ) -> Result<Self, SpvError> {
        let auth = tree.auth_path(leaf_index)?;
        let leaf = tree
            .node(0, leaf_index)
            .ok_or(SpvError::IndexOutOfRange {
                index: leaf_index,
                count: tree.leaf_count(),
            })?;

        if auth.siblings.is_empty() {
            return Ok(MerklePath::new(
                block_height,
                vec![vec![PathElement::client_txid(0, leaf.hash)]],
            ));
        }

        let mut path = Vec::with_capacity(auth.siblings.len());
        let mut position = leaf_index;
        for (level, sibling) in auth.siblings.iter().enumerate() {
            let sibling_offset = (position ^ 1) as u64;
            let sibling_elem = if tree.sibling_is_duplicate(level, position) {
                PathElement::duplicate(sibling_offset)
            } else {
                PathElement::with_hash(sibling_offset, *sibling)
            };

            let mut elems = Vec::with_capacity(2);
            if level == 0 {
                elems.push(PathElement::client_txid(position as u64, leaf.hash));
            }
            elems.push(sibling_elem);
            elems.sort_by_key(|e| e.offset);
            path.push(elems);
            position /= 2;
        }

        Ok(MerklePath::new(block_height, path))
    }

    /// Parse a MerklePath from a hex string (BRC-74 binary format).
    pub fn from_hex(hex_data: &str) -> Result<Self, SpvError> {
        let bin = hex::decode(hex_data)?;
        Self::from_bytes(&bin)
    }

    /// Parse a MerklePath from binary data. The data must hold exactly one BUMP.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SpvError> {
        let mut reader = BsvReader::new(data);
        let mp = Self::from_reader(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(SpvError::InvalidMerklePath(format!(
                "{} trailing bytes after BUMP",
                reader.remaining()
            )));
        }
        Ok(mp)
    }

    /// Parse a MerklePath from a BsvReader.
    ///
    /// On failure the reader is left at the offset of the field that could
    /// not be read.
    pub fn from_reader(reader: &mut BsvReader) -> Result<Self, SpvError> {
        let block_height = reader
            .read_varint()
            .map_err(|e| SpvError::InvalidMerklePath(format!("reading block height: {}", e)))?
            .value();

        let tree_height = reader
            .read_u8()
            .map_err(|e| SpvError::InvalidMerklePath(format!("reading tree height: {}", e)))?;

        let mut path = Vec::with_capacity(tree_height as usize);
        for level_no in 0..tree_height {
            let n_leaves = reader.read_varint().map_err(|e| {
                SpvError::InvalidMerklePath(format!(
                    "reading leaf count of level {}: {}",
                    level_no, e
                ))
            })?;

            // Each leaf is at least two bytes.
            let cap = usize::try_from(n_leaves.value())
                .unwrap_or(usize::MAX)
                .min(reader.remaining() / 2);
            let mut level = Vec::with_capacity(cap);
            let mut seen = HashSet::with_capacity(cap);
            for _ in 0..n_leaves.value() {
                let offset = reader
                    .read_varint()
                    .map_err(|e| SpvError::InvalidMerklePath(format!("reading offset: {}", e)))?
                    .value();

                let flags = reader
                    .read_u8()
                    .map_err(|e| SpvError::InvalidMerklePath(format!("reading flags: {}", e)))?;

                let duplicate = flags & FLAG_DUPLICATE != 0;
                let hash = if duplicate {
                    None
                } else {
                    let bytes = reader.read_array::<32>().map_err(|e| {
                        SpvError::InvalidMerklePath(format!("reading hash: {}", e))
                    })?;
                    Some(Hash::new(bytes))
                };

                if !seen.insert(offset) {
                    return Err(SpvError::InvalidMerklePath(format!(
                        "duplicate offset {} in level {}",
                        offset, level_no
                    )));
                }

                level.push(PathElement {
                    offset,
                    hash,
                    txid: flags & FLAG_CLIENT_TXID != 0,
                    duplicate,
                });
            }
            path.push(level);
        }

        Ok(MerklePath {
            block_height,
            path,
        })
    }

    /// Serialize to BRC-74 binary format, leaves in stored order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    pub(crate) fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_varint(VarInt(self.block_height));
        debug_assert!(self.path.len() <= u8::MAX as usize);
        writer.write_u8(self.path.len() as u8);

        for level in &self.path {
            writer.write_varint(VarInt::from(level.len()));
            for leaf in level {
                writer.write_varint(VarInt(leaf.offset));
                let flags = leaf.flags();
                writer.write_u8(flags);
                if flags & FLAG_DUPLICATE == 0 {
                    let hash = leaf.hash.unwrap_or_default();
                    writer.write_bytes(hash.as_bytes());
                }
            }
        }
    }

    /// Serialize to hex string (BRC-74).
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Number of levels.
    pub fn tree_height(&self) -> usize {
        self.path.len()
    }

    /// Level-0 leaves flagged as client transactions.
    pub fn client_txids(&self) -> Vec<Hash> {
        self.path
            .first()
            .map(|level| {
                level
                    .iter()
                    .filter(|e| e.txid)
                    .filter_map(|e| e.hash)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `txid` appears as a level-0 hash.
    pub fn contains(&self, txid: &Hash) -> bool {
        self.path
            .first()
            .is_some_and(|level| level.iter().any(|e| e.hash.as_ref() == Some(txid)))
    }

    /// Compute the Merkle root given a transaction ID.
    /// If `txid` is None, uses the first available hash from level 0.
    pub fn compute_root(&self, txid: Option<&Hash>) -> Result<Hash, SpvError> {
        let level0 = self
            .path
            .first()
            .ok_or_else(|| SpvError::InvalidMerklePath("path has no levels".to_string()))?;

        let txid = match txid {
            Some(t) => *t,
            None => level0.iter().find_map(|l| l.hash).ok_or_else(|| {
                SpvError::InvalidMerklePath("no hash found at level 0".to_string())
            })?,
        };

        // Single transaction in the block.
        if self.path.len() == 1 && level0.len() == 1 {
            return Ok(txid);
        }

        let tx_leaf = level0
            .iter()
            .find(|l| l.hash == Some(txid))
            .ok_or_else(|| {
                SpvError::InvalidMerklePath(format!("the BUMP does not contain the txid: {}", txid))
            })?;

        let indexed_path = IndexedPath::from_merkle_path(self);
        let mut working_hash = txid;
        let index = tx_leaf.offset;

        for height in 0..self.path.len() {
            let offset = (index >> height) ^ 1;
            let leaf = indexed_path.get_offset_leaf(height, offset).ok_or_else(|| {
                SpvError::InvalidMerklePath(format!(
                    "we do not have a hash for this index at height: {}",
                    height
                ))
            })?;

            if leaf.duplicate {
                working_hash = merkle_tree_parent(&working_hash, &working_hash);
            } else {
                let leaf_hash = leaf.hash.ok_or_else(|| {
                    SpvError::InvalidMerklePath(format!(
                        "missing hash at height {} offset {}",
                        height, offset
                    ))
                })?;
                working_hash = if offset % 2 != 0 {
                    merkle_tree_parent(&working_hash, &leaf_hash)
                } else {
                    merkle_tree_parent(&leaf_hash, &working_hash)
                };
            }
        }

        Ok(working_hash)
    }

    /// Compute root from a display-order hex txid.
    pub fn compute_root_hex(&self, txid_str: Option<&str>) -> Result<String, SpvError> {
        let txid = txid_str.map(Hash::from_hex).transpose()?;
        Ok(self.compute_root(txid.as_ref())?.to_string())
    }

    /// Cross-check this BUMP against block data.
    ///
    /// Every client txid (or every level-0 hash when none is flagged) must
    /// lift to the block's Merkle root and appear in its transaction list.
    /// A failed check is reported in the result, not as an error.
    pub fn validate_against_block(&self, block: &BlockInfo) -> BumpValidation {
        let mut candidates = self.client_txids();
        if candidates.is_empty() {
            candidates = self
                .path
                .first()
                .map(|l| l.iter().filter_map(|e| e.hash).collect())
                .unwrap_or_default();
        }

        let checks: Vec<TxidCheck> = candidates
            .iter()
            .map(|txid| {
                let calculated_root = self.compute_root(Some(txid)).ok();
                TxidCheck {
                    txid: *txid,
                    calculated_root,
                    matches: calculated_root == Some(block.merkle_root),
                }
            })
            .collect();

        let missing_from_block = if block.tx_ids.is_empty() {
            Vec::new()
        } else {
            let in_block: HashSet<&Hash> = block.tx_ids.iter().collect();
            self.client_txids()
                .into_iter()
                .filter(|t| !in_block.contains(t))
                .collect()
        };

        let reason = if block.height != self.block_height {
            Some(format!(
                "BUMP is for height {} but block is at height {}",
                self.block_height, block.height
            ))
        } else if checks.is_empty() {
            Some("BUMP has no level-0 hashes".to_string())
        } else if let Some(bad) = checks.iter().find(|c| !c.matches) {
            Some(match bad.calculated_root {
                Some(root) => format!(
                    "calculated root {} does not match expected root {}",
                    root, block.merkle_root
                ),
                None => format!("cannot compute a root for {}", bad.txid),
            })
        } else if !missing_from_block.is_empty() {
            Some(format!(
                "{} client transactions not found in block {}",
                missing_from_block.len(),
                block.hash
            ))
        } else {
            None
        };

        BumpValidation {
            valid: reason.is_none(),
            block_root: block.merkle_root,
            checks,
            missing_from_block,
            reason,
        }
    }

    /// Combine another MerklePath into this one.
    /// Both must have the same block height and same root.
    pub fn combine(&mut self, other: &MerklePath) -> Result<(), SpvError> {
        if self.block_height != other.block_height {
            return Err(SpvError::InvalidMerklePath(
                "cannot combine MerklePaths with different block heights".to_string(),
            ));
        }

        let root1 = self.compute_root(None)?;
        let root2 = other.compute_root(None)?;
        if root1 != root2 {
            return Err(SpvError::InvalidMerklePath(
                "cannot combine MerklePaths with different roots".to_string(),
            ));
        }

        let max_len = self.path.len().max(other.path.len());
        let mut combined: Vec<HashMap<u64, PathElement>> = Vec::with_capacity(max_len);
        for h in 0..max_len {
            let mut map = HashMap::new();
            for source in [&self.path, &other.path] {
                if let Some(level) = source.get(h) {
                    for elem in level {
                        map.entry(elem.offset)
                            .and_modify(|e: &mut PathElement| e.txid |= elem.txid)
                            .or_insert_with(|| elem.clone());
                    }
                }
            }
            combined.push(map);
        }

        // Drop interior nodes whose children are both present.
        let mut path = Vec::with_capacity(combined.len());
        for h in 0..combined.len() {
            let mut level: Vec<PathElement> = combined[h]
                .values()
                .filter(|elem| {
                    if h == 0 {
                        return true;
                    }
                    let child = elem.offset * 2;
                    !(combined[h - 1].contains_key(&child)
                        && combined[h - 1].contains_key(&(child + 1)))
                })
                .cloned()
                .collect();
            level.sort_by_key(|e| e.offset);
            path.push(level);
        }
        self.path = path;

        Ok(())
    }

    /// Find a PathElement at the given offset in the specified level.
    pub fn find_leaf_by_offset(&self, level: usize, offset: u64) -> Option<&PathElement> {
        self.path.get(level)?.iter().find(|l| l.offset == offset)
    }

    /// Add a PathElement to the specified level, growing the path if needed.
    pub fn add_leaf(&mut self, level: usize, element: PathElement) {
        while self.path.len() <= level {
            self.path.push(Vec::new());
        }
        self.path[level].push(element);
    }

    /// Compute missing intermediate hashes from level 0 upward.
    pub fn compute_missing_hashes(&mut self) {
        for level in 1..self.path.len() {
            let mut new_elements = Vec::new();
            let prev_level = &self.path[level - 1];

            for left_leaf in prev_level {
                let left_hash = match left_leaf.hash {
                    Some(h) if left_leaf.offset & 1 == 0 => h,
                    _ => continue,
                };
                let parent_offset = left_leaf.offset >> 1;
                if self.path[level].iter().any(|e| e.offset == parent_offset) {
                    continue;
                }

                let right = match prev_level.iter().find(|e| e.offset == left_leaf.offset + 1) {
                    Some(r) => r,
                    None => continue,
                };
                let parent_hash = if right.duplicate {
                    merkle_tree_parent(&left_hash, &left_hash)
                } else if let Some(ref right_hash) = right.hash {
                    merkle_tree_parent(&left_hash, right_hash)
                } else {
                    continue;
                };
                new_elements.push(PathElement::with_hash(parent_offset, parent_hash));
            }

            self.path[level].extend(new_elements);
        }

        for level in &mut self.path {
            level.sort_by_key(|e| e.offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRC74_HEX: &str = "fe8a6a0c000c04fde80b0011774f01d26412f0d16ea3f0447be0b5ebec67b0782e321a7a01cbdf7f734e30fde90b02004e53753e3fe4667073063a17987292cfdea278824e9888e52180581d7188d8fdea0b025e441996fc53f0191d649e68a200e752fb5f39e0d5617083408fa179ddc5c998fdeb0b0102fdf405000671394f72237d08a4277f4435e5b6edf7adc272f25effef27cdfe805ce71a81fdf50500262bccabec6c4af3ed00cc7a7414edea9c5efa92fb8623dd6160a001450a528201fdfb020101fd7c010093b3efca9b77ddec914f8effac691ecb54e2c81d0ab81cbc4c4b93befe418e8501bf01015e005881826eb6973c54003a02118fe270f03d46d02681c8bc71cd44c613e86302f8012e00e07a2bb8bb75e5accff266022e1e5e6e7b4d6d943a04faadcf2ab4a22f796ff30116008120cafa17309c0bb0e0ffce835286b3a2dcae48e4497ae2d2b7ced4f051507d010a00502e59ac92f46543c23006bff855d96f5e648043f0fb87a7a5949e6a9bebae430104001ccd9f8f64f4d0489b30cc815351cf425e0e78ad79a589350e4341ac165dbe45010301010000af8764ce7e1cc132ab5ed2229a005c87201c9a5ee15c0f91dd53eff31ab30cd4";
    const BRC74_ROOT: &str = "57aab6e6fb1b697174ffb64e062c4728f2ffd33ddcfa02a43b64d8cd29b483b4";
    const BRC74_TXID1: &str = "304e737fdfcb017a1a322e78b067ecebb5e07b44f0a36ed1f01264d2014f7711";
    const BRC74_TXID2: &str = "d888711d588021e588984e8278a2decf927298173a06737066e43f3e75534e00";
    const BRC74_TXID3: &str = "98c9c5dd79a18f40837061d5e0395ffb52e700a2689e641d19f053fc9619445e";

    fn h(n: u8) -> Hash {
        let mut b = [0u8; 32];
        b[0] = n;
        Hash::new(b)
    }

    #[test]
    fn test_parse_from_hex_roundtrip() {
        let mp = MerklePath::from_hex(BRC74_HEX).unwrap();
        assert_eq!(mp.block_height, 813706);
        assert_eq!(mp.tree_height(), 12);
        assert_eq!(BRC74_HEX, mp.to_hex());
    }

    #[test]
    fn test_compute_root_for_each_txid() {
        let mp = MerklePath::from_hex(BRC74_HEX).unwrap();
        for txid in [BRC74_TXID1, BRC74_TXID2, BRC74_TXID3] {
            assert_eq!(mp.compute_root_hex(Some(txid)).unwrap(), BRC74_ROOT);
        }
    }

    #[test]
    fn test_client_txids() {
        let mp = MerklePath::from_hex(BRC74_HEX).unwrap();
        let mut ids: Vec<String> = mp.client_txids().iter().map(Hash::to_string).collect();
        ids.sort();
        let mut expected = vec![BRC74_TXID2.to_string(), BRC74_TXID3.to_string()];
        expected.sort();
        assert_eq!(ids, expected);
        assert!(mp.contains(&Hash::from_hex(BRC74_TXID1).unwrap()));
    }

    #[test]
    fn test_unknown_txid() {
        let mp = MerklePath::from_hex(BRC74_HEX).unwrap();
        let err = mp.compute_root(Some(&h(9))).unwrap_err();
        assert!(err.to_string().contains("does not contain"));
    }

    #[test]
    fn test_leaf_order_preserved() {
        // Level with offsets written 3 then 2.
        let mp = MerklePath::new(
            5,
            vec![vec![PathElement::with_hash(3, h(1)), PathElement::client_txid(2, h(2))]],
        );
        let back = MerklePath::from_bytes(&mp.to_bytes()).unwrap();
        assert_eq!(back, mp);
        assert_eq!(back.path[0][0].offset, 3);
    }

    #[test]
    fn test_duplicate_offset_rejected() {
        let mp = MerklePath::new(
            5,
            vec![vec![PathElement::with_hash(2, h(1)), PathElement::with_hash(2, h(2))]],
        );
        assert!(MerklePath::from_bytes(&mp.to_bytes()).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = MerklePath::from_hex(BRC74_HEX).unwrap().to_bytes();
        bytes.push(0);
        assert!(MerklePath::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_duplicate_leaf_has_no_hash_on_wire() {
        let mp = MerklePath::new(
            1,
            vec![vec![PathElement::client_txid(2, h(1)), PathElement::duplicate(3)]],
        );
        // height(1) + tree height(1) + count(1) + [offset, flags, hash](34) + [offset, flags](2)
        assert_eq!(mp.to_bytes().len(), 39);
        let back = MerklePath::from_bytes(&mp.to_bytes()).unwrap();
        assert!(back.path[0][1].duplicate);
        assert!(back.path[0][1].hash.is_none());
    }

    #[test]
    fn test_combine() {
        let mp = MerklePath::from_hex(BRC74_HEX).unwrap();

        // Split into path A and B
        let mut path0a = mp.path[0][..2].to_vec();
        path0a.extend_from_slice(&mp.path[0][4..]);
        let path0b = mp.path[0][2..].to_vec();
        let path1a = mp.path[1][1..].to_vec();
        let path1b = mp.path[1][..mp.path[1].len() - 1].to_vec();

        let mut path_a_levels = vec![path0a, path1a];
        path_a_levels.extend_from_slice(&mp.path[2..]);
        let mut path_a = MerklePath::new(mp.block_height, path_a_levels);

        let mut path_b_levels = vec![path0b, path1b];
        path_b_levels.extend_from_slice(&mp.path[2..]);
        let path_b = MerklePath::new(mp.block_height, path_b_levels);

        // Path A can compute root for TXID2 but not TXID3
        assert_eq!(path_a.compute_root_hex(Some(BRC74_TXID2)).unwrap(), BRC74_ROOT);
        assert!(path_a.compute_root_hex(Some(BRC74_TXID3)).is_err());

        // Path B can compute root for TXID3 but not TXID2
        assert_eq!(path_b.compute_root_hex(Some(BRC74_TXID3)).unwrap(), BRC74_ROOT);
        assert!(path_b.compute_root_hex(Some(BRC74_TXID2)).is_err());

        // After combining, both work
        path_a.combine(&path_b).unwrap();
        assert_eq!(path_a.compute_root_hex(Some(BRC74_TXID2)).unwrap(), BRC74_ROOT);
        assert_eq!(path_a.compute_root_hex(Some(BRC74_TXID3)).unwrap(), BRC74_ROOT);
    }

    #[test]
    fn test_combine_rejects_other_height() {
        let mut a = MerklePath::from_hex(BRC74_HEX).unwrap();
        let mut b = a.clone();
        b.block_height += 1;
        assert!(a.combine(&b).is_err());
    }

    #[test]
    fn test_add_leaf_and_compute_missing_hashes() {
        let (leaf0, leaf1, leaf2, leaf3) = (h(1), h(2), h(3), h(4));

        let h01 = merkle_tree_parent(&leaf0, &leaf1);
        let h23 = merkle_tree_parent(&leaf2, &leaf3);
        let root = merkle_tree_parent(&h01, &h23);

        let mut mp = MerklePath::new(1000, vec![Vec::new(), Vec::new(), Vec::new()]);
        mp.add_leaf(0, PathElement::with_hash(0, leaf0));
        mp.add_leaf(0, PathElement::with_hash(1, leaf1));
        mp.add_leaf(0, PathElement::client_txid(2, leaf2));
        mp.add_leaf(0, PathElement::with_hash(3, leaf3));

        mp.compute_missing_hashes();

        assert_eq!(mp.path[1].len(), 2);
        assert_eq!(mp.find_leaf_by_offset(1, 0).unwrap().hash, Some(h01));
        assert_eq!(mp.find_leaf_by_offset(1, 1).unwrap().hash, Some(h23));
        assert_eq!(mp.path[2].len(), 1);
        assert_eq!(mp.find_leaf_by_offset(2, 0).unwrap().hash, Some(root));
    }

    #[test]
    fn test_duplicate_handling() {
        let (leaf0, leaf1, leaf2) = (h(1), h(2), h(3));

        let mut mp = MerklePath::new(1000, vec![Vec::new(), Vec::new(), Vec::new()]);
        mp.add_leaf(0, PathElement::with_hash(0, leaf0));
        mp.add_leaf(0, PathElement::with_hash(1, leaf1));
        mp.add_leaf(0, PathElement::with_hash(2, leaf2));
        mp.add_leaf(0, PathElement::duplicate(3));

        mp.compute_missing_hashes();

        assert_eq!(
            mp.find_leaf_by_offset(1, 0).unwrap().hash,
            Some(merkle_tree_parent(&leaf0, &leaf1))
        );
        assert_eq!(
            mp.find_leaf_by_offset(1, 1).unwrap().hash,
            Some(merkle_tree_parent(&leaf2, &leaf2))
        );
    }

    #[test]
    fn test_grow_path() {
        let mut mp = MerklePath::new(1000, vec![]);
        mp.add_leaf(5, PathElement::with_hash(0, h(1)));
        assert_eq!(mp.path.len(), 6);
        assert_eq!(mp.path[5].len(), 1);
    }

    #[test]
    fn test_from_auth_path_matches_tree_root() {
        let leaves: Vec<Hash> = (1..=7).map(h).collect();
        let tree = MerkleTree::from_hashes(&leaves).unwrap();
        for i in 0..leaves.len() {
            let bump = MerklePath::from_auth_path(&tree, i, 42).unwrap();
            assert_eq!(bump.client_txids(), vec![leaves[i]]);
            assert_eq!(bump.compute_root(Some(&leaves[i])).unwrap(), tree.root());
            let back = MerklePath::from_bytes(&bump.to_bytes()).unwrap();
            assert_eq!(back, bump);
        }
        // The last of 7 leaves pairs with its padding copy.
        let last = MerklePath::from_auth_path(&tree, 6, 42).unwrap();
        assert!(last.path[0].iter().any(|e| e.duplicate));
    }

    #[test]
    fn test_from_auth_path_single_leaf() {
        let tree = MerkleTree::from_hashes(&[h(1)]).unwrap();
        let bump = MerklePath::from_auth_path(&tree, 0, 7).unwrap();
        assert_eq!(bump.compute_root(None).unwrap(), h(1));
    }

    fn block_for(tree: &MerkleTree, leaves: &[Hash], height: u64) -> BlockInfo {
        BlockInfo {
            hash: h(0xbb),
            height,
            merkle_root: tree.root(),
            tx_ids: leaves.to_vec(),
            time: None,
        }
    }

    #[test]
    fn test_validate_against_block() {
        let leaves: Vec<Hash> = (1..=5).map(h).collect();
        let tree = MerkleTree::from_hashes(&leaves).unwrap();
        let bump = MerklePath::from_auth_path(&tree, 3, 100).unwrap();

        let ok = bump.validate_against_block(&block_for(&tree, &leaves, 100));
        assert!(ok.valid, "{:?}", ok.reason);
        assert_eq!(ok.checks.len(), 1);
        assert!(ok.checks[0].matches);

        let wrong_height = bump.validate_against_block(&block_for(&tree, &leaves, 101));
        assert!(!wrong_height.valid);

        let mut other = block_for(&tree, &leaves, 100);
        other.merkle_root = h(0xee);
        let bad_root = bump.validate_against_block(&other);
        assert!(!bad_root.valid);
        assert!(bad_root.reason.unwrap().contains("does not match"));

        let mut missing = block_for(&tree, &leaves, 100);
        missing.tx_ids.retain(|t| *t != leaves[3]);
        let not_listed = bump.validate_against_block(&missing);
        assert!(!not_listed.valid);
        assert_eq!(not_listed.missing_from_block, vec![leaves[3]]);
    }

    #[test]
    fn test_serde_skips_false_flags() {
        let elem = PathElement::with_hash(4, h(1));
        let json = serde_json::to_value(&elem).unwrap();
        assert!(json.get("txid").is_none());
        assert!(json.get("duplicate").is_none());
        let back: PathElement = serde_json::from_value(json).unwrap();
        assert_eq!(back, elem);
    }

    #[test]
    fn test_valid_bumps() {
        let valid = [
            "fed79f0c000c02fd3803029b490d9c8358ff11afaf45628417c9eb52c1a1fd404078a101b4f71dbba06aa9fd390300fe82f2768edc3d0cfe4d06b7f390dcb0b7e61cca7f70117d83be0f023204d8ef01fd9d010060893ac65c8a8e6b9ef7ed5e05dc3bd25aa904812c09853c5dbf423b58a75d0e01cf0012c3c76d9c332e4701b27bfe7013e7963b92d1851d59c56955b35aecabbc8bae0166000894384f86a5c4d0d294f9b9441c3ee3d13afa094cca4515d32813b3fa4fdf3601320002aac507f74c9ff2676705eee1e70897a8baeecaf30c5f49bb22a0c5ce5fda9a01180021f7e27a08d61245be893a238853d72340881cbd47e0a390895231fa1cc44db9010d004d7a12738a1654777867182ee6f6efc4d692209badfa5ba9bb126d08da18ed880107004f8e96b4ee6154bd44b7709f3fb4041bf4426d5f5a594408345605e254af7cdd010200ec7d8b185bc7c096b9b88de6f63ab22baf738d5fc4cbc328f2e00644749acf520100007fd48b1d2b678907ba045b07132003db8116468cd6a3d4764e0df4a644ea0a220101009bb8ffc1a6ed2ba80ea1b09ff797387115a7129d19e93c003a74e3a20ed6ce590101001106e6ece3f70a16de42d0f87b459c71a2440201728bd8541334933726807921",
            "feb39d0c000c02fd340700ed4cb1fdd81916dabb69b63bcd378559cf40916205cd004e7f5381cc2b1ea6acfd350702957998e38434782b1c40c63a4aca0ffaf4d5d9bc3385f0e9e396f4dd3238f0df01fd9b030012f77e65627c341a3aaea3a0ed645c0082ef53995f446ab9901a27e4622fd1cc01fdcc010074026299a4ba40fbcf33cc0c64b384f0bb2fb17c61125609a666b546539c221c01e700730f99f8cf10fccd30730474449172c5f97cde6a6cf65163359e778463e9f2b9017200a202c78dee487cf96e1a6a04d51faec4debfad09eea28cc624483f2d6fa53d54013800b51ecabaa590b6bd1805baf4f19fc0eae0dedb533302603579d124059b374b1e011d00a0f36640f32a43d790bb4c3e7877011aa8ae25e433b2b83c952a16f8452b6b79010f005d68efab62c6c457ce0bb526194cc16b27f93f8a4899f6d59ffffdddc06e345c01060099f66a0ef693d151bbe9aeb10392ac5a7712243406f9e821219fd13d1865f569010200201fa17c98478675a96703ded42629a3c7bf32b45d0bff25f8be6849d02889ae010000367765c2d68e0c926d81ecdf9e3c86991ccf5a52e97c49ad5cf584c8ab030427010100237b58d3217709b6ebc3bdc093413ba788739f052a0b5b3a413e65444b146bc1",
        ];
        for hex_str in valid {
            let mp = MerklePath::from_hex(hex_str)
                .unwrap_or_else(|e| panic!("should parse valid bump {}: {}", &hex_str[..20], e));
            assert_eq!(mp.to_hex(), hex_str);
        }
    }

    #[test]
    fn test_invalid_bumps() {
        let invalid = [
            "feb39d0c000c01fd9b030012f77e65627c341a3aaea3a0ed645c0082ef53995f446ab9901a27e4622fd1cc01fdcc010074026299a4ba40fbcf33cc0c64b384f0bb2fb17c61125609a666b546539c221c01e700730f99f8cf10fccd30730474449172c5f97cde6a6cf65163359e778463e9f2b9017200a202c78dee487cf96e1a6a04d51faec4debfad09eea28cc624483f2d6fa53d54013800b51ecabaa590b6bd1805baf4f19fc0eae0dedb533302603579d124059b374b1e011d00a0f36640f32a43d790bb4c3e7877011aa8ae25e433b2b83c952a16f8452b6b79010f005d68efab62c6c457ce0bb526194cc16b27f93f8a4899f6d59ffffdddc06e345c01060099f66a0ef693d151bbe9aeb10392ac5a7712243406f9e821219fd13d1865f569010200201fa17c98478675a96703ded42629a3c7bf32b45d0bff25f8be6849d02889ae010000367765c2d68e0c926d81ecdf9e3c86991ccf5a52e97c49ad5cf584c8ab030427010100237b58d3217709b6ebc3bdc093413ba788739f052a0b5b3a413e65444b146bc1",
        ];
        for hex_str in invalid {
            assert!(MerklePath::from_hex(hex_str).is_err(), "should reject invalid bump");
        }
    }
}
