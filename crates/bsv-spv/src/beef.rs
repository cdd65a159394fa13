//! BEEF (Background Evaluation Extended Format) transaction bundles.
//!
//! Supports BRC-62 (V1), BRC-96 (V2) and the BRC-95 Atomic BEEF prefix.
//! Decoding is a single forward pass over a cursor; every failure reports
//! the byte offset of the field that could not be read.
//!
//! Each transaction keeps the exact bytes it was decoded from. Its txid is
//! hashed from those bytes and encoding writes them back unchanged, so a
//! bundle survives decode/encode bit for bit even when its transactions
//! use non-minimal varints.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use bsv_primitives::chainhash::Hash;
use bsv_primitives::hash::sha256d;
use bsv_primitives::util::{BsvReader, BsvWriter, VarInt};
use bsv_transaction::Transaction;

use crate::chain_tracker::ChainTracker;
use crate::error::SpvError;
use crate::merkle_path::MerklePath;

/// BEEF V1 version (BRC-62), `0100BEEF` on the wire.
pub const BEEF_V1: u32 = 4022206465;
/// BEEF V2 version (BRC-96), `0200BEEF` on the wire.
pub const BEEF_V2: u32 = 4022206466;
/// Atomic BEEF prefix (BRC-95).
pub const ATOMIC_BEEF: u32 = 0x01010101;

/// Data format for a transaction within a V2 BEEF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataFormat {
    RawTx = 0,
    RawTxAndBumpIndex = 1,
    TxIDOnly = 2,
}

impl TryFrom<u8> for DataFormat {
    type Error = u8;
    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(DataFormat::RawTx),
            1 => Ok(DataFormat::RawTxAndBumpIndex),
            2 => Ok(DataFormat::TxIDOnly),
            other => Err(other),
        }
    }
}

/// A transaction within a BEEF, with optional BUMP reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeefTx {
    pub data_format: DataFormat,
    /// Display form is the usual reversed hex.
    pub txid: Hash,
    /// Bytes as they appeared in the bundle; empty for txid-only entries.
    pub raw: Vec<u8>,
    pub transaction: Option<Transaction>,
    /// Index into [`Beef::bumps`], kept as decoded even if out of range.
    pub bump_index: Option<u64>,
}

impl BeefTx {
    /// Wrap a transaction, serializing it canonically.
    pub fn from_transaction(tx: Transaction, bump_index: Option<u64>) -> Self {
        let raw = tx.to_bytes();
        BeefTx {
            data_format: if bump_index.is_some() {
                DataFormat::RawTxAndBumpIndex
            } else {
                DataFormat::RawTx
            },
            txid: Hash::new(sha256d(&raw)),
            raw,
            transaction: Some(tx),
            bump_index,
        }
    }

    /// An entry known only by txid (V2).
    pub fn txid_only(txid: Hash) -> Self {
        BeefTx {
            data_format: DataFormat::TxIDOnly,
            txid,
            raw: Vec::new(),
            transaction: None,
            bump_index: None,
        }
    }

    pub fn is_txid_only(&self) -> bool {
        self.data_format == DataFormat::TxIDOnly
    }

    /// Txids this transaction spends from.
    pub fn input_txids(&self) -> impl Iterator<Item = Hash> + '_ {
        self.transaction
            .iter()
            .flat_map(|tx| tx.inputs.iter().map(|i| i.source_txid))
    }
}

/// A decoded BEEF bundle: BUMPs plus transactions in bundle order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beef {
    pub version: u32,
    /// False when `version` is neither V1 nor V2. Such bundles are still
    /// decoded with the V1 layout.
    pub is_valid_version: bool,
    /// Subject txid when the bundle carried an Atomic BEEF prefix.
    pub atomic_txid: Option<Hash>,
    pub bumps: Vec<MerklePath>,
    pub transactions: Vec<BeefTx>,
}

impl Beef {
    /// Create a new empty BEEF V2.
    pub fn new() -> Self {
        Self::new_with_version(BEEF_V2)
    }

    /// Create a new empty BEEF V1.
    pub fn new_v1() -> Self {
        Self::new_with_version(BEEF_V1)
    }

    /// Create a new empty BEEF V2.
    pub fn new_v2() -> Self {
        Self::new_with_version(BEEF_V2)
    }

    fn new_with_version(version: u32) -> Self {
        Beef {
            version,
            is_valid_version: is_known_version(version),
            atomic_txid: None,
            bumps: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub fn is_v2(&self) -> bool {
        self.version == BEEF_V2
    }

    /// Parse a BEEF from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, SpvError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a BEEF from bytes. The buffer must hold exactly one bundle.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SpvError> {
        let mut reader = BsvReader::new(data);

        let first = reader
            .read_u32_le()
            .map_err(|e| malformed(&reader, "reading version", e))?;
        let (version, atomic_txid) = if first == ATOMIC_BEEF {
            let subject = reader
                .read_array::<32>()
                .map_err(|e| malformed(&reader, "reading atomic subject txid", e))?;
            let version = reader
                .read_u32_le()
                .map_err(|e| malformed(&reader, "reading version", e))?;
            (version, Some(Hash::new(subject)))
        } else {
            (first, None)
        };

        let bump_count = reader
            .read_varint()
            .map_err(|e| malformed(&reader, "reading bump count", e))?;
        let mut bumps = Vec::with_capacity(capacity_hint(bump_count, &reader));
        for i in 0..bump_count.value() {
            let bump = MerklePath::from_reader(&mut reader)
                .map_err(|e| malformed(&reader, &format!("bump {}", i), e))?;
            bumps.push(bump);
        }

        let tx_count = reader
            .read_varint()
            .map_err(|e| malformed(&reader, "reading transaction count", e))?;
        let mut transactions = Vec::with_capacity(capacity_hint(tx_count, &reader));
        for i in 0..tx_count.value() {
            let entry = if version == BEEF_V2 {
                read_v2_tx(&mut reader, i)?
            } else {
                read_v1_tx(&mut reader, i)?
            };
            transactions.push(entry);
        }

        if reader.remaining() != 0 {
            return Err(SpvError::MalformedBeef {
                offset: reader.position(),
                reason: format!("{} trailing bytes after last transaction", reader.remaining()),
            });
        }

        Ok(Beef {
            version,
            is_valid_version: is_known_version(version),
            atomic_txid,
            bumps,
            transactions,
        })
    }

    /// Serialize this BEEF, using the V2 layout when `version` is V2 and
    /// the V1 layout otherwise.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SpvError> {
        let mut writer = BsvWriter::new();

        if let Some(subject) = &self.atomic_txid {
            writer.write_u32_le(ATOMIC_BEEF);
            writer.write_bytes(subject.as_bytes());
        }
        writer.write_u32_le(self.version);

        writer.write_varint(VarInt::from(self.bumps.len()));
        for bump in &self.bumps {
            bump.write_to(&mut writer);
        }

        writer.write_varint(VarInt::from(self.transactions.len()));
        for tx in &self.transactions {
            if self.is_v2() {
                writer.write_u8(tx.data_format as u8);
                match tx.data_format {
                    DataFormat::TxIDOnly => writer.write_bytes(tx.txid.as_bytes()),
                    DataFormat::RawTxAndBumpIndex => {
                        let index = tx.bump_index.ok_or_else(|| {
                            SpvError::InvalidBeef(format!("{} has no bump index", tx.txid))
                        })?;
                        writer.write_varint(VarInt(index));
                        writer.write_bytes(&tx.raw);
                    }
                    DataFormat::RawTx => writer.write_bytes(&tx.raw),
                }
            } else {
                if tx.is_txid_only() {
                    return Err(SpvError::InvalidBeef(format!(
                        "txid-only entry {} cannot be written as V1",
                        tx.txid
                    )));
                }
                writer.write_bytes(&tx.raw);
                match tx.bump_index {
                    Some(index) => {
                        writer.write_u8(1);
                        writer.write_varint(VarInt(index));
                    }
                    None => writer.write_u8(0),
                }
            }
        }

        Ok(writer.into_bytes())
    }

    /// Serialize to hex.
    pub fn to_hex(&self) -> Result<String, SpvError> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Append a transaction.
    pub fn add_transaction(&mut self, tx: Transaction, bump_index: Option<u64>) -> Hash {
        let entry = BeefTx::from_transaction(tx, bump_index);
        let txid = entry.txid;
        self.transactions.push(entry);
        txid
    }

    /// Map from txid to position in `transactions`. The first entry wins
    /// if a txid repeats.
    pub fn txid_index(&self) -> HashMap<Hash, usize> {
        let mut index = HashMap::with_capacity(self.transactions.len());
        for (i, tx) in self.transactions.iter().enumerate() {
            index.entry(tx.txid).or_insert(i);
        }
        index
    }

    /// Find a transaction by txid.
    pub fn find_transaction(&self, txid: &Hash) -> Option<&BeefTx> {
        self.transactions.iter().find(|tx| tx.txid == *txid)
    }

    /// Find a transaction by display-order txid hex.
    pub fn find_transaction_hex(&self, txid: &str) -> Option<&BeefTx> {
        let hash = Hash::from_hex(txid).ok()?;
        self.find_transaction(&hash)
    }

    /// Find the BUMP proving `txid`: the one its entry points at, or else
    /// any BUMP that lists it at level 0.
    pub fn find_bump(&self, txid: &Hash) -> Option<&MerklePath> {
        let referenced = self
            .find_transaction(txid)
            .and_then(|tx| tx.bump_index)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.bumps.get(i))
            .filter(|bump| bump.contains(txid));
        referenced.or_else(|| self.bumps.iter().find(|bump| bump.contains(txid)))
    }

    /// Bundled transactions that `txid` spends from, in input order.
    pub fn parents_of(&self, txid: &Hash) -> Vec<&BeefTx> {
        let Some(child) = self.find_transaction(txid) else {
            return Vec::new();
        };
        let index = self.txid_index();
        let mut seen = HashSet::new();
        child
            .input_txids()
            .filter(|parent| seen.insert(*parent))
            .filter_map(|parent| index.get(&parent).map(|&i| &self.transactions[i]))
            .collect()
    }

    /// Merge a BUMP, returning its index in the bumps array.
    pub fn merge_bump(&mut self, bump: &MerklePath) -> Result<usize, SpvError> {
        let incoming_root = bump.compute_root(None)?;
        for (i, existing) in self.bumps.iter_mut().enumerate() {
            if existing.block_height == bump.block_height
                && existing.compute_root(None).ok() == Some(incoming_root)
            {
                existing.combine(bump)?;
                return Ok(i);
            }
        }

        self.bumps.push(bump.clone());
        Ok(self.bumps.len() - 1)
    }

    /// Check that every transaction is traceable to a BUMP, directly or
    /// through bundled parents, and that BUMPs at the same height agree on
    /// the root.
    pub fn is_valid(&self, allow_txid_only: bool) -> bool {
        let mut proven: HashSet<Hash> = HashSet::new();

        for tx in &self.transactions {
            if tx.is_txid_only() {
                if !allow_txid_only {
                    return false;
                }
                proven.insert(tx.txid);
                continue;
            }
            let in_bump = tx
                .bump_index
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| self.bumps.get(i))
                .is_some_and(|bump| bump.contains(&tx.txid));
            if in_bump {
                proven.insert(tx.txid);
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for tx in &self.transactions {
                if proven.contains(&tx.txid) || tx.transaction.is_none() {
                    continue;
                }
                let mut inputs = tx.input_txids().peekable();
                if inputs.peek().is_none() {
                    continue;
                }
                if inputs.all(|parent| proven.contains(&parent)) {
                    proven.insert(tx.txid);
                    changed = true;
                }
            }
        }

        if !self.transactions.iter().all(|tx| proven.contains(&tx.txid)) {
            return false;
        }

        self.roots_by_height().is_some()
    }

    /// Verify the BEEF against a chain tracker.
    pub async fn verify<C: ChainTracker>(
        &self,
        chain_tracker: &C,
        allow_txid_only: bool,
    ) -> Result<bool, SpvError> {
        if !self.is_valid(allow_txid_only) {
            return Ok(false);
        }
        let Some(roots) = self.roots_by_height() else {
            return Ok(false);
        };

        for (height, root) in &roots {
            if !chain_tracker.is_valid_root_for_height(root, *height).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// One root per block height, or `None` if two BUMPs disagree.
    fn roots_by_height(&self) -> Option<BTreeMap<u64, Hash>> {
        let mut roots: BTreeMap<u64, Hash> = BTreeMap::new();
        for bump in &self.bumps {
            let Some(level0) = bump.path.first() else {
                continue;
            };
            for leaf in level0 {
                let Some(hash) = leaf.hash else { continue };
                let Ok(root) = bump.compute_root(Some(&hash)) else {
                    continue;
                };
                match roots.get(&bump.block_height) {
                    Some(existing) if *existing != root => return None,
                    _ => {
                        roots.insert(bump.block_height, root);
                    }
                }
            }
        }
        Some(roots)
    }
}

impl Default for Beef {
    fn default() -> Self {
        Self::new()
    }
}

fn is_known_version(version: u32) -> bool {
    version == BEEF_V1 || version == BEEF_V2
}

/// Build a decode error at the reader's current offset. Failed reads do
/// not advance the reader, so this is the offset of the offending field.
fn malformed(reader: &BsvReader, context: &str, cause: impl fmt::Display) -> SpvError {
    SpvError::MalformedBeef {
        offset: reader.position(),
        reason: format!("{}: {}", context, cause),
    }
}

fn capacity_hint(count: VarInt, reader: &BsvReader) -> usize {
    usize::try_from(count.value())
        .unwrap_or(usize::MAX)
        .min(reader.remaining())
}

fn read_raw_tx(reader: &mut BsvReader, i: u64) -> Result<(Transaction, Vec<u8>, Hash), SpvError> {
    let start = reader.position();
    let tx = Transaction::read_from(reader)
        .map_err(|e| malformed(reader, &format!("transaction {}", i), e))?;
    let raw = reader.consumed_since(start).to_vec();
    let txid = Hash::new(sha256d(&raw));
    Ok((tx, raw, txid))
}

fn read_v1_tx(reader: &mut BsvReader, i: u64) -> Result<BeefTx, SpvError> {
    let (tx, raw, txid) = read_raw_tx(reader, i)?;

    let has_bump = reader
        .read_u8()
        .map_err(|e| malformed(reader, &format!("transaction {} bump flag", i), e))?;
    let bump_index = match has_bump {
        0 => None,
        1 => {
            let index = reader
                .read_varint()
                .map_err(|e| malformed(reader, &format!("transaction {} bump index", i), e))?;
            Some(index.value())
        }
        flag => {
            return Err(SpvError::MalformedBeef {
                offset: reader.position() - 1,
                reason: format!("transaction {} has bump flag {}", i, flag),
            })
        }
    };

    Ok(BeefTx {
        data_format: if bump_index.is_some() {
            DataFormat::RawTxAndBumpIndex
        } else {
            DataFormat::RawTx
        },
        txid,
        raw,
        transaction: Some(tx),
        bump_index,
    })
}

fn read_v2_tx(reader: &mut BsvReader, i: u64) -> Result<BeefTx, SpvError> {
    let at = reader.position();
    let format_byte = reader
        .read_u8()
        .map_err(|e| malformed(reader, &format!("transaction {} format", i), e))?;
    let data_format = DataFormat::try_from(format_byte).map_err(|b| SpvError::MalformedBeef {
        offset: at,
        reason: format!("transaction {}: invalid data format {}", i, b),
    })?;

    if data_format == DataFormat::TxIDOnly {
        let bytes = reader
            .read_array::<32>()
            .map_err(|e| malformed(reader, &format!("transaction {} txid", i), e))?;
        return Ok(BeefTx::txid_only(Hash::new(bytes)));
    }

    let bump_index = if data_format == DataFormat::RawTxAndBumpIndex {
        let index = reader
            .read_varint()
            .map_err(|e| malformed(reader, &format!("transaction {} bump index", i), e))?;
        Some(index.value())
    } else {
        None
    };

    let (tx, raw, txid) = read_raw_tx(reader, i)?;
    Ok(BeefTx {
        data_format,
        txid,
        raw,
        transaction: Some(tx),
        bump_index,
    })
}
