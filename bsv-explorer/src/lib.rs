#![deny(missing_docs)]

//! BSV spending-graph explorer.
//!
//! Re-exports every component for single-crate usage: hashing and wire
//! primitives, transactions, SPV data structures (Merkle trees, TSC proofs,
//! BUMP and BEEF), the graph traversal engine and the WhatsOnChain
//! provider.

pub use bsv_graph as graph;
pub use bsv_primitives as primitives;
pub use bsv_spv as spv;
pub use bsv_transaction as transaction;
pub use bsv_woc as woc;
