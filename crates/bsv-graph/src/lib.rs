//! Spending-graph traversal for BSV transactions.
//!
//! [`TraversalEngine`] follows the outputs of a root transaction forward
//! through their spends, building a graph of intermediate transactions,
//! unspent outputs and fee sinks. Chain data comes from any
//! [`bsv_spv::BlockchainProvider`]; [`MockProvider`] serves an in-memory
//! graph for tests and demos.

pub mod config;
pub mod engine;
pub mod error;
pub mod mock;
pub mod types;


pub use config::TraversalConfig;
pub use engine::TraversalEngine;
pub use error::GraphError;
pub use mock::{CallGate, MockProvider};
pub use types::{
    EdgeKind, GraphEdge, GraphNode, GraphSnapshot, GraphStats, NodeKind, NodeOutput, QueueItem,
    TraversalStatus,
};
