//! Graph, queue and progress types.

use std::fmt;

use bsv_primitives::chainhash::Hash;
use serde::{Deserialize, Serialize};

/// Lifecycle of a traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraversalStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
    /// The root transaction could not be fetched.
    Error,
}

impl TraversalStatus {
    /// A traversal in this state will not run again without a new start.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TraversalStatus::Stopped | TraversalStatus::Completed | TraversalStatus::Error
        )
    }

    /// Running or paused.
    pub fn is_active(self) -> bool {
        matches!(self, TraversalStatus::Running | TraversalStatus::Paused)
    }
}

impl fmt::Display for TraversalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraversalStatus::Idle => "idle",
            TraversalStatus::Running => "running",
            TraversalStatus::Paused => "paused",
            TraversalStatus::Stopped => "stopped",
            TraversalStatus::Completed => "completed",
            TraversalStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Root,
    Intermediate,
    Utxo,
    FeeConsumed,
}

/// One output of a transaction node, updated as its spend resolves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOutput {
    pub index: u32,
    pub value_satoshis: u64,
    pub spent: bool,
    /// Display txid of the spender, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spent_by: Option<String>,
}

/// A vertex of the spending graph.
///
/// Transaction nodes are keyed by txid, UTXO nodes by `"txid:vout"` and
/// fee sinks by `"txid:fee"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub level: u32,
    pub outputs: Vec<NodeOutput>,
    pub total_value: u64,
}

impl GraphNode {
    pub fn utxo_id(txid: &Hash, vout: u32) -> String {
        format!("{}:{}", txid, vout)
    }

    pub fn fee_id(txid: &Hash) -> String {
        format!("{}:fee", txid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    Spending,
    Utxo,
    Fee,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub output_index: u32,
    pub value_satoshis: u64,
    pub kind: EdgeKind,
}

/// One output waiting to have its spent status checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Transaction that owns the output.
    pub txid: Hash,
    /// Transaction through which `txid` was reached; `None` for the root.
    pub parent_txid: Option<Hash>,
    pub output_index: u32,
    /// Level of `txid` in the graph.
    pub level: u32,
    pub value: u64,
}

/// Counters derived from the graph after every processed item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub node_count: usize,
    pub utxo_count: usize,
    pub fee_count: usize,
    pub edge_count: usize,
    /// Highest node level seen.
    pub max_depth: u32,
    pub elapsed_ms: u64,
    pub api_calls: u64,
    pub queue_length: usize,
    pub error_count: u64,
}

/// An independent copy of a traversal's state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub status: TraversalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_txid: Option<Hash>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphStats,
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self {
            status: TraversalStatus::Idle,
            root_txid: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            stats: GraphStats::default(),
        }
    }
}

impl GraphSnapshot {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
