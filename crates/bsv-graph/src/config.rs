//! Traversal configuration.

use std::time::Duration;

/// Limits and pacing for one traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalConfig {
    /// Deepest level whose outputs are still followed. 0 means unlimited.
    pub max_depth: u32,
    /// Outputs worth less than this are never enqueued. 0 disables the filter.
    pub min_value_satoshis: u64,
    /// Minimum spacing between progress snapshots while running.
    pub snapshot_interval: Duration,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 0,
            min_value_satoshis: 0,
            snapshot_interval: Duration::from_millis(250),
        }
    }
}

impl TraversalConfig {
    /// Whether outputs of a transaction at `level` should be enqueued.
    pub fn follows_level(&self, level: u32) -> bool {
        self.max_depth == 0 || level < self.max_depth
    }

    /// Whether an output of `value` passes the value filter.
    pub fn accepts_value(&self, value: u64) -> bool {
        value >= self.min_value_satoshis
    }
}
