//! Spending-graph traversal.
//!
//! Starting from a root transaction, the engine walks forward through the
//! spends of each output until every branch ends in an unspent output or a
//! transaction that pays everything to fees. Work is a FIFO queue of
//! outputs, processed one at a time by a single worker.
//!
//! The engine is a cheap handle: clones share one traversal, so `pause` and
//! `stop` may be called from any task while another is driving the loop.
//! Every provider call is an await point, and the status is checked right
//! before and right after each one.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bsv_primitives::chainhash::Hash;
use bsv_spv::{BlockchainProvider, ProviderError, SpentStatus, TransactionRecord};
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::TraversalConfig;
use crate::error::GraphError;
use crate::types::{
    EdgeKind, GraphEdge, GraphNode, GraphSnapshot, GraphStats, NodeKind, NodeOutput, QueueItem,
    TraversalStatus,
};

/// Handle to one spending-graph traversal.
pub struct TraversalEngine<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for TraversalEngine<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<P> {
    provider: P,
    config: TraversalConfig,
    hub: Arc<Hub>,
}

/// Traversal state plus the channel it is published on. Kept apart from the
/// provider so a pending snapshot can be flushed from a timer task.
struct Hub {
    state: Mutex<State>,
    snapshots: watch::Sender<GraphSnapshot>,
    interval: Duration,
}

/// Mutable traversal state. Never held across an await.
#[derive(Default)]
struct State {
    status: TraversalStatus,
    /// Bumped by every start; results from an older run are dropped.
    generation: u64,
    /// Generation of the task currently driving the loop, if any.
    worker: Option<u64>,
    root_txid: Option<Hash>,
    nodes: Vec<GraphNode>,
    node_index: HashMap<String, usize>,
    edges: Vec<GraphEdge>,
    queue: VecDeque<QueueItem>,
    processed: HashSet<(Hash, u32)>,
    tx_cache: HashMap<Hash, TransactionRecord>,
    api_calls: u64,
    error_count: u64,
    elapsed: Duration,
    running_since: Option<Instant>,
    last_emit: Option<Instant>,
    dirty: bool,
    /// A timer task will flush the pending snapshot.
    flush_armed: bool,
}

impl State {
    fn reset(&mut self, root: Hash) -> u64 {
        let generation = self.generation + 1;
        *self = State {
            status: TraversalStatus::Running,
            generation,
            worker: Some(generation),
            root_txid: Some(root),
            running_since: Some(Instant::now()),
            ..State::default()
        };
        generation
    }

    fn set_status(&mut self, status: TraversalStatus) {
        if status != TraversalStatus::Running {
            if let Some(since) = self.running_since.take() {
                self.elapsed += since.elapsed();
            }
        } else if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
        self.status = status;
    }

    fn release_worker(&mut self, generation: u64) {
        if self.worker == Some(generation) {
            self.worker = None;
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed + self.running_since.map_or(Duration::ZERO, |s| s.elapsed())
    }

    fn stats(&self) -> GraphStats {
        let count = |kind| self.nodes.iter().filter(|n| n.kind == kind).count();
        GraphStats {
            node_count: self.nodes.len(),
            utxo_count: count(NodeKind::Utxo),
            fee_count: count(NodeKind::FeeConsumed),
            edge_count: self.edges.len(),
            max_depth: self.nodes.iter().map(|n| n.level).max().unwrap_or(0),
            elapsed_ms: u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
            api_calls: self.api_calls,
            queue_length: self.queue.len(),
            error_count: self.error_count,
        }
    }

    fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            status: self.status,
            root_txid: self.root_txid,
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            stats: self.stats(),
        }
    }

    /// Insert a node unless one with the same id exists.
    fn add_node(&mut self, node: GraphNode) -> bool {
        if self.node_index.contains_key(&node.id) {
            return false;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    fn mark_output(&mut self, txid: &Hash, vout: u32, spent_by: Option<String>) {
        let Some(&i) = self.node_index.get(&txid.to_string()) else {
            return;
        };
        if let Some(output) = self.nodes[i].outputs.iter_mut().find(|o| o.index == vout) {
            output.spent = spent_by.is_some();
            output.spent_by = spent_by;
        }
    }

    fn enqueue_outputs(
        &mut self,
        txid: Hash,
        parent_txid: Option<Hash>,
        level: u32,
        record: &TransactionRecord,
        config: &TraversalConfig,
    ) {
        let mut outputs: Vec<_> = record
            .outputs
            .iter()
            .filter(|o| config.accepts_value(o.value_satoshis))
            .collect();
        outputs.sort_by_key(|o| o.index);
        for output in outputs {
            self.queue.push_back(QueueItem {
                txid,
                parent_txid,
                output_index: output.index,
                level,
                value: output.value_satoshis,
            });
        }
    }

    fn apply_unspent(&mut self, item: &QueueItem) {
        self.processed.insert((item.txid, item.output_index));
        self.mark_output(&item.txid, item.output_index, None);

        let id = GraphNode::utxo_id(&item.txid, item.output_index);
        let created = self.add_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Utxo,
            level: item.level + 1,
            outputs: Vec::new(),
            total_value: item.value,
        });
        if created {
            self.edges.push(GraphEdge {
                from: item.txid.to_string(),
                to: id,
                output_index: item.output_index,
                value_satoshis: item.value,
                kind: EdgeKind::Utxo,
            });
        }
    }

    fn apply_spend(
        &mut self,
        item: &QueueItem,
        spender: Hash,
        record: &TransactionRecord,
        config: &TraversalConfig,
    ) {
        self.processed.insert((item.txid, item.output_index));
        self.mark_output(&item.txid, item.output_index, Some(spender.to_string()));

        let level = item.level + 1;
        let total = record.total_output_satoshis();
        if total == 0 {
            let id = GraphNode::fee_id(&spender);
            self.add_node(GraphNode {
                id: id.clone(),
                kind: NodeKind::FeeConsumed,
                level,
                outputs: Vec::new(),
                total_value: 0,
            });
            self.edges.push(GraphEdge {
                from: item.txid.to_string(),
                to: id,
                output_index: item.output_index,
                value_satoshis: item.value,
                kind: EdgeKind::Fee,
            });
            return;
        }

        let id = spender.to_string();
        let created = self.add_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Intermediate,
            level,
            outputs: node_outputs(record),
            total_value: total,
        });
        self.edges.push(GraphEdge {
            from: item.txid.to_string(),
            to: id,
            output_index: item.output_index,
            value_satoshis: item.value,
            kind: EdgeKind::Spending,
        });
        if created && config.follows_level(level) {
            self.enqueue_outputs(spender, Some(item.txid), level, record, config);
        }
    }

    fn apply_failure(&mut self, item: &QueueItem, error: &ProviderError) {
        warn!(
            "abandoning {}:{} after provider error: {}",
            item.txid, item.output_index, error
        );
        self.processed.insert((item.txid, item.output_index));
        self.error_count += 1;
    }
}

fn node_outputs(record: &TransactionRecord) -> Vec<NodeOutput> {
    record
        .outputs
        .iter()
        .map(|o| NodeOutput {
            index: o.index,
            value_satoshis: o.value_satoshis,
            spent: false,
            spent_by: None,
        })
        .collect()
}

impl<P: BlockchainProvider> TraversalEngine<P> {
    pub fn new(provider: P, config: TraversalConfig) -> Self {
        let (snapshots, _) = watch::channel(GraphSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                provider,
                hub: Arc::new(Hub {
                    state: Mutex::new(State::default()),
                    snapshots,
                    interval: config.snapshot_interval,
                }),
                config,
            }),
        }
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.shared.config
    }

    pub fn provider(&self) -> &P {
        &self.shared.provider
    }

    pub fn status(&self) -> TraversalStatus {
        self.lock().status
    }

    pub fn stats(&self) -> GraphStats {
        self.lock().stats()
    }

    /// A copy of the current graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.lock().snapshot()
    }

    /// Receive progress snapshots.
    ///
    /// While running, snapshots are sent at most once per
    /// `snapshot_interval`. Intermediate states are coalesced and the latest
    /// one goes out when the interval has passed, even if the traversal is
    /// waiting on the provider. Status transitions are always sent
    /// immediately.
    pub fn subscribe(&self) -> watch::Receiver<GraphSnapshot> {
        self.shared.hub.snapshots.subscribe()
    }

    /// Trace the spends of `root` and drive the traversal until it
    /// completes, is paused or is stopped.
    ///
    /// Any previous graph on this engine is discarded. Fails only if the
    /// root transaction cannot be fetched or a traversal is still active.
    pub async fn start_traversal(&self, root: Hash) -> Result<GraphStats, GraphError> {
        let generation = {
            let mut st = self.lock();
            if st.status.is_active() {
                return Err(GraphError::AlreadyActive(st.status));
            }
            let generation = st.reset(root);
            st.api_calls += 1;
            info!("starting traversal from {}", root);
            self.emit(&mut st, true);
            generation
        };

        let fetched = self.shared.provider.get_transaction(&root).await;
        {
            let mut st = self.lock();
            if st.generation != generation {
                return Ok(st.stats());
            }
            if st.status == TraversalStatus::Stopped {
                st.release_worker(generation);
                return Ok(st.stats());
            }
            match fetched {
                Err(source) => {
                    warn!("failed to fetch root transaction {}: {}", root, source);
                    st.set_status(TraversalStatus::Error);
                    st.release_worker(generation);
                    self.emit(&mut st, true);
                    return Err(GraphError::RootFetch { txid: root, source });
                }
                Ok(record) => {
                    st.add_node(GraphNode {
                        id: root.to_string(),
                        kind: NodeKind::Root,
                        level: 0,
                        outputs: node_outputs(&record),
                        total_value: record.total_output_satoshis(),
                    });
                    st.enqueue_outputs(root, None, 0, &record, &self.shared.config);
                    st.tx_cache.insert(root, record);
                    self.emit(&mut st, false);
                }
            }
        }

        self.drive(generation).await;
        Ok(self.stats())
    }

    /// Pause a running traversal. Returns whether anything changed.
    ///
    /// A provider result that arrives while paused is not applied; its item
    /// goes back to the front of the queue.
    pub fn pause(&self) -> bool {
        let mut st = self.lock();
        if st.status != TraversalStatus::Running {
            return false;
        }
        st.set_status(TraversalStatus::Paused);
        info!("traversal paused with {} items queued", st.queue.len());
        self.emit(&mut st, true);
        true
    }

    /// Continue a paused traversal and drive it until it completes, is
    /// paused or is stopped.
    ///
    /// Returns at once if the traversal is not paused, or if another task
    /// is still driving it.
    pub async fn resume(&self) -> GraphStats {
        let generation = {
            let mut st = self.lock();
            if st.status != TraversalStatus::Paused {
                return st.stats();
            }
            st.set_status(TraversalStatus::Running);
            info!("traversal resumed");
            self.emit(&mut st, true);
            if st.worker.is_some() {
                return st.stats();
            }
            st.worker = Some(st.generation);
            st.generation
        };

        self.drive(generation).await;
        self.stats()
    }

    /// Stop the traversal for good, dropping the queue. Results still in
    /// flight are discarded. Returns whether anything changed.
    pub fn stop(&self) -> bool {
        let mut st = self.lock();
        if !st.status.is_active() {
            return false;
        }
        st.set_status(TraversalStatus::Stopped);
        st.queue.clear();
        info!("traversal stopped");
        self.emit(&mut st, true);
        true
    }

    async fn drive(&self, generation: u64) {
        let config = &self.shared.config;
        loop {
            let item = {
                let mut st = self.lock();
                if st.generation != generation {
                    return;
                }
                if st.status != TraversalStatus::Running {
                    st.release_worker(generation);
                    return;
                }
                let Some(item) = st.queue.pop_front() else {
                    st.set_status(TraversalStatus::Completed);
                    st.release_worker(generation);
                    let stats = st.stats();
                    info!(
                        "traversal complete: {} nodes, {} utxos, {} api calls, {} errors",
                        stats.node_count, stats.utxo_count, stats.api_calls, stats.error_count
                    );
                    self.emit(&mut st, true);
                    return;
                };
                if st.processed.contains(&(item.txid, item.output_index)) {
                    continue;
                }
                st.api_calls += 1;
                item
            };

            let spent = self
                .shared
                .provider
                .get_spent_status(&item.txid, item.output_index)
                .await;

            let spender = {
                let mut st = self.lock();
                if !self.accept(&mut st, generation, &item) {
                    return;
                }
                match spent {
                    Ok(SpentStatus::Unspent) => {
                        debug!("{}:{} is unspent", item.txid, item.output_index);
                        st.apply_unspent(&item);
                        self.emit(&mut st, false);
                        continue;
                    }
                    Err(e) if e.is_unspent_equivalent() => {
                        debug!("{}:{} treated as unspent ({})", item.txid, item.output_index, e);
                        st.apply_unspent(&item);
                        self.emit(&mut st, false);
                        continue;
                    }
                    Err(e) => {
                        st.apply_failure(&item, &e);
                        self.emit(&mut st, false);
                        continue;
                    }
                    Ok(SpentStatus::Spent { txid, .. }) => {
                        debug!("{}:{} spent by {}", item.txid, item.output_index, txid);
                        if let Some(record) = st.tx_cache.get(&txid).cloned() {
                            st.apply_spend(&item, txid, &record, config);
                            self.emit(&mut st, false);
                            continue;
                        }
                        st.api_calls += 1;
                        txid
                    }
                }
            };

            let fetched = self.shared.provider.get_transaction(&spender).await;

            let mut st = self.lock();
            if !self.accept(&mut st, generation, &item) {
                return;
            }
            match fetched {
                Ok(record) => {
                    st.apply_spend(&item, spender, &record, config);
                    st.tx_cache.insert(spender, record);
                }
                Err(e) => st.apply_failure(&item, &e),
            }
            self.emit(&mut st, false);
        }
    }

    /// Decide whether a provider result for `item` may be applied.
    fn accept(&self, st: &mut State, generation: u64, item: &QueueItem) -> bool {
        if st.generation != generation {
            return false;
        }
        match st.status {
            TraversalStatus::Running => true,
            TraversalStatus::Paused => {
                debug!("requeueing {}:{} after pause", item.txid, item.output_index);
                st.queue.push_front(item.clone());
                st.release_worker(generation);
                self.emit(st, true);
                false
            }
            _ => {
                st.release_worker(generation);
                false
            }
        }
    }

    fn emit(&self, st: &mut State, force: bool) {
        self.shared.hub.emit(st, force);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.hub.state.lock()
    }
}

impl Hub {
    /// Publish the current state, or mark it pending if the last snapshot
    /// went out less than `interval` ago.
    ///
    /// A pending state arms a one-shot timer, so it reaches subscribers even
    /// while the worker is parked on a slow provider call.
    fn emit(self: &Arc<Self>, st: &mut State, force: bool) {
        let since = st.last_emit.map(|t| t.elapsed());
        if force || since.map_or(true, |e| e >= self.interval) {
            self.snapshots.send_replace(st.snapshot());
            st.last_emit = Some(Instant::now());
            st.dirty = false;
            return;
        }

        st.dirty = true;
        if st.flush_armed {
            return;
        }
        // Without a runtime the worker loop flushes on its next pass.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            st.flush_armed = true;
            let wait = self.interval.saturating_sub(since.unwrap_or_default());
            let hub = Arc::clone(self);
            runtime.spawn(async move {
                tokio::time::sleep(wait).await;
                hub.flush();
            });
        }
    }

    fn flush(self: &Arc<Self>) {
        let mut st = self.state.lock();
        st.flush_armed = false;
        if st.dirty {
            self.emit(&mut st, false);
        }
    }
}
