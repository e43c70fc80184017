//! # Update Scheduler
//!
//! Drives recomputation of blocks through the Transform Services:
//! partitions a batch into independent and dependent sets, dispatches
//! independents without awaiting, walks dependents in topological order
//! awaiting each round-trip, and debounces per-block outbound requests.
//!
//! ## Concurrency Model
//!
//! The block store and dependency graph live behind one `RwLock`; they
//! are the single logical writer state. The lock is never held across a
//! transform round-trip: the scheduler decides what to dispatch under
//! the lock, releases it, awaits the network, then reacquires it to
//! write the result back. Ordering within a dependent chain comes from
//! the topological walk, not from locking.
//!
//! ## Cascades
//!
//! Only a user-driven recompute (an edit, a refresh, a fired debounce
//! timer) cascades its outcome to consumers, and it cascades once: one
//! batch over the whole downstream closure of the edited block. Blocks
//! recomputed as part of a batch never cascade again; the batch's
//! topological order already places every consumer after its producers,
//! so a second fan-out would dispatch blocks twice and recurse without
//! bound on a reference cycle.
//!
//! ## Cycle Handling
//!
//! A cycle among a batch's blocks abandons the entire `update_groups`
//! call, including the independent-set dispatch, and leaves the graph
//! untouched (edges added eagerly during substitution are already in
//! place and are not rolled back). On the edit path the abandonment is
//! logged and the edit itself still succeeds; on bulk load the cycle is
//! returned to the caller.

pub mod transform;

pub use transform::{TransformClient, TransformError};

use blockflow_core::{
    Block, BlockId, BlockKind, BlockStore, BlockflowError, CycleError, DependencyGraph,
    InteractionState, StoredBlock, TransformResult, extract_references, resolve_references,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

// =============================================================================
// UPDATE PLAN
// =============================================================================

/// How a batch of block ids will be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Blocks with no edges at all: dispatched without awaiting.
    pub independent: Vec<BlockId>,
    /// Everything else, in topological order: awaited one by one.
    pub dependent: Vec<BlockId>,
}

/// Partition `ids` into independent and dependent sets and order the
/// dependents topologically, using the full `ids` set as the sort
/// domain.
pub fn plan_update(graph: &DependencyGraph, ids: &[BlockId]) -> Result<UpdatePlan, CycleError> {
    let independent: Vec<BlockId> = ids
        .iter()
        .copied()
        .filter(|&id| graph.indegree(id) == 0 && graph.outdegree(id) == 0)
        .collect();

    let order = graph.topological_sort(ids)?;
    let dependent = order
        .into_iter()
        .filter(|id| !independent.contains(id))
        .collect();

    Ok(UpdatePlan {
        independent,
        dependent,
    })
}

/// Rebuild the reverse dependency graph from scratch by scanning every
/// block's data. Only needed on bulk load; incremental edits maintain
/// the graph eagerly during substitution.
#[must_use]
pub fn rebuild_graph(store: &BlockStore) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for block in store.iter() {
        if !block.kind.is_computable() {
            continue;
        }
        graph.add_node(block.id);
        for name in extract_references(&block.data) {
            if let Some(producer) = store.find_by_name(&name) {
                if producer.kind.is_computable() {
                    graph.add_edge(producer.id, block.id);
                }
            }
        }
    }
    graph
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// The store and graph, mutated only through the scheduler.
#[derive(Debug)]
struct EngineState {
    store: BlockStore,
    graph: DependencyGraph,
}

/// A user edit to one block's input fields.
#[derive(Debug, Clone)]
pub struct BlockInput {
    pub data: String,
    pub instructions: String,
}

/// What `run_input_change` decided to do after updating block state.
enum Decision {
    /// Nothing to send (no usable data, no instructions, or not a
    /// transformable kind).
    Nothing,
    /// Within the debounce window: re-run after the remaining wait.
    Defer(Duration),
    /// Send the transform request now.
    Dispatch {
        generation: u64,
        kind: BlockKind,
        payload: String,
        instructions: String,
    },
}

type BoxedUpdate = Pin<Box<dyn Future<Output = Result<(), CycleError>> + Send>>;

/// Cloneable handle to the update scheduler.
///
/// All clones share the same store, graph and pending debounce timers.
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<RwLock<EngineState>>,
    transforms: TransformClient,
    /// Pending deferred recomputes, at most one per block. A new edit
    /// replaces (and aborts) the block's existing timer.
    timers: Arc<Mutex<BTreeMap<BlockId, JoinHandle<()>>>>,
    debounce: Duration,
}

impl Scheduler {
    /// Create a scheduler with the given transform client and debounce
    /// window.
    #[must_use]
    pub fn new(transforms: TransformClient, debounce: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState {
                store: BlockStore::new(),
                graph: DependencyGraph::new(),
            })),
            transforms,
            timers: Arc::new(Mutex::new(BTreeMap::new())),
            debounce,
        }
    }

    // =========================================================================
    // BLOCK LIFECYCLE
    // =========================================================================

    /// Create a new empty block and return a snapshot of it.
    pub async fn create_block(&self, kind: BlockKind, name: Option<String>) -> Block {
        let mut state = self.state.write().await;
        let id = state.store.create(kind, name);
        tracing::info!(%id, ?kind, "block created");
        // The store just created it, so the clone cannot miss; fall back
        // to a fresh block to keep this path panic-free.
        state
            .store
            .get(id)
            .cloned()
            .unwrap_or_else(|| Block::new(id, "", kind))
    }

    /// Snapshot of one block.
    pub async fn get_block(&self, id: BlockId) -> Option<Block> {
        self.state.read().await.store.get(id).cloned()
    }

    /// Snapshots of all blocks, in id (creation) order.
    pub async fn block_snapshots(&self) -> Vec<Block> {
        self.state.read().await.store.iter().cloned().collect()
    }

    /// Snapshot of the reverse dependency graph, for diagnostics.
    pub async fn graph_snapshot(&self) -> DependencyGraph {
        self.state.read().await.graph.clone()
    }

    /// Rename a block. Does not trigger recomputation: consumers pick
    /// up the new resolution on their next edit or refresh.
    pub async fn rename_block(&self, id: BlockId, name: String) -> Result<(), BlockflowError> {
        let mut state = self.state.write().await;
        let block = state
            .store
            .get_mut(id)
            .ok_or(BlockflowError::BlockNotFound(id))?;
        block.name = name;
        Ok(())
    }

    /// Change which of a block's fields are user-editable.
    pub async fn set_interaction_state(
        &self,
        id: BlockId,
        interaction_state: InteractionState,
    ) -> Result<(), BlockflowError> {
        let mut state = self.state.write().await;
        let block = state
            .store
            .get_mut(id)
            .ok_or(BlockflowError::BlockNotFound(id))?;
        block.interaction_state = interaction_state;
        Ok(())
    }

    /// Delete a block.
    ///
    /// Consumers are updated first, while the node is still in the
    /// graph, so they observe the reference as now-unresolvable; only
    /// then is the node (and its edges) removed.
    pub async fn delete_block(&self, id: BlockId) -> Result<(), BlockflowError> {
        let consumers = {
            let mut state = self.state.write().await;
            if state.store.remove(id).is_none() {
                return Err(BlockflowError::BlockNotFound(id));
            }
            state.graph.adjacent(id)
        };

        if let Some(timer) = self.timers.lock().await.remove(&id) {
            timer.abort();
        }

        tracing::info!(%id, consumers = consumers.len(), "block deleted, updating former consumers");
        self.update_groups(consumers, false).await.ok();

        self.state.write().await.graph.remove_node(id);
        Ok(())
    }

    // =========================================================================
    // DOCUMENT OPERATIONS
    // =========================================================================

    /// Stripped form of every block, for persistence.
    pub async fn export_document(&self) -> Vec<StoredBlock> {
        self.state.read().await.store.export_document()
    }

    /// Replace all blocks with a stored document, rebuild the graph in
    /// full, and recompute everything in dependency order.
    ///
    /// A reference cycle in the document aborts the recomputation and
    /// is returned to the caller; the blocks themselves stay loaded.
    pub async fn load_document(
        &self,
        stored: &[StoredBlock],
    ) -> Result<Vec<BlockId>, BlockflowError> {
        let ids = {
            let mut state = self.state.write().await;
            let ids = state.store.load_document(stored);
            state.graph = rebuild_graph(&state.store);
            ids
        };

        // Drop timers belonging to the previous document.
        for (_, timer) in std::mem::take(&mut *self.timers.lock().await) {
            timer.abort();
        }

        tracing::info!(blocks = ids.len(), "document loaded, recomputing all blocks");
        self.update_groups(ids.clone(), true).await?;
        Ok(ids)
    }

    // =========================================================================
    // RECOMPUTATION
    // =========================================================================

    /// React to an edit of one block's input fields.
    ///
    /// With `input = None` the block's stored data is re-evaluated
    /// (refresh and scheduler-internal recomputes). `immediate` skips
    /// the debounce window; `is_refresh` defeats the no-op
    /// short-circuit.
    pub async fn handle_input_change(
        &self,
        id: BlockId,
        input: Option<BlockInput>,
        immediate: bool,
        is_refresh: bool,
    ) -> Result<(), BlockflowError> {
        if !self.state.read().await.store.contains(id) {
            return Err(BlockflowError::BlockNotFound(id));
        }
        self.run_input_change(id, input, immediate, is_refresh, true)
            .await;
        Ok(())
    }

    /// Recompute a batch of blocks.
    ///
    /// Independents are dispatched fire-and-forget; dependents are
    /// awaited in topological order so every consumer sees its
    /// producers' freshest results. A cycle abandons the whole call.
    pub fn update_groups(&self, ids: Vec<BlockId>, force_refresh: bool) -> BoxedUpdate {
        let sched = self.clone();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }

            let plan = {
                let state = sched.state.read().await;
                plan_update(&state.graph, &ids)
            };

            let plan = match plan {
                Ok(plan) => plan,
                Err(cycle) => {
                    tracing::warn!(
                        members = ?cycle.members,
                        "circular dependency in batch, abandoning the whole call"
                    );
                    return Err(cycle);
                }
            };

            for id in plan.independent {
                tracing::debug!(%id, "independent block, dispatching without awaiting");
                let task = sched.clone();
                tokio::spawn(async move {
                    task.run_input_change(id, None, true, force_refresh, false)
                        .await;
                });
            }

            for id in plan.dependent {
                tracing::debug!(%id, "dependent block, awaiting recompute");
                sched
                    .run_input_change(id, None, true, force_refresh, false)
                    .await;
            }

            Ok(())
        })
    }

    /// Boxed wrapper so timers and spawned tasks can recurse into the
    /// input-change path without an infinitely sized future type.
    fn input_change_task(
        &self,
        id: BlockId,
        input: Option<BlockInput>,
        immediate: bool,
        is_refresh: bool,
        user_update: bool,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let sched = self.clone();
        Box::pin(async move {
            sched
                .run_input_change(id, input, immediate, is_refresh, user_update)
                .await;
        })
    }

    /// Recompute one block: substitution, no-op short-circuit, debounce,
    /// dispatch and write-back.
    ///
    /// `user_update` marks the recompute as user-driven. Only those
    /// cascade to consumers (one batch over the downstream closure);
    /// batch-driven recomputes rely on their batch's topological order
    /// instead, so a recompute chain always terminates.
    async fn run_input_change(
        &self,
        id: BlockId,
        input: Option<BlockInput>,
        immediate: bool,
        is_refresh: bool,
        user_update: bool,
    ) {
        // Phase 1: update block state and decide on a dispatch, under
        // the write lock.
        let mut static_consumers = Vec::new();
        let decision = {
            let mut state = self.state.write().await;
            let EngineState { store, graph } = &mut *state;

            let Some(block) = store.get(id) else {
                // Deleted while a timer or batch was pending.
                return;
            };
            if block.kind == BlockKind::Separator {
                return;
            }

            let name = block.name.clone();
            let (data, instructions) = match input {
                Some(input) => (input.data, input.instructions),
                None => (block.data.clone(), block.instructions.clone()),
            };

            let sub = resolve_references(&*store, graph, &data, &name);
            for missed in &sub.unresolved {
                tracing::debug!(%id, reference = %missed, "reference did not resolve, left literal");
            }
            for skipped in &sub.circular {
                tracing::debug!(%id, reference = %skipped, "direct circular reference skipped");
            }

            // The payload is the raw data unless references actually
            // resolved, in which case it is the combined data.
            let mut payload = data.clone();
            let mut referenced_changed = false;
            if !sub.referenced_results.is_empty() {
                payload = sub.combined_data.clone();
                referenced_changed = Some(payload.as_str()) != block.combined_data.as_deref();
            }

            let Some(block) = store.get_mut(id) else {
                return;
            };

            if !is_refresh
                && block.data == data
                && block.instructions == instructions
                && !referenced_changed
            {
                tracing::trace!(%id, "no input change, skipping recompute");
                return;
            }

            if block.kind == BlockKind::Static {
                // Static blocks compute synchronously: the combined data
                // is the result.
                block.result = Some(TransformResult::Text(sub.combined_data.clone()));
                block.errored = false;
                if user_update {
                    static_consumers = graph.downstream(id);
                }
            }

            block.data = data;
            block.instructions = instructions.clone();
            if !sub.referenced_results.is_empty() {
                block.combined_data = Some(payload.clone());
            }

            let data_ready =
                (!sub.has_references && !payload.is_empty()) || !sub.referenced_results.is_empty();
            let transformable = matches!(block.kind, BlockKind::Text | BlockKind::Image);

            if data_ready && transformable && !instructions.is_empty() {
                let now = Instant::now();
                let within_window = block
                    .last_request
                    .map(|last| now.duration_since(last))
                    .filter(|elapsed| *elapsed < self.debounce);

                match within_window {
                    Some(elapsed) if !immediate => Decision::Defer(self.debounce - elapsed),
                    _ => {
                        block.last_request = Some(now);
                        block.generation += 1;
                        Decision::Dispatch {
                            generation: block.generation,
                            kind: block.kind,
                            payload,
                            instructions,
                        }
                    }
                }
            } else {
                Decision::Nothing
            }
        };

        // Static results cascade synchronously, outside the lock.
        if !static_consumers.is_empty() {
            self.update_groups(static_consumers, false).await.ok();
        }

        // Phase 2: act on the decision without holding the lock.
        match decision {
            Decision::Nothing => {}
            Decision::Defer(remaining) => self.defer(id, remaining).await,
            Decision::Dispatch {
                generation,
                kind,
                payload,
                instructions,
            } => {
                // A dispatched request supersedes any pending timer.
                if let Some(timer) = self.timers.lock().await.remove(&id) {
                    timer.abort();
                }
                self.dispatch(id, generation, kind, &payload, &instructions, user_update)
                    .await;
            }
        }
    }

    /// Schedule a deferred recompute, replacing the block's existing
    /// timer if any.
    ///
    /// The re-run is flagged as a refresh: the block's fields were
    /// already updated when the edit was deferred, so the no-op
    /// short-circuit would otherwise swallow the pending dispatch.
    async fn defer(&self, id: BlockId, remaining: Duration) {
        tracing::debug!(
            %id,
            wait_ms = remaining.as_millis() as u64,
            "within debounce window, deferring transform request"
        );

        let sched = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            sched.timers.lock().await.remove(&id);
            sched.input_change_task(id, None, true, true, true).await;
        });

        let mut timers = self.timers.lock().await;
        if let Some(old) = timers.insert(id, handle) {
            old.abort();
        }
    }

    /// Send one transform request and write the outcome back, unless a
    /// newer request for the block has been dispatched meanwhile.
    ///
    /// Success on a user-driven dispatch cascades to the block's
    /// downstream closure; batch-driven dispatches never cascade.
    async fn dispatch(
        &self,
        id: BlockId,
        generation: u64,
        kind: BlockKind,
        payload: &str,
        instructions: &str,
        user_update: bool,
    ) {
        tracing::info!(%id, ?kind, "dispatching transform request");

        let outcome = match kind {
            BlockKind::Image => self
                .transforms
                .transform_image(payload, instructions)
                .await
                .map(TransformResult::Image),
            _ => self
                .transforms
                .transform_text(payload, instructions)
                .await
                .map(TransformResult::Text),
        };

        let consumers = {
            let mut state = self.state.write().await;
            let EngineState { store, graph } = &mut *state;
            let Some(block) = store.get_mut(id) else {
                return;
            };
            if block.generation != generation {
                tracing::debug!(%id, "stale transform response discarded");
                return;
            }

            match outcome {
                Ok(result) => {
                    block.result = Some(result);
                    block.errored = false;
                    if user_update {
                        graph.downstream(id)
                    } else {
                        Vec::new()
                    }
                }
                Err(e) => {
                    tracing::warn!(%id, error = %e, "transform request failed, block marked errored");
                    block.errored = true;
                    return;
                }
            }
        };

        self.update_groups(consumers, false).await.ok();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn graph_with_edges(edges: &[(u64, u64)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for &(p, c) in edges {
            graph.add_edge(BlockId(p), BlockId(c));
        }
        graph
    }

    #[test]
    fn plan_separates_independents_from_ordered_dependents() {
        let graph = graph_with_edges(&[(1, 2), (2, 3)]);
        let ids = vec![BlockId(3), BlockId(9), BlockId(1), BlockId(2)];

        let plan = plan_update(&graph, &ids).expect("acyclic");
        assert_eq!(plan.independent, vec![BlockId(9)]);
        assert_eq!(plan.dependent, vec![BlockId(1), BlockId(2), BlockId(3)]);
    }

    #[test]
    fn plan_with_cycle_fails_and_names_the_members() {
        let graph = graph_with_edges(&[(1, 2), (2, 1)]);
        let ids = vec![BlockId(1), BlockId(2), BlockId(7)];

        let cycle = plan_update(&graph, &ids).expect_err("cycle");
        assert_eq!(cycle.members, vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn rebuild_graph_recovers_edges_from_data() {
        let mut store = BlockStore::new();
        let a = store.create(BlockKind::Static, Some("A".to_string()));
        let b = store.create(BlockKind::Text, Some("B".to_string()));
        store.create(BlockKind::Separator, Some("sep".to_string()));
        if let Some(block) = store.get_mut(b) {
            block.data = "#A plus [A]".to_string();
        }

        let graph = rebuild_graph(&store);
        assert!(graph.has_edge(a, b));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn rebuild_graph_ignores_unknown_names() {
        let mut store = BlockStore::new();
        let b = store.create(BlockKind::Text, Some("B".to_string()));
        if let Some(block) = store.get_mut(b) {
            block.data = "#ghost".to_string();
        }

        let graph = rebuild_graph(&store);
        assert_eq!(graph.edge_count(), 0);
    }
}
