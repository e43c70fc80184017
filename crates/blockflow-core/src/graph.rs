//! # Reverse Dependency Graph
//!
//! Directed graph over block ids. An edge P -> C means "P's result is
//! used by C": C's data currently contains a resolvable reference to P.
//! Pointing edges at consumers makes "who must recompute when P
//! changes" a single adjacency lookup, computed once per edit instead of
//! re-derived by scanning all blocks on every change.
//!
//! The graph is derived, rebuildable state: rebuilt in full on bulk
//! load, updated incrementally (single edge add) whenever a reference
//! resolves during editing. All containers are `BTreeMap`/`BTreeSet`
//! so ordering is deterministic.

use crate::types::{BlockId, CycleError};
use std::collections::{BTreeMap, BTreeSet};

/// The reverse dependency graph: producer -> consumers.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Every node, including isolated ones - isolated blocks still
    /// participate in update batches.
    nodes: BTreeSet<BlockId>,

    /// Adjacency: producer -> set of direct consumers.
    edges: BTreeMap<BlockId, BTreeSet<BlockId>>,

    /// Reverse adjacency: consumer -> set of direct producers.
    /// Maintained alongside `edges` so indegree is O(log n).
    reverse: BTreeMap<BlockId, BTreeSet<BlockId>>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Idempotent.
    pub fn add_node(&mut self, id: BlockId) {
        self.nodes.insert(id);
    }

    /// Remove a node and all incident edges, in both directions.
    ///
    /// Ordering invariant: the scheduler must notify a deleted block's
    /// consumers BEFORE calling this; the graph itself does not enforce
    /// that.
    pub fn remove_node(&mut self, id: BlockId) {
        self.nodes.remove(&id);
        if let Some(consumers) = self.edges.remove(&id) {
            for c in consumers {
                if let Some(producers) = self.reverse.get_mut(&c) {
                    producers.remove(&id);
                }
            }
        }
        if let Some(producers) = self.reverse.remove(&id) {
            for p in producers {
                if let Some(consumers) = self.edges.get_mut(&p) {
                    consumers.remove(&id);
                }
            }
        }
    }

    /// Add the edge producer -> consumer. Idempotent; duplicate
    /// insertion is a no-op. Endpoints are added implicitly.
    pub fn add_edge(&mut self, producer: BlockId, consumer: BlockId) {
        self.nodes.insert(producer);
        self.nodes.insert(consumer);
        self.edges.entry(producer).or_default().insert(consumer);
        self.reverse.entry(consumer).or_default().insert(producer);
    }

    /// Whether the edge producer -> consumer exists.
    #[must_use]
    pub fn has_edge(&self, producer: BlockId, consumer: BlockId) -> bool {
        self.edges
            .get(&producer)
            .is_some_and(|consumers| consumers.contains(&consumer))
    }

    /// Whether the node exists.
    #[must_use]
    pub fn contains_node(&self, id: BlockId) -> bool {
        self.nodes.contains(&id)
    }

    /// Number of producers feeding `id`.
    #[must_use]
    pub fn indegree(&self, id: BlockId) -> usize {
        self.reverse.get(&id).map_or(0, BTreeSet::len)
    }

    /// Number of consumers of `id`.
    #[must_use]
    pub fn outdegree(&self, id: BlockId) -> usize {
        self.edges.get(&id).map_or(0, BTreeSet::len)
    }

    /// Direct consumers of `id`, in id order.
    #[must_use]
    pub fn adjacent(&self, id: BlockId) -> Vec<BlockId> {
        self.edges
            .get(&id)
            .map(|consumers| consumers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every node reachable from `id` along consumer edges, in id
    /// order. `id` itself appears only when it lies on a cycle.
    ///
    /// This is the full set a recompute of `id` can affect: sorting it
    /// as one batch replaces recursive single-step fan-out, and lets
    /// the sort see a cycle that single steps never would.
    #[must_use]
    pub fn downstream(&self, id: BlockId) -> Vec<BlockId> {
        let mut seen = BTreeSet::new();
        let mut pending = self.adjacent(id);
        while let Some(next) = pending.pop() {
            if seen.insert(next) {
                if let Some(consumers) = self.edges.get(&next) {
                    pending.extend(consumers.iter().copied());
                }
            }
        }
        seen.into_iter().collect()
    }

    /// All node ids in deterministic order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<BlockId> {
        self.nodes.iter().copied().collect()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Total order over `subset` consistent with every edge between two
    /// subset members.
    ///
    /// Kahn's algorithm restricted to the subset: edges to ids outside
    /// `subset` impose no constraint. Ids absent from the graph are
    /// treated as isolated. Ties break by id, so the order is
    /// deterministic.
    ///
    /// Fails with [`CycleError`] if the subset contains a cycle
    /// (self-loops and mutual pairs included); the error carries the
    /// unsortable member set so the scheduler can abort and report the
    /// batch.
    pub fn topological_sort(&self, subset: &[BlockId]) -> Result<Vec<BlockId>, CycleError> {
        let members: BTreeSet<BlockId> = subset.iter().copied().collect();

        // Indegree counted only over edges internal to the subset.
        let mut indegree: BTreeMap<BlockId, usize> = BTreeMap::new();
        for &id in &members {
            let deg = self.reverse.get(&id).map_or(0, |producers| {
                producers.iter().filter(|p| members.contains(p)).count()
            });
            indegree.insert(id, deg);
        }

        let mut ready: BTreeSet<BlockId> = indegree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(&next) = ready.iter().next() {
            ready.remove(&next);
            order.push(next);

            if let Some(consumers) = self.edges.get(&next) {
                for &c in consumers.iter().filter(|c| members.contains(c)) {
                    if let Some(deg) = indegree.get_mut(&c) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            ready.insert(c);
                        }
                    }
                }
            }
        }

        if order.len() < members.len() {
            let members = indegree
                .into_iter()
                .filter(|(id, _)| !order.contains(id))
                .map(|(id, _)| id)
                .collect();
            return Err(CycleError { members });
        }

        Ok(order)
    }
}

// =============================================================================
// TESTS
// =============================================================================
