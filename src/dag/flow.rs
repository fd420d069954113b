//! FlowGraph - connection index built from a Dag (optimized)
//!
//! Performance optimizations:
//! - Arc<str> shared with the Dag for zero-cost cloning of node IDs
//! - FxHashMap for faster hashing (non-crypto, ~2x faster)
//! - SmallVec for stack-allocated small dependency lists (0-4 items)
//!
//! DAG Validation:
//! - Cycle detection using DFS three-color algorithm
//!
//! Connections whose endpoints do not exist are left out of the index;
//! the validator reports them separately.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::StructuralError;
use crate::model::Dag;

/// Stack-allocated deps: most nodes have 0-4 neighbours
pub type DepVec = SmallVec<[Arc<str>; 4]>;

/// Indexes into `Dag::connections()`
pub type ConnVec = SmallVec<[usize; 4]>;

type PortIndex = FxHashMap<Arc<str>, FxHashMap<Arc<str>, ConnVec>>;

/// Graph of node dependencies and port wiring built from connections
pub struct FlowGraph {
    /// node_id -> successor node_ids (one entry per connection)
    adjacency: FxHashMap<Arc<str>, DepVec>,
    /// node_id -> predecessor node_ids (one entry per connection)
    predecessors: FxHashMap<Arc<str>, DepVec>,
    /// All node IDs in Dag order (for deterministic iteration)
    node_ids: Vec<Arc<str>>,
    /// node -> input port -> connections feeding it
    by_target: PortIndex,
    /// node -> output port -> connections leaving it
    by_source: PortIndex,
}

impl FlowGraph {
    pub fn from_dag(dag: &Dag) -> Self {
        let capacity = dag.len();
        let mut adjacency: FxHashMap<Arc<str>, DepVec> =
            FxHashMap::with_capacity_and_hasher(capacity, Default::default());
        let mut predecessors: FxHashMap<Arc<str>, DepVec> =
            FxHashMap::with_capacity_and_hasher(capacity, Default::default());
        let mut node_ids: Vec<Arc<str>> = Vec::with_capacity(capacity);
        let mut by_target = PortIndex::default();
        let mut by_source = PortIndex::default();

        for node in dag.nodes() {
            node_ids.push(Arc::clone(&node.id));
            adjacency.insert(Arc::clone(&node.id), DepVec::new());
            predecessors.insert(Arc::clone(&node.id), DepVec::new());
        }

        for (idx, conn) in dag.connections().iter().enumerate() {
            if !dag.contains(&conn.source.node) || !dag.contains(&conn.target.node) {
                continue;
            }
            adjacency
                .entry(Arc::clone(&conn.source.node))
                .or_default()
                .push(Arc::clone(&conn.target.node));
            predecessors
                .entry(Arc::clone(&conn.target.node))
                .or_default()
                .push(Arc::clone(&conn.source.node));
            by_target
                .entry(Arc::clone(&conn.target.node))
                .or_default()
                .entry(Arc::clone(&conn.target.port))
                .or_default()
                .push(idx);
            by_source
                .entry(Arc::clone(&conn.source.node))
                .or_default()
                .entry(Arc::clone(&conn.source.port))
                .or_default()
                .push(idx);
        }

        Self {
            adjacency,
            predecessors,
            node_ids,
            by_target,
            by_source,
        }
    }

    /// Get dependencies of a node (returns Arc<str> slice)
    #[inline]
    pub fn get_dependencies(&self, node_id: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.predecessors
            .get(node_id)
            .map_or(EMPTY, SmallVec::as_slice)
    }

    /// Get successors of a node
    #[inline]
    pub fn get_successors(&self, node_id: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.adjacency
            .get(node_id)
            .map_or(EMPTY, SmallVec::as_slice)
    }

    /// Connections feeding `node_id.port`
    #[inline]
    pub fn feeds(&self, node_id: &str, port: &str) -> &[usize] {
        static EMPTY: &[usize] = &[];
        self.by_target
            .get(node_id)
            .and_then(|ports| ports.get(port))
            .map_or(EMPTY, SmallVec::as_slice)
    }

    /// Connections leaving `node_id.port`
    #[inline]
    pub fn fanout(&self, node_id: &str, port: &str) -> &[usize] {
        static EMPTY: &[usize] = &[];
        self.by_source
            .get(node_id)
            .and_then(|ports| ports.get(port))
            .map_or(EMPTY, SmallVec::as_slice)
    }

    /// Nodes without incoming connections, in Dag order
    pub fn roots(&self) -> Vec<Arc<str>> {
        self.node_ids
            .iter()
            .filter(|id| self.get_dependencies(id).is_empty())
            .cloned()
            .collect()
    }

    /// Find nodes with no successors (final nodes)
    ///
    /// Returns Arc<str> for zero-cost cloning by caller.
    pub fn get_final_nodes(&self) -> Vec<Arc<str>> {
        self.node_ids
            .iter()
            .filter(|id| self.get_successors(id).is_empty())
            .cloned()
            .collect()
    }

    #[inline]
    pub fn contains(&self, node_id: &str) -> bool {
        self.adjacency.contains_key(node_id)
    }

    /// Check if there's a path from `from` to `to` (BFS)
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        self.reachable_from(from).contains(to)
    }

    /// Every node reachable from `start`, `start` included (BFS)
    pub fn reachable_from(&self, start: &str) -> FxHashSet<Arc<str>> {
        let mut visited: FxHashSet<Arc<str>> = FxHashSet::default();
        let Some(start) = self.node_ids.iter().find(|id| &***id == start) else {
            return visited;
        };

        let mut queue: VecDeque<&Arc<str>> = VecDeque::new();
        visited.insert(Arc::clone(start));
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for neighbor in self.get_successors(current) {
                if visited.insert(Arc::clone(neighbor)) {
                    queue.push_back(neighbor);
                }
            }
        }

        visited
    }

    /// Detect cycles in the DAG using DFS with three-color marking.
    ///
    /// Returns `Ok(())` if acyclic, `Err(StructuralError::CycleDetected)` with cycle path if cycle found.
    ///
    /// Uses standard three-color algorithm:
    /// - White: unvisited
    /// - Gray: currently in DFS stack (visiting)
    /// - Black: fully processed (all descendants visited)
    ///
    /// A cycle is detected when we encounter a Gray node while traversing.
    pub fn detect_cycles(&self) -> Result<(), StructuralError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut colors: FxHashMap<Arc<str>, Color> = self
            .node_ids
            .iter()
            .map(|id| (Arc::clone(id), Color::White))
            .collect();
        let mut stack: Vec<Arc<str>> = Vec::new();

        fn dfs(
            node: Arc<str>,
            adjacency: &FxHashMap<Arc<str>, DepVec>,
            colors: &mut FxHashMap<Arc<str>, Color>,
            stack: &mut Vec<Arc<str>>,
        ) -> Result<(), String> {
            colors.insert(Arc::clone(&node), Color::Gray);
            stack.push(Arc::clone(&node));

            if let Some(neighbors) = adjacency.get(&node) {
                for neighbor in neighbors {
                    match colors.get(neighbor) {
                        Some(Color::Gray) => {
                            // Gray means the neighbor is on the current DFS path
                            let cycle_start = stack
                                .iter()
                                .position(|x| x.as_ref() == neighbor.as_ref())
                                .unwrap_or(0);
                            let cycle: Vec<&str> =
                                stack[cycle_start..].iter().map(|s| s.as_ref()).collect();
                            return Err(format!("{} → {}", cycle.join(" → "), neighbor));
                        }
                        Some(Color::White) | None => {
                            dfs(Arc::clone(neighbor), adjacency, colors, stack)?;
                        }
                        Some(Color::Black) => {}
                    }
                }
            }

            stack.pop();
            colors.insert(node, Color::Black);
            Ok(())
        }

        for node_id in &self.node_ids {
            if colors.get(node_id) == Some(&Color::White) {
                if let Err(cycle) = dfs(
                    Arc::clone(node_id),
                    &self.adjacency,
                    &mut colors,
                    &mut stack,
                ) {
                    return Err(StructuralError::CycleDetected { cycle });
                }
            }
        }

        Ok(())
    }
}
