//! Temporal graph engine powered by petgraph.
//!
//! Materializes the parent→child event forest as a weighted directed graph
//! and runs shortest-path search over it. Edge weight is the child's
//! duration in minutes, so the minimum-weight path between two events is the
//! minimum-total-duration chain of influence.
//!
//! The graph is rebuilt per analytics call from the then-current event set;
//! there is no cache and no persisted graph.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;

/// Shortest-path result: the node sequence from source to target inclusive
/// and the cumulative edge weight in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    pub path: Vec<Uuid>,
    pub total_minutes: i64,
}

/// Weighted directed graph over the event set.
///
/// Nodes are event ids; an edge runs parent→child with the child's duration
/// as its weight. Every event id appears as a node even if it has no
/// children, so isolated events are still reachable targets.
pub struct TemporalGraph {
    graph: DiGraph<Uuid, i64>,
    node_map: HashMap<Uuid, NodeIndex>,
}

impl TemporalGraph {
    /// Build the graph from the full event set.
    ///
    /// An edge is added only when both endpoints are present; a dangling
    /// parent reference (possible when analytics race a running ingestion
    /// job) is skipped rather than invented.
    pub fn from_events(events: &[Event]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::with_capacity(events.len());

        for event in events {
            let idx = graph.add_node(event.event_id);
            node_map.insert(event.event_id, idx);
        }

        for event in events {
            if let Some(parent_id) = event.parent_event_id {
                if let (Some(&parent), Some(&child)) =
                    (node_map.get(&parent_id), node_map.get(&event.event_id))
                {
                    graph.add_edge(parent, child, event.duration_minutes());
                }
            }
        }

        Self { graph, node_map }
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check whether an event id is present.
    pub fn has_node(&self, event_id: &Uuid) -> bool {
        self.node_map.contains_key(event_id)
    }

    /// Dijkstra search from `source` to `target` along parent→child edges.
    ///
    /// Returns `None` when either id is unknown or `target` is unreachable
    /// from `source`. Equal-distance frontier entries are popped in
    /// insertion order, so one run over one snapshot is deterministic.
    /// Callers reject `source == target` before reaching the engine.
    pub fn shortest_path(&self, source: Uuid, target: Uuid) -> Option<PathResult> {
        let start = *self.node_map.get(&source)?;
        let goal = *self.node_map.get(&target)?;

        let mut dist: HashMap<NodeIndex, i64> = HashMap::new();
        let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut heap = BinaryHeap::new();
        let mut seq = 0u64;

        dist.insert(start, 0);
        heap.push(Frontier {
            cost: 0,
            seq,
            node: start,
        });

        while let Some(Frontier { cost, node, .. }) = heap.pop() {
            if node == goal {
                let mut path = vec![self.graph[goal]];
                let mut current = goal;
                while let Some(&parent) = prev.get(&current) {
                    path.push(self.graph[parent]);
                    current = parent;
                }
                path.reverse();
                return Some(PathResult {
                    path,
                    total_minutes: cost,
                });
            }

            // Stale heap entry: a shorter route to this node was found
            // after this one was pushed.
            if dist.get(&node).map_or(false, |&best| cost > best) {
                continue;
            }

            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                let next = edge.target();
                let next_cost = cost + *edge.weight();
                if dist.get(&next).map_or(true, |&best| next_cost < best) {
                    dist.insert(next, next_cost);
                    prev.insert(next, node);
                    seq += 1;
                    heap.push(Frontier {
                        cost: next_cost,
                        seq,
                        node: next,
                    });
                }
            }
        }

        None
    }
}

/// Dijkstra frontier entry: min-heap by cost, then by insertion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frontier {
    cost: i64,
    seq: u64,
    node: NodeIndex,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
