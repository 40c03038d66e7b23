//! Per-node causal neighborhood extraction.
//!
//! For each feature node, records how many strong edges enter and leave it
//! and the top-K strongest parents (incoming) and children (outgoing) over
//! the feature submatrix. Degrees count edges by magnitude; the top lists
//! keep only excitatory (positive) edges above the threshold, so inhibitory
//! links never enter candidate pools or neighbor sets. Ordering is explicit
//! (weight descending, then node index ascending) so results are identical
//! across platforms and hash-map iteration orders.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::graph::AttributionGraph;
use crate::types::NodeKey;

/// Causal neighborhood of a single feature node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeNeighborhood {
    /// Count of incoming edges with |w| > `tau_edge_strong`.
    pub in_degree: usize,
    /// Count of outgoing edges with |w| > `tau_edge_strong`.
    pub out_degree: usize,
    /// Strongest excitatory incoming edges `(source, weight)`, self-loops
    /// excluded.
    pub top_parents: Vec<(NodeKey, f32)>,
    /// Strongest excitatory outgoing edges `(target, weight)`, self-loops
    /// excluded.
    pub top_children: Vec<(NodeKey, f32)>,
}

/// Index of causal neighborhoods for every feature node in a graph.
#[derive(Debug, Clone, Default)]
pub struct NeighborhoodIndex {
    map: HashMap<NodeKey, NodeNeighborhood>,
}

impl NeighborhoodIndex {
    /// Build the index over the feature submatrix of `graph`.
    ///
    /// Degrees count edges whose magnitude exceeds `tau_edge_strong`; the
    /// top lists keep at most `top_k` positive entries above the same bar.
    pub fn build(graph: &AttributionGraph, tau_edge_strong: f32, top_k: usize) -> Self {
        let n_features = graph.n_features();
        let mut map = HashMap::with_capacity(n_features);

        for i in 0..n_features {
            let mut in_degree = 0usize;
            let mut out_degree = 0usize;
            let mut incoming: Vec<(usize, f32)> = Vec::new();
            let mut outgoing: Vec<(usize, f32)> = Vec::new();

            for j in 0..n_features {
                if j != i {
                    let w_in = graph.weight(i, j);
                    if w_in.abs() > tau_edge_strong {
                        in_degree += 1;
                    }
                    if w_in > tau_edge_strong {
                        incoming.push((j, w_in));
                    }
                    let w_out = graph.weight(j, i);
                    if w_out.abs() > tau_edge_strong {
                        out_degree += 1;
                    }
                    if w_out > tau_edge_strong {
                        outgoing.push((j, w_out));
                    }
                }
            }

            if let Some(key) = graph.key_at(i) {
                map.insert(
                    key,
                    NodeNeighborhood {
                        in_degree,
                        out_degree,
                        top_parents: take_top(incoming, top_k, graph),
                        top_children: take_top(outgoing, top_k, graph),
                    },
                );
            }
        }

        Self { map }
    }

    /// Neighborhood of a node, if it is a feature node of the graph.
    #[inline]
    pub fn get(&self, key: NodeKey) -> Option<&NodeNeighborhood> {
        self.map.get(&key)
    }

    /// Union of a node's parents and children, for Jaccard comparison.
    /// Empty for nodes absent from the index.
    pub fn neighbor_set(&self, key: NodeKey) -> HashSet<NodeKey> {
        let mut set = HashSet::new();
        if let Some(hood) = self.map.get(&key) {
            set.extend(hood.top_parents.iter().map(|(k, _)| *k));
            set.extend(hood.top_children.iter().map(|(k, _)| *k));
        }
        set
    }

    /// Number of indexed nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Stable top-K: weight descending, then node index ascending. Callers
/// pass only positive weights.
fn take_top(
    mut edges: Vec<(usize, f32)>,
    top_k: usize,
    graph: &AttributionGraph,
) -> Vec<(NodeKey, f32)> {
    edges.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    edges
        .into_iter()
        .take(top_k)
        .filter_map(|(idx, w)| graph.key_at(idx).map(|k| (k, w)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: u32) -> NodeKey {
        NodeKey::new(0, i)
    }

    fn test_graph() -> AttributionGraph {
        // 4 features, no sinks. Row = target, column = source.
        let adjacency = vec![
            vec![0.5, 0.2, 0.06, 0.2], // f0 <- f1 (0.2), f0 <- f2 (0.06), f0 <- f3 (0.2)
            vec![0.0, 0.0, 0.0, 0.0],
            vec![0.3, 0.0, 0.0, 0.0],  // f2 <- f0
            vec![0.0, 0.01, 0.0, 0.0],
        ];
        let features = (0..4).map(key).collect();
        AttributionGraph::new(adjacency, features, 0).unwrap()
    }

    #[test]
    fn test_degrees_count_strong_edges_only() {
        let graph = test_graph();
        let index = NeighborhoodIndex::build(&graph, 0.05, 5);

        let f0 = index.get(key(0)).unwrap();
        // Incoming above 0.05: f1 (0.2), f2 (0.06), f3 (0.2). Self-loop 0.5
        // is excluded.
        assert_eq!(f0.in_degree, 3);
        // Outgoing above 0.05: only f2 <- f0 (0.3).
        assert_eq!(f0.out_degree, 1);
        println!("[PASS] test_degrees_count_strong_edges_only");
    }

    #[test]
    fn test_tie_break_is_weight_then_index() {
        let graph = test_graph();
        let index = NeighborhoodIndex::build(&graph, 0.05, 5);

        let parents = &index.get(key(0)).unwrap().top_parents;
        // f1 and f3 tie at 0.2; the lower index wins, then f2 at 0.06.
        assert_eq!(parents[0].0, key(1));
        assert_eq!(parents[1].0, key(3));
        assert_eq!(parents[2].0, key(2));
        println!("[PASS] test_tie_break_is_weight_then_index - {parents:?}");
    }

    #[test]
    fn test_top_k_truncation() {
        let graph = test_graph();
        let index = NeighborhoodIndex::build(&graph, 0.05, 2);
        let parents = &index.get(key(0)).unwrap().top_parents;
        assert_eq!(parents.len(), 2);
        println!("[PASS] test_top_k_truncation");
    }

    #[test]
    fn test_inhibitory_edges_count_toward_degree_but_not_top_lists() {
        // f0 <- f1 is strongly inhibitory (-0.5), f0 <- f2 excitatory (0.2).
        let adjacency = vec![
            vec![0.0, -0.5, 0.2],
            vec![0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0],
        ];
        let features = (0..3).map(key).collect();
        let graph = AttributionGraph::new(adjacency, features, 0).unwrap();
        let index = NeighborhoodIndex::build(&graph, 0.05, 5);

        let f0 = index.get(key(0)).unwrap();
        assert_eq!(f0.in_degree, 2, "degree counts by magnitude");
        assert_eq!(f0.top_parents.len(), 1, "only the excitatory parent survives");
        assert_eq!(f0.top_parents[0].0, key(2));

        let set = index.neighbor_set(key(0));
        assert!(!set.contains(&key(1)), "inhibitory source must not be a neighbor");
        assert!(set.contains(&key(2)));
        println!("[PASS] test_inhibitory_edges_count_toward_degree_but_not_top_lists");
    }

    #[test]
    fn test_neighbor_set_unions_parents_and_children() {
        let graph = test_graph();
        let index = NeighborhoodIndex::build(&graph, 0.05, 5);

        let set = index.neighbor_set(key(0));
        assert!(set.contains(&key(1)));
        assert!(set.contains(&key(2))); // both parent (0.06) and child (0.3)
        assert!(set.contains(&key(3)));
        assert_eq!(set.len(), 3);

        assert!(index.neighbor_set(key(99)).is_empty());
        println!("[PASS] test_neighbor_set_unions_parents_and_children");
    }
}
