//! Bounded backward propagation of causal influence.
//!
//! Sinks (output nodes) act as a boundary condition pinned to 1.0; influence
//! flows backward through `adjacencyᵀ · influence` for a fixed number of
//! iterations. This is reachability-weighted influence, not an eigen-solve:
//! the cap trades exactness for bounded cost and determinism.

use crate::graph::AttributionGraph;

/// Iteration cap for backward propagation.
pub const MAX_PROPAGATION_ITERATIONS: usize = 10;

/// Absolute convergence tolerance between successive iterations.
pub const CONVERGENCE_TOLERANCE: f32 = 1e-6;

/// Compute per-feature causal influence by bounded backward iteration.
///
/// Initializes influence to 1.0 on sink nodes and 0.0 elsewhere, then
/// repeats `new = adjᵀ · influence` (re-pinning sinks to 1.0 after each
/// multiply) until convergence within [`CONVERGENCE_TOLERANCE`] or
/// [`MAX_PROPAGATION_ITERATIONS`], whichever comes first. With `normalize`
/// the adjacency rows are first divided by their sums; zero rows stay zero.
///
/// Never errors: an all-zero adjacency yields all-zero influence for every
/// feature node.
///
/// # Example
///
/// ```
/// use supernode_core::{propagate_influence, AttributionGraph, NodeKey};
///
/// // 3 features, 1 sink. The sink row weights feature 0 most heavily.
/// let adjacency = vec![
///     vec![0.0, 0.0, 0.0, 0.0],
///     vec![0.0, 0.0, 0.0, 0.0],
///     vec![0.0, 0.0, 0.0, 0.0],
///     vec![0.9, 0.05, 0.02, 0.0],
/// ];
/// let nodes = (0..3).map(|i| NodeKey::new(0, i)).collect();
/// let graph = AttributionGraph::new(adjacency, nodes, 1).unwrap();
///
/// let influence = propagate_influence(&graph, true);
/// assert_eq!(influence.len(), 3);
/// assert!(influence[0] > influence[1] && influence[1] > influence[2]);
/// ```
pub fn propagate_influence(graph: &AttributionGraph, normalize: bool) -> Vec<f32> {
    let n = graph.n_nodes();
    let n_features = graph.n_features();
    if n == 0 || n_features == 0 {
        return Vec::new();
    }

    let normalized;
    let adjacency: &[Vec<f32>] = if normalize {
        normalized = graph.row_normalized();
        &normalized
    } else {
        graph.rows()
    };

    let sink_start = n_features;
    let mut influence = vec![0.0f32; n];
    for v in influence.iter_mut().skip(sink_start) {
        *v = 1.0;
    }

    for _ in 0..MAX_PROPAGATION_ITERATIONS {
        // new[i] = sum_j adj[j][i] * influence[j]: influence arriving at i
        // from the targets j it feeds.
        let mut new_influence = vec![0.0f32; n];
        for (j, row) in adjacency.iter().enumerate() {
            let inf_j = influence[j];
            if inf_j == 0.0 {
                continue;
            }
            for (i, w) in row.iter().enumerate() {
                new_influence[i] += w * inf_j;
            }
        }
        for v in new_influence.iter_mut().skip(sink_start) {
            *v = 1.0;
        }

        let converged = influence
            .iter()
            .zip(&new_influence)
            .all(|(a, b)| (a - b).abs() <= CONVERGENCE_TOLERANCE);
        influence = new_influence;
        if converged {
            break;
        }
    }

    influence.truncate(n_features);
    influence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKey;

    fn graph_with_sink_row(sink_row: [f32; 3]) -> AttributionGraph {
        let adjacency = vec![
            vec![0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![sink_row[0], sink_row[1], sink_row[2], 0.0],
        ];
        let features = (0..3).map(|i| NodeKey::new(0, i)).collect();
        AttributionGraph::new(adjacency, features, 1).unwrap()
    }

    #[test]
    fn test_sink_weights_rank_features() {
        let graph = graph_with_sink_row([0.9, 0.05, 0.02]);
        let influence = propagate_influence(&graph, true);

        assert_eq!(influence.len(), 3);
        assert!(
            influence[0] > influence[1] && influence[1] > influence[2],
            "feature 0 must rank highest: {influence:?}"
        );
        println!("[PASS] test_sink_weights_rank_features - {influence:?}");
    }

    #[test]
    fn test_all_zero_adjacency_yields_zero_influence() {
        let graph = graph_with_sink_row([0.0, 0.0, 0.0]);
        let influence = propagate_influence(&graph, true);
        assert_eq!(influence, vec![0.0, 0.0, 0.0]);

        let influence = propagate_influence(&graph, false);
        assert_eq!(influence, vec![0.0, 0.0, 0.0]);
        println!("[PASS] test_all_zero_adjacency_yields_zero_influence");
    }

    #[test]
    fn test_deterministic_across_runs() {
        let graph = graph_with_sink_row([0.4, 0.3, 0.2]);
        let a = propagate_influence(&graph, true);
        let b = propagate_influence(&graph, true);
        assert_eq!(a, b, "identical inputs must produce identical outputs");
        println!("[PASS] test_deterministic_across_runs");
    }

    #[test]
    fn test_multi_hop_propagation() {
        // f2 -> f0 -> sink: f2 gains influence through f0.
        let adjacency = vec![
            vec![0.0, 0.0, 1.0, 0.0], // f0 receives from f2
            vec![0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0, 0.0], // sink receives from f0
        ];
        let features = (0..3).map(|i| NodeKey::new(0, i)).collect();
        let graph = AttributionGraph::new(adjacency, features, 1).unwrap();

        let influence = propagate_influence(&graph, true);
        assert!(influence[0] > 0.0, "direct contributor has influence");
        assert!(influence[2] > 0.0, "2-hop contributor has influence");
        assert_eq!(influence[1], 0.0, "disconnected feature stays at zero");
        println!("[PASS] test_multi_hop_propagation - {influence:?}");
    }

    #[test]
    fn test_empty_graph_is_empty_result() {
        let graph = AttributionGraph::new(Vec::new(), Vec::new(), 0).unwrap();
        assert!(propagate_influence(&graph, true).is_empty());
        println!("[PASS] test_empty_graph_is_empty_result");
    }
}
