//! Validated adjacency matrix over an ordered node index.
//!
//! The matrix is dense row-major, entry `(target, source)` a signed causal
//! weight. Feature nodes occupy the first `n_features` positions in matrix
//! order; sink (output) nodes are appended at the end. The matrix is fixed
//! for the duration of one analysis run; nothing in the engine mutates it.

use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::types::NodeKey;

/// Directed, weighted causal graph between feature and sink nodes.
///
/// Construction is the single fail-fast point of the engine: a matrix whose
/// shape contradicts the declared node counts is rejected before any
/// clustering begins.
///
/// # Example
///
/// ```
/// use supernode_core::{AttributionGraph, NodeKey};
///
/// // 2 features + 1 sink. Row = target, column = source.
/// let adjacency = vec![
///     vec![0.0, 0.2, 0.0],
///     vec![0.0, 0.0, 0.0],
///     vec![0.9, 0.1, 0.0],
/// ];
/// let nodes = vec![NodeKey::new(0, 1), NodeKey::new(1, 4)];
/// let graph = AttributionGraph::new(adjacency, nodes, 1).unwrap();
///
/// assert_eq!(graph.n_features(), 2);
/// assert_eq!(graph.edge(NodeKey::new(0, 1), NodeKey::new(1, 4)), Some(0.2));
/// ```
#[derive(Debug, Clone)]
pub struct AttributionGraph {
    adjacency: Vec<Vec<f32>>,
    features: Vec<NodeKey>,
    index: HashMap<NodeKey, usize>,
    n_sinks: usize,
}

impl AttributionGraph {
    /// Build a graph from a square adjacency matrix and the ordered feature
    /// keys. Sink nodes occupy the trailing `n_sinks` matrix positions and
    /// carry no keys.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ShapeMismatch`] if the matrix is not
    ///   `(features + sinks)` square.
    /// - [`EngineError::DuplicateNode`] if a feature key appears twice.
    pub fn new(
        adjacency: Vec<Vec<f32>>,
        features: Vec<NodeKey>,
        n_sinks: usize,
    ) -> EngineResult<Self> {
        let expected = features.len() + n_sinks;
        if adjacency.len() != expected {
            return Err(EngineError::ShapeMismatch {
                rows: adjacency.len(),
                cols: adjacency.first().map_or(0, Vec::len),
                expected,
            });
        }
        for row in &adjacency {
            if row.len() != expected {
                return Err(EngineError::ShapeMismatch {
                    rows: adjacency.len(),
                    cols: row.len(),
                    expected,
                });
            }
        }

        let mut index = HashMap::with_capacity(features.len());
        for (i, key) in features.iter().enumerate() {
            if index.insert(*key, i).is_some() {
                return Err(EngineError::DuplicateNode {
                    key: key.to_string(),
                });
            }
        }

        Ok(Self {
            adjacency,
            features,
            index,
            n_sinks,
        })
    }

    /// Total node count (features + sinks).
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of feature nodes.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Number of sink (output) nodes.
    #[inline]
    pub fn n_sinks(&self) -> usize {
        self.n_sinks
    }

    /// Raw weight by matrix position. Row = target, column = source.
    #[inline]
    pub fn weight(&self, target: usize, source: usize) -> f32 {
        self.adjacency[target][source]
    }

    /// Matrix position of a feature key, if present in this graph.
    #[inline]
    pub fn index_of(&self, key: NodeKey) -> Option<usize> {
        self.index.get(&key).copied()
    }

    /// Feature key at a matrix position, if it is a feature node.
    #[inline]
    pub fn key_at(&self, idx: usize) -> Option<NodeKey> {
        self.features.get(idx).copied()
    }

    /// Ordered feature keys (matrix order).
    #[inline]
    pub fn feature_keys(&self) -> &[NodeKey] {
        &self.features
    }

    /// Signed edge weight from `source` to `target`, by key.
    ///
    /// Returns `None` when either node is absent from the graph; callers
    /// treat that as missing causal data, not an error.
    pub fn edge(&self, target: NodeKey, source: NodeKey) -> Option<f32> {
        let t = self.index_of(target)?;
        let s = self.index_of(source)?;
        Some(self.adjacency[t][s])
    }

    /// Edge weights from every feature into the given sink, or `None` for an
    /// out-of-range sink index.
    pub fn edges_into_sink(&self, sink: usize) -> Option<&[f32]> {
        if sink >= self.n_sinks {
            return None;
        }
        let row = &self.adjacency[self.features.len() + sink];
        Some(&row[..self.features.len()])
    }

    /// Row-normalized copy of the matrix (each row divided by its sum).
    ///
    /// Rows summing to zero are left as zero rows; there is no division
    /// by zero and no NaN in the result for finite inputs.
    pub fn row_normalized(&self) -> Vec<Vec<f32>> {
        self.adjacency
            .iter()
            .map(|row| {
                let sum: f32 = row.iter().sum();
                if sum == 0.0 {
                    row.clone()
                } else {
                    row.iter().map(|w| w / sum).collect()
                }
            })
            .collect()
    }

    /// Raw matrix rows.
    #[inline]
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.adjacency
    }

    /// Fraction of ordered member pairs (excluding self) connected by an
    /// edge with |w| > `tau_edge`.
    ///
    /// Members absent from the graph are skipped. Sets of one resolvable
    /// member or fewer score 1.0 (a single node is trivially dense).
    pub fn internal_edge_density(&self, members: &[NodeKey], tau_edge: f32) -> f32 {
        let indices: Vec<usize> = members.iter().filter_map(|k| self.index_of(*k)).collect();
        let n = indices.len();
        if n <= 1 {
            return 1.0;
        }

        let mut strong_pairs = 0usize;
        for &t in &indices {
            for &s in &indices {
                if t != s && self.adjacency[t][s].abs() > tau_edge {
                    strong_pairs += 1;
                }
            }
        }
        strong_pairs as f32 / (n * (n - 1)) as f32
    }
}
