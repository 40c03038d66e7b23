//! Cluster record types.
//!
//! Semantic clusters come out of seeded growth; computational clusters out
//! of residual bucketing. They are distinct tagged structs rather than one
//! loosely-typed record so the two output families cannot be confused or
//! silently miskeyed downstream.

use serde::{Deserialize, Serialize};

use crate::types::NodeKey;

/// A grown supernode: one seed plus the members accepted around it.
///
/// Mutated only by the growth loop (appending, or removing the most recent
/// member on rollback); immutable once growth terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticCluster {
    /// The seed the cluster grew from; always the first member.
    pub seed: NodeKey,
    /// Unique members in acceptance order.
    pub members: Vec<NodeKey>,
    /// Coherence after each acceptance; starts at 1.0 for the bare seed.
    pub coherence_history: Vec<f32>,
    /// Accumulated influence: seed output impact plus
    /// `consistency x compatibility` per accepted member.
    pub influence_score: f32,
    /// Last entry of `coherence_history`.
    pub final_coherence: f32,
    /// Number of accepted growth steps (`coherence_history.len() - 1`).
    pub growth_iterations: usize,
}

impl SemanticCluster {
    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the cluster has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `key` belongs to this cluster.
    #[inline]
    pub fn contains(&self, key: NodeKey) -> bool {
        self.members.contains(&key)
    }
}

/// A residual bucket promoted to a cluster, with aggregate metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationalCluster {
    /// Structural signature: `layer-group x token x causal-tier` (literal
    /// token for structural/frequent tokens, `RARE` otherwise).
    pub signature: String,
    /// Members, sorted by node key.
    pub members: Vec<NodeKey>,
    /// Member count.
    pub n_members: usize,
    /// Mean member layer.
    pub avg_layer: f32,
    /// Most frequent dominant token among members.
    pub dominant_token: String,
    /// Mean member consistency.
    pub avg_consistency: f32,
    /// Internal strong-edge density of the member set.
    pub causal_connectivity: f32,
    /// Mean propagated influence of members.
    pub avg_influence: f32,
}

impl ComputationalCluster {
    /// Whether `key` belongs to this cluster.
    #[inline]
    pub fn contains(&self, key: NodeKey) -> bool {
        self.members.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_cluster_serializes_with_named_fields() {
        let cluster = SemanticCluster {
            seed: NodeKey::new(3, 7),
            members: vec![NodeKey::new(3, 7), NodeKey::new(4, 1)],
            coherence_history: vec![1.0, 0.72],
            influence_score: 0.9,
            final_coherence: 0.72,
            growth_iterations: 1,
        };
        let json = serde_json::to_value(&cluster).expect("serialize");
        assert_eq!(json["growth_iterations"], 1);
        assert_eq!(json["members"].as_array().unwrap().len(), 2);
        assert!(cluster.contains(NodeKey::new(4, 1)));
        println!("[PASS] test_semantic_cluster_serializes_with_named_fields");
    }
}
