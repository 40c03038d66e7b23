//! Residual bucketing: computational role clusters for admitted nodes no
//! semantic cluster claimed.
//!
//! Every residual node gets a structural signature made of three factors:
//! layer group, token (literal for structural and frequent semantic tokens,
//! `RARE` otherwise) and causal tier. Nodes sharing a signature form one
//! bucket. Buckets below the minimum size are dropped, the rest are
//! promoted to [`ComputationalCluster`]s with aggregate metadata.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clustering::cluster::ComputationalCluster;
use crate::error::{EngineError, EngineResult};
use crate::graph::AttributionGraph;
use crate::scoring::TokenClasses;
use crate::types::{NodeKey, StatsMap};

/// Parameters of residual signature construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidualParams {
    /// Buckets smaller than this are dropped.
    pub min_cluster_size: usize,
    /// Layers per layer group.
    pub layer_group_span: u32,
    /// |influence| above this is the HIGH causal tier.
    pub tau_causal_high: f32,
    /// |influence| above this (and below high) is the MED tier.
    pub tau_causal_med: f32,
    /// Absolute floor on the token frequency that makes a token "semantic".
    pub min_semantic_frequency: usize,
    /// Relative frequency divisor: a token is semantic when its count
    /// reaches `max(min_semantic_frequency, n_residuals / divisor)`.
    pub semantic_frequency_divisor: usize,
}

impl Default for ResidualParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            layer_group_span: 3,
            tau_causal_high: 0.1,
            tau_causal_med: 0.01,
            min_semantic_frequency: 3,
            semantic_frequency_divisor: 50,
        }
    }
}

impl ResidualParams {
    /// Validate parameter ranges.
    pub fn validate(&self) -> EngineResult<()> {
        if self.layer_group_span == 0 {
            return Err(EngineError::invalid_parameter(
                "layer_group_span must be >= 1, got 0",
            ));
        }
        if self.semantic_frequency_divisor == 0 {
            return Err(EngineError::invalid_parameter(
                "semantic_frequency_divisor must be >= 1, got 0",
            ));
        }
        if self.tau_causal_med > self.tau_causal_high {
            return Err(EngineError::invalid_parameter(format!(
                "tau_causal_med ({}) must not exceed tau_causal_high ({})",
                self.tau_causal_med, self.tau_causal_high
            )));
        }
        Ok(())
    }
}

/// Buckets residual nodes by structural signature.
pub struct ResidualClusterer<'a> {
    graph: &'a AttributionGraph,
    stats: &'a StatsMap,
    influence: &'a HashMap<NodeKey, f32>,
    tokens: &'a TokenClasses,
    tau_edge: f32,
    params: ResidualParams,
}

impl<'a> ResidualClusterer<'a> {
    /// Create a residual clusterer.
    pub fn new(
        graph: &'a AttributionGraph,
        stats: &'a StatsMap,
        influence: &'a HashMap<NodeKey, f32>,
        tokens: &'a TokenClasses,
        tau_edge: f32,
        params: ResidualParams,
    ) -> Self {
        Self {
            graph,
            stats,
            influence,
            tokens,
            tau_edge,
            params,
        }
    }

    /// Cluster `residuals` into computational clusters, sorted by signature.
    ///
    /// Nodes without statistics are ignored. Buckets smaller than
    /// `min_cluster_size` are dropped, their members staying unclustered.
    pub fn cluster(&self, residuals: &[NodeKey]) -> Vec<ComputationalCluster> {
        let semantic_tokens = self.detect_semantic_tokens(residuals);

        // BTreeMap keyed by signature string: stable bucket ordering.
        let mut buckets: BTreeMap<String, Vec<NodeKey>> = BTreeMap::new();
        for &key in residuals {
            let Some(node_stats) = self.stats.get(&key) else {
                continue;
            };
            let signature = self.signature(key, &node_stats.dominant_token, &semantic_tokens);
            buckets.entry(signature).or_default().push(key);
        }

        let mut clusters = Vec::new();
        for (signature, mut members) in buckets {
            if members.len() < self.params.min_cluster_size {
                debug!(
                    signature,
                    size = members.len(),
                    "residual bucket below minimum size, dropped"
                );
                continue;
            }
            members.sort();
            clusters.push(self.promote(signature, members));
        }
        clusters
    }

    /// Tokens frequent among the residuals themselves (and not structural)
    /// count as semantic for signature purposes, regardless of the
    /// configured entity/relational classes.
    fn detect_semantic_tokens(&self, residuals: &[NodeKey]) -> HashSet<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for key in residuals {
            if let Some(s) = self.stats.get(key) {
                if !s.dominant_token.is_empty() {
                    *counts.entry(s.dominant_token.as_str()).or_insert(0) += 1;
                }
            }
        }

        let floor = self
            .params
            .min_semantic_frequency
            .max(residuals.len() / self.params.semantic_frequency_divisor);

        counts
            .into_iter()
            .filter(|(token, count)| {
                *count >= floor && !self.tokens.structural.contains(*token)
            })
            .map(|(token, _)| token.to_string())
            .collect()
    }

    fn signature(&self, key: NodeKey, token: &str, semantic: &HashSet<String>) -> String {
        let span = self.params.layer_group_span;
        let lo = (key.layer / span) * span;
        let hi = lo + span - 1;

        // Structural and frequent semantic tokens keep their literal token
        // in the signature; only infrequent tokens collapse into RARE.
        let token_class = if self.tokens.structural.contains(token) || semantic.contains(token) {
            token
        } else {
            "RARE"
        };

        let magnitude = self
            .influence
            .get(&key)
            .copied()
            .unwrap_or(0.0)
            .abs();
        let tier = if magnitude > self.params.tau_causal_high {
            "HIGH"
        } else if magnitude > self.params.tau_causal_med {
            "MED"
        } else {
            "LOW"
        };

        format!("L{lo}-{hi}_{token_class}_{tier}")
    }

    fn promote(&self, signature: String, members: Vec<NodeKey>) -> ComputationalCluster {
        let n = members.len();
        let n_f = n as f32;

        let avg_layer = members.iter().map(|k| k.layer as f32).sum::<f32>() / n_f;

        let mut token_counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut consistency_sum = 0.0f32;
        for key in &members {
            if let Some(s) = self.stats.get(key) {
                *token_counts.entry(s.dominant_token.as_str()).or_insert(0) += 1;
                consistency_sum += s.consistency();
            }
        }
        // Highest count wins; the BTreeMap gives lexicographic token order
        // on ties.
        let dominant_token = token_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(token, _)| (*token).to_string())
            .unwrap_or_default();

        let avg_influence = members
            .iter()
            .map(|k| self.influence.get(k).copied().unwrap_or(0.0))
            .sum::<f32>()
            / n_f;

        ComputationalCluster {
            causal_connectivity: self.graph.internal_edge_density(&members, self.tau_edge),
            signature,
            members,
            n_members: n,
            avg_layer,
            dominant_token,
            avg_consistency: consistency_sum / n_f,
            avg_influence,
        }
    }
}
