//! Coherence of a candidate cluster.
//!
//! Four factors: consistency homogeneity, token diversity (targeting ~50%
//! distinct tokens, neither monolithic nor scattered), layer-span
//! compactness, and internal causal edge density. A single-member cluster is
//! perfectly coherent by definition.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::graph::AttributionGraph;
use crate::types::{NodeKey, StatsMap};

/// Relative weights of the coherence factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoherenceWeights {
    /// Consistency homogeneity across members.
    pub consistency: f32,
    /// Token diversity around the 0.5 target.
    pub diversity: f32,
    /// Layer-span compactness.
    pub span: f32,
    /// Internal causal edge density.
    pub density: f32,
}

impl Default for CoherenceWeights {
    fn default() -> Self {
        Self {
            consistency: 0.30,
            diversity: 0.20,
            span: 0.20,
            density: 0.30,
        }
    }
}

impl CoherenceWeights {
    /// Validate all weights lie in [0, 1].
    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("consistency", self.consistency),
            ("diversity", self.diversity),
            ("span", self.span),
            ("density", self.density),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::invalid_parameter(format!(
                    "coherence weight {name} must be in [0.0, 1.0], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Per-factor breakdown of one coherence evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoherenceBreakdown {
    /// `max(0, 1 - sample_std(consistencies))`.
    pub consistency_homogeneity: f32,
    /// `max(0, 1 - |distinct_ratio - 0.5|)`.
    pub token_diversity: f32,
    /// `max(0, 1 - layer_span / 15)`.
    pub layer_compactness: f32,
    /// Strong ordered-pair fraction.
    pub edge_density: f32,
}

/// Evaluates coherence of arbitrary member sets.
pub struct CoherenceEvaluator<'a> {
    graph: &'a AttributionGraph,
    stats: &'a StatsMap,
    weights: CoherenceWeights,
    tau_edge: f32,
}

impl<'a> CoherenceEvaluator<'a> {
    /// Create an evaluator over shared read-only inputs.
    pub fn new(
        graph: &'a AttributionGraph,
        stats: &'a StatsMap,
        weights: CoherenceWeights,
        tau_edge: f32,
    ) -> Self {
        Self {
            graph,
            stats,
            weights,
            tau_edge,
        }
    }

    /// Coherence of `members` in [0, 1] with the factor breakdown.
    ///
    /// Missing statistics contribute neutral zeros; the call never fails.
    pub fn evaluate(&self, members: &[NodeKey]) -> (f32, CoherenceBreakdown) {
        if members.len() <= 1 {
            return (
                1.0,
                CoherenceBreakdown {
                    consistency_homogeneity: 1.0,
                    token_diversity: 1.0,
                    layer_compactness: 1.0,
                    edge_density: 1.0,
                },
            );
        }

        let consistencies: Vec<f32> = members
            .iter()
            .map(|k| self.stats.get(k).map_or(0.0, |s| s.consistency()))
            .collect();
        let tokens: Vec<&str> = members
            .iter()
            .map(|k| self.stats.get(k).map_or("", |s| s.dominant_token.as_str()))
            .collect();
        let layers: Vec<u32> = members.iter().map(|k| k.layer).collect();

        let breakdown = CoherenceBreakdown {
            consistency_homogeneity: (1.0 - sample_std(&consistencies)).max(0.0),
            token_diversity: token_diversity(&tokens),
            layer_compactness: layer_compactness(&layers),
            edge_density: self.graph.internal_edge_density(members, self.tau_edge),
        };

        let w = &self.weights;
        let total = breakdown.consistency_homogeneity * w.consistency
            + breakdown.token_diversity * w.diversity
            + breakdown.layer_compactness * w.span
            + breakdown.edge_density * w.density;
        (total, breakdown)
    }
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two
/// values.
fn sample_std(values: &[f32]) -> f32 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / n as f32;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / (n - 1) as f32;
    variance.sqrt()
}

/// Distance of the distinct-token ratio from the 0.5 target.
fn token_diversity(tokens: &[&str]) -> f32 {
    let distinct: std::collections::HashSet<&&str> = tokens.iter().collect();
    let ratio = distinct.len() as f32 / tokens.len() as f32;
    (1.0 - (ratio - 0.5).abs()).max(0.0)
}

/// Layer span mapped to [0, 1] with a 15-layer decay.
fn layer_compactness(layers: &[u32]) -> f32 {
    let min = layers.iter().min().copied().unwrap_or(0);
    let max = layers.iter().max().copied().unwrap_or(0);
    (1.0 - (max - min) as f32 / 15.0).max(0.0)
}
