//! Causal + semantic compatibility between two nodes.
//!
//! The score combines a causal sub-score (direct edge, shared neighborhood,
//! position proximity) with a semantic sub-score (token class, layer
//! proximity, consistency proximity). When causal data is unavailable for
//! either node, the causal side degrades to position proximity alone;
//! missing data is never an error.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::graph::{AttributionGraph, NeighborhoodIndex};
use crate::types::{NodeKey, StatsMap};

/// Relative weights of the compatibility signals.
///
/// `causal` splits the total between the causal and semantic sub-scores
/// (semantic weight is `1 - causal`). The remaining fields are the relative
/// weights *within* each sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityWeights {
    /// Share of the causal sub-score in the total.
    pub causal: f32,
    /// Causal: direct candidate→anchor edge strength.
    pub direct_edge: f32,
    /// Causal: Jaccard similarity of neighbor sets.
    pub neighborhood: f32,
    /// Causal: token-position proximity.
    pub position: f32,
    /// Semantic: token-class compatibility.
    pub token: f32,
    /// Semantic: layer proximity.
    pub layer: f32,
    /// Semantic: consistency proximity.
    pub consistency: f32,
}

impl Default for CompatibilityWeights {
    fn default() -> Self {
        Self {
            causal: 0.60,
            direct_edge: 0.42,
            neighborhood: 0.33,
            position: 0.25,
            token: 0.50,
            layer: 0.25,
            consistency: 0.25,
        }
    }
}

impl CompatibilityWeights {
    /// Set the causal share of the total score.
    #[must_use]
    pub fn with_causal(mut self, causal: f32) -> Self {
        self.causal = causal;
        self
    }

    /// Validate all weights lie in [0, 1].
    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in [
            ("causal", self.causal),
            ("direct_edge", self.direct_edge),
            ("neighborhood", self.neighborhood),
            ("position", self.position),
            ("token", self.token),
            ("layer", self.layer),
            ("consistency", self.consistency),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::invalid_parameter(format!(
                    "compatibility weight {name} must be in [0.0, 1.0], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Prompt-domain token vocabulary used by scoring and residual bucketing.
///
/// The entity and relational classes drive the 0.8 / 0.7 token-compatibility
/// tiers; structural tokens anchor residual signatures. All three are
/// configuration: the engine carries no baked-in vocabulary beyond the
/// grammatical structural defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenClasses {
    /// Domain entity tokens (e.g. the prompt's named entities).
    pub entity: HashSet<String>,
    /// Relational/grammatical connective tokens.
    pub relational: HashSet<String>,
    /// Structural tokens kept literal in residual signatures.
    pub structural: HashSet<String>,
}

impl TokenClasses {
    /// Structural defaults: grammatical and positional tokens that recur in
    /// every prompt.
    pub fn with_default_structural() -> Self {
        Self {
            structural: ["<BOS>", ":", ".", "the", "of", "is", "in", "a", "and"]
                .into_iter()
                .map(String::from)
                .collect(),
            ..Default::default()
        }
    }

    /// Replace the entity class.
    #[must_use]
    pub fn with_entity<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the relational class.
    #[must_use]
    pub fn with_relational<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relational = tokens.into_iter().map(Into::into).collect();
        self
    }
}

/// Per-signal breakdown of one compatibility score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Weighted causal sub-score.
    pub causal: f32,
    /// Weighted semantic sub-score.
    pub semantic: f32,
    /// Direct-edge signal before weighting.
    pub direct_edge: f32,
    /// Neighborhood Jaccard before weighting.
    pub neighborhood: f32,
    /// Position proximity before weighting.
    pub position: f32,
    /// Token-class compatibility before weighting.
    pub token: f32,
    /// Layer proximity before weighting.
    pub layer: f32,
    /// Consistency proximity before weighting.
    pub consistency: f32,
    /// True when causal data was missing and the causal sub-score fell back
    /// to position proximity alone.
    pub causal_fallback: bool,
}

/// Scores candidate nodes against a cluster anchor.
pub struct CompatibilityScorer<'a> {
    graph: &'a AttributionGraph,
    neighbors: &'a NeighborhoodIndex,
    stats: &'a StatsMap,
    tokens: &'a TokenClasses,
    weights: CompatibilityWeights,
    tau_edge_strong: f32,
}

impl<'a> CompatibilityScorer<'a> {
    /// Create a scorer over shared read-only inputs.
    pub fn new(
        graph: &'a AttributionGraph,
        neighbors: &'a NeighborhoodIndex,
        stats: &'a StatsMap,
        tokens: &'a TokenClasses,
        weights: CompatibilityWeights,
        tau_edge_strong: f32,
    ) -> Self {
        Self {
            graph,
            neighbors,
            stats,
            tokens,
            weights,
            tau_edge_strong,
        }
    }

    /// Compatibility of `candidate` with `anchor`, in [0, 1], with the
    /// per-signal breakdown. Missing statistics default to 0.
    pub fn score(&self, anchor: NodeKey, candidate: NodeKey) -> (f32, ScoreBreakdown) {
        let w = &self.weights;
        let mut breakdown = ScoreBreakdown::default();

        let anchor_pos = self.position_of(anchor);
        let cand_pos = self.position_of(candidate);
        breakdown.position = position_proximity(anchor_pos, cand_pos);

        let causal = match self.graph.edge(anchor, candidate) {
            Some(edge_weight) => {
                breakdown.direct_edge = self.direct_edge_score(edge_weight);
                breakdown.neighborhood = self.neighbor_jaccard(anchor, candidate);
                breakdown.direct_edge * w.direct_edge
                    + breakdown.neighborhood * w.neighborhood
                    + breakdown.position * w.position
            }
            None => {
                // No adjacency entry for one of the nodes: position-only
                // causal fallback.
                breakdown.causal_fallback = true;
                breakdown.position
            }
        };

        breakdown.token = self.token_compatibility(anchor, candidate);
        breakdown.layer = layer_proximity(anchor.layer, candidate.layer);
        breakdown.consistency = self.consistency_proximity(anchor, candidate);
        let semantic = breakdown.token * w.token
            + breakdown.layer * w.layer
            + breakdown.consistency * w.consistency;

        breakdown.causal = causal * w.causal;
        breakdown.semantic = semantic * (1.0 - w.causal);
        let total = breakdown.causal + breakdown.semantic;
        (total, breakdown)
    }

    /// Edge strength normalized by the strong-edge threshold, clamped to
    /// [0, 1]. Edges above twice the threshold get a further x1.5 boost,
    /// still capped at 1.0. Inhibitory (negative) edges contribute nothing.
    fn direct_edge_score(&self, edge_weight: f32) -> f32 {
        if self.tau_edge_strong <= 0.0 {
            return 0.0;
        }
        let mut score = (edge_weight / self.tau_edge_strong).clamp(0.0, 1.0);
        if edge_weight > 2.0 * self.tau_edge_strong {
            score = (score * 1.5).min(1.0);
        }
        score
    }

    fn neighbor_jaccard(&self, a: NodeKey, b: NodeKey) -> f32 {
        let set_a = self.neighbors.neighbor_set(a);
        let set_b = self.neighbors.neighbor_set(b);
        let union = set_a.union(&set_b).count();
        if union == 0 {
            return 0.0;
        }
        set_a.intersection(&set_b).count() as f32 / union as f32
    }

    fn token_compatibility(&self, a: NodeKey, b: NodeKey) -> f32 {
        let token_a = self.token_of(a);
        let token_b = self.token_of(b);
        if !token_a.is_empty() && token_a == token_b {
            1.0
        } else if self.tokens.entity.contains(token_a) && self.tokens.entity.contains(token_b) {
            0.8
        } else if self.tokens.relational.contains(token_a)
            && self.tokens.relational.contains(token_b)
        {
            0.7
        } else {
            0.3
        }
    }

    fn consistency_proximity(&self, a: NodeKey, b: NodeKey) -> f32 {
        let ca = self.stats.get(&a).map_or(0.0, |s| s.consistency());
        let cb = self.stats.get(&b).map_or(0.0, |s| s.consistency());
        (1.0 - (ca - cb).abs()).max(0.0)
    }

    fn position_of(&self, key: NodeKey) -> u32 {
        self.stats
            .get(&key)
            .and_then(|s| s.position)
            .unwrap_or(0)
    }

    fn token_of(&self, key: NodeKey) -> &str {
        self.stats
            .get(&key)
            .map_or("", |s| s.dominant_token.as_str())
    }
}

/// `max(0, 1 - |a - b| / 5)` over token positions.
fn position_proximity(a: u32, b: u32) -> f32 {
    let distance = a.abs_diff(b) as f32;
    (1.0 - distance / 5.0).max(0.0)
}

/// `max(0, 1 - |a - b| / 10)` over layers.
fn layer_proximity(a: u32, b: u32) -> f32 {
    let distance = a.abs_diff(b) as f32;
    (1.0 - distance / 10.0).max(0.0)
}
