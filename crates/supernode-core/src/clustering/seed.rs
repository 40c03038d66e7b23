//! Seed selection: composite priority ranking with diversification.
//!
//! Priority rewards nodes that respond to probes, carry propagated causal
//! influence, and impact the output directly. The ranked list is then
//! diversified so later seeds cover new `(layer, position)` territory
//! instead of re-seeding the same neighborhood.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::graph::AttributionGraph;
use crate::types::{NodeKey, StatsMap};

/// Parameters for seed selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedParams {
    /// Hard cap on the number of seeds returned.
    pub max_seeds: usize,
    /// The first N ranked candidates bypass diversification.
    pub always_keep: usize,
    /// Scale factor on probe response.
    pub probe_scale: f32,
    /// Scale factor on output impact.
    pub output_scale: f32,
    /// Scale factor on |propagated influence|.
    pub influence_scale: f32,
}

impl Default for SeedParams {
    fn default() -> Self {
        Self {
            max_seeds: 50,
            always_keep: 20,
            probe_scale: 1.0,
            output_scale: 100.0,
            influence_scale: 50.0,
        }
    }
}

impl SeedParams {
    /// Validate parameter ranges.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_seeds == 0 {
            return Err(EngineError::invalid_parameter(
                "max_seeds must be >= 1, got 0",
            ));
        }
        for (name, value) in [
            ("probe_scale", self.probe_scale),
            ("output_scale", self.output_scale),
            ("influence_scale", self.influence_scale),
        ] {
            if value < 0.0 {
                return Err(EngineError::invalid_parameter(format!(
                    "{name} must be >= 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Rank admitted nodes and return a diversified seed ordering.
///
/// Priority per node:
/// `probe_response x probe_scale + output_impact x output_scale +
/// |influence| x influence_scale`, descending (ties by node key so the
/// ordering is deterministic). The first `always_keep` survive unfiltered;
/// after that a candidate is admitted only if its `(layer, position)` pair
/// has not been seen, until `max_seeds`.
///
/// Nodes without statistics are skipped; they cannot seed growth.
pub fn select_seeds(
    admitted: &HashSet<NodeKey>,
    stats: &StatsMap,
    influence: &HashMap<NodeKey, f32>,
    params: &SeedParams,
) -> Vec<NodeKey> {
    let mut scored: Vec<(NodeKey, f32)> = admitted
        .iter()
        .filter_map(|key| {
            let s = stats.get(key)?;
            let node_influence = influence.get(key).copied().unwrap_or(0.0);
            let priority = s.probe_response * params.probe_scale
                + s.output_impact * params.output_scale
                + node_influence.abs() * params.influence_scale;
            Some((*key, priority))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut selected = Vec::new();
    let mut seen_pairs: HashSet<(u32, Option<u32>)> = HashSet::new();

    for (key, priority) in scored {
        if selected.len() >= params.max_seeds {
            break;
        }
        let position = stats.get(&key).and_then(|s| s.position);
        let pair = (key.layer, position);

        if selected.len() < params.always_keep {
            seen_pairs.insert(pair);
            selected.push(key);
        } else if seen_pairs.insert(pair) {
            debug!(seed = %key, priority, "diversified seed admitted");
            selected.push(key);
        }
    }

    selected
}

/// Find the feature with the strongest edge into the given sink, preferring
/// features anchored at the final token position.
///
/// The final position is the maximum position present in `stats`. When no
/// final-position feature has a positive edge into the sink, the search
/// falls back to all features. Returns `None` when the sink index is out of
/// range or the best edge does not exceed `tau_edge`.
///
/// Used to promote an output-anchor seed (the feature that directly drives
/// the target logit) to the head of the seed list.
pub fn find_output_anchor(
    graph: &AttributionGraph,
    stats: &StatsMap,
    sink: usize,
    tau_edge: f32,
) -> Option<NodeKey> {
    let edges = graph.edges_into_sink(sink)?;
    let final_position = stats.values().filter_map(|s| s.position).max()?;

    let best_over = |restrict_final: bool| -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &w) in edges.iter().enumerate() {
            if restrict_final {
                let key = graph.key_at(i)?;
                let at_final = stats
                    .get(&key)
                    .and_then(|s| s.position)
                    .is_some_and(|p| p == final_position);
                if !at_final {
                    continue;
                }
            }
            // Strictly greater keeps the lowest index on ties.
            if best.map_or(true, |(_, bw)| w > bw) {
                best = Some((i, w));
            }
        }
        best
    };

    let mut best = best_over(true);
    if best.map_or(true, |(_, w)| w <= 0.0) {
        best = best_over(false);
    }

    let (idx, weight) = best?;
    if weight < tau_edge {
        return None;
    }
    graph.key_at(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeStats;

    fn key(layer: u32, idx: u32) -> NodeKey {
        NodeKey::new(layer, idx)
    }

    fn stats_entry(layer: u32, position: u32, probe: f32, output: f32) -> NodeStats {
        NodeStats {
            layer,
            position: Some(position),
            probe_response: probe,
            output_impact: output,
            ..Default::default()
        }
    }

    #[test]
    fn test_priority_orders_by_composite_score() {
        let mut stats = StatsMap::new();
        stats.insert(key(0, 0), stats_entry(0, 0, 0.0, 0.5)); // 50.0
        stats.insert(key(1, 1), stats_entry(1, 1, 120.0, 0.0)); // 120.0
        stats.insert(key(2, 2), stats_entry(2, 2, 0.0, 0.0)); // influence only

        let mut influence = HashMap::new();
        influence.insert(key(2, 2), -2.0f32); // |.| * 50 = 100.0

        let admitted: HashSet<NodeKey> = stats.keys().copied().collect();
        let seeds = select_seeds(&admitted, &stats, &influence, &SeedParams::default());

        assert_eq!(seeds, vec![key(1, 1), key(2, 2), key(0, 0)]);
        println!("[PASS] test_priority_orders_by_composite_score - {seeds:?}");
    }

    #[test]
    fn test_diversification_requires_unseen_layer_position_pair() {
        let params = SeedParams {
            always_keep: 1,
            max_seeds: 10,
            ..Default::default()
        };

        let mut stats = StatsMap::new();
        // Three candidates sharing (layer 0, pos 0), one novel pair.
        stats.insert(key(0, 0), stats_entry(0, 0, 100.0, 0.0));
        stats.insert(key(0, 1), stats_entry(0, 0, 90.0, 0.0));
        stats.insert(key(0, 2), stats_entry(0, 0, 80.0, 0.0));
        stats.insert(key(3, 3), stats_entry(3, 7, 70.0, 0.0));

        let admitted: HashSet<NodeKey> = stats.keys().copied().collect();
        let seeds = select_seeds(&admitted, &stats, &HashMap::new(), &params);

        // First kept unconditionally; duplicates of its pair rejected; the
        // novel (3, 7) pair admitted.
        assert_eq!(seeds, vec![key(0, 0), key(3, 3)]);
        println!("[PASS] test_diversification_requires_unseen_layer_position_pair");
    }

    #[test]
    fn test_max_seeds_cap() {
        let mut stats = StatsMap::new();
        for i in 0..30 {
            stats.insert(key(i, i), stats_entry(i, i, (30 - i) as f32, 0.0));
        }
        let admitted: HashSet<NodeKey> = stats.keys().copied().collect();
        let params = SeedParams {
            max_seeds: 5,
            ..Default::default()
        };
        let seeds = select_seeds(&admitted, &stats, &HashMap::new(), &params);
        assert_eq!(seeds.len(), 5);
        println!("[PASS] test_max_seeds_cap");
    }

    #[test]
    fn test_nodes_without_stats_are_skipped() {
        let admitted: HashSet<NodeKey> = [key(0, 0)].into();
        let seeds = select_seeds(
            &admitted,
            &StatsMap::new(),
            &HashMap::new(),
            &SeedParams::default(),
        );
        assert!(seeds.is_empty());
        println!("[PASS] test_nodes_without_stats_are_skipped");
    }

    #[test]
    fn test_find_output_anchor_prefers_final_position() {
        // 3 features + 1 sink; sink row favors f0, but f0 is mid-prompt.
        let adjacency = vec![
            vec![0.0; 4],
            vec![0.0; 4],
            vec![0.0; 4],
            vec![0.9, 0.4, 0.0, 0.0],
        ];
        let features = vec![key(0, 0), key(1, 1), key(2, 2)];
        let graph = AttributionGraph::new(adjacency, features, 1).unwrap();

        let mut stats = StatsMap::new();
        stats.insert(key(0, 0), stats_entry(0, 3, 0.0, 0.0));
        stats.insert(key(1, 1), stats_entry(1, 9, 0.0, 0.0)); // final position
        stats.insert(key(2, 2), stats_entry(2, 9, 0.0, 0.0));

        // f1 wins: strongest edge among final-position features.
        let anchor = find_output_anchor(&graph, &stats, 0, 0.01);
        assert_eq!(anchor, Some(key(1, 1)));

        // Out-of-range sink.
        assert_eq!(find_output_anchor(&graph, &stats, 5, 0.01), None);
        println!("[PASS] test_find_output_anchor_prefers_final_position");
    }

    #[test]
    fn test_find_output_anchor_falls_back_and_thresholds() {
        let adjacency = vec![
            vec![0.0; 3],
            vec![0.0; 3],
            vec![0.05, 0.0, 0.0],
        ];
        let features = vec![key(0, 0), key(1, 1)];
        let graph = AttributionGraph::new(adjacency, features, 1).unwrap();

        let mut stats = StatsMap::new();
        stats.insert(key(0, 0), stats_entry(0, 2, 0.0, 0.0));
        stats.insert(key(1, 1), stats_entry(1, 5, 0.0, 0.0)); // final, no edge

        // No positive edge at the final position -> fall back to f0.
        assert_eq!(find_output_anchor(&graph, &stats, 0, 0.01), Some(key(0, 0)));
        // Best edge below tau -> no anchor.
        assert_eq!(find_output_anchor(&graph, &stats, 0, 0.1), None);
        println!("[PASS] test_find_output_anchor_falls_back_and_thresholds");
    }
}
