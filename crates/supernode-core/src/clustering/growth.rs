//! Seeded greedy cluster growth.
//!
//! Each seed grows one causal neighborhood. Growth is transactional: the
//! seed and every accepted candidate are claimed in the ownership table as
//! they are added, and the whole attempt either commits (two or more
//! members) or releases everything it claimed back to the pool. The first
//! few iterations are a causal warm-up that only follows strong direct
//! edges to the seed; after warm-up, candidates are scored with the full
//! causal+semantic compatibility and each acceptance is gated by cluster
//! coherence, rolling back the addition that breaks it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clustering::cluster::SemanticCluster;
use crate::clustering::ownership::OwnershipTable;
use crate::error::{EngineError, EngineResult};
use crate::graph::{AttributionGraph, NeighborhoodIndex};
use crate::scoring::{CoherenceEvaluator, CompatibilityScorer};
use crate::types::{NodeKey, StatsMap};

/// Parameters of the growth state machine.
///
/// Values are NOT auto-clamped; call [`GrowthParams::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthParams {
    /// Upper bound on growth iterations per seed.
    pub max_iterations: usize,
    /// Number of initial warm-up iterations.
    pub bootstrap_iterations: usize,
    /// Coherence floor; an acceptance dropping below it is rolled back and
    /// growth terminates. Only enforced after warm-up.
    pub min_coherence: f32,
    /// Acceptance threshold during warm-up.
    pub bootstrap_threshold: f32,
    /// Acceptance threshold after warm-up.
    pub acceptance_threshold: f32,
    /// Minimum direct candidate→seed edge weight admitted during warm-up.
    pub bootstrap_edge_gate: f32,
    /// Scale mapping a warm-up edge weight to a comparable score.
    pub bootstrap_edge_scale: f32,
    /// Weight discount for second-hop candidates (warm-up only).
    pub second_hop_discount: f32,
}

impl Default for GrowthParams {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            bootstrap_iterations: 5,
            min_coherence: 0.35,
            bootstrap_threshold: 0.25,
            acceptance_threshold: 0.35,
            bootstrap_edge_gate: 0.03,
            bootstrap_edge_scale: 10.0,
            second_hop_discount: 0.5,
        }
    }
}

impl GrowthParams {
    /// Set the coherence floor.
    #[must_use]
    pub fn with_min_coherence(mut self, min_coherence: f32) -> Self {
        self.min_coherence = min_coherence;
        self
    }

    /// Set the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_iterations == 0 {
            return Err(EngineError::invalid_parameter(
                "max_iterations must be >= 1, got 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_coherence) {
            return Err(EngineError::invalid_parameter(format!(
                "min_coherence must be in [0.0, 1.0], got {}",
                self.min_coherence
            )));
        }
        if !(0.0..=1.0).contains(&self.second_hop_discount) {
            return Err(EngineError::invalid_parameter(format!(
                "second_hop_discount must be in [0.0, 1.0], got {}",
                self.second_hop_discount
            )));
        }
        if self.bootstrap_edge_scale <= 0.0 {
            return Err(EngineError::invalid_parameter(format!(
                "bootstrap_edge_scale must be > 0, got {}",
                self.bootstrap_edge_scale
            )));
        }
        Ok(())
    }
}

/// Grows one cluster per seed, against shared read-only inputs and the
/// run-wide ownership table.
pub struct GrowthEngine<'a> {
    graph: &'a AttributionGraph,
    neighbors: &'a NeighborhoodIndex,
    stats: &'a StatsMap,
    scorer: CompatibilityScorer<'a>,
    coherence: CoherenceEvaluator<'a>,
    params: GrowthParams,
}

impl<'a> GrowthEngine<'a> {
    /// Create a growth engine.
    pub fn new(
        graph: &'a AttributionGraph,
        neighbors: &'a NeighborhoodIndex,
        stats: &'a StatsMap,
        scorer: CompatibilityScorer<'a>,
        coherence: CoherenceEvaluator<'a>,
        params: GrowthParams,
    ) -> Self {
        Self {
            graph,
            neighbors,
            stats,
            scorer,
            coherence,
            params,
        }
    }

    /// Attempt to grow a cluster from `seed`, claiming nodes under
    /// `cluster_ordinal` in `ownership`.
    ///
    /// Returns `None` without side effects when the seed is already owned,
    /// and `None` after releasing the seed when growth stalls below two
    /// members; the seed stays available for residual clustering. On
    /// success every member is owned by `cluster_ordinal`.
    pub fn try_grow(
        &self,
        seed: NodeKey,
        cluster_ordinal: usize,
        ownership: &mut OwnershipTable,
    ) -> Option<SemanticCluster> {
        if !ownership.claim(seed, cluster_ordinal) {
            return None;
        }

        let mut members = vec![seed];
        let mut coherence_history = vec![1.0f32];
        let mut influence_score = self.stats.get(&seed).map_or(0.0, |s| s.output_impact);

        for iteration in 0..self.params.max_iterations {
            let warm_up = iteration < self.params.bootstrap_iterations;

            let pool = self.candidate_pool(&members, warm_up, ownership);
            let Some((candidate, score)) = self.best_candidate(seed, &pool, warm_up) else {
                trace!(seed = %seed, iteration, "no qualifying candidate, growth stops");
                break;
            };

            members.push(candidate);
            ownership.claim(candidate, cluster_ordinal);
            influence_score +=
                self.stats.get(&candidate).map_or(0.0, |s| s.consistency()) * score;

            let (new_coherence, _) = self.coherence.evaluate(&members);
            coherence_history.push(new_coherence);

            if !warm_up && new_coherence < self.params.min_coherence {
                debug!(
                    seed = %seed,
                    coherence = new_coherence,
                    floor = self.params.min_coherence,
                    "coherence floor breached, rolling back last member"
                );
                if let Some(removed) = members.pop() {
                    ownership.release(removed);
                }
                coherence_history.pop();
                break;
            }
        }

        if members.len() < 2 {
            // Insufficient growth: the attempt is abandoned and the seed
            // goes back to the pool.
            ownership.release(seed);
            debug!(seed = %seed, "insufficient growth, seed released");
            return None;
        }

        let final_coherence = coherence_history.last().copied().unwrap_or(1.0);
        let growth_iterations = coherence_history.len() - 1;
        Some(SemanticCluster {
            seed,
            members,
            coherence_history,
            influence_score,
            final_coherence,
            growth_iterations,
        })
    }

    /// Release every member of a cluster (post-filter rejection path).
    pub fn release_cluster(cluster: &SemanticCluster, ownership: &mut OwnershipTable) {
        for member in &cluster.members {
            ownership.release(*member);
        }
    }

    /// Candidate pool for one iteration: parents of all current members,
    /// plus discounted parents-of-parents during warm-up. Owned nodes,
    /// current members and nodes without statistics are excluded. Keyed map
    /// keeps the strongest edge weight per candidate and yields a
    /// deterministic iteration order.
    fn candidate_pool(
        &self,
        members: &[NodeKey],
        warm_up: bool,
        ownership: &OwnershipTable,
    ) -> BTreeMap<NodeKey, f32> {
        let mut pool: BTreeMap<NodeKey, f32> = BTreeMap::new();

        for member in members {
            if let Some(hood) = self.neighbors.get(*member) {
                for (parent, weight) in &hood.top_parents {
                    let entry = pool.entry(*parent).or_insert(f32::MIN);
                    *entry = entry.max(*weight);
                }
            }
        }

        if warm_up && !pool.is_empty() {
            let first_hop: Vec<NodeKey> = pool.keys().copied().collect();
            for parent in first_hop {
                if let Some(hood) = self.neighbors.get(parent) {
                    for (grandparent, weight) in &hood.top_parents {
                        let discounted = weight * self.params.second_hop_discount;
                        let entry = pool.entry(*grandparent).or_insert(f32::MIN);
                        // First-hop weights keep priority over discounted
                        // second-hop ones.
                        *entry = entry.max(discounted);
                    }
                }
            }
        }

        pool.retain(|key, _| {
            !ownership.is_owned(*key) && !members.contains(key) && self.stats.contains_key(key)
        });
        pool
    }

    /// Highest-scoring candidate above the phase threshold, or `None`.
    /// Equal scores keep the first (lowest-keyed) candidate.
    fn best_candidate(
        &self,
        seed: NodeKey,
        pool: &BTreeMap<NodeKey, f32>,
        warm_up: bool,
    ) -> Option<(NodeKey, f32)> {
        let threshold = if warm_up {
            self.params.bootstrap_threshold
        } else {
            self.params.acceptance_threshold
        };

        let mut best: Option<(NodeKey, f32)> = None;
        for candidate in pool.keys() {
            let score = if warm_up {
                // Warm-up only follows direct edges into the seed.
                match self.graph.edge(seed, *candidate) {
                    Some(w) if w > self.params.bootstrap_edge_gate => {
                        w * self.params.bootstrap_edge_scale
                    }
                    _ => continue,
                }
            } else {
                self.scorer.score(seed, *candidate).0
            };

            if score > threshold && best.map_or(true, |(_, b)| score > b) {
                best = Some((*candidate, score));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{CoherenceWeights, CompatibilityWeights, TokenClasses};
    use crate::types::NodeStats;

    fn key(layer: u32, idx: u32) -> NodeKey {
        NodeKey::new(layer, idx)
    }

    fn stats_entry(layer: u32, position: u32, token: &str, consistency: f32) -> NodeStats {
        NodeStats {
            layer,
            position: Some(position),
            mean_consistency: consistency,
            dominant_token: token.to_string(),
            ..Default::default()
        }
    }

    /// Chain graph: f1 -> f0, f2 -> f1, f3 -> f2, all strong edges, plus a
    /// sink fed by f0. Stats are homogeneous so coherence stays high.
    struct Fixture {
        graph: AttributionGraph,
        stats: StatsMap,
        tokens: TokenClasses,
    }

    fn fixture() -> Fixture {
        let adjacency = vec![
            vec![0.0, 0.40, 0.00, 0.00, 0.0],
            vec![0.0, 0.00, 0.40, 0.00, 0.0],
            vec![0.0, 0.00, 0.00, 0.40, 0.0],
            vec![0.0, 0.00, 0.00, 0.00, 0.0],
            vec![0.9, 0.00, 0.00, 0.00, 0.0],
        ];
        let features = vec![key(8, 0), key(7, 1), key(6, 2), key(5, 3)];
        let graph = AttributionGraph::new(adjacency, features, 1).unwrap();

        let mut stats = StatsMap::new();
        stats.insert(key(8, 0), stats_entry(8, 4, "Austin", 0.8));
        stats.insert(key(7, 1), stats_entry(7, 4, "Texas", 0.8));
        stats.insert(key(6, 2), stats_entry(6, 3, "Texas", 0.8));
        stats.insert(key(5, 3), stats_entry(5, 3, "Dallas", 0.8));

        let tokens = TokenClasses::with_default_structural()
            .with_entity(["Austin", "Texas", "Dallas"]);

        Fixture {
            graph,
            stats,
            tokens,
        }
    }

    fn engine<'a>(fx: &'a Fixture, neighbors: &'a NeighborhoodIndex, params: GrowthParams) -> GrowthEngine<'a> {
        let scorer = CompatibilityScorer::new(
            &fx.graph,
            neighbors,
            &fx.stats,
            &fx.tokens,
            CompatibilityWeights::default(),
            0.05,
        );
        let coherence =
            CoherenceEvaluator::new(&fx.graph, &fx.stats, CoherenceWeights::default(), 0.01);
        GrowthEngine::new(&fx.graph, neighbors, &fx.stats, scorer, coherence, params)
    }

    #[test]
    fn test_chain_grows_from_seed() {
        let fx = fixture();
        let neighbors = NeighborhoodIndex::build(&fx.graph, 0.05, 5);
        let eng = engine(&fx, &neighbors, GrowthParams::default());

        let mut ownership = OwnershipTable::new();
        let cluster = eng
            .try_grow(key(8, 0), 0, &mut ownership)
            .expect("chain must grow");

        assert_eq!(cluster.seed, key(8, 0));
        assert!(cluster.len() >= 2, "members: {:?}", cluster.members);
        // Iteration 1 must accept the direct strong parent f1.
        assert_eq!(cluster.members[1], key(7, 1));
        assert_eq!(cluster.growth_iterations, cluster.coherence_history.len() - 1);
        assert_eq!(cluster.final_coherence, *cluster.coherence_history.last().unwrap());
        // All members owned by this cluster ordinal.
        for m in &cluster.members {
            assert_eq!(ownership.owner(*m), Some(0));
        }
        println!(
            "[PASS] test_chain_grows_from_seed - {} members, coherence {:.3}",
            cluster.len(),
            cluster.final_coherence
        );
    }

    #[test]
    fn test_owned_seed_is_skipped_without_side_effects() {
        let fx = fixture();
        let neighbors = NeighborhoodIndex::build(&fx.graph, 0.05, 5);
        let eng = engine(&fx, &neighbors, GrowthParams::default());

        let mut ownership = OwnershipTable::new();
        ownership.claim(key(8, 0), 99);
        assert!(eng.try_grow(key(8, 0), 0, &mut ownership).is_none());
        assert_eq!(ownership.owner(key(8, 0)), Some(99));
        assert_eq!(ownership.len(), 1);
        println!("[PASS] test_owned_seed_is_skipped_without_side_effects");
    }

    #[test]
    fn test_isolated_seed_is_released() {
        let fx = fixture();
        let neighbors = NeighborhoodIndex::build(&fx.graph, 0.05, 5);
        let eng = engine(&fx, &neighbors, GrowthParams::default());

        let mut ownership = OwnershipTable::new();
        // f3 has no parents at all: growth stalls at one member.
        let result = eng.try_grow(key(5, 3), 0, &mut ownership);
        assert!(result.is_none());
        assert!(
            !ownership.is_owned(key(5, 3)),
            "discarded seed must be released"
        );
        assert!(ownership.is_empty());
        println!("[PASS] test_isolated_seed_is_released");
    }

    #[test]
    fn test_coherence_rollback_removes_last_member() {
        let fx = fixture();
        let neighbors = NeighborhoodIndex::build(&fx.graph, 0.05, 5);
        // No warm-up and an impossibly high floor: the first post-seed
        // acceptance must be rolled back, leaving a 1-member cluster that is
        // then discarded and fully released.
        let params = GrowthParams {
            bootstrap_iterations: 0,
            min_coherence: 0.99,
            ..Default::default()
        };
        let eng = engine(&fx, &neighbors, params);

        let mut ownership = OwnershipTable::new();
        let result = eng.try_grow(key(8, 0), 0, &mut ownership);
        assert!(result.is_none());
        assert!(ownership.is_empty(), "rollback + discard releases everything");
        println!("[PASS] test_coherence_rollback_removes_last_member");
    }

    #[test]
    fn test_growth_is_deterministic() {
        let fx = fixture();
        let neighbors = NeighborhoodIndex::build(&fx.graph, 0.05, 5);
        let eng = engine(&fx, &neighbors, GrowthParams::default());

        let mut own_a = OwnershipTable::new();
        let mut own_b = OwnershipTable::new();
        let a = eng.try_grow(key(8, 0), 0, &mut own_a);
        let b = eng.try_grow(key(8, 0), 0, &mut own_b);
        assert_eq!(a, b);
        println!("[PASS] test_growth_is_deterministic");
    }

    #[test]
    fn test_used_nodes_are_not_candidates() {
        let fx = fixture();
        let neighbors = NeighborhoodIndex::build(&fx.graph, 0.05, 5);
        let eng = engine(&fx, &neighbors, GrowthParams::default());

        let mut ownership = OwnershipTable::new();
        // Another cluster already owns f1, the seed's only direct parent.
        ownership.claim(key(7, 1), 42);

        let result = eng.try_grow(key(8, 0), 0, &mut ownership);
        if let Some(cluster) = &result {
            assert!(!cluster.contains(key(7, 1)), "owned node must be excluded");
        }
        assert_eq!(ownership.owner(key(7, 1)), Some(42));
        println!("[PASS] test_used_nodes_are_not_candidates - {result:?}");
    }

    #[test]
    fn test_params_validation() {
        assert!(GrowthParams::default().validate().is_ok());
        assert!(GrowthParams::default()
            .with_min_coherence(1.5)
            .validate()
            .is_err());
        assert!(GrowthParams::default()
            .with_max_iterations(0)
            .validate()
            .is_err());
        println!("[PASS] test_params_validation");
    }
}
