//! End-to-end analysis pipeline.
//!
//! One synchronous pass over a read-only input graph:
//! influence propagation, neighborhood indexing, seed selection, per-seed
//! growth with a shared ownership table, a quality filter on the grown
//! clusters, residual bucketing of what remains admitted-but-unowned,
//! overlap merging, and coverage accounting. Re-running on identical inputs
//! yields an identical [`AnalysisResult`].

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clustering::cluster::{ComputationalCluster, SemanticCluster};
use crate::clustering::growth::GrowthEngine;
use crate::clustering::merge::merge_clusters;
use crate::clustering::ownership::OwnershipTable;
use crate::clustering::residual::ResidualClusterer;
use crate::clustering::seed::{find_output_anchor, select_seeds};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::{propagate_influence, AttributionGraph, NeighborhoodIndex};
use crate::scoring::{CoherenceEvaluator, CompatibilityScorer};
use crate::types::{AdmissionThresholds, NodeKey, StatsMap};

/// Post-growth quality gate on semantic clusters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityFilter {
    /// Minimum member count a grown cluster must keep.
    pub min_final_size: usize,
    /// Minimum final coherence a grown cluster must keep.
    pub min_final_coherence: f32,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self {
            min_final_size: 3,
            min_final_coherence: 0.45,
        }
    }
}

impl QualityFilter {
    /// Validate parameter ranges.
    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0..=1.0).contains(&self.min_final_coherence) {
            return Err(EngineError::invalid_parameter(format!(
                "min_final_coherence must be in [0.0, 1.0], got {}",
                self.min_final_coherence
            )));
        }
        Ok(())
    }

    /// Whether a grown cluster passes the gate.
    pub fn accepts(&self, cluster: &SemanticCluster) -> bool {
        cluster.len() >= self.min_final_size
            && cluster.final_coherence >= self.min_final_coherence
    }
}

/// Coverage accounting over the whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    /// Feature nodes in the graph.
    pub total_nodes: usize,
    /// Nodes owned by a surviving semantic cluster.
    pub nodes_in_semantic: usize,
    /// Nodes in a computational cluster.
    pub nodes_in_computational: usize,
    /// Union of the two memberships.
    pub nodes_covered: usize,
    /// Admitted nodes left in no cluster (processable residue).
    pub admitted_unclustered: usize,
    /// Graph nodes never admitted.
    pub never_admitted: usize,
    /// `nodes_covered / total_nodes`, percent.
    pub coverage_pct: f32,
    /// `nodes_in_semantic / total_nodes`, percent.
    pub quality_coverage_pct: f32,
    /// Mean final coherence over surviving semantic clusters.
    pub semantic_avg_coherence: f32,
    /// Distinct dominant tokens per computational member.
    pub computational_token_diversity: f32,
}

/// Full pipeline output. `BTreeMap` keys give a stable serialization order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Surviving semantic clusters, keyed `SN_{i}` where `i` is the creation
    /// ordinal. The map iterates lexicographically over the key strings.
    pub semantic: BTreeMap<String, SemanticCluster>,
    /// Merged computational clusters, keyed `COMP_{i}` where `i` is the
    /// signature-order ordinal. Iteration is lexicographic over the keys.
    pub computational: BTreeMap<String, ComputationalCluster>,
    /// Run-level coverage accounting.
    pub coverage: CoverageStats,
}

/// One configured analysis over a read-only graph and its statistics.
pub struct SupernodeAnalysis {
    graph: AttributionGraph,
    stats: StatsMap,
    admitted: HashSet<NodeKey>,
    thresholds: AdmissionThresholds,
    config: EngineConfig,
}

impl SupernodeAnalysis {
    /// Create an analysis. `admitted` is the calibrated node set; nodes
    /// outside it never enter any cluster. `thresholds` are carried along
    /// from calibration for reporting and residual tier defaults.
    pub fn new(
        graph: AttributionGraph,
        stats: StatsMap,
        admitted: HashSet<NodeKey>,
        thresholds: AdmissionThresholds,
        config: EngineConfig,
    ) -> Self {
        Self {
            graph,
            stats,
            admitted,
            thresholds,
            config,
        }
    }

    /// Admission thresholds this analysis was calibrated with.
    pub fn thresholds(&self) -> &AdmissionThresholds {
        &self.thresholds
    }

    /// Run the full pipeline.
    pub fn run(&self) -> EngineResult<AnalysisResult> {
        self.config.validate()?;
        let cfg = &self.config;

        // Stage 1: backward influence propagation from the sinks.
        let influence_vec = propagate_influence(&self.graph, cfg.graph.normalize_influence);
        let influence: HashMap<NodeKey, f32> = self
            .graph
            .feature_keys()
            .iter()
            .copied()
            .zip(influence_vec)
            .collect();
        info!(nodes = influence.len(), "influence propagated");

        // Stage 2: neighborhood index over strong edges.
        let neighbors =
            NeighborhoodIndex::build(&self.graph, cfg.graph.tau_edge_strong, cfg.graph.top_k);

        // Stage 3: seed ordering, with the output anchor promoted to the
        // front when one is configured and found.
        let mut seeds = select_seeds(&self.admitted, &self.stats, &influence, &cfg.seeds);
        if let Some(sink) = cfg.graph.output_anchor_sink {
            if let Some(anchor) =
                find_output_anchor(&self.graph, &self.stats, sink, cfg.graph.tau_edge)
            {
                debug!(anchor = %anchor, sink, "output anchor promoted to first seed");
                seeds.retain(|s| *s != anchor);
                seeds.insert(0, anchor);
            }
        }
        info!(seeds = seeds.len(), "seeds selected");

        // Stage 4: per-seed growth against the shared ownership table.
        let scorer = CompatibilityScorer::new(
            &self.graph,
            &neighbors,
            &self.stats,
            &cfg.tokens,
            cfg.compatibility,
            cfg.graph.tau_edge_strong,
        );
        let coherence = CoherenceEvaluator::new(
            &self.graph,
            &self.stats,
            cfg.coherence,
            cfg.graph.tau_edge,
        );
        let engine = GrowthEngine::new(
            &self.graph,
            &neighbors,
            &self.stats,
            scorer,
            coherence,
            cfg.growth,
        );

        let mut ownership = OwnershipTable::new();
        let mut grown: Vec<SemanticCluster> = Vec::new();
        for seed in seeds {
            if ownership.is_owned(seed) {
                continue;
            }
            if let Some(cluster) = engine.try_grow(seed, grown.len(), &mut ownership) {
                grown.push(cluster);
            }
        }
        info!(clusters = grown.len(), "growth complete");

        // Stage 5: quality filter; rejected clusters release their members
        // so the residual stage can still claim them.
        let mut semantic_clusters: Vec<SemanticCluster> = Vec::new();
        for cluster in grown {
            if cfg.quality.accepts(&cluster) {
                semantic_clusters.push(cluster);
            } else {
                debug!(
                    seed = %cluster.seed,
                    size = cluster.len(),
                    coherence = cluster.final_coherence,
                    "semantic cluster rejected by quality filter"
                );
                GrowthEngine::release_cluster(&cluster, &mut ownership);
            }
        }

        // Stage 6: residual bucketing over admitted-but-unowned nodes.
        let mut residuals: Vec<NodeKey> = self
            .admitted
            .iter()
            .copied()
            .filter(|k| !ownership.is_owned(*k))
            .collect();
        residuals.sort();

        let clusterer = ResidualClusterer::new(
            &self.graph,
            &self.stats,
            &influence,
            &cfg.tokens,
            cfg.graph.tau_edge,
            cfg.residual,
        );
        let buckets = clusterer.cluster(&residuals);

        // Stage 7: overlap merge.
        let computational_clusters = merge_clusters(buckets, cfg.merge.jaccard_threshold);
        info!(
            semantic = semantic_clusters.len(),
            computational = computational_clusters.len(),
            "clustering complete"
        );

        // Stage 8: coverage accounting and keyed output.
        let coverage = self.coverage(&semantic_clusters, &computational_clusters);

        let semantic = semantic_clusters
            .into_iter()
            .enumerate()
            .map(|(i, c)| (format!("SN_{i}"), c))
            .collect();
        let computational = computational_clusters
            .into_iter()
            .enumerate()
            .map(|(i, c)| (format!("COMP_{i}"), c))
            .collect();

        Ok(AnalysisResult {
            semantic,
            computational,
            coverage,
        })
    }

    fn coverage(
        &self,
        semantic: &[SemanticCluster],
        computational: &[ComputationalCluster],
    ) -> CoverageStats {
        let total_nodes = self.graph.n_features();

        let semantic_members: HashSet<NodeKey> = semantic
            .iter()
            .flat_map(|c| c.members.iter().copied())
            .collect();
        let computational_members: HashSet<NodeKey> = computational
            .iter()
            .flat_map(|c| c.members.iter().copied())
            .collect();
        let covered: HashSet<NodeKey> = semantic_members
            .union(&computational_members)
            .copied()
            .collect();

        let admitted_unclustered = self
            .admitted
            .iter()
            .filter(|k| !covered.contains(k))
            .count();
        let never_admitted = self
            .graph
            .feature_keys()
            .iter()
            .filter(|k| !self.admitted.contains(k))
            .count();

        let pct = |n: usize| {
            if total_nodes == 0 {
                0.0
            } else {
                n as f32 / total_nodes as f32 * 100.0
            }
        };

        let semantic_avg_coherence = if semantic.is_empty() {
            0.0
        } else {
            semantic.iter().map(|c| c.final_coherence).sum::<f32>() / semantic.len() as f32
        };

        let computational_token_diversity = if computational_members.is_empty() {
            0.0
        } else {
            let tokens: HashSet<&str> = computational_members
                .iter()
                .filter_map(|k| self.stats.get(k))
                .map(|s| s.dominant_token.as_str())
                .collect();
            tokens.len() as f32 / computational_members.len() as f32
        };

        CoverageStats {
            total_nodes,
            nodes_in_semantic: semantic_members.len(),
            nodes_in_computational: computational_members.len(),
            nodes_covered: covered.len(),
            admitted_unclustered,
            never_admitted,
            coverage_pct: pct(covered.len()),
            quality_coverage_pct: pct(semantic_members.len()),
            semantic_avg_coherence,
            computational_token_diversity,
        }
    }
}
