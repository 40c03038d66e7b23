//! # supernode-core
//!
//! Clustering engine for neural-network attribution graphs. Takes a dense
//! signed adjacency over feature nodes (plus terminal sink nodes), per-node
//! interpretability statistics and a calibrated admission set, and produces
//! two families of clusters:
//!
//! - **semantic clusters** (supernodes): grown greedily around
//!   high-priority seeds, gated by causal+semantic compatibility and
//!   cluster coherence;
//! - **computational clusters**: signature buckets over the admitted nodes
//!   no supernode claimed, merged by member overlap.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   SupernodeAnalysis                     │
//! │                                                         │
//! │  AttributionGraph ──> propagate_influence               │
//! │        │                      │                         │
//! │        ▼                      ▼                         │
//! │  NeighborhoodIndex      select_seeds (+ output anchor)  │
//! │        │                      │                         │
//! │        └──────┬───────────────┘                         │
//! │               ▼                                         │
//! │         GrowthEngine ── CompatibilityScorer             │
//! │               │         CoherenceEvaluator              │
//! │               ▼                                         │
//! │        quality filter ──> ResidualClusterer             │
//! │               │                  │                      │
//! │               ▼                  ▼                      │
//! │       SemanticCluster    merge_clusters                 │
//! │               │                  │                      │
//! │               └──> AnalysisResult + CoverageStats       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The whole pipeline is synchronous, single-threaded and deterministic:
//! identical inputs and configuration produce byte-identical serialized
//! output.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use supernode_core::{
//!     AdmissionThresholds, AttributionGraph, EngineConfig, NodeKey,
//!     SupernodeAnalysis,
//! };
//!
//! let graph = AttributionGraph::new(
//!     vec![vec![0.0, 0.4], vec![0.0, 0.0]],
//!     vec![NodeKey::new(5, 0), NodeKey::new(4, 1)],
//!     0,
//! )?;
//! let admitted: HashSet<NodeKey> = graph.feature_keys().iter().copied().collect();
//! let analysis = SupernodeAnalysis::new(
//!     graph,
//!     Default::default(),
//!     admitted,
//!     AdmissionThresholds::default(),
//!     EngineConfig::default(),
//! );
//! let result = analysis.run()?;
//! assert_eq!(result.coverage.total_nodes, 2);
//! # Ok::<(), supernode_core::EngineError>(())
//! ```

pub mod clustering;
pub mod config;
pub mod error;
pub mod graph;
pub mod scoring;
pub mod types;

pub use clustering::{
    find_output_anchor, jaccard, merge_clusters, select_seeds, AnalysisResult,
    ComputationalCluster, CoverageStats, GrowthEngine, GrowthParams, MergeParams, OwnershipTable,
    QualityFilter, ResidualClusterer, ResidualParams, SeedParams, SemanticCluster,
    SupernodeAnalysis,
};
pub use config::{EngineConfig, GraphConfig};
pub use error::{EngineError, EngineResult};
pub use graph::{
    propagate_influence, AttributionGraph, NeighborhoodIndex, NodeNeighborhood,
    CONVERGENCE_TOLERANCE, MAX_PROPAGATION_ITERATIONS,
};
pub use scoring::{
    CoherenceBreakdown, CoherenceEvaluator, CoherenceWeights, CompatibilityScorer,
    CompatibilityWeights, ScoreBreakdown, TokenClasses,
};
pub use types::{AdmissionThresholds, NodeKey, NodeStats, StatsMap};
