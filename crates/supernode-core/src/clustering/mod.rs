//! Supernode construction: seeded growth, residual bucketing, merging and
//! pipeline orchestration.
//!
//! # Control flow
//!
//! ```text
//! propagate_influence ──> NeighborhoodIndex ──> select_seeds
//!                                                    │
//!                                                    ▼
//!                         GrowthEngine (per seed, OwnershipTable threaded)
//!                                                    │
//!                            semantic quality filter │
//!                                                    ▼
//!                         ResidualClusterer (admitted − owned)
//!                                                    │
//!                                                    ▼
//!                         merge_clusters ──> AnalysisResult + coverage
//! ```

pub mod cluster;
pub mod growth;
pub mod merge;
pub mod ownership;
pub mod pipeline;
pub mod residual;
pub mod seed;

pub use cluster::{ComputationalCluster, SemanticCluster};
pub use growth::{GrowthEngine, GrowthParams};
pub use merge::{jaccard, merge_clusters, MergeParams};
pub use ownership::OwnershipTable;
pub use pipeline::{AnalysisResult, CoverageStats, QualityFilter, SupernodeAnalysis};
pub use residual::{ResidualClusterer, ResidualParams};
pub use seed::{find_output_anchor, select_seeds, SeedParams};
