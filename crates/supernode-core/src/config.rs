//! Layered engine configuration.
//!
//! All tunables of the analysis pipeline live in one [`EngineConfig`] tree
//! that deserializes from TOML files and environment variables. Loading is
//! layered: `config/default.toml`, then `config/{SUPERNODE_ENV}.toml`, then
//! `SUPERNODE__`-prefixed environment variables, later layers overriding
//! earlier ones. Every layer is optional; the compiled-in defaults are a
//! complete working configuration.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clustering::{GrowthParams, MergeParams, ResidualParams, SeedParams};
use crate::clustering::pipeline::QualityFilter;
use crate::error::EngineResult;
use crate::scoring::{CoherenceWeights, CompatibilityWeights, TokenClasses};

/// Complete configuration of a supernode analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Edge thresholds and influence options.
    pub graph: GraphConfig,
    /// Pairwise compatibility weights.
    pub compatibility: CompatibilityWeights,
    /// Cluster coherence weights.
    pub coherence: CoherenceWeights,
    /// Token vocabulary classes.
    pub tokens: TokenClasses,
    /// Seed selection parameters.
    pub seeds: SeedParams,
    /// Growth loop parameters.
    pub growth: GrowthParams,
    /// Residual bucketing parameters.
    pub residual: ResidualParams,
    /// Overlap merge parameters.
    pub merge: MergeParams,
    /// Post-growth quality filter.
    pub quality: QualityFilter,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            compatibility: CompatibilityWeights::default(),
            coherence: CoherenceWeights::default(),
            tokens: TokenClasses::with_default_structural(),
            seeds: SeedParams::default(),
            growth: GrowthParams::default(),
            residual: ResidualParams::default(),
            merge: MergeParams::default(),
            quality: QualityFilter::default(),
        }
    }
}

/// Graph-level thresholds shared across pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Strong-edge threshold for neighborhoods and direct-edge scoring.
    pub tau_edge_strong: f32,
    /// Weak-edge threshold for density and anchor detection.
    pub tau_edge: f32,
    /// Parents/children retained per node in the neighborhood index.
    pub top_k: usize,
    /// Row-normalize the adjacency before influence propagation.
    pub normalize_influence: bool,
    /// Sink whose strongest upstream feature is promoted to the head of the
    /// seed list. `None` disables output anchoring.
    pub output_anchor_sink: Option<usize>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tau_edge_strong: 0.05,
            tau_edge: 0.01,
            top_k: 5,
            normalize_influence: true,
            output_anchor_sink: None,
        }
    }
}

impl GraphConfig {
    /// Validate parameter ranges.
    pub fn validate(&self) -> EngineResult<()> {
        use crate::error::EngineError;
        if self.tau_edge_strong < 0.0 || self.tau_edge < 0.0 {
            return Err(EngineError::invalid_parameter(format!(
                "edge thresholds must be >= 0, got strong={} weak={}",
                self.tau_edge_strong, self.tau_edge
            )));
        }
        if self.top_k == 0 {
            return Err(EngineError::invalid_parameter("top_k must be >= 1, got 0"));
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Load configuration from files and environment.
    ///
    /// Layering (later overrides earlier):
    /// 1. config/default.toml (base settings)
    /// 2. config/{SUPERNODE_ENV}.toml (environment-specific)
    /// 3. Environment variables with SUPERNODE__ prefix
    pub fn load() -> EngineResult<Self> {
        let env = std::env::var("SUPERNODE_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("SUPERNODE").separator("__"));

        let cfg: EngineConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        info!(environment = %env, "engine configuration loaded");
        Ok(cfg)
    }

    /// Validate every parameter group.
    pub fn validate(&self) -> EngineResult<()> {
        self.graph.validate()?;
        self.compatibility.validate()?;
        self.coherence.validate()?;
        self.seeds.validate()?;
        self.growth.validate()?;
        self.residual.validate()?;
        self.merge.validate()?;
        self.quality.validate()?;
        Ok(())
    }
}
