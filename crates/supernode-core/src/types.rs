//! Core domain types shared across the engine.
//!
//! A feature node is identified by `(layer, feature_index)`; its behavioral
//! statistics are computed upstream (CSV aggregation / probe stages) and
//! consumed here as read-only input.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Immutable identity of a feature node: `(layer, feature_index)`.
///
/// Rendered as `"{layer}_{feature_index}"`, the key format used by every
/// upstream artifact (statistics maps, admitted-node lists).
///
/// # Example
///
/// ```
/// use supernode_core::NodeKey;
///
/// let key = NodeKey::new(7, 1523);
/// assert_eq!(key.to_string(), "7_1523");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    /// Transformer layer the feature lives in.
    pub layer: u32,
    /// Index of the latent feature within the layer.
    pub feature_index: u32,
}

impl NodeKey {
    /// Create a node key.
    pub fn new(layer: u32, feature_index: u32) -> Self {
        Self {
            layer,
            feature_index,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.layer, self.feature_index)
    }
}

/// Per-node behavioral statistics, computed once upstream.
///
/// All fields are treated as read-only input. Absent nodes or unset fields
/// degrade to neutral defaults inside the scoring code; they never raise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Layer of the node (duplicated from the key for convenience).
    pub layer: u32,
    /// Token position the node is anchored to, when known.
    pub position: Option<u32>,
    /// Mean activation consistency across probe prompts, in [0, 1].
    pub mean_consistency: f32,
    /// Consistency conditioned on the feature being active, in [0, 1].
    /// Preferred over `mean_consistency` when present.
    pub conditional_consistency: Option<f32>,
    /// Maximum token affinity, in [0, 1].
    pub max_affinity: f32,
    /// Token the feature most often peaks on.
    pub dominant_token: String,
    /// Signed backward-propagated causal influence on the output.
    pub causal_influence: f32,
    /// Direct impact on the output logits.
    pub output_impact: f32,
    /// Probe-response magnitude from the labeling stage.
    pub probe_response: f32,
}

impl NodeStats {
    /// Consistency value used by scoring: conditional when available,
    /// otherwise mean.
    #[inline]
    pub fn consistency(&self) -> f32 {
        self.conditional_consistency.unwrap_or(self.mean_consistency)
    }
}

/// Map of per-node statistics keyed by node identity.
pub type StatsMap = HashMap<NodeKey, NodeStats>;

/// Numeric admission thresholds produced by the external calibration stage.
///
/// The engine does not re-derive admission; it consumes the admitted set
/// directly. The thresholds ride along so residual tiering and downstream
/// reporting can reference the calibrated values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdmissionThresholds {
    /// Output-influence admission threshold.
    pub tau_inf: f32,
    /// Affinity admission threshold.
    pub tau_aff: f32,
    /// Node-influence threshold separating causal tiers.
    pub tau_node_inf: f32,
    /// Elevated influence bar applied to structural-token features.
    pub tau_inf_very_high: f32,
}

impl Default for AdmissionThresholds {
    fn default() -> Self {
        Self {
            tau_inf: 0.01,
            tau_aff: 0.3,
            tau_node_inf: 0.01,
            tau_inf_very_high: 0.1,
        }
    }
}
