//! Pairwise compatibility and cluster coherence scoring.

pub mod coherence;
pub mod compatibility;

pub use coherence::{CoherenceBreakdown, CoherenceEvaluator, CoherenceWeights};
pub use compatibility::{
    CompatibilityScorer, CompatibilityWeights, ScoreBreakdown, TokenClasses,
};
