//! Jaccard-overlap merging of computational clusters.
//!
//! A single greedy pass in input order: each surviving cluster absorbs any
//! later cluster whose member overlap reaches the threshold. The pass is
//! order dependent on purpose; inputs arrive sorted by signature, so the
//! outcome is deterministic.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clustering::cluster::ComputationalCluster;
use crate::error::{EngineError, EngineResult};
use crate::types::NodeKey;

/// Parameters for overlap merging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeParams {
    /// Minimum Jaccard similarity between member sets to merge.
    pub jaccard_threshold: f32,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            jaccard_threshold: 0.7,
        }
    }
}

impl MergeParams {
    /// Validate parameter ranges.
    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0..=1.0).contains(&self.jaccard_threshold) {
            return Err(EngineError::invalid_parameter(format!(
                "jaccard_threshold must be in [0.0, 1.0], got {}",
                self.jaccard_threshold
            )));
        }
        Ok(())
    }
}

/// Jaccard similarity of two member sets. Two empty sets are fully similar.
pub fn jaccard(a: &HashSet<NodeKey>, b: &HashSet<NodeKey>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f32 / union as f32
}

/// Merge overlapping clusters in a single greedy pass.
///
/// The absorbing cluster keeps its signature and aggregate metadata; member
/// sets are unioned and re-sorted. Absorbed clusters are consumed. Disjoint
/// member sets always survive the pass unchanged, so re-running the merge on
/// its own output is a no-op.
pub fn merge_clusters(
    clusters: Vec<ComputationalCluster>,
    threshold: f32,
) -> Vec<ComputationalCluster> {
    let mut merged: Vec<ComputationalCluster> = Vec::with_capacity(clusters.len());
    let mut member_sets: Vec<HashSet<NodeKey>> = Vec::with_capacity(clusters.len());

    'outer: for cluster in clusters {
        let candidate_set: HashSet<NodeKey> = cluster.members.iter().copied().collect();

        for (base, base_set) in merged.iter_mut().zip(member_sets.iter_mut()) {
            let similarity = jaccard(base_set, &candidate_set);
            if similarity >= threshold {
                debug!(
                    base = %base.signature,
                    absorbed = %cluster.signature,
                    similarity,
                    "merging overlapping clusters"
                );
                base_set.extend(candidate_set.iter().copied());
                base.members = base_set.iter().copied().collect();
                base.members.sort();
                base.n_members = base.members.len();
                continue 'outer;
            }
        }

        merged.push(cluster);
        member_sets.push(candidate_set);
    }

    merged
}
