//! Attribution-graph structure and causal metrics.
//!
//! - [`AttributionGraph`]: validated adjacency matrix + node ordering
//! - [`propagate_influence`]: bounded backward influence propagation
//! - [`NeighborhoodIndex`]: per-node top-K parents/children and degrees

pub mod adjacency;
pub mod influence;
pub mod neighborhood;

pub use adjacency::AttributionGraph;
pub use influence::{propagate_influence, CONVERGENCE_TOLERANCE, MAX_PROPAGATION_ITERATIONS};
pub use neighborhood::{NeighborhoodIndex, NodeNeighborhood};
