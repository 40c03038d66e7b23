//! Node ownership tracking across clusters.
//!
//! An explicit node→cluster table rather than an ambient used-set: every
//! claim names the owning cluster ordinal, so the at-most-one-owner
//! invariant is checkable at any point. Mutation is strictly sequential:
//! the growth loop processes seeds in priority order, one at a time.

use std::collections::HashMap;

use crate::types::NodeKey;

/// Ownership table: which cluster (by ordinal) owns each node.
///
/// A node is owned by at most one cluster at a time. Ownership is taken
/// optimistically when a candidate is accepted and released on rollback or
/// when an undersized cluster is discarded.
#[derive(Debug, Clone, Default)]
pub struct OwnershipTable {
    owners: HashMap<NodeKey, usize>,
}

impl OwnershipTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for `cluster`. Returns false (and changes nothing) if the
    /// node is already owned.
    pub fn claim(&mut self, key: NodeKey, cluster: usize) -> bool {
        use std::collections::hash_map::Entry;
        match self.owners.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(cluster);
                true
            }
        }
    }

    /// Release `key` back to the unowned state. Returns the previous owner.
    pub fn release(&mut self, key: NodeKey) -> Option<usize> {
        self.owners.remove(&key)
    }

    /// Owning cluster ordinal, if any.
    #[inline]
    pub fn owner(&self, key: NodeKey) -> Option<usize> {
        self.owners.get(&key).copied()
    }

    /// Whether `key` is currently owned.
    #[inline]
    pub fn is_owned(&self, key: NodeKey) -> bool {
        self.owners.contains_key(&key)
    }

    /// Number of owned nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether no node is owned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
