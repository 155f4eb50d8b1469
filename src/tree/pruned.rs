//! Pruned proof subtrees
//!
//! A pruned tree is a sparse view of a snapshot at one fixed version: the
//! root-to-leaf paths of the proven leaves, plus an opaque aggregate stub for
//! every off-path sibling. It is sufficient to recompute the signed root and
//! any historical root covered by a spliced leaf path, and discloses nothing
//! else.

use super::{walk_historical_agg, MapStore, NodeCursor, NodeStore};
use crate::{Agg, Aggregator, Blake3Aggregator, Error, Result};
use bytes::Bytes;

/// A sparse authenticated subtree at a fixed version
pub struct PrunedTree<A: Aggregator = Blake3Aggregator> {
    store: MapStore,
    version: u64,
    agg: A,
    /// Root aggregate re-derived bottom-up during parsing
    root: Option<Agg>,
}

impl PrunedTree<Blake3Aggregator> {
    /// Create an empty pruned tree at `version` with the default aggregator
    pub fn new(version: u64) -> Self {
        PrunedTree::with_aggregator(version, Blake3Aggregator)
    }
}

impl<A: Aggregator> PrunedTree<A> {
    /// Create an empty pruned tree with an explicit aggregation function
    pub fn with_aggregator(version: u64, agg: A) -> Self {
        PrunedTree {
            store: MapStore::new(),
            version,
            agg,
            root: None,
        }
    }

    /// The snapshot version this proof was cut at
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The aggregate stored for a leaf, if its path is included
    pub fn leaf_agg(&self, leaf: u64) -> Option<Agg> {
        self.store.agg(NodeCursor::leaf(leaf))
    }

    /// The value stored for a leaf, if it was copied with its path
    pub fn leaf_value(&self, leaf: u64) -> Option<&Bytes> {
        self.store.value(NodeCursor::leaf(leaf))
    }

    /// Root aggregate of the snapshot this proof commits to
    ///
    /// For parsed proofs this is the aggregate re-derived from the wire
    /// structure; for locally built history proofs it is recomputed from the
    /// boundary path.
    pub fn root_agg(&self) -> Result<Agg> {
        match self.root {
            Some(root) => Ok(root),
            None => self.historical_agg(self.version),
        }
    }

    /// Root aggregate as it stood at an earlier version
    ///
    /// Defined only when the pruned tree carries the path of leaf `version`
    /// (a splice path). This is the hash check behind splice confirmation.
    pub fn historical_agg(&self, version: u64) -> Result<Agg> {
        if version > self.version {
            return Err(Error::FutureVersion {
                requested: version,
                current: self.version,
            });
        }
        walk_historical_agg(&self.store, &self.agg, version)
    }

    /// Number of nodes disclosed by this proof
    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    pub(crate) fn store(&self) -> &MapStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut MapStore {
        &mut self.store
    }

    pub(crate) fn aggregator(&self) -> &A {
        &self.agg
    }

    pub(crate) fn set_root(&mut self, root: Agg) {
        self.root = Some(root);
    }
}
