//! Fill-once merkle batch trees
//!
//! A merkle tree commits to exactly one batch: it is filled, frozen, signed,
//! and never touched again. Freezing walks the boundary path of the final
//! leaf and forces every missing right child to the explicit empty
//! aggregate, after which the root is a plain read.

use super::history::{copy_leaf_path, freeze_ancestors};
use super::{NodeCursor, NodeStore, PrunedTree, VecStore};
use crate::{Agg, Aggregator, Blake3Aggregator, Error, Result};
use bytes::Bytes;

/// A single-batch authenticated tree
pub struct MerkleTree<A: Aggregator = Blake3Aggregator> {
    store: VecStore,
    agg: A,
    next_leaf: u64,
    frozen: bool,
}

impl MerkleTree<Blake3Aggregator> {
    /// Create an empty tree with the default aggregator
    pub fn new() -> Self {
        MerkleTree::with_aggregator(Blake3Aggregator)
    }

    /// Create an empty tree pre-sized for a known batch size
    pub fn with_capacity(leaves: u64) -> Self {
        MerkleTree {
            store: VecStore::with_leaf_capacity(leaves),
            agg: Blake3Aggregator,
            next_leaf: 0,
            frozen: false,
        }
    }
}

impl Default for MerkleTree<Blake3Aggregator> {
    fn default() -> Self {
        MerkleTree::new()
    }
}

impl<A: Aggregator> MerkleTree<A> {
    /// Create an empty tree with an explicit aggregation function
    pub fn with_aggregator(agg: A) -> Self {
        MerkleTree {
            store: VecStore::new(),
            agg,
            next_leaf: 0,
            frozen: false,
        }
    }

    pub fn leaf_count(&self) -> u64 {
        self.next_leaf
    }

    /// Current version (`leaf_count - 1`), or `None` for an empty tree
    pub fn version(&self) -> Option<u64> {
        self.next_leaf.checked_sub(1)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Append one leaf; rejected once the tree is frozen
    pub fn append(&mut self, data: Bytes) -> Result<u64> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        let version = self.next_leaf;
        self.next_leaf += 1;

        let leaf = NodeCursor::leaf(version);
        self.store.set_agg(leaf, self.agg.leaf(&data));
        self.store.set_value(leaf, data);
        freeze_ancestors(&mut self.store, &self.agg, version);

        Ok(version)
    }

    /// Mark the tree complete and cache every remaining aggregate
    ///
    /// Walks the final leaf's path to the root; any missing right child
    /// along the way stands for an entirely empty subtree and is pinned to
    /// the explicit empty aggregate.
    pub fn freeze(&mut self) -> Result<()> {
        if self.frozen {
            return Ok(());
        }
        let version = self.version().ok_or(Error::EmptyTree)?;
        let top = NodeCursor::root_layer(version);

        let mut cur = NodeCursor::leaf(version);
        while cur.layer() < top {
            let parent = cur.parent();
            if self.store.agg(parent).is_none() {
                let left = self
                    .store
                    .agg(parent.left_child())
                    .expect("left subtree complete before freeze");
                let right_cursor = parent.right_child();
                let right = match self.store.agg(right_cursor) {
                    Some(agg) => agg,
                    None => {
                        let empty = self.agg.empty();
                        self.store.set_agg(right_cursor, empty);
                        empty
                    }
                };
                self.store.set_agg(parent, self.agg.combine(&left, Some(&right)));
            }
            cur = parent;
        }

        self.frozen = true;
        Ok(())
    }

    /// Root aggregate; only readable after [`freeze`](Self::freeze)
    pub fn root_agg(&self) -> Result<Agg> {
        if !self.frozen {
            return Err(Error::NotFrozen);
        }
        let version = self.version().ok_or(Error::EmptyTree)?;
        let root = NodeCursor::root_for_version(version);
        self.store.agg(root).ok_or(Error::MissingAggregate {
            layer: root.layer(),
            index: root.index(),
        })
    }

    /// Build a pruned membership proof for one leaf
    pub fn prove(&self, leaf: u64, with_value: bool) -> Result<PrunedTree<A>>
    where
        A: Clone,
    {
        if !self.frozen {
            return Err(Error::NotFrozen);
        }
        let version = self.version().ok_or(Error::EmptyTree)?;
        if leaf > version {
            return Err(Error::MissingLeaf { leaf, version });
        }
        let mut pruned = PrunedTree::with_aggregator(version, self.agg.clone());
        copy_leaf_path(&self.store, pruned.store_mut(), version, leaf, with_value)?;
        pruned.set_root(self.root_agg()?);
        Ok(pruned)
    }
}
