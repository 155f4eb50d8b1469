//! Append-only history tree with historical root queries
//!
//! A history tree commits to an ever-growing sequence of leaves. The root
//! aggregate at any past version stays recomputable forever, which is what
//! makes cross-batch splicing possible: a proof cut from a later version can
//! demonstrate what the root looked like at an earlier one.

use super::{MapStore, NodeCursor, NodeStore, PrunedTree};
use crate::{Agg, Aggregator, Blake3Aggregator, Error, Result};
use bytes::Bytes;

/// An append-only authenticated tree over a pluggable store
pub struct HistoryTree<S: NodeStore, A: Aggregator = Blake3Aggregator> {
    store: S,
    agg: A,
    next_leaf: u64,
}

impl<S: NodeStore> HistoryTree<S, Blake3Aggregator> {
    /// Create an empty tree over the given store with the default aggregator
    pub fn new(store: S) -> Self {
        HistoryTree::with_aggregator(store, Blake3Aggregator)
    }
}

impl<S: NodeStore, A: Aggregator> HistoryTree<S, A> {
    /// Create an empty tree with an explicit aggregation function
    pub fn with_aggregator(store: S, agg: A) -> Self {
        HistoryTree {
            store,
            agg,
            next_leaf: 0,
        }
    }

    /// Number of leaves appended so far
    pub fn leaf_count(&self) -> u64 {
        self.next_leaf
    }

    /// Current version (`leaf_count - 1`), or `None` for an empty tree
    pub fn version(&self) -> Option<u64> {
        self.next_leaf.checked_sub(1)
    }

    /// Append one leaf and return the new version
    ///
    /// When the new leaf index does not fit under the current root, the root
    /// moves up a layer with the old root as its left child; cursor
    /// arithmetic makes this implicit. Afterwards, aggregates are propagated
    /// upward for exactly the ancestors whose subtrees just became complete
    /// (frozen), so an append touches `O(log n)` nodes amortized `O(1)`.
    pub fn append(&mut self, data: Bytes) -> u64 {
        let version = self.next_leaf;
        self.next_leaf += 1;

        let leaf = NodeCursor::leaf(version);
        self.store.set_agg(leaf, self.agg.leaf(&data));
        self.store.set_value(leaf, data);
        freeze_ancestors(&mut self.store, &self.agg, version);

        version
    }

    /// Root aggregate as of the current version
    pub fn root_agg(&self) -> Result<Agg> {
        let version = self.version().ok_or(Error::EmptyTree)?;
        self.historical_agg(version)
    }

    /// Root aggregate as it was at a past version
    ///
    /// Stable under further appends: only frozen left siblings participate,
    /// and every right subtree past `version` counts as absent.
    pub fn historical_agg(&self, version: u64) -> Result<Agg> {
        let current = self.version().ok_or(Error::EmptyTree)?;
        if version > current {
            return Err(Error::FutureVersion {
                requested: version,
                current,
            });
        }
        walk_historical_agg(&self.store, &self.agg, version)
    }

    /// Start a pruned subtree at the current version
    ///
    /// Copies the boundary path of the latest leaf (with frozen sibling
    /// stubs) so the pruned tree can recompute the signed root. Individual
    /// leaf paths are merged in with [`copy_leaf_into`](Self::copy_leaf_into).
    pub fn make_pruned(&self) -> Result<PrunedTree<A>>
    where
        A: Clone,
    {
        let version = self.version().ok_or(Error::EmptyTree)?;
        let mut pruned = PrunedTree::with_aggregator(version, self.agg.clone());
        copy_leaf_path(&self.store, pruned.store_mut(), version, version, false)?;
        Ok(pruned)
    }

    /// Merge the root-to-leaf path for `leaf` into an existing pruned tree
    ///
    /// Every stub already exposed in the pruned tree must agree bit-for-bit
    /// with the aggregate copied here; a mismatch means corrupted tree state.
    pub fn copy_leaf_into<B: Aggregator>(
        &self,
        pruned: &mut PrunedTree<B>,
        leaf: u64,
        with_value: bool,
    ) -> Result<()> {
        let version = pruned.version();
        if leaf > version {
            return Err(Error::MissingLeaf { leaf, version });
        }
        copy_leaf_path(&self.store, pruned.store_mut(), version, leaf, with_value)
    }
}

/// Propagate aggregates upward from a freshly appended leaf
///
/// An ancestor freezes exactly when the appended leaf is the last one of its
/// subtree, which happens while the walk keeps moving up from a right child.
pub(crate) fn freeze_ancestors(store: &mut dyn NodeStore, agg: &dyn Aggregator, leaf: u64) {
    let mut cur = NodeCursor::leaf(leaf);
    while cur.is_right_child() {
        let parent = cur.parent();
        let left = store
            .agg(parent.left_child())
            .expect("left sibling frozen before its right sibling");
        let right = store
            .agg(cur)
            .expect("current node frozen before its parent");
        store.set_agg(parent, agg.combine(&left, Some(&right)));
        cur = parent;
    }
}

/// Leaf-to-root walk computing the root aggregate at `version`
///
/// At each step the running aggregate either absorbs its frozen left sibling
/// (when it is a right child) or combines with an absent right sibling. The
/// walk stops at the root layer of the *queried* version, so the result is
/// independent of how much the tree has grown since.
pub(crate) fn walk_historical_agg(
    store: &dyn NodeStore,
    agg: &dyn Aggregator,
    version: u64,
) -> Result<Agg> {
    let mut cur = NodeCursor::leaf(version);
    let mut running = store.agg(cur).ok_or(Error::MissingAggregate {
        layer: cur.layer(),
        index: cur.index(),
    })?;

    let top = NodeCursor::root_layer(version);
    while cur.layer() < top {
        running = if cur.is_right_child() {
            let sibling = cur.sibling();
            let left = store.agg(sibling).ok_or(Error::MissingAggregate {
                layer: sibling.layer(),
                index: sibling.index(),
            })?;
            agg.combine(&left, Some(&running))
        } else {
            agg.combine(&running, None)
        };
        cur = cur.parent();
    }
    Ok(running)
}

/// Copy the root-to-leaf path for `leaf` from `src` into `dst`
///
/// At every branching point the off-path sibling's aggregate is copied as an
/// opaque stub when the source has one stored (complete subtrees, and forced
/// empty stubs in frozen merkle trees). Partially filled siblings carry no
/// stored aggregate and are covered by the boundary path instead.
pub(crate) fn copy_leaf_path(
    src: &dyn NodeStore,
    dst: &mut MapStore,
    version: u64,
    leaf: u64,
    with_value: bool,
) -> Result<()> {
    let mut cur = NodeCursor::root_for_version(version);
    while !cur.is_leaf() {
        let next = cur.child_toward(leaf);
        let sibling = next.sibling();
        if !dst.contains(sibling) {
            if let Some(agg) = src.agg(sibling) {
                dst.set_agg(sibling, agg);
            }
        }
        cur = next;
    }

    let leaf_agg = src.agg(cur).ok_or(Error::MissingAggregate {
        layer: 0,
        index: leaf,
    })?;
    dst.set_agg(cur, leaf_agg);
    if with_value {
        let value = src.value(cur).ok_or(Error::MissingValue(leaf))?;
        dst.set_value(cur, value.clone());
    }
    Ok(())
}
