//! Pluggable node storage for authenticated trees
//!
//! A store maps a [`NodeCursor`] to the node's aggregate and, for leaves,
//! its value. The three implementations trade memory layout for flexibility;
//! the choice is a performance decision, never a semantic one:
//!
//! - [`VecStore`]: dense slot-indexed array, pre-sized for a known leaf
//!   count (merkle batch trees)
//! - [`AppendStore`]: slot-indexed array that grows as the tree appends
//!   (long-lived history trees; slots are produced in post-order, so growth
//!   is append-only)
//! - [`MapStore`]: hash-map backed, for sparse pruned trees

use super::NodeCursor;
use crate::Agg;
use bytes::Bytes;
use std::collections::HashMap;

/// Storage for one tree's node aggregates and leaf values
pub trait NodeStore {
    /// The aggregate stored for a node, if the slot is populated
    fn agg(&self, cursor: NodeCursor) -> Option<Agg>;

    /// Store a node's aggregate
    ///
    /// Writing a *different* aggregate over an already-populated slot is a
    /// storage-invariant violation (corrupted tree state), not a runtime
    /// condition.
    fn set_agg(&mut self, cursor: NodeCursor, agg: Agg);

    /// The value stored for a leaf, if any
    fn value(&self, cursor: NodeCursor) -> Option<&Bytes>;

    /// Store a leaf's value
    fn set_value(&mut self, cursor: NodeCursor, value: Bytes);

    /// Whether anything is stored for this cursor
    fn contains(&self, cursor: NodeCursor) -> bool;
}

#[derive(Clone, Debug, Default)]
struct SlotEntry {
    agg: Option<Agg>,
    value: Option<Bytes>,
}

impl SlotEntry {
    fn is_empty(&self) -> bool {
        self.agg.is_none() && self.value.is_none()
    }
}

fn check_overwrite(existing: Option<Agg>, agg: Agg) {
    if let Some(existing) = existing {
        debug_assert_eq!(existing, agg, "conflicting aggregate for populated slot");
    }
}

/// Dense slot-indexed storage, pre-sized for a known leaf count
#[derive(Clone, Debug, Default)]
pub struct VecStore {
    slots: Vec<SlotEntry>,
}

impl VecStore {
    pub fn new() -> Self {
        VecStore::default()
    }

    /// Pre-allocate every slot of a tree with `leaves` leaves
    pub fn with_leaf_capacity(leaves: u64) -> Self {
        let slots = if leaves == 0 { 0 } else { 2 * leaves - 1 };
        VecStore {
            slots: vec![SlotEntry::default(); slots as usize],
        }
    }

    fn entry_mut(&mut self, cursor: NodeCursor) -> &mut SlotEntry {
        let slot = cursor.slot() as usize;
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, SlotEntry::default());
        }
        &mut self.slots[slot]
    }

    fn entry(&self, cursor: NodeCursor) -> Option<&SlotEntry> {
        self.slots.get(cursor.slot() as usize)
    }
}

impl NodeStore for VecStore {
    fn agg(&self, cursor: NodeCursor) -> Option<Agg> {
        self.entry(cursor).and_then(|e| e.agg)
    }

    fn set_agg(&mut self, cursor: NodeCursor, agg: Agg) {
        let entry = self.entry_mut(cursor);
        check_overwrite(entry.agg, agg);
        entry.agg = Some(agg);
    }

    fn value(&self, cursor: NodeCursor) -> Option<&Bytes> {
        self.entry(cursor).and_then(|e| e.value.as_ref())
    }

    fn set_value(&mut self, cursor: NodeCursor, value: Bytes) {
        self.entry_mut(cursor).value = Some(value);
    }

    fn contains(&self, cursor: NodeCursor) -> bool {
        self.entry(cursor).map(|e| !e.is_empty()).unwrap_or(false)
    }
}

/// Append-only slot-indexed storage for a growing history tree
///
/// Post-order slot numbering means a history tree only ever populates slots
/// at or past the current high-water mark, so the backing array never needs
/// to shift.
#[derive(Clone, Debug, Default)]
pub struct AppendStore {
    slots: Vec<SlotEntry>,
}

impl AppendStore {
    pub fn new() -> Self {
        AppendStore::default()
    }

    fn entry_mut(&mut self, cursor: NodeCursor) -> &mut SlotEntry {
        let slot = cursor.slot() as usize;
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, SlotEntry::default());
        }
        &mut self.slots[slot]
    }
}

impl NodeStore for AppendStore {
    fn agg(&self, cursor: NodeCursor) -> Option<Agg> {
        self.slots.get(cursor.slot() as usize).and_then(|e| e.agg)
    }

    fn set_agg(&mut self, cursor: NodeCursor, agg: Agg) {
        let entry = self.entry_mut(cursor);
        check_overwrite(entry.agg, agg);
        entry.agg = Some(agg);
    }

    fn value(&self, cursor: NodeCursor) -> Option<&Bytes> {
        self.slots
            .get(cursor.slot() as usize)
            .and_then(|e| e.value.as_ref())
    }

    fn set_value(&mut self, cursor: NodeCursor, value: Bytes) {
        self.entry_mut(cursor).value = Some(value);
    }

    fn contains(&self, cursor: NodeCursor) -> bool {
        self.slots
            .get(cursor.slot() as usize)
            .map(|e| !e.is_empty())
            .unwrap_or(false)
    }
}

/// Hash-map backed storage for sparse pruned trees
#[derive(Clone, Debug, Default)]
pub struct MapStore {
    nodes: HashMap<NodeCursor, SlotEntry>,
}

impl MapStore {
    pub fn new() -> Self {
        MapStore::default()
    }

    /// Number of populated nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeStore for MapStore {
    fn agg(&self, cursor: NodeCursor) -> Option<Agg> {
        self.nodes.get(&cursor).and_then(|e| e.agg)
    }

    fn set_agg(&mut self, cursor: NodeCursor, agg: Agg) {
        let entry = self.nodes.entry(cursor).or_default();
        check_overwrite(entry.agg, agg);
        entry.agg = Some(agg);
    }

    fn value(&self, cursor: NodeCursor) -> Option<&Bytes> {
        self.nodes.get(&cursor).and_then(|e| e.value.as_ref())
    }

    fn set_value(&mut self, cursor: NodeCursor, value: Bytes) {
        self.nodes.entry(cursor).or_default().value = Some(value);
    }

    fn contains(&self, cursor: NodeCursor) -> bool {
        self.nodes.get(&cursor).map(|e| !e.is_empty()).unwrap_or(false)
    }
}
