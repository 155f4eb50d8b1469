//! Value-typed addresses into a conceptual complete binary tree
//!
//! A cursor is a `(layer, index)` pair: layer 0 holds the leaves, and a node
//! at layer `L` covers the `2^L` leaves starting at `index`. All navigation
//! is cursor arithmetic; the tree never holds node pointers, so growing the
//! root is just addressing a higher layer.

/// An address of one node in the tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeCursor {
    layer: u8,
    index: u64,
}

impl NodeCursor {
    /// Address a node by layer and leftmost covered leaf
    ///
    /// `index` must be a multiple of `2^layer`.
    pub fn new(layer: u8, index: u64) -> Self {
        debug_assert_eq!(index & ((1u64 << layer) - 1), 0, "misaligned cursor");
        NodeCursor { layer, index }
    }

    /// Address a leaf
    pub fn leaf(index: u64) -> Self {
        NodeCursor { layer: 0, index }
    }

    /// Address of the root node for a tree at `version` (leaf count - 1)
    pub fn root_for_version(version: u64) -> Self {
        NodeCursor {
            layer: Self::root_layer(version),
            index: 0,
        }
    }

    /// The smallest root layer that can address every leaf `0..=version`
    pub fn root_layer(version: u64) -> u8 {
        if version == 0 {
            0
        } else {
            (u64::BITS - version.leading_zeros()) as u8
        }
    }

    pub fn layer(&self) -> u8 {
        self.layer
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Number of leaves this node covers
    pub fn span(&self) -> u64 {
        1u64 << self.layer
    }

    /// First leaf covered by this node
    pub fn first_leaf(&self) -> u64 {
        self.index
    }

    /// Last leaf covered by this node
    pub fn last_leaf(&self) -> u64 {
        self.index + self.span() - 1
    }

    pub fn is_leaf(&self) -> bool {
        self.layer == 0
    }

    pub fn contains_leaf(&self, leaf: u64) -> bool {
        leaf >= self.first_leaf() && leaf <= self.last_leaf()
    }

    /// Whether this node is the right child of its parent
    pub fn is_right_child(&self) -> bool {
        (self.index >> self.layer) & 1 == 1
    }

    pub fn parent(&self) -> NodeCursor {
        NodeCursor {
            layer: self.layer + 1,
            index: self.index & !((self.span() << 1) - 1),
        }
    }

    pub fn sibling(&self) -> NodeCursor {
        NodeCursor {
            layer: self.layer,
            index: self.index ^ self.span(),
        }
    }

    /// Left child; panics in debug builds if called on a leaf
    pub fn left_child(&self) -> NodeCursor {
        debug_assert!(self.layer > 0);
        NodeCursor {
            layer: self.layer - 1,
            index: self.index,
        }
    }

    /// Right child; panics in debug builds if called on a leaf
    pub fn right_child(&self) -> NodeCursor {
        debug_assert!(self.layer > 0);
        NodeCursor {
            layer: self.layer - 1,
            index: self.index + (self.span() >> 1),
        }
    }

    /// The child whose subtree contains `leaf`
    pub fn child_toward(&self, leaf: u64) -> NodeCursor {
        debug_assert!(self.contains_leaf(leaf));
        let right = self.right_child();
        if leaf >= right.first_leaf() {
            right
        } else {
            self.left_child()
        }
    }

    /// Canonical storage slot: the node's rank in a post-order traversal
    ///
    /// Closed form over `(layer, index)`: with `j` the node's last covered
    /// leaf, the slot is the last leaf's rank (`2j - popcount(j)`) plus one
    /// ancestor per layer climbed.
    pub fn slot(&self) -> u64 {
        let j = self.last_leaf();
        2 * j - u64::from(j.count_ones()) + u64::from(self.layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_slots_match_postorder() {
        // Post-order over leaves 0..4: leaf0=0, leaf1=1, (1,0)=2, leaf2=3,
        // leaf3=4, (1,2)=5, (2,0)=6.
        assert_eq!(NodeCursor::leaf(0).slot(), 0);
        assert_eq!(NodeCursor::leaf(1).slot(), 1);
        assert_eq!(NodeCursor::new(1, 0).slot(), 2);
        assert_eq!(NodeCursor::leaf(2).slot(), 3);
        assert_eq!(NodeCursor::leaf(3).slot(), 4);
        assert_eq!(NodeCursor::new(1, 2).slot(), 5);
        assert_eq!(NodeCursor::new(2, 0).slot(), 6);
    }

    #[test]
    fn test_slots_unique_and_dense() {
        // Every node of a complete 16-leaf tree gets a distinct slot, and
        // the slots form a dense range.
        let mut slots = Vec::new();
        for layer in 0u8..=4 {
            let span = 1u64 << layer;
            let mut index = 0;
            while index + span <= 16 {
                slots.push(NodeCursor::new(layer, index).slot());
                index += span;
            }
        }
        slots.sort_unstable();
        let expected: Vec<u64> = (0..slots.len() as u64).collect();
        assert_eq!(slots, expected);
    }

    #[test]
    fn test_parent_sibling_roundtrip() {
        let leaf = NodeCursor::leaf(5);
        assert!(leaf.is_right_child());
        assert_eq!(leaf.parent(), NodeCursor::new(1, 4));
        assert_eq!(leaf.sibling(), NodeCursor::leaf(4));
        assert_eq!(leaf.parent().left_child(), NodeCursor::leaf(4));
        assert_eq!(leaf.parent().right_child(), leaf);
    }

    #[test]
    fn test_root_layer() {
        assert_eq!(NodeCursor::root_layer(0), 0);
        assert_eq!(NodeCursor::root_layer(1), 1);
        assert_eq!(NodeCursor::root_layer(2), 2);
        assert_eq!(NodeCursor::root_layer(3), 2);
        assert_eq!(NodeCursor::root_layer(4), 3);
        assert_eq!(NodeCursor::root_layer(9), 4);
    }

    #[test]
    fn test_child_toward() {
        let root = NodeCursor::root_for_version(9);
        assert_eq!(root.layer(), 4);
        assert_eq!(root.child_toward(3), NodeCursor::new(3, 0));
        assert_eq!(root.child_toward(9), NodeCursor::new(3, 8));
    }
}
