//! Aggregate values and the pluggable aggregation function

use serde::{Deserialize, Serialize};
use std::fmt;

// Domain-separation prefixes. Leaf and interior hashes must never collide,
// and a one-child interior must differ from a two-child interior.
const TAG_LEAF: u8 = 0x00;
const TAG_INTERIOR: u8 = 0x01;
const TAG_PARTIAL: u8 = 0x02;
const TAG_EMPTY: u8 = 0x03;

/// A 32-byte aggregate (hash commitment) associated with a tree node
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Agg([u8; 32]);

impl Agg {
    /// The zero aggregate (used as a sentinel/null value)
    pub const ZERO: Agg = Agg([0u8; 32]);

    /// Create an aggregate from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Agg(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get a short prefix for display (first 7 chars, like git)
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }

    /// Check if this is the zero aggregate
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Agg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Agg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agg({})", self.short())
    }
}

impl Default for Agg {
    fn default() -> Self {
        Agg::ZERO
    }
}

impl AsRef<[u8]> for Agg {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The aggregation function used to commit tree contents
///
/// `combine` is order-sensitive: left and right children are not
/// interchangeable. Combining a left aggregate with a missing right child is
/// well-defined because a growing history tree always has a ragged right
/// boundary.
pub trait Aggregator: Send + Sync {
    /// Aggregate a leaf value
    fn leaf(&self, data: &[u8]) -> Agg;

    /// Combine two child aggregates into the parent aggregate
    fn combine(&self, left: &Agg, right: Option<&Agg>) -> Agg;

    /// The explicit empty aggregate used when a frozen tree forces out
    /// missing right children
    fn empty(&self) -> Agg;
}

/// Default aggregator: domain-separated BLAKE3
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Aggregator;

impl Aggregator for Blake3Aggregator {
    fn leaf(&self, data: &[u8]) -> Agg {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[TAG_LEAF]);
        hasher.update(data);
        Agg(*hasher.finalize().as_bytes())
    }

    fn combine(&self, left: &Agg, right: Option<&Agg>) -> Agg {
        let mut hasher = blake3::Hasher::new();
        match right {
            Some(right) => {
                hasher.update(&[TAG_INTERIOR]);
                hasher.update(left.as_bytes());
                hasher.update(right.as_bytes());
            }
            None => {
                hasher.update(&[TAG_PARTIAL]);
                hasher.update(left.as_bytes());
            }
        }
        Agg(*hasher.finalize().as_bytes())
    }

    fn empty(&self) -> Agg {
        Agg(*blake3::hash(&[TAG_EMPTY]).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_deterministic() {
        let agg = Blake3Aggregator;
        assert_eq!(agg.leaf(b"hello"), agg.leaf(b"hello"));
        assert_ne!(agg.leaf(b"hello"), agg.leaf(b"world"));
    }

    #[test]
    fn test_combine_order_sensitive() {
        let agg = Blake3Aggregator;
        let a = agg.leaf(b"a");
        let b = agg.leaf(b"b");
        assert_ne!(agg.combine(&a, Some(&b)), agg.combine(&b, Some(&a)));
    }

    #[test]
    fn test_partial_differs_from_full() {
        let agg = Blake3Aggregator;
        let a = agg.leaf(b"a");
        let empty = agg.empty();
        assert_ne!(agg.combine(&a, None), agg.combine(&a, Some(&empty)));
    }

    #[test]
    fn test_leaf_interior_domains_disjoint() {
        let agg = Blake3Aggregator;
        let a = agg.leaf(b"a");
        // An interior over one child never collides with a leaf over the
        // child's raw bytes.
        assert_ne!(agg.combine(&a, None), agg.leaf(a.as_bytes()));
    }

    #[test]
    fn test_hex_display() {
        let agg = Blake3Aggregator;
        let a = agg.leaf(b"x");
        assert_eq!(a.to_hex().len(), 64);
        assert_eq!(a.short().len(), 7);
    }
}
