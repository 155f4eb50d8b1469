//! Wire format for signed blobs and pruned proof subtrees
//!
//! Pruned trees travel as a recursive structure of leaves, stubs, and
//! interiors. Interior aggregates are deliberately *not* on the wire: the
//! parser re-derives every interior from its children, so a dishonest prover
//! cannot smuggle in a fabricated interior hash.

use crate::tree::{NodeCursor, NodeStore, PrunedTree};
use crate::{Agg, Aggregator, Blake3Aggregator, Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// What one signature covers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureKind {
    /// One signature per message, no tree
    SingleMessage,
    /// One signature over a fill-once merkle batch tree
    SingleMerkleTree,
    /// One signature over a growing history tree snapshot
    SingleHistoryTree,
}

impl SignatureKind {
    fn as_byte(&self) -> u8 {
        match self {
            SignatureKind::SingleMessage => 0,
            SignatureKind::SingleMerkleTree => 1,
            SignatureKind::SingleHistoryTree => 2,
        }
    }
}

/// One node of a serialized pruned tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireNode {
    /// A proven leaf carrying its value
    Leaf { value: Vec<u8> },
    /// An undisclosed subtree, aggregate only
    Stub { agg: Agg },
    /// An interior node; the right child is absent past the tree boundary
    Interior {
        left: Box<WireNode>,
        right: Option<Box<WireNode>>,
    },
}

/// A serialized pruned tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrunedWire {
    pub version: u32,
    pub root: Option<WireNode>,
}

/// The unit delivered to a message's completion callback and fed to verifiers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlob {
    pub kind: SignatureKind,
    /// Stable identifier of the signing key
    pub signer: Vec<u8>,
    pub signature: Vec<u8>,
    /// Which tree generation this proof belongs to (history queues rotate)
    pub tree_id: u64,
    /// Leaf index this blob proves
    pub leaf: u32,
    /// Earlier versions whose root is derivable from this proof
    pub splice_hints: Vec<u32>,
    /// Pruned proof subtree; absent for [`SignatureKind::SingleMessage`]
    pub tree: Option<PrunedWire>,
}

impl SignedBlob {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Length of the canonical signed payload
pub const SIGNING_BYTES_LEN: usize = 1 + 8 + 32;

/// Canonical byte layout the signature covers: kind, version, root aggregate
///
/// Fixed little-endian layout: signatures and the verification cache both
/// key on these exact bytes.
pub fn signing_bytes(kind: SignatureKind, version: u64, root: &Agg) -> [u8; SIGNING_BYTES_LEN] {
    let mut out = [0u8; SIGNING_BYTES_LEN];
    out[0] = kind.as_byte();
    out[1..9].copy_from_slice(&version.to_le_bytes());
    out[9..].copy_from_slice(root.as_bytes());
    out
}

/// Serialize a pruned tree
pub fn to_wire<A: Aggregator>(pruned: &PrunedTree<A>) -> PrunedWire {
    let root = encode_node(pruned.store(), NodeCursor::root_for_version(pruned.version()));
    PrunedWire {
        version: pruned.version() as u32,
        root,
    }
}

fn encode_node(store: &dyn NodeStore, cursor: NodeCursor) -> Option<WireNode> {
    if cursor.is_leaf() {
        if let Some(value) = store.value(cursor) {
            return Some(WireNode::Leaf {
                value: value.to_vec(),
            });
        }
        return store.agg(cursor).map(|agg| WireNode::Stub { agg });
    }

    let left = encode_node(store, cursor.left_child());
    let right = encode_node(store, cursor.right_child());
    match (left, right) {
        (Some(left), right) => Some(WireNode::Interior {
            left: Box::new(left),
            right: right.map(Box::new),
        }),
        // A populated interior always has a left child in a pruned tree; a
        // bare aggregate here is an undisclosed stub.
        (None, _) => store.agg(cursor).map(|agg| WireNode::Stub { agg }),
    }
}

/// Parse a pruned tree, re-deriving every interior aggregate from children
pub fn from_wire(wire: &PrunedWire) -> Result<PrunedTree<Blake3Aggregator>> {
    let version = u64::from(wire.version);
    let root_node = wire
        .root
        .as_ref()
        .ok_or_else(|| Error::MalformedProof("proof has no root".into()))?;

    let mut pruned = PrunedTree::new(version);
    let root_cursor = NodeCursor::root_for_version(version);
    let root = decode_node(root_node, root_cursor, version, &mut pruned)?;
    pruned.set_root(root);
    Ok(pruned)
}

fn decode_node(
    node: &WireNode,
    cursor: NodeCursor,
    version: u64,
    pruned: &mut PrunedTree<Blake3Aggregator>,
) -> Result<Agg> {
    match node {
        WireNode::Leaf { value } => {
            if !cursor.is_leaf() {
                return Err(Error::MalformedProof(format!(
                    "leaf node at layer {}",
                    cursor.layer()
                )));
            }
            let agg = pruned.aggregator().leaf(value);
            let store = pruned.store_mut();
            store.set_value(cursor, Bytes::from(value.clone()));
            store.set_agg(cursor, agg);
            Ok(agg)
        }
        WireNode::Stub { agg } => {
            pruned.store_mut().set_agg(cursor, *agg);
            Ok(*agg)
        }
        WireNode::Interior { left, right } => {
            if cursor.is_leaf() {
                return Err(Error::MalformedProof(
                    "interior node below leaf layer".into(),
                ));
            }
            let left_agg = decode_node(left, cursor.left_child(), version, pruned)?;
            let right_agg = match right {
                Some(right) => {
                    let right_cursor = cursor.right_child();
                    // Frozen merkle trees pin entirely-empty right subtrees
                    // past the boundary to an explicit aggregate; those
                    // travel as stubs. Anything claiming actual leaves out
                    // there is malformed.
                    if right_cursor.first_leaf() > version
                        && !matches!(**right, WireNode::Stub { .. })
                    {
                        return Err(Error::MalformedProof(format!(
                            "right child past version {version}"
                        )));
                    }
                    Some(decode_node(right, right_cursor, version, pruned)?)
                }
                None => None,
            };
            let agg = pruned
                .aggregator()
                .combine(&left_agg, right_agg.as_ref());
            pruned.store_mut().set_agg(cursor, agg);
            Ok(agg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{AppendStore, HistoryTree, MerkleTree};

    fn history_tree(n: u64) -> HistoryTree<AppendStore> {
        let mut tree = HistoryTree::new(AppendStore::new());
        for i in 0..n {
            tree.append(Bytes::from(format!("message {i}")));
        }
        tree
    }

    #[test]
    fn test_history_roundtrip_all_leaves() {
        let tree = history_tree(11);
        for leaf in 0..11 {
            let mut pruned = tree.make_pruned().unwrap();
            tree.copy_leaf_into(&mut pruned, leaf, true).unwrap();

            let parsed = from_wire(&to_wire(&pruned)).unwrap();
            assert_eq!(parsed.version(), 10);
            assert_eq!(parsed.root_agg().unwrap(), tree.root_agg().unwrap());
            assert_eq!(
                parsed.leaf_value(leaf).unwrap().as_ref(),
                format!("message {leaf}").as_bytes()
            );
        }
    }

    #[test]
    fn test_merkle_roundtrip() {
        let mut tree = MerkleTree::with_capacity(5);
        for i in 0..5u8 {
            tree.append(Bytes::from(vec![i; 4])).unwrap();
        }
        tree.freeze().unwrap();

        for leaf in 0..5 {
            let pruned = tree.prove(leaf, true).unwrap();
            let parsed = from_wire(&to_wire(&pruned)).unwrap();
            assert_eq!(parsed.root_agg().unwrap(), tree.root_agg().unwrap());
        }
    }

    #[test]
    fn test_ragged_merkle_empty_stubs_parse() {
        // Three leaves: freezing pins the empty fourth slot to the explicit
        // empty aggregate, which travels as a stub past the version
        // boundary and must parse back to the same root.
        let mut tree = MerkleTree::with_capacity(3);
        for i in 0..3u8 {
            tree.append(Bytes::from(vec![i; 4])).unwrap();
        }
        tree.freeze().unwrap();

        for leaf in 0..3 {
            let pruned = tree.prove(leaf, true).unwrap();
            let parsed = from_wire(&to_wire(&pruned)).unwrap();
            assert_eq!(parsed.root_agg().unwrap(), tree.root_agg().unwrap());
        }
    }

    #[test]
    fn test_claimed_leaf_past_version_rejected() {
        // Leaf 3 does not exist at version 2; only an opaque stub may sit
        // past the boundary.
        let stub = WireNode::Stub {
            agg: Agg::from_bytes([1; 32]),
        };
        let wire = PrunedWire {
            version: 2,
            root: Some(WireNode::Interior {
                left: Box::new(stub.clone()),
                right: Some(Box::new(WireNode::Interior {
                    left: Box::new(WireNode::Leaf { value: vec![2] }),
                    right: Some(Box::new(WireNode::Leaf { value: vec![3] })),
                })),
            }),
        };
        assert!(matches!(from_wire(&wire), Err(Error::MalformedProof(_))));

        // The same shape with a stub in the out-of-range slot is fine.
        let wire = PrunedWire {
            version: 2,
            root: Some(WireNode::Interior {
                left: Box::new(stub.clone()),
                right: Some(Box::new(WireNode::Interior {
                    left: Box::new(WireNode::Leaf { value: vec![2] }),
                    right: Some(Box::new(stub)),
                })),
            }),
        };
        assert!(from_wire(&wire).is_ok());
    }

    #[test]
    fn test_splice_path_survives_roundtrip() {
        let tree = history_tree(10);
        let mut pruned = tree.make_pruned().unwrap();
        tree.copy_leaf_into(&mut pruned, 7, true).unwrap();
        tree.copy_leaf_into(&mut pruned, 5, false).unwrap();

        let parsed = from_wire(&to_wire(&pruned)).unwrap();
        assert_eq!(
            parsed.historical_agg(5).unwrap(),
            tree.historical_agg(5).unwrap()
        );
    }

    #[test]
    fn test_fabricated_interior_rejected_by_rederivation() {
        // Tamper with a leaf value after serialization: the re-derived root
        // no longer matches the original commitment.
        let tree = history_tree(6);
        let mut pruned = tree.make_pruned().unwrap();
        tree.copy_leaf_into(&mut pruned, 2, true).unwrap();
        let mut wire = to_wire(&pruned);

        fn tamper(node: &mut WireNode) -> bool {
            match node {
                WireNode::Leaf { value } => {
                    value[0] ^= 0xff;
                    true
                }
                WireNode::Stub { .. } => false,
                WireNode::Interior { left, right } => {
                    if tamper(left) {
                        return true;
                    }
                    right.as_mut().map(|r| tamper(r)).unwrap_or(false)
                }
            }
        }
        assert!(tamper(wire.root.as_mut().unwrap()));

        let parsed = from_wire(&wire).unwrap();
        assert_ne!(parsed.root_agg().unwrap(), tree.root_agg().unwrap());
    }

    #[test]
    fn test_empty_root_rejected() {
        let wire = PrunedWire {
            version: 3,
            root: None,
        };
        assert!(matches!(from_wire(&wire), Err(Error::MalformedProof(_))));
    }

    #[test]
    fn test_overdeep_structure_rejected() {
        // An interior sitting where a leaf must be.
        let wire = PrunedWire {
            version: 1,
            root: Some(WireNode::Interior {
                left: Box::new(WireNode::Interior {
                    left: Box::new(WireNode::Leaf { value: vec![1] }),
                    right: None,
                }),
                right: None,
            }),
        };
        assert!(matches!(from_wire(&wire), Err(Error::MalformedProof(_))));
    }

    #[test]
    fn test_blob_encode_decode() {
        let tree = history_tree(4);
        let mut pruned = tree.make_pruned().unwrap();
        tree.copy_leaf_into(&mut pruned, 1, true).unwrap();

        let blob = SignedBlob {
            kind: SignatureKind::SingleHistoryTree,
            signer: vec![7; 32],
            signature: vec![9; 64],
            tree_id: 2,
            leaf: 1,
            splice_hints: vec![0],
            tree: Some(to_wire(&pruned)),
        };
        let decoded = SignedBlob::decode(&blob.encode().unwrap()).unwrap();
        assert_eq!(decoded, blob);
    }

    #[test]
    fn test_signing_bytes_layout() {
        let agg = Agg::from_bytes([0xab; 32]);
        let payload = signing_bytes(SignatureKind::SingleHistoryTree, 5, &agg);
        assert_eq!(payload[0], 2);
        assert_eq!(payload[1], 5);
        assert_eq!(&payload[9..], &[0xab; 32]);
    }
}
