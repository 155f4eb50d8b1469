//! # batchsig
//!
//! Batch signature amortization over authenticated history trees.
//!
//! batchsig signs many messages with one public-key operation: messages
//! accumulate in a queue, the batch becomes the leaves of a hash tree, and a
//! single signature over the tree root covers every message. Each recipient
//! gets a pruned proof binding their message to the signed root.
//!
//! History-tree batches go further. The tree persists across batches, every
//! batch is a new signed version of the same growing tree, and proofs carry
//! splice paths to roots the recipient has already verified. A verifier can
//! then authenticate a whole run of batches with one signature check.
//!
//! ## Core Concepts
//!
//! - **Aggregates**: 32-byte hashes combined up the tree with domain
//!   separation between leaves, interiors, and padding
//! - **History trees**: append-only trees whose historical roots stay valid
//!   as the tree grows
//! - **Pruned trees**: sparse proof views carrying only the paths a
//!   recipient needs
//! - **Splicing**: a later proof vouching for an earlier signed root by
//!   hash alone
//!
//! ## Example
//!
//! ```ignore
//! use batchsig::{Ed25519Signer, HistoryQueue, Message, Metrics};
//!
//! let queue = HistoryQueue::new(signer, Metrics::new());
//! queue.add(Message::new(data, recipient, author, |blob| { /* deliver */ }));
//! queue.process();
//! ```

pub mod queue;
pub mod tree;
pub mod verify;
pub mod wire;

mod agg;
mod error;
mod metrics;
mod signer;

pub use agg::{Agg, Aggregator, Blake3Aggregator};
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use queue::{
    BatchQueue, HistoryQueue, Message, MerkleQueue, QueueRunner, SimpleQueue,
    DEFAULT_MAX_TREE_SIZE,
};
pub use signer::{Ed25519Signer, Keyring, SignatureVerifier, SigningPrimitive};
pub use tree::{HistoryTree, MerkleTree, NodeCursor, PrunedTree};
pub use verify::{EagerVerifier, LazyVerifier};
pub use wire::{SignatureKind, SignedBlob, SIGNING_BYTES_LEN};
