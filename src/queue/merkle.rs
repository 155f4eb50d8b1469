//! Merkle batch queue: one signature per batch, fresh tree per batch

use super::{BatchQueue, Inbox, Message};
use crate::tree::MerkleTree;
use crate::wire::{signing_bytes, to_wire, SignatureKind, SignedBlob};
use crate::{Metrics, Result, SigningPrimitive};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Batches messages under one merkle root signature
///
/// Every `process()` builds a fresh tree over the drained batch, freezes it,
/// signs the root once, and hands each message a pruned membership proof.
pub struct MerkleQueue {
    inbox: Inbox,
    signer: Arc<dyn SigningPrimitive>,
    next_tree_id: Mutex<u64>,
    metrics: Arc<Metrics>,
}

impl MerkleQueue {
    pub fn new(signer: Arc<dyn SigningPrimitive>, metrics: Arc<Metrics>) -> Self {
        MerkleQueue {
            inbox: Inbox::new(),
            signer,
            next_tree_id: Mutex::new(0),
            metrics,
        }
    }

    fn build_batch(&self, batch: &[Message]) -> Result<(MerkleTree, u64)> {
        let mut tree = MerkleTree::with_capacity(batch.len() as u64);
        for message in batch {
            tree.append(message.data.clone())?;
        }
        tree.freeze()?;

        let mut next = self.next_tree_id.lock();
        let tree_id = *next;
        *next += 1;
        Ok((tree, tree_id))
    }
}

impl BatchQueue for MerkleQueue {
    fn add(&self, message: Message) {
        self.inbox.add(message);
    }

    fn process(&self) {
        let batch = self.inbox.drain();
        if batch.is_empty() {
            return;
        }

        let (tree, tree_id) = match self.build_batch(&batch) {
            Ok(built) => built,
            Err(e) => {
                // Malformed internal tree state; fail the whole batch but
                // keep the queue alive.
                warn!(error = %e, "merkle batch build failed");
                for message in batch {
                    message.complete(None);
                }
                return;
            }
        };

        let version = tree.version().expect("non-empty batch tree");
        let root = match tree.root_agg() {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "frozen tree has no root");
                for message in batch {
                    message.complete(None);
                }
                return;
            }
        };

        let payload = signing_bytes(SignatureKind::SingleMerkleTree, version, &root);
        let signature = self.signer.sign(&payload);
        self.metrics.incr_signatures();
        debug!(
            tree_id,
            version,
            messages = batch.len(),
            root = %root.short(),
            "signed merkle batch"
        );

        let count = batch.len() as u64;
        for (leaf, message) in batch.into_iter().enumerate() {
            match tree.prove(leaf as u64, true) {
                Ok(pruned) => message.complete(Some(SignedBlob {
                    kind: SignatureKind::SingleMerkleTree,
                    signer: self.signer.signer_id().to_vec(),
                    signature: signature.clone(),
                    tree_id,
                    leaf: leaf as u32,
                    splice_hints: Vec::new(),
                    tree: Some(to_wire(&pruned)),
                })),
                Err(e) => {
                    warn!(leaf, error = %e, "proof construction failed");
                    message.complete(None);
                }
            }
        }
        self.metrics.incr_batches();
        self.metrics.add_messages_signed(count);
    }

    fn suspend_till_nonempty(&self, timeout: Duration) -> bool {
        self.inbox.suspend_till_nonempty(timeout)
    }

    fn depth(&self) -> usize {
        self.inbox.len()
    }
}
