//! History batch queue: one signature per batch, splice hints across batches
//!
//! Unlike the merkle queue, one tree keeps growing across batches, so a
//! later batch's proof can carry the path of an earlier batch's final leaf.
//! A verifier that checks the later signature can then accept the earlier
//! batch by hash comparison alone.

use super::{BatchQueue, Inbox, Message};
use crate::tree::{AppendStore, HistoryTree};
use crate::wire::{signing_bytes, to_wire, SignatureKind, SignedBlob};
use crate::{Metrics, SigningPrimitive};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default rotation cap, bounding proof depth
pub const DEFAULT_MAX_TREE_SIZE: u64 = 1 << 16;

struct LastContact {
    tree_id: u64,
    version: u64,
}

struct HistoryState {
    tree: HistoryTree<AppendStore>,
    tree_id: u64,
    /// Most recent batch version each recipient was included in; survives
    /// rotation (the stored tree_id gates stale hints)
    last_contact: HashMap<Bytes, LastContact>,
}

/// Batches messages into a long-lived history tree with splice hints
pub struct HistoryQueue {
    inbox: Inbox,
    signer: Arc<dyn SigningPrimitive>,
    state: Mutex<HistoryState>,
    max_tree_size: u64,
    metrics: Arc<Metrics>,
}

impl HistoryQueue {
    pub fn new(signer: Arc<dyn SigningPrimitive>, metrics: Arc<Metrics>) -> Self {
        HistoryQueue::with_max_tree_size(signer, metrics, DEFAULT_MAX_TREE_SIZE)
    }

    /// Cap the tree size before rotation to a fresh tree
    ///
    /// Leaf indices and splice hints travel as `u32`, so the cap is clamped
    /// to `u32::MAX`.
    pub fn with_max_tree_size(
        signer: Arc<dyn SigningPrimitive>,
        metrics: Arc<Metrics>,
        max_tree_size: u64,
    ) -> Self {
        HistoryQueue {
            inbox: Inbox::new(),
            signer,
            state: Mutex::new(HistoryState {
                tree: HistoryTree::new(AppendStore::new()),
                tree_id: 0,
                last_contact: HashMap::new(),
            }),
            max_tree_size: max_tree_size.clamp(1, u64::from(u32::MAX)),
            metrics,
        }
    }
}

impl BatchQueue for HistoryQueue {
    fn add(&self, message: Message) {
        self.inbox.add(message);
    }

    fn process(&self) {
        let batch = self.inbox.drain();
        if batch.is_empty() {
            return;
        }

        // Rotation decision, appends, and proof generation share one
        // critical section: pruning assumes the latest commitment is stable
        // for the duration of the prune.
        let mut state = self.state.lock();

        if state.tree.leaf_count() > 0
            && state.tree.leaf_count() + batch.len() as u64 > self.max_tree_size
        {
            state.tree_id += 1;
            state.tree = HistoryTree::new(AppendStore::new());
            debug!(tree_id = state.tree_id, "rotated history tree");
        }

        let first_leaf = state.tree.leaf_count();
        for message in &batch {
            state.tree.append(message.data.clone());
        }
        let version = state.tree.version().expect("non-empty after appends");

        let root = match state.tree.historical_agg(version) {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "history batch root unavailable");
                drop(state);
                for message in batch {
                    message.complete(None);
                }
                return;
            }
        };

        let payload = signing_bytes(SignatureKind::SingleHistoryTree, version, &root);
        let signature = self.signer.sign(&payload);
        self.metrics.incr_signatures();
        debug!(
            tree_id = state.tree_id,
            version,
            messages = batch.len(),
            root = %root.short(),
            "signed history batch"
        );

        let count = batch.len() as u64;
        let tree_id = state.tree_id;
        let mut contacted: Vec<Bytes> = Vec::with_capacity(batch.len());

        for (i, message) in batch.into_iter().enumerate() {
            let leaf = first_leaf + i as u64;
            contacted.push(message.recipient.clone());

            let blob = build_proof(&state, tree_id, leaf, &message);
            match blob {
                Ok((wire, splice_hints)) => message.complete(Some(SignedBlob {
                    kind: SignatureKind::SingleHistoryTree,
                    signer: self.signer.signer_id().to_vec(),
                    signature: signature.clone(),
                    tree_id,
                    leaf: leaf as u32,
                    splice_hints,
                    tree: Some(wire),
                })),
                Err(e) => {
                    warn!(leaf, error = %e, "proof construction failed");
                    message.complete(None);
                }
            }
        }

        // Recipients of this batch were last contacted at this version; the
        // map is updated only after the batch so in-batch duplicates still
        // hint at the previous batch.
        for recipient in contacted {
            state
                .last_contact
                .insert(recipient, LastContact { tree_id, version });
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

fn build_proof(
    state: &HistoryState,
    tree_id: u64,
    leaf: u64,
    message: &Message,
) -> crate::Result<(crate::wire::PrunedWire, Vec<u32>)> {
    let mut pruned = state.tree.make_pruned()?;
    state.tree.copy_leaf_into(&mut pruned, leaf, true)?;

    let mut splice_hints = Vec::new();
    if let Some(last) = state.last_contact.get(&message.recipient) {
        if last.tree_id == tree_id {
            state.tree.copy_leaf_into(&mut pruned, last.version, false)?;
            splice_hints.push(last.version as u32);
        }
    }
    Ok((to_wire(&pruned), splice_hints))
}
