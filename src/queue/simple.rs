//! One-signature-per-message queue
//!
//! The baseline: no tree, no amortization. Useful as a control and for
//! traffic too sparse to batch.

use super::{BatchQueue, Inbox, Message};
use crate::wire::{signing_bytes, SignatureKind, SignedBlob};
use crate::{Aggregator, Blake3Aggregator, Metrics, SigningPrimitive};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Signs every message independently
pub struct SimpleQueue {
    inbox: Inbox,
    signer: Arc<dyn SigningPrimitive>,
    agg: Blake3Aggregator,
    metrics: Arc<Metrics>,
}

impl SimpleQueue {
    pub fn new(signer: Arc<dyn SigningPrimitive>, metrics: Arc<Metrics>) -> Self {
        SimpleQueue {
            inbox: Inbox::new(),
            signer,
            agg: Blake3Aggregator,
            metrics,
        }
    }
}

impl BatchQueue for SimpleQueue {
    fn add(&self, message: Message) {
        self.inbox.add(message);
    }

    fn process(&self) {
        let batch = self.inbox.drain();
        if batch.is_empty() {
            return;
        }
        debug!(messages = batch.len(), "signing simple batch");

        let count = batch.len() as u64;
        for message in batch {
            let digest = self.agg.leaf(&message.data);
            let payload = signing_bytes(SignatureKind::SingleMessage, 0, &digest);
            let signature = self.signer.sign(&payload);
            self.metrics.incr_signatures();

            message.complete(Some(SignedBlob {
                kind: SignatureKind::SingleMessage,
                signer: self.signer.signer_id().to_vec(),
                signature,
                tree_id: 0,
                leaf: 0,
                splice_hints: Vec::new(),
                tree: None,
            }));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ed25519Signer;
    use parking_lot::Mutex;

    #[test]
    fn test_one_signature_per_message() {
        let metrics = Metrics::new();
        let queue = SimpleQueue::new(
            Arc::new(Ed25519Signer::from_seed([5u8; 32])),
            Arc::clone(&metrics),
        );

        let blobs = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3u8 {
            let blobs = Arc::clone(&blobs);
            queue.add(Message::new(
                vec![i],
                &b"rcpt"[..],
                &b"auth"[..],
                move |blob| blobs.lock().push(blob),
            ));
        }
        queue.process();

        let blobs = blobs.lock();
        assert_eq!(blobs.len(), 3);
        assert!(blobs.iter().all(|b| b.is_some()));
        assert_eq!(metrics.signatures(), 3);
        assert_eq!(metrics.batches(), 1);
    }

    #[test]
    fn test_empty_process_is_noop() {
        let metrics = Metrics::new();
        let queue = SimpleQueue::new(
            Arc::new(Ed25519Signer::from_seed([5u8; 32])),
            Arc::clone(&metrics),
        );
        queue.process();
        assert_eq!(metrics.batches(), 0);
    }
}
