//! The per-queue signing thread

use super::BatchQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Drives one batch queue: wake on non-empty or at the epoch boundary,
/// whichever comes first, and process.
///
/// Shutdown is cooperative: the flag is checked each epoch and the queue is
/// drained with one final `process()` before the thread exits.
pub struct QueueRunner {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl QueueRunner {
    pub fn spawn(queue: Arc<dyn BatchQueue>, epoch: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            debug!("queue runner started");
            loop {
                if flag.load(Ordering::Acquire) {
                    break;
                }
                queue.suspend_till_nonempty(epoch);
                queue.process();
            }
            // Final drain.
            queue.process();
            debug!("queue runner stopped");
        });
        QueueRunner {
            handle: Some(handle),
            shutdown,
        }
    }

    /// Signal shutdown and wait for the final drain
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for QueueRunner {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Message, SimpleQueue};
    use crate::{Ed25519Signer, Metrics};
    use parking_lot::Mutex;

    #[test]
    fn test_runner_processes_and_drains() {
        let metrics = Metrics::new();
        let queue = Arc::new(SimpleQueue::new(
            Arc::new(Ed25519Signer::from_seed([4u8; 32])),
            Arc::clone(&metrics),
        ));
        let runner = QueueRunner::spawn(
            Arc::clone(&queue) as Arc<dyn BatchQueue>,
            Duration::from_millis(10),
        );

        let signed = Arc::new(Mutex::new(0usize));
        for _ in 0..4 {
            let signed = Arc::clone(&signed);
            queue.add(Message::new(
                &b"data"[..],
                &b"rcpt"[..],
                &b"auth"[..],
                move |blob| {
                    assert!(blob.is_some());
                    *signed.lock() += 1;
                },
            ));
        }

        runner.shutdown();
        assert_eq!(*signed.lock(), 4);
        assert_eq!(queue.depth(), 0);
    }
}
