//! Batch queues: accumulate messages, sign once per batch

mod history;
mod inbox;
mod merkle;
mod message;
mod runner;
mod simple;

pub use history::{HistoryQueue, DEFAULT_MAX_TREE_SIZE};
pub use inbox::Inbox;
pub use merkle::MerkleQueue;
pub use message::{Message, SignedCallback};
pub use runner::QueueRunner;
pub use simple::SimpleQueue;

use std::time::Duration;

/// Common surface of the three signing queues
pub trait BatchQueue: Send + Sync {
    /// Queue one message for the next batch; never blocks
    fn add(&self, message: Message);

    /// Drain and sign the pending batch; a no-op when nothing is queued
    fn process(&self);

    /// Block until a message is queued or the timeout elapses; returns
    /// whether the queue is non-empty
    fn suspend_till_nonempty(&self, timeout: Duration) -> bool;

    /// Current queue depth, for caller-side backpressure
    fn depth(&self) -> usize;
}
