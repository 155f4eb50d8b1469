//! The shared message buffer between producers and a queue's signing thread

use super::Message;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Accumulates messages until the next batch is drained
///
/// `add` never blocks; backpressure is the caller's job via [`len`](Self::len).
/// The signing thread is a single waiter, woken on the empty-to-nonempty
/// transition.
#[derive(Default)]
pub struct Inbox {
    buffer: Mutex<Vec<Message>>,
    nonempty: Condvar,
}

impl Inbox {
    pub fn new() -> Self {
        Inbox::default()
    }

    /// Queue one message; wakes the signing thread if the buffer was empty
    pub fn add(&self, message: Message) {
        let mut buffer = self.buffer.lock();
        let was_empty = buffer.is_empty();
        buffer.push(message);
        if was_empty {
            self.nonempty.notify_one();
        }
    }

    /// Current queue depth
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Block until at least one message is queued or the timeout elapses
    ///
    /// Returns whether the buffer is non-empty.
    pub fn suspend_till_nonempty(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut buffer = self.buffer.lock();
        // Condvar wakeups can be spurious; keep waiting out the deadline.
        while buffer.is_empty() {
            if self.nonempty.wait_until(&mut buffer, deadline).timed_out() {
                break;
            }
        }
        !buffer.is_empty()
    }

    /// Atomically swap out the buffered batch
    ///
    /// Messages added while the batch is being processed land in the next
    /// batch; nothing is lost or processed twice.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.buffer.lock())
    }
}
