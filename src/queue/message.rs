//! Outgoing messages and their completion callbacks

use crate::SignedBlob;
use bytes::Bytes;

/// Callback invoked exactly once per submitted message; `None` signals that
/// signing failed for this message
pub type SignedCallback = Box<dyn FnOnce(Option<SignedBlob>) + Send>;

/// One message submitted to a batch queue
pub struct Message {
    pub data: Bytes,
    pub recipient: Bytes,
    pub author: Bytes,
    on_signed: SignedCallback,
}

impl Message {
    pub fn new(
        data: impl Into<Bytes>,
        recipient: impl Into<Bytes>,
        author: impl Into<Bytes>,
        on_signed: impl FnOnce(Option<SignedBlob>) + Send + 'static,
    ) -> Self {
        Message {
            data: data.into(),
            recipient: recipient.into(),
            author: author.into(),
            on_signed: Box::new(on_signed),
        }
    }

    /// Deliver the signing result, consuming the message
    pub(crate) fn complete(self, blob: Option<SignedBlob>) {
        (self.on_signed)(blob);
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("data_len", &self.data.len())
            .field("recipient", &self.recipient)
            .field("author", &self.author)
            .finish()
    }
}
