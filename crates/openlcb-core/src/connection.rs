//! Egress boundary toward the link layer.

use crate::protocols::message::Message;

/// Sink for outgoing messages.
///
/// Implementations frame the message onto the physical bus. `put` must not
/// block on a network round trip and must not call back into the service
/// that issued it on the same stack.
pub trait Connection: Send + Sync {
    fn put(&self, message: Message);
}

impl<C: Connection + ?Sized> Connection for std::sync::Arc<C> {
    fn put(&self, message: Message) {
        (**self).put(message)
    }
}
