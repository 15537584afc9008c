//! Dispatcher — the single inbound message queue of a running program.
//!
//! Every message source (timers, topic handlers, cron jobs, HTTP requests)
//! funnels into one unbounded channel, so the engine folds messages strictly
//! one at a time, in arrival order.

use tokio::sync::mpsc;

/// Cheap handle for enqueueing messages into the runtime.
pub struct Dispatcher<M> {
    sender: mpsc::UnboundedSender<M>,
}

impl<M> Dispatcher<M> {
    /// Creates a dispatcher together with the receiving end the engine drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<M>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Enqueues a message. Silently drops it when the runtime has shut down;
    /// late timer fires after shutdown are expected, not errors.
    pub fn dispatch(&self, msg: M) {
        if self.sender.send(msg).is_err() {
            tracing::debug!("runtime stopped, dropping message");
        }
    }
}

// Hand-written Clone: the derive would require `M: Clone`, but the sender
// clones independently of the message type.
impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
