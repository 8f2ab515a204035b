//! Queued observers.
//!
//! A [`Subscriber`] owns a bounded FIFO mailbox. The bus enqueues a copy of
//! every message published on the channels it is attached to; the owning
//! module task drains the mailbox with [`Subscriber::await_message`].

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

use super::channel::Envelope;

/// Named bounded mailbox consumed by a single module task
#[derive(Debug)]
pub struct Subscriber {
    name: String,
    capacity: usize,
    sender: mpsc::Sender<Envelope>,
    receiver: mpsc::Receiver<Envelope>,
}

impl Subscriber {
    /// Create a new subscriber with a mailbox of `capacity` entries
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; configuration validation rejects that
    /// value before any subscriber is built.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            name: name.into(),
            capacity,
            sender,
            receiver,
        }
    }

    /// Name used for registration and diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mailbox capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of envelopes waiting in the mailbox
    pub fn pending(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    /// Wait for the next envelope, or `None` once `timeout` elapses
    ///
    /// Only deliveries made after subscription are reported; retained channel
    /// values are read with `MessageBus::read`.
    pub async fn await_message(&mut self, timeout: Duration) -> Option<Envelope> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(envelope) => envelope,
            Err(_) => {
                trace!(subscriber = %self.name, ?timeout, "No message within wait window");
                None
            }
        }
    }

    /// Take the next envelope without waiting
    pub fn try_next(&mut self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }

    pub(crate) fn mailbox(&self) -> mpsc::Sender<Envelope> {
        self.sender.clone()
    }
}
