//! # Message Bus
//!
//! Process-wide registry of typed channels. Each channel keeps its most
//! recently published value and an ordered list of observers.
//!
//! ## Observer disciplines
//!
//! - **Subscriber**: a bounded mailbox drained by its owning module task.
//!   Publishing enqueues a copy; when the mailbox is full the publisher waits,
//!   bounded by the publish timeout, and fails with [`BusError::ChannelFull`].
//! - **Listener**: a callback invoked synchronously on the publisher's task.
//!   Listeners must return quickly and never block.
//!
//! Observers are notified in ascending priority, ties in registration order.
//! Ordering is preserved per (publisher, subscriber, channel); there is no
//! ordering guarantee across channels.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use tracker_core::messaging::{ChannelId, LocationMsg, MessageBus, Subscriber};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = MessageBus::new();
//! bus.define(LocationMsg::SearchDone)?;
//!
//! let mut subscriber = Subscriber::new("example", 4);
//! bus.subscribe(&subscriber, ChannelId::Location, 0)?;
//!
//! bus.publish(LocationMsg::SearchTrigger, Duration::from_secs(1)).await?;
//! let envelope = subscriber.await_message(Duration::from_secs(1)).await;
//! assert!(envelope.is_some());
//! # Ok(())
//! # }
//! ```

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::channel::{ChannelId, ChannelMessage, Envelope};
use super::errors::{BusError, BusResult};
use super::message::Message;
use super::subscriber::Subscriber;

type ListenerFn = Arc<dyn Fn(&Envelope) + Send + Sync>;

#[derive(Clone)]
enum Delivery {
    Mailbox(mpsc::Sender<Envelope>),
    Callback(ListenerFn),
}

#[derive(Clone)]
struct Observer {
    name: String,
    priority: u8,
    delivery: Delivery,
}

struct ChannelEntry {
    retained: Message,
    observers: Vec<Observer>,
}

impl ChannelEntry {
    fn attach(&mut self, channel: ChannelId, observer: Observer) -> BusResult<()> {
        if self.observers.iter().any(|o| o.name == observer.name) {
            return Err(BusError::already_subscribed(channel, observer.name));
        }
        let position = self
            .observers
            .iter()
            .position(|o| o.priority > observer.priority)
            .unwrap_or(self.observers.len());
        self.observers.insert(position, observer);
        Ok(())
    }
}

struct BusInner {
    channels: DashMap<ChannelId, ChannelEntry>,
    sequence: AtomicU64,
}

/// Shared handle to the channel registry
///
/// Cloning is cheap; all clones refer to the same registry.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Create an empty bus with no channels defined
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: DashMap::new(),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Define the channel for `M` with its initial retained value
    pub fn define<M: ChannelMessage>(&self, initial: M) -> BusResult<()> {
        let channel = M::CHANNEL;
        match self.inner.channels.entry(channel) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(BusError::already_defined(channel)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ChannelEntry {
                    retained: initial.into(),
                    observers: Vec::new(),
                });
                debug!(channel = %channel, "📡 Channel defined");
                Ok(())
            }
        }
    }

    /// Whether `channel` has been defined
    pub fn is_defined(&self, channel: ChannelId) -> bool {
        self.inner.channels.contains_key(&channel)
    }

    /// Attach a subscriber's mailbox to `channel`
    pub fn subscribe(
        &self,
        subscriber: &Subscriber,
        channel: ChannelId,
        priority: u8,
    ) -> BusResult<()> {
        let observer = Observer {
            name: subscriber.name().to_string(),
            priority,
            delivery: Delivery::Mailbox(subscriber.mailbox()),
        };
        self.attach(channel, observer)?;
        debug!(channel = %channel, subscriber = %subscriber.name(), priority, "📬 Subscriber attached");
        Ok(())
    }

    /// Attach a synchronous listener to `channel`
    pub fn add_listener<F>(
        &self,
        name: impl Into<String>,
        channel: ChannelId,
        priority: u8,
        callback: F,
    ) -> BusResult<()>
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let name = name.into();
        let observer = Observer {
            name: name.clone(),
            priority,
            delivery: Delivery::Callback(Arc::new(callback)),
        };
        self.attach(channel, observer)?;
        debug!(channel = %channel, listener = %name, priority, "👂 Listener attached");
        Ok(())
    }

    fn attach(&self, channel: ChannelId, observer: Observer) -> BusResult<()> {
        let mut entry = self
            .inner
            .channels
            .get_mut(&channel)
            .ok_or(BusError::unknown_channel(channel))?;
        entry.attach(channel, observer)
    }

    /// Publish a typed payload on its channel
    ///
    /// The whole publish, across all subscribers, completes within `timeout`
    /// or fails with [`BusError::ChannelFull`].
    pub async fn publish<M: ChannelMessage>(&self, message: M, timeout: Duration) -> BusResult<()> {
        self.publish_message(message.into(), timeout).await
    }

    /// Publish an already wrapped message on the channel it belongs to
    pub async fn publish_message(&self, message: Message, timeout: Duration) -> BusResult<()> {
        let channel = message.channel();
        let deadline = Instant::now() + timeout;

        // The registry guard must not live across an await
        let (envelope, observers) = {
            let mut entry = self
                .inner
                .channels
                .get_mut(&channel)
                .ok_or(BusError::unknown_channel(channel))?;
            entry.retained = message.clone();
            let envelope = Envelope {
                channel,
                message,
                sequence: self.inner.sequence.fetch_add(1, Ordering::Relaxed),
            };
            (envelope, entry.observers.clone())
        };

        trace!(
            channel = %channel,
            sequence = envelope.sequence,
            message = ?envelope.message,
            observers = observers.len(),
            "Publishing"
        );

        for observer in &observers {
            match &observer.delivery {
                Delivery::Callback(callback) => callback(&envelope),
                Delivery::Mailbox(mailbox) => {
                    match tokio::time::timeout_at(deadline, mailbox.send(envelope.clone())).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => {
                            warn!(
                                channel = %channel,
                                subscriber = %observer.name,
                                "⚠️ Subscriber mailbox closed, skipping delivery"
                            );
                        }
                        Err(_) => {
                            return Err(BusError::channel_full(channel, &observer.name, timeout));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Most recently published value on `channel`
    pub fn read(&self, channel: ChannelId) -> BusResult<Message> {
        self.inner
            .channels
            .get(&channel)
            .map(|entry| entry.retained.clone())
            .ok_or(BusError::unknown_channel(channel))
    }

    /// Number of observers attached to `channel`
    pub fn observer_count(&self, channel: ChannelId) -> usize {
        self.inner
            .channels
            .get(&channel)
            .map(|entry| entry.observers.len())
            .unwrap_or(0)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut channels: Vec<ChannelId> = self.inner.channels.iter().map(|e| *e.key()).collect();
        channels.sort();
        f.debug_struct("MessageBus")
            .field("channels", &channels)
            .field("published", &self.inner.sequence.load(Ordering::Relaxed))
            .finish()
    }
}
