//! # Messaging Module
//!
//! Typed publish/subscribe channels connecting the tracker modules. Modules
//! never share mutable state; everything crosses module boundaries by value
//! through the [`MessageBus`].

pub mod bus;
pub mod channel;
pub mod errors;
pub mod message;
pub mod subscriber;

pub use bus::MessageBus;
pub use channel::{ChannelId, ChannelMessage, Envelope};
pub use errors::{BusError, BusResult};
pub use message::*;
pub use subscriber::Subscriber;
