//! # Messaging Error Types
//!
//! Structured errors for channel definition, observer registration and
//! delivery.

use std::time::Duration;
use thiserror::Error;

use super::channel::ChannelId;

/// Message bus errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Channel {channel} is already defined")]
    AlreadyDefined { channel: ChannelId },

    #[error("Channel {channel} is not defined")]
    UnknownChannel { channel: ChannelId },

    #[error("Observer '{observer}' is already attached to channel {channel}")]
    AlreadySubscribed { channel: ChannelId, observer: String },

    #[error("Mailbox of '{subscriber}' stayed full for {timeout:?} while publishing on {channel}")]
    ChannelFull {
        channel: ChannelId,
        subscriber: String,
        timeout: Duration,
    },
}

impl BusError {
    /// Create an already defined error
    pub fn already_defined(channel: ChannelId) -> Self {
        Self::AlreadyDefined { channel }
    }

    /// Create an unknown channel error
    pub fn unknown_channel(channel: ChannelId) -> Self {
        Self::UnknownChannel { channel }
    }

    /// Create an already subscribed error
    pub fn already_subscribed(channel: ChannelId, observer: impl Into<String>) -> Self {
        Self::AlreadySubscribed {
            channel,
            observer: observer.into(),
        }
    }

    /// Create a channel full error
    pub fn channel_full(channel: ChannelId, subscriber: impl Into<String>, timeout: Duration) -> Self {
        Self::ChannelFull {
            channel,
            subscriber: subscriber.into(),
            timeout,
        }
    }
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;
