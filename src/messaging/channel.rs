//! Channel identities and the binding between payload types and channels.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::message::Message;

/// Identity of a bus channel
///
/// The set is closed: every channel the firmware uses is known at compile
/// time and is defined once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    Button,
    Cloud,
    Error,
    Fota,
    Location,
    Network,
    Power,
    Storage,
    Timer,
}

impl ChannelId {
    /// Every channel, in definition order
    pub const ALL: [ChannelId; 9] = [
        ChannelId::Button,
        ChannelId::Cloud,
        ChannelId::Error,
        ChannelId::Fota,
        ChannelId::Location,
        ChannelId::Network,
        ChannelId::Power,
        ChannelId::Storage,
        ChannelId::Timer,
    ];

    /// Canonical channel name used in logs
    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Button => "BUTTON_CHAN",
            ChannelId::Cloud => "CLOUD_CHAN",
            ChannelId::Error => "ERROR_CHAN",
            ChannelId::Fota => "FOTA_CHAN",
            ChannelId::Location => "LOCATION_CHAN",
            ChannelId::Network => "NETWORK_CHAN",
            ChannelId::Power => "POWER_CHAN",
            ChannelId::Storage => "STORAGE_CHAN",
            ChannelId::Timer => "TIMER_CHAN",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A payload type that belongs to exactly one channel
///
/// `MessageBus::publish` is generic over this trait, so a payload can only
/// ever be published on the channel it is bound to.
pub trait ChannelMessage: Clone + Into<Message> + Send + 'static {
    const CHANNEL: ChannelId;
}

/// What an observer receives for every publish
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub channel: ChannelId,
    pub message: Message,
    /// Bus-wide publish counter, increasing in publish order
    pub sequence: u64,
}
