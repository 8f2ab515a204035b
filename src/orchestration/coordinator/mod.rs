//! # Central Coordinator
//!
//! Business-logic state machine sequencing periodic location sampling, cloud
//! synchronization of buffered data, remote reconfiguration through the cloud
//! shadow, and button-triggered actions. While a firmware update downloads,
//! the whole cycle is suppressed and resumed afterwards.
//!
//! The storage module either buffers records until a cloud sync collects
//! them, or passes them straight through. Storage announces its mode on the
//! storage channel and the coordinator follows it: passthrough mode has no
//! cloud-update timer and only samples while connected.
//!
//! ## State tree
//!
//! ```text
//! Running
//! ├── Buffer                  owns the cloud-update timer
//! │   ├── Disconnected
//! │   │   ├── DisconnectedSampling
//! │   │   └── DisconnectedWaiting
//! │   └── Connected
//! │       ├── ConnectedSampling
//! │       ├── ConnectedWaiting
//! │       └── CloudSync
//! └── Passthrough
//!     ├── PassthroughDisconnected
//!     └── PassthroughConnected
//!         ├── PassthroughSampling
//!         └── PassthroughWaiting
//! Fota                        suppresses sampling and sync
//! ├── FotaDownloading
//! ├── FotaApplyingImage
//! └── FotaRebootPending
//! ```
//!
//! The coordinator never touches the bus or timers directly: behaviors queue
//! effects in the outbox and the task loop applies them after each message.

mod states;

#[cfg(test)]
mod tests;

pub use states::CoordinatorState;

use std::time::Duration;
use tokio::time::Instant;

use self::states::COORDINATOR_MACHINE;
use crate::config::{CoordinatorConfig, StorageMode};
use crate::constants::modules;
use crate::messaging::{ChannelId, Envelope, Message, NetworkMsg, ReportedConfig, StorageMsg};
use crate::orchestration::executor::{ModuleBehavior, Outbox};
use crate::state_machine::{StateMachineContext, StateMachineOwner, StateMachineResult};

/// Connectivity branch to enter on a mode change or after an aborted
/// firmware update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connectivity {
    #[default]
    Disconnected,
    Connected,
}

/// Cadence and thresholds, refreshed by shadow configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub sampling_interval_seconds: u64,
    pub cloud_update_interval_seconds: u64,
    pub storage_threshold: u32,
}

impl CoordinatorSettings {
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.sampling_interval_seconds)
    }

    pub fn cloud_update_interval(&self) -> Duration {
        Duration::from_secs(self.cloud_update_interval_seconds)
    }

    /// Configuration as reported back to the cloud shadow
    pub fn reported(&self) -> ReportedConfig {
        ReportedConfig {
            sampling_interval_seconds: self.sampling_interval_seconds,
            cloud_update_interval_seconds: self.cloud_update_interval_seconds,
            storage_threshold: self.storage_threshold,
        }
    }
}

impl From<&CoordinatorConfig> for CoordinatorSettings {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            sampling_interval_seconds: config.sampling_interval_seconds,
            cloud_update_interval_seconds: config.cloud_update_interval_seconds,
            storage_threshold: config.storage_threshold,
        }
    }
}

/// Data shared by the coordinator state behaviors
#[derive(Debug)]
pub struct CoordinatorContext {
    sm: StateMachineContext<CoordinatorState>,
    outbox: Outbox,
    message: Option<Message>,
    settings: CoordinatorSettings,
    /// Start of the most recent location search
    sample_started_at: Option<Instant>,
    search_in_progress: bool,
    sample_timer_armed: bool,
    resume: Connectivity,
    /// Storage mode, remembered across a firmware update
    mode: StorageMode,
    next_session_id: u32,
    open_session: Option<u32>,
}

impl StateMachineOwner<CoordinatorState> for CoordinatorContext {
    fn state_machine(&self) -> &StateMachineContext<CoordinatorState> {
        &self.sm
    }

    fn state_machine_mut(&mut self) -> &mut StateMachineContext<CoordinatorState> {
        &mut self.sm
    }
}

/// Central coordinator module
#[derive(Debug)]
pub struct Coordinator {
    context: CoordinatorContext,
}

impl Coordinator {
    const SUBSCRIPTIONS: &'static [ChannelId] = &[
        ChannelId::Button,
        ChannelId::Cloud,
        ChannelId::Fota,
        ChannelId::Location,
        ChannelId::Network,
        ChannelId::Storage,
        ChannelId::Timer,
    ];

    /// Create a new coordinator with the configured cadence
    pub fn new(config: &CoordinatorConfig) -> Self {
        Self {
            context: CoordinatorContext {
                sm: StateMachineContext::new(),
                outbox: Outbox::new(),
                message: None,
                settings: CoordinatorSettings::from(config),
                sample_started_at: None,
                search_in_progress: false,
                sample_timer_armed: false,
                resume: Connectivity::Disconnected,
                mode: config.initial_storage_mode,
                next_session_id: 0,
                open_session: None,
            },
        }
    }

    pub fn state(&self) -> Option<CoordinatorState> {
        COORDINATOR_MACHINE.current(&self.context)
    }

    /// Whether `state` is active, directly or through one of its children
    pub fn is_in(&self, state: CoordinatorState) -> bool {
        COORDINATOR_MACHINE.is_in(&self.context, state)
    }

    pub fn settings(&self) -> CoordinatorSettings {
        self.context.settings
    }

    /// Connectivity branch a suppressed cycle resumes into
    pub fn resume_connectivity(&self) -> Connectivity {
        self.context.resume
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.context.mode
    }

    /// Batch session opened by the current cloud sync, if any
    pub fn open_session(&self) -> Option<u32> {
        self.context.open_session
    }
}

impl ModuleBehavior for Coordinator {
    fn name(&self) -> &'static str {
        modules::COORDINATOR
    }

    fn subscriptions(&self) -> &'static [ChannelId] {
        Self::SUBSCRIPTIONS
    }

    fn start(&mut self) -> StateMachineResult<()> {
        COORDINATOR_MACHINE.validate()?;

        let ctx = &mut self.context;
        ctx.outbox.publish(NetworkMsg::Connect);
        ctx.outbox.publish(StorageMsg::SetThreshold {
            records: ctx.settings.storage_threshold,
        });

        let initial = Connectivity::Disconnected.entry_state(ctx.mode);
        COORDINATOR_MACHINE.set_initial(ctx, initial)
    }

    fn handle(&mut self, envelope: Envelope) -> StateMachineResult<()> {
        self.context.message = Some(envelope.message);
        COORDINATOR_MACHINE.run(&mut self.context)
    }

    fn outbox(&mut self) -> &mut Outbox {
        &mut self.context.outbox
    }
}
