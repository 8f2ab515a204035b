//! # Test Helpers
//!
//! Shared fixtures for unit and integration tests: a bus recorder, a reset
//! primitive that records instead of resetting, a scripted update delivery
//! backend and a configuration with short intervals.
//!
//! Tests using these helpers run with paused tokio time, so intervals of
//! minutes cost nothing; [`settle`] lets spawned tasks drain their mailboxes.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{
    BusConfig, CoordinatorConfig, FatalErrorConfig, FotaConfig, ModuleWatchdogConfig,
    StorageMode, TrackerConfig, WatchdogConfig,
};
use crate::messaging::{BusResult, ChannelId, Envelope, Message, MessageBus};
use crate::orchestration::executor::{ResetReason, SystemReset};
use crate::orchestration::fota::{DeliveryError, DeliveryResult, PollOutcome, UpdateDelivery};

/// Wrap a payload in an envelope as the bus would deliver it
pub fn envelope(message: impl Into<Message>) -> Envelope {
    let message = message.into();
    Envelope {
        channel: message.channel(),
        message,
        sequence: 0,
    }
}

/// Let spawned tasks run until they are idle again
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Configuration with short intervals and one second grace periods
pub fn fast_config() -> TrackerConfig {
    let watchdog = ModuleWatchdogConfig {
        watchdog_timeout_seconds: 20,
        max_processing_seconds: 2,
    };
    TrackerConfig {
        environment: "test".to_string(),
        coordinator: CoordinatorConfig {
            sampling_interval_seconds: 30,
            cloud_update_interval_seconds: 120,
            storage_threshold: 10,
            initial_storage_mode: StorageMode::Buffer,
            watchdog,
        },
        fota: FotaConfig { watchdog },
        bus: BusConfig {
            mailbox_capacity: 8,
            publish_timeout_ms: 1000,
        },
        watchdog: WatchdogConfig {
            check_interval_ms: 500,
            max_channels: 4,
        },
        fatal: FatalErrorConfig {
            grace_period_seconds: 1,
            reboot_grace_seconds: 1,
        },
    }
}

/// Records every envelope published on the channels it is attached to
#[derive(Debug, Clone, Default)]
pub struct MessageRecorder {
    envelopes: Arc<Mutex<Vec<Envelope>>>,
}

impl MessageRecorder {
    const LISTENER: &'static str = "test-recorder";

    /// Attach a recorder to every channel in `channels`
    pub fn attach(bus: &MessageBus, channels: &[ChannelId]) -> BusResult<Self> {
        let recorder = Self::default();
        for &channel in channels {
            let envelopes = recorder.envelopes.clone();
            bus.add_listener(Self::LISTENER, channel, 0, move |envelope| {
                envelopes.lock().push(envelope.clone());
            })?;
        }
        Ok(recorder)
    }

    /// Attach a recorder to all channels
    pub fn attach_all(bus: &MessageBus) -> BusResult<Self> {
        Self::attach(bus, &ChannelId::ALL)
    }

    /// Every recorded message in publish order
    pub fn messages(&self) -> Vec<Message> {
        self.envelopes
            .lock()
            .iter()
            .map(|envelope| envelope.message.clone())
            .collect()
    }

    /// Recorded messages on one channel
    pub fn on(&self, channel: ChannelId) -> Vec<Message> {
        self.envelopes
            .lock()
            .iter()
            .filter(|envelope| envelope.channel == channel)
            .map(|envelope| envelope.message.clone())
            .collect()
    }

    /// How many times `message` was published
    pub fn count(&self, message: impl Into<Message>) -> usize {
        let message = message.into();
        self.envelopes
            .lock()
            .iter()
            .filter(|envelope| envelope.message == message)
            .count()
    }

    /// Position of the first publication of `message`
    pub fn position(&self, message: impl Into<Message>) -> Option<usize> {
        let message = message.into();
        self.envelopes
            .lock()
            .iter()
            .position(|envelope| envelope.message == message)
    }

    pub fn clear(&self) {
        self.envelopes.lock().clear();
    }
}

/// Reset primitive that records requests instead of resetting
#[derive(Debug, Default)]
pub struct RecordingReset {
    reasons: Mutex<Vec<ResetReason>>,
}

impl RecordingReset {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reasons(&self) -> Vec<ResetReason> {
        self.reasons.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.reasons.lock().len()
    }
}

impl SystemReset for RecordingReset {
    fn reset(&self, reason: ResetReason) {
        self.reasons.lock().push(reason);
    }
}

/// Calls made on a [`ScriptedDelivery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryCall {
    ProcessPending,
    Poll,
    ApplyImage,
    CancelDownload,
}

#[derive(Debug)]
struct DeliveryScript {
    poll_outcomes: VecDeque<PollOutcome>,
    default_poll_outcome: PollOutcome,
    failures: HashMap<DeliveryCall, String>,
    calls: Vec<DeliveryCall>,
}

/// Update delivery backend driven by the test
///
/// Clones share the same script, so a test keeps one clone to inspect calls
/// after boxing another into the orchestrator.
#[derive(Debug, Clone)]
pub struct ScriptedDelivery {
    script: Arc<Mutex<DeliveryScript>>,
}

impl Default for ScriptedDelivery {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDelivery {
    /// Create a new backend whose polls find no job
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(DeliveryScript {
                poll_outcomes: VecDeque::new(),
                default_poll_outcome: PollOutcome::NoJob,
                failures: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Outcome of every poll not covered by [`queue_poll_outcome`](Self::queue_poll_outcome)
    pub fn set_poll_outcome(&self, outcome: PollOutcome) {
        self.script.lock().default_poll_outcome = outcome;
    }

    /// Outcome of the next unscripted poll only
    pub fn queue_poll_outcome(&self, outcome: PollOutcome) {
        self.script.lock().poll_outcomes.push_back(outcome);
    }

    /// Make the next `call` fail with `reason`
    pub fn fail_next(&self, call: DeliveryCall, reason: impl Into<String>) {
        self.script.lock().failures.insert(call, reason.into());
    }

    pub fn calls(&self) -> Vec<DeliveryCall> {
        self.script.lock().calls.clone()
    }

    pub fn count(&self, call: DeliveryCall) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|made| **made == call)
            .count()
    }

    pub fn boxed(&self) -> Box<dyn UpdateDelivery> {
        Box::new(self.clone())
    }

    fn record(&self, call: DeliveryCall) -> Option<String> {
        let mut script = self.script.lock();
        script.calls.push(call);
        script.failures.remove(&call)
    }
}

impl UpdateDelivery for ScriptedDelivery {
    fn process_pending(&mut self) -> DeliveryResult<()> {
        match self.record(DeliveryCall::ProcessPending) {
            Some(reason) => Err(DeliveryError::pending_job(reason)),
            None => Ok(()),
        }
    }

    fn poll(&mut self) -> DeliveryResult<PollOutcome> {
        if let Some(reason) = self.record(DeliveryCall::Poll) {
            return Err(DeliveryError::poll(reason));
        }
        let mut script = self.script.lock();
        let fallback = script.default_poll_outcome;
        Ok(script.poll_outcomes.pop_front().unwrap_or(fallback))
    }

    fn apply_image(&mut self) -> DeliveryResult<()> {
        match self.record(DeliveryCall::ApplyImage) {
            Some(reason) => Err(DeliveryError::apply(reason)),
            None => Ok(()),
        }
    }

    fn cancel_download(&mut self) -> DeliveryResult<()> {
        match self.record(DeliveryCall::CancelDownload) {
            Some(reason) => Err(DeliveryError::cancel(reason)),
            None => Ok(()),
        }
    }
}
