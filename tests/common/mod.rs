//! Shared harness for the integration tests.
//!
//! Every test runs the real orchestration core on paused tokio time. The
//! harness stands in for the hardware-facing modules by publishing their
//! messages directly on the bus, and records everything that is published.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tracker_core::config::TrackerConfig;
use tracker_core::messaging::{ChannelMessage, MessageBus};
use tracker_core::orchestration::TrackerSystem;
use tracker_core::test_helpers::{
    fast_config, settle, MessageRecorder, RecordingReset, ScriptedDelivery,
};

pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Harness {
    pub system: TrackerSystem,
    pub recorder: MessageRecorder,
    pub reset: Arc<RecordingReset>,
    pub delivery: ScriptedDelivery,
}

impl Harness {
    /// Start the core with [`fast_config`] and let both modules boot
    pub async fn start() -> Self {
        Self::start_with(fast_config()).await
    }

    pub async fn start_with(config: TrackerConfig) -> Self {
        Self::start_with_delivery(config, ScriptedDelivery::new()).await
    }

    pub async fn start_with_delivery(config: TrackerConfig, delivery: ScriptedDelivery) -> Self {
        let bus = MessageBus::new();
        TrackerSystem::define_channels(&bus).unwrap();
        let recorder = MessageRecorder::attach_all(&bus).unwrap();
        let reset = RecordingReset::new();

        let system = TrackerSystem::start(&config, bus, delivery.boxed(), reset.clone()).unwrap();
        settle().await;

        Self {
            system,
            recorder,
            reset,
            delivery,
        }
    }

    /// Publish as a peripheral module would, then let the core react
    pub async fn publish<M: ChannelMessage>(&self, message: M) {
        self.system.bus().publish(message, PUBLISH_TIMEOUT).await.unwrap();
        settle().await;
    }

    pub async fn shutdown(self) {
        self.system.shutdown().await;
    }
}
