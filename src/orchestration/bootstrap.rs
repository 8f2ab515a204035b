//! # Tracker System Bootstrap
//!
//! Brings the orchestration core up in a fixed order:
//!
//! 1. validate the configuration (the watchdog timing invariant included);
//! 2. define every channel on the bus with its initial retained value;
//! 3. build the watchdog table and the fatal error path;
//! 4. spawn the coordinator and the firmware update orchestrator, each
//!    registered with the watchdog and subscribed before its task starts;
//! 5. spawn the watchdog supervisor.
//!
//! Hardware-facing modules (location, cloud, network, storage, power,
//! buttons) are not part of this core. They attach to the same
//! [`MessageBus`] and exchange messages on the channels defined here.

use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::coordinator::Coordinator;
use super::executor::{
    FatalErrorPath, HeartbeatStatus, ModuleBehavior, ModuleExecutor, ModuleTiming, SystemReset,
    Watchdog,
};
use super::fota::{FotaOrchestrator, UpdateDelivery};
use crate::config::TrackerConfig;
use crate::constants::modules;
use crate::error::TrackerResult;
use crate::messaging::{
    BusResult, ButtonMsg, ChannelMessage, CloudMsg, ErrorMsg, FotaMsg, LocationMsg, MessageBus,
    NetworkMsg, PowerMsg, StorageMsg, TimerMsg,
};

/// Running orchestration core
#[derive(Debug)]
pub struct TrackerSystem {
    environment: String,
    bus: MessageBus,
    watchdog: Watchdog,
    fatal: FatalErrorPath,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

/// Snapshot of a running system
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub environment: String,
    pub running_tasks: usize,
    pub heartbeats: Vec<HeartbeatStatus>,
}

impl TrackerSystem {
    /// Define every channel not yet defined on `bus`
    ///
    /// Callers may define channels up front to attach listeners before the
    /// modules start publishing.
    pub fn define_channels(bus: &MessageBus) -> BusResult<()> {
        define::<ButtonMsg>(bus)?;
        define::<CloudMsg>(bus)?;
        define::<ErrorMsg>(bus)?;
        define::<FotaMsg>(bus)?;
        define::<LocationMsg>(bus)?;
        define::<NetworkMsg>(bus)?;
        define::<PowerMsg>(bus)?;
        define::<StorageMsg>(bus)?;
        define::<TimerMsg>(bus)?;
        Ok(())
    }

    /// Start the orchestration core on `bus`
    ///
    /// Fails without spawning anything when the configuration is invalid.
    /// Once this returns, both modules are registered with the watchdog and
    /// subscribed to their channels.
    pub fn start(
        config: &TrackerConfig,
        bus: MessageBus,
        delivery: Box<dyn UpdateDelivery>,
        reset: Arc<dyn SystemReset>,
    ) -> TrackerResult<Self> {
        config.validate()?;
        let coordinator_timing =
            ModuleTiming::from_config(modules::COORDINATOR, &config.coordinator.watchdog)?;
        let fota_timing = ModuleTiming::from_config(modules::FOTA, &config.fota.watchdog)?;

        info!(
            environment = %config.environment,
            sampling_interval_seconds = config.coordinator.sampling_interval_seconds,
            cloud_update_interval_seconds = config.coordinator.cloud_update_interval_seconds,
            "🚀 Starting tracker orchestration core"
        );

        Self::define_channels(&bus)?;

        let watchdog = Watchdog::new(config.watchdog.max_channels);
        let fatal = FatalErrorPath::new(bus.clone(), reset, config.fatal.grace_period())
            .with_reboot_grace(config.fatal.reboot_grace());

        let mut system = Self {
            environment: config.environment.clone(),
            bus,
            watchdog,
            fatal,
            tasks: Vec::new(),
        };

        system.spawn_module(Coordinator::new(&config.coordinator), coordinator_timing, config);
        system.spawn_module(FotaOrchestrator::new(delivery), fota_timing, config);

        let supervisor = system
            .watchdog
            .spawn_supervisor(config.watchdog.check_interval(), system.fatal.clone());
        system.tasks.push(("watchdog", supervisor));

        info!(tasks = system.tasks.len(), "✅ Tracker orchestration core started");
        Ok(system)
    }

    fn spawn_module<M: ModuleBehavior>(
        &mut self,
        module: M,
        timing: ModuleTiming,
        config: &TrackerConfig,
    ) {
        let name = module.name();
        let handle = ModuleExecutor::new(
            module,
            self.bus.clone(),
            self.watchdog.clone(),
            self.fatal.clone(),
            timing,
        )
        .with_mailbox_capacity(config.bus.mailbox_capacity)
        .with_publish_timeout(config.bus.publish_timeout())
        .spawn();

        debug!(module = name, watchdog_timeout = ?timing.watchdog_timeout(), "🧵 Module task spawned");
        self.tasks.push((name, handle));
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            environment: self.environment.clone(),
            running_tasks: self
                .tasks
                .iter()
                .filter(|(_, handle)| !handle.is_finished())
                .count(),
            heartbeats: self.watchdog.snapshot(),
        }
    }

    /// Abort every task and wait for them to stop
    pub async fn shutdown(self) {
        info!(environment = %self.environment, "🛑 Shutting down tracker orchestration core");
        let handles: Vec<_> = self
            .tasks
            .into_iter()
            .map(|(name, handle)| {
                debug!(task = name, "Aborting task");
                handle.abort();
                handle
            })
            .collect();
        // Aborted tasks resolve with a cancellation error
        join_all(handles).await;
    }
}

fn define<M: ChannelMessage + Default>(bus: &MessageBus) -> BusResult<()> {
    if bus.is_defined(M::CHANNEL) {
        return Ok(());
    }
    bus.define(M::default())
}
