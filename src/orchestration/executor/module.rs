//! # Module Task Loop
//!
//! Every orchestrating module runs in its own task with the same shape:
//! register a watchdog channel, subscribe a bounded mailbox to the module's
//! channels, start the module's state machine, then alternate between feeding
//! the watchdog and waiting for the next message.
//!
//! The wait is bounded by `watchdog_timeout - max_processing`, so a module
//! whose handlers stay within their processing budget always feeds the
//! watchdog in time. Any error from registration, subscription, dispatch or
//! publishing ends the loop on the fatal path.

use std::convert::Infallible;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::effects::{Effect, Outbox};
use super::errors::ExecutorResult;
use super::fatal::{FatalCause, FatalErrorPath};
use super::timers::TimerService;
use super::watchdog::{HeartbeatHandle, Watchdog};
use crate::config::{ConfigResult, ConfigurationError, ModuleWatchdogConfig};
use crate::logging::log_module_operation;
use crate::messaging::{ChannelId, Envelope, MessageBus, Subscriber};
use crate::state_machine::StateMachineResult;

/// Watchdog timing of one module task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleTiming {
    watchdog_timeout: Duration,
    max_processing: Duration,
}

impl ModuleTiming {
    /// Create a new timing; the watchdog timeout must exceed the processing budget
    pub fn new(
        module: &str,
        watchdog_timeout: Duration,
        max_processing: Duration,
    ) -> ConfigResult<Self> {
        if watchdog_timeout <= max_processing {
            return Err(ConfigurationError::watchdog_timing(
                module,
                watchdog_timeout.as_secs(),
                max_processing.as_secs(),
            ));
        }
        Ok(Self {
            watchdog_timeout,
            max_processing,
        })
    }

    pub fn from_config(module: &str, config: &ModuleWatchdogConfig) -> ConfigResult<Self> {
        Self::new(module, config.watchdog_timeout(), config.max_processing())
    }

    pub fn watchdog_timeout(&self) -> Duration {
        self.watchdog_timeout
    }

    pub fn max_processing(&self) -> Duration {
        self.max_processing
    }

    /// Longest the loop may block waiting for a message
    pub fn wait_window(&self) -> Duration {
        self.watchdog_timeout - self.max_processing
    }
}

/// An orchestrating module driven by [`ModuleExecutor`]
///
/// Implementations own their state machine context and an [`Outbox`]. All
/// methods run synchronously on the module task; side effects are queued in
/// the outbox and applied by the executor after each call.
pub trait ModuleBehavior: Send + 'static {
    /// Name used for the watchdog channel, the mailbox and logs
    fn name(&self) -> &'static str;

    /// Channels whose messages are delivered to this module
    fn subscriptions(&self) -> &'static [ChannelId];

    /// Enter the initial state
    fn start(&mut self) -> StateMachineResult<()>;

    /// Dispatch one message through the state machine
    fn handle(&mut self, envelope: Envelope) -> StateMachineResult<()>;

    fn outbox(&mut self) -> &mut Outbox;
}

/// Runs one [`ModuleBehavior`] as a watchdog-supervised task
#[derive(Debug)]
pub struct ModuleExecutor<M> {
    module: M,
    bus: MessageBus,
    watchdog: Watchdog,
    fatal: FatalErrorPath,
    timing: ModuleTiming,
    mailbox_capacity: usize,
    publish_timeout: Duration,
}

impl<M: ModuleBehavior> ModuleExecutor<M> {
    /// Create a new executor for `module`
    pub fn new(
        module: M,
        bus: MessageBus,
        watchdog: Watchdog,
        fatal: FatalErrorPath,
        timing: ModuleTiming,
    ) -> Self {
        Self {
            module,
            bus,
            watchdog,
            fatal,
            timing,
            mailbox_capacity: 8,
            publish_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Register and subscribe now, then run the loop on a new task
    ///
    /// Registration happens before this returns, so messages published right
    /// after `spawn` already reach the module's mailbox.
    pub fn spawn(self) -> JoinHandle<()> {
        let name = self.module.name();
        match self.prepare() {
            Ok((heartbeat, subscriber)) => tokio::spawn(self.run(heartbeat, subscriber)),
            Err(error) => {
                let fatal = self.fatal.clone();
                tokio::spawn(async move {
                    match fatal
                        .escalate(name, FatalCause::Error, error.to_string())
                        .await
                    {}
                })
            }
        }
    }

    fn prepare(&self) -> ExecutorResult<(HeartbeatHandle, Subscriber)> {
        let name = self.module.name();
        let heartbeat = self
            .watchdog
            .register(name, self.timing.watchdog_timeout())?;

        let subscriber = Subscriber::new(name, self.mailbox_capacity);
        for &channel in self.module.subscriptions() {
            self.bus.subscribe(&subscriber, channel, 0)?;
        }

        debug!(
            module = name,
            channels = ?self.module.subscriptions(),
            mailbox_capacity = self.mailbox_capacity,
            "📬 Module subscribed"
        );
        Ok((heartbeat, subscriber))
    }

    async fn run(mut self, heartbeat: HeartbeatHandle, mut subscriber: Subscriber) {
        let name = self.module.name();
        let mut timers = TimerService::new(
            name,
            self.bus.clone(),
            self.publish_timeout,
            self.fatal.clone(),
        );

        let error = match self.process(&heartbeat, &mut subscriber, &mut timers).await {
            Ok(never) => match never {},
            Err(error) => error,
        };

        // Stop accepting deliveries so publishers skip this mailbox, and leave
        // the watchdog table so the supervisor does not reset a second time
        drop(subscriber);
        drop(timers);
        drop(heartbeat);
        match self
            .fatal
            .escalate(name, FatalCause::Error, error.to_string())
            .await
        {}
    }

    async fn process(
        &mut self,
        heartbeat: &HeartbeatHandle,
        subscriber: &mut Subscriber,
        timers: &mut TimerService,
    ) -> ExecutorResult<Infallible> {
        let name = self.module.name();

        self.module.start()?;
        self.apply_effects(heartbeat, timers).await?;
        log_module_operation(name, "start", "running", None);

        let wait_window = self.timing.wait_window();
        loop {
            heartbeat.feed()?;

            let Some(envelope) = subscriber.await_message(wait_window).await else {
                continue;
            };

            let started = Instant::now();
            let channel = envelope.channel;
            self.module.handle(envelope)?;
            self.apply_effects(heartbeat, timers).await?;

            let elapsed = started.elapsed();
            if elapsed > self.timing.max_processing() {
                warn!(
                    module = name,
                    %channel,
                    ?elapsed,
                    budget = ?self.timing.max_processing(),
                    "⚠️ Message processing exceeded its budget"
                );
            }
        }
    }

    async fn apply_effects(
        &mut self,
        heartbeat: &HeartbeatHandle,
        timers: &mut TimerService,
    ) -> ExecutorResult<()> {
        for effect in self.module.outbox().take() {
            match effect {
                Effect::Publish(message) => {
                    self.bus
                        .publish_message(message, self.publish_timeout)
                        .await?;
                }
                Effect::StartTimer { timer, delay } => timers.start(timer, delay),
                Effect::StopTimer(timer) => timers.stop(timer),
                Effect::Reset(reason) => {
                    // Publishes queued before the reset are already in the
                    // receivers' mailboxes; the grace period lets them run
                    heartbeat.feed()?;
                    self.fatal
                        .orderly_reset(self.module.name(), reason)
                        .await;
                }
            }
        }
        Ok(())
    }
}
