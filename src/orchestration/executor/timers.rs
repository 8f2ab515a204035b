//! One-shot named timers.
//!
//! A timer publishes its [`TimerMsg`] on the timer channel when it expires,
//! so expiries reach the owning module through its mailbox like any other
//! message. Starting a timer that is already running restarts it.

use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::fatal::{FatalCause, FatalErrorPath};
use crate::messaging::{MessageBus, TimerMsg};

/// Timers owned by one module task
#[derive(Debug)]
pub struct TimerService {
    module: &'static str,
    bus: MessageBus,
    publish_timeout: Duration,
    fatal: FatalErrorPath,
    active: HashMap<TimerMsg, JoinHandle<()>>,
}

impl TimerService {
    /// Create a new timer service for `module`
    pub fn new(
        module: &'static str,
        bus: MessageBus,
        publish_timeout: Duration,
        fatal: FatalErrorPath,
    ) -> Self {
        Self {
            module,
            bus,
            publish_timeout,
            fatal,
            active: HashMap::new(),
        }
    }

    /// Start `timer`, replacing any running instance
    pub fn start(&mut self, timer: TimerMsg, delay: Duration) {
        self.cancel(timer);

        let module = self.module;
        let bus = self.bus.clone();
        let fatal = self.fatal.clone();
        let publish_timeout = self.publish_timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(module, ?timer, "Timer expired");
            if let Err(error) = bus.publish(timer, publish_timeout).await {
                match fatal
                    .escalate(module, FatalCause::Error, error.to_string())
                    .await
                {}
            }
        });

        debug!(module, ?timer, ?delay, "⏱️ Timer started");
        self.active.insert(timer, handle);
    }

    /// Stop `timer` if it is running
    pub fn stop(&mut self, timer: TimerMsg) {
        if self.cancel(timer) {
            debug!(module = self.module, ?timer, "⏱️ Timer stopped");
        }
    }

    /// Whether `timer` is scheduled and has not fired yet
    pub fn is_running(&self, timer: TimerMsg) -> bool {
        self.active
            .get(&timer)
            .is_some_and(|handle| !handle.is_finished())
    }

    fn cancel(&mut self, timer: TimerMsg) -> bool {
        match self.active.remove(&timer) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.abort();
        }
    }
}
