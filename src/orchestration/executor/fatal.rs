//! # Fatal Error Path
//!
//! Recovery from an unrecoverable fault is always a full reset, never a
//! partial module restart. The path reports the fault on the error channel
//! (best effort), flushes logs, waits a grace period so the report can leave
//! the device, then invokes the [`SystemReset`] primitive. It never returns.
//!
//! Orderly resets (a booted firmware image, a reboot commanded from the cloud)
//! take a shorter route: flush logs, wait the reboot grace period so modules
//! can act on what was published just before, then reset.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::constants::{system, FATAL_PUBLISH_TIMEOUT};
use crate::logging::{flush_logs, log_error};
use crate::messaging::{ErrorMsg, MessageBus};

/// Why the system is being reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// A new firmware image is ready to boot
    FirmwareUpdate,
    /// A module hit an unrecoverable error
    FatalError,
    /// A module task stopped feeding its watchdog
    WatchdogTimeout,
    /// The cloud shadow requested a reboot
    CloudCommand,
}

/// Hardware reset primitive
pub trait SystemReset: Send + Sync + fmt::Debug {
    fn reset(&self, reason: ResetReason);
}

/// Hosted reset: terminate the process so a supervisor restarts it
#[derive(Debug, Default)]
pub struct ProcessReset;

impl SystemReset for ProcessReset {
    fn reset(&self, reason: ResetReason) {
        error!(?reason, "🔌 System reset requested, terminating process");
        flush_logs();
        std::process::exit(system::RESET_EXIT_CODE);
    }
}

/// What triggered the fatal path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalCause {
    Error,
    WatchdogExpired,
}

impl FatalCause {
    fn reset_reason(self) -> ResetReason {
        match self {
            FatalCause::Error => ResetReason::FatalError,
            FatalCause::WatchdogExpired => ResetReason::WatchdogTimeout,
        }
    }

    fn report(self, module: &str) -> ErrorMsg {
        let module = module.to_string();
        match self {
            FatalCause::Error => ErrorMsg::Fatal { module },
            FatalCause::WatchdogExpired => ErrorMsg::WatchdogTimeout { module },
        }
    }
}

/// Shared handle to the fatal error path and the reset primitive
#[derive(Debug, Clone)]
pub struct FatalErrorPath {
    bus: MessageBus,
    reset: Arc<dyn SystemReset>,
    grace_period: Duration,
    reboot_grace: Duration,
}

impl FatalErrorPath {
    /// Create a new fatal error path
    ///
    /// Orderly resets wait `grace_period` too until [`Self::with_reboot_grace`]
    /// sets their own delay.
    pub fn new(bus: MessageBus, reset: Arc<dyn SystemReset>, grace_period: Duration) -> Self {
        Self {
            bus,
            reset,
            grace_period,
            reboot_grace: grace_period,
        }
    }

    pub fn with_reboot_grace(mut self, reboot_grace: Duration) -> Self {
        self.reboot_grace = reboot_grace;
        self
    }

    pub fn reboot_grace(&self) -> Duration {
        self.reboot_grace
    }

    /// Report, flush, wait, reset; never returns
    pub async fn escalate(&self, module: &str, cause: FatalCause, reason: String) -> Infallible {
        log_error(module, "fatal_error", &reason, Some(&format!("{cause:?}")));

        if let Err(publish_error) = self
            .bus
            .publish(cause.report(module), FATAL_PUBLISH_TIMEOUT)
            .await
        {
            warn!(module = %module, error = %publish_error, "⚠️ Could not report fatal error on the error channel");
        }

        flush_logs();
        tokio::time::sleep(self.grace_period).await;

        self.reset.reset(cause.reset_reason());

        // Hosted resets in tests return; the task stays parked
        std::future::pending::<Infallible>().await
    }

    /// Flush, wait the reboot grace period, then reset
    ///
    /// Returns only when the reset primitive does (hosted tests).
    pub async fn orderly_reset(&self, module: &str, reason: ResetReason) {
        info!(
            module = %module,
            ?reason,
            reboot_grace = ?self.reboot_grace,
            "🔄 Orderly reset requested"
        );
        flush_logs();
        tokio::time::sleep(self.reboot_grace).await;
        self.reset.reset(reason);
    }
}
