//! # Tracker Configuration System
//!
//! Configuration for the orchestration core: sampling and cloud cadence,
//! per-module watchdog timing, bus sizing and the fatal error path.
//!
//! ## Architecture
//!
//! - **Single Source of Truth**: configuration comes from `tracker-config.yaml`
//! - **Environment Awareness**: `development` / `test` / `production` override sections
//! - **Explicit Validation**: the watchdog timing invariant is checked before any
//!   module task is spawned, so a violation is a configuration error and never a
//!   runtime fault
//! - **Safe Defaults**: every section can be omitted
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tracker_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let sampling = manager.config().coordinator.sampling_interval();
//! let publish_timeout = manager.config().bus.publish_timeout();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{modules, system};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring tracker-config.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Environment the configuration was resolved for
    pub environment: String,

    /// Central coordinator cadence and thresholds
    pub coordinator: CoordinatorConfig,

    /// Firmware update orchestrator settings
    pub fota: FotaConfig,

    /// Message bus sizing and publish timeouts
    pub bus: BusConfig,

    /// Watchdog supervisor settings
    pub watchdog: WatchdogConfig,

    /// Fatal error path settings
    pub fatal: FatalErrorConfig,
}

/// Per-module watchdog timing
///
/// The module waits at most `watchdog_timeout_seconds - max_processing_seconds`
/// for a message, so the watchdog is always fed before it would expire even
/// when the handler takes the full processing budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModuleWatchdogConfig {
    pub watchdog_timeout_seconds: u64,
    pub max_processing_seconds: u64,
}

impl ModuleWatchdogConfig {
    /// Get the watchdog timeout as Duration
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_secs(self.watchdog_timeout_seconds)
    }

    /// Get the maximum processing time as Duration
    pub fn max_processing(&self) -> Duration {
        Duration::from_secs(self.max_processing_seconds)
    }

    /// Check the timing invariant for the named module
    pub fn validate(&self, module: &str) -> ConfigResult<()> {
        if self.watchdog_timeout_seconds <= self.max_processing_seconds {
            return Err(ConfigurationError::watchdog_timing(
                module,
                self.watchdog_timeout_seconds,
                self.max_processing_seconds,
            ));
        }
        Ok(())
    }
}

impl Default for ModuleWatchdogConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_seconds: 60,
            max_processing_seconds: 3,
        }
    }
}

/// How the storage module handles collected data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Records are buffered and uploaded in batches by cloud sync
    #[default]
    Buffer,
    /// Records are forwarded as soon as they are produced; sampling only
    /// runs while the cloud is connected
    Passthrough,
}

/// Central coordinator configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub sampling_interval_seconds: u64,
    pub cloud_update_interval_seconds: u64,
    /// Number of stored records that makes storage report `threshold-reached`
    pub storage_threshold: u32,
    /// Mode assumed at boot, until storage confirms a change
    pub initial_storage_mode: StorageMode,
    pub watchdog: ModuleWatchdogConfig,
}

impl CoordinatorConfig {
    /// Get the sampling interval as Duration
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.sampling_interval_seconds)
    }

    /// Get the cloud update interval as Duration
    pub fn cloud_update_interval(&self) -> Duration {
        Duration::from_secs(self.cloud_update_interval_seconds)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sampling_interval_seconds: 600,
            cloud_update_interval_seconds: 3600,
            storage_threshold: 10,
            initial_storage_mode: StorageMode::Buffer,
            watchdog: ModuleWatchdogConfig::default(),
        }
    }
}

/// Firmware update orchestrator configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FotaConfig {
    pub watchdog: ModuleWatchdogConfig,
}

impl Default for FotaConfig {
    fn default() -> Self {
        Self {
            watchdog: ModuleWatchdogConfig {
                watchdog_timeout_seconds: 60,
                max_processing_seconds: 10,
            },
        }
    }
}

/// Message bus configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of each module mailbox
    pub mailbox_capacity: usize,
    /// Time a publish may wait for mailbox space before failing
    pub publish_timeout_ms: u64,
}

impl BusConfig {
    /// Get the publish timeout as Duration
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 8,
            publish_timeout_ms: 1000,
        }
    }
}

/// Watchdog supervisor configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// How often the supervisor checks heartbeat deadlines
    pub check_interval_ms: u64,
    /// Maximum number of supervised module tasks
    pub max_channels: usize,
}

impl WatchdogConfig {
    /// Get the supervisor check interval as Duration
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 1000,
            max_channels: system::DEFAULT_WATCHDOG_CHANNELS,
        }
    }
}

/// Fatal error path configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FatalErrorConfig {
    /// Time between reporting a fatal error and resetting, so logs can drain
    pub grace_period_seconds: u64,
    /// Time between an orderly reset request and the reset, so modules can
    /// act on the messages published just before it
    pub reboot_grace_seconds: u64,
}

impl FatalErrorConfig {
    /// Get the grace period as Duration
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_seconds)
    }

    /// Get the reboot grace period as Duration
    pub fn reboot_grace(&self) -> Duration {
        Duration::from_secs(self.reboot_grace_seconds)
    }
}

impl Default for FatalErrorConfig {
    fn default() -> Self {
        Self {
            grace_period_seconds: 10,
            reboot_grace_seconds: 5,
        }
    }
}

impl TrackerConfig {
    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        if self.coordinator.sampling_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "coordinator.sampling_interval_seconds",
                "0",
                "sampling interval must be greater than 0",
            ));
        }

        if self.coordinator.cloud_update_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "coordinator.cloud_update_interval_seconds",
                "0",
                "cloud update interval must be greater than 0",
            ));
        }

        self.coordinator.watchdog.validate(modules::COORDINATOR)?;
        self.fota.watchdog.validate(modules::FOTA)?;

        if self.bus.mailbox_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "bus.mailbox_capacity",
                "0",
                "mailbox capacity must be greater than 0",
            ));
        }

        if self.bus.publish_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "bus.publish_timeout_ms",
                "0",
                "publish timeout must be greater than 0",
            ));
        }

        if self.watchdog.check_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "watchdog.check_interval_ms",
                "0",
                "check interval must be greater than 0",
            ));
        }

        // The requesting module feeds its watchdog once before the reboot wait
        for (module, watchdog) in [
            (modules::COORDINATOR, &self.coordinator.watchdog),
            (modules::FOTA, &self.fota.watchdog),
        ] {
            if self.fatal.reboot_grace_seconds >= watchdog.watchdog_timeout_seconds {
                return Err(ConfigurationError::invalid_value(
                    "fatal.reboot_grace_seconds",
                    self.fatal.reboot_grace_seconds.to_string(),
                    format!("reboot grace must be shorter than the {module} watchdog timeout"),
                ));
            }
        }

        // Both orchestrating modules must fit in the heartbeat table
        if self.watchdog.max_channels < 2 {
            return Err(ConfigurationError::invalid_value(
                "watchdog.max_channels",
                self.watchdog.max_channels.to_string(),
                "at least 2 watchdog channels are required",
            ));
        }

        Ok(())
    }
}
