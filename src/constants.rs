//! # System Constants
//!
//! Names, limits and defaults that define the operational boundaries of the
//! tracker orchestration core. Configuration defaults live on the config
//! structs; the values here are the ones that are not meant to be tuned.

use std::time::Duration;

/// Module names used for watchdog registration, mailbox naming and logging
pub mod modules {
    pub const COORDINATOR: &str = "coordinator";
    pub const FOTA: &str = "fota";
}

/// System-wide limits
pub mod system {
    /// Maximum number of module tasks the watchdog can supervise by default
    pub const DEFAULT_WATCHDOG_CHANNELS: usize = 8;

    /// Upper bound on a configuration file read from disk
    pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

    /// Process exit code used by the hosted reset primitive
    pub const RESET_EXIT_CODE: i32 = 75;
}

/// Publish timeout used when the fatal path reports on the error channel
pub const FATAL_PUBLISH_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration file names searched for, in order of preference
pub const CONFIG_FILE_NAMES: [&str; 2] = ["tracker-config.yaml", "tracker-config.yml"];

/// Environment variable selecting the configuration environment
pub const ENVIRONMENT_VAR: &str = "TRACKER_ENV";

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_VAR: &str = "TRACKER_CONFIG_DIR";

/// Environments recognized as override sections in the configuration file
pub const KNOWN_ENVIRONMENTS: [&str; 3] = ["development", "test", "production"];
