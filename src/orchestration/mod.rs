//! # Orchestration
//!
//! The two orchestrating modules of the tracker and the runtime they share.
//!
//! ## Components
//!
//! - **Coordinator**: sequences location sampling, cloud synchronization and
//!   remote reconfiguration, and suspends that cycle during firmware updates
//! - **FotaOrchestrator**: drives an over-the-air update from poll request to
//!   reboot
//! - **Executor**: the watchdog-supervised task loop, named timers and the
//!   fatal error path every module runs under
//! - **TrackerSystem**: brings the above up on a shared message bus

pub mod bootstrap;
pub mod coordinator;
pub mod executor;
pub mod fota;

pub use bootstrap::{SystemStatus, TrackerSystem};
pub use coordinator::{Connectivity, Coordinator, CoordinatorSettings, CoordinatorState};
pub use executor::{
    Effect, FatalErrorPath, ModuleBehavior, ModuleExecutor, ModuleTiming, Outbox, ProcessReset,
    ResetReason, SystemReset, Watchdog,
};
pub use fota::{
    DeliveryError, DeliveryResult, FotaOrchestrator, FotaState, NetworkStatus, OfflineDelivery,
    PollOutcome, UpdateDelivery,
};
