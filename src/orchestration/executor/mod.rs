//! # Watchdog-Supervised Task Loop
//!
//! Runtime shared by the orchestrating modules: the per-module task loop,
//! the side effects state behaviors request, named timers, the heartbeat
//! watchdog with its supervisor, and the fatal error path.

pub mod effects;
pub mod errors;
pub mod fatal;
pub mod module;
pub mod timers;
pub mod watchdog;

pub use effects::{Effect, Outbox};
pub use errors::{ExecutorError, ExecutorResult};
pub use fatal::{FatalCause, FatalErrorPath, ProcessReset, ResetReason, SystemReset};
pub use module::{ModuleBehavior, ModuleExecutor, ModuleTiming};
pub use timers::TimerService;
pub use watchdog::{HeartbeatHandle, HeartbeatStatus, Watchdog, WatchdogError, WatchdogResult};
