use thiserror::Error;

use super::watchdog::WatchdogError;
use crate::messaging::BusError;
use crate::state_machine::StateMachineError;

/// Errors that end a module task and send it down the fatal path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error(transparent)]
    Watchdog(#[from] WatchdogError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

/// Result type for task loop operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;
