//! # Error Handling
//!
//! Top-level error for bringing the tracker up. Each subsystem keeps its own
//! error type; [`TrackerError`] wraps them so callers can use `?` across
//! subsystem boundaries.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::messaging::BusError;
use crate::orchestration::executor::{ExecutorError, WatchdogError};
use crate::orchestration::fota::DeliveryError;
use crate::state_machine::StateMachineError;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Message bus error: {0}")]
    Bus(#[from] BusError),

    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("Watchdog error: {0}")]
    Watchdog(#[from] WatchdogError),

    #[error("Module task error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Update delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
