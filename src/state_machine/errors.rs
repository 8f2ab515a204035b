use thiserror::Error;

/// Error types for hierarchical state machine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("State machine '{machine}' has no current state; set_initial was not called")]
    NotStarted { machine: String },

    #[error("State {state} is not present in the table of '{machine}'")]
    UnknownState { machine: String, state: String },

    #[error("Invalid state table for '{machine}': {reason}")]
    InvalidTable { machine: String, reason: String },

    #[error("Transition to {target} requested from an entry or exit behavior of '{machine}'")]
    TransitionOutsideRun { machine: String, target: String },

    #[error("Action execution failed in '{machine}': {reason}")]
    ActionFailed { machine: String, reason: String },
}

impl StateMachineError {
    /// Create an action failed error
    pub fn action_failed(machine: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ActionFailed {
            machine: machine.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid table error
    pub fn invalid_table(machine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTable {
            machine: machine.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for state machine operations and state behaviors
pub type StateMachineResult<T> = Result<T, StateMachineError>;
