//! Update delivery collaborator.
//!
//! The orchestrator decides *when* to poll, apply or cancel; the delivery
//! backend does the work against the update service. Download progress is
//! reported by the backend itself as [`FotaMsg`](crate::messaging::FotaMsg)
//! publications on the FOTA channel.

use std::fmt;
use thiserror::Error;

/// Result of asking the update service for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A job was found and its download has started
    JobAvailable,
    NoJob,
    /// A previously running job finished and its status was reported
    JobFinished,
    /// The service could not be reached; the next poll request retries
    NetworkUnreachable,
}

/// Delivery backend failures; all of them are fatal to the orchestrator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Failed to process pending update job: {reason}")]
    PendingJob { reason: String },

    #[error("Update poll failed: {reason}")]
    Poll { reason: String },

    #[error("Failed to apply downloaded image: {reason}")]
    Apply { reason: String },

    #[error("Failed to cancel download: {reason}")]
    Cancel { reason: String },
}

impl DeliveryError {
    pub fn pending_job(reason: impl Into<String>) -> Self {
        Self::PendingJob {
            reason: reason.into(),
        }
    }

    pub fn poll(reason: impl Into<String>) -> Self {
        Self::Poll {
            reason: reason.into(),
        }
    }

    pub fn apply(reason: impl Into<String>) -> Self {
        Self::Apply {
            reason: reason.into(),
        }
    }

    pub fn cancel(reason: impl Into<String>) -> Self {
        Self::Cancel {
            reason: reason.into(),
        }
    }
}

/// Result type for delivery operations
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Backend that talks to the firmware update service
pub trait UpdateDelivery: Send + fmt::Debug {
    /// Resume or report a job left over from before the last reset
    fn process_pending(&mut self) -> DeliveryResult<()>;

    fn poll(&mut self) -> DeliveryResult<PollOutcome>;

    /// Mark the downloaded image for installation on next boot
    fn apply_image(&mut self) -> DeliveryResult<()>;

    fn cancel_download(&mut self) -> DeliveryResult<()>;
}

/// Backend for a device without an update service configured
///
/// Every poll finds no job, so the orchestrator stays idle.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineDelivery;

impl UpdateDelivery for OfflineDelivery {
    fn process_pending(&mut self) -> DeliveryResult<()> {
        Ok(())
    }

    fn poll(&mut self) -> DeliveryResult<PollOutcome> {
        Ok(PollOutcome::NoJob)
    }

    fn apply_image(&mut self) -> DeliveryResult<()> {
        Err(DeliveryError::apply("no update service configured"))
    }

    fn cancel_download(&mut self) -> DeliveryResult<()> {
        Ok(())
    }
}
