//! FOTA state table and behaviors.

use tracing::{debug, info, warn};

use super::delivery::PollOutcome;
use super::{FotaContext, NetworkStatus};
use crate::messaging::{FotaMsg, Message, NetworkMsg, StorageMsg};
use crate::orchestration::executor::ResetReason;
use crate::state_machine::{
    HierarchicalStateMachine, RunOutcome, StateDescriptor, StateId, StateMachineError,
    StateMachineResult,
};

pub(super) const MACHINE_NAME: &str = "fota";

/// States of the firmware update orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FotaState {
    Running,
    WaitingForPollRequest,
    PollingForUpdate,
    DownloadingUpdate,
    WaitingForImageApply,
    ImageApplying,
    RebootPending,
    Canceling,
}

impl StateId for FotaState {
    fn index(self) -> usize {
        self as usize
    }
}

use FotaState::*;

static FOTA_STATES: [StateDescriptor<FotaState, FotaContext>; 8] = [
    StateDescriptor::new(
        Running,
        None,
        Some(WaitingForPollRequest),
        Some(running_entry),
        Some(running_run),
        None,
    ),
    StateDescriptor::new(
        WaitingForPollRequest,
        Some(Running),
        None,
        None,
        Some(waiting_for_poll_request_run),
        None,
    ),
    StateDescriptor::new(
        PollingForUpdate,
        Some(Running),
        None,
        Some(polling_for_update_entry),
        Some(polling_for_update_run),
        None,
    ),
    StateDescriptor::new(
        DownloadingUpdate,
        Some(Running),
        None,
        None,
        Some(downloading_update_run),
        None,
    ),
    StateDescriptor::new(
        WaitingForImageApply,
        Some(Running),
        None,
        Some(waiting_for_image_apply_entry),
        Some(waiting_for_image_apply_run),
        None,
    ),
    StateDescriptor::new(
        ImageApplying,
        Some(Running),
        None,
        Some(image_applying_entry),
        Some(image_applying_run),
        None,
    ),
    StateDescriptor::new(
        RebootPending,
        Some(Running),
        None,
        Some(reboot_pending_entry),
        Some(reboot_pending_run),
        None,
    ),
    StateDescriptor::new(
        Canceling,
        Some(Running),
        None,
        Some(canceling_entry),
        Some(canceling_run),
        None,
    ),
];

pub(super) static FOTA_MACHINE: HierarchicalStateMachine<FotaState, FotaContext> =
    HierarchicalStateMachine::new(MACHINE_NAME, &FOTA_STATES);

fn fota_message(ctx: &FotaContext) -> Option<FotaMsg> {
    match ctx.message {
        Some(Message::Fota(message)) => Some(message),
        _ => None,
    }
}

fn network_disconnected(ctx: &FotaContext) -> bool {
    matches!(ctx.message, Some(Message::Network(NetworkMsg::Disconnected)))
}

fn delivery_failed(error: super::DeliveryError) -> StateMachineError {
    StateMachineError::action_failed(MACHINE_NAME, error)
}

fn running_entry(ctx: &mut FotaContext) -> StateMachineResult<()> {
    ctx.delivery.process_pending().map_err(delivery_failed)
}

fn running_run(ctx: &mut FotaContext) -> StateMachineResult<RunOutcome> {
    if fota_message(ctx) == Some(FotaMsg::DownloadCancel) {
        ctx.sm.set_state(Canceling);
    }
    Ok(RunOutcome::Handled)
}

fn waiting_for_poll_request_run(ctx: &mut FotaContext) -> StateMachineResult<RunOutcome> {
    match fota_message(ctx) {
        Some(FotaMsg::PollRequest) => ctx.sm.set_state(PollingForUpdate),
        // A job resumed by process_pending reports its download directly
        Some(FotaMsg::DownloadingUpdate) => ctx.sm.set_state(DownloadingUpdate),
        Some(FotaMsg::DownloadCancel) => debug!("No ongoing update, nothing to cancel"),
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn polling_for_update_entry(ctx: &mut FotaContext) -> StateMachineResult<()> {
    match ctx.delivery.poll().map_err(delivery_failed)? {
        PollOutcome::JobAvailable => info!("📦 Update job available, download started"),
        PollOutcome::NoJob => {
            debug!("No update job available");
            ctx.outbox.publish(FotaMsg::NoAvailableUpdate);
        }
        PollOutcome::JobFinished => {
            debug!("Update job finished and reported");
            ctx.outbox.publish(FotaMsg::NoAvailableUpdate);
        }
        PollOutcome::NetworkUnreachable => {
            warn!("⚠️ Update poll failed, network is unreachable");
        }
    }
    Ok(())
}

fn polling_for_update_run(ctx: &mut FotaContext) -> StateMachineResult<RunOutcome> {
    match fota_message(ctx) {
        Some(FotaMsg::DownloadingUpdate) => ctx.sm.set_state(DownloadingUpdate),
        Some(FotaMsg::NoAvailableUpdate) => ctx.sm.set_state(WaitingForPollRequest),
        Some(FotaMsg::PollRequest) => ctx.sm.set_state(PollingForUpdate),
        Some(FotaMsg::DownloadCancel) => debug!("No ongoing download, nothing to cancel"),
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn downloading_update_run(ctx: &mut FotaContext) -> StateMachineResult<RunOutcome> {
    match fota_message(ctx) {
        Some(FotaMsg::ImageApplyNeeded) => ctx.sm.set_state(WaitingForImageApply),
        Some(FotaMsg::SuccessRebootNeeded) => ctx.sm.set_state(RebootPending),
        Some(message) if message.is_download_failure() => {
            warn!(?message, "⚠️ Firmware download ended without an image");
            ctx.sm.set_state(WaitingForPollRequest);
        }
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn waiting_for_image_apply_entry(ctx: &mut FotaContext) -> StateMachineResult<()> {
    ctx.disconnect_confirmed = false;
    if ctx.network == NetworkStatus::Disconnected {
        confirm_disconnect(ctx);
    } else {
        info!("🔌 Requesting network disconnect before applying image");
        ctx.outbox.publish(NetworkMsg::Disconnect);
    }
    Ok(())
}

fn confirm_disconnect(ctx: &mut FotaContext) {
    ctx.disconnect_confirmed = true;
    ctx.outbox.publish(FotaMsg::ImageApply);
}

fn waiting_for_image_apply_run(ctx: &mut FotaContext) -> StateMachineResult<RunOutcome> {
    if network_disconnected(ctx) {
        if !ctx.disconnect_confirmed {
            confirm_disconnect(ctx);
        }
        return Ok(RunOutcome::Handled);
    }

    match fota_message(ctx) {
        Some(FotaMsg::ImageApply) if ctx.disconnect_confirmed => ctx.sm.set_state(ImageApplying),
        Some(FotaMsg::ImageApply) => debug!("Image apply before network disconnect, ignoring"),
        Some(FotaMsg::DownloadCancel) => debug!("Download complete, cancel ignored"),
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn image_applying_entry(ctx: &mut FotaContext) -> StateMachineResult<()> {
    info!("📦 Applying downloaded firmware image");
    ctx.delivery.apply_image().map_err(delivery_failed)
}

fn image_applying_run(ctx: &mut FotaContext) -> StateMachineResult<RunOutcome> {
    match fota_message(ctx) {
        Some(FotaMsg::SuccessRebootNeeded) => ctx.sm.set_state(RebootPending),
        Some(FotaMsg::DownloadCancel) => debug!("Image is being applied, cancel ignored"),
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn reboot_pending_entry(ctx: &mut FotaContext) -> StateMachineResult<()> {
    if ctx.network == NetworkStatus::Disconnected {
        reboot(ctx);
    } else {
        info!("🔌 Requesting network disconnect before reboot");
        ctx.outbox.publish(NetworkMsg::Disconnect);
    }
    Ok(())
}

fn reboot(ctx: &mut FotaContext) {
    if ctx.reset_requested {
        return;
    }
    ctx.reset_requested = true;
    info!("🔄 Firmware update complete, clearing storage and rebooting");
    ctx.outbox.publish(StorageMsg::Clear);
    ctx.outbox.request_reset(ResetReason::FirmwareUpdate);
}

fn reboot_pending_run(ctx: &mut FotaContext) -> StateMachineResult<RunOutcome> {
    if network_disconnected(ctx) {
        reboot(ctx);
    }
    Ok(RunOutcome::Handled)
}

fn canceling_entry(ctx: &mut FotaContext) -> StateMachineResult<()> {
    info!("🛑 Canceling firmware download");
    ctx.delivery.cancel_download().map_err(delivery_failed)
}

fn canceling_run(ctx: &mut FotaContext) -> StateMachineResult<RunOutcome> {
    match fota_message(ctx) {
        Some(FotaMsg::DownloadCanceled) => ctx.sm.set_state(WaitingForPollRequest),
        Some(FotaMsg::DownloadCancel) => debug!("Cancel already in progress"),
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}
