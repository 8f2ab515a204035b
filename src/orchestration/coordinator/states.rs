//! Coordinator state table and behaviors.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Connectivity, CoordinatorContext};
use crate::config::StorageMode;
use crate::messaging::{
    ButtonMsg, CloudMsg, FotaMsg, LocationMsg, Message, NetworkMsg, PowerMsg, ShadowCommand,
    ShadowConfig, StorageMsg, TimerMsg,
};
use crate::orchestration::executor::ResetReason;
use crate::state_machine::{
    HierarchicalStateMachine, RunOutcome, StateDescriptor, StateId, StateMachineError,
    StateMachineResult,
};

const MACHINE_NAME: &str = "coordinator";

/// States of the central coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorState {
    Running,
    Buffer,
    Disconnected,
    DisconnectedSampling,
    DisconnectedWaiting,
    Connected,
    ConnectedSampling,
    ConnectedWaiting,
    CloudSync,
    Passthrough,
    PassthroughDisconnected,
    PassthroughConnected,
    PassthroughSampling,
    PassthroughWaiting,
    Fota,
    FotaDownloading,
    FotaApplyingImage,
    FotaRebootPending,
}

impl StateId for CoordinatorState {
    fn index(self) -> usize {
        self as usize
    }
}

use CoordinatorState::*;

impl CoordinatorState {
    fn connected_sibling(self) -> Self {
        match self {
            DisconnectedSampling => ConnectedSampling,
            DisconnectedWaiting => ConnectedWaiting,
            other => other,
        }
    }

    fn disconnected_sibling(self) -> Self {
        match self {
            ConnectedSampling => DisconnectedSampling,
            ConnectedWaiting | CloudSync => DisconnectedWaiting,
            other => other,
        }
    }

    fn sampling_sibling(self) -> Self {
        match self {
            DisconnectedWaiting => DisconnectedSampling,
            ConnectedWaiting | CloudSync => ConnectedSampling,
            PassthroughWaiting => PassthroughSampling,
            other => other,
        }
    }

    fn waiting_sibling(self) -> Self {
        match self {
            DisconnectedSampling => DisconnectedWaiting,
            ConnectedSampling => ConnectedWaiting,
            PassthroughSampling => PassthroughWaiting,
            other => other,
        }
    }
}

impl Connectivity {
    /// First leaf entered in `mode` with this connectivity
    ///
    /// Passthrough mode only samples while connected.
    pub(super) fn entry_state(self, mode: StorageMode) -> CoordinatorState {
        match (mode, self) {
            (StorageMode::Buffer, Connectivity::Disconnected) => DisconnectedSampling,
            (StorageMode::Buffer, Connectivity::Connected) => ConnectedSampling,
            (StorageMode::Passthrough, Connectivity::Disconnected) => PassthroughDisconnected,
            (StorageMode::Passthrough, Connectivity::Connected) => PassthroughSampling,
        }
    }
}

static COORDINATOR_STATES: [StateDescriptor<CoordinatorState, CoordinatorContext>; 18] = [
    StateDescriptor::new(
        Running,
        None,
        Some(Buffer),
        None,
        Some(running_run),
        None,
    ),
    StateDescriptor::new(
        Buffer,
        Some(Running),
        Some(Disconnected),
        Some(buffer_entry),
        None,
        Some(buffer_exit),
    ),
    StateDescriptor::new(
        Disconnected,
        Some(Buffer),
        Some(DisconnectedSampling),
        Some(disconnected_entry),
        Some(disconnected_run),
        None,
    ),
    StateDescriptor::new(
        DisconnectedSampling,
        Some(Disconnected),
        None,
        Some(sampling_entry),
        Some(sampling_run),
        None,
    ),
    StateDescriptor::new(
        DisconnectedWaiting,
        Some(Disconnected),
        None,
        Some(waiting_entry),
        Some(waiting_run),
        Some(waiting_exit),
    ),
    StateDescriptor::new(
        Connected,
        Some(Buffer),
        Some(ConnectedSampling),
        Some(connected_entry),
        Some(connected_run),
        None,
    ),
    StateDescriptor::new(
        ConnectedSampling,
        Some(Connected),
        None,
        Some(sampling_entry),
        Some(sampling_run),
        None,
    ),
    StateDescriptor::new(
        ConnectedWaiting,
        Some(Connected),
        None,
        Some(waiting_entry),
        Some(waiting_run),
        Some(waiting_exit),
    ),
    StateDescriptor::new(
        CloudSync,
        Some(Connected),
        None,
        Some(cloud_sync_entry),
        Some(cloud_sync_run),
        Some(cloud_sync_exit),
    ),
    StateDescriptor::new(
        Passthrough,
        Some(Running),
        Some(PassthroughDisconnected),
        Some(passthrough_entry),
        None,
        None,
    ),
    StateDescriptor::new(
        PassthroughDisconnected,
        Some(Passthrough),
        None,
        Some(disconnected_entry),
        Some(passthrough_disconnected_run),
        None,
    ),
    StateDescriptor::new(
        PassthroughConnected,
        Some(Passthrough),
        Some(PassthroughSampling),
        Some(connected_entry),
        Some(passthrough_connected_run),
        None,
    ),
    StateDescriptor::new(
        PassthroughSampling,
        Some(PassthroughConnected),
        None,
        Some(sampling_entry),
        Some(sampling_run),
        None,
    ),
    StateDescriptor::new(
        PassthroughWaiting,
        Some(PassthroughConnected),
        None,
        Some(waiting_entry),
        Some(waiting_run),
        Some(waiting_exit),
    ),
    StateDescriptor::new(
        Fota,
        None,
        Some(FotaDownloading),
        Some(fota_entry),
        Some(fota_run),
        None,
    ),
    StateDescriptor::new(
        FotaDownloading,
        Some(Fota),
        None,
        None,
        Some(fota_downloading_run),
        None,
    ),
    StateDescriptor::new(
        FotaApplyingImage,
        Some(Fota),
        None,
        None,
        Some(fota_applying_image_run),
        None,
    ),
    StateDescriptor::new(
        FotaRebootPending,
        Some(Fota),
        None,
        None,
        Some(fota_reboot_pending_run),
        None,
    ),
];

pub(super) static COORDINATOR_MACHINE: HierarchicalStateMachine<
    CoordinatorState,
    CoordinatorContext,
> = HierarchicalStateMachine::new(MACHINE_NAME, &COORDINATOR_STATES);

fn leaf(ctx: &CoordinatorContext) -> StateMachineResult<CoordinatorState> {
    ctx.sm.current().ok_or_else(|| StateMachineError::NotStarted {
        machine: MACHINE_NAME.to_string(),
    })
}

fn message(ctx: &CoordinatorContext) -> Option<Message> {
    ctx.message.clone()
}

fn is_disconnect(message: &Message) -> bool {
    matches!(
        message,
        Message::Cloud(CloudMsg::Disconnected) | Message::Network(NetworkMsg::Disconnected)
    )
}

/// Long press, storage threshold or cloud-update timer
fn is_cloud_sync_trigger(message: &Message) -> bool {
    matches!(
        message,
        Message::Button(ButtonMsg::LongPress { .. })
            | Message::Storage(StorageMsg::ThresholdReached)
            | Message::Timer(TimerMsg::CloudUpdate)
    )
}

fn sample_due(ctx: &CoordinatorContext) -> bool {
    match ctx.sample_started_at {
        Some(started) => started.elapsed() >= ctx.settings.sampling_interval(),
        None => true,
    }
}

fn start_sample_timer(ctx: &mut CoordinatorContext) {
    let interval = ctx.settings.sampling_interval();
    let remaining = match ctx.sample_started_at {
        Some(started) => interval.saturating_sub(started.elapsed()),
        None => interval,
    };
    ctx.outbox.start_timer(TimerMsg::SampleData, remaining);
    ctx.sample_timer_armed = true;
}

fn stop_sample_timer(ctx: &mut CoordinatorContext) {
    ctx.outbox.stop_timer(TimerMsg::SampleData);
    ctx.sample_timer_armed = false;
}

fn start_cloud_timer(ctx: &mut CoordinatorContext) {
    let interval = ctx.settings.cloud_update_interval();
    ctx.outbox.start_timer(TimerMsg::CloudUpdate, interval);
}

fn stop_cloud_timer(ctx: &mut CoordinatorContext) {
    ctx.outbox.stop_timer(TimerMsg::CloudUpdate);
}

/// Ask the update service and the cloud shadow for news
fn publish_poll_triggers(ctx: &mut CoordinatorContext) {
    ctx.outbox.publish(FotaMsg::PollRequest);
    ctx.outbox.publish(CloudMsg::ShadowGetDelta);
}

/// Enter the branch of `mode` matching the current connectivity
fn switch_mode(ctx: &mut CoordinatorContext, mode: StorageMode) {
    if ctx.mode == mode {
        debug!(?mode, "Storage mode unchanged");
        return;
    }
    let target = ctx.resume.entry_state(mode);
    info!(from = ?ctx.mode, to = ?mode, ?target, "💾 Storage mode changed");
    ctx.sm.set_state(target);
}

/// Force a new location search from any Running state
fn force_sample(ctx: &mut CoordinatorContext, target: CoordinatorState) {
    debug!(?target, "🔘 Forced sample requested");
    ctx.search_in_progress = false;
    ctx.sm.set_state(target);
}

/// Apply a shadow configuration document
///
/// Timers are only restarted while they run; in Fota they are stopped and
/// pick up the new values when the cycle resumes.
fn apply_shadow(ctx: &mut CoordinatorContext, config: &ShadowConfig, delta: bool, restart_timers: bool) {
    // Commands still present in the desired section were already executed
    if delta && config.command == Some(ShadowCommand::Provision) {
        info!("☁️ Provisioning requested through the cloud shadow");
        ctx.outbox.publish(CloudMsg::ProvisioningRequest);
    }

    let mut carried_settings = false;
    let mut sampling_changed = false;
    let mut cloud_changed = false;

    if let Some(seconds) = config.sampling_interval_seconds {
        carried_settings = true;
        if seconds == 0 {
            warn!("⚠️ Ignoring zero sampling interval from the cloud shadow");
        } else if seconds != ctx.settings.sampling_interval_seconds {
            ctx.settings.sampling_interval_seconds = seconds;
            sampling_changed = true;
        }
    }

    if let Some(seconds) = config.cloud_update_interval_seconds {
        carried_settings = true;
        if seconds == 0 {
            warn!("⚠️ Ignoring zero cloud update interval from the cloud shadow");
        } else if seconds != ctx.settings.cloud_update_interval_seconds {
            ctx.settings.cloud_update_interval_seconds = seconds;
            cloud_changed = true;
        }
    }

    if let Some(records) = config.storage_threshold {
        carried_settings = true;
        if records != ctx.settings.storage_threshold {
            ctx.settings.storage_threshold = records;
            ctx.outbox.publish(StorageMsg::SetThreshold { records });
        }
    }

    if carried_settings {
        info!(
            sampling_interval_seconds = ctx.settings.sampling_interval_seconds,
            cloud_update_interval_seconds = ctx.settings.cloud_update_interval_seconds,
            storage_threshold = ctx.settings.storage_threshold,
            "⚙️ Shadow configuration applied"
        );

        if restart_timers {
            if sampling_changed && ctx.sample_timer_armed {
                start_sample_timer(ctx);
            }
            // Only buffer mode runs the cloud-update timer
            if cloud_changed && ctx.mode == StorageMode::Buffer {
                start_cloud_timer(ctx);
            }
        }

        ctx.outbox
            .publish(CloudMsg::ShadowUpdateReported(ctx.settings.reported()));
    }

    // Queued last so the report above still leaves the device
    if delta && config.command == Some(ShadowCommand::Reboot) {
        warn!("🔄 Reboot requested through the cloud shadow");
        ctx.outbox.request_reset(ResetReason::CloudCommand);
    }
}

fn running_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    let Some(message) = message(ctx) else {
        return Ok(RunOutcome::Propagate);
    };

    match message {
        Message::Fota(FotaMsg::DownloadingUpdate) => {
            info!("📦 Firmware download started, suspending sampling and sync");
            ctx.sm.set_state(Fota);
        }
        Message::Cloud(CloudMsg::ShadowResponseDesired(config)) => {
            apply_shadow(ctx, &config, false, true);
        }
        Message::Cloud(CloudMsg::ShadowResponseDelta(config)) => {
            apply_shadow(ctx, &config, true, true);
        }
        Message::Cloud(CloudMsg::ShadowResponseEmptyDesired) => {
            debug!("Shadow has no desired configuration, reporting current");
            ctx.outbox
                .publish(CloudMsg::ShadowUpdateReported(ctx.settings.reported()));
        }
        Message::Location(LocationMsg::SearchDone) => {
            ctx.search_in_progress = false;
            ctx.outbox.publish(PowerMsg::BatteryPercentageSampleRequest);
        }
        Message::Storage(StorageMsg::ModeBuffer) => switch_mode(ctx, StorageMode::Buffer),
        Message::Storage(StorageMsg::ModePassthrough) => {
            switch_mode(ctx, StorageMode::Passthrough)
        }
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn buffer_entry(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    ctx.mode = StorageMode::Buffer;
    // A mode change samples at once
    ctx.sample_started_at = None;
    start_cloud_timer(ctx);
    Ok(())
}

fn buffer_exit(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    stop_sample_timer(ctx);
    stop_cloud_timer(ctx);
    Ok(())
}

fn passthrough_entry(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    ctx.mode = StorageMode::Passthrough;
    ctx.sample_started_at = None;
    Ok(())
}

fn passthrough_disconnected_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    let Some(message) = message(ctx) else {
        return Ok(RunOutcome::Propagate);
    };

    match message {
        Message::Cloud(CloudMsg::Connected) => {
            info!("☁️ Cloud connected, passthrough sampling resumes");
            ctx.outbox.publish(FotaMsg::PollRequest);
            ctx.outbox.publish(CloudMsg::ShadowGetDesired);
            ctx.sm.set_state(PassthroughSampling);
        }
        ref trigger @ (Message::Button(_) | Message::Storage(StorageMsg::ThresholdReached)) => {
            debug!(?trigger, "Passthrough mode is idle while disconnected, ignoring");
        }
        ref status if is_disconnect(status) => {}
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn passthrough_connected_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    let Some(message) = message(ctx) else {
        return Ok(RunOutcome::Propagate);
    };

    match message {
        ref status if is_disconnect(status) => {
            info!(?status, "🔌 Connection lost, passthrough sampling paused");
            ctx.sm.set_state(PassthroughDisconnected);
        }
        Message::Button(ButtonMsg::ShortPress { .. }) => force_sample(ctx, PassthroughSampling),
        Message::Button(ButtonMsg::LongPress { .. }) => {
            debug!("☁️ Immediate poll requested");
            publish_poll_triggers(ctx);
        }
        Message::Storage(StorageMsg::ThresholdReached) => {
            debug!("Records are forwarded directly in passthrough mode, ignoring threshold");
        }
        Message::Cloud(CloudMsg::Connected) => {}
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn disconnected_entry(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    ctx.resume = Connectivity::Disconnected;
    Ok(())
}

fn disconnected_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    let Some(message) = message(ctx) else {
        return Ok(RunOutcome::Propagate);
    };

    match message {
        Message::Cloud(CloudMsg::Connected) => {
            info!("☁️ Cloud connected");
            ctx.outbox.publish(FotaMsg::PollRequest);
            ctx.outbox.publish(CloudMsg::ShadowGetDesired);
            let target = leaf(ctx)?.connected_sibling();
            ctx.sm.set_state(target);
        }
        Message::Button(ButtonMsg::ShortPress { .. }) => force_sample(ctx, DisconnectedSampling),
        Message::Timer(TimerMsg::CloudUpdate) => {
            debug!("Cloud update due while disconnected, rescheduling");
            start_cloud_timer(ctx);
        }
        ref trigger if is_cloud_sync_trigger(trigger) => {
            debug!(?trigger, "Cloud sync trigger while disconnected, ignoring");
        }
        ref status if is_disconnect(status) => {}
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn connected_entry(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    ctx.resume = Connectivity::Connected;
    Ok(())
}

fn connected_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    let Some(message) = message(ctx) else {
        return Ok(RunOutcome::Propagate);
    };

    match message {
        ref status if is_disconnect(status) => {
            info!(?status, "🔌 Connection lost");
            let target = leaf(ctx)?.disconnected_sibling();
            ctx.sm.set_state(target);
        }
        Message::Button(ButtonMsg::ShortPress { .. }) => force_sample(ctx, ConnectedSampling),
        ref trigger if is_cloud_sync_trigger(trigger) => {
            debug!(?trigger, "☁️ Cloud sync triggered");
            ctx.sm.set_state(CloudSync);
        }
        Message::Cloud(CloudMsg::Connected) => {}
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn sampling_entry(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    if ctx.search_in_progress {
        return Ok(());
    }
    ctx.search_in_progress = true;
    ctx.sample_started_at = Some(Instant::now());
    debug!("📍 Starting location search");
    ctx.outbox.publish(LocationMsg::SearchTrigger);
    Ok(())
}

fn sampling_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    let Some(message) = message(ctx) else {
        return Ok(RunOutcome::Propagate);
    };

    match message {
        Message::Location(LocationMsg::SearchDone) => {
            ctx.search_in_progress = false;
            ctx.outbox.publish(PowerMsg::BatteryPercentageSampleRequest);
            let current = leaf(ctx)?;
            // Passthrough sends each sample right away
            if current == PassthroughSampling {
                publish_poll_triggers(ctx);
            }
            ctx.sm.set_state(current.waiting_sibling());
        }
        Message::Button(ButtonMsg::ShortPress { .. }) => {
            let target = leaf(ctx)?;
            force_sample(ctx, target);
        }
        Message::Timer(TimerMsg::SampleData) => {
            debug!("Sample timer expired during a search, ignoring");
        }
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn waiting_entry(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    start_sample_timer(ctx);
    Ok(())
}

fn waiting_exit(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    stop_sample_timer(ctx);
    Ok(())
}

fn waiting_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    if ctx.message != Some(Message::Timer(TimerMsg::SampleData)) {
        return Ok(RunOutcome::Propagate);
    }

    if sample_due(ctx) {
        let target = leaf(ctx)?.sampling_sibling();
        ctx.sm.set_state(target);
    } else {
        debug!("Stale sample timer expiry, ignoring");
    }
    Ok(RunOutcome::Handled)
}

fn cloud_sync_entry(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    ctx.next_session_id = ctx.next_session_id.wrapping_add(1);
    let session_id = ctx.next_session_id;
    ctx.open_session = Some(session_id);

    info!(session_id, "☁️ Starting cloud sync");
    ctx.outbox.publish(StorageMsg::BatchRequest { session_id });
    publish_poll_triggers(ctx);

    start_cloud_timer(ctx);
    start_sample_timer(ctx);
    Ok(())
}

fn cloud_sync_exit(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    ctx.open_session = None;
    stop_sample_timer(ctx);
    Ok(())
}

fn cloud_sync_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    let Some(message) = message(ctx) else {
        return Ok(RunOutcome::Propagate);
    };

    match message {
        Message::Storage(StorageMsg::BatchClose { session_id }) => {
            if ctx.open_session == Some(session_id) {
                debug!(session_id, "☁️ Cloud sync batch closed");
                ctx.sm.set_state(ConnectedWaiting);
            } else {
                debug!(session_id, open = ?ctx.open_session, "Batch close for another session, ignoring");
            }
        }
        Message::Timer(TimerMsg::SampleData) => {
            if sample_due(ctx) {
                ctx.sm.set_state(ConnectedSampling);
            } else {
                debug!("Stale sample timer expiry, ignoring");
            }
        }
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

/// Timers were stopped by the exited mode state
fn fota_entry(ctx: &mut CoordinatorContext) -> StateMachineResult<()> {
    // A search interrupted here is repeated on resume
    ctx.search_in_progress = false;
    Ok(())
}

fn fota_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    let Some(message) = message(ctx) else {
        return Ok(RunOutcome::Handled);
    };

    match message {
        Message::Cloud(CloudMsg::Connected) => ctx.resume = Connectivity::Connected,
        ref status if is_disconnect(status) => ctx.resume = Connectivity::Disconnected,
        Message::Storage(StorageMsg::ModeBuffer) => ctx.mode = StorageMode::Buffer,
        Message::Storage(StorageMsg::ModePassthrough) => ctx.mode = StorageMode::Passthrough,
        Message::Fota(status) if status.is_download_failure() => {
            let target = ctx.resume.entry_state(ctx.mode);
            info!(?status, resume = ?target, "📦 Firmware update aborted, resuming");
            ctx.sm.set_state(target);
        }
        Message::Cloud(CloudMsg::ShadowResponseDesired(config)) => {
            apply_shadow(ctx, &config, false, false);
        }
        Message::Cloud(CloudMsg::ShadowResponseDelta(config)) => {
            apply_shadow(ctx, &config, true, false);
        }
        other => debug!(message = ?other, "Suppressed during firmware update"),
    }
    Ok(RunOutcome::Handled)
}

fn fota_downloading_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    match ctx.message {
        Some(Message::Fota(FotaMsg::SuccessRebootNeeded)) => ctx.sm.set_state(FotaRebootPending),
        Some(Message::Fota(FotaMsg::ImageApplyNeeded)) => ctx.sm.set_state(FotaApplyingImage),
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn fota_applying_image_run(ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    match message(ctx) {
        Some(Message::Fota(FotaMsg::SuccessRebootNeeded)) => ctx.sm.set_state(FotaRebootPending),
        // The image is downloaded; the orchestrator no longer reports failures
        Some(Message::Fota(status)) if status.is_download_failure() => {
            debug!(?status, "Image is being applied, download report ignored");
        }
        _ => return Ok(RunOutcome::Propagate),
    }
    Ok(RunOutcome::Handled)
}

fn fota_reboot_pending_run(_ctx: &mut CoordinatorContext) -> StateMachineResult<RunOutcome> {
    Ok(RunOutcome::Handled)
}
