//! # Coordinator State Machine Tests
//!
//! Drive the coordinator synchronously, one envelope at a time, and inspect
//! the effects each dispatch queues. Timing-sensitive tests use paused tokio
//! time so sample cadence can be checked without waiting.

use std::time::Duration;

use super::*;
use crate::config::{CoordinatorConfig, StorageMode};
use crate::messaging::{
    ButtonMsg, CloudMsg, FotaMsg, LocationMsg, PowerMsg, ShadowCommand, ShadowConfig, TimerMsg,
};
use crate::orchestration::executor::{Effect, ResetReason};
use crate::test_helpers::envelope;

const SAMPLING: Duration = Duration::from_secs(600);
const CLOUD: Duration = Duration::from_secs(3600);

fn boot() -> Coordinator {
    let mut coordinator = Coordinator::new(&CoordinatorConfig::default());
    coordinator.start().unwrap();
    coordinator.outbox().take();
    coordinator
}

fn dispatch(coordinator: &mut Coordinator, message: impl Into<Message>) -> Vec<Effect> {
    coordinator.handle(envelope(message)).unwrap();
    coordinator.outbox().take()
}

fn published(effects: &[Effect]) -> Vec<Message> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Publish(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn search_triggers(effects: &[Effect]) -> usize {
    published(effects)
        .iter()
        .filter(|m| **m == Message::Location(LocationMsg::SearchTrigger))
        .count()
}

fn boot_passthrough() -> Coordinator {
    let config = CoordinatorConfig {
        initial_storage_mode: StorageMode::Passthrough,
        ..Default::default()
    };
    let mut coordinator = Coordinator::new(&config);
    coordinator.start().unwrap();
    coordinator.outbox().take();
    coordinator
}

/// Boot, finish the first search and connect to the cloud
fn connected_waiting() -> Coordinator {
    let mut coordinator = boot();
    dispatch(&mut coordinator, LocationMsg::SearchDone);
    dispatch(&mut coordinator, CloudMsg::Connected);
    assert_eq!(coordinator.state(), Some(CoordinatorState::ConnectedWaiting));
    coordinator
}

#[test]
fn test_state_table_is_valid() {
    assert!(COORDINATOR_MACHINE.validate().is_ok());
}

/// Boot requests the network, announces the threshold and samples at once
#[test]
fn test_start_sequence() {
    let mut coordinator = Coordinator::new(&CoordinatorConfig::default());
    coordinator.start().unwrap();

    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedSampling));
    assert_eq!(
        coordinator.outbox().take(),
        vec![
            Effect::Publish(NetworkMsg::Connect.into()),
            Effect::Publish(StorageMsg::SetThreshold { records: 10 }.into()),
            Effect::StartTimer {
                timer: TimerMsg::CloudUpdate,
                delay: CLOUD
            },
            Effect::Publish(LocationMsg::SearchTrigger.into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_search_done_requests_battery_and_waits() {
    let mut coordinator = boot();
    tokio::time::advance(Duration::from_secs(20)).await;

    let effects = dispatch(&mut coordinator, LocationMsg::SearchDone);

    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedWaiting));
    assert_eq!(
        effects,
        vec![
            Effect::Publish(PowerMsg::BatteryPercentageSampleRequest.into()),
            Effect::StartTimer {
                timer: TimerMsg::SampleData,
                delay: SAMPLING - Duration::from_secs(20)
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stale_sample_expiry_is_ignored() {
    let mut coordinator = boot();
    dispatch(&mut coordinator, LocationMsg::SearchDone);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(dispatch(&mut coordinator, TimerMsg::SampleData).is_empty());
    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedWaiting));

    tokio::time::advance(SAMPLING).await;
    let effects = dispatch(&mut coordinator, TimerMsg::SampleData);
    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedSampling));
    assert_eq!(search_triggers(&effects), 1);
    assert!(effects.contains(&Effect::StopTimer(TimerMsg::SampleData)));
}

#[test]
fn test_short_press_forces_sample_in_any_running_state() {
    let mut coordinator = boot();

    // Sampling: re-trigger
    let effects = dispatch(&mut coordinator, ButtonMsg::ShortPress { button: 1 });
    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedSampling));
    assert_eq!(search_triggers(&effects), 1);

    // Waiting
    dispatch(&mut coordinator, LocationMsg::SearchDone);
    let effects = dispatch(&mut coordinator, ButtonMsg::ShortPress { button: 1 });
    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedSampling));
    assert_eq!(search_triggers(&effects), 1);

    // Cloud sync
    dispatch(&mut coordinator, LocationMsg::SearchDone);
    dispatch(&mut coordinator, CloudMsg::Connected);
    dispatch(&mut coordinator, ButtonMsg::LongPress { button: 1 });
    assert_eq!(coordinator.state(), Some(CoordinatorState::CloudSync));
    let effects = dispatch(&mut coordinator, ButtonMsg::ShortPress { button: 1 });
    assert_eq!(coordinator.state(), Some(CoordinatorState::ConnectedSampling));
    assert_eq!(search_triggers(&effects), 1);
}

/// Cloud connect polls for updates and fetches the desired config, in order
#[test]
fn test_cloud_connect_moves_to_connected_sibling() {
    let mut coordinator = boot();

    let effects = dispatch(&mut coordinator, CloudMsg::Connected);

    assert_eq!(coordinator.state(), Some(CoordinatorState::ConnectedSampling));
    assert_eq!(
        published(&effects),
        vec![
            Message::Fota(FotaMsg::PollRequest),
            Message::Cloud(CloudMsg::ShadowGetDesired)
        ]
    );
    assert_eq!(coordinator.resume_connectivity(), Connectivity::Connected);

    let mut coordinator = boot();
    dispatch(&mut coordinator, LocationMsg::SearchDone);
    dispatch(&mut coordinator, CloudMsg::Connected);
    assert_eq!(coordinator.state(), Some(CoordinatorState::ConnectedWaiting));
}

#[test]
fn test_disconnect_moves_to_disconnected_sibling() {
    let mut coordinator = connected_waiting();
    dispatch(&mut coordinator, NetworkMsg::Disconnected);
    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedWaiting));
    assert_eq!(coordinator.resume_connectivity(), Connectivity::Disconnected);

    let mut coordinator = boot();
    dispatch(&mut coordinator, CloudMsg::Connected);
    let effects = dispatch(&mut coordinator, CloudMsg::Disconnected);
    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedSampling));
    assert_eq!(search_triggers(&effects), 0);
}

#[test]
fn test_sync_triggers_ignored_while_disconnected() {
    let mut coordinator = boot();
    dispatch(&mut coordinator, LocationMsg::SearchDone);

    for trigger in [
        Message::from(ButtonMsg::LongPress { button: 1 }),
        Message::from(StorageMsg::ThresholdReached),
    ] {
        assert!(dispatch(&mut coordinator, trigger).is_empty());
        assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedWaiting));
    }

    // The cloud timer is only rescheduled
    assert_eq!(
        dispatch(&mut coordinator, TimerMsg::CloudUpdate),
        vec![Effect::StartTimer {
            timer: TimerMsg::CloudUpdate,
            delay: CLOUD
        }]
    );
}

#[test]
fn test_cloud_sync_sequence() {
    let mut coordinator = connected_waiting();

    let effects = dispatch(&mut coordinator, StorageMsg::ThresholdReached);

    assert_eq!(coordinator.state(), Some(CoordinatorState::CloudSync));
    assert_eq!(coordinator.open_session(), Some(1));
    assert_eq!(
        published(&effects),
        vec![
            Message::Storage(StorageMsg::BatchRequest { session_id: 1 }),
            Message::Fota(FotaMsg::PollRequest),
            Message::Cloud(CloudMsg::ShadowGetDelta),
        ]
    );
    assert!(effects.contains(&Effect::StartTimer {
        timer: TimerMsg::CloudUpdate,
        delay: CLOUD
    }));

    // Another session's close does not end this sync
    assert!(dispatch(&mut coordinator, StorageMsg::BatchClose { session_id: 7 }).is_empty());
    assert_eq!(coordinator.state(), Some(CoordinatorState::CloudSync));

    dispatch(&mut coordinator, StorageMsg::BatchClose { session_id: 1 });
    assert_eq!(coordinator.state(), Some(CoordinatorState::ConnectedWaiting));
    assert_eq!(coordinator.open_session(), None);
}

#[test]
fn test_repeated_trigger_restarts_sync() {
    let mut coordinator = connected_waiting();
    dispatch(&mut coordinator, TimerMsg::CloudUpdate);
    assert_eq!(coordinator.open_session(), Some(1));

    let effects = dispatch(&mut coordinator, ButtonMsg::LongPress { button: 1 });

    assert_eq!(coordinator.state(), Some(CoordinatorState::CloudSync));
    assert_eq!(coordinator.open_session(), Some(2));
    assert_eq!(
        published(&effects)[0],
        Message::Storage(StorageMsg::BatchRequest { session_id: 2 })
    );
}

#[test]
fn test_disconnect_aborts_cloud_sync() {
    let mut coordinator = connected_waiting();
    dispatch(&mut coordinator, ButtonMsg::LongPress { button: 1 });

    dispatch(&mut coordinator, CloudMsg::Disconnected);

    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedWaiting));
    assert_eq!(coordinator.open_session(), None);
    assert!(dispatch(&mut coordinator, StorageMsg::BatchClose { session_id: 1 }).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shadow_config_restarts_changed_timers() {
    let mut coordinator = boot();
    tokio::time::advance(Duration::from_secs(100)).await;
    dispatch(&mut coordinator, LocationMsg::SearchDone);

    let config = ShadowConfig {
        sampling_interval_seconds: Some(300),
        storage_threshold: Some(25),
        ..Default::default()
    };
    let effects = dispatch(&mut coordinator, CloudMsg::ShadowResponseDelta(config));

    let settings = coordinator.settings();
    assert_eq!(settings.sampling_interval_seconds, 300);
    assert_eq!(settings.cloud_update_interval_seconds, 3600);
    assert_eq!(settings.storage_threshold, 25);
    assert_eq!(
        effects,
        vec![
            Effect::Publish(StorageMsg::SetThreshold { records: 25 }.into()),
            Effect::StartTimer {
                timer: TimerMsg::SampleData,
                delay: Duration::from_secs(200)
            },
            Effect::Publish(CloudMsg::ShadowUpdateReported(settings.reported()).into()),
        ]
    );
}

#[test]
fn test_shadow_config_during_sampling_waits_for_next_cycle() {
    let mut coordinator = boot();
    let config = ShadowConfig {
        sampling_interval_seconds: Some(60),
        cloud_update_interval_seconds: Some(900),
        ..Default::default()
    };

    let effects = dispatch(&mut coordinator, CloudMsg::ShadowResponseDesired(config));

    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedSampling));
    assert_eq!(
        effects,
        vec![
            Effect::StartTimer {
                timer: TimerMsg::CloudUpdate,
                delay: Duration::from_secs(900)
            },
            Effect::Publish(CloudMsg::ShadowUpdateReported(coordinator.settings().reported()).into()),
        ]
    );
}

#[test]
fn test_zero_intervals_are_rejected() {
    let mut coordinator = boot();
    let config = ShadowConfig {
        sampling_interval_seconds: Some(0),
        cloud_update_interval_seconds: Some(0),
        ..Default::default()
    };

    let effects = dispatch(&mut coordinator, CloudMsg::ShadowResponseDelta(config));

    let settings = coordinator.settings();
    assert_eq!(settings.sampling_interval_seconds, 600);
    assert_eq!(settings.cloud_update_interval_seconds, 3600);
    assert_eq!(
        published(&effects),
        vec![Message::Cloud(CloudMsg::ShadowUpdateReported(settings.reported()))]
    );
}

#[test]
fn test_empty_desired_reports_current_config() {
    let mut coordinator = boot();

    let effects = dispatch(&mut coordinator, CloudMsg::ShadowResponseEmptyDesired);

    assert_eq!(
        published(&effects),
        vec![Message::Cloud(CloudMsg::ShadowUpdateReported(
            coordinator.settings().reported()
        ))]
    );
    assert!(dispatch(&mut coordinator, CloudMsg::ShadowResponseEmptyDelta).is_empty());
}

#[test]
fn test_provisioning_command_only_from_delta() {
    let mut coordinator = boot();
    let config = ShadowConfig {
        command: Some(ShadowCommand::Provision),
        ..Default::default()
    };

    assert!(dispatch(&mut coordinator, CloudMsg::ShadowResponseDesired(config.clone())).is_empty());
    assert_eq!(
        published(&dispatch(&mut coordinator, CloudMsg::ShadowResponseDelta(config))),
        vec![Message::Cloud(CloudMsg::ProvisioningRequest)]
    );
}

#[test]
fn test_search_done_outside_sampling_still_samples_battery() {
    let mut coordinator = connected_waiting();
    dispatch(&mut coordinator, ButtonMsg::ShortPress { button: 1 });
    dispatch(&mut coordinator, ButtonMsg::LongPress { button: 1 });
    assert_eq!(coordinator.state(), Some(CoordinatorState::CloudSync));

    let effects = dispatch(&mut coordinator, LocationMsg::SearchDone);

    assert_eq!(coordinator.state(), Some(CoordinatorState::CloudSync));
    assert_eq!(
        published(&effects),
        vec![Message::Power(PowerMsg::BatteryPercentageSampleRequest)]
    );
}

/// While downloading, triggers are acknowledged without side effects
#[test]
fn test_fota_suppresses_cycle_and_resumes_with_one_search() {
    let mut coordinator = boot();

    let effects = dispatch(&mut coordinator, FotaMsg::DownloadingUpdate);
    assert_eq!(coordinator.state(), Some(CoordinatorState::FotaDownloading));
    assert_eq!(
        effects,
        vec![
            Effect::StopTimer(TimerMsg::SampleData),
            Effect::StopTimer(TimerMsg::CloudUpdate)
        ]
    );

    for trigger in [
        Message::from(CloudMsg::Connected),
        Message::from(ButtonMsg::ShortPress { button: 1 }),
        Message::from(ButtonMsg::LongPress { button: 1 }),
        Message::from(StorageMsg::ThresholdReached),
        Message::from(TimerMsg::SampleData),
        Message::from(TimerMsg::CloudUpdate),
        Message::from(LocationMsg::SearchDone),
    ] {
        assert!(dispatch(&mut coordinator, trigger).is_empty());
        assert!(coordinator.is_in(CoordinatorState::Fota));
    }
    assert_eq!(coordinator.resume_connectivity(), Connectivity::Connected);

    let effects = dispatch(&mut coordinator, FotaMsg::DownloadCanceled);
    assert_eq!(coordinator.state(), Some(CoordinatorState::ConnectedSampling));
    assert_eq!(search_triggers(&effects), 1);
    assert!(effects.contains(&Effect::StartTimer {
        timer: TimerMsg::CloudUpdate,
        delay: CLOUD
    }));
}

#[test]
fn test_fota_failure_resumes_remembered_branch() {
    for (failure, disconnect) in [
        (FotaMsg::DownloadFailed, Message::from(NetworkMsg::Disconnected)),
        (FotaMsg::DownloadRejected, Message::from(CloudMsg::Disconnected)),
        (FotaMsg::DownloadTimedOut, Message::from(NetworkMsg::Disconnected)),
    ] {
        let mut coordinator = connected_waiting();
        dispatch(&mut coordinator, FotaMsg::DownloadingUpdate);
        dispatch(&mut coordinator, disconnect);

        dispatch(&mut coordinator, failure);
        assert_eq!(
            coordinator.state(),
            Some(CoordinatorState::DisconnectedSampling),
            "{failure:?}"
        );
    }
}

#[test]
fn test_fota_shadow_config_applies_without_timers() {
    let mut coordinator = connected_waiting();
    dispatch(&mut coordinator, FotaMsg::DownloadingUpdate);

    let config = ShadowConfig {
        cloud_update_interval_seconds: Some(60),
        ..Default::default()
    };
    let effects = dispatch(&mut coordinator, CloudMsg::ShadowResponseDelta(config));

    assert_eq!(coordinator.settings().cloud_update_interval_seconds, 60);
    assert_eq!(
        effects,
        vec![Effect::Publish(
            CloudMsg::ShadowUpdateReported(coordinator.settings().reported()).into()
        )]
    );
}

#[test]
fn test_fota_completion_paths_end_in_reboot_pending() {
    let mut coordinator = boot();
    dispatch(&mut coordinator, FotaMsg::DownloadingUpdate);
    dispatch(&mut coordinator, FotaMsg::ImageApplyNeeded);
    assert_eq!(coordinator.state(), Some(CoordinatorState::FotaApplyingImage));

    dispatch(&mut coordinator, FotaMsg::SuccessRebootNeeded);
    assert_eq!(coordinator.state(), Some(CoordinatorState::FotaRebootPending));

    // Terminal: even a failure report does not resume the cycle
    assert!(dispatch(&mut coordinator, FotaMsg::DownloadFailed).is_empty());
    assert!(dispatch(&mut coordinator, ButtonMsg::ShortPress { button: 1 }).is_empty());
    assert_eq!(coordinator.state(), Some(CoordinatorState::FotaRebootPending));
}

#[test]
fn test_applying_image_ignores_download_failures() {
    let mut coordinator = boot();
    dispatch(&mut coordinator, FotaMsg::DownloadingUpdate);
    dispatch(&mut coordinator, FotaMsg::ImageApplyNeeded);

    for failure in [FotaMsg::DownloadFailed, FotaMsg::DownloadCanceled] {
        assert!(dispatch(&mut coordinator, failure).is_empty());
        assert_eq!(coordinator.state(), Some(CoordinatorState::FotaApplyingImage));
    }

    dispatch(&mut coordinator, FotaMsg::SuccessRebootNeeded);
    assert_eq!(coordinator.state(), Some(CoordinatorState::FotaRebootPending));
}

/// Passthrough boot: no cloud timer and no sampling until connected
#[test]
fn test_passthrough_boot_waits_for_connection() {
    let config = CoordinatorConfig {
        initial_storage_mode: StorageMode::Passthrough,
        ..Default::default()
    };
    let mut coordinator = Coordinator::new(&config);
    coordinator.start().unwrap();

    assert_eq!(coordinator.state(), Some(CoordinatorState::PassthroughDisconnected));
    assert_eq!(coordinator.storage_mode(), StorageMode::Passthrough);
    assert_eq!(
        coordinator.outbox().take(),
        vec![
            Effect::Publish(NetworkMsg::Connect.into()),
            Effect::Publish(StorageMsg::SetThreshold { records: 10 }.into()),
        ]
    );

    for trigger in [
        Message::from(ButtonMsg::ShortPress { button: 1 }),
        Message::from(ButtonMsg::LongPress { button: 1 }),
        Message::from(StorageMsg::ThresholdReached),
        Message::from(TimerMsg::CloudUpdate),
        Message::from(NetworkMsg::Disconnected),
    ] {
        assert!(dispatch(&mut coordinator, trigger).is_empty());
        assert_eq!(coordinator.state(), Some(CoordinatorState::PassthroughDisconnected));
    }

    let effects = dispatch(&mut coordinator, CloudMsg::Connected);
    assert_eq!(coordinator.state(), Some(CoordinatorState::PassthroughSampling));
    assert_eq!(coordinator.resume_connectivity(), Connectivity::Connected);
    assert_eq!(
        published(&effects),
        vec![
            Message::Fota(FotaMsg::PollRequest),
            Message::Cloud(CloudMsg::ShadowGetDesired),
            Message::Location(LocationMsg::SearchTrigger),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_passthrough_samples_are_followed_by_a_poll() {
    let mut coordinator = boot_passthrough();
    dispatch(&mut coordinator, CloudMsg::Connected);

    let effects = dispatch(&mut coordinator, LocationMsg::SearchDone);

    assert_eq!(coordinator.state(), Some(CoordinatorState::PassthroughWaiting));
    assert_eq!(
        effects,
        vec![
            Effect::Publish(PowerMsg::BatteryPercentageSampleRequest.into()),
            Effect::Publish(FotaMsg::PollRequest.into()),
            Effect::Publish(CloudMsg::ShadowGetDelta.into()),
            Effect::StartTimer {
                timer: TimerMsg::SampleData,
                delay: SAMPLING
            },
        ]
    );

    // Long press polls without a batch; the threshold is meaningless here
    assert_eq!(
        published(&dispatch(&mut coordinator, ButtonMsg::LongPress { button: 1 })),
        vec![
            Message::Fota(FotaMsg::PollRequest),
            Message::Cloud(CloudMsg::ShadowGetDelta),
        ]
    );
    assert!(dispatch(&mut coordinator, StorageMsg::ThresholdReached).is_empty());
    assert_eq!(coordinator.state(), Some(CoordinatorState::PassthroughWaiting));
    assert_eq!(coordinator.open_session(), None);

    let effects = dispatch(&mut coordinator, CloudMsg::Disconnected);
    assert_eq!(coordinator.state(), Some(CoordinatorState::PassthroughDisconnected));
    assert_eq!(effects, vec![Effect::StopTimer(TimerMsg::SampleData)]);
}

#[test]
fn test_mode_change_follows_connectivity() {
    let mut coordinator = connected_waiting();

    let effects = dispatch(&mut coordinator, StorageMsg::ModePassthrough);

    assert_eq!(coordinator.state(), Some(CoordinatorState::PassthroughSampling));
    assert_eq!(coordinator.storage_mode(), StorageMode::Passthrough);
    assert_eq!(search_triggers(&effects), 1);
    assert!(effects.contains(&Effect::StopTimer(TimerMsg::CloudUpdate)));
    assert!(!effects.iter().any(|effect| matches!(
        effect,
        Effect::StartTimer {
            timer: TimerMsg::CloudUpdate,
            ..
        }
    )));

    // Confirming the current mode changes nothing
    assert!(dispatch(&mut coordinator, StorageMsg::ModePassthrough).is_empty());

    dispatch(&mut coordinator, CloudMsg::Disconnected);
    let effects = dispatch(&mut coordinator, StorageMsg::ModeBuffer);
    assert_eq!(coordinator.state(), Some(CoordinatorState::DisconnectedSampling));
    assert_eq!(coordinator.storage_mode(), StorageMode::Buffer);
    assert!(effects.contains(&Effect::StartTimer {
        timer: TimerMsg::CloudUpdate,
        delay: CLOUD
    }));
}

#[test]
fn test_passthrough_shadow_config_leaves_cloud_timer_off() {
    let mut coordinator = boot_passthrough();
    let config = ShadowConfig {
        cloud_update_interval_seconds: Some(900),
        ..Default::default()
    };

    let effects = dispatch(&mut coordinator, CloudMsg::ShadowResponseDelta(config));

    assert_eq!(coordinator.settings().cloud_update_interval_seconds, 900);
    assert_eq!(
        effects,
        vec![Effect::Publish(
            CloudMsg::ShadowUpdateReported(coordinator.settings().reported()).into()
        )]
    );
}

#[test]
fn test_fota_remembers_mode_change() {
    let mut coordinator = connected_waiting();
    dispatch(&mut coordinator, FotaMsg::DownloadingUpdate);

    assert!(dispatch(&mut coordinator, StorageMsg::ModePassthrough).is_empty());
    assert!(coordinator.is_in(CoordinatorState::Fota));

    let effects = dispatch(&mut coordinator, FotaMsg::DownloadTimedOut);
    assert_eq!(coordinator.state(), Some(CoordinatorState::PassthroughSampling));
    assert_eq!(search_triggers(&effects), 1);
}

/// The reset is queued after the report so the report still goes out
#[test]
fn test_reboot_command_only_from_delta() {
    let mut coordinator = connected_waiting();
    let config = ShadowConfig {
        storage_threshold: Some(15),
        command: Some(ShadowCommand::Reboot),
        ..Default::default()
    };

    let effects = dispatch(&mut coordinator, CloudMsg::ShadowResponseDesired(config.clone()));
    assert!(!effects.iter().any(|effect| matches!(effect, Effect::Reset(_))));

    let effects = dispatch(
        &mut coordinator,
        CloudMsg::ShadowResponseDelta(ShadowConfig {
            storage_threshold: Some(20),
            ..config.clone()
        }),
    );
    assert_eq!(
        effects,
        vec![
            Effect::Publish(StorageMsg::SetThreshold { records: 20 }.into()),
            Effect::Publish(CloudMsg::ShadowUpdateReported(coordinator.settings().reported()).into()),
            Effect::Reset(ResetReason::CloudCommand),
        ]
    );

    // Also honored while a firmware download suppresses the cycle
    dispatch(&mut coordinator, FotaMsg::DownloadingUpdate);
    let effects = dispatch(&mut coordinator, CloudMsg::ShadowResponseDelta(config));
    assert_eq!(effects.last(), Some(&Effect::Reset(ResetReason::CloudCommand)));
}
