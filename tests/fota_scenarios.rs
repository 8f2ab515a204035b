//! Firmware update flows across both orchestrating modules.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{Harness, PUBLISH_TIMEOUT};
use parking_lot::Mutex;
use tracker_core::messaging::{
    ButtonMsg, ChannelId, CloudMsg, ErrorMsg, FotaMsg, LocationMsg, Message, MessageBus,
    NetworkMsg, StorageMsg, Subscriber,
};
use tracker_core::orchestration::{PollOutcome, ResetReason, SystemReset, TrackerSystem};
use tracker_core::test_helpers::{fast_config, settle, DeliveryCall, ScriptedDelivery};

/// Records, for every reset, whether storage had already cleared itself
#[derive(Debug)]
struct ClearAwareReset {
    storage_cleared: Arc<AtomicBool>,
    resets: Mutex<Vec<(ResetReason, bool)>>,
}

impl SystemReset for ClearAwareReset {
    fn reset(&self, reason: ResetReason) {
        let cleared = self.storage_cleared.load(Ordering::SeqCst);
        self.resets.lock().push((reason, cleared));
    }
}

/// Download in progress suppresses the normal cycle until it ends
#[tokio::test(start_paused = true)]
async fn test_download_suppresses_cycle_until_canceled() {
    let harness = Harness::start().await;

    harness.publish(FotaMsg::DownloadingUpdate).await;
    let from = harness.recorder.messages().len();

    harness.publish(CloudMsg::Connected).await;
    harness.publish(ButtonMsg::ShortPress { button: 1 }).await;
    assert_eq!(
        harness.recorder.messages().split_off(from),
        vec![
            Message::Cloud(CloudMsg::Connected),
            Message::Button(ButtonMsg::ShortPress { button: 1 }),
        ]
    );

    // Timers are stopped too
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(harness.recorder.on(ChannelId::Timer).is_empty());
    assert_eq!(harness.recorder.count(LocationMsg::SearchTrigger), 1);

    harness.recorder.clear();
    harness.publish(FotaMsg::DownloadCanceled).await;
    assert_eq!(harness.recorder.count(LocationMsg::SearchTrigger), 1);

    harness.shutdown().await;
}

/// Reboot waits for the network to go down, clears storage, resets once
#[tokio::test(start_paused = true)]
async fn test_reboot_sequence_after_download() {
    let harness = Harness::start().await;

    harness.publish(FotaMsg::DownloadingUpdate).await;
    harness.publish(FotaMsg::SuccessRebootNeeded).await;

    let recorder = &harness.recorder;
    assert_eq!(recorder.count(NetworkMsg::Disconnect), 1);
    assert_eq!(recorder.count(StorageMsg::Clear), 0);
    assert_eq!(harness.reset.count(), 0);

    harness.publish(NetworkMsg::Disconnected).await;
    harness.publish(CloudMsg::Disconnected).await;

    let disconnect = recorder.position(NetworkMsg::Disconnect);
    let clear = recorder.position(StorageMsg::Clear);
    assert!(clear.is_some());
    assert!(disconnect < clear);
    // fast_config waits one second between the request and the reset
    assert_eq!(harness.reset.count(), 0);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.reset.reasons(), vec![ResetReason::FirmwareUpdate]);

    harness.publish(NetworkMsg::Disconnected).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.reset.count(), 1);
    assert_eq!(recorder.count(StorageMsg::Clear), 1);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_image_apply_handshake() {
    let harness = Harness::start().await;

    harness.publish(FotaMsg::DownloadingUpdate).await;
    harness.publish(FotaMsg::ImageApplyNeeded).await;
    assert_eq!(harness.recorder.count(NetworkMsg::Disconnect), 1);
    assert_eq!(harness.delivery.count(DeliveryCall::ApplyImage), 0);

    harness.publish(NetworkMsg::Disconnected).await;
    assert_eq!(harness.recorder.count(FotaMsg::ImageApply), 1);
    assert_eq!(harness.delivery.count(DeliveryCall::ApplyImage), 1);

    harness.publish(FotaMsg::SuccessRebootNeeded).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.reset.reasons(), vec![ResetReason::FirmwareUpdate]);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_finds_update_then_download_fails() {
    let delivery = ScriptedDelivery::new();
    delivery.queue_poll_outcome(PollOutcome::JobAvailable);
    let harness = Harness::start_with_delivery(fast_config(), delivery).await;
    harness.publish(LocationMsg::SearchDone).await;

    harness.publish(CloudMsg::Connected).await;
    assert_eq!(harness.recorder.count(FotaMsg::NoAvailableUpdate), 0);

    harness.publish(FotaMsg::DownloadingUpdate).await;
    harness.publish(FotaMsg::DownloadFailed).await;

    // Resumes the connected cycle with one fresh search
    assert_eq!(harness.recorder.count(LocationMsg::SearchTrigger), 2);

    // And polls normally on the next trigger
    harness.publish(ButtonMsg::LongPress { button: 1 }).await;
    assert_eq!(harness.recorder.count(FotaMsg::NoAvailableUpdate), 1);
    assert_eq!(harness.reset.count(), 0);

    harness.shutdown().await;
}

/// An update backend failure is unrecoverable
#[tokio::test(start_paused = true)]
async fn test_poll_failure_takes_fatal_path() {
    let delivery = ScriptedDelivery::new();
    delivery.fail_next(DeliveryCall::Poll, "modem not responding");
    let harness = Harness::start_with_delivery(fast_config(), delivery).await;

    harness.publish(FotaMsg::PollRequest).await;
    assert_eq!(
        harness.recorder.on(ChannelId::Error),
        vec![Message::Error(ErrorMsg::Fatal {
            module: "fota".to_string()
        })]
    );
    assert_eq!(harness.reset.count(), 0);

    // fast_config waits one second before resetting
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(harness.reset.reasons(), vec![ResetReason::FatalError]);

    harness.shutdown().await;
}

/// Storage acts on the clear request before the firmware update reset
#[tokio::test(start_paused = true)]
async fn test_storage_clears_before_firmware_reset() {
    let bus = MessageBus::new();
    TrackerSystem::define_channels(&bus).unwrap();

    let storage_cleared = Arc::new(AtomicBool::new(false));
    let mut storage = Subscriber::new("storage", 4);
    bus.subscribe(&storage, ChannelId::Storage, 0).unwrap();
    let cleared = storage_cleared.clone();
    let storage_task = tokio::spawn(async move {
        while let Some(envelope) = storage.await_message(Duration::from_secs(3600)).await {
            if envelope.message == Message::Storage(StorageMsg::Clear) {
                cleared.store(true, Ordering::SeqCst);
            }
        }
    });

    let reset = Arc::new(ClearAwareReset {
        storage_cleared,
        resets: Mutex::new(Vec::new()),
    });
    let system = TrackerSystem::start(
        &fast_config(),
        bus.clone(),
        ScriptedDelivery::new().boxed(),
        reset.clone(),
    )
    .unwrap();
    settle().await;

    for message in [
        Message::from(FotaMsg::DownloadingUpdate),
        Message::from(FotaMsg::SuccessRebootNeeded),
        Message::from(NetworkMsg::Disconnected),
    ] {
        bus.publish_message(message, PUBLISH_TIMEOUT).await.unwrap();
        settle().await;
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(*reset.resets.lock(), vec![(ResetReason::FirmwareUpdate, true)]);

    storage_task.abort();
    system.shutdown().await;
}
