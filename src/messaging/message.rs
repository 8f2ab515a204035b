//! # Channel Payloads
//!
//! One payload enum per channel plus the aggregate [`Message`] type that
//! mailboxes carry. Payloads are plain values: each observer receives its own
//! copy.

use serde::{Deserialize, Serialize};

use super::channel::{ChannelId, ChannelMessage};

/// User input from the device buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonMsg {
    ShortPress { button: u8 },
    LongPress { button: u8 },
}

impl Default for ButtonMsg {
    fn default() -> Self {
        ButtonMsg::ShortPress { button: 0 }
    }
}

/// Partial device configuration delivered through the cloud shadow
///
/// Only the fields present in the shadow document are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub sampling_interval_seconds: Option<u64>,
    pub cloud_update_interval_seconds: Option<u64>,
    pub storage_threshold: Option<u32>,
    pub command: Option<ShadowCommand>,
}

impl ShadowConfig {
    /// Decode a shadow configuration document
    pub fn from_json(document: &str) -> serde_json::Result<Self> {
        serde_json::from_str(document)
    }

    /// Whether the document carries nothing to apply
    pub fn is_empty(&self) -> bool {
        self == &ShadowConfig::default()
    }
}

/// Commands the cloud can issue through the shadow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowCommand {
    Provision,
    Reboot,
}

/// Configuration the device reports back to the cloud shadow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedConfig {
    pub sampling_interval_seconds: u64,
    pub cloud_update_interval_seconds: u64,
    pub storage_threshold: u32,
}

/// Cloud connection status, shadow traffic and provisioning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CloudMsg {
    Connected,
    #[default]
    Disconnected,
    ShadowGetDesired,
    ShadowGetDelta,
    ShadowUpdateReported(ReportedConfig),
    ShadowResponseDesired(ShadowConfig),
    ShadowResponseDelta(ShadowConfig),
    ShadowResponseEmptyDesired,
    ShadowResponseEmptyDelta,
    ProvisioningRequest,
}

/// Fatal conditions reported before a reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorMsg {
    Fatal { module: String },
    WatchdogTimeout { module: String },
}

impl Default for ErrorMsg {
    fn default() -> Self {
        ErrorMsg::Fatal {
            module: String::new(),
        }
    }
}

/// Firmware update requests and status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FotaMsg {
    PollRequest,
    DownloadingUpdate,
    #[default]
    NoAvailableUpdate,
    DownloadFailed,
    DownloadCanceled,
    DownloadRejected,
    DownloadTimedOut,
    ImageApplyNeeded,
    ImageApply,
    SuccessRebootNeeded,
    DownloadCancel,
}

impl FotaMsg {
    /// Download outcomes that end an update attempt without a new image
    pub fn is_download_failure(self) -> bool {
        matches!(
            self,
            FotaMsg::DownloadFailed
                | FotaMsg::DownloadCanceled
                | FotaMsg::DownloadRejected
                | FotaMsg::DownloadTimedOut
        )
    }
}

/// Location search requests and status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LocationMsg {
    SearchTrigger,
    SearchCancel,
    SearchStarted,
    #[default]
    SearchDone,
}

/// Network connectivity requests and status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NetworkMsg {
    Connect,
    Disconnect,
    Connected,
    #[default]
    Disconnected,
}

/// Battery sampling
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum PowerMsg {
    #[default]
    BatteryPercentageSampleRequest,
    BatteryPercentageSampleResponse { percentage: f64 },
}

/// Buffered storage control and status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StorageMsg {
    ThresholdReached,
    BatchRequest { session_id: u32 },
    BatchClose { session_id: u32 },
    SetThreshold { records: u32 },
    #[default]
    Clear,
    /// Storage now buffers records until a cloud sync
    ModeBuffer,
    /// Storage now forwards each record directly
    ModePassthrough,
}

/// Expiry of the coordinator's named timers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimerMsg {
    #[default]
    SampleData,
    CloudUpdate,
}

/// Any payload on any channel
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Button(ButtonMsg),
    Cloud(CloudMsg),
    Error(ErrorMsg),
    Fota(FotaMsg),
    Location(LocationMsg),
    Network(NetworkMsg),
    Power(PowerMsg),
    Storage(StorageMsg),
    Timer(TimerMsg),
}

macro_rules! bind_channels {
    ($($payload:ident => $variant:ident),* $(,)?) => {
        $(
            impl ChannelMessage for $payload {
                const CHANNEL: ChannelId = ChannelId::$variant;
            }

            impl From<$payload> for Message {
                fn from(message: $payload) -> Self {
                    Message::$variant(message)
                }
            }
        )*

        impl Message {
            /// Channel this message travels on
            pub fn channel(&self) -> ChannelId {
                match self {
                    $(Message::$variant(_) => ChannelId::$variant,)*
                }
            }
        }
    };
}

bind_channels! {
    ButtonMsg => Button,
    CloudMsg => Cloud,
    ErrorMsg => Error,
    FotaMsg => Fota,
    LocationMsg => Location,
    NetworkMsg => Network,
    PowerMsg => Power,
    StorageMsg => Storage,
    TimerMsg => Timer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_bind_to_their_channel() {
        assert_eq!(Message::from(FotaMsg::PollRequest).channel(), ChannelId::Fota);
        assert_eq!(
            Message::from(StorageMsg::BatchRequest { session_id: 1 }).channel(),
            ChannelId::Storage
        );
        assert_eq!(<TimerMsg as ChannelMessage>::CHANNEL, ChannelId::Timer);
        assert_eq!(<ErrorMsg as ChannelMessage>::CHANNEL, ChannelId::Error);
    }

    #[test]
    fn test_download_failure_classification() {
        assert!(FotaMsg::DownloadFailed.is_download_failure());
        assert!(FotaMsg::DownloadCanceled.is_download_failure());
        assert!(FotaMsg::DownloadRejected.is_download_failure());
        assert!(FotaMsg::DownloadTimedOut.is_download_failure());
        assert!(!FotaMsg::SuccessRebootNeeded.is_download_failure());
        assert!(!FotaMsg::DownloadCancel.is_download_failure());
    }

    #[test]
    fn test_shadow_config_decoding() {
        let config = ShadowConfig::from_json(
            r#"{"sampling_interval_seconds": 300, "command": "provision"}"#,
        )
        .unwrap();
        assert_eq!(config.sampling_interval_seconds, Some(300));
        assert_eq!(config.cloud_update_interval_seconds, None);
        assert_eq!(config.command, Some(ShadowCommand::Provision));
        assert!(!config.is_empty());

        assert!(ShadowConfig::from_json("{}").unwrap().is_empty());
        assert!(ShadowConfig::from_json("{\"sampling_interval_seconds\": \"x\"}").is_err());
    }

    #[test]
    fn test_reboot_command_decoding() {
        let config = ShadowConfig::from_json(r#"{"command": "reboot"}"#).unwrap();
        assert_eq!(config.command, Some(ShadowCommand::Reboot));
        assert_eq!(config.sampling_interval_seconds, None);
        assert!(ShadowConfig::from_json(r#"{"command": "selfdestruct"}"#).is_err());
    }
}
