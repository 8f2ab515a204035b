//! # Firmware Update Orchestrator
//!
//! Drives an over-the-air update from poll request to reboot. Polling,
//! downloading and applying are done by an [`UpdateDelivery`] backend; this
//! module decides when each step happens and owns the two handshakes that
//! bracket an update:
//!
//! - before an image is applied, the network is disconnected and the
//!   disconnect is confirmed on the network channel;
//! - before the reboot, buffered storage is cleared and the system reset is
//!   requested exactly once.
//!
//! ## State tree
//!
//! ```text
//! Running
//! ├── WaitingForPollRequest (initial)
//! ├── PollingForUpdate
//! ├── DownloadingUpdate
//! ├── WaitingForImageApply
//! ├── ImageApplying
//! ├── RebootPending
//! └── Canceling
//! ```

mod delivery;
mod states;


pub use delivery::{DeliveryError, DeliveryResult, OfflineDelivery, PollOutcome, UpdateDelivery};
pub use states::FotaState;

use tracing::trace;

use self::states::FOTA_MACHINE;
use crate::constants::modules;
use crate::messaging::{ChannelId, Envelope, Message, NetworkMsg};
use crate::orchestration::executor::{ModuleBehavior, Outbox};
use crate::state_machine::{StateMachineContext, StateMachineOwner, StateMachineResult};

/// Last network status seen on the network channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetworkStatus {
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

/// Data shared by the FOTA state behaviors
#[derive(Debug)]
pub struct FotaContext {
    sm: StateMachineContext<FotaState>,
    delivery: Box<dyn UpdateDelivery>,
    outbox: Outbox,
    message: Option<Message>,
    network: NetworkStatus,
    disconnect_confirmed: bool,
    reset_requested: bool,
}

impl StateMachineOwner<FotaState> for FotaContext {
    fn state_machine(&self) -> &StateMachineContext<FotaState> {
        &self.sm
    }

    fn state_machine_mut(&mut self) -> &mut StateMachineContext<FotaState> {
        &mut self.sm
    }
}

/// Firmware update orchestrator module
#[derive(Debug)]
pub struct FotaOrchestrator {
    context: FotaContext,
}

impl FotaOrchestrator {
    const SUBSCRIPTIONS: &'static [ChannelId] = &[ChannelId::Fota, ChannelId::Network];

    /// Create a new orchestrator over `delivery`
    pub fn new(delivery: Box<dyn UpdateDelivery>) -> Self {
        Self {
            context: FotaContext {
                sm: StateMachineContext::new(),
                delivery,
                outbox: Outbox::new(),
                message: None,
                network: NetworkStatus::Unknown,
                disconnect_confirmed: false,
                reset_requested: false,
            },
        }
    }

    pub fn state(&self) -> Option<FotaState> {
        FOTA_MACHINE.current(&self.context)
    }

    pub fn network(&self) -> NetworkStatus {
        self.context.network
    }

    /// Whether the firmware update reset has been requested
    pub fn reset_requested(&self) -> bool {
        self.context.reset_requested
    }

    fn observe_network(&mut self, message: NetworkMsg) {
        let status = match message {
            NetworkMsg::Connected => NetworkStatus::Connected,
            NetworkMsg::Disconnected => NetworkStatus::Disconnected,
            NetworkMsg::Connect | NetworkMsg::Disconnect => return,
        };
        if self.context.network != status {
            trace!(?status, "Network status changed");
            self.context.network = status;
        }
    }
}

impl ModuleBehavior for FotaOrchestrator {
    fn name(&self) -> &'static str {
        modules::FOTA
    }

    fn subscriptions(&self) -> &'static [ChannelId] {
        Self::SUBSCRIPTIONS
    }

    fn start(&mut self) -> StateMachineResult<()> {
        FOTA_MACHINE.validate()?;
        FOTA_MACHINE.set_initial(&mut self.context, FotaState::Running)
    }

    fn handle(&mut self, envelope: Envelope) -> StateMachineResult<()> {
        if let Message::Network(message) = envelope.message {
            self.observe_network(message);
        }
        self.context.message = Some(envelope.message);
        FOTA_MACHINE.run(&mut self.context)
    }

    fn outbox(&mut self) -> &mut Outbox {
        &mut self.context.outbox
    }
}
