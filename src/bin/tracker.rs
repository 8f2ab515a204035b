//! Tracker Binary
//!
//! Runs the orchestration core on a host until interrupted. Peripheral
//! modules attach to the bus in-process; on its own the core boots, starts
//! sampling and waits for connectivity. A system reset terminates the process
//! so a supervisor can restart it.

use std::sync::Arc;

use tokio::signal;
use tracing::info;

use tracker_core::logging::{flush_logs, init_structured_logging};
use tracker_core::orchestration::{OfflineDelivery, ProcessReset, TrackerSystem};
use tracker_core::{ConfigManager, MessageBus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = ConfigManager::load()?;
    init_structured_logging();

    info!(
        environment = %manager.environment(),
        config_dir = %manager.config_directory().display(),
        "Starting tracker"
    );

    let system = TrackerSystem::start(
        manager.config(),
        MessageBus::new(),
        Box::new(OfflineDelivery),
        Arc::new(ProcessReset),
    )?;

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    system.shutdown().await;
    flush_logs();
    Ok(())
}
