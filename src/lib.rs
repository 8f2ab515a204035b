#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tracker Core Rust
//!
//! Orchestration core of a battery-powered cellular asset tracker.
//!
//! ## Overview
//!
//! The tracker is a set of independent modules (location, cloud, network,
//! storage, power, buttons, firmware update) that never share mutable state.
//! They exchange typed messages over a publish/subscribe bus, each on its own
//! task with its own bounded mailbox. This crate provides the parts that hold
//! those modules together:
//!
//! - a **message bus** of typed channels with retained values, queued
//!   subscribers and synchronous listeners;
//! - a **hierarchical state machine executor** driven by static state tables;
//! - a **watchdog-supervised task loop** that turns stuck tasks and
//!   unrecoverable errors into a full system reset;
//! - the **central coordinator**, which sequences sampling, cloud sync and
//!   remote configuration;
//! - the **firmware update orchestrator**, which drives an update to reboot.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Channels, payloads, subscribers and the bus
//! - [`state_machine`] - Hierarchical state machine executor
//! - [`orchestration`] - Task loop, coordinator, FOTA orchestrator and bootstrap
//! - [`config`] - YAML configuration with environment overrides
//! - [`error`] - Top-level error type
//! - [`logging`] - Structured logging setup and helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracker_core::config::ConfigManager;
//! use tracker_core::messaging::MessageBus;
//! use tracker_core::orchestration::{ProcessReset, TrackerSystem, UpdateDelivery};
//!
//! # async fn example(delivery: Box<dyn UpdateDelivery>) -> Result<(), Box<dyn std::error::Error>> {
//! tracker_core::logging::init_structured_logging();
//!
//! let manager = ConfigManager::load()?;
//! let bus = MessageBus::new();
//! let system = TrackerSystem::start(manager.config(), bus, delivery, Arc::new(ProcessReset))?;
//!
//! // Device drivers attach to `system.bus()` and exchange messages from here
//! # system.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod orchestration;
pub mod state_machine;
pub mod test_helpers;

pub use config::{ConfigManager, TrackerConfig};
pub use error::{TrackerError, TrackerResult};
pub use messaging::{ChannelId, Envelope, Message, MessageBus, Subscriber};
pub use orchestration::{Coordinator, FotaOrchestrator, TrackerSystem};
