//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and a
//! JSON log file, for following message flow between module tasks.

use chrono::Utc;
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::ENVIRONMENT_VAR;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();
static FILE_GUARD: Mutex<Option<WorkerGuard>> = parking_lot::const_mutex(None);

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(env_filter(&log_level));

        let log_dir = PathBuf::from("log");
        if let Err(error) = fs::create_dir_all(&log_dir) {
            // Console-only logging is still useful
            let _ = tracing_subscriber::registry().with(console_layer).try_init();
            tracing::warn!(
                error = %error,
                log_dir = %log_dir.display(),
                "⚠️ STRUCTURED LOGGING: Log directory unavailable, console output only"
            );
            return;
        }

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");
        let log_path = log_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&log_dir, log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::registry().with(console_layer).with(
            fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(env_filter(&log_level)),
        );

        // A global subscriber may already be installed by the host or a test
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
            return;
        }

        *FILE_GUARD.lock() = Some(guard);

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_path.display(),
            "🔧 STRUCTURED LOGGING: Initialized with file output"
        );
    });
}

/// Flush buffered file output
///
/// Dropping the appender guard drains its queue; later records only reach the
/// console. Called by the fatal path right before a reset.
pub fn flush_logs() {
    if let Some(guard) = FILE_GUARD.lock().take() {
        drop(guard);
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var(ENVIRONMENT_VAR)
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a state machine settling in a new state
pub fn log_state_transition(machine: &str, from: Option<&str>, to: &str) {
    tracing::debug!(
        machine = %machine,
        from = from,
        to = %to,
        "🔄 STATE_TRANSITION"
    );
}

/// Log a module task lifecycle event
pub fn log_module_operation(module: &str, operation: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        module = %module,
        operation = %operation,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🧩 MODULE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
