//! # Tracker Configuration Validator
//!
//! Command-line tool for validating tracker configuration files for each
//! environment before they are flashed or deployed. Catches watchdog timing
//! violations and zero intervals that would otherwise only surface at boot.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tracker_core::config::{ConfigManager, ModuleWatchdogConfig, TrackerConfig};
use tracker_core::constants::{modules, KNOWN_ENVIRONMENTS};

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate tracker configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format for `show` (yaml, json)
    #[arg(long, default_value = "yaml")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate all configuration sections
    All,

    /// Validate one configuration section
    Component {
        /// Section name (coordinator, fota, bus, watchdog, fatal)
        name: String,
    },

    /// Validate every known environment
    Environments,

    /// Print the merged configuration
    Show,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all_config(&cli),
        Some(Commands::Component { name }) => validate_component(&cli, name),
        Some(Commands::Environments) => validate_environments(&cli),
        Some(Commands::Show) => show_config(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli, environment: &str) -> Result<TrackerConfig> {
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment)
        .with_context(|| format!("loading configuration for environment '{environment}'"))?;
    Ok(manager.config().clone())
}

fn validate_all_config(cli: &Cli) -> Result<()> {
    println!("🔧 Validating Tracker Configuration");
    println!("Environment: {}", cli.environment);
    if let Some(config_dir) = &cli.config_dir {
        println!("Config Directory: {}", config_dir.display());
    }
    println!();

    let config = load(cli, &cli.environment)?;
    println!("✅ Configuration loaded and validated");

    validate_coordinator_config(&config)?;
    validate_fota_config(&config)?;
    validate_bus_config(&config)?;
    validate_watchdog_config(&config)?;
    validate_fatal_config(&config)?;

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn validate_component(cli: &Cli, component_name: &str) -> Result<()> {
    println!("🔧 Validating Component: {component_name}");

    let config = load(cli, &cli.environment)?;
    match component_name.to_lowercase().as_str() {
        "coordinator" => validate_coordinator_config(&config)?,
        "fota" => validate_fota_config(&config)?,
        "bus" => validate_bus_config(&config)?,
        "watchdog" => validate_watchdog_config(&config)?,
        "fatal" => validate_fatal_config(&config)?,
        _ => bail!("Unknown component: {component_name}"),
    }

    println!("✅ Component '{component_name}' validation passed!");
    Ok(())
}

fn validate_environments(cli: &Cli) -> Result<()> {
    println!("📋 Validating known environments:");

    let mut failures = 0;
    for environment in KNOWN_ENVIRONMENTS {
        match load(cli, environment) {
            Ok(_) => println!("  ✅ {environment}"),
            Err(e) => {
                failures += 1;
                println!("  ❌ {environment}: {e:#}");
            }
        }
    }

    if failures > 0 {
        bail!("{failures} environment(s) failed validation");
    }
    Ok(())
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = load(cli, &cli.environment)?;
    let rendered = match cli.format.as_str() {
        "json" => serde_json::to_string_pretty(&config)?,
        "yaml" => serde_yaml::to_string(&config)?,
        other => bail!("Unknown output format: {other}"),
    };
    println!("{rendered}");
    Ok(())
}

fn print_module_timing(module: &str, watchdog: &ModuleWatchdogConfig) {
    println!(
        "   ✅ {module}: watchdog {}s, processing budget {}s, wait window {}s",
        watchdog.watchdog_timeout_seconds,
        watchdog.max_processing_seconds,
        watchdog.watchdog_timeout_seconds - watchdog.max_processing_seconds
    );
}

fn validate_coordinator_config(config: &TrackerConfig) -> Result<()> {
    println!("📍 Validating Coordinator Configuration...");

    let coordinator = &config.coordinator;
    coordinator.watchdog.validate(modules::COORDINATOR)?;
    if coordinator.cloud_update_interval_seconds < coordinator.sampling_interval_seconds {
        println!(
            "   ⚠️  Cloud updates ({}s) are more frequent than samples ({}s)",
            coordinator.cloud_update_interval_seconds, coordinator.sampling_interval_seconds
        );
    }

    println!(
        "   ✅ Sampling every {}s, cloud update every {}s, storage threshold {}, {:?} storage mode",
        coordinator.sampling_interval_seconds,
        coordinator.cloud_update_interval_seconds,
        coordinator.storage_threshold,
        coordinator.initial_storage_mode
    );
    print_module_timing(modules::COORDINATOR, &coordinator.watchdog);
    Ok(())
}

fn validate_fota_config(config: &TrackerConfig) -> Result<()> {
    println!("📦 Validating FOTA Configuration...");

    config.fota.watchdog.validate(modules::FOTA)?;
    print_module_timing(modules::FOTA, &config.fota.watchdog);
    Ok(())
}

fn validate_bus_config(config: &TrackerConfig) -> Result<()> {
    println!("📬 Validating Message Bus Configuration...");

    println!(
        "   ✅ Mailbox capacity {}, publish timeout {}ms",
        config.bus.mailbox_capacity, config.bus.publish_timeout_ms
    );
    Ok(())
}

fn validate_watchdog_config(config: &TrackerConfig) -> Result<()> {
    println!("🐕 Validating Watchdog Configuration...");

    println!(
        "   ✅ Check interval {}ms, {} channels",
        config.watchdog.check_interval_ms, config.watchdog.max_channels
    );
    Ok(())
}

fn validate_fatal_config(config: &TrackerConfig) -> Result<()> {
    println!("🚨 Validating Fatal Error Path Configuration...");

    println!(
        "   ✅ Grace period before reset: {}s, before a requested reboot: {}s",
        config.fatal.grace_period_seconds, config.fatal.reboot_grace_seconds
    );
    Ok(())
}
