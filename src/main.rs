//! fleetwatch - voice-call fleet watchdog
//!
//! Polls the managed containers for resource utilization and critical log
//! signatures, restarting the whole fleet when a target breaches thresholds
//! for three consecutive cycles, idles below the CPU floor for the
//! configured duration, or emits a critical upstream-API error line.
//!
//! # Usage
//!
//! ```bash
//! # Run against ./fleetwatch.toml (or built-in defaults)
//! fleetwatch
//!
//! # Explicit config file and a faster poll for local testing
//! fleetwatch --config /etc/fleetwatch/fleetwatch.toml --interval 2
//! ```
//!
//! # Environment Variables
//!
//! - `FLEETWATCH_CONFIG`: Path to the TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fleetwatch::config::WatchConfig;
use fleetwatch::sources::docker::DockerCli;
use fleetwatch::watchdog::WatchdogLoop;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fleetwatch")]
#[command(about = "Resource & health watchdog for the voice-call fleet")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides the search order)
    #[arg(short, long, env = "FLEETWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the check interval in seconds (for local testing)
    #[arg(long)]
    interval: Option<u64>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => WatchConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => WatchConfig::load().context("failed to load configuration")?,
    };
    if let Some(interval) = args.interval {
        config.watchdog.check_interval_secs = interval;
        config.validate().context("invalid --interval override")?;
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  fleetwatch - voice-call fleet watchdog");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("");
    info!("   Targets:        {}", config.watchdog.targets.join(", "));
    info!(
        "   Thresholds:     cpu > {:.1}% | ram > {:.1}% | idle < {:.1}% for {}s",
        config.watchdog.cpu_threshold_percent,
        config.watchdog.ram_threshold_percent,
        config.watchdog.low_cpu_threshold_percent,
        config.watchdog.low_cpu_duration_secs,
    );
    info!(
        "   Check interval: {}s | Log scan: {} ({} patterns)",
        config.watchdog.check_interval_secs,
        config.log_scan.target,
        config.log_scan.patterns.len(),
    );
    info!("");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let docker = DockerCli::new(&config.docker);
    let watchdog = WatchdogLoop::new(
        &config,
        docker.clone(),
        docker.clone(),
        docker,
        cancel_token,
        chrono::Utc::now(),
    )
    .context("failed to build watchdog loop")?;

    let stats = watchdog.run().await.context("watchdog loop failed")?;

    info!("");
    info!(
        "fleetwatch shutdown complete ({} cycles, {} remediations)",
        stats.cycles, stats.remediations
    );
    Ok(())
}
