//! Collaborator abstractions for the watchdog loop.
//!
//! The loop itself never talks to the container runtime directly. It
//! consumes three narrow traits: a metrics source (running flag + CPU/mem
//! sample), a log source (timestamped lines in a window), and a remediation
//! action (blocking fleet-wide restart). The production implementation for
//! all three is [`DockerCli`](docker::DockerCli); tests substitute scripted
//! in-memory fakes.

pub mod docker;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Instantaneous resource utilization for one target.
///
/// Produced and consumed within a single cycle, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    /// CPU utilization in percent. May exceed 100 on multi-core hosts.
    pub cpu_percent: f64,
    /// Memory utilization in percent of the container's limit (0–100).
    pub mem_percent: f64,
}

/// One log line with the timestamp the runtime recorded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// Resource utilization and liveness for named targets.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Whether the target is currently running.
    ///
    /// A target that is intentionally stopped reports `false`; the loop
    /// skips it without touching its counters.
    async fn is_running(&self, target: &str) -> Result<bool>;

    /// Sample instantaneous CPU/memory utilization for a running target.
    ///
    /// Undefined for targets that are not running; callers must check
    /// [`is_running`](Self::is_running) first.
    async fn sample(&self, target: &str) -> Result<MetricSample>;
}

/// Append-only textual log stream for named targets.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Lines emitted by `target` within `[since, until)`.
    ///
    /// Implementations may be sloppy at the window boundaries (second
    /// granularity, inclusive `--since`); the scanner re-applies the window
    /// on line timestamps itself.
    async fn logs(
        &self,
        target: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<LogLine>>;
}

/// The single corrective action: restart every managed target.
#[async_trait]
pub trait RemediationAction: Send + Sync {
    /// Restart all targets, blocking until the restart completes.
    ///
    /// Must be idempotent. A failure here is fatal to the watchdog: the
    /// fleet state is unknown and the loop cannot safely continue.
    async fn restart_all(&self, targets: &[String]) -> Result<()>;
}
