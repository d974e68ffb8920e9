//! Docker CLI adapter: the production implementation of all three
//! collaborator traits.
//!
//! Shells out to the `docker` binary rather than speaking the Engine API:
//! the deployment already guarantees the CLI on every host, and the four
//! subcommands used here (`inspect`, `stats`, `logs`, `restart`) are stable
//! across the versions in the field.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::debug;

use crate::config::DockerConfig;

use super::{LogLine, LogSource, MetricSample, MetricsSource, RemediationAction};

/// Format string handed to `docker stats`, one line per target.
const STATS_FORMAT: &str = "{{.CPUPerc}};{{.MemPerc}}";

/// Collaborator implementation backed by the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    restart_timeout_secs: u64,
}

impl DockerCli {
    pub fn new(config: &DockerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            restart_timeout_secs: config.restart_timeout_secs,
        }
    }

    /// Run one docker subcommand to completion and capture its output.
    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to execute {} {}", self.binary, args.join(" ")))
    }
}

#[async_trait]
impl MetricsSource for DockerCli {
    async fn is_running(&self, target: &str) -> Result<bool> {
        let out = self
            .run(&["inspect", "-f", "{{.State.Running}}", target])
            .await?;

        if out.status.success() {
            return Ok(String::from_utf8_lossy(&out.stdout).trim() == "true");
        }

        let stderr = String::from_utf8_lossy(&out.stderr);
        // A container that does not exist (removed, never created) is
        // reported as not running, matching an intentionally stopped target.
        if stderr.contains("No such object") {
            return Ok(false);
        }
        bail!("docker inspect {}: {}", target, stderr.trim());
    }

    async fn sample(&self, target: &str) -> Result<MetricSample> {
        let out = self
            .run(&["stats", "--no-stream", "--format", STATS_FORMAT, target])
            .await?;

        if !out.status.success() {
            bail!(
                "docker stats {}: {}",
                target,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        let line = stdout.trim();
        parse_stats_line(line)
            .with_context(|| format!("unparseable docker stats output for {}: {:?}", target, line))
    }
}

#[async_trait]
impl LogSource for DockerCli {
    async fn logs(
        &self,
        target: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<LogLine>> {
        let since_arg = since.to_rfc3339();
        let until_arg = until.to_rfc3339();
        let out = self
            .run(&[
                "logs",
                "--timestamps",
                "--since",
                &since_arg,
                "--until",
                &until_arg,
                target,
            ])
            .await?;

        if !out.status.success() {
            bail!(
                "docker logs {}: {}",
                target,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }

        // Container stdout arrives on our stdout, container stderr on our
        // stderr; the scanner cares about both streams.
        let mut lines = Vec::new();
        for raw in String::from_utf8_lossy(&out.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&out.stderr).lines())
        {
            match parse_log_line(raw) {
                Some(line) => lines.push(line),
                None => debug!(target, raw, "discarding log line without timestamp prefix"),
            }
        }
        Ok(lines)
    }
}

#[async_trait]
impl RemediationAction for DockerCli {
    async fn restart_all(&self, targets: &[String]) -> Result<()> {
        let timeout = self.restart_timeout_secs.to_string();
        let mut args = vec!["restart", "-t", timeout.as_str()];
        args.extend(targets.iter().map(String::as_str));

        let out = self.run(&args).await?;
        if !out.status.success() {
            bail!(
                "docker restart failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }
}

// ============================================================================
// Output Parsing
// ============================================================================

/// Parse one `docker stats` line in [`STATS_FORMAT`], e.g. `"12.34%;56.78%"`.
fn parse_stats_line(line: &str) -> Option<MetricSample> {
    let (cpu, mem) = line.split_once(';')?;
    Some(MetricSample {
        cpu_percent: parse_percent(cpu)?,
        mem_percent: parse_percent(mem)?,
    })
}

/// Parse a percentage cell, e.g. `"12.34%"`. Returns `None` for the `"--"`
/// placeholder docker emits while a container is starting.
fn parse_percent(cell: &str) -> Option<f64> {
    cell.trim().strip_suffix('%')?.parse().ok()
}

/// Split a `docker logs --timestamps` line into its RFC3339Nano prefix and
/// the message body.
fn parse_log_line(raw: &str) -> Option<LogLine> {
    let (stamp, text) = raw.split_once(' ')?;
    let timestamp = DateTime::parse_from_rfc3339(stamp).ok()?.with_timezone(&Utc);
    Some(LogLine {
        timestamp,
        text: text.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stats_line() {
        let sample = parse_stats_line("12.34%;56.78%").unwrap();
        assert!((sample.cpu_percent - 12.34).abs() < 1e-9);
        assert!((sample.mem_percent - 56.78).abs() < 1e-9);
    }

    #[test]
    fn stats_line_with_placeholder_is_rejected() {
        assert!(parse_stats_line("--;--").is_none());
        assert!(parse_stats_line("").is_none());
    }

    #[test]
    fn cpu_over_100_percent_is_accepted() {
        // Multi-core containers report aggregate CPU above 100%.
        let sample = parse_stats_line("245.10%;12.00%").unwrap();
        assert!(sample.cpu_percent > 100.0);
    }

    #[test]
    fn parses_timestamped_log_line() {
        let line =
            parse_log_line("2026-08-06T10:15:30.123456789Z OpenAI error: insufficient_quota")
                .unwrap();
        assert_eq!(line.text, "OpenAI error: insufficient_quota");
        assert_eq!(
            line.timestamp,
            DateTime::parse_from_rfc3339("2026-08-06T10:15:30.123456789Z")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn log_line_without_timestamp_is_discarded() {
        assert!(parse_log_line("no timestamp here").is_none());
        assert!(parse_log_line("").is_none());
    }
}
