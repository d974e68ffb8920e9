//! The watchdog control loop.
//!
//! One tokio task owns every piece of mutable state (breach counters, idle
//! timers, the log window boundary) and drives a fixed-interval cycle:
//! sample each target, update escalation, scan the designated target's
//! logs, and coalesce any raised signals into at most one fleet-wide
//! restart per cycle. Cancellation is cooperative and takes effect only at
//! the top of a cycle or during the inter-cycle sleep, so state mutations
//! are always observed as whole completed cycles.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::sources::{LogSource, MetricsSource, RemediationAction};

use super::escalation::EscalationTracker;
use super::evaluator::{evaluate, Thresholds};
use super::log_scan::LogPatternScanner;
use super::{RemediationSignal, WatchdogError};

/// Loop-global state: the lower bound of the log scan window.
///
/// Initialized to process start; updated on every remediation regardless of
/// which trigger raised it.
#[derive(Debug, Clone, Copy)]
pub struct GlobalWatchState {
    pub last_remediation_at: DateTime<Utc>,
}

/// Counters accumulated over the loop's lifetime, logged at shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchStats {
    pub cycles: u64,
    pub remediations: u64,
    pub transient_failures: u64,
}

/// Owns all watchdog state and the three collaborators.
///
/// Built with [`new()`](WatchdogLoop::new), then consumed by
/// [`run()`](WatchdogLoop::run). Tests drive individual cycles through
/// [`run_cycle()`](WatchdogLoop::run_cycle) with synthetic timestamps.
pub struct WatchdogLoop<M, L, R> {
    targets: Vec<String>,
    thresholds: Thresholds,
    check_interval: Duration,
    metrics: M,
    logs: L,
    remediation: R,
    tracker: EscalationTracker,
    scanner: LogPatternScanner,
    state: GlobalWatchState,
    stats: WatchStats,
    last_signal: Option<RemediationSignal>,
    cancel_token: CancellationToken,
}

impl<M, L, R> WatchdogLoop<M, L, R>
where
    M: MetricsSource,
    L: LogSource,
    R: RemediationAction,
{
    /// Build the loop from a validated configuration.
    ///
    /// `started_at` seeds the log window lower bound: lines emitted before
    /// the watchdog came up are never scanned.
    pub fn new(
        config: &WatchConfig,
        metrics: M,
        logs: L,
        remediation: R,
        cancel_token: CancellationToken,
        started_at: DateTime<Utc>,
    ) -> Result<Self, WatchdogError> {
        let w = &config.watchdog;
        Ok(Self {
            targets: w.targets.clone(),
            thresholds: Thresholds {
                cpu_percent: w.cpu_threshold_percent,
                ram_percent: w.ram_threshold_percent,
                low_cpu_percent: w.low_cpu_threshold_percent,
            },
            check_interval: Duration::from_secs(w.check_interval_secs),
            metrics,
            logs,
            remediation,
            tracker: EscalationTracker::new(
                &w.targets,
                ChronoDuration::seconds(w.low_cpu_duration_secs as i64),
            ),
            scanner: LogPatternScanner::new(&config.log_scan.target, &config.log_scan.patterns)?,
            state: GlobalWatchState {
                last_remediation_at: started_at,
            },
            stats: WatchStats::default(),
            last_signal: None,
            cancel_token,
        })
    }

    /// Run until cancelled or a fatal remediation failure.
    ///
    /// Returns accumulated statistics on clean shutdown.
    pub async fn run(mut self) -> Result<WatchStats, WatchdogError> {
        info!(
            targets = self.targets.len(),
            interval_secs = self.check_interval.as_secs(),
            log_target = self.scanner.target(),
            "watchdog started"
        );

        loop {
            if self.cancel_token.is_cancelled() {
                info!("shutdown signal received");
                break;
            }

            let now = Utc::now();
            self.run_cycle(now).await?;

            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("shutdown signal received during sleep");
                    break;
                }
                () = tokio::time::sleep(self.check_interval) => {}
            }
        }

        info!(
            cycles = self.stats.cycles,
            remediations = self.stats.remediations,
            transient_failures = self.stats.transient_failures,
            "watchdog stopped"
        );
        Ok(self.stats)
    }

    /// Execute one full cycle at the given timestamp.
    ///
    /// `now` is captured once per cycle and threaded through threshold
    /// evaluation, idle timing, the log window, and the remediation
    /// timestamp, keeping a cycle deterministic under test.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<(), WatchdogError> {
        self.stats.cycles += 1;
        let mut signals: Vec<RemediationSignal> = Vec::new();
        let mut scan_target_running = false;

        for target in &self.targets {
            let running = match self.metrics.is_running(target).await {
                Ok(running) => running,
                Err(error) => {
                    warn!(target, %error, "status check failed, skipping target this cycle");
                    self.stats.transient_failures += 1;
                    continue;
                }
            };
            if target == self.scanner.target() {
                scan_target_running = running;
            }
            if !running {
                debug!(target, "not running, skipped");
                continue;
            }

            let sample = match self.metrics.sample(target).await {
                Ok(sample) => sample,
                Err(error) => {
                    // Counters are left untouched: an infrastructure blip
                    // must neither extend nor reset a breach streak.
                    warn!(target, %error, "metric sample failed, skipping target this cycle");
                    self.stats.transient_failures += 1;
                    continue;
                }
            };
            debug!(
                target,
                cpu = sample.cpu_percent,
                mem = sample.mem_percent,
                "sampled"
            );

            let verdict = evaluate(&sample, &self.thresholds);
            if let Some(reason) = self.tracker.observe(target, verdict, now) {
                signals.push(RemediationSignal {
                    target: target.clone(),
                    reason,
                });
            }
        }

        if scan_target_running {
            let since = self.state.last_remediation_at;
            match self.logs.logs(self.scanner.target(), since, now).await {
                Ok(lines) => {
                    if let Some(found) = self.scanner.scan(&lines, since, now) {
                        warn!(
                            target = self.scanner.target(),
                            pattern = %found.pattern,
                            line = %found.line,
                            "critical log signature detected"
                        );
                        signals.push(RemediationSignal {
                            target: self.scanner.target().to_string(),
                            reason: super::RemediationReason::LogPattern,
                        });
                    }
                }
                Err(error) => {
                    warn!(
                        target = self.scanner.target(),
                        %error,
                        "log fetch failed, skipping scan this cycle"
                    );
                    self.stats.transient_failures += 1;
                }
            }
        } else {
            debug!(
                target = self.scanner.target(),
                "scan target not running, log scan skipped"
            );
        }

        // Coalesce: the restart covers the whole fleet, so simultaneous
        // breaches share a single remediation.
        if let Some(trigger) = signals.first().cloned() {
            for signal in &signals {
                warn!(
                    target = %signal.target,
                    reason = %signal.reason,
                    "remediation signal raised"
                );
            }
            warn!(
                target = %trigger.target,
                reason = %trigger.reason,
                coalesced = signals.len(),
                "restarting all managed targets"
            );
            self.remediation
                .restart_all(&self.targets)
                .await
                .map_err(WatchdogError::Remediation)?;

            self.tracker.reset_all();
            self.state.last_remediation_at = now;
            self.stats.remediations += 1;
            self.last_signal = Some(trigger);
            info!("fleet restart complete, breach state reset");
        }

        Ok(())
    }

    pub fn stats(&self) -> WatchStats {
        self.stats
    }

    pub fn last_remediation_at(&self) -> DateTime<Utc> {
        self.state.last_remediation_at
    }

    /// Escalation state for one target (test and inspection hook).
    pub fn breach_state(&self, target: &str) -> Option<&super::BreachState> {
        self.tracker.state(target)
    }

    /// The signal that triggered the most recent remediation.
    pub fn last_signal(&self) -> Option<&RemediationSignal> {
        self.last_signal.as_ref()
    }
}
