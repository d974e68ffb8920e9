//! Watchdog core: threshold evaluation, escalation tracking, log pattern
//! scanning, and the control loop that ties them together.
//!
//! ## Pipeline per cycle
//!
//! 1. For each configured target, in order: liveness check -> metric sample
//!    -> [`evaluate`](evaluator::evaluate) -> [`EscalationTracker`] update.
//! 2. One [`LogPatternScanner`] pass over the designated target's log window.
//! 3. Any raised signal triggers exactly one fleet-wide restart, after which
//!    all breach state is reset and the log window advances.

pub mod escalation;
pub mod evaluator;
pub mod log_scan;
pub mod runner;

use thiserror::Error;

pub use escalation::{BreachState, EscalationTracker, HIGH_USAGE_BREACH_CYCLES};
pub use evaluator::{evaluate, Thresholds, ThresholdVerdict};
pub use log_scan::{CriticalMatch, LogPatternScanner};
pub use runner::{GlobalWatchState, WatchStats, WatchdogLoop};

/// Why a remediation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationReason {
    /// Three consecutive cycles over the CPU or RAM threshold.
    HighUsage,
    /// CPU below the idle floor for the configured duration.
    Idle,
    /// A critical signature matched in the designated target's logs.
    LogPattern,
}

impl std::fmt::Display for RemediationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemediationReason::HighUsage => write!(f, "high_usage"),
            RemediationReason::Idle => write!(f, "idle"),
            RemediationReason::LogPattern => write!(f, "log_pattern"),
        }
    }
}

/// A remediation request raised by one target during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationSignal {
    pub target: String,
    pub reason: RemediationReason,
}

/// Fatal watchdog failures.
///
/// Transient per-target fetch errors are handled inside the loop and never
/// surface here.
#[derive(Debug, Error)]
pub enum WatchdogError {
    /// The restart action reported failure. Fleet state is unknown, the
    /// loop cannot safely continue.
    #[error("fleet restart failed: {0}")]
    Remediation(anyhow::Error),

    /// A log signature pattern failed to compile.
    #[error("invalid log signature pattern: {0}")]
    Pattern(#[from] regex::Error),
}
