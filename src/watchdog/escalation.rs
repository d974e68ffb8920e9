//! Escalation tracking: turns repeated verdicts into remediation decisions.
//!
//! One [`BreachState`] per target, exclusively owned by the watchdog loop.
//! High-usage breaches must persist for [`HIGH_USAGE_BREACH_CYCLES`]
//! consecutive cycles before a restart is requested; a single normal cycle
//! resets the streak. Idle detection is time-based: the idle timer starts on
//! the first below-floor cycle and fires once the configured duration has
//! elapsed with no intervening normal cycle.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::evaluator::ThresholdVerdict;
use super::RemediationReason;

/// Consecutive breaching cycles required before a high-usage restart.
pub const HIGH_USAGE_BREACH_CYCLES: u32 = 3;

/// Mutable per-target escalation state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreachState {
    /// Consecutive cycles over the CPU or RAM threshold.
    pub high_usage_count: u32,
    /// Start of the current uninterrupted idle stretch, if any.
    pub idle_since: Option<DateTime<Utc>>,
}

/// Per-target escalation counters for the whole fleet.
pub struct EscalationTracker {
    states: HashMap<String, BreachState>,
    low_cpu_duration: Duration,
}

impl EscalationTracker {
    /// Create a tracker with zeroed state for every configured target.
    pub fn new(targets: &[String], low_cpu_duration: Duration) -> Self {
        Self {
            states: targets
                .iter()
                .map(|t| (t.clone(), BreachState::default()))
                .collect(),
            low_cpu_duration,
        }
    }

    /// Feed one cycle's verdict for a running target.
    ///
    /// Both the breach counter and the idle timer update every cycle; if
    /// both would fire at once the high-usage signal wins, so at most one
    /// reason is returned per target per cycle. Targets that are not
    /// running must not be observed at all.
    pub fn observe(
        &mut self,
        target: &str,
        verdict: ThresholdVerdict,
        now: DateTime<Utc>,
    ) -> Option<RemediationReason> {
        let state = self.states.entry(target.to_string()).or_default();
        let mut signal = None;

        if verdict.high_usage {
            state.high_usage_count += 1;
            info!(
                target,
                count = state.high_usage_count,
                "resource threshold breached"
            );
            if state.high_usage_count >= HIGH_USAGE_BREACH_CYCLES {
                signal = Some(RemediationReason::HighUsage);
            }
        } else if state.high_usage_count > 0 {
            debug!(target, "usage back within thresholds, streak reset");
            state.high_usage_count = 0;
        }

        if verdict.low_cpu {
            match state.idle_since {
                None => {
                    info!(target, "cpu below idle floor, idle timer started");
                    state.idle_since = Some(now);
                }
                Some(since) if now - since >= self.low_cpu_duration => {
                    state.idle_since = None;
                    if signal.is_none() {
                        signal = Some(RemediationReason::Idle);
                    }
                }
                Some(_) => {}
            }
        } else if state.idle_since.take().is_some() {
            debug!(target, "cpu recovered, idle timer cleared");
        }

        signal
    }

    /// Reset every target's state. Called after any remediation, whatever
    /// its trigger.
    pub fn reset_all(&mut self) {
        for state in self.states.values_mut() {
            *state = BreachState::default();
        }
    }

    /// Current state for one target, if it is tracked.
    pub fn state(&self, target: &str) -> Option<&BreachState> {
        self.states.get(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BREACH: ThresholdVerdict = ThresholdVerdict {
        high_usage: true,
        low_cpu: false,
    };
    const NORMAL: ThresholdVerdict = ThresholdVerdict {
        high_usage: false,
        low_cpu: false,
    };
    const IDLE: ThresholdVerdict = ThresholdVerdict {
        high_usage: false,
        low_cpu: true,
    };

    fn tracker() -> EscalationTracker {
        EscalationTracker::new(&["engine".to_string()], Duration::seconds(1800))
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn fires_on_third_consecutive_breach() {
        let mut tracker = tracker();
        assert_eq!(tracker.observe("engine", BREACH, t(0)), None);
        assert_eq!(tracker.observe("engine", BREACH, t(5)), None);
        assert_eq!(
            tracker.observe("engine", BREACH, t(10)),
            Some(RemediationReason::HighUsage)
        );
    }

    #[test]
    fn normal_cycle_resets_streak_fully() {
        let mut tracker = tracker();
        tracker.observe("engine", BREACH, t(0));
        tracker.observe("engine", BREACH, t(5));
        tracker.observe("engine", NORMAL, t(10));
        assert_eq!(tracker.state("engine").unwrap().high_usage_count, 0);

        // Three fresh breaches are required again.
        assert_eq!(tracker.observe("engine", BREACH, t(15)), None);
        assert_eq!(tracker.observe("engine", BREACH, t(20)), None);
        assert_eq!(
            tracker.observe("engine", BREACH, t(25)),
            Some(RemediationReason::HighUsage)
        );
    }

    #[test]
    fn idle_fires_only_after_full_duration() {
        let mut tracker = tracker();
        assert_eq!(tracker.observe("engine", IDLE, t(0)), None);
        assert_eq!(tracker.observe("engine", IDLE, t(1795)), None);
        assert_eq!(
            tracker.observe("engine", IDLE, t(1800)),
            Some(RemediationReason::Idle)
        );
        // Firing clears the timer.
        assert_eq!(tracker.state("engine").unwrap().idle_since, None);
    }

    #[test]
    fn active_cycle_clears_idle_timer_with_no_partial_credit() {
        let mut tracker = tracker();
        tracker.observe("engine", IDLE, t(0));
        tracker.observe("engine", NORMAL, t(1700));
        assert_eq!(tracker.state("engine").unwrap().idle_since, None);

        // The full duration is required from the new start.
        tracker.observe("engine", IDLE, t(1705));
        assert_eq!(tracker.observe("engine", IDLE, t(1800)), None);
        assert_eq!(
            tracker.observe("engine", IDLE, t(3505)),
            Some(RemediationReason::Idle)
        );
    }

    #[test]
    fn high_usage_wins_when_both_fire_in_one_cycle() {
        // High memory with idle CPU: both state machines run, one signal.
        let both = ThresholdVerdict {
            high_usage: true,
            low_cpu: true,
        };
        let mut tracker = tracker();
        tracker.observe("engine", both, t(0));
        tracker.observe("engine", both, t(5));
        assert_eq!(
            tracker.observe("engine", both, t(3600)),
            Some(RemediationReason::HighUsage)
        );
    }

    #[test]
    fn reset_all_clears_every_target() {
        let targets = vec!["engine".to_string(), "backend".to_string()];
        let mut tracker = EscalationTracker::new(&targets, Duration::seconds(1800));
        tracker.observe("engine", BREACH, t(0));
        tracker.observe("backend", IDLE, t(0));
        tracker.reset_all();
        assert_eq!(*tracker.state("engine").unwrap(), BreachState::default());
        assert_eq!(*tracker.state("backend").unwrap(), BreachState::default());
    }
}
