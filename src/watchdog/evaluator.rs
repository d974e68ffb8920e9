//! Threshold evaluation: pure mapping from a metric sample to a verdict.

use crate::sources::MetricSample;

/// Resource thresholds applied to every sample.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// CPU above this is a breach (%).
    pub cpu_percent: f64,
    /// Memory above this is a breach (%).
    pub ram_percent: f64,
    /// CPU below this counts as idle (%).
    pub low_cpu_percent: f64,
}

/// Independent verdict flags for one sample.
///
/// The flags guard against opposite failure modes (runaway resource use vs
/// a stuck process idling below its normal load) and are not mutually
/// exclusive: a target can breach on memory while its CPU sits idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdVerdict {
    pub high_usage: bool,
    pub low_cpu: bool,
}

/// Evaluate one sample against the thresholds. Pure, no side effects.
pub fn evaluate(sample: &MetricSample, thresholds: &Thresholds) -> ThresholdVerdict {
    ThresholdVerdict {
        high_usage: sample.cpu_percent > thresholds.cpu_percent
            || sample.mem_percent > thresholds.ram_percent,
        low_cpu: sample.cpu_percent < thresholds.low_cpu_percent,
    }
}
