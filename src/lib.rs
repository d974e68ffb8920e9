//! Fleetwatch: resource & health watchdog for the voice-call fleet
//!
//! Supervises a fixed set of named service containers (the voice-AI
//! engine, the SIP signaling proxy, and the order backend), polling
//! resource utilization and log output on a fixed interval and issuing a
//! debounced fleet-wide restart when failure or degradation is detected.
//!
//! ## Architecture
//!
//! - **Sources**: collaborator traits for metrics, logs, and the restart
//!   action, with a Docker CLI adapter as the production implementation
//! - **Evaluator**: pure threshold verdicts per metric sample
//! - **Escalation Tracker**: consecutive-breach counters and idle timers
//! - **Log Pattern Scanner**: critical-signature scan over a window bounded
//!   by the last remediation
//! - **Watchdog Loop**: the single control loop owning all mutable state

pub mod config;
pub mod sources;
pub mod watchdog;

// Re-export the configuration surface
pub use config::{ConfigError, WatchConfig};

// Re-export collaborator traits and data carriers
pub use sources::{LogLine, LogSource, MetricSample, MetricsSource, RemediationAction};

// Re-export the watchdog core
pub use watchdog::{
    BreachState, EscalationTracker, LogPatternScanner, RemediationReason, RemediationSignal,
    WatchStats, WatchdogError, WatchdogLoop,
};
