//! Watchdog configuration. Every operational knob is a TOML value.
//!
//! ## Loading Order
//!
//! 1. `FLEETWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `fleetwatch.toml` in the current working directory
//! 3. Built-in defaults (matching the deployed fleet)
//!
//! Loading is two-pass: the raw TOML is first walked for unknown keys
//! (warnings with "did you mean?" suggestions, never fatal), then
//! deserialized and validated. Validation failures are fatal: the loop
//! must not start with inconsistent thresholds or an unknown scan target.

pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Root configuration for one watchdog deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Polling loop and threshold settings
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Critical log signature scanning
    #[serde(default)]
    pub log_scan: LogScanConfig,

    /// Docker CLI adapter settings
    #[serde(default)]
    pub docker: DockerConfig,
}

/// Polling interval, supervised targets, and resource thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Managed container names, in evaluation order.
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// Seconds between cycles.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// CPU above this is a breach (%).
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold_percent: f64,

    /// Memory above this is a breach (%).
    #[serde(default = "default_ram_threshold")]
    pub ram_threshold_percent: f64,

    /// CPU below this counts as idle (%).
    #[serde(default = "default_low_cpu_threshold")]
    pub low_cpu_threshold_percent: f64,

    /// Uninterrupted idle seconds before an idle restart.
    #[serde(default = "default_low_cpu_duration")]
    pub low_cpu_duration_secs: u64,
}

fn default_targets() -> Vec<String> {
    vec![
        "avatabot-engine".to_string(),
        "avatabot-opensips".to_string(),
        "avatabot-backend".to_string(),
    ]
}
fn default_check_interval() -> u64 {
    5
}
fn default_cpu_threshold() -> f64 {
    97.0
}
fn default_ram_threshold() -> f64 {
    90.0
}
fn default_low_cpu_threshold() -> f64 {
    3.0
}
fn default_low_cpu_duration() -> u64 {
    1800
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            check_interval_secs: default_check_interval(),
            cpu_threshold_percent: default_cpu_threshold(),
            ram_threshold_percent: default_ram_threshold(),
            low_cpu_threshold_percent: default_low_cpu_threshold(),
            low_cpu_duration_secs: default_low_cpu_duration(),
        }
    }
}

/// Which target's logs are scanned, and for what.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogScanConfig {
    /// The designated target carrying upstream API errors.
    #[serde(default = "default_scan_target")]
    pub target: String,

    /// Critical signatures, matched per line as OR-combined regexes.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
}

fn default_scan_target() -> String {
    "avatabot-engine".to_string()
}
fn default_patterns() -> Vec<String> {
    vec![
        "insufficient_quota".to_string(),
        "exceeded your current quota".to_string(),
        "rate_limit_exceeded".to_string(),
        "429 Too Many Requests".to_string(),
    ]
}

impl Default for LogScanConfig {
    fn default() -> Self {
        Self {
            target: default_scan_target(),
            patterns: default_patterns(),
        }
    }
}

/// Docker CLI adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Docker binary to invoke.
    #[serde(default = "default_docker_binary")]
    pub binary: String,

    /// Grace period handed to `docker restart -t` (seconds).
    #[serde(default = "default_restart_timeout")]
    pub restart_timeout_secs: u64,
}

fn default_docker_binary() -> String {
    "docker".to_string()
}
fn default_restart_timeout() -> u64 {
    30
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            restart_timeout_secs: default_restart_timeout(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error ({path}): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Loading & Validation
// ============================================================================

impl WatchConfig {
    /// Load configuration using the standard search order.
    ///
    /// A file that is present but unreadable or invalid is fatal; the
    /// watchdog never silently degrades to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("FLEETWATCH_CONFIG") {
            let p = PathBuf::from(&path);
            info!(path = %p.display(), "loading config from FLEETWATCH_CONFIG");
            return Self::load_from_file(&p);
        }

        let local = Path::new("fleetwatch.toml");
        if local.exists() {
            info!("loading config from ./fleetwatch.toml");
            return Self::load_from_file(local);
        }

        info!("no fleetwatch.toml found, using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // Unknown keys warn but never fail the load.
        for warning in validation::validate_unknown_keys(&contents) {
            warn!("{warning}");
        }

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate targets, thresholds, and patterns for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();
        let w = &self.watchdog;

        if w.targets.is_empty() {
            errors.push("watchdog.targets must not be empty".to_string());
        }
        if w.targets.iter().any(|t| t.trim().is_empty()) {
            errors.push("watchdog.targets must not contain empty names".to_string());
        }
        let unique: HashSet<&str> = w.targets.iter().map(String::as_str).collect();
        if unique.len() != w.targets.len() {
            errors.push("watchdog.targets must not contain duplicates".to_string());
        }

        if w.check_interval_secs == 0 {
            errors.push("watchdog.check_interval_secs must be > 0".to_string());
        }
        if w.low_cpu_duration_secs == 0 {
            errors.push("watchdog.low_cpu_duration_secs must be > 0".to_string());
        }

        if w.cpu_threshold_percent <= 0.0 {
            errors.push(format!(
                "watchdog.cpu_threshold_percent = {:.1} must be > 0",
                w.cpu_threshold_percent
            ));
        }
        if w.ram_threshold_percent <= 0.0 || w.ram_threshold_percent > 100.0 {
            errors.push(format!(
                "watchdog.ram_threshold_percent = {:.1} must be in (0, 100]",
                w.ram_threshold_percent
            ));
        }
        if w.low_cpu_threshold_percent < 0.0 {
            errors.push(format!(
                "watchdog.low_cpu_threshold_percent = {:.1} cannot be negative",
                w.low_cpu_threshold_percent
            ));
        }
        if w.low_cpu_threshold_percent >= w.cpu_threshold_percent {
            errors.push(format!(
                "watchdog.low_cpu_threshold_percent = {:.1} must be below cpu_threshold_percent = {:.1}",
                w.low_cpu_threshold_percent, w.cpu_threshold_percent
            ));
        }

        if !w.targets.contains(&self.log_scan.target) {
            errors.push(format!(
                "log_scan.target '{}' is not in watchdog.targets",
                self.log_scan.target
            ));
        }
        for pattern in &self.log_scan.patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(format!("log_scan.patterns entry '{pattern}' is invalid: {e}"));
            }
        }

        if self.docker.binary.trim().is_empty() {
            errors.push("docker.binary must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(WatchConfig::default().validate().is_ok());
    }

    #[test]
    fn low_cpu_floor_must_be_below_cpu_threshold() {
        let mut config = WatchConfig::default();
        config.watchdog.low_cpu_threshold_percent = 97.0;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let mut config = WatchConfig::default();
        config.watchdog.targets = vec!["engine".to_string(), "engine".to_string()];
        config.log_scan.target = "engine".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn scan_target_must_be_managed() {
        let mut config = WatchConfig::default();
        config.log_scan.target = "unmanaged".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let mut config = WatchConfig::default();
        config.log_scan.patterns.push("quota(".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = WatchConfig::default();
        config.watchdog.check_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
