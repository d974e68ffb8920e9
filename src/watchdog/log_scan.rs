//! Incremental log scanning for critical upstream-failure signatures.
//!
//! Scoped to one designated target: the engine container carries the
//! upstream API errors (quota exhaustion, rate limiting) that resource
//! metrics cannot see. The scan window is `[last_remediation_at, now)` and
//! advances only on remediation: a line that already triggered a restart
//! falls behind the window start and cannot trigger again.

use chrono::{DateTime, Utc};
use regex::RegexSet;

use crate::sources::LogLine;

/// Details of the first critical line found in a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalMatch {
    /// The signature pattern that matched.
    pub pattern: String,
    /// The matching line's text.
    pub line: String,
}

/// Matches log lines against a fixed ordered set of critical signatures.
pub struct LogPatternScanner {
    target: String,
    patterns: RegexSet,
    raw_patterns: Vec<String>,
}

impl LogPatternScanner {
    /// Compile the signature set for the designated target.
    pub fn new(target: &str, patterns: &[String]) -> Result<Self, regex::Error> {
        Ok(Self {
            target: target.to_string(),
            patterns: RegexSet::new(patterns)?,
            raw_patterns: patterns.to_vec(),
        })
    }

    /// The designated target this scanner is scoped to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Scan a window of lines, returning the first critical match.
    ///
    /// The `[since, until)` window is re-applied on line timestamps here:
    /// a source with inclusive-boundary fetch semantics may hand back lines
    /// from before the window start, and those must never retrigger.
    pub fn scan(
        &self,
        lines: &[LogLine],
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Option<CriticalMatch> {
        lines
            .iter()
            .filter(|line| line.timestamp >= since && line.timestamp < until)
            .find_map(|line| {
                let index = self.patterns.matches(&line.text).iter().next()?;
                Some(CriticalMatch {
                    pattern: self.raw_patterns[index].clone(),
                    line: line.text.clone(),
                })
            })
    }
}
