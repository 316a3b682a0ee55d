//! Budget violations and their severities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dimension a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// USD spend
    Budget,
    Tokens,
    Time,
    Depth,
    Calls,
}

impl ViolationKind {
    /// Order in which exhausted dimensions are reported by a degradation plan.
    pub const EXHAUSTION_PRIORITY: [ViolationKind; 5] = [
        ViolationKind::Budget,
        ViolationKind::Tokens,
        ViolationKind::Calls,
        ViolationKind::Time,
        ViolationKind::Depth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Budget => "cost",
            ViolationKind::Tokens => "tokens",
            ViolationKind::Time => "time",
            ViolationKind::Depth => "depth",
            ViolationKind::Calls => "calls",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious a violation is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Approaching the limit; informational
    Warning,
    /// Reserved for graduated responses; never produced today
    Soft,
    /// Limit reached; execution must stop
    Hard,
}

/// A budget dimension crossing a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
}

impl Violation {
    pub fn is_hard(&self) -> bool {
        self.severity == Severity::Hard
    }
}

/// Relative slack when comparing usage against a limit, so accumulated
/// floating-point spend that lands a hair under the limit still counts as reaching it.
pub(crate) const LIMIT_TOLERANCE: f64 = 1e-9;

/// Whether `used` has reached `limit`, within [`LIMIT_TOLERANCE`].
pub(crate) fn reaches_limit(used: f64, limit: f64) -> bool {
    used >= limit * (1.0 - LIMIT_TOLERANCE)
}

/// Usage of one dimension measured against its limit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Measurement {
    pub kind: ViolationKind,
    pub used: f64,
    pub limit: f64,
}

impl Measurement {
    pub fn new(kind: ViolationKind, used: f64, limit: f64) -> Self {
        Self { kind, used, limit }
    }

    /// Unlimited dimensions are never measured.
    pub fn is_enforced(&self) -> bool {
        self.limit > 0.0
    }

    pub fn is_exhausted(&self) -> bool {
        self.is_enforced() && reaches_limit(self.used, self.limit)
    }

    /// Violation for this measurement, if any threshold is crossed.
    pub fn evaluate(&self, warning_ratio: f64) -> Option<Violation> {
        if !self.is_enforced() {
            return None;
        }
        let ratio = self.used / self.limit;
        let severity = if reaches_limit(self.used, self.limit) {
            Severity::Hard
        } else if ratio >= warning_ratio {
            Severity::Warning
        } else {
            return None;
        };
        Some(Violation {
            kind: self.kind,
            severity,
            message: self.describe(severity, ratio),
        })
    }

    /// Human-readable usage line, e.g. `cost 0.9100/1.0000 USD`.
    pub fn usage_line(&self) -> String {
        match self.kind {
            ViolationKind::Budget => format!("cost {:.4}/{:.4} USD", self.used, self.limit),
            ViolationKind::Time => format!("time {:.1}s/{:.1}s", self.used, self.limit),
            _ => format!("{} {}/{}", self.kind, self.used as u64, self.limit as u64),
        }
    }

    fn describe(&self, severity: Severity, ratio: f64) -> String {
        match severity {
            Severity::Hard => format!("{} budget exhausted: {}", self.kind, self.usage_line()),
            _ => format!(
                "{} budget at {:.0}%: {}",
                self.kind,
                ratio * 100.0,
                self.usage_line()
            ),
        }
    }
}

/// One entry per kind; a later, more severe observation replaces the entry.
///
/// Returns the violation when it is new or an escalation, `None` otherwise.
pub(crate) fn record_deduplicated(
    violations: &mut Vec<Violation>,
    violation: Violation,
) -> Option<Violation> {
    match violations.iter_mut().find(|v| v.kind == violation.kind) {
        Some(existing) if existing.severity < violation.severity => {
            *existing = violation.clone();
            Some(violation)
        }
        Some(_) => None,
        None => {
            violations.push(violation.clone());
            Some(violation)
        }
    }
}
