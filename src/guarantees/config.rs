//! Enforced ceilings for one task execution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::violation::ViolationKind;
use crate::error::{GovernorError, Result};

/// Fraction of a limit at which a warning is raised.
pub const DEFAULT_WARNING_RATIO: f64 = 0.9;

/// Checkpoints retained per execution.
pub const DEFAULT_CHECKPOINT_HISTORY: usize = 16;

/// Ceiling enforced by [`ExecutionGuarantees`](super::ExecutionGuarantees).
///
/// A zero limit disables enforcement for that dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuaranteesConfig {
    /// Maximum spend in USD (0 = unlimited)
    pub max_cost_usd: f64,
    /// Maximum wall-clock time (0 = unlimited)
    #[serde(rename = "max_duration_ms", with = "duration_ms")]
    pub max_duration: Duration,
    /// Maximum recursive calls (0 = unlimited)
    pub max_recursive_calls: u32,
    /// Maximum tokens (0 = unlimited)
    pub max_tokens: u64,
    /// Maximum recursion depth (0 = unlimited)
    pub max_depth: u32,
}

impl Default for GuaranteesConfig {
    fn default() -> Self {
        Self {
            max_cost_usd: 1.0,
            max_duration: Duration::from_secs(300),
            max_recursive_calls: 100,
            max_tokens: 500_000,
            max_depth: 10,
        }
    }
}

impl GuaranteesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// No enforcement on any dimension.
    pub fn unlimited() -> Self {
        Self {
            max_cost_usd: 0.0,
            max_duration: Duration::ZERO,
            max_recursive_calls: 0,
            max_tokens: 0,
            max_depth: 0,
        }
    }

    pub fn with_max_cost_usd(mut self, usd: f64) -> Self {
        self.max_cost_usd = usd;
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = duration;
        self
    }

    pub fn with_max_recursive_calls(mut self, calls: u32) -> Self {
        self.max_recursive_calls = calls;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    /// Copy with the limit for `kind` doubled, used to suggest a retry budget.
    pub fn doubled(&self, kind: ViolationKind) -> Self {
        let mut next = self.clone();
        match kind {
            ViolationKind::Budget => next.max_cost_usd *= 2.0,
            ViolationKind::Tokens => next.max_tokens = next.max_tokens.saturating_mul(2),
            ViolationKind::Calls => {
                next.max_recursive_calls = next.max_recursive_calls.saturating_mul(2)
            }
            ViolationKind::Time => next.max_duration = next.max_duration.saturating_mul(2),
            ViolationKind::Depth => next.max_depth = next.max_depth.saturating_mul(2),
        }
        next
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_cost_usd.is_finite() || self.max_cost_usd < 0.0 {
            return Err(GovernorError::InvalidConfig(format!(
                "max_cost_usd must be a non-negative number, got {}",
                self.max_cost_usd
            )));
        }
        Ok(())
    }
}

/// Knobs shared by every execution a service governs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuaranteeTuning {
    /// Fraction of a limit at which a warning is raised (0.0 - 1.0)
    pub warning_ratio: f64,
    /// Number of checkpoints retained; older ones are evicted
    pub checkpoint_history: usize,
}

impl Default for GuaranteeTuning {
    fn default() -> Self {
        Self {
            warning_ratio: DEFAULT_WARNING_RATIO,
            checkpoint_history: DEFAULT_CHECKPOINT_HISTORY,
        }
    }
}

impl GuaranteeTuning {
    pub fn with_warning_ratio(mut self, ratio: f64) -> Self {
        self.warning_ratio = ratio;
        self
    }

    pub fn with_checkpoint_history(mut self, entries: usize) -> Self {
        self.checkpoint_history = entries;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.warning_ratio > 0.0 && self.warning_ratio < 1.0) {
            return Err(GovernorError::InvalidConfig(format!(
                "warning_ratio must be in (0, 1), got {}",
                self.warning_ratio
            )));
        }
        if self.checkpoint_history == 0 {
            return Err(GovernorError::InvalidConfig(
                "checkpoint_history must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serialize a duration as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
