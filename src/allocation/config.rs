//! Allocation ceilings and per-tier policy.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::estimator::Difficulty;
use crate::error::{GovernorError, Result};

/// Model tier an allocation is routed to.
///
/// The catalog behind each name lives with the LLM client; the governor only
/// references tiers by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheap, low-latency model
    Fast,
    /// Mid-range model
    Balanced,
    /// Strongest model available
    Quality,
}

impl ModelTier {
    /// Stable tier name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Fast => "fast",
            ModelTier::Balanced => "balanced",
            ModelTier::Quality => "quality",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ceiling an allocation is never allowed to exceed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Maximum recursion depth
    pub max_depth: u32,
    /// Maximum wall-clock time in milliseconds
    pub max_time_ms: u64,
    /// Maximum spend in USD
    pub cost_limit: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_time_ms: 300_000, // 5 minutes
            cost_limit: 1.0,
        }
    }
}

impl BudgetConfig {
    /// Create a new budget with default ceilings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum recursion depth.
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the maximum wall-clock time.
    pub fn with_max_time_ms(mut self, millis: u64) -> Self {
        self.max_time_ms = millis;
        self
    }

    /// Set the cost limit in USD.
    pub fn with_cost_limit(mut self, usd: f64) -> Self {
        self.cost_limit = usd;
        self
    }

    /// Reject ceilings that cannot produce a usable allocation.
    pub fn validate(&self) -> Result<()> {
        // A zero ceiling would become an unlimited governor downstream
        if !self.cost_limit.is_finite() || self.cost_limit <= 0.0 {
            return Err(GovernorError::InvalidConfig(format!(
                "cost_limit must be a positive number, got {}",
                self.cost_limit
            )));
        }
        if self.max_depth == 0 {
            return Err(GovernorError::InvalidConfig(
                "max_depth must be greater than zero".to_string(),
            ));
        }
        if self.max_time_ms == 0 {
            return Err(GovernorError::InvalidConfig(
                "max_time_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resource policy applied to one difficulty level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Model tier to route to
    pub model_tier: ModelTier,
    /// Recursion depth before clamping to the budget
    pub depth: u32,
    /// Concurrent sub-calls allowed
    pub parallel_calls: u32,
    /// Share of the budget's time ceiling (0.0 - 1.0)
    pub timeout_fraction: f64,
    /// Projected USD cost of one call on this tier
    pub cost_per_call_usd: f64,
    /// Token allowance per call on this tier
    pub tokens_per_call: u64,
}

impl TierPolicy {
    /// Policy for easy queries.
    pub fn fast() -> Self {
        Self {
            model_tier: ModelTier::Fast,
            depth: 2,
            parallel_calls: 1,
            timeout_fraction: 0.2,
            cost_per_call_usd: 0.001,
            tokens_per_call: 4_000,
        }
    }

    /// Policy for medium queries.
    pub fn balanced() -> Self {
        Self {
            model_tier: ModelTier::Balanced,
            depth: 5,
            parallel_calls: 2,
            timeout_fraction: 0.5,
            cost_per_call_usd: 0.01,
            tokens_per_call: 8_000,
        }
    }

    /// Policy for hard queries.
    pub fn quality() -> Self {
        Self {
            model_tier: ModelTier::Quality,
            depth: 10,
            parallel_calls: 4,
            timeout_fraction: 1.0,
            cost_per_call_usd: 0.05,
            tokens_per_call: 16_000,
        }
    }

    /// Projected cost for a given depth on this tier.
    pub fn calculate_cost(&self, depth: u32) -> f64 {
        depth as f64 * self.parallel_calls as f64 * self.cost_per_call_usd
    }
}

/// Fixed mapping from difficulty level to tier policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    pub easy: TierPolicy,
    pub medium: TierPolicy,
    pub hard: TierPolicy,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            easy: TierPolicy::fast(),
            medium: TierPolicy::balanced(),
            hard: TierPolicy::quality(),
        }
    }
}

impl AllocationPolicy {
    /// Policy entry for a difficulty level.
    pub fn for_level(&self, level: Difficulty) -> &TierPolicy {
        match level {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    /// Replace the policy for one difficulty level.
    pub fn with_tier(mut self, level: Difficulty, policy: TierPolicy) -> Self {
        match level {
            Difficulty::Easy => self.easy = policy,
            Difficulty::Medium => self.medium = policy,
            Difficulty::Hard => self.hard = policy,
        }
        self
    }

    /// Check every tier has sane values.
    pub fn validate(&self) -> Result<()> {
        for (name, tier) in [("easy", &self.easy), ("medium", &self.medium), ("hard", &self.hard)] {
            if !(tier.timeout_fraction > 0.0 && tier.timeout_fraction <= 1.0) {
                return Err(GovernorError::InvalidConfig(format!(
                    "{name} timeout_fraction must be in (0, 1], got {}",
                    tier.timeout_fraction
                )));
            }
            if tier.parallel_calls == 0 {
                return Err(GovernorError::InvalidConfig(format!(
                    "{name} parallel_calls must be at least 1"
                )));
            }
            if !tier.cost_per_call_usd.is_finite() || tier.cost_per_call_usd < 0.0 {
                return Err(GovernorError::InvalidConfig(format!(
                    "{name} cost_per_call_usd must be non-negative"
                )));
            }
        }
        Ok(())
    }
}
