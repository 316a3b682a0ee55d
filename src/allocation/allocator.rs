//! Difficulty-driven compute allocation.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::config::{AllocationPolicy, BudgetConfig, ModelTier};
use super::estimator::{Difficulty, DifficultyAssessment, DifficultyEstimator};
use crate::error::{GovernorError, Result};
use crate::guarantees::GuaranteesConfig;

/// Recursive calls allowed per unit of depth and parallelism.
const CALLS_PER_SLOT: u32 = 4;

/// Concrete resource plan for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeAllocation {
    /// Maximum recursion depth
    pub depth_budget: u32,
    /// Model tier to route calls to
    pub model_tier: ModelTier,
    /// Concurrent sub-calls allowed
    pub parallel_calls: u32,
    /// Wall-clock timeout in milliseconds
    pub timeout_ms: u64,
    /// Projected spend in USD
    pub estimated_cost: f64,
    /// Token allowance for the whole task
    pub token_budget: u64,
    /// Assessment the allocation was derived from
    pub difficulty: DifficultyAssessment,
}

impl ComputeAllocation {
    /// Timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Enforced ceiling for executing this allocation.
    ///
    /// Spend is capped by the caller's cost limit rather than the estimate so a
    /// task can overrun its projection without tripping a hard stop.
    pub fn guarantees_config(&self, budget: &BudgetConfig) -> GuaranteesConfig {
        GuaranteesConfig::new()
            .with_max_cost_usd(budget.cost_limit)
            .with_max_duration(self.timeout())
            .with_max_recursive_calls(
                self.depth_budget
                    .saturating_mul(self.parallel_calls)
                    .saturating_mul(CALLS_PER_SLOT),
            )
            .with_max_tokens(self.token_budget)
            .with_max_depth(self.depth_budget)
    }
}

/// Snapshot of allocator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorStats {
    pub total_allocations: u64,
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
}

/// Maps difficulty assessments onto bounded resource plans.
///
/// The allocator is shared freely between tasks; its only mutable state is a
/// set of atomic counters.
#[derive(Debug, Default)]
pub struct ComputeAllocator {
    estimator: DifficultyEstimator,
    policy: AllocationPolicy,
    total_allocations: AtomicU64,
    easy: AtomicU64,
    medium: AtomicU64,
    hard: AtomicU64,
}

impl ComputeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator with a custom policy table.
    pub fn with_policy(policy: AllocationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Use a custom difficulty estimator.
    pub fn with_estimator(mut self, estimator: DifficultyEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    /// Classify a query without allocating.
    pub fn estimate_difficulty(&self, query: &str, context_tokens: u64) -> DifficultyAssessment {
        self.estimator.estimate(query, context_tokens)
    }

    /// Estimate the query's difficulty and build an allocation clamped to `budget`.
    pub fn allocate_compute(
        &self,
        cancel: &CancellationToken,
        query: &str,
        context_tokens: u64,
        budget: &BudgetConfig,
    ) -> Result<ComputeAllocation> {
        if cancel.is_cancelled() {
            return Err(GovernorError::Cancelled);
        }
        budget.validate()?;

        let difficulty = self.estimator.estimate(query, context_tokens);
        let allocation = self.allocate_for(difficulty, budget);

        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        let counter = match allocation.difficulty.level {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        debug!(
            level = %allocation.difficulty.level,
            tier = %allocation.model_tier,
            depth = allocation.depth_budget,
            parallel = allocation.parallel_calls,
            timeout_ms = allocation.timeout_ms,
            estimated_cost = allocation.estimated_cost,
            "compute allocated"
        );

        Ok(allocation)
    }

    /// Apply the policy table to an existing assessment.
    pub fn allocate_for(
        &self,
        difficulty: DifficultyAssessment,
        budget: &BudgetConfig,
    ) -> ComputeAllocation {
        let tier = self.policy.for_level(difficulty.level);

        let depth_budget = tier.depth.min(budget.max_depth);
        let scaled_timeout = (budget.max_time_ms as f64 * tier.timeout_fraction).round() as u64;
        let timeout_ms = scaled_timeout.min(budget.max_time_ms);
        let estimated_cost = tier
            .calculate_cost(depth_budget)
            .min(budget.cost_limit.max(0.0));
        let token_budget = (depth_budget as u64)
            .saturating_mul(tier.parallel_calls as u64)
            .saturating_mul(tier.tokens_per_call);

        ComputeAllocation {
            depth_budget,
            model_tier: tier.model_tier,
            parallel_calls: tier.parallel_calls,
            timeout_ms,
            estimated_cost,
            token_budget,
            difficulty,
        }
    }

    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            easy: self.easy.load(Ordering::Relaxed),
            medium: self.medium.load(Ordering::Relaxed),
            hard: self.hard.load(Ordering::Relaxed),
        }
    }
}
