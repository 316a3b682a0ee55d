//! Admission control: difficulty estimation and compute allocation.
//!
//! # Overview
//!
//! - **DifficultyEstimator**: classifies a query as easy, medium or hard from a
//!   priority-ordered rule table plus the size of its context
//! - **AllocationPolicy**: fixed per-difficulty resource policy (tier, depth,
//!   parallelism, timeout share, per-call cost)
//! - **ComputeAllocator**: applies the policy, clamped to a caller's
//!   [`BudgetConfig`], and counts allocations
//!
//! # Example
//!
//! ```ignore
//! use rlm_governor::allocation::{BudgetConfig, ComputeAllocator};
//! use tokio_util::sync::CancellationToken;
//!
//! let allocator = ComputeAllocator::new();
//! let budget = BudgetConfig::default();
//! let allocation = allocator.allocate_compute(&CancellationToken::new(), "What is 15 + 27?", 100, &budget)?;
//!
//! let guarantees = ExecutionGuarantees::new(allocation.guarantees_config(&budget));
//! ```

mod allocator;
mod config;
mod estimator;

pub use allocator::{AllocatorStats, ComputeAllocation, ComputeAllocator};
pub use config::{AllocationPolicy, BudgetConfig, ModelTier, TierPolicy};
pub use estimator::{
    default_rules, estimate_difficulty, Difficulty, DifficultyAssessment, DifficultyEstimator,
    DifficultyRule, QueryFeatures, RuleMatcher, HIGH_CONTEXT_TOKENS, LONG_QUERY_WORDS,
};
