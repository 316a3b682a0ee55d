//! Degradation plans issued when a budget is exhausted.
//!
//! The governor never acts on a plan itself; the controller decides whether to
//! return the partial result, retry with the suggested budget or fail outward.

use serde::{Deserialize, Serialize};

use super::checkpoint::Checkpoint;
use super::config::GuaranteesConfig;
use super::violation::ViolationKind;

/// Recommended fallback action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationStrategy {
    /// Nothing to salvage; fail outward
    Fail,
    /// Return the last checkpoint's partial result
    Partial,
    /// Build a final answer from partial results
    Synthesize,
    /// Fall back to a simpler execution mode
    Fallback,
}

impl DegradationStrategy {
    /// Whether the plan hands something back to the user.
    pub fn returns_result(&self) -> bool {
        !matches!(self, DegradationStrategy::Fail)
    }
}

/// What to do once a budget dimension is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationPlan {
    pub reason: String,
    pub strategy: DegradationStrategy,
    pub can_retry: bool,
    /// Empty unless the strategy returns a result
    pub partial_result: String,
    /// Limits for a retry, with the exhausted dimension doubled
    pub suggested_budget: GuaranteesConfig,
    /// Dimension that triggered the plan, if any was exhausted
    pub exhausted: Option<ViolationKind>,
}

impl DegradationPlan {
    /// Build a plan for an exhausted dimension.
    pub fn for_exhaustion(
        kind: ViolationKind,
        reason: String,
        limits: &GuaranteesConfig,
        last_checkpoint: Option<&Checkpoint>,
    ) -> Self {
        let (strategy, partial_result) = salvage(last_checkpoint);

        Self {
            reason,
            strategy,
            can_retry: true,
            partial_result,
            suggested_budget: limits.doubled(kind),
            exhausted: Some(kind),
        }
    }

    /// Plan returned when asked to degrade while every dimension has headroom.
    pub fn not_exhausted(limits: &GuaranteesConfig, last_checkpoint: Option<&Checkpoint>) -> Self {
        let (strategy, partial_result) = salvage(last_checkpoint);

        Self {
            reason: "no budget dimension exhausted".to_string(),
            strategy,
            can_retry: true,
            partial_result,
            suggested_budget: limits.clone(),
            exhausted: None,
        }
    }
}

/// Partial result from the latest checkpoint, or nothing to return.
fn salvage(last_checkpoint: Option<&Checkpoint>) -> (DegradationStrategy, String) {
    match last_checkpoint {
        Some(checkpoint) => (
            DegradationStrategy::Partial,
            checkpoint.partial_result.clone(),
        ),
        None => (DegradationStrategy::Fail, String::new()),
    }
}
