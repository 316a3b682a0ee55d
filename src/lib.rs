//! Compute governor for recursive LLM execution loops.
//!
//! [`allocation`] decides up front how much compute a query deserves;
//! [`guarantees`] enforces the resulting ceilings while the task runs.

pub mod allocation;
pub mod error;
pub mod guarantees;
pub mod settings;

pub use allocation::{
    estimate_difficulty, BudgetConfig, ComputeAllocation, ComputeAllocator, Difficulty,
    DifficultyAssessment, ModelTier,
};
pub use error::{GovernorError, Result};
pub use guarantees::{
    Checkpoint, DegradationPlan, DegradationStrategy, ExecutionGuarantees, GuaranteesConfig,
    Severity, Violation, ViolationKind,
};
pub use settings::GovernorSettings;
