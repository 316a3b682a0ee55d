//! Live budget enforcement for a single task execution.
//!
//! # Overview
//!
//! - **GuaranteesConfig**: hard ceilings on cost, time, calls, tokens and depth
//! - **ExecutionGuarantees**: thread-safe governor that records usage, raises
//!   violations at the warning ratio and at the limit, and keeps checkpoints
//! - **DegradationPlan**: what the controller should do once a dimension runs out
//! - **DeadlineContext**: cancellation scope that expires with the execution
//!
//! # Example
//!
//! ```ignore
//! use rlm_governor::guarantees::{ExecutionGuarantees, GuaranteesConfig};
//!
//! let guarantees = ExecutionGuarantees::new(GuaranteesConfig::default());
//! let (ctx, _guard) = guarantees.context(&parent_token);
//!
//! while guarantees.can_proceed(0.01) {
//!     guarantees.record_call();
//!     guarantees.record_cost(0.01);
//!     guarantees.checkpoint(best_answer_so_far());
//!     if guarantees.must_stop() {
//!         let plan = guarantees.on_budget_exhausted();
//!         break;
//!     }
//! }
//! ```

mod checkpoint;
mod config;
mod deadline;
mod degradation;
mod tracker;
mod violation;

pub use checkpoint::{Checkpoint, RemainingBudget, Usage};
pub use config::{
    GuaranteeTuning, GuaranteesConfig, DEFAULT_CHECKPOINT_HISTORY, DEFAULT_WARNING_RATIO,
};
pub use deadline::{DeadlineContext, DeadlineGuard};
pub use degradation::{DegradationPlan, DegradationStrategy};
pub use tracker::{ExecutionGuarantees, GovernorState, ViolationCallback};
pub use violation::{Severity, Violation, ViolationKind};
