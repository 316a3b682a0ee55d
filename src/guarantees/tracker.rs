//! Live budget enforcement for one task execution.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::checkpoint::{Checkpoint, RemainingBudget, Usage};
use super::config::{GuaranteeTuning, GuaranteesConfig};
use super::deadline::{DeadlineContext, DeadlineGuard};
use super::degradation::DegradationPlan;
use super::violation::{
    reaches_limit, record_deduplicated, Measurement, Severity, Violation, ViolationKind,
    LIMIT_TOLERANCE,
};
use crate::error::Result;

/// Handler invoked once per newly recorded (or escalated) violation.
pub type ViolationCallback = Arc<dyn Fn(Violation) + Send + Sync>;

/// Lifecycle of a governed execution. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernorState {
    /// No violation recorded
    Active,
    /// At least one warning recorded
    Warned,
    /// At least one hard violation recorded; the controller must stop
    Exhausted,
    /// A degradation plan has been issued
    Degraded,
    /// The controller ended the execution
    Terminated,
}

/// A violation queued for the dispatcher thread.
type DispatchJob = (ViolationCallback, Violation);

/// Mutable state guarded by a single lock.
struct Inner {
    cost_usd: f64,
    tokens: u64,
    calls: u32,
    current_depth: u32,
    max_depth_seen: u32,
    violations: Vec<Violation>,
    checkpoints: VecDeque<Checkpoint>,
    state: GovernorState,
    on_violation: Option<ViolationCallback>,
    /// Queue into the dispatcher thread, started on first use
    dispatcher: Option<std_mpsc::Sender<DispatchJob>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            cost_usd: 0.0,
            tokens: 0,
            calls: 0,
            current_depth: 0,
            max_depth_seen: 0,
            violations: Vec::new(),
            checkpoints: VecDeque::new(),
            state: GovernorState::Active,
            on_violation: None,
            dispatcher: None,
        }
    }

    fn advance(&mut self, state: GovernorState) {
        self.state = self.state.max(state);
    }

    /// Queue a violation for the registered handler.
    ///
    /// Jobs are enqueued while the lock is held, so the single dispatcher
    /// thread delivers them in the order they were recorded. The handler
    /// itself never runs under the lock.
    fn notify(&mut self, violation: Violation) {
        let Some(callback) = self.on_violation.clone() else {
            return;
        };
        let mut job = (callback, violation);
        if let Some(sender) = &self.dispatcher {
            match sender.send(job) {
                Ok(()) => return,
                Err(std_mpsc::SendError(returned)) => job = returned,
            }
        }

        let (sender, receiver) = std_mpsc::channel::<DispatchJob>();
        let spawned = std::thread::Builder::new()
            .name("violation-dispatch".to_string())
            .spawn(move || {
                for (callback, violation) in receiver {
                    // A panicking handler must not take later events down with it
                    let _ = panic::catch_unwind(AssertUnwindSafe(|| callback(violation)));
                }
            });
        match spawned {
            Ok(_) => {
                let _ = sender.send(job);
                self.dispatcher = Some(sender);
            }
            Err(err) => {
                self.dispatcher = None;
                warn!(
                    error = %err,
                    kind = %job.1.kind,
                    "violation dispatcher unavailable, event dropped"
                );
            }
        }
    }
}

/// Budget governor for one task execution.
///
/// Every operation takes `&self` and is safe to call concurrently from the
/// controller loop and any parallel sub-calls; share it through an [`Arc`].
pub struct ExecutionGuarantees {
    limits: GuaranteesConfig,
    tuning: GuaranteeTuning,
    start_time: Instant,
    deadline: Option<Instant>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ExecutionGuarantees {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGuarantees")
            .field("limits", &self.limits)
            .field("usage", &self.usage())
            .field("state", &self.state())
            .finish()
    }
}

impl ExecutionGuarantees {
    /// Start governing an execution with default tuning. The clock starts now.
    pub fn new(limits: GuaranteesConfig) -> Self {
        Self::with_tuning(limits, GuaranteeTuning::default())
    }

    /// Like [`new`](Self::new), but rejects invalid limits instead of repairing them.
    pub fn try_new(limits: GuaranteesConfig) -> Result<Self> {
        Self::try_with_tuning(limits, GuaranteeTuning::default())
    }

    /// Like [`with_tuning`](Self::with_tuning), but rejects invalid input.
    pub fn try_with_tuning(limits: GuaranteesConfig, tuning: GuaranteeTuning) -> Result<Self> {
        limits.validate()?;
        tuning.validate()?;
        Ok(Self::with_tuning(limits, tuning))
    }

    /// Start governing with explicit tuning.
    ///
    /// An invalid cost limit (negative or NaN) is replaced by the smallest
    /// positive limit so any spend stops the execution; invalid tuning falls
    /// back to the defaults. Both cases are logged.
    pub fn with_tuning(mut limits: GuaranteesConfig, mut tuning: GuaranteeTuning) -> Self {
        if let Err(err) = limits.validate() {
            warn!(error = %err, "invalid cost limit, blocking all spend");
            limits.max_cost_usd = f64::MIN_POSITIVE;
        }
        if let Err(err) = tuning.validate() {
            warn!(error = %err, "invalid guarantee tuning, using defaults");
            tuning = GuaranteeTuning::default();
        }

        let start_time = Instant::now();
        let deadline = if limits.max_duration.is_zero() {
            None
        } else {
            start_time.checked_add(limits.max_duration)
        };
        Self {
            limits,
            tuning,
            start_time,
            deadline,
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Lock the counters; a panic in another holder does not invalidate them.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Limits being enforced.
    pub fn limits(&self) -> &GuaranteesConfig {
        &self.limits
    }

    /// When the execution started.
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Wall-clock deadline; `None` when time is unlimited.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time since the execution started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Record spend in USD. Negative or non-finite amounts are ignored.
    pub fn record_cost(&self, amount: f64) {
        if !amount.is_finite() || amount <= 0.0 {
            return;
        }
        self.mutate(|inner| inner.cost_usd += amount);
    }

    /// Record tokens consumed.
    pub fn record_tokens(&self, tokens: u64) {
        self.mutate(|inner| inner.tokens = inner.tokens.saturating_add(tokens));
    }

    /// Record one recursive call.
    pub fn record_call(&self) {
        self.mutate(|inner| inner.calls = inner.calls.saturating_add(1));
    }

    /// Descend one recursion level.
    pub fn enter_recursion(&self) {
        self.mutate(|inner| {
            inner.current_depth = inner.current_depth.saturating_add(1);
            inner.max_depth_seen = inner.max_depth_seen.max(inner.current_depth);
        });
    }

    /// Return from one recursion level; no-op at the top level.
    pub fn exit_recursion(&self) {
        self.mutate(|inner| inner.current_depth = inner.current_depth.saturating_sub(1));
    }

    /// Pre-flight check before doing more work costing `estimated_cost`.
    pub fn can_proceed(&self, estimated_cost: f64) -> bool {
        let inner = self.lock();
        let limits = &self.limits;

        if limits.max_recursive_calls > 0 && inner.calls >= limits.max_recursive_calls {
            return false;
        }
        if limits.max_tokens > 0 && inner.tokens >= limits.max_tokens {
            return false;
        }
        if limits.max_cost_usd > 0.0 {
            let projected = inner.cost_usd + estimated_cost.max(0.0);
            if reaches_limit(inner.cost_usd, limits.max_cost_usd)
                || projected > limits.max_cost_usd * (1.0 + LIMIT_TOLERANCE)
            {
                return false;
            }
        }
        true
    }

    /// Whether `tokens` more tokens fit in the budget.
    pub fn can_proceed_with_tokens(&self, tokens: u64) -> bool {
        if self.limits.max_tokens == 0 {
            return true;
        }
        let inner = self.lock();
        inner.tokens.saturating_add(tokens) <= self.limits.max_tokens
    }

    /// Evaluate every dimension against the thresholds.
    ///
    /// Returns all current violations; newly observed ones are also recorded
    /// and dispatched.
    pub fn check(&self) -> Vec<Violation> {
        let mut inner = self.lock();
        let current = self.evaluate(&inner);
        self.record(&mut inner, current.clone());
        current
    }

    /// True once any dimension has a hard violation.
    pub fn must_stop(&self) -> bool {
        let mut inner = self.lock();
        let current = self.evaluate(&inner);
        self.record(&mut inner, current);
        inner.violations.iter().any(Violation::is_hard)
    }

    /// Violations recorded so far, one per kind.
    pub fn violations(&self) -> Vec<Violation> {
        self.lock().violations.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GovernorState {
        self.lock().state
    }

    /// Mark the execution as ended by the controller.
    pub fn terminate(&self) {
        let mut inner = self.lock();
        inner.advance(GovernorState::Terminated);
        info!(usage = %self.snapshot(&inner).summary(), "execution terminated");
    }

    /// Snapshot current usage together with a partial result.
    pub fn checkpoint(&self, partial_result: impl Into<String>) {
        let mut inner = self.lock();
        let checkpoint = Checkpoint {
            partial_result: partial_result.into(),
            cost_used: inner.cost_usd,
            tokens_used: inner.tokens,
            calls_used: inner.calls,
            depth: inner.current_depth,
            timestamp: Utc::now(),
        };
        debug!(
            cost_used = checkpoint.cost_used,
            tokens_used = checkpoint.tokens_used,
            depth = checkpoint.depth,
            "checkpoint taken"
        );

        let capacity = self.tuning.checkpoint_history.max(1);
        while inner.checkpoints.len() >= capacity {
            inner.checkpoints.pop_front();
        }
        inner.checkpoints.push_back(checkpoint);
    }

    /// Most recent checkpoint, if any.
    pub fn last_checkpoint(&self) -> Option<Checkpoint> {
        self.lock().checkpoints.back().cloned()
    }

    /// Retained checkpoints, oldest first.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.lock().checkpoints.iter().cloned().collect()
    }

    /// Build a degradation plan for the first exhausted dimension.
    ///
    /// Dimensions are inspected in the order cost, tokens, calls, time, depth;
    /// when several are exhausted at once the first one decides the plan.
    pub fn on_budget_exhausted(&self) -> DegradationPlan {
        let plan = {
            let mut inner = self.lock();
            let current = self.evaluate(&inner);
            self.record(&mut inner, current);

            let measurements = self.measurements(&inner);
            let exhausted = ViolationKind::EXHAUSTION_PRIORITY.iter().find_map(|kind| {
                measurements
                    .iter()
                    .find(|m| m.kind == *kind && m.is_exhausted())
            });

            let last = inner.checkpoints.back();
            let plan = match exhausted {
                Some(m) => DegradationPlan::for_exhaustion(
                    m.kind,
                    format!("{} budget exhausted: {}", m.kind, m.usage_line()),
                    &self.limits,
                    last,
                ),
                None => DegradationPlan::not_exhausted(&self.limits, last),
            };
            if plan.exhausted.is_some() {
                inner.advance(GovernorState::Degraded);
            }
            plan
        };

        info!(
            reason = %plan.reason,
            strategy = ?plan.strategy,
            can_retry = plan.can_retry,
            returns_result = plan.strategy.returns_result(),
            "degradation plan issued"
        );
        plan
    }

    /// Snapshot of resources consumed so far.
    pub fn usage(&self) -> Usage {
        let inner = self.lock();
        self.snapshot(&inner)
    }

    /// Headroom left on every dimension.
    pub fn remaining_budget(&self) -> RemainingBudget {
        let inner = self.lock();
        let limits = &self.limits;

        RemainingBudget {
            cost_usd: if limits.max_cost_usd > 0.0 {
                (limits.max_cost_usd - inner.cost_usd).max(0.0)
            } else {
                f64::MAX
            },
            tokens: if limits.max_tokens > 0 {
                limits.max_tokens.saturating_sub(inner.tokens)
            } else {
                u64::MAX
            },
            calls: if limits.max_recursive_calls > 0 {
                limits.max_recursive_calls.saturating_sub(inner.calls)
            } else {
                u32::MAX
            },
            depth: if limits.max_depth > 0 {
                limits.max_depth.saturating_sub(inner.current_depth)
            } else {
                u32::MAX
            },
            time: self
                .deadline
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::MAX),
        }
    }

    /// Cancellation scope expiring at `start_time + max_duration`.
    ///
    /// Keep the guard alive for as long as the context is in use; dropping it
    /// cancels the context. Cancelling `parent` also cancels the context.
    pub fn context(&self, parent: &CancellationToken) -> (DeadlineContext, DeadlineGuard) {
        DeadlineContext::new(parent, self.deadline)
    }

    /// Register the violation handler, replacing any previous one.
    ///
    /// The handler runs on a dedicated dispatcher thread, never under the
    /// governor's lock, and sees violations in the order they were recorded.
    pub fn set_on_violation<F>(&self, callback: F)
    where
        F: Fn(Violation) + Send + Sync + 'static,
    {
        self.lock().on_violation = Some(Arc::new(callback));
    }

    /// Route violations into a channel instead of a callback.
    ///
    /// Replaces any handler registered with [`set_on_violation`](Self::set_on_violation).
    pub fn violation_events(&self) -> mpsc::UnboundedReceiver<Violation> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.set_on_violation(move |violation| {
            let _ = sender.send(violation);
        });
        receiver
    }

    /// Apply a counter update and re-evaluate violations.
    fn mutate(&self, update: impl FnOnce(&mut Inner)) {
        let mut inner = self.lock();
        update(&mut *inner);
        let current = self.evaluate(&inner);
        self.record(&mut inner, current);
    }

    fn measurements(&self, inner: &Inner) -> [Measurement; 5] {
        let limits = &self.limits;
        [
            Measurement::new(ViolationKind::Budget, inner.cost_usd, limits.max_cost_usd),
            Measurement::new(ViolationKind::Tokens, inner.tokens as f64, limits.max_tokens as f64),
            Measurement::new(
                ViolationKind::Calls,
                inner.calls as f64,
                limits.max_recursive_calls as f64,
            ),
            Measurement::new(
                ViolationKind::Time,
                self.elapsed().as_secs_f64(),
                limits.max_duration.as_secs_f64(),
            ),
            Measurement::new(
                ViolationKind::Depth,
                inner.max_depth_seen as f64,
                limits.max_depth as f64,
            ),
        ]
    }

    fn evaluate(&self, inner: &Inner) -> Vec<Violation> {
        self.measurements(inner)
            .iter()
            .filter_map(|m| m.evaluate(self.tuning.warning_ratio))
            .collect()
    }

    /// Store new violations and queue them for the handler.
    fn record(&self, inner: &mut Inner, current: Vec<Violation>) {
        for violation in current {
            if let Some(violation) = record_deduplicated(&mut inner.violations, violation) {
                warn!(
                    kind = %violation.kind,
                    severity = ?violation.severity,
                    message = %violation.message,
                    "budget violation"
                );
                let state = if violation.severity == Severity::Hard {
                    GovernorState::Exhausted
                } else {
                    GovernorState::Warned
                };
                inner.advance(state);
                inner.notify(violation);
            }
        }
    }

    fn snapshot(&self, inner: &Inner) -> Usage {
        Usage {
            cost_usd: inner.cost_usd,
            tokens: inner.tokens,
            calls: inner.calls,
            current_depth: inner.current_depth,
            max_depth_seen: inner.max_depth_seen,
            elapsed: self.elapsed(),
        }
    }
}
