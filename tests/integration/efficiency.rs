//! Adaptive allocation against a static maximum-budget baseline.

use rlm_governor::allocation::{BudgetConfig, ComputeAllocator, Difficulty, ModelTier};
use rlm_governor::guarantees::{DegradationStrategy, ExecutionGuarantees, ViolationKind};
use tokio_util::sync::CancellationToken;

/// A realistic mix of trivial lookups, bounded analysis and open-ended work.
const BATCH: &[(&str, u64, Difficulty)] = &[
    ("What is 15 + 27?", 0, Difficulty::Easy),
    ("What time is it?", 0, Difficulty::Easy),
    ("Calculate 3 * (4 - 1)", 200, Difficulty::Easy),
    ("Who wrote Dune?", 1_000, Difficulty::Easy),
    ("Summarize the attached meeting notes", 2_000, Difficulty::Medium),
    ("Explain how a B-tree handles splits", 500, Difficulty::Medium),
    ("Compare Raft and Paxos", 0, Difficulty::Medium),
    ("Implement a rate limiter with sliding windows", 1_500, Difficulty::Hard),
    ("Design the storage layer for a time-series database", 0, Difficulty::Hard),
    ("Debug why this service deadlocks under load", 4_000, Difficulty::Hard),
];

#[test]
fn test_batch_is_classified_as_expected() {
    let allocator = ComputeAllocator::new();
    for (query, context_tokens, expected) in BATCH {
        let assessment = allocator.estimate_difficulty(query, *context_tokens);
        assert_eq!(assessment.level, *expected, "query: {query}");
    }
}

#[test]
fn test_adaptive_allocation_beats_static_baseline() {
    let allocator = ComputeAllocator::new();
    let budget = BudgetConfig::default();
    let cancel = CancellationToken::new();

    let mut adaptive_cost = 0.0;
    let mut adaptive_depth = 0u32;
    for (query, context_tokens, _) in BATCH {
        let allocation = allocator
            .allocate_compute(&cancel, query, *context_tokens, &budget)
            .unwrap();
        assert!(allocation.estimated_cost <= budget.cost_limit);
        assert!(allocation.depth_budget <= budget.max_depth);
        assert!(allocation.timeout_ms <= budget.max_time_ms);
        adaptive_cost += allocation.estimated_cost;
        adaptive_depth += allocation.depth_budget;
    }

    let n = BATCH.len() as f64;
    let static_cost = budget.cost_limit * n;
    let static_depth = budget.max_depth as f64 * n;

    assert!(adaptive_cost < 0.5 * static_cost, "cost {adaptive_cost}");
    assert!(
        (adaptive_depth as f64) < 0.6 * static_depth,
        "depth {adaptive_depth}"
    );

    let stats = allocator.stats();
    assert_eq!(stats.total_allocations, BATCH.len() as u64);
    assert_eq!(stats.easy, 4);
    assert_eq!(stats.medium, 3);
    assert_eq!(stats.hard, 3);
}

#[test]
fn test_allocation_drives_execution_limits() {
    let allocator = ComputeAllocator::new();
    let budget = BudgetConfig::default();
    let allocation = allocator
        .allocate_compute(
            &CancellationToken::new(),
            "Compare Raft and Paxos",
            0,
            &budget,
        )
        .unwrap();
    assert_eq!(allocation.model_tier, ModelTier::Balanced);

    let limits = allocation.guarantees_config(&budget);
    assert_eq!(limits.max_depth, 5);
    assert_eq!(limits.max_recursive_calls, 40);
    assert_eq!(limits.max_tokens, 80_000);

    let guarantees = ExecutionGuarantees::new(limits);
    let mut steps = 0;
    while guarantees.can_proceed(0.0) {
        guarantees.record_call();
        guarantees.record_tokens(1_000);
        if steps % 10 == 0 {
            guarantees.checkpoint(format!("draft after {steps} calls"));
        }
        steps += 1;
    }

    assert_eq!(steps, 40);
    assert!(guarantees.must_stop());

    let plan = guarantees.on_budget_exhausted();
    assert_eq!(plan.exhausted, Some(ViolationKind::Calls));
    assert_eq!(plan.strategy, DegradationStrategy::Partial);
    assert_eq!(plan.partial_result, "draft after 30 calls");
    assert_eq!(plan.suggested_budget.max_recursive_calls, 80);
}

#[tokio::test]
async fn test_cancelled_caller_gets_no_allocation() {
    let allocator = ComputeAllocator::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = allocator.allocate_compute(&cancel, "What is 2 + 2?", 0, &BudgetConfig::default());
    assert!(result.is_err());
    assert_eq!(allocator.stats().total_allocations, 0);
}
