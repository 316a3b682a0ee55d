//! Concurrent access to a single governor from many tasks.

use futures::future::join_all;
use rlm_governor::guarantees::{ExecutionGuarantees, GuaranteesConfig, Severity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WORKERS: usize = 100;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_recording_is_exact() {
    let guarantees = Arc::new(ExecutionGuarantees::new(GuaranteesConfig::unlimited()));

    let tasks = (0..WORKERS).map(|i| {
        let guarantees = Arc::clone(&guarantees);
        tokio::spawn(async move {
            guarantees.record_call();
            guarantees.record_cost(0.01);
            guarantees.record_tokens(100);
            guarantees.enter_recursion();
            guarantees.checkpoint(format!("worker {i}"));
            let _ = guarantees.usage();
            let _ = guarantees.check();
            let _ = guarantees.can_proceed(0.01);
            guarantees.exit_recursion();
        })
    });
    for result in join_all(tasks).await {
        result.unwrap();
    }

    let usage = guarantees.usage();
    assert_eq!(usage.calls, WORKERS as u32);
    assert_eq!(usage.tokens, 100 * WORKERS as u64);
    assert!((usage.cost_usd - 0.01 * WORKERS as f64).abs() < 1e-9);
    assert_eq!(usage.current_depth, 0);
    assert!(usage.max_depth_seen >= 1);
    assert!(guarantees.last_checkpoint().is_some());
    assert!(guarantees.violations().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_overrun_reports_each_kind_once() {
    let guarantees = Arc::new(ExecutionGuarantees::new(
        GuaranteesConfig::unlimited()
            .with_max_cost_usd(0.5)
            .with_max_recursive_calls(50),
    ));
    let dispatched = Arc::new(AtomicUsize::new(0));
    {
        let dispatched = Arc::clone(&dispatched);
        guarantees.set_on_violation(move |_| {
            dispatched.fetch_add(1, Ordering::SeqCst);
        });
    }

    let tasks = (0..WORKERS).map(|_| {
        let guarantees = Arc::clone(&guarantees);
        tokio::spawn(async move {
            guarantees.record_call();
            guarantees.record_cost(0.01);
            guarantees.must_stop()
        })
    });
    for result in join_all(tasks).await {
        result.unwrap();
    }

    assert!(guarantees.must_stop());
    let violations = guarantees.violations();
    assert_eq!(violations.len(), 2);
    assert!(violations.iter().all(|v| v.severity == Severity::Hard));

    // Each kind fires a warning and then one escalation
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(dispatched.load(Ordering::SeqCst), 4);
}

#[test]
fn test_threads_share_governor() {
    let guarantees = Arc::new(ExecutionGuarantees::new(GuaranteesConfig::unlimited()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let guarantees = Arc::clone(&guarantees);
            std::thread::spawn(move || {
                for _ in 0..250 {
                    guarantees.record_tokens(4);
                    guarantees.record_call();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let usage = guarantees.usage();
    assert_eq!(usage.tokens, 8_000);
    assert_eq!(usage.calls, 2_000);
}
