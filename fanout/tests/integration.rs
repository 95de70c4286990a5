//! Integration tests for Fanout
//!
//! These tests verify the end-to-end behavior of bounded batch execution.

use fanout::{
    BoundedExecutor, CancellationToken, Discard, ExecutorError, FailureKind, LifecycleEvent,
    RecordingSink, Strategy, StrategyAccumulator, Sum, WorkError, WorkItem, combine_with,
    generate_json_report, simulate_work, submit_batch,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn unit_items(n: usize) -> Vec<WorkItem<u64>> {
    (0..n).map(|_| WorkItem::from_fn(|| 1u64)).collect()
}

/// Every submitted item yields exactly one outcome
#[test]
fn test_conservation() {
    let items: Vec<WorkItem<usize>> = (0..37)
        .map(|i| {
            WorkItem::bind(i, |i, ctx| {
                simulate_work(ctx, Duration::from_micros(200 * (i % 5) as u64))?;
                if i % 7 == 3 {
                    return Err(WorkError::computation(format!("item {} rejected", i)));
                }
                Ok(i)
            })
        })
        .collect();

    let report = submit_batch(items, 5, Discard).unwrap();

    assert_eq!(report.summary.total_items, 37);
    assert_eq!(report.successes() + report.failures(), 37);
    let indices: Vec<usize> = report.outcomes.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..37).collect::<Vec<_>>());
    assert_eq!(report.failed_indices(), vec![3, 10, 17, 24, 31]);
}

/// Active set size never exceeds the limit, observed both from events and
/// from inside the computations
#[test]
fn test_concurrency_bound() {
    for limit in [1, 2, 5] {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<WorkItem<()>> = (0..20)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                WorkItem::new(move |ctx| {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let result = simulate_work(ctx, Duration::from_millis(2));
                    running.fetch_sub(1, Ordering::SeqCst);
                    result
                })
            })
            .collect();

        let sink = RecordingSink::new();
        let report = BoundedExecutor::with_concurrency(limit)
            .run_with_sink(items, Discard, &sink)
            .unwrap();

        assert!(report.is_success());
        assert!(sink.max_active() <= limit, "limit {} exceeded", limit);
        assert!(peak.load(Ordering::SeqCst) <= limit);
        assert_eq!(report.meta.concurrency_limit, limit);
    }
}

/// After a completion, a pending item is admitted before the next completion
#[test]
fn test_no_idle_with_pending() {
    let items: Vec<WorkItem<u64>> = (0..12)
        .map(|i| {
            WorkItem::new(move |ctx| {
                simulate_work(ctx, Duration::from_millis(1 + (i % 4)))?;
                Ok(1)
            })
        })
        .collect();

    let sink = RecordingSink::new();
    BoundedExecutor::with_concurrency(3)
        .run_with_sink(items, Discard, &sink)
        .unwrap();

    let events = sink.events();
    let mut admitted = 0;
    let mut completed = 0;
    for (position, event) in events.iter().enumerate() {
        match event {
            LifecycleEvent::Admitted { .. } => admitted += 1,
            LifecycleEvent::Completed { .. } => {
                completed += 1;
                if admitted < 12 {
                    assert!(
                        matches!(events[position + 1], LifecycleEvent::Admitted { .. }),
                        "slot left idle after completion #{}",
                        completed
                    );
                }
            }
        }
        // The limit is saturated whenever work is pending
        if admitted < 12 && admitted >= 3 {
            assert!(admitted - completed >= 2);
        }
    }
    assert_eq!((admitted, completed), (12, 12));
}

/// 100 contributions of 1 sum to 100 under every strategy and limit
#[test]
fn test_accumulator_equivalence() {
    for strategy in Strategy::ALL {
        for limit in [1, 4, 16] {
            let accumulator = StrategyAccumulator::new(strategy, Sum);
            let report = submit_batch(unit_items(100), limit, accumulator).unwrap();
            assert_eq!(report.total, 100, "{} at limit {}", strategy, limit);
            assert_eq!(report.meta.strategy, Some(strategy));
        }
    }
}

/// Integer overflow wraps identically under every strategy and never escapes
/// as a panic
#[test]
fn test_overflow_is_consistent_across_strategies() {
    let totals: Vec<u32> = Strategy::ALL
        .iter()
        .map(|&strategy| {
            let items = vec![WorkItem::from_fn(|| u32::MAX), WorkItem::from_fn(|| 1u32)];
            let report = submit_batch(items, 2, StrategyAccumulator::new(strategy, Sum)).unwrap();
            assert!(report.is_success(), "{} recorded a failure", strategy);
            assert_eq!(report.successes(), 2);
            report.total
        })
        .collect();

    assert_eq!(totals, vec![0, 0, 0]);
}

/// Non-numeric totals work with the locked and partitioned strategies
#[test]
fn test_set_union_accumulation() {
    type Set = BTreeSet<usize>;
    let union = || {
        combine_with(
            Set::new(),
            |mut set: Set, value: &usize| {
                set.insert(*value);
                set
            },
            |mut left: Set, right: Set| {
                left.extend(right);
                left
            },
        )
    };
    let items = || -> Vec<WorkItem<usize>> {
        (0..25).map(|i| WorkItem::bind(i, |i, _| Ok(i * 2))).collect()
    };

    let locked = submit_batch(items(), 4, fanout::LockedAccumulator::new(union())).unwrap();
    let partitioned =
        submit_batch(items(), 4, fanout::PartitionedAccumulator::new(union())).unwrap();

    let expected: Set = (0..25).map(|i| i * 2).collect();
    assert_eq!(locked.total, expected);
    assert_eq!(partitioned.total, expected);
}

/// An empty batch returns immediately with zero counts
#[test]
fn test_empty_batch() {
    let start = Instant::now();
    let report = submit_batch(
        Vec::<WorkItem<u64>>::new(),
        8,
        StrategyAccumulator::new(Strategy::Partitioned, Sum),
    )
    .unwrap();

    assert_eq!(report.summary.total_items, 0);
    assert_eq!(report.successes(), 0);
    assert_eq!(report.failures(), 0);
    assert_eq!(report.total, 0);
    assert!(report.outcomes.is_empty());
    assert!(start.elapsed() < Duration::from_secs(1));
}

/// Items built in a loop see their own counter value, each exactly once
#[test]
fn test_closure_capture() {
    let items: Vec<WorkItem<usize>> = (0..10).map(|i| WorkItem::bind(i, |i, _| Ok(i))).collect();
    let report = submit_batch(items, 4, Discard).unwrap();

    let mut values: Vec<usize> = report.values().copied().collect();
    values.sort_unstable();
    assert_eq!(values, (0..10).collect::<Vec<_>>());

    // Outcome i carries value i
    for record in &report.outcomes {
        assert_eq!(record.value, Some(record.index));
    }
}

/// One failing item does not affect the others
#[test]
fn test_failure_isolation() {
    let items: Vec<WorkItem<u64>> = (0..5)
        .map(|i| {
            WorkItem::bind(i, |i, _| {
                if i == 2 {
                    Err(WorkError::computation("index 2 always fails"))
                } else {
                    Ok(1)
                }
            })
        })
        .collect();

    let report = submit_batch(items, 2, StrategyAccumulator::new(Strategy::Atomic, Sum)).unwrap();

    assert_eq!(report.successes(), 4);
    assert_eq!(report.failures(), 1);
    assert_eq!(report.failed_indices(), vec![2]);
    assert_eq!(report.total, 4);
    assert_eq!(
        report.outcome(2).unwrap().failure_kind(),
        Some(FailureKind::Computation)
    );
    assert_eq!(report.exit_code(), 1);
}

/// Panics are caught per item and do not reach the accumulator
#[test]
fn test_panic_isolation() {
    let items: Vec<WorkItem<u64>> = (0..6)
        .map(|i| {
            WorkItem::bind(i, |i, _| {
                if i % 3 == 0 {
                    panic!("unlucky item {}", i);
                }
                Ok(10)
            })
        })
        .collect();

    let accumulator = StrategyAccumulator::new(Strategy::Partitioned, Sum);
    let report = submit_batch(items, 3, accumulator).unwrap();

    assert_eq!(report.total, 40);
    assert_eq!(report.summary.panicked, 2);
    assert_eq!(report.failed_indices(), vec![0, 3]);
}

/// Cancellation marks running and pending items as cancelled
#[test]
fn test_cancellation() {
    let token = CancellationToken::new();
    let executor = BoundedExecutor::with_concurrency(2).with_cancellation(token.clone());
    let items: Vec<WorkItem<()>> = (0..6)
        .map(|_| WorkItem::new(|ctx| simulate_work(ctx, Duration::from_secs(30))))
        .collect();

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        token.cancel();
    });
    let start = Instant::now();
    let report = executor.run(items, Discard).unwrap();
    canceller.join().unwrap();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(report.summary.total_items, 6);
    assert_eq!(report.summary.cancelled, 6);
    assert!(report
        .outcomes
        .iter()
        .all(|r| r.failure_kind() == Some(FailureKind::Cancelled)));
}

/// Items that ignore cancellation still finish normally
#[test]
fn test_cancellation_is_cooperative() {
    let executor = BoundedExecutor::with_concurrency(1);
    let token = executor.cancellation_token();
    let items = vec![
        WorkItem::from_fn(move || {
            token.cancel();
            7u32
        }),
        WorkItem::from_fn(|| 8u32),
    ];

    let report = executor.run(items, Discard).unwrap();
    assert_eq!(report.outcome(0).unwrap().value, Some(7));
    assert_eq!(
        report.outcome(1).unwrap().failure_kind(),
        Some(FailureKind::Cancelled)
    );
}

/// Contract violations are returned as errors, not recorded as item failures
#[test]
fn test_contract_violations() {
    assert!(matches!(
        submit_batch(unit_items(3), 0, Discard),
        Err(ExecutorError::InvalidConcurrencyLimit(0))
    ));

    let items = vec![
        WorkItem::from_fn(|| 1u64).with_index(4),
        WorkItem::from_fn(|| 1u64).with_index(4),
    ];
    assert!(matches!(
        submit_batch(items, 2, Discard),
        Err(ExecutorError::DuplicateIndex(4))
    ));
}

/// Failed items can be resubmitted under their original identity
#[test]
fn test_retry_by_resubmission() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let flaky = |attempts: Arc<AtomicUsize>| {
        WorkItem::new(move |_| {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(WorkError::computation("first attempt fails"))
            } else {
                Ok(5u64)
            }
        })
    };

    let first = submit_batch(vec![flaky(Arc::clone(&attempts)).with_index(9)], 1, Discard).unwrap();
    assert_eq!(first.failed_indices(), vec![9]);

    let retry = submit_batch(vec![flaky(Arc::clone(&attempts)).with_index(9)], 1, Discard).unwrap();
    assert_eq!(retry.outcome(9).unwrap().value, Some(5));
}

/// The JSON report carries every item and the final total
#[test]
fn test_json_report_roundtrip_fields() {
    let accumulator = StrategyAccumulator::new(Strategy::Locked, Sum);
    let report = submit_batch(unit_items(4), 2, accumulator).unwrap();
    let json = generate_json_report(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["total"], 4);
    assert_eq!(value["meta"]["strategy"], "locked");
    assert_eq!(value["meta"]["worker_threads"], 2);
    assert_eq!(value["outcomes"].as_array().map(|a| a.len()), Some(4));
}
