//! Demo Workloads
//!
//! Synthetic batches driven by the `fanout` binary:
//! - `run`: hit-counting items that simulate long-running work
//! - `strategies`: the same workload under every accumulation strategy
//! - `capture`: items that return the loop counter they were built from

use crate::executor::{BoundedExecutor, EventSink, ExecutorError};
use crossbeam_channel::{Sender, bounded};
use fanout_core::{
    CancellationToken, Discard, Strategy, StrategyAccumulator, Sum, WorkError, WorkItem,
    simulate_work,
};
use fanout_report::ExecutionReport;
use std::collections::BTreeMap;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Shape of a synthetic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    /// Number of items
    pub items: usize,
    /// Simulated duration of each item
    pub work_time: Duration,
    /// Item that returns an error
    pub fail_at: Option<usize>,
    /// Item that panics
    pub panic_at: Option<usize>,
}

impl Workload {
    /// Fault-free workload.
    pub fn new(items: usize, work_time: Duration) -> Self {
        Self {
            items,
            work_time,
            fail_at: None,
            panic_at: None,
        }
    }

    /// Build the hit-counting items: each simulates its work and yields 1.
    pub fn build(&self) -> Vec<WorkItem<u64>> {
        (0..self.items)
            .map(|i| {
                let Workload {
                    work_time,
                    fail_at,
                    panic_at,
                    ..
                } = *self;
                WorkItem::bind(i, move |i, ctx| {
                    simulate_work(ctx, work_time)?;
                    if fail_at == Some(i) {
                        return Err(WorkError::computation(format!(
                            "injected failure at item {}",
                            i
                        )));
                    }
                    if panic_at == Some(i) {
                        panic!("injected panic at item {}", i);
                    }
                    Ok(1)
                })
                .with_estimate(work_time)
            })
            .collect()
    }
}

/// Run a workload, counting successful items with `strategy`.
pub fn run_workload(
    executor: &BoundedExecutor,
    workload: &Workload,
    strategy: Strategy,
    sink: &dyn EventSink,
) -> Result<ExecutionReport<u64, u64>, ExecutorError> {
    let accumulator = StrategyAccumulator::new(strategy, Sum);
    executor.run_with_sink(workload.build(), accumulator, sink)
}

/// Result of one strategy in a side-by-side comparison
#[derive(Debug, Clone)]
pub struct StrategyRun {
    /// Strategy used
    pub strategy: Strategy,
    /// Final counter value
    pub total: u64,
    /// Items that succeeded
    pub succeeded: usize,
    /// Items that failed
    pub failed: usize,
    /// Wall-clock time of the batch
    pub wall_time: Duration,
}

impl StrategyRun {
    /// Whether the counter matches the number of successful items.
    pub fn is_consistent(&self) -> bool {
        self.total == self.succeeded as u64
    }
}

/// Run the same workload once per strategy.
pub fn compare_strategies(
    executor: &BoundedExecutor,
    workload: &Workload,
    sink: &dyn EventSink,
) -> Result<Vec<StrategyRun>, ExecutorError> {
    Strategy::ALL
        .iter()
        .map(|&strategy| -> Result<StrategyRun, ExecutorError> {
            let start = Instant::now();
            let report = run_workload(executor, workload, strategy, sink)?;
            Ok(StrategyRun {
                strategy,
                total: report.total,
                succeeded: report.successes(),
                failed: report.failures(),
                wall_time: start.elapsed(),
            })
        })
        .collect()
}

/// Render a strategy comparison as a table
pub fn format_strategy_table(runs: &[StrategyRun]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<12} {:>8} {:>10} {:>8} {:>12}  {}\n",
        "strategy", "total", "succeeded", "failed", "wall time", "consistent"
    ));
    output.push_str(&"-".repeat(66));
    output.push('\n');
    for run in runs {
        output.push_str(&format!(
            "{:<12} {:>8} {:>10} {:>8} {:>12}  {}\n",
            run.strategy.name(),
            run.total,
            run.succeeded,
            run.failed,
            fanout_report::format_duration(run.wall_time.as_nanos() as f64),
            if run.is_consistent() { "yes" } else { "NO" }
        ));
    }
    output
}

/// Outcome of the closure-capture check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCheck {
    /// Number of items submitted
    pub expected: usize,
    /// Captured values that never came back
    pub missing: Vec<usize>,
    /// Captured values that came back more than once
    pub duplicated: Vec<usize>,
}

impl CaptureCheck {
    /// Whether every index came back exactly once.
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.duplicated.is_empty()
    }
}

/// Submit `items` items that each return the counter value they were built
/// from, and check that every value is seen exactly once.
pub fn capture_batch(
    executor: &BoundedExecutor,
    items: usize,
    sink: &dyn EventSink,
) -> Result<CaptureCheck, ExecutorError> {
    let batch: Vec<WorkItem<usize>> = (0..items)
        .map(|i| WorkItem::bind(i, |i, _| Ok(i)))
        .collect();
    let report = executor.run_with_sink(batch, Discard, sink)?;

    let mut seen: BTreeMap<usize, usize> = BTreeMap::new();
    for &value in report.values() {
        *seen.entry(value).or_default() += 1;
    }
    Ok(CaptureCheck {
        expected: items,
        missing: (0..items).filter(|i| !seen.contains_key(i)).collect(),
        duplicated: seen
            .iter()
            .filter(|&(_, &count)| count > 1)
            .map(|(&value, _)| value)
            .collect(),
    })
}

/// Trips a cancellation token after a delay unless disarmed first
pub struct Canceller {
    disarm: Sender<()>,
    handle: JoinHandle<bool>,
}

impl Canceller {
    /// Start the countdown.
    pub fn arm(token: CancellationToken, after: Duration) -> std::io::Result<Self> {
        let (disarm, disarmed) = bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("fanout-canceller".to_string())
            .spawn(move || match disarmed.recv_timeout(after) {
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    tracing::info!(after_ms = after.as_millis() as u64, "cancelling batch");
                    token.cancel();
                    true
                }
                _ => false,
            })?;
        Ok(Self { disarm, handle })
    }

    /// Stop the countdown; returns whether the token had already been tripped.
    pub fn disarm(self) -> bool {
        let _ = self.disarm.send(());
        self.handle.join().unwrap_or(false)
    }
}
