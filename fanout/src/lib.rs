#![warn(missing_docs)]
//! # Fanout
//!
//! Bounded concurrent execution of long-running, compute-bound work items.
//!
//! Fanout runs a closed batch of items on a dedicated worker pool:
//! - **Bounded**: never more than `K` items in flight (`K` defaults to the hardware concurrency)
//! - **Wait for any, backfill**: each completion frees a slot that the next pending item takes immediately
//! - **Failure isolation**: errors, panics and cancellations are recorded per item; the batch always finishes
//! - **Safe accumulation**: locked, atomic and partitioned-reduce strategies yield identical totals
//! - **One report**: exactly one outcome per submitted item, sorted by submission index
//!
//! ## Quick Start
//!
//! ```ignore
//! use fanout::prelude::*;
//!
//! let items: Vec<WorkItem<u64>> = (0..100)
//!     .map(|i| WorkItem::bind(i, |i, ctx| {
//!         simulate_work(ctx, Duration::from_millis(10))?;
//!         Ok(i)
//!     }))
//!     .collect();
//!
//! let report = submit_batch(items, 4, StrategyAccumulator::new(Strategy::Atomic, Sum))?;
//! assert_eq!(report.total, (0..100).sum());
//! ```
//!
//! ## Observing the batch
//!
//! ```ignore
//! let sink = RecordingSink::new();
//! let report = BoundedExecutor::with_concurrency(4).run_with_sink(items, Discard, &sink)?;
//! assert!(sink.max_active() <= 4);
//! ```

// Re-export core types
pub use fanout_core::{
    Accumulator, AtomicAccumulator, AtomicTotal, CancellationToken, Combine, Computation, Count,
    Discard, FailureKind, FnCombine, IllegalTransition, ItemState, LockedAccumulator,
    PartitionedAccumulator, Strategy, StrategyAccumulator, Sum, WorkContext, WorkError, WorkItem,
    combine_with, panic_message, simulate_work,
};

// Re-export report types
pub use fanout_report::{
    ExecutionReport, FailureInfo, ItemRecord, ItemStatus, OutputFormat, REPORT_SCHEMA_VERSION,
    ReportMeta, ReportSummary, format_duration, format_human_output, generate_json_report,
};

// Re-export executor
pub use fanout_cli::{
    ActiveSet, ActiveSlot, BoundedExecutor, Completion, CompletionCollector, EventSink,
    ExecutionConfig, ExecutorError, LifecycleEvent, NullSink, ProgressSink, RecordingSink,
    TracingSink, completion_channel,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Accumulator, BoundedExecutor, CancellationToken, Discard, ExecutionReport, ExecutorError,
        Strategy, StrategyAccumulator, Sum, WorkContext, WorkError, WorkItem, combine_with,
        simulate_work, submit_batch,
    };
    pub use std::time::Duration;
}

/// Run `items` with at most `concurrency_limit` active at once and fold every
/// successful value into `accumulator`.
///
/// Blocks until the whole batch is terminal. Lifecycle events go to `tracing`
/// at debug level.
pub fn submit_batch<R, A>(
    items: Vec<WorkItem<R>>,
    concurrency_limit: usize,
    accumulator: A,
) -> Result<ExecutionReport<R, A::Total>, ExecutorError>
where
    R: Send + 'static,
    A: Accumulator<R>,
{
    BoundedExecutor::with_concurrency(concurrency_limit).run(items, accumulator)
}

/// Run the Fanout CLI.
///
/// ```ignore
/// fn main() {
///     fanout::run().unwrap();
/// }
/// ```
pub use fanout_cli::run;
