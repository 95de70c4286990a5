//! Bounded Execution
//!
//! Runs a closed batch of work items with at most `concurrency_limit` of them
//! in flight, backfilling each freed slot with the next pending item.
//!
//! ## Data Flow
//!
//! ```text
//! Vec<WorkItem<R>>  (submission order)
//!        │  assign_indices
//!        ▼
//!   pending queue ──admit──▶ ActiveSet (≤ K slots) ──spawn──▶ rayon worker
//!        ▲                        │                              │
//!        │                        │ release                      │ run, then contribute
//!        │                        ▼                              ▼
//!        └──────backfill──── CompletionCollector ◀──channel── Completion
//!                                 │
//!                                 ▼
//!                   ItemRecord + accumulator partial
//!                                 │
//!                                 ▼
//!                          ExecutionReport
//! ```
//!
//! The coordinating loop runs on the caller's thread inside
//! `ThreadPool::in_place_scope`, so workers can borrow the accumulator for the
//! duration of the batch.
//!
//! Panics are caught in three places. A panicking computation fails its item
//! as `panic`. A panicking `contribute` fails the item as `accumulation`, and
//! its value never reaches the total. A panicking `finish` has no item to
//! blame and aborts the batch with [`ExecutorError::AccumulatorPanicked`].

use super::active::ActiveSet;
use super::collector::{Completion, completion_channel};
use super::error::ExecutorError;
use super::events::{EventSink, LifecycleEvent, TracingSink};
use fanout_core::{
    Accumulator, CancellationToken, ItemState, WorkContext, WorkError, WorkItem, panic_message,
};
use fanout_report::{ExecutionReport, ItemRecord, ReportMeta};
use rayon::ThreadPoolBuilder;
use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

/// Configuration for bounded execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Maximum number of simultaneously active items
    pub concurrency_limit: usize,
}

impl ExecutionConfig {
    /// Limit equal to the machine's hardware concurrency.
    pub fn hardware() -> Self {
        Self {
            concurrency_limit: num_cpus::get().max(1),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::hardware()
    }
}

/// Executes batches of work items under a concurrency limit
#[derive(Debug, Clone, Default)]
pub struct BoundedExecutor {
    config: ExecutionConfig,
    cancel: CancellationToken,
}

impl BoundedExecutor {
    /// Create an executor with its own cancellation token.
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Shorthand for an executor with the given limit.
    pub fn with_concurrency(concurrency_limit: usize) -> Self {
        Self::new(ExecutionConfig { concurrency_limit })
    }

    /// Share an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Handle that cancels this executor's batches when tripped.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a batch, reporting lifecycle events through `tracing`.
    pub fn run<R, A>(
        &self,
        items: Vec<WorkItem<R>>,
        accumulator: A,
    ) -> Result<ExecutionReport<R, A::Total>, ExecutorError>
    where
        R: Send + 'static,
        A: Accumulator<R>,
    {
        self.run_with_sink(items, accumulator, &TracingSink)
    }

    /// Run a batch to completion.
    ///
    /// Blocks until every item is terminal. Item failures, panics and
    /// cancellations are recorded in the report; only contract violations
    /// surface as `Err`.
    pub fn run_with_sink<R, A, S>(
        &self,
        items: Vec<WorkItem<R>>,
        accumulator: A,
        sink: &S,
    ) -> Result<ExecutionReport<R, A::Total>, ExecutorError>
    where
        R: Send + 'static,
        A: Accumulator<R>,
        S: EventSink + ?Sized,
    {
        let limit = self.config.concurrency_limit;
        if limit == 0 {
            return Err(ExecutorError::InvalidConcurrencyLimit(limit));
        }

        let items = assign_indices(items)?;
        let hardware_threads = num_cpus::get();
        let strategy = accumulator.strategy();

        if items.is_empty() {
            tracing::debug!(limit, "empty batch");
            let meta = ReportMeta::now(limit, 0, hardware_threads, strategy);
            let total = finish_accumulator::<R, A>(accumulator, Vec::new())?;
            return Ok(ExecutionReport::assemble(meta, Vec::new(), total, 0.0));
        }

        let total_items = items.len();
        let width = limit.min(total_items);
        let pool = ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("fanout-worker-{}", i))
            .build()
            .map_err(|e| ExecutorError::ThreadPool(e.to_string()))?;

        tracing::info!(
            items = total_items,
            limit,
            workers = width,
            strategy = strategy.map(|s| s.name()).unwrap_or("none"),
            "starting batch"
        );

        let start = Instant::now();
        let mut batch = Batch::new(width, total_items, sink);
        let mut pending = items.into_iter();
        let (sender, collector) = completion_channel::<R, A::Partial>();
        // Dropped once the queue is drained, so a vanished worker ends the
        // wait with `WorkerLost` instead of blocking forever.
        let mut sender = Some(sender);
        let accumulator_ref = &accumulator;

        let outcome = pool.in_place_scope(|scope| -> Result<(), ExecutorError> {
            let mut admit_next =
                |batch: &mut Batch<'_, R, A::Partial, S>| -> Result<bool, ExecutorError> {
                    let Some((index, item)) = pending.next() else {
                        return Ok(false);
                    };
                    let tx = match &sender {
                        Some(tx) => tx.clone(),
                        None => return Ok(false),
                    };
                    if pending.len() == 0 {
                        sender = None;
                    }

                    let slot = batch.admit(index)?;
                    let token = self.cancel.clone();
                    scope.spawn(move |_| {
                        let started = Instant::now();
                        let ctx = WorkContext::new(index, token);
                        let outcome = if ctx.is_cancelled() {
                            Err(WorkError::Cancelled)
                        } else {
                            run_item(item, &ctx, accumulator_ref)
                        };
                        // The receiver outlives the scope
                        let _ = tx.send(Completion {
                            slot,
                            index,
                            outcome,
                            elapsed: started.elapsed(),
                        });
                    });
                    Ok(true)
                };

            while batch.active.has_free_slot() && admit_next(&mut batch)? {}

            while !batch.active.is_empty() {
                let completion = collector.wait_any(&mut batch.active)?;
                batch.complete(completion)?;
                admit_next(&mut batch)?;
            }
            Ok(())
        });

        if let Err(error) = outcome {
            tracing::error!(%error, "batch aborted");
            return Err(error);
        }

        let Batch {
            records, partials, ..
        } = batch;
        let total = match finish_accumulator::<R, A>(accumulator, partials) {
            Ok(total) => total,
            Err(error) => {
                tracing::error!(%error, "batch aborted");
                return Err(error);
            }
        };
        let total_duration_ms = start.elapsed().as_secs_f64() * 1e3;
        let meta = ReportMeta::now(limit, width, hardware_threads, strategy);
        let report = ExecutionReport::assemble(meta, records, total, total_duration_ms);

        tracing::info!(
            items = report.summary.total_items,
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            duration_ms = total_duration_ms,
            "batch finished"
        );
        Ok(report)
    }
}

/// Worker side of one item: the computation, then its contribution. Each step
/// has its own panic boundary so the report blames the right one.
fn run_item<R, A>(
    item: WorkItem<R>,
    ctx: &WorkContext,
    accumulator: &A,
) -> Result<(R, A::Partial), WorkError>
where
    A: Accumulator<R>,
{
    let value = catch_unwind(AssertUnwindSafe(|| item.run(ctx)))
        .unwrap_or_else(|panic| Err(WorkError::Panicked(panic_message(panic.as_ref()))))?;
    let partial = catch_unwind(AssertUnwindSafe(|| accumulator.contribute(&value)))
        .map_err(|panic| WorkError::Accumulation(panic_message(panic.as_ref())))?;
    Ok((value, partial))
}

/// Consume the accumulator on the caller's thread without letting a panic
/// unwind out of `run`.
fn finish_accumulator<R, A>(
    accumulator: A,
    partials: Vec<A::Partial>,
) -> Result<A::Total, ExecutorError>
where
    A: Accumulator<R>,
{
    catch_unwind(AssertUnwindSafe(move || accumulator.finish(partials)))
        .map_err(|panic| ExecutorError::AccumulatorPanicked(panic_message(panic.as_ref())))
}

/// Coordinator-side bookkeeping for one batch
struct Batch<'s, R, P, S: ?Sized> {
    active: ActiveSet,
    states: HashMap<usize, ItemState>,
    records: Vec<ItemRecord<R>>,
    partials: Vec<P>,
    sink: &'s S,
}

impl<'s, R, P, S: EventSink + ?Sized> Batch<'s, R, P, S> {
    fn new(width: usize, total_items: usize, sink: &'s S) -> Self {
        Self {
            active: ActiveSet::new(width),
            states: HashMap::with_capacity(total_items),
            records: Vec::with_capacity(total_items),
            partials: Vec::with_capacity(total_items),
            sink,
        }
    }

    fn transition(&mut self, index: usize, next: ItemState) -> Result<(), ExecutorError> {
        let state = self.states.entry(index).or_default();
        *state = state.transition(next)?;
        Ok(())
    }

    fn admit(&mut self, index: usize) -> Result<usize, ExecutorError> {
        self.transition(index, ItemState::Running)?;
        let slot = self.active.occupy(index)?;
        self.sink.on_event(&LifecycleEvent::Admitted {
            index,
            slot,
            active: self.active.len(),
        });
        Ok(slot)
    }

    fn complete(&mut self, completion: Completion<R, P>) -> Result<(), ExecutorError> {
        let Completion {
            slot,
            index,
            outcome,
            elapsed,
        } = completion;

        let next = if outcome.is_ok() {
            ItemState::Succeeded
        } else {
            ItemState::Failed
        };
        self.transition(index, next)?;

        let outcome = match outcome {
            Ok((value, partial)) => {
                self.partials.push(partial);
                Ok(value)
            }
            Err(error) => {
                tracing::warn!(index, kind = %error.kind(), %error, "item failed");
                Err(error)
            }
        };
        let record = ItemRecord::from_outcome(index, slot, elapsed.as_nanos() as u64, outcome);

        self.sink.on_event(&LifecycleEvent::Completed {
            index,
            slot,
            status: record.status,
            elapsed,
            active: self.active.len(),
        });
        self.records.push(record);
        Ok(())
    }
}

/// Give every item its sequence index: the pinned one if set, else its
/// submission position. Indices must be unique within a batch.
fn assign_indices<R>(items: Vec<WorkItem<R>>) -> Result<Vec<(usize, WorkItem<R>)>, ExecutorError> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            let index = item.index().unwrap_or(position);
            if seen.insert(index) {
                Ok((index, item))
            } else {
                Err(ExecutorError::DuplicateIndex(index))
            }
        })
        .collect()
}
