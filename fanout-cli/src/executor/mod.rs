//! Bounded Executor
//!
//! Runs a closed batch of work items on a dedicated worker pool, never more
//! than `concurrency_limit` at a time, and folds every outcome into an
//! `ExecutionReport`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Vec<WorkItem<R>> (submitted by the caller)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Assign indices, admit up to K, backfill on completion
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   active    │  Slot-indexed set of running items
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  collector  │  Wait for any completion, free its slot
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   events    │  Admitted / Completed notifications
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - `BoundedExecutor` and the admit/backfill loop
//! - [`active`] - Active set bookkeeping
//! - [`collector`] - "Wait for any" completion collection
//! - [`events`] - Lifecycle event sinks (tracing, progress bar, recording)
//! - [`error`] - Contract violations

mod active;
mod collector;
mod error;
mod events;
mod execution;

// Re-export public API
pub use active::{ActiveSet, ActiveSlot};
pub use collector::{Completion, CompletionCollector, completion_channel};
pub use error::ExecutorError;
pub use events::{
    EventSink, LifecycleEvent, NullSink, ProgressSink, RecordingSink, TracingSink,
};
pub use execution::{BoundedExecutor, ExecutionConfig};
