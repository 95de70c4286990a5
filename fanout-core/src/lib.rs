#![warn(missing_docs)]
//! Fanout Core - Work Item Runtime
//!
//! This crate provides everything that runs *inside* a worker slot:
//! - `WorkItem` / `WorkContext`: the unit of work and what it sees while running
//! - `CancellationToken`: cooperative, batch-wide cancellation flag
//! - `ItemState`: the per-item `Pending → Running → {Succeeded, Failed}` machine
//! - Accumulators: locked, atomic and partitioned-reduce aggregation of results
//! - `simulate_work`: a sliced, cancellable stand-in for long-running computation

mod accumulate;
mod atomic;
mod cancel;
mod lifecycle;
mod simulate;
mod work;

pub use accumulate::{
    Accumulator, AtomicAccumulator, Combine, Count, Discard, FnCombine, LockedAccumulator,
    PartitionedAccumulator, Strategy, StrategyAccumulator, Sum, combine_with,
};
pub use atomic::AtomicTotal;
pub use cancel::CancellationToken;
pub use lifecycle::{IllegalTransition, ItemState};
pub use simulate::simulate_work;
pub use work::{Computation, FailureKind, WorkContext, WorkError, WorkItem, panic_message};
