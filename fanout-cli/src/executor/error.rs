//! Executor Errors
//!
//! Contract violations surfaced to the caller of `run`. Per-item failures are
//! never reported here; they live in the `ExecutionReport`.

use fanout_core::IllegalTransition;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("concurrency limit must be at least 1, got {0}")]
    InvalidConcurrencyLimit(usize),

    #[error("wait_any called on an empty active set")]
    EmptyActiveSet,

    #[error("duplicate item index {0} in batch")]
    DuplicateIndex(usize),

    #[error("active set is full ({capacity} slots)")]
    ActiveSetFull { capacity: usize },

    #[error("completion for vacant slot {0}")]
    VacantSlot(usize),

    #[error("slot {slot} holds item {expected}, completion reported item {got}")]
    SlotMismatch {
        slot: usize,
        expected: usize,
        got: usize,
    },

    #[error("completion channel closed with {active} item(s) still active")]
    WorkerLost { active: usize },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("accumulator panicked while producing the total: {0}")]
    AccumulatorPanicked(String),

    #[error(transparent)]
    Lifecycle(#[from] IllegalTransition),
}
