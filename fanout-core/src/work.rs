//! Work Items
//!
//! A `WorkItem` is one opaque unit of long-running computation. The executor
//! never looks inside it: it only runs the boxed computation on a worker
//! thread and records the terminal outcome.
//!
//! ## Capturing parameters
//!
//! Every constructor takes a `move` closure (or, for `bind`, an explicit
//! parameter value), so whatever the computation needs is copied into the item
//! when it is built. A loop that builds items from its counter therefore
//! produces one item per counter value, never N items observing the final
//! value of a shared variable.
//!
//! ```ignore
//! let items: Vec<WorkItem<usize>> = (0..10)
//!     .map(|i| WorkItem::bind(i, |i, _ctx| Ok(i)))
//!     .collect();
//! ```

use crate::cancel::CancellationToken;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed computation stored inside a [`WorkItem`].
pub type Computation<R> = Box<dyn FnOnce(&WorkContext) -> Result<R, WorkError> + Send + 'static>;

/// Failure of a single work item. Always recorded per item, never fatal to a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WorkError {
    /// The computation returned an error
    #[error("computation failed: {0}")]
    Computation(String),

    /// The computation panicked; the panic was caught on the worker
    #[error("computation panicked: {0}")]
    Panicked(String),

    /// The computation observed the cancellation token
    #[error("cancelled")]
    Cancelled,

    /// The computation succeeded but the accumulator panicked folding its value
    #[error("accumulator panicked: {0}")]
    Accumulation(String),
}

impl WorkError {
    /// Shorthand for [`WorkError::Computation`].
    pub fn computation(message: impl Into<String>) -> Self {
        WorkError::Computation(message.into())
    }

    /// Classify this error for reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            WorkError::Computation(_) => FailureKind::Computation,
            WorkError::Panicked(_) => FailureKind::Panic,
            WorkError::Cancelled => FailureKind::Cancelled,
            WorkError::Accumulation(_) => FailureKind::Accumulation,
        }
    }

    /// Whether this failure is the cancellation subtype.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WorkError::Cancelled)
    }
}

/// Failure classification carried into reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Computation returned an error
    Computation,
    /// Computation panicked (caught)
    Panic,
    /// Computation observed cancellation
    Cancelled,
    /// Accumulator panicked on a successful result
    Accumulation,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Computation => "computation",
            FailureKind::Panic => "panic",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Accumulation => "accumulation",
        };
        f.write_str(name)
    }
}

/// What a running computation can see about itself and its batch.
#[derive(Debug, Clone)]
pub struct WorkContext {
    index: usize,
    cancel: CancellationToken,
}

impl WorkContext {
    /// Create a context for the item with the given sequence index.
    pub fn new(index: usize, cancel: CancellationToken) -> Self {
        Self { index, cancel }
    }

    /// Sequence index of the running item.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the batch has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cooperative cancellation point: `Err(WorkError::Cancelled)` once the
    /// batch is cancelled, so loops can simply `ctx.checkpoint()?`.
    pub fn checkpoint(&self) -> Result<(), WorkError> {
        if self.cancel.is_cancelled() {
            Err(WorkError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One submitted unit of computation with result type `R`.
pub struct WorkItem<R> {
    index: Option<usize>,
    estimate: Option<Duration>,
    computation: Computation<R>,
}

impl<R> WorkItem<R> {
    /// Context-aware computation. Use this when the computation should honour
    /// cancellation or needs its own index.
    pub fn new<F>(computation: F) -> Self
    where
        F: FnOnce(&WorkContext) -> Result<R, WorkError> + Send + 'static,
    {
        Self {
            index: None,
            estimate: None,
            computation: Box::new(computation),
        }
    }

    /// Infallible zero-argument computation.
    pub fn from_fn<F>(computation: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Self::new(move |_| Ok(computation()))
    }

    /// Zero-argument computation whose errors become [`WorkError::Computation`].
    pub fn fallible<F, E>(computation: F) -> Self
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        E: fmt::Display,
    {
        Self::new(move |_| computation().map_err(|e| WorkError::Computation(e.to_string())))
    }

    /// Bind `param` by value into the item at construction time.
    pub fn bind<P, F>(param: P, computation: F) -> Self
    where
        P: Send + 'static,
        F: FnOnce(P, &WorkContext) -> Result<R, WorkError> + Send + 'static,
    {
        Self::new(move |ctx| computation(param, ctx))
    }

    /// Pin an explicit sequence index instead of the submission position.
    ///
    /// Used when resubmitting failed items under their original identity.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Attach an estimated-duration hint. Never used for scheduling.
    pub fn with_estimate(mut self, estimate: Duration) -> Self {
        self.estimate = Some(estimate);
        self
    }

    /// Explicit index, if one was pinned.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Estimated-duration hint, if any.
    pub fn estimate(&self) -> Option<Duration> {
        self.estimate
    }

    /// Run the computation on the current thread, consuming the item.
    ///
    /// Panics are not caught here; the executor wraps this call.
    pub fn run(self, ctx: &WorkContext) -> Result<R, WorkError> {
        (self.computation)(ctx)
    }
}

impl<R> fmt::Debug for WorkItem<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("index", &self.index)
            .field("estimate", &self.estimate)
            .finish_non_exhaustive()
    }
}

/// Extract a readable message from a caught panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(index: usize) -> WorkContext {
        WorkContext::new(index, CancellationToken::new())
    }

    #[test]
    fn test_from_fn_runs() {
        let item = WorkItem::from_fn(|| 21 * 2);
        assert_eq!(item.run(&ctx(0)), Ok(42));
    }

    #[test]
    fn test_fallible_maps_error() {
        let item: WorkItem<u32> = WorkItem::fallible(|| "x".parse::<u32>());
        match item.run(&ctx(0)) {
            Err(WorkError::Computation(msg)) => assert!(msg.contains("invalid digit")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_bind_captures_value_per_item() {
        let items: Vec<WorkItem<usize>> =
            (0..5).map(|i| WorkItem::bind(i, |i, _| Ok(i * 10))).collect();
        let results: Vec<_> = items.into_iter().map(|item| item.run(&ctx(0))).collect();
        assert_eq!(results, vec![Ok(0), Ok(10), Ok(20), Ok(30), Ok(40)]);
    }

    #[test]
    fn test_context_exposes_index() {
        let item = WorkItem::new(|ctx| Ok(ctx.index()));
        assert_eq!(item.run(&ctx(7)), Ok(7));
    }

    #[test]
    fn test_checkpoint_reports_cancellation() {
        let token = CancellationToken::new();
        let context = WorkContext::new(3, token.clone());
        assert!(context.checkpoint().is_ok());

        token.cancel();
        assert_eq!(context.checkpoint(), Err(WorkError::Cancelled));
        assert!(context.is_cancelled());
    }

    #[test]
    fn test_builder_metadata() {
        let item = WorkItem::from_fn(|| ())
            .with_index(9)
            .with_estimate(Duration::from_millis(5));
        assert_eq!(item.index(), Some(9));
        assert_eq!(item.estimate(), Some(Duration::from_millis(5)));
        assert!(format!("{:?}", item).contains("index: Some(9)"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(WorkError::computation("x").kind(), FailureKind::Computation);
        assert_eq!(WorkError::Panicked("x".into()).kind(), FailureKind::Panic);
        assert_eq!(WorkError::Cancelled.kind(), FailureKind::Cancelled);
        assert_eq!(
            WorkError::Accumulation("x".into()).kind(),
            FailureKind::Accumulation
        );
        assert!(WorkError::Cancelled.is_cancellation());
        assert_eq!(FailureKind::Panic.to_string(), "panic");
    }

    #[test]
    fn test_panic_message_downcast() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 1");

        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
