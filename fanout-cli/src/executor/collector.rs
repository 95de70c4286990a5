//! Completion Collector
//!
//! "Wait for any, then remove": workers push a [`Completion`] onto a channel
//! as soon as their item is terminal; the collector blocks on that channel,
//! frees the reporting slot in the [`ActiveSet`] and hands the outcome back,
//! attributed to the item's original index. Completions arrive in whatever
//! order the items finish.

use super::active::ActiveSet;
use super::error::ExecutorError;
use crossbeam_channel::{Receiver, Sender};
use fanout_core::WorkError;
use std::time::Duration;

/// Terminal outcome of one item as reported by its worker
#[derive(Debug)]
pub struct Completion<R, P> {
    /// Slot the item occupied
    pub slot: usize,
    /// Sequence index of the item
    pub index: usize,
    /// Value and accumulator partial on success
    pub outcome: Result<(R, P), WorkError>,
    /// Time spent on the worker
    pub elapsed: Duration,
}

/// Create the channel workers report on and the collector that drains it.
pub fn completion_channel<R, P>() -> (Sender<Completion<R, P>>, CompletionCollector<R, P>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (sender, CompletionCollector::new(receiver))
}

/// Receiving side of the completion channel
pub struct CompletionCollector<R, P> {
    receiver: Receiver<Completion<R, P>>,
}

impl<R, P> CompletionCollector<R, P> {
    /// Wrap a completion receiver.
    pub fn new(receiver: Receiver<Completion<R, P>>) -> Self {
        Self { receiver }
    }

    /// Block until any active item finishes, remove it from `active` and
    /// return its completion.
    ///
    /// Fails immediately instead of blocking when `active` is empty.
    pub fn wait_any(&self, active: &mut ActiveSet) -> Result<Completion<R, P>, ExecutorError> {
        if active.is_empty() {
            return Err(ExecutorError::EmptyActiveSet);
        }

        let completion = self
            .receiver
            .recv()
            .map_err(|_| ExecutorError::WorkerLost {
                active: active.len(),
            })?;

        let freed = active.release(completion.slot)?;
        if freed.index != completion.index {
            return Err(ExecutorError::SlotMismatch {
                slot: completion.slot,
                expected: freed.index,
                got: completion.index,
            });
        }

        Ok(completion)
    }
}
