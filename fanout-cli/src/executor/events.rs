//! Lifecycle Events
//!
//! The executor reports every admission and every completion to an
//! [`EventSink`]. Sinks are called from the coordinating thread only, in the
//! order the transitions happen, so `active` in each event is the exact size
//! of the active set right after the transition.

use fanout_report::ItemStatus;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::time::Duration;

/// Observable transition of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Item moved from pending to running
    Admitted {
        /// Sequence index
        index: usize,
        /// Slot taken
        slot: usize,
        /// Active items after admission
        active: usize,
    },
    /// Item reached a terminal state
    Completed {
        /// Sequence index
        index: usize,
        /// Slot freed
        slot: usize,
        /// Terminal status
        status: ItemStatus,
        /// Time spent on the worker
        elapsed: Duration,
        /// Active items after removal
        active: usize,
    },
}

impl LifecycleEvent {
    /// Sequence index of the item the event is about.
    pub fn index(&self) -> usize {
        match self {
            LifecycleEvent::Admitted { index, .. } | LifecycleEvent::Completed { index, .. } => {
                *index
            }
        }
    }

    /// Active-set size right after the event.
    pub fn active(&self) -> usize {
        match self {
            LifecycleEvent::Admitted { active, .. } | LifecycleEvent::Completed { active, .. } => {
                *active
            }
        }
    }
}

/// Receiver of lifecycle events
pub trait EventSink: Sync {
    /// Called once per transition, on the coordinating thread.
    fn on_event(&self, event: &LifecycleEvent);
}

/// Ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&self, _event: &LifecycleEvent) {}
}

/// Emits events as `tracing` debug records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Admitted {
                index,
                slot,
                active,
            } => {
                tracing::debug!(index, slot, active, "item admitted");
            }
            LifecycleEvent::Completed {
                index,
                slot,
                status,
                elapsed,
                active,
            } => {
                tracing::debug!(
                    index,
                    slot,
                    active,
                    status = ?status,
                    elapsed_ms = elapsed.as_secs_f64() * 1e3,
                    "item completed"
                );
            }
        }
    }
}

/// Terminal progress bar advanced on every completion
pub struct ProgressSink {
    bar: ProgressBar,
}

impl ProgressSink {
    /// Progress bar sized for a batch of `len` items.
    pub fn new(len: usize) -> Self {
        let bar = ProgressBar::new(len as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Hidden bar, for non-interactive runs.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Mark the bar complete.
    pub fn finish(&self) {
        self.bar.finish_with_message("Complete");
    }
}

impl EventSink for ProgressSink {
    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Admitted { active, .. } => {
                self.bar.set_message(format!("{} active", active));
            }
            LifecycleEvent::Completed { status, .. } => {
                if *status == ItemStatus::Failed {
                    self.bar.set_message("failure recorded");
                }
                self.bar.inc(1);
            }
        }
    }
}

/// Keeps every event in memory, for tests and post-run inspection
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far, in emission order.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// Largest active-set size observed.
    pub fn max_active(&self) -> usize {
        self.events
            .lock()
            .iter()
            .map(LifecycleEvent::active)
            .max()
            .unwrap_or(0)
    }
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: &LifecycleEvent) {
        self.events.lock().push(event.clone());
    }
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn on_event(&self, event: &LifecycleEvent) {
        self.0.on_event(event);
        self.1.on_event(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn on_event(&self, event: &LifecycleEvent) {
        (**self).on_event(event);
    }
}
