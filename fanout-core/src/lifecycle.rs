//! Item Lifecycle
//!
//! ```text
//! Pending ──admit──► Running ──ok───► Succeeded
//!                       │
//!                       └──err/panic/cancel──► Failed
//! ```
//!
//! Terminal states are final and no item is admitted twice.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State of a single work item within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    /// Submitted, waiting for a free slot
    #[default]
    Pending,
    /// Occupying a worker slot
    Running,
    /// Computation returned a value
    Succeeded,
    /// Computation failed, panicked or was cancelled
    Failed,
}

/// Attempted transition outside the lifecycle graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal item transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// State the item was in
    pub from: ItemState,
    /// State that was requested
    pub to: ItemState,
}

impl ItemState {
    /// Whether the item has reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Succeeded | ItemState::Failed)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: ItemState) -> bool {
        matches!(
            (self, next),
            (ItemState::Pending, ItemState::Running)
                | (ItemState::Running, ItemState::Succeeded)
                | (ItemState::Running, ItemState::Failed)
        )
    }

    /// Move to `next`, or report the illegal edge.
    pub fn transition(self, next: ItemState) -> Result<ItemState, IllegalTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}
