//! Simulated long-running work
//!
//! Stand-in for a compute-bound job: sleeps for `duration` in short slices,
//! checking the cancellation token between slices. Deterministic enough for
//! tests and interruptible within one slice.

use crate::work::{WorkContext, WorkError};
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep between cancellation checks
const SLICE: Duration = Duration::from_millis(2);

/// Occupy the current worker for `duration`, or until the batch is cancelled.
pub fn simulate_work(ctx: &WorkContext, duration: Duration) -> Result<(), WorkError> {
    let deadline = Instant::now() + duration;
    loop {
        ctx.checkpoint()?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        std::thread::sleep(remaining.min(SLICE));
    }
}
