//! Human Output
//!
//! Terminal-friendly rendering of an [`ExecutionReport`]:
//! - One line per item with a status icon (✓/✗/💥/⊘)
//! - Summary block with counts, wall-clock time and the accumulated total

use crate::report::{ExecutionReport, ItemRecord};
use fanout_core::FailureKind;
use std::fmt::Debug;

/// Format nanoseconds with an appropriate unit.
pub fn format_duration(ns: f64) -> String {
    if ns < 1_000.0 {
        format!("{:.0} ns", ns)
    } else if ns < 1_000_000.0 {
        format!("{:.2} µs", ns / 1_000.0)
    } else if ns < 1_000_000_000.0 {
        format!("{:.2} ms", ns / 1_000_000.0)
    } else {
        format!("{:.2} s", ns / 1_000_000_000.0)
    }
}

fn status_icon<R>(record: &ItemRecord<R>) -> &'static str {
    match record.failure_kind() {
        None => "✓",
        Some(FailureKind::Computation) => "✗",
        Some(FailureKind::Panic) => "💥",
        Some(FailureKind::Cancelled) => "⊘",
        Some(FailureKind::Accumulation) => "Σ",
    }
}

/// Format a report for human-readable terminal display
pub fn format_human_output<R, T>(report: &ExecutionReport<R, T>) -> String
where
    R: Debug,
    T: Debug,
{
    let mut output = String::new();

    output.push('\n');
    output.push_str("Fanout Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    let strategy = report
        .meta
        .strategy
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());
    output.push_str(&format!(
        "limit: {}  workers: {}  hardware threads: {}  strategy: {}\n\n",
        report.meta.concurrency_limit,
        report.meta.worker_threads,
        report.meta.hardware_threads,
        strategy
    ));

    for record in &report.outcomes {
        output.push_str(&format!(
            "  {} #{:<4} slot {:<3} {:>12}",
            status_icon(record),
            record.index,
            record.slot,
            format_duration(record.elapsed_ns as f64)
        ));
        if let Some(value) = &record.value {
            output.push_str(&format!("  -> {:?}", value));
        }
        if let Some(failure) = &record.failure {
            output.push_str(&format!("  [{}] {}", failure.kind, failure.message));
        }
        output.push('\n');
    }

    let summary = &report.summary;
    output.push('\n');
    output.push_str("Summary\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "  Items: {}  Succeeded: {}  Failed: {} (cancelled: {}, panicked: {})\n",
        summary.total_items, summary.succeeded, summary.failed, summary.cancelled, summary.panicked
    ));
    output.push_str(&format!(
        "  Total: {:?}  Wall time: {}\n",
        report.total,
        format_duration(summary.total_duration_ms * 1_000_000.0)
    ));

    output
}
