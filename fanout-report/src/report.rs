//! Report Data Structures

use chrono::{DateTime, Utc};
use fanout_core::{FailureKind, Strategy, WorkError};
use serde::{Deserialize, Serialize};

/// Version of the serialized report layout
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Immutable snapshot of a finished batch.
///
/// `outcomes` holds exactly one record per submitted item, sorted by the
/// item's sequence index. `total` is the accumulator's final value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport<R, T> {
    pub meta: ReportMeta,
    pub summary: ReportSummary,
    pub outcomes: Vec<ItemRecord<R>>,
    pub total: T,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Maximum number of simultaneously active items requested by the caller
    pub concurrency_limit: usize,
    /// Threads actually spawned, `min(concurrency_limit, items)`
    pub worker_threads: usize,
    /// Hardware concurrency of the machine that ran the batch
    pub hardware_threads: usize,
    pub strategy: Option<Strategy>,
}

impl ReportMeta {
    /// Metadata stamped with the current time and this crate's version.
    pub fn now(
        concurrency_limit: usize,
        worker_threads: usize,
        hardware_threads: usize,
        strategy: Option<Strategy>,
    ) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            concurrency_limit,
            worker_threads,
            hardware_threads,
            strategy,
        }
    }
}

/// Terminal status of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Succeeded,
    Failed,
}

/// Failure information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&WorkError> for FailureInfo {
    fn from(error: &WorkError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of a single item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord<R> {
    /// Sequence index assigned at submission
    pub index: usize,
    pub status: ItemStatus,
    /// Computed value, present iff `status == Succeeded`
    pub value: Option<R>,
    pub failure: Option<FailureInfo>,
    /// Wall-clock time spent on the worker
    pub elapsed_ns: u64,
    /// Active-set slot the item occupied
    pub slot: usize,
}

impl<R> ItemRecord<R> {
    /// Build a record from the item's terminal outcome.
    pub fn from_outcome(
        index: usize,
        slot: usize,
        elapsed_ns: u64,
        outcome: Result<R, WorkError>,
    ) -> Self {
        match outcome {
            Ok(value) => Self {
                index,
                status: ItemStatus::Succeeded,
                value: Some(value),
                failure: None,
                elapsed_ns,
                slot,
            },
            Err(error) => Self {
                index,
                status: ItemStatus::Failed,
                value: None,
                failure: Some(FailureInfo::from(&error)),
                elapsed_ns,
                slot,
            },
        }
    }

    /// Whether the item succeeded.
    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Succeeded
    }

    /// Failure kind, if the item failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}

/// Report summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_items: usize,
    pub succeeded: usize,
    /// All failures, including `cancelled` and `panicked`
    pub failed: usize,
    pub cancelled: usize,
    pub panicked: usize,
    pub total_duration_ms: f64,
}

impl ReportSummary {
    /// Tally a set of records.
    pub fn from_records<R>(records: &[ItemRecord<R>], total_duration_ms: f64) -> Self {
        let mut summary = Self {
            total_items: records.len(),
            total_duration_ms,
            ..Default::default()
        };
        for record in records {
            match record.failure_kind() {
                None => summary.succeeded += 1,
                Some(kind) => {
                    summary.failed += 1;
                    match kind {
                        FailureKind::Cancelled => summary.cancelled += 1,
                        FailureKind::Panic => summary.panicked += 1,
                        FailureKind::Computation | FailureKind::Accumulation => {}
                    }
                }
            }
        }
        summary
    }
}

impl<R, T> ExecutionReport<R, T> {
    /// Assemble the final report; records are sorted by index.
    pub fn assemble(
        meta: ReportMeta,
        mut outcomes: Vec<ItemRecord<R>>,
        total: T,
        total_duration_ms: f64,
    ) -> Self {
        outcomes.sort_by_key(|record| record.index);
        let summary = ReportSummary::from_records(&outcomes, total_duration_ms);
        Self {
            meta,
            summary,
            outcomes,
            total,
        }
    }

    /// Number of items that succeeded.
    pub fn successes(&self) -> usize {
        self.summary.succeeded
    }

    /// Number of items that failed for any reason.
    pub fn failures(&self) -> usize {
        self.summary.failed
    }

    /// Whether every item succeeded (vacuously true for an empty batch).
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0
    }

    /// Process exit code for a wrapper binary: 0 if all items succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Record for the item with sequence index `index`.
    pub fn outcome(&self, index: usize) -> Option<&ItemRecord<R>> {
        self.outcomes
            .binary_search_by_key(&index, |record| record.index)
            .ok()
            .map(|position| &self.outcomes[position])
    }

    /// Successful values in index order.
    pub fn values(&self) -> impl Iterator<Item = &R> {
        self.outcomes.iter().filter_map(|record| record.value.as_ref())
    }

    /// Indices of failed items in index order.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|record| !record.is_success())
            .map(|record| record.index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ReportMeta {
        ReportMeta::now(4, 4, 8, Some(Strategy::Partitioned))
    }

    fn records() -> Vec<ItemRecord<u32>> {
        vec![
            ItemRecord::from_outcome(3, 0, 10, Err(WorkError::Cancelled)),
            ItemRecord::from_outcome(0, 1, 10, Ok(7)),
            ItemRecord::from_outcome(2, 2, 10, Err(WorkError::Panicked("boom".into()))),
            ItemRecord::from_outcome(1, 3, 10, Err(WorkError::computation("bad input"))),
            ItemRecord::from_outcome(4, 0, 10, Ok(9)),
        ]
    }

    #[test]
    fn test_assemble_sorts_and_tallies() {
        let report = ExecutionReport::assemble(meta(), records(), 16u32, 1.5);

        let indices: Vec<usize> = report.outcomes.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);

        assert_eq!(report.summary.total_items, 5);
        assert_eq!(report.successes(), 2);
        assert_eq!(report.failures(), 3);
        assert_eq!(report.summary.cancelled, 1);
        assert_eq!(report.summary.panicked, 1);
        assert_eq!(report.failed_indices(), vec![1, 2, 3]);
        assert_eq!(report.values().copied().collect::<Vec<_>>(), vec![7, 9]);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_outcome_lookup() {
        let report = ExecutionReport::assemble(meta(), records(), 0u32, 0.0);
        let record = report.outcome(2).unwrap();
        assert_eq!(record.failure_kind(), Some(FailureKind::Panic));
        assert!(record.failure.as_ref().unwrap().message.contains("boom"));
        assert!(report.outcome(99).is_none());
    }

    #[test]
    fn test_empty_report_is_success() {
        let report: ExecutionReport<u32, u32> =
            ExecutionReport::assemble(meta(), Vec::new(), 0, 0.0);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.summary.total_items, 0);
    }

    #[test]
    fn test_failure_info_from_error() {
        let info = FailureInfo::from(&WorkError::Cancelled);
        assert_eq!(info.kind, FailureKind::Cancelled);
        assert_eq!(info.message, "cancelled");
    }
}
