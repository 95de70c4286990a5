//! JSON Output

use crate::report::ExecutionReport;
use serde::Serialize;

/// Generate a prettified JSON report.
pub fn generate_json_report<R, T>(
    report: &ExecutionReport<R, T>,
) -> Result<String, serde_json::Error>
where
    R: Serialize,
    T: Serialize,
{
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ItemRecord, ReportMeta};
    use fanout_core::{Strategy, WorkError};

    #[test]
    fn test_json_shape() {
        let report = ExecutionReport::assemble(
            ReportMeta::now(2, 2, 4, Some(Strategy::Atomic)),
            vec![
                ItemRecord::from_outcome(0, 0, 5, Ok(1u64)),
                ItemRecord::from_outcome(1, 1, 5, Err(WorkError::Cancelled)),
            ],
            1u64,
            2.0,
        );

        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["meta"]["strategy"], "atomic");
        assert_eq!(value["summary"]["succeeded"], 1);
        assert_eq!(value["summary"]["cancelled"], 1);
        assert_eq!(value["outcomes"][0]["status"], "succeeded");
        assert_eq!(value["outcomes"][1]["failure"]["kind"], "cancelled");
        assert_eq!(value["total"], 1);
    }
}
