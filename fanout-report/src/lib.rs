#![warn(missing_docs)]
//! Fanout Report - Batch Outcomes and Output Formats
//!
//! Holds the immutable [`ExecutionReport`] produced once every item of a batch
//! is terminal, and renders it as:
//! - JSON (machine-readable)
//! - Human-readable terminal output

mod human;
mod json;
mod report;

pub use human::{format_duration, format_human_output};
pub use json::generate_json_report;
pub use report::{
    ExecutionReport, FailureInfo, ItemRecord, ItemStatus, REPORT_SCHEMA_VERSION, ReportMeta,
    ReportSummary,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Pretty-printed JSON with full schema
    Json,
    /// Human-readable terminal output
    #[default]
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("TEXT".parse::<OutputFormat>(), Ok(OutputFormat::Human));
        assert!("html".parse::<OutputFormat>().is_err());
    }
}
