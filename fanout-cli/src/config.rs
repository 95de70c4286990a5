//! Configuration loading from fanout.toml
//!
//! Fanout configuration can be specified in a `fanout.toml` file in the project root.
//! The configuration is automatically discovered by walking up from the current directory.
//! Command-line flags override anything set here.

use anyhow::Context;
use fanout_core::Strategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up by [`FanoutConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "fanout.toml";

/// Fanout configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FanoutConfig {
    /// Executor configuration
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Synthetic workload used by the `run` and `strategies` commands
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutorConfig {
    /// Concurrency limit; unset or 0 means hardware concurrency
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Accumulation strategy: "locked", "atomic" or "partitioned"
    #[serde(default)]
    pub strategy: Strategy,
    /// Show a progress bar while the batch runs
    #[serde(default)]
    pub progress: bool,
}

impl ExecutorConfig {
    /// Effective concurrency limit.
    pub fn concurrency_limit(&self) -> usize {
        match self.jobs {
            Some(jobs) if jobs > 0 => jobs,
            _ => num_cpus::get().max(1),
        }
    }
}

/// Synthetic workload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Number of work items
    #[serde(default = "default_items")]
    pub items: usize,
    /// Simulated duration of each item (e.g., "50ms", "2s")
    #[serde(default = "default_work_time")]
    pub work_time: String,
    /// Index of an item that fails with an error
    #[serde(default)]
    pub fail_at: Option<usize>,
    /// Index of an item that panics
    #[serde(default)]
    pub panic_at: Option<usize>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            items: default_items(),
            work_time: default_work_time(),
            fail_at: None,
            panic_at: None,
        }
    }
}

fn default_items() -> usize {
    32
}
fn default_work_time() -> String {
    "50ms".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
    /// Write the report here instead of stdout
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            path: None,
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "fanout=info".to_string()
}

impl FanoutConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("invalid {}", path.display()))?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let dir = std::env::current_dir().context("cannot determine current directory")?;
        Self::discover_from(dir)
    }

    /// Walk up from `start` and load the first `fanout.toml` found.
    ///
    /// A file that exists but fails to parse is an error, not a miss.
    pub fn discover_from(start: impl Into<PathBuf>) -> anyhow::Result<Option<Self>> {
        let mut dir = start.into();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                tracing::debug!(path = %config_path.display(), "loading configuration");
                return Self::load(&config_path).map(Some);
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Fanout Configuration

[executor]
# Concurrency limit (uncomment to enable; 0 or unset = hardware concurrency)
# jobs = 4
# Accumulation strategy: "locked", "atomic" or "partitioned"
strategy = "partitioned"
# Show a progress bar while the batch runs
progress = false

[workload]
# Number of work items
items = 32
# Simulated duration of each item
work_time = "50ms"
# Inject an error at this index (uncomment to enable)
# fail_at = 2
# Inject a panic at this index (uncomment to enable)
# panic_at = 3

[output]
# Default output format: human or json
format = "human"
# Write the report to a file instead of stdout (uncomment to enable)
# path = "target/fanout/report.json"

[logging]
# tracing filter directive (RUST_LOG takes precedence)
filter = "fanout=info"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m")
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Duration must be non-negative: {}", s));
        }

        let multiplier: f64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" | "" => 1e9,
            "m" | "min" => 60e9,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok(Duration::from_nanos((value * multiplier) as u64))
    }

    /// Workload item duration.
    pub fn work_time(&self) -> anyhow::Result<Duration> {
        Self::parse_duration(&self.workload.work_time).context("invalid [workload] work_time")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FanoutConfig::default();
        assert_eq!(config.executor.jobs, None);
        assert_eq!(config.executor.strategy, Strategy::Partitioned);
        assert_eq!(config.workload.items, 32);
        assert_eq!(config.workload.work_time, "50ms");
        assert_eq!(config.logging.filter, "fanout=info");
        assert!(config.executor.concurrency_limit() >= 1);
    }

    #[test]
    fn test_parse_duration() {
        let ms = Duration::from_millis;
        assert_eq!(FanoutConfig::parse_duration("3s").unwrap(), ms(3_000));
        assert_eq!(FanoutConfig::parse_duration("500ms").unwrap(), ms(500));
        assert_eq!(
            FanoutConfig::parse_duration("100us").unwrap(),
            Duration::from_micros(100)
        );
        assert_eq!(
            FanoutConfig::parse_duration("1000ns").unwrap(),
            Duration::from_nanos(1000)
        );
        assert_eq!(FanoutConfig::parse_duration("2m").unwrap(), ms(120_000));
        assert_eq!(FanoutConfig::parse_duration("1.5s").unwrap(), ms(1_500));
        assert_eq!(FanoutConfig::parse_duration("7").unwrap(), ms(7_000));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(FanoutConfig::parse_duration("").is_err());
        assert!(FanoutConfig::parse_duration("fast").is_err());
        assert!(FanoutConfig::parse_duration("10 parsecs").is_err());
        assert!(FanoutConfig::parse_duration("-5ms").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [executor]
            jobs = 4
            strategy = "atomic"

            [workload]
            items = 100
            fail_at = 2
        "#;

        let config: FanoutConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.executor.concurrency_limit(), 4);
        assert_eq!(config.executor.strategy, Strategy::Atomic);
        assert_eq!(config.workload.items, 100);
        assert_eq!(config.workload.fail_at, Some(2));
        // Defaults should still apply
        assert_eq!(config.workload.work_time, "50ms");
        assert_eq!(config.output.format, "human");
    }

    #[test]
    fn test_zero_jobs_means_hardware() {
        let config: FanoutConfig = toml::from_str("[executor]\njobs = 0\n").unwrap();
        assert_eq!(config.executor.concurrency_limit(), num_cpus::get().max(1));
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let result: Result<FanoutConfig, _> = toml::from_str("[executor]\nstrategy = \"magic\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_toml_parses() {
        let default_toml = FanoutConfig::default_toml();
        let config: FanoutConfig = toml::from_str(&default_toml).unwrap();
        assert_eq!(config.workload.work_time, "50ms");
        assert_eq!(config.executor.strategy, Strategy::Partitioned);
        assert!(config.work_time().is_ok());
    }

    #[test]
    fn test_discover_walks_up() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join(CONFIG_FILE_NAME),
            "[workload]\nitems = 7\n",
        )
        .unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = FanoutConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(config.workload.items, 7);
    }

    #[test]
    fn test_discover_reports_invalid_file() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(CONFIG_FILE_NAME), "[workload]\nitems = \"many\"\n")
            .unwrap();
        let error = FanoutConfig::discover_from(root.path()).unwrap_err();
        assert!(format!("{:#}", error).contains("invalid"));
    }
}
