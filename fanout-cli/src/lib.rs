#![warn(missing_docs)]
//! Fanout CLI Library
//!
//! This crate hosts the bounded executor and the `fanout` command-line driver.
//! Library users normally go through the `fanout` facade crate; the binary
//! calls [`run`].
//!
//! # Example
//!
//! ```ignore
//! use fanout_cli::BoundedExecutor;
//! use fanout_core::{Strategy, StrategyAccumulator, Sum, WorkItem};
//!
//! let items: Vec<WorkItem<u64>> = (0..100).map(|_| WorkItem::from_fn(|| 1)).collect();
//! let report = BoundedExecutor::with_concurrency(4)
//!     .run(items, StrategyAccumulator::new(Strategy::Atomic, Sum))?;
//! assert_eq!(report.total, 100);
//! ```

mod config;
mod demos;
mod executor;

pub use config::*;
pub use demos::{
    CaptureCheck, Canceller, StrategyRun, Workload, capture_batch, compare_strategies,
    format_strategy_table, run_workload,
};
pub use executor::{
    ActiveSet, ActiveSlot, BoundedExecutor, Completion, CompletionCollector, EventSink,
    ExecutionConfig, ExecutorError, LifecycleEvent, NullSink, ProgressSink, RecordingSink,
    TracingSink, completion_channel,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use fanout_core::Strategy;
use fanout_report::{OutputFormat, format_human_output, generate_json_report};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Fanout CLI arguments
#[derive(Parser, Debug)]
#[command(name = "fanout")]
#[command(
    author,
    version,
    about = "Fanout - bounded concurrent execution of long-running work"
)]
pub struct Cli {
    /// Optional subcommand (Run, Strategies, Capture, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Number of work items
    #[arg(long, global = true)]
    pub items: Option<usize>,

    /// Concurrency limit; 0 = hardware concurrency
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// Simulated duration of each item (e.g., "50ms", "2s")
    #[arg(long, global = true)]
    pub work: Option<String>,

    /// Accumulation strategy: locked, atomic, partitioned
    #[arg(long, global = true)]
    pub strategy: Option<Strategy>,

    /// Make the item with this index return an error
    #[arg(long, global = true)]
    pub fail_at: Option<usize>,

    /// Make the item with this index panic
    #[arg(long, global = true)]
    pub panic_at: Option<usize>,

    /// Trip the cancellation token after this long (e.g., "200ms")
    #[arg(long, global = true)]
    pub cancel_after: Option<String>,

    /// Show a progress bar
    #[arg(long, global = true)]
    pub progress: bool,

    /// Output format: human, json
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run a synthetic hit-counting batch (default)
    Run,
    /// Run the same batch under every accumulation strategy
    Strategies,
    /// Check that items built in a loop capture their own counter value
    Capture,
    /// Print a default fanout.toml
    Init,
}

/// Run the Fanout CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` when every item succeeded. Exits the process with code 1
/// when items failed; errors are contract or configuration problems.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Fanout CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.command == Some(Commands::Init) {
        print!("{}", FanoutConfig::default_toml());
        return Ok(());
    }

    // Discover fanout.toml configuration (CLI flags override)
    let config = FanoutConfig::discover()?.unwrap_or_default();

    // Initialize logging; RUST_LOG wins over both flag and file
    let filter = if cli.verbose {
        "fanout=debug".to_string()
    } else {
        config.logging.filter.clone()
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::resolve(&cli, &config)?;

    match cli.command {
        Some(Commands::Strategies) => run_strategies(&settings),
        Some(Commands::Capture) => run_capture(&settings),
        Some(Commands::Run) | Some(Commands::Init) | None => run_batch(&settings),
    }
}

/// Effective settings after layering fanout.toml and CLI flags
#[derive(Debug, Clone)]
struct Settings {
    concurrency_limit: usize,
    strategy: Strategy,
    workload: Workload,
    /// `--items` as given, for commands with their own default
    items_flag: Option<usize>,
    cancel_after: Option<std::time::Duration>,
    progress: bool,
    format: OutputFormat,
    output: Option<PathBuf>,
}

impl Settings {
    fn resolve(cli: &Cli, config: &FanoutConfig) -> anyhow::Result<Self> {
        let concurrency_limit = match cli.jobs {
            Some(0) => num_cpus::get().max(1),
            Some(jobs) => jobs,
            None => config.executor.concurrency_limit(),
        };

        let work_time = match &cli.work {
            Some(work) => FanoutConfig::parse_duration(work).context("invalid --work")?,
            None => config.work_time()?,
        };
        let cancel_after = cli
            .cancel_after
            .as_deref()
            .map(FanoutConfig::parse_duration)
            .transpose()
            .context("invalid --cancel-after")?;

        let format_name = cli.format.as_deref().unwrap_or(&config.output.format);
        let format: OutputFormat = format_name.parse().map_err(anyhow::Error::msg)?;

        Ok(Self {
            concurrency_limit,
            strategy: cli.strategy.unwrap_or(config.executor.strategy),
            workload: Workload {
                items: cli.items.unwrap_or(config.workload.items),
                work_time,
                fail_at: cli.fail_at.or(config.workload.fail_at),
                panic_at: cli.panic_at.or(config.workload.panic_at),
            },
            items_flag: cli.items,
            cancel_after,
            progress: cli.progress || config.executor.progress,
            format,
            output: cli.output.clone().or_else(|| config.output.path.clone()),
        })
    }

    fn executor(&self) -> BoundedExecutor {
        BoundedExecutor::with_concurrency(self.concurrency_limit)
    }
}

fn run_batch(settings: &Settings) -> anyhow::Result<()> {
    let executor = settings.executor();
    let canceller = settings
        .cancel_after
        .map(|after| Canceller::arm(executor.cancellation_token(), after))
        .transpose()
        .context("failed to start cancellation timer")?;

    let progress = if settings.progress {
        ProgressSink::new(settings.workload.items)
    } else {
        ProgressSink::hidden()
    };
    let sink = (TracingSink, &progress);

    let report = run_workload(&executor, &settings.workload, settings.strategy, &sink)?;
    progress.finish();
    if let Some(canceller) = canceller {
        canceller.disarm();
    }

    let output = match settings.format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Human => format_human_output(&report),
    };
    write_output(&output, settings.output.as_deref())?;

    if !report.is_success() {
        eprintln!(
            "\n{} of {} item(s) failed",
            report.failures(),
            report.summary.total_items
        );
        std::process::exit(report.exit_code());
    }
    Ok(())
}

fn run_strategies(settings: &Settings) -> anyhow::Result<()> {
    let executor = settings.executor();
    println!(
        "Comparing strategies: {} items, limit {}, {} per item\n",
        settings.workload.items,
        executor.config().concurrency_limit,
        fanout_report::format_duration(settings.workload.work_time.as_nanos() as f64)
    );

    let runs = compare_strategies(&executor, &settings.workload, &TracingSink)?;
    let table = format_strategy_table(&runs);
    write_output(&table, settings.output.as_deref())?;

    if runs.iter().any(|run| !run.is_consistent()) {
        eprintln!("\nAccumulated totals disagree with success counts");
        std::process::exit(1);
    }
    Ok(())
}

fn run_capture(settings: &Settings) -> anyhow::Result<()> {
    let executor = settings.executor();
    let items = settings.items_flag.unwrap_or(10);
    let check = capture_batch(&executor, items, &TracingSink)?;

    if check.is_ok() {
        println!(
            "{} items, each captured index returned exactly once",
            check.expected
        );
        return Ok(());
    }

    eprintln!("Capture check failed for {} items", check.expected);
    if !check.missing.is_empty() {
        eprintln!("  missing:    {:?}", check.missing);
    }
    if !check.duplicated.is_empty() {
        eprintln!("  duplicated: {:?}", check.duplicated);
    }
    std::process::exit(1);
}

fn write_output(output: &str, path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }
    Ok(())
}
