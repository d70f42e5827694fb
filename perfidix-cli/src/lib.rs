#![warn(missing_docs)]
//! Perfidix CLI Library
//!
//! Command-line harness for benchmark binaries. Classes register themselves
//! with `#[bench_class]`; calling [`run`] from `main()` gives the binary the
//! full command line: listing, running, report output and progress
//! forwarding.
//!
//! # Example
//!
//! ```ignore
//! use perfidix::prelude::*;
//!
//! #[derive(Default)]
//! struct Parsing;
//!
//! #[bench_class]
//! impl Parsing {
//!     #[bench]
//!     fn small_document(&self) {
//!         parse(SMALL);
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     perfidix_cli::run()
//! }
//! ```

mod config;
mod progress;

pub use config::*;
pub use progress::{ProgressBarListener, ProgressDisplay, SocketProgressListener, styled_bar};

use anyhow::Context;
use clap::{Parser, Subcommand};
use perfidix_core::{
    Arrangement, ClassDef, ClassifyConfig, ConfidenceLevels, Engine, EngineConfig, MeterSpec,
    PlanFilter, classify, registered_classes,
};
use perfidix_ipc::{ProgressReceiver, ReceiverExit};
use perfidix_report::{
    OutputFormat, TableOptions, export_raw_csv, generate_csv_summary, generate_json_report,
    render_table,
};
use rayon::ThreadPoolBuilder;
use std::fmt::Write as _;
use std::io::Write;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Perfidix CLI arguments
#[derive(Parser, Debug)]
#[command(name = "perfidix")]
#[command(author, version, about = "Perfidix - benchmark classes with lifecycle hooks")]
pub struct Cli {
    /// Optional subcommand; defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter benchmarks by regex over `Class::method`
    pub filter: Option<String>,

    /// Only run methods of this class
    #[arg(long)]
    pub class: Option<String>,

    /// Repetitions for benchmarks without an explicit count
    #[arg(long)]
    pub runs: Option<u32>,

    /// Method order: sequential or shuffled
    #[arg(long)]
    pub arrangement: Option<String>,

    /// Shuffle seed for a reproducible order
    #[arg(long)]
    pub seed: Option<u64>,

    /// Meter spec, repeatable: time[:ns|us|ms|s], cycles, mem[:b|kib|mib], threads, ticks:<name>
    #[arg(long = "meter")]
    pub meters: Vec<String>,

    /// Output format: table, json, csv
    #[arg(long)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Digits after the decimal point in tables
    #[arg(long)]
    pub decimals: Option<usize>,

    /// Write raw samples to one CSV file per method and meter
    #[arg(long)]
    pub raw_data: bool,

    /// Directory for raw sample files
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Forward progress events to a receiver at this address
    #[arg(long)]
    pub progress: Option<String>,

    /// Hide the terminal progress bar
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file (discovered from the current directory if not specified)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of threads for statistics computation
    /// 0 = use all available cores (default)
    #[arg(long, short = 'j', default_value = "0")]
    pub threads: usize,

    /// List benchmarks without executing
    #[arg(long)]
    pub list: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: Absorb cargo bench's --bench flag
    #[arg(long, hide = true)]
    pub bench: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all discovered benchmarks
    List,
    /// Run benchmarks (default)
    Run,
    /// Write a documented default perfidix.toml
    InitConfig {
        /// Destination file
        #[arg(default_value = CONFIG_FILE)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Display the progress of a run forwarded with --progress
    Watch {
        /// Address to listen on
        #[arg(default_value = "127.0.0.1:7777")]
        address: String,
        /// Stop after the first finished run
        #[arg(long)]
        once: bool,
    },
}

/// Settings of one run after layering perfidix.toml and CLI flags
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Engine configuration
    pub engine: EngineConfig,
    /// Confidence levels for every report
    pub confidence: ConfidenceLevels,
    /// Report format
    pub format: OutputFormat,
    /// Report destination; stdout when `None`
    pub output: Option<PathBuf>,
    /// Table decimals
    pub decimals: usize,
    /// Raw sample export directory, when enabled
    pub raw_data: Option<PathBuf>,
    /// Progress receiver address
    pub progress: Option<String>,
}

impl RunSettings {
    /// Layer CLI flags over the file configuration
    pub fn resolve(cli: &Cli, config: &PerfidixConfig) -> anyhow::Result<Self> {
        let meters = if cli.meters.is_empty() {
            config.meter_specs()?
        } else {
            cli.meters
                .iter()
                .map(|spec| spec.parse::<MeterSpec>())
                .collect::<Result<Vec<_>, _>>()?
        };

        let arrangement = match &cli.arrangement {
            Some(s) => s.parse::<Arrangement>().map_err(anyhow::Error::msg)?,
            None => config.runner.arrangement,
        };

        let filter = PlanFilter::new(cli.filter.as_deref(), cli.class.as_deref())
            .with_context(|| format!("invalid filter pattern: {:?}", cli.filter))?;

        let format_name = cli.format.as_deref().unwrap_or(&config.output.format);
        let format: OutputFormat = format_name.parse().map_err(anyhow::Error::msg)?;

        let raw_data = (cli.raw_data || config.output.raw_data).then(|| {
            cli.directory
                .clone()
                .unwrap_or_else(|| config.output.directory.clone())
        });

        Ok(Self {
            engine: EngineConfig {
                default_runs: cli.runs.unwrap_or(config.runner.runs),
                arrangement,
                seed: cli.seed.or(config.runner.seed),
                meters,
                filter,
                pin_cpu: config.runner.pin_cpu,
            },
            confidence: config.confidence_levels()?,
            format,
            output: cli.output.clone(),
            decimals: cli.decimals.unwrap_or(config.output.decimals),
            raw_data,
            progress: cli.progress.clone().or_else(|| config.progress.address.clone()),
        })
    }
}

/// Run the Perfidix CLI with the given arguments.
/// This is the main entry point for benchmark binaries.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if the configuration is invalid
/// or a resource (output file, progress receiver) is unavailable. Failures
/// inside benchmarks are reported, never returned.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Perfidix CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let filter = if cli.verbose {
        "perfidix=debug"
    } else {
        "perfidix=info"
    };
    // A host process may have installed its own subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = match &cli.config {
        Some(path) => PerfidixConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PerfidixConfig::discover().unwrap_or_default(),
    };

    match &cli.command {
        Some(Commands::List) => list_benchmarks(&cli, &config),
        Some(Commands::Run) => run_benchmarks(&cli, &config),
        Some(Commands::InitConfig { path, force }) => init_config(path, *force),
        Some(Commands::Watch { address, once }) => watch(address, *once),
        None if cli.list => list_benchmarks(&cli, &config),
        None => run_benchmarks(&cli, &config),
    }
}

fn list_benchmarks(cli: &Cli, config: &PerfidixConfig) -> anyhow::Result<()> {
    let settings = RunSettings::resolve(cli, config)?;
    print!("{}", format_plan(&registered_classes(), &settings.engine));
    Ok(())
}

/// Tree of the classes and methods a run would execute
pub fn format_plan(classes: &[&'static ClassDef], config: &EngineConfig) -> String {
    let classify_config = ClassifyConfig {
        default_runs: config.default_runs,
    };

    let mut out = String::from("Perfidix Plan:\n");
    let mut total = 0;
    for &class in classes {
        if !config.filter.admits_class(class.name) {
            continue;
        }
        let plan = classify(class, &classify_config);
        let methods = config.filter.apply(plan.methods);
        let failures: Vec<_> = plan
            .failures
            .iter()
            .filter(|f| config.filter.matches_id(&f.class, &f.method))
            .collect();
        if methods.is_empty() && failures.is_empty() {
            continue;
        }

        let _ = writeln!(out, "├── class: {} ({})", class.name, class.module_path);
        for method in &methods {
            let _ = writeln!(out, "│   ├── {} ({} runs)", method.id(), method.runs);
        }
        for failure in failures {
            let _ = writeln!(
                out,
                "│   ├── {} (invalid: {})",
                failure.method_id(),
                failure.message
            );
        }
        total += methods.len();
    }
    let _ = writeln!(out, "{total} benchmarks found.");
    out
}

fn run_benchmarks(cli: &Cli, config: &PerfidixConfig) -> anyhow::Result<()> {
    // Configure Rayon thread pool for statistics computation
    if cli.threads > 0 {
        ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .ok();
    }

    let settings = RunSettings::resolve(cli, config)?;

    let classes = registered_classes();
    if classes.is_empty() {
        println!("No benchmarks found.");
        return Ok(());
    }

    let mut engine = Engine::new(settings.engine.clone())?;
    if !cli.quiet {
        engine.add_listener(Box::new(ProgressBarListener::new()));
    }
    if let Some(address) = &settings.progress {
        // Connected before any class runs; a missing receiver aborts the run
        let listener = SocketProgressListener::connect(address.as_str())
            .with_context(|| format!("failed to connect to progress receiver at {address}"))?;
        engine.add_listener(Box::new(listener));
    }

    info!(
        classes = classes.len(),
        arrangement = %settings.engine.arrangement,
        "running benchmarks"
    );
    let result = engine.run(&classes);

    let output = match settings.format {
        OutputFormat::Table => render_table(
            &result,
            &TableOptions {
                decimals: settings.decimals,
                confidence: settings.confidence,
            },
        ),
        OutputFormat::Json => generate_json_report(&result, &settings.confidence)?,
        OutputFormat::Csv => generate_csv_summary(&result, &settings.confidence)?,
    };

    if let Some(path) = &settings.output {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    if let Some(dir) = &settings.raw_data {
        let written = export_raw_csv(&result, dir)
            .with_context(|| format!("failed to export raw data to {}", dir.display()))?;
        info!(files = written.len(), dir = %dir.display(), "raw samples written");
    }

    if !result.failures.is_empty() {
        warn!(failures = result.failures.len(), "benchmark run recorded failures");
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    std::fs::write(path, PerfidixConfig::default_toml())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Configuration written to: {}", path.display());
    Ok(())
}

fn watch(address: &str, once: bool) -> anyhow::Result<()> {
    let listener =
        TcpListener::bind(address).with_context(|| format!("failed to listen on {address}"))?;
    info!(address, "waiting for progress");

    loop {
        let mut receiver = ProgressReceiver::accept(&listener)?;
        let mut display = ProgressDisplay::new(styled_bar());
        match receiver.run(|event| display.apply(event)) {
            ReceiverExit::Finished => {
                println!(
                    "Run finished: {} repetitions, {} errors",
                    display.completed(),
                    display.errors().len()
                );
                if once {
                    return Ok(());
                }
            }
            // The sender may come back with a new run
            ReceiverExit::Disconnected => warn!("progress sender disconnected"),
        }
    }
}
