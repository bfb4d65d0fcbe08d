//! parloop Command Line Interface
//!
//! Usage:
//!   parloop transform [OPTIONS] <FILE>
//!   parloop measure [OPTIONS] <FILE>
//!   parloop compare [OPTIONS] --parallel <FILE> --serial <FILE> --fixtures <DIR>
//!
//! Examples:
//!   parloop transform kernel.cpp                  # Annotate and tile every loop
//!   parloop transform --json -p 16 kernel.cpp     # JSON report for 16 processors
//!   parloop measure --inputs "Inputs/1 D Array" --runs 3 prog.cpp
//!   parloop compare --parallel p.cpp --serial s.cpp --fixtures Inputs

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};
use parloop::autotuning::{SearchType, TuningConfig};
use parloop::harness::{to_csv, Harness, HarnessConfig};
use parloop::pipeline::{Pipeline, PipelineConfig, TransformRequest};
use parloop::utils::format::FormatterConfig;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// parloop - heuristic OpenMP parallelizer and loop tiler
#[derive(Parser, Debug)]
#[command(name = "parloop")]
#[command(version)]
#[command(about = "Heuristic OpenMP parallelizer, loop tiler and tile-size autotuner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze, annotate and tile the loops of a source file
    Transform(TransformArgs),
    /// Compile a program and profile it over fixture inputs
    Measure(MeasureArgs),
    /// Profile a parallel program against its serial original
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct TransformArgs {
    /// Source file containing loops
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Processors available to the parallel program (defaults to this machine's)
    #[arg(short, long)]
    processors: Option<usize>,

    /// Processor description, recorded in the report
    #[arg(long)]
    core_type: Option<String>,

    /// Memory size description, recorded in the report
    #[arg(long)]
    ram_size: Option<String>,

    /// Audit file for the JSON report
    #[arg(long, default_value = parloop::pipeline::DEFAULT_AUDIT_FILE)]
    audit: PathBuf,

    /// Do not write the audit file
    #[arg(long)]
    no_audit: bool,

    /// Do not run clang-format
    #[arg(long)]
    no_format: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args, Debug)]
struct TuningArgs {
    /// Compiler for tile-size benchmarks
    #[arg(long, default_value = "g++")]
    compiler: String,

    /// Smallest tile size to try
    #[arg(long, default_value = "8")]
    min_tile: usize,

    /// Largest tile size to try
    #[arg(long, default_value = "1024")]
    max_tile: usize,

    /// Tile-size search strategy
    #[arg(long, default_value = "exhaustive")]
    search: SearchArg,

    /// Seconds allowed per benchmark compile or run
    #[arg(long, default_value = "10")]
    timeout: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SearchArg {
    /// Measure every candidate
    Exhaustive,
    /// Bisect over the candidates
    Bisection,
}

impl From<SearchArg> for SearchType {
    fn from(arg: SearchArg) -> Self {
        match arg {
            SearchArg::Exhaustive => SearchType::Exhaustive,
            SearchArg::Bisection => SearchType::Bisection,
        }
    }
}

#[derive(Args, Debug)]
struct HarnessArgs {
    /// Compiler for the measured program
    #[arg(long, default_value = "g++")]
    compiler: String,

    /// Runs per fixture file
    #[arg(long, default_value = "1")]
    runs: usize,

    /// Directory receiving the result CSV files
    #[arg(long, default_value = "Results")]
    results_dir: PathBuf,

    /// Seconds allowed per profiled run
    #[arg(long, default_value = "300")]
    run_timeout: u64,
}

#[derive(Args, Debug)]
struct MeasureArgs {
    /// Complete C++ program
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Link the OpenMP runtime
    #[arg(long)]
    parallel: bool,

    /// Directory of `.txt` inputs
    #[arg(long, value_name = "DIR")]
    inputs: Option<PathBuf>,

    #[command(flatten)]
    harness: HarnessArgs,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Parallel program
    #[arg(long, value_name = "FILE")]
    parallel: PathBuf,

    /// Serial program
    #[arg(long, value_name = "FILE")]
    serial: PathBuf,

    /// Root holding the per-shape fixture directories
    #[arg(long, value_name = "DIR")]
    fixtures: PathBuf,

    /// Tile size defined for the parallel program
    #[arg(long, default_value = "32")]
    tile_size: usize,

    /// Do not run clang-format
    #[arg(long)]
    no_format: bool,

    #[command(flatten)]
    harness: HarnessArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("parloop v{}", parloop::VERSION);

    match cli.command {
        Command::Transform(args) => run_transform(args),
        Command::Measure(args) => run_measure(args),
        Command::Compare(args) => run_compare(args),
    }
}

fn run_transform(args: TransformArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read input file: {:?}", args.input))?;

    let processors = args.processors.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    let config = build_pipeline_config(&args);
    debug!("Pipeline config: {:?}", config);

    let request = TransformRequest::new(source, processors).hints(args.core_type, args.ram_size);
    let report = Pipeline::new(config).transform(&request);

    let output = if args.json {
        report.to_json().context("Failed to serialize report")?
    } else {
        report.render_text()
    };
    write_output(&args.output, &output)
}

fn build_pipeline_config(args: &TransformArgs) -> PipelineConfig {
    let tuning = TuningConfig::new()
        .compiler(&args.tuning.compiler)
        .tile_range(args.tuning.min_tile, args.tuning.max_tile)
        .search(args.tuning.search.into())
        .timeout(Duration::from_secs(args.tuning.timeout));
    let formatter = if args.no_format {
        FormatterConfig::disabled()
    } else {
        FormatterConfig::default()
    };
    let audit = (!args.no_audit).then(|| args.audit.clone());

    PipelineConfig::default()
        .tuning(tuning)
        .formatter(formatter)
        .audit_path(audit)
}

fn build_harness_config(args: &HarnessArgs) -> HarnessConfig {
    HarnessConfig::new()
        .compiler(&args.compiler)
        .results_dir(&args.results_dir)
        .run_timeout(Duration::from_secs(args.run_timeout))
}

fn run_measure(args: MeasureArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read input file: {:?}", args.input))?;
    let harness = Harness::new(build_harness_config(&args.harness));
    let records = harness
        .measure(&source, args.parallel, args.inputs.as_deref(), args.harness.runs)
        .with_context(|| format!("Failed to measure {:?}", args.input))?;
    print!("{}", to_csv(&records));
    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let parallel = fs::read_to_string(&args.parallel)
        .with_context(|| format!("Failed to read input file: {:?}", args.parallel))?;
    let serial = fs::read_to_string(&args.serial)
        .with_context(|| format!("Failed to read input file: {:?}", args.serial))?;

    let formatter = if args.no_format {
        FormatterConfig::disabled()
    } else {
        FormatterConfig::default()
    };
    let harness = Harness::new(build_harness_config(&args.harness)).with_formatter(formatter);
    let comparison = harness
        .compare(&parallel, &serial, &args.fixtures, args.harness.runs, args.tile_size)
        .context("Comparison failed")?;

    println!("== parallel ==");
    print!("{}", to_csv(&comparison.parallel));
    println!("== serial ==");
    print!("{}", to_csv(&comparison.serial));
    Ok(())
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)
                .with_context(|| format!("Failed to write output file: {:?}", p))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
