//! CLI command definitions for rawforge.
//!
//! `run` drives the whole recipe pipeline; `validate`, `check-design` and
//! `summary` are the standalone checks and reports around it.

use crate::export::{collect_artifacts, write_summary};
use crate::pipeline::{parse_timing, split_list, RecipeRunner, RunConfig, RunSummary};
use crate::recipe::{ExpandableKey, RecipeLoader};
use crate::scheduler::FailurePolicy;
use crate::simulation::{JsonArtifactStore, ProcessSimulator, SimulationContext};
use crate::validation::{AllowList, DesignChecker, DesignModel, RecipeValidator};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default summary table path.
const DEFAULT_SUMMARY_FILE: &str = "summary.tsv";

/// Default directory scanned by `summary`.
const DEFAULT_SUMMARY_DIR: &str = "output";

/// Raw-frame generator driving an instrument simulation engine from recipes.
#[derive(Parser)]
#[command(name = "rawforge")]
#[command(about = "Generate simulated raw frames and calibrations from observation recipes")]
#[command(version)]
#[command(
    long_about = "rawforge expands observation recipes into time-stamped simulation jobs, runs the simulation engine for each, infers the matching darks and flats, and fixes the headers of the produced artifacts.\n\nExample usage:\n  rawforge run -i YAML/recipes.yaml -o output --calib 1 --sequence 1 -n 4"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Expand, simulate and calibrate a recipe file.
    Run(RunArgs),

    /// Validate a recipe file without running anything.
    Validate(ValidateArgs),

    /// Compare recipes against the data-reduction design model.
    #[command(name = "check-design")]
    CheckDesign(CheckDesignArgs),

    /// Write a tab-separated summary of produced artifacts.
    Summary(SummaryArgs),
}

/// Arguments for `rawforge run`. Unset options fall back to `RAWFORGE_*`
/// environment variables, then to defaults.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Recipe file.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory receiving the artifacts.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Simulate reduced-size detectors.
    #[arg(short, long)]
    pub small: bool,

    /// Comma-separated recipe names to run, in order.
    #[arg(short = 'c', long)]
    pub catg: Option<String>,

    /// Exposures per inferred calibration (0 disables calibrations).
    #[arg(long)]
    pub calib: Option<u32>,

    /// `1` to start from the first timestamp in the file, or a start time
    /// (`YYYY-MM-DD HH:MM:SS`). Without it every template uses its own time.
    #[arg(long)]
    pub sequence: Option<String>,

    /// Prepare every simulation but run none.
    #[arg(long)]
    pub dry_run: bool,

    /// Write the inferred calibration recipes to this file.
    #[arg(short = 'f', long)]
    pub calib_file: Option<PathBuf>,

    /// Simulations in flight.
    #[arg(short = 'n', long)]
    pub workers: Option<usize>,

    /// Keep running after a simulation fails; fail at the end.
    #[arg(long)]
    pub keep_going: bool,

    /// Property keys whose lists expand into separate jobs (dit, dateobs).
    #[arg(long, value_delimiter = ',')]
    pub expand: Vec<String>,

    /// Simulation engine executable.
    #[arg(long)]
    pub engine: Option<String>,

    /// Extra argument for the engine (repeatable).
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Local instrument package directory.
    #[arg(long)]
    pub packages: Option<PathBuf>,

    /// Per-simulation time limit in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output the run summary as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `rawforge validate`.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Recipe file.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Comma-separated recipe names to validate.
    #[arg(short = 'c', long)]
    pub catg: Option<String>,

    /// Output the report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `rawforge check-design`.
#[derive(Parser, Debug)]
pub struct CheckDesignArgs {
    /// Recipe file.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Design model YAML (`dataitems:` mapping).
    #[arg(long)]
    pub design: PathBuf,

    /// Additional do-categories known to be missing from the design model.
    #[arg(long, value_delimiter = ',')]
    pub allow_missing: Vec<String>,
}

/// Arguments for `rawforge summary`.
#[derive(Parser, Debug)]
pub struct SummaryArgs {
    /// Comma-separated directories to scan for `METIS*.fits`.
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_SUMMARY_DIR)]
    pub in_dir: Vec<PathBuf>,

    /// Output table.
    #[arg(long, default_value = DEFAULT_SUMMARY_FILE)]
    pub out_file: PathBuf,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// This is a convenience function that parses CLI args and runs the command.
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => {
            run_recipes_command(args).await?;
        }
        Commands::Validate(args) => {
            run_validate_command(args)?;
        }
        Commands::CheckDesign(args) => {
            run_check_design_command(args)?;
        }
        Commands::Summary(args) => {
            run_summary_command(args).await?;
        }
    }
    Ok(())
}

// ============================================================================
// Run Command Implementation
// ============================================================================

/// Layers command-line options over the environment configuration.
fn build_run_config(args: &RunArgs) -> anyhow::Result<RunConfig> {
    let mut config = RunConfig::from_env()?;

    if let Some(input) = &args.input {
        config.input = input.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.small {
        config.small = true;
    }
    if let Some(catg) = &args.catg {
        config.categories = Some(split_list(catg));
    }
    if let Some(calib) = args.calib {
        config.calibration_count = calib;
    }
    if let Some(sequence) = &args.sequence {
        config.timing = parse_timing(sequence, "--sequence")?;
    }
    if args.dry_run {
        config.dry_run = true;
    }
    if let Some(path) = &args.calib_file {
        config.calib_dump = Some(path.clone());
    }
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    if args.keep_going {
        config.failure_policy = FailurePolicy::Continue;
    }
    if !args.expand.is_empty() {
        config.expandable_keys = args
            .expand
            .iter()
            .map(|key| key.parse::<ExpandableKey>().map_err(anyhow::Error::msg))
            .collect::<anyhow::Result<_>>()?;
    }
    if let Some(engine) = &args.engine {
        config.engine_program = engine.clone();
    }
    if !args.engine_args.is_empty() {
        config.engine_args = args.engine_args.clone();
    }
    if let Some(packages) = &args.packages {
        config.packages = Some(packages.clone());
    }
    if let Some(secs) = args.timeout {
        config.engine_timeout = Some(Duration::from_secs(secs));
    }

    config.validate()?;
    Ok(config)
}

#[derive(Debug, Clone, Serialize)]
struct RunOutput {
    status: String,
    dry_run: bool,
    jobs: usize,
    calibrations: Vec<String>,
    reconciled: usize,
    files: Vec<String>,
}

impl From<&RunSummary> for RunOutput {
    fn from(summary: &RunSummary) -> Self {
        Self {
            status: "ok".to_string(),
            dry_run: summary.science.dry_run,
            jobs: summary.job_count(),
            calibrations: summary.calibrations.names().map(str::to_string).collect(),
            reconciled: summary.reconciled,
            files: summary.files.clone(),
        }
    }
}

async fn run_recipes_command(args: RunArgs) -> anyhow::Result<()> {
    let config = build_run_config(&args)?;

    let mut context = SimulationContext::new()
        .with_engine(config.engine_program.clone(), config.engine_args.clone());
    if let Some(packages) = &config.packages {
        context = context.with_packages(packages.clone());
    }
    let context = Arc::new(context);

    let mut simulator = ProcessSimulator::new(Arc::clone(&context));
    if let Some(timeout) = config.engine_timeout {
        simulator = simulator.with_timeout(timeout);
    }

    info!(
        engine = %config.engine_program,
        workers = config.worker_count,
        "Recipe run configured"
    );
    let runner = RecipeRunner::new(
        config,
        context,
        Arc::new(simulator),
        Arc::new(JsonArtifactStore),
    );
    let summary = runner.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&RunOutput::from(&summary))?);
    } else {
        for file in &summary.files {
            println!("{file}");
        }
    }
    Ok(())
}

// ============================================================================
// Validate / Check-Design / Summary Commands
// ============================================================================

fn run_validate_command(args: ValidateArgs) -> anyhow::Result<()> {
    let categories = args.catg.as_deref().map(split_list);
    let raw = RecipeLoader::load_file(&args.input)?.select(categories.as_deref())?;
    let report = RecipeValidator::validate(&raw);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.log();
    }

    if !report.is_valid() {
        anyhow::bail!(
            "Recipe validation failed with {} problem(s)",
            report.problems.len()
        );
    }
    Ok(())
}

fn run_check_design_command(args: CheckDesignArgs) -> anyhow::Result<()> {
    let raw = RecipeLoader::load_file(&args.input)?;
    let report = RecipeValidator::validate(&raw);
    if !report.is_valid() {
        report.log();
        anyhow::bail!(
            "Recipe validation failed with {} problem(s)",
            report.problems.len()
        );
    }
    let recipes = raw.into_recipe_set()?;

    let model = DesignModel::load_file(&args.design)?;
    let allow = AllowList::default().with_missing(args.allow_missing);
    let problems = DesignChecker::new(model, allow).check(&recipes);

    for problem in &problems {
        println!("{problem}");
    }
    if !problems.is_empty() {
        anyhow::bail!("Found {} design problem(s), see output above", problems.len());
    }
    info!(recipes = recipes.len(), "Recipes consistent with design model");
    Ok(())
}

async fn run_summary_command(args: SummaryArgs) -> anyhow::Result<()> {
    let files = collect_artifacts(&args.in_dir);
    let rows = write_summary(&JsonArtifactStore, &files, &args.out_file).await?;
    info!(rows, out_file = %args.out_file.display(), "Summary complete");
    Ok(())
}
