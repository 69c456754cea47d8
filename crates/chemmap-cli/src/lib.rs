// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! `chemmap` command line: maps SMILES libraries into a shared 2-D chemical
//! space, converts AiZynthFinder logs, and prints shell completions.

mod layout;
pub mod log_convert;
pub mod pipeline;
mod telemetry;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

use chemmap_core::{resolve_chemmap_cache_dir, ExitCode, MachineError};
use chemmap_embed::UmapEngine;
use chemmap_ingest::{
    default_worker_count, MorganEncoder, DEFAULT_CHUNK_SIZE, DEFAULT_STRUCTURE_COLUMN,
};
use chemmap_model::{
    CacheKeyStrategy, EmbeddingParams, ExecutionMode, FingerprintParams, RunDatasets,
    DEFAULT_N_BITS, DEFAULT_RADIUS,
};
use chemmap_render::{PlotRenderer, PlotStyle};
use chemmap_store::LocalFsCache;
use chrono::Local;
use clap::{error::ErrorKind, ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Generator, Shell};
use serde_json::{json, Value};

pub use layout::{run_output_dir, LOG_FILE_NAME};
pub use pipeline::{
    run_pipeline, DatasetOutcome, PipelineError, PipelineReport, PipelineStages, RunConfig,
    RunContext,
};
pub use telemetry::{init_tracing, LogFlags};

pub const CRATE_NAME: &str = "chemmap-cli";

const CHEMMAP_HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
Usage: {usage}

Options:
{options}

Commands:
{subcommands}
{after-help}";

#[derive(Parser)]
#[command(name = "chemmap", version)]
#[command(about = "Chemical space maps of SMILES libraries")]
#[command(help_template = CHEMMAP_HELP_TEMPLATE)]
#[command(
    after_help = "Environment:\n  CHEMMAP_LOG_LEVEL   Log filter override\n  CHEMMAP_CACHE_DIR   Shared cache directory used by --shared-cache"
)]
struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(long, global = true, default_value_t = false)]
    quiet: bool,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fingerprint, embed and plot one or more SMILES libraries.
    Map(MapArgs),
    /// Turn an AiZynthFinder log into a SMILES,solved CSV.
    ConvertLog {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct MapArgs {
    #[arg(long, num_args = 1.., required = true)]
    datasets: Vec<PathBuf>,
    #[arg(long, num_args = 1.., required = true)]
    legends: Vec<String>,
    #[arg(long, num_args = 1.., required = true)]
    colors: Vec<String>,
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    #[arg(long, default_value_t = false, conflicts_with = "cache_dir")]
    shared_cache: bool,
    #[arg(long, alias = "use-threadpool", default_value_t = false)]
    deterministic: bool,
    #[arg(long, default_value_t = 50)]
    n_neighbors: usize,
    #[arg(long, default_value_t = 0.1)]
    min_dist: f64,
    #[arg(long, default_value_t = 1.0)]
    spread: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long)]
    n_epochs: Option<usize>,
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long, default_value = DEFAULT_STRUCTURE_COLUMN)]
    smiles_column: String,
    #[arg(long, default_value_t = DEFAULT_RADIUS)]
    radius: u32,
    #[arg(long, default_value_t = DEFAULT_N_BITS)]
    n_bits: u32,
    #[arg(long, value_enum, default_value_t = CacheKeyCli::DatasetName)]
    cache_key: CacheKeyCli,
    #[arg(long, default_value = ".")]
    output_root: PathBuf,
    #[arg(long, default_value_t = 2000)]
    image_size: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CacheKeyCli {
    DatasetName,
    ContentHash,
}

impl From<CacheKeyCli> for CacheKeyStrategy {
    fn from(value: CacheKeyCli) -> Self {
        match value {
            CacheKeyCli::DatasetName => Self::DatasetName,
            CacheKeyCli::ContentHash => Self::ContentHash,
        }
    }
}

#[derive(Clone, Copy)]
struct OutputMode {
    json: bool,
}

struct CliError {
    exit_code: ExitCode,
    machine: MachineError,
}

impl CliError {
    fn usage(message: &str) -> Self {
        Self {
            exit_code: ExitCode::Usage,
            machine: MachineError::new("usage_error", message),
        }
    }

    fn validation(message: String) -> Self {
        Self {
            exit_code: ExitCode::Validation,
            machine: MachineError::new("validation_error", &message),
        }
    }

    fn internal(message: String) -> Self {
        Self {
            exit_code: ExitCode::Internal,
            machine: MachineError::new("internal_error", &message),
        }
    }

    fn dependency(message: String) -> Self {
        Self {
            exit_code: ExitCode::DependencyFailure,
            machine: MachineError::new("dependency_failure", &message),
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        Self {
            exit_code: err.exit_code(),
            machine: MachineError::new(err.code(), &err.to_string()),
        }
    }
}

pub fn main_entry() -> ProcessExitCode {
    let wants_json = std::env::args().any(|arg| arg == "--json");
    match run() {
        Ok(()) => ProcessExitCode::from(ExitCode::Success as u8),
        Err(err) => {
            emit_error(&err, wants_json);
            ProcessExitCode::from(err.exit_code as u8)
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{err}");
                return Ok(());
            }
            _ => {
                return Err(CliError {
                    exit_code: ExitCode::Usage,
                    machine: MachineError::new("usage_error", "invalid command line arguments")
                        .with_detail("error", &err.to_string()),
                });
            }
        },
    };
    let output_mode = OutputMode { json: cli.json };
    let log_flags = LogFlags {
        quiet: cli.quiet,
        verbose: cli.verbose,
        json_lines: cli.log_json,
    };
    let command = cli
        .command
        .ok_or_else(|| CliError::usage("missing command; see --help"))?;

    match command {
        Commands::Map(args) => run_map(args, log_flags, output_mode),
        Commands::ConvertLog { input, output } => {
            init_tracing(log_flags, None).map_err(CliError::internal)?;
            let summary = log_convert::convert_log_file(&input, &output)
                .map_err(|e| CliError::dependency(e.to_string()))?;
            emit_ok(
                output_mode,
                json!({
                    "command": "convert-log",
                    "status": "ok",
                    "output": output,
                    "parsed": summary.parsed,
                    "empty_smiles": summary.empty_smiles,
                }),
            )
            .map_err(CliError::internal)
        }
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    }
}

fn run_map(args: MapArgs, log_flags: LogFlags, output_mode: OutputMode) -> Result<(), CliError> {
    let datasets = RunDatasets::from_lists(args.datasets, args.legends, args.colors)
        .map_err(|e| CliError::validation(e.to_string()))?;
    let output_dir = run_output_dir(&args.output_root, Local::now().naive_local());
    let cache_dir = match args.cache_dir {
        Some(dir) => dir,
        None if args.shared_cache => resolve_chemmap_cache_dir(),
        None => output_dir.clone(),
    };

    let mut config = RunConfig::new(datasets, output_dir.clone());
    config.cache_dir = cache_dir;
    config.fingerprint = FingerprintParams {
        radius: args.radius,
        n_bits: args.n_bits,
    };
    config.embedding = EmbeddingParams {
        n_neighbors: args.n_neighbors,
        min_dist: args.min_dist,
        spread: args.spread,
        seed: args.seed,
        n_epochs: args.n_epochs,
        ..EmbeddingParams::default()
    };
    config.mode = if args.deterministic {
        ExecutionMode::Deterministic
    } else {
        ExecutionMode::Parallel
    };
    config.workers = args.workers.unwrap_or_else(default_worker_count);
    config.chunk_size = args.chunk_size;
    config.smiles_column = args.smiles_column;
    config.cache_keys = args.cache_key.into();
    config
        .validate()
        .map_err(|e| CliError::validation(e.to_string()))?;
    let renderer = PlotRenderer::new(PlotStyle::for_size(args.image_size))
        .map_err(|e| CliError::validation(e.to_string()))?;

    fs::create_dir_all(&output_dir).map_err(|e| {
        CliError::dependency(format!(
            "cannot create output directory {}: {e}",
            output_dir.display()
        ))
    })?;
    init_tracing(log_flags, Some(&output_dir.join(LOG_FILE_NAME))).map_err(CliError::internal)?;

    let ctx = RunContext::new(config)?;
    let cfg = ctx.config();
    let encoder =
        MorganEncoder::new(cfg.fingerprint).map_err(|e| CliError::validation(e.to_string()))?;
    let engine = UmapEngine::new(cfg.embedding, cfg.mode, cfg.workers).map_err(PipelineError::from)?;
    let cache = LocalFsCache::new(cfg.cache_dir.clone());
    let report = run_pipeline(
        &ctx,
        &PipelineStages {
            encoder: &encoder,
            cache: &cache,
            engine: &engine,
            renderer: &renderer,
        },
    )?;

    emit_ok(
        output_mode,
        json!({
            "command": "map",
            "status": "ok",
            "output_dir": output_dir,
            "cache_dir": cfg.cache_dir,
            "report": report,
        }),
    )
    .map_err(CliError::internal)
}

fn emit_ok(output_mode: OutputMode, payload: Value) -> Result<(), String> {
    if output_mode.json {
        println!(
            "{}",
            serde_json::to_string(&payload).map_err(|e| e.to_string())?
        );
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).map_err(|e| e.to_string())?
        );
    }
    Ok(())
}

fn emit_error(error: &CliError, machine_json: bool) {
    if machine_json {
        match serde_json::to_string(&error.machine) {
            Ok(payload) => eprintln!("{payload}"),
            Err(_) => eprintln!(
                "{{\"code\":\"internal_error\",\"message\":\"failed to encode structured error\",\"details\":{{}}}}"
            ),
        }
    } else {
        eprintln!("{}", error.machine.message);
    }
}

fn print_completion<G: Generator>(generator: G) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    generate(generator, &mut command, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn map_arguments_parse_with_defaults() {
        let cli = Cli::try_parse_from([
            "chemmap",
            "map",
            "--datasets",
            "a.csv",
            "b.csv",
            "--legends",
            "A",
            "B",
            "--colors",
            "red",
            "blue",
            "--use-threadpool",
        ])
        .expect("parse");
        let Some(Commands::Map(args)) = cli.command else {
            panic!("expected map command");
        };
        assert_eq!(args.datasets.len(), 2);
        assert!(args.deterministic);
        assert_eq!(args.n_neighbors, 50);
        assert_eq!(args.min_dist, 0.1);
        assert_eq!(args.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(matches!(args.cache_key, CacheKeyCli::DatasetName));
    }

    #[test]
    fn cache_dir_and_shared_cache_conflict() {
        let parsed = Cli::try_parse_from([
            "chemmap",
            "map",
            "--datasets",
            "a.csv",
            "--legends",
            "A",
            "--colors",
            "red",
            "--cache-dir",
            "c",
            "--shared-cache",
        ]);
        assert!(parsed.is_err());
    }
}
