//! CLI binary for running and validating exercise check pipelines.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use runcheck_config::ConfigRegistry;
use runcheck_engine::{search_and_run, validate, PipelineExecutor, RunStatus};
use runcheck_report::StatsCollector;
use runcheck_types::ChapterConfig;

#[derive(Parser)]
#[command(name = "runcheck", version, about = "Pipeline-based checker for exercise implementations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a contents directory and check every matching file
    Run {
        /// Root directory containing the exercise files
        contents_dir: PathBuf,

        /// Directory holding internal.json and the language configs
        config_dir: PathBuf,

        /// Working directory for step execution and build artifacts
        working_dir: PathBuf,

        /// Only check files whose path contains this substring
        #[arg(short, long, default_value = "code/")]
        filter: String,
    },

    /// Validate a single output file against a chapter config
    Validate {
        /// Path to the chapter.json with the expected values
        chapter: PathBuf,

        /// File holding the captured program output
        output_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            contents_dir,
            config_dir,
            working_dir,
            filter,
        } => {
            cmd_run(&contents_dir, &config_dir, &working_dir, &filter, cli.verbose).await?;
        }
        Commands::Validate { chapter, output_file } => {
            init_tracing("info", cli.verbose);
            cmd_validate(&chapter, &output_file)?;
        }
    }

    Ok(())
}

fn init_tracing(level: &str, verbose: bool) {
    let filter = if verbose { "debug" } else { level };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();
}

async fn cmd_run(
    contents_dir: &std::path::Path,
    config_dir: &std::path::Path,
    working_dir: &std::path::Path,
    filter: &str,
    verbose: bool,
) -> anyhow::Result<()> {
    // Read the configured log level first so every message emitted while
    // the language configs load reaches the subscriber.
    let internal = runcheck_config::load_internal(config_dir)?;
    init_tracing(internal.log_level.as_filter(), verbose);
    let registry = ConfigRegistry::load(config_dir)?;

    tracing::info!(
        contents = %contents_dir.display(),
        languages = registry.language_count(),
        filter,
        "starting check run"
    );

    let redirect = registry.internal.redirect_json_to_file.clone();
    let mut executor = PipelineExecutor::new(Arc::new(registry), working_dir)?;

    let collector = StatsCollector::new();
    executor.add_listener(collector.clone());

    collector.start_measuring();
    let status = search_and_run(&executor, contents_dir, filter).await?;
    collector.stop_measuring();

    executor.clean_output()?;
    collector.write(redirect.as_deref())?;

    match status {
        RunStatus::Completed => {
            let stats = collector.snapshot().stats;
            tracing::info!(
                tests = stats.tests,
                passes = stats.passes,
                failures = stats.failures,
                "check run complete"
            );
            Ok(())
        }
        RunStatus::Stopped => {
            tracing::warn!("run stopped at first failing file");
            std::process::exit(1);
        }
        RunStatus::Aborted => {
            tracing::error!("run aborted: a step process could not be started");
            std::process::exit(1);
        }
    }
}

fn cmd_validate(chapter: &std::path::Path, output_file: &std::path::Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(chapter)?;
    let config = ChapterConfig::from_json(&raw)?;
    let actual = std::fs::read_to_string(output_file)?;

    match validate(&config, &actual) {
        None => {
            println!("Output matches expected values");
            Ok(())
        }
        Some(err) => {
            println!("[{}] {}", err.code.as_str(), err.message);
            println!("  expected: {}", err.expected);
            println!("  actual:   {}", err.actual);
            std::process::exit(1);
        }
    }
}
