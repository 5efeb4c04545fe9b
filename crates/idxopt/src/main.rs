mod config;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use index_optimizer::{summarize, translate, FileLogSource, LogEntry, LogSource, Optimizer};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::OptimizerConfig;

#[derive(Parser)]
#[command(name = "idxopt")]
#[command(about = "Builds a createIndex script from MongoDB profiler logs.")]
struct Cli {
    /// Print debug diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the createIndex statements serving the logged queries
    Optimize {
        path: PathBuf,
        /// TOML file with `index_options` and `slow_ms`
        #[arg(long, env = "IDXOPT_CONFIG")]
        config: Option<PathBuf>,
        /// JSON object rendered as the options of every index
        #[arg(long)]
        index_options: Option<String>,
        /// Ignore entries that ran faster than this many milliseconds
        #[arg(long)]
        slow_ms: Option<u64>,
    },
    /// Print count, average and max query time of a profiler log
    Stats { path: PathBuf },
    /// Print the index a single profiler entry translates to
    Translate { entry: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Optimize {
            path,
            config,
            index_options,
            slow_ms,
        } => {
            let mut settings = match config {
                Some(config) => OptimizerConfig::load(&config)
                    .with_context(|| format!("failed to load config {}", config.display()))?,
                None => OptimizerConfig::default(),
            };
            if let Some(raw) = index_options {
                settings.index_options = serde_json::from_str::<Map<String, Value>>(&raw)
                    .context("--index-options must be a JSON object")?;
            }
            if let Some(slow_ms) = slow_ms {
                settings.slow_ms = slow_ms;
            }

            let entries = read_log(&path)?;
            info!(entries = entries.len(), path = %path.display(), "optimizing profiler log");

            let mut optimizer = Optimizer::new()
                .with_index_options(settings.index_options)
                .with_slow_ms(settings.slow_ms);
            optimizer.process_all(&entries)?;

            let summary = optimizer.summary();
            info!(
                entries = summary.entries,
                skipped = summary.skipped,
                created = summary.created,
                "done"
            );
            print!("{}", optimizer.script());
        }
        Command::Stats { path } => {
            let entries = read_log(&path)?;
            println!("{}", summarize(&entries));
        }
        Command::Translate { entry } => {
            let value: Value = serde_json::from_str(&entry).context("entry is not valid JSON")?;
            let entry = LogEntry::from_value(value).context("entry is not a profiler document")?;
            match translate(&entry) {
                Ok(index) => println!("{index}"),
                Err(err) => println!("SKIPPED: {err}"),
            }
        }
    }

    Ok(())
}

fn read_log(path: &Path) -> anyhow::Result<Vec<LogEntry>> {
    FileLogSource::new(path)
        .fetch_entries()
        .with_context(|| format!("failed to read log file {}", path.display()))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_env("IDXOPT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
