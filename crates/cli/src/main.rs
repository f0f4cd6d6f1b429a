//! kiln: fingerprint units of work and inspect their file inputs.

mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiln_lib::config::EngineConfig;

use output::{OutputFormat, print_error};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "Fingerprint units of work and inspect their inputs", long_about = None)]
struct Cli {
  /// Enable debug logging and report fingerprint fallbacks
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compute fingerprints for unit-of-work descriptors
  Fingerprint {
    /// Unit-of-work descriptor files (JSON)
    #[arg(required = true)]
    units: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Skip units that have not started after this long (e.g. "30s")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Number of worker threads
    #[arg(short, long)]
    parallelism: Option<usize>,
  },

  /// Print the file visitation events of a unit-of-work descriptor
  Events {
    /// Unit-of-work descriptor file (JSON)
    unit: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(err) = run(cli) {
    print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  let mut config = EngineConfig::from_env();
  if cli.verbose {
    config.verbose_fallback = true;
  }

  match cli.command {
    Commands::Fingerprint {
      units,
      format,
      timeout,
      parallelism,
    } => {
      if let Some(parallelism) = parallelism {
        config = config.with_parallelism(parallelism);
      }
      if let Some(timeout) = timeout {
        config = config.with_unit_timeout(timeout);
      }
      cmd::cmd_fingerprint(&units, &config, format)
    }
    Commands::Events { unit, format } => cmd::cmd_events(&unit, &config, format),
  }
}
