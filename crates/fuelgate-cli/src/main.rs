//! Fuelgate CLI - Command-line interface for the Fuelgate execution scheduler.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

/// Fuelgate fuel-metered execution scheduler
#[derive(Parser)]
#[command(name = "fuelgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Output format options.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Drive a batch of simulated contract calls through the scheduler
    Run(commands::run::RunArgs),
    /// Validate a contract definition
    Validate(commands::validate::ValidateArgs),
    /// Show the fuel tier table
    Tiers(commands::tiers::TiersArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&log_directive(cli.verbose, cli.quiet));

    let quiet = cli.quiet;
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if !quiet {
                eprintln!("Error: {:#}", err);
            }
            ExitCode::FAILURE
        }
    }
}

/// Filter directive for the fuelgate crates; `RUST_LOG` overrides it.
fn log_directive(verbose: u8, quiet: bool) -> String {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    format!("fuelgate={}", level)
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    // Logs go to stderr so JSON output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = config::FileConfig::load(cli.config.as_deref())?.into_vm_config();

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, cli.format, cli.quiet),
        Commands::Validate(args) => commands::validate::execute(args, config, cli.format),
        Commands::Tiers(args) => commands::tiers::execute(args, config, cli.format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directive() {
        assert_eq!(log_directive(0, false), "fuelgate=warn");
        assert_eq!(log_directive(2, false), "fuelgate=debug");
        assert_eq!(log_directive(7, false), "fuelgate=trace");
        assert_eq!(log_directive(3, true), "fuelgate=error");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fuelgate", "tiers", "-vv", "--format", "json"]).unwrap();

        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Tiers(_)));
    }
}
