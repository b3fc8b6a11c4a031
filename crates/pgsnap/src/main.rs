//! pgsnap launcher
//!
//! One-shot batch job: with no subcommand it exports, which is what the
//! container entry point runs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pgsnap::ConfigArgs;
use pgsnap_logging::{init_logging, LogConfig};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};

mod cli;

use cli::FilterArgs;

#[derive(Parser, Debug)]
#[command(
    name = "pgsnap",
    version,
    about = "Snapshot a PostgreSQL schema to Parquet files, with optional S3/MinIO upload"
)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export every selected base table to Parquet (default)
    Export {
        /// Show what would be exported without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// List the schema's base tables and where their snapshots go
    Tables {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Verify config, extension, database and bucket without exporting
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Export { json, .. }
            | Commands::Tables { json, .. }
            | Commands::Check { json } => *json,
        }
    }
}

/// Seed the environment from `./.env` when present. Variables already set win.
fn load_dotenv() -> Option<String> {
    let path = Path::new(".env");
    if !path.exists() {
        return None;
    }
    match dotenvy::from_path(path) {
        Ok(()) => None,
        Err(err) => Some(format!("failed to load .env: {}", err)),
    }
}

fn run_command(cli: Cli) -> Result<ExitCode> {
    let command = cli.command.unwrap_or(Commands::Export {
        dry_run: false,
        json: false,
        filter: FilterArgs::default(),
    });

    match command {
        Commands::Export {
            dry_run,
            json,
            filter,
        } => {
            let config = cli::load_config(&cli.config, &filter)?;
            debug!(config = ?config, "Loaded configuration");
            cli::export::run(cli::export::ExportArgs { dry_run, json }, &config)
        }
        Commands::Tables { json, filter } => {
            let config = cli::load_config(&cli.config, &filter)?;
            cli::tables::run(cli::tables::TablesArgs { json }, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { json } => {
            let config = cli::load_config(&cli.config, &FilterArgs::default())?;
            cli::check::run(cli::check::CheckArgs { json }, &config)
        }
    }
}

fn main() -> ExitCode {
    // Before parsing, so clap's env fallbacks see .env entries
    let dotenv_warning = load_dotenv();

    let cli = Cli::parse();
    let json_mode = cli.command.as_ref().map_or(false, Commands::wants_json);

    if let Err(err) = init_logging(LogConfig {
        app_name: "pgsnap",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: {:#}", err);
    }
    if let Some(warning) = dotenv_warning {
        tracing::warn!("{}", warning);
    }
    info!(version = env!("CARGO_PKG_VERSION"), "pgsnap starting");

    match run_command(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
