mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlledger_common::Error;
use sqlledger_config::{AppConfig, ConfigLoader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlledger", version, about = "Apply SQL migrations exactly once")]
struct Cli {
    /// Config file (YAML or TOML). Defaults to sqlledger.{toml,yml,yaml} in the working directory.
    #[arg(short, long, env = "SQLLEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file, overriding the config.
    #[arg(short, long, env = "SQLLEDGER_DATABASE")]
    database: Option<PathBuf>,

    /// Migrations directory, overriding the config.
    #[arg(short, long)]
    migrations: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply every pending migration in one transaction
    Up,
    /// Show applied and pending migrations
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config, cli.verbose);

    let result = match cli.command {
        Command::Up => commands::up(&config),
        Command::Status => commands::status(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Engine errors already name their kind in the message; the tag is there
/// for scripts that match on it.
fn render_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<Error>() {
        Some(engine) => format!("[{}] {e:#}", engine.category()),
        None => format!("error: {e:#}"),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load(path)?,
        None => {
            let cwd = std::env::current_dir().context("failed to read working directory")?;
            ConfigLoader::discover(&cwd)?.0
        }
    };

    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(migrations) = &cli.migrations {
        config.migrations_dir = migrations.clone();
    }
    Ok(config)
}

fn init_tracing(config: &AppConfig, verbose: bool) {
    let default = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
