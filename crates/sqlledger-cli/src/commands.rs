use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlledger_config::AppConfig;
use sqlledger_db::{DirSource, Migrator, MigratorOptions, TracingDiagnostics};
use tracing::info;

fn open(config: &AppConfig) -> Result<Connection> {
    info!("opening database at {}", config.database.display());
    let conn = Connection::open(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.display()))?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .context("failed to set busy timeout")?;
    Ok(conn)
}

fn migrator<'c>(conn: &'c Connection, config: &AppConfig) -> Result<Migrator<'c>> {
    let options = MigratorOptions::default()
        .ledger_table(config.ledger_table.clone())
        .diagnostics(TracingDiagnostics);
    Ok(Migrator::with_options(conn, options)?)
}

fn source(config: &AppConfig) -> DirSource {
    DirSource::new(&config.migrations_dir).with_extension(config.extension.clone())
}

pub fn up(config: &AppConfig) -> Result<()> {
    let conn = open(config)?;
    let migrator = migrator(&conn, config)?;
    let report = migrator.run(&source(config))?;

    if report.is_noop() {
        println!("Nothing to apply ({} already applied).", report.skipped);
        return Ok(());
    }
    for identifier in &report.applied {
        println!("applied  {identifier}");
    }
    println!(
        "{} migration(s) applied in {}ms.",
        report.applied.len(),
        report.duration().num_milliseconds()
    );
    Ok(())
}

pub fn status(config: &AppConfig) -> Result<()> {
    let conn = open(config)?;
    let migrator = migrator(&conn, config)?;
    let applied = migrator.applied()?;
    let pending = migrator.pending(&source(config))?;

    for record in applied.values() {
        println!(
            "applied  {}  {}",
            record.identifier,
            record.applied_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    for identifier in &pending {
        println!("pending  {identifier}");
    }
    println!("{} applied, {} pending.", applied.len(), pending.len());
    Ok(())
}
