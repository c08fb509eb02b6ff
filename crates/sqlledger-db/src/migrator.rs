use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::{Connection, DatabaseName, Transaction, TransactionBehavior};
use sqlledger_common::{Error, Result};
use tracing::Level;

use crate::diagnostics::{Diagnostics, NoopDiagnostics};
use crate::ledger::{self, DEFAULT_LEDGER_TABLE, MigrationRecord};
use crate::source::MigrationSource;

const UNIT_ENDED_TRANSACTION: &str = "unit ended the migration transaction";

/// Construction-time settings for a [`Migrator`].
pub struct MigratorOptions {
    pub ledger_table: String,
    pub diagnostics: Box<dyn Diagnostics>,
}

impl Default for MigratorOptions {
    fn default() -> Self {
        Self {
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            diagnostics: Box::new(NoopDiagnostics),
        }
    }
}

impl MigratorOptions {
    pub fn ledger_table(mut self, name: impl Into<String>) -> Self {
        self.ledger_table = name.into();
        self
    }

    pub fn diagnostics(mut self, sink: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Box::new(sink);
        self
    }
}

/// Outcome of a successful [`Migrator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Identifiers applied by this run, in execution order.
    pub applied: Vec<String>,
    /// Candidates that were already in the ledger.
    pub skipped: usize,
}

impl RunReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies pending migration units to one connection.
///
/// The connection is borrowed, never closed. Content of a unit that is
/// already in the ledger is not compared again, so editing an applied file
/// has no effect on later runs.
pub struct Migrator<'c> {
    conn: &'c Connection,
    table: String,
    diagnostics: Box<dyn Diagnostics>,
}

impl<'c> Migrator<'c> {
    /// Bind to `conn` with the default ledger table and no diagnostics.
    pub fn new(conn: &'c Connection) -> Result<Self> {
        Self::with_options(conn, MigratorOptions::default())
    }

    /// Bind to `conn`, creating the ledger table if it does not exist yet.
    pub fn with_options(conn: &'c Connection, options: MigratorOptions) -> Result<Self> {
        ledger::validate_table_name(&options.ledger_table)?;

        let readonly = conn
            .is_readonly(DatabaseName::Main)
            .map_err(|e| Error::Config(format!("failed to inspect connection: {e}")))?;
        if readonly {
            return Err(Error::Config(
                "connection is read-only; migrations need a writable database".into(),
            ));
        }

        let migrator = Self {
            conn,
            table: options.ledger_table,
            diagnostics: options.diagnostics,
        };
        migrator.ensure_ledger()?;
        Ok(migrator)
    }

    pub fn ledger_table(&self) -> &str {
        &self.table
    }

    fn ensure_ledger(&self) -> Result<()> {
        let exists = ledger::table_exists(self.conn, &self.table)
            .map_err(|e| Error::Config(format!("failed to list tables: {e}")))?;
        if exists {
            return Ok(());
        }

        ledger::create_table(self.conn, &self.table).map_err(|e| {
            Error::Config(format!("failed to create ledger table {}: {e}", self.table))
        })?;
        self.emit(Level::INFO, format!("created ledger table {}", self.table));
        Ok(())
    }

    /// Everything recorded in the ledger, keyed by identifier.
    pub fn applied(&self) -> Result<BTreeMap<String, MigrationRecord>> {
        ledger::list_applied(self.conn, &self.table)
    }

    /// Identifiers `run` would apply right now, in order. Nothing is mutated.
    pub fn pending(&self, source: &dyn MigrationSource) -> Result<Vec<String>> {
        let candidates = sorted_candidates(source)?;
        let applied = self.applied()?;
        Ok(candidates
            .into_iter()
            .filter(|id| !applied.contains_key(id))
            .collect())
    }

    /// Apply every pending unit from `source` in one transaction.
    ///
    /// Any failure rolls the whole run back, leaving the ledger as it was
    /// before the call, so running again after a fix resumes from the same
    /// pending set.
    pub fn run(&self, source: &dyn MigrationSource) -> Result<RunReport> {
        let started_at = Utc::now();
        self.emit(Level::DEBUG, format!("starting migration run at {started_at}"));

        let candidates = sorted_candidates(source)?;
        let applied = self.applied()?;
        self.emit(
            Level::DEBUG,
            format!("{} candidate migrations", candidates.len()),
        );

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|e| Error::Discovery(format!("failed to begin transaction: {e}")))?;

        let mut newly_applied = Vec::new();
        let mut skipped = 0;
        for identifier in candidates {
            if applied.contains_key(&identifier) {
                skipped += 1;
                continue;
            }

            let content = match source.load_content(&identifier) {
                Ok(content) => content,
                Err(e) => {
                    let err = Error::execution(&identifier, format!("failed to load: {e}"));
                    return Err(self.abort(tx, err));
                }
            };

            self.emit(Level::DEBUG, format!("applying {identifier}"));
            let applied_at = Utc::now();
            if let Err(message) = self.execute_unit(&tx, &content) {
                return Err(self.abort(tx, Error::execution(&identifier, message)));
            }
            if let Err(e) = ledger::record_applied(&tx, &self.table, &identifier, applied_at) {
                return Err(self.abort(tx, Error::bookkeeping(&identifier, e)));
            }
            newly_applied.push(identifier);
        }

        // A failed commit leaves the transaction open; dropping it rolls back.
        if let Err(e) = tx.commit() {
            let unit = newly_applied
                .last()
                .cloned()
                .unwrap_or_else(|| self.table.clone());
            let err = Error::bookkeeping(unit, format!("commit failed: {e}"));
            self.emit(Level::ERROR, err.to_string());
            return Err(err);
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            applied: newly_applied,
            skipped,
        };
        self.emit(
            Level::INFO,
            format!(
                "migration run done: {} applied, {} already present, took {}ms",
                report.applied.len(),
                report.skipped,
                report.duration().num_milliseconds()
            ),
        );
        Ok(report)
    }

    /// Run one unit's statements inside the run's transaction. Transaction
    /// control (`BEGIN`, `COMMIT`, `END`, `ROLLBACK`) is refused while the
    /// unit runs, so a unit cannot commit or drop earlier work of the run.
    fn execute_unit(
        &self,
        tx: &Transaction<'_>,
        content: &str,
    ) -> std::result::Result<(), String> {
        let refused = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&refused);
        tx.authorizer(Some(move |ctx: AuthContext<'_>| match ctx.action {
            AuthAction::Transaction { .. } => {
                flag.store(true, Ordering::Relaxed);
                Authorization::Deny
            }
            _ => Authorization::Allow,
        }));
        let result = tx.execute_batch(content);
        tx.authorizer(None::<fn(AuthContext<'_>) -> Authorization>);

        if refused.load(Ordering::Relaxed) {
            return Err(UNIT_ENDED_TRANSACTION.to_string());
        }
        result.map_err(|e| e.to_string())?;
        if self.conn.is_autocommit() {
            return Err(UNIT_ENDED_TRANSACTION.to_string());
        }
        Ok(())
    }

    /// Roll back after a failed unit. Rollback is best effort: if it fails
    /// too, that is reported to the sink and `err` is still what the caller
    /// gets.
    fn abort(&self, tx: Transaction<'_>, err: Error) -> Error {
        self.emit(Level::ERROR, err.to_string());
        if let Err(e) = tx.rollback() {
            self.emit(Level::ERROR, format!("rollback failed: {e}"));
        }
        err
    }

    fn emit(&self, level: Level, message: impl AsRef<str>) {
        self.diagnostics.emit(level, message.as_ref());
    }
}

/// Byte-wise ascending order with duplicates collapsed. Numeric prefixes
/// must be zero-padded to sort as expected.
fn sorted_candidates(source: &dyn MigrationSource) -> Result<Vec<String>> {
    let mut identifiers = source.list_identifiers().map_err(|e| {
        if matches!(e, Error::Discovery(_)) {
            e
        } else {
            Error::Discovery(format!("failed to list migrations: {e}"))
        }
    })?;
    identifiers.sort();
    identifiers.dedup();
    Ok(identifiers)
}
