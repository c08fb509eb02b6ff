//! The ledger table: which migration units have been applied, and when.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use sqlledger_common::{Error, Result};

/// Reserved name of the ledger table unless overridden.
pub const DEFAULT_LEDGER_TABLE: &str = "__migrations";

const MAX_TABLE_NAME_LEN: usize = 64;

/// A row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub identifier: String,
    pub applied_at: DateTime<Utc>,
}

/// The ledger name is spliced into SQL text, so only plain identifiers are
/// accepted.
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("ledger table name cannot be empty".into()));
    }
    if name.len() > MAX_TABLE_NAME_LEN {
        return Err(Error::Config(format!(
            "ledger table name too long ({} > {MAX_TABLE_NAME_LEN})",
            name.len()
        )));
    }
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Config(format!(
            "invalid ledger table name {name:?}: use letters, digits and '_' only"
        )));
    }
    Ok(())
}

/// Scan the table list for `table`. SQLite table names compare
/// case-insensitively.
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
    for name in names {
        if name?.eq_ignore_ascii_case(table) {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn create_table(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (
            identifier TEXT NOT NULL,
            applied_at DATETIME NOT NULL,
            PRIMARY KEY (identifier)
        );"
    ))
}

/// Read the whole ledger, keyed by identifier.
pub fn list_applied(conn: &Connection, table: &str) -> Result<BTreeMap<String, MigrationRecord>> {
    let mut stmt = conn
        .prepare(&format!("SELECT identifier, applied_at FROM {table}"))
        .map_err(|e| Error::Discovery(format!("failed to prepare ledger query: {e}")))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| Error::Discovery(format!("failed to query ledger: {e}")))?;

    let mut applied = BTreeMap::new();
    for row in rows {
        let (identifier, raw) =
            row.map_err(|e| Error::Discovery(format!("failed to read ledger row: {e}")))?;
        let applied_at = parse_timestamp(&raw).ok_or_else(|| {
            Error::Discovery(format!(
                "unreadable applied_at {raw:?} for ledger entry {identifier}"
            ))
        })?;
        applied.insert(
            identifier.clone(),
            MigrationRecord {
                identifier,
                applied_at,
            },
        );
    }
    Ok(applied)
}

/// Insert one ledger row. The raw database error is handed back so the
/// caller can roll back before reporting it.
pub fn record_applied(
    conn: &Connection,
    table: &str,
    identifier: &str,
    applied_at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} (identifier, applied_at) VALUES (?1, ?2)"
    ))?;
    stmt.execute(params![identifier, format_timestamp(applied_at)])?;
    Ok(())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // Rows written by hand with datetime('now') look like "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .ok()
        })
}
