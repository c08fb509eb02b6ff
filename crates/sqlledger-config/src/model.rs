use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings for the `sqlledger` binary. Every field has a default, so an
/// empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file to migrate.
    pub database: PathBuf,
    /// Directory holding the migration files.
    pub migrations_dir: PathBuf,
    /// File extension that marks a migration, without the dot.
    pub extension: String,
    pub ledger_table: String,
    /// How long SQLite waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("sqlledger.db"),
            migrations_dir: PathBuf::from("migrations"),
            extension: "sql".to_string(),
            ledger_table: "__migrations".to_string(),
            busy_timeout_ms: 5000,
            log_level: "info".to_string(),
        }
    }
}
