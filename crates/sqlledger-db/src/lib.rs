//! Migration engine for SQLite.
//!
//! A [`Migrator`] applies every pending unit from a [`MigrationSource`]
//! inside a single transaction and records each one in a ledger table, so
//! that a unit runs at most once per database.
//!
//! The engine takes no lock of its own. Two processes running the same
//! migrations against the same database at the same time can both read the
//! same pending set; callers must serialize runs themselves.

pub mod diagnostics;
pub mod ledger;
pub mod migrator;
pub mod source;

pub use diagnostics::{Diagnostics, NoopDiagnostics, TracingDiagnostics};
pub use ledger::{DEFAULT_LEDGER_TABLE, MigrationRecord};
pub use migrator::{Migrator, MigratorOptions, RunReport};
pub use source::{DirSource, FnSource, MemorySource, MigrationSource};
