use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sqlledger_common::{Error, Result};
use tracing::{debug, warn};

/// Supplies migration units to the engine.
///
/// `list_identifiers` returns every candidate in any order; the engine sorts
/// them. `load_content` is called at most once per pending identifier per
/// run, and only with identifiers the listing returned.
pub trait MigrationSource {
    fn list_identifiers(&self) -> Result<Vec<String>>;
    fn load_content(&self, identifier: &str) -> Result<String>;
}

/// Adapts a plain closure pair into a [`MigrationSource`].
pub struct FnSource<L, C> {
    list: L,
    load: C,
}

impl<L, C> FnSource<L, C>
where
    L: Fn() -> Vec<String>,
    C: Fn(&str) -> String,
{
    pub fn new(list: L, load: C) -> Self {
        Self { list, load }
    }
}

impl<L, C> MigrationSource for FnSource<L, C>
where
    L: Fn() -> Vec<String>,
    C: Fn(&str) -> String,
{
    fn list_identifiers(&self) -> Result<Vec<String>> {
        Ok((self.list)())
    }

    fn load_content(&self, identifier: &str) -> Result<String> {
        Ok((self.load)(identifier))
    }
}

/// In-memory identifier → content map, mostly for tests and embedded
/// migrations.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    units: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identifier: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(identifier, content);
        self
    }

    pub fn insert(&mut self, identifier: impl Into<String>, content: impl Into<String>) {
        self.units.insert(identifier.into(), content.into());
    }
}

impl<K, V> FromIterator<(K, V)> for MemorySource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(units: I) -> Self {
        Self {
            units: units
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl MigrationSource for MemorySource {
    fn list_identifiers(&self) -> Result<Vec<String>> {
        Ok(self.units.keys().cloned().collect())
    }

    fn load_content(&self, identifier: &str) -> Result<String> {
        self.units
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::Discovery(format!("unknown migration {identifier}")))
    }
}

/// Migration files in one directory. The file name is the identifier.
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
    extension: String,
}

impl DirSource {
    /// Files ending in `.sql` under `dir`, not recursing.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "sql".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

impl MigrationSource for DirSource {
    fn list_identifiers(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            Error::Discovery(format!(
                "failed to read migrations directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let mut identifiers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::Discovery(format!(
                    "failed to list migrations directory {}: {e}",
                    self.dir.display()
                ))
            })?;
            let path = entry.path();
            if !path.is_file() || !self.matches_extension(&path) {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => identifiers.push(name),
                Err(name) => warn!("skipping migration with non UTF-8 name: {name:?}"),
            }
        }

        debug!(
            "found {} migration files in {}",
            identifiers.len(),
            self.dir.display()
        );
        Ok(identifiers)
    }

    fn load_content(&self, identifier: &str) -> Result<String> {
        if identifier.contains(['/', '\\']) || matches!(identifier, "" | "." | "..") {
            return Err(Error::Discovery(format!(
                "migration identifier {identifier:?} is not a plain file name"
            )));
        }
        Ok(std::fs::read_to_string(self.dir.join(identifier))?)
    }
}
