use std::path::{Path, PathBuf};

use sqlledger_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// File names probed by [`ConfigLoader::discover`], in order.
pub const CONFIG_CANDIDATES: &[&str] = &["sqlledger.toml", "sqlledger.yml", "sqlledger.yaml"];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `path`, choosing the format by extension.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {e}", path.display()))
        })?;

        let config = parse(path, &contents)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Look for a config file in `dir`. Returns the defaults when none exists.
    pub fn discover(dir: &Path) -> Result<(AppConfig, Option<PathBuf>)> {
        for name in CONFIG_CANDIDATES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok((Self::load(&candidate)?, Some(candidate)));
            }
        }
        debug!("no config file in {}, using defaults", dir.display());
        Ok((AppConfig::default(), None))
    }
}

fn parse(path: &Path, contents: &str) -> Result<AppConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => {
            // serde_yaml rejects an empty document instead of using defaults
            if contents.trim().is_empty() {
                return Ok(AppConfig::default());
            }
            serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display())))
        }
        "toml" => toml::from_str(contents)
            .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display()))),
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}
