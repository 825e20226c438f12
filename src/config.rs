//! Runtime configuration, loaded from an optional `fundrecon.toml`.
//!
//! Every field has a default so the binary runs without any config file;
//! CLI flags override the file on top of that.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "fundrecon.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub data: DataConfig,
    pub reports: ReportsConfig,
    pub funds: FundsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Folder scanned for fund holding CSV files
    pub funds_dir: PathBuf,
    /// SQL file seeding the reference price tables; skipped when absent
    pub reference_sql: Option<PathBuf>,
    /// SQLite file path; an in-memory database is used when unset
    pub db_path: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            funds_dir: PathBuf::from("data/external_funds"),
            reference_sql: Some(PathBuf::from("data/master-reference-sql.sql")),
            db_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportsConfig {
    /// Folder report files are written to
    pub output_dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FundsConfig {
    /// Fund names recognized in holding file names
    pub names: Vec<String>,
}

impl Default for FundsConfig {
    fn default() -> Self {
        Self {
            names: [
                "Whitestone",
                "Wallington",
                "Catalysm",
                "Belaware",
                "Gohen",
                "Applebead",
                "Magnum",
                "Trustmind",
                "Leeder",
                "Virtous",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Config {
    /// Load configuration. An explicit path must exist; otherwise
    /// `fundrecon.toml` in the working directory is used when present,
    /// falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    debug!("No config file found; using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }
}
