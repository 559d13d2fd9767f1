use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SparkError};
use crate::types::UnitDescriptor;

pub const DEFAULT_NAPTIME_SECS: u64 = 10;
pub const MIN_NAPTIME_SECS: u64 = 1;
pub const MAX_NAPTIME_SECS: u64 = i32::MAX as u64;

/// Worker settings (spark.toml + SPARK_* env overrides).
///
/// A loaded value is treated as an immutable snapshot: reloading builds a new
/// `SparkConfig` and swaps it in whole, it is never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparkConfig {
    /// Seconds to sleep between cycles.
    #[serde(default = "default_naptime")]
    pub naptime: u64,
    /// Path of the SQLite database holding the unit catalog.
    #[serde(default)]
    pub database: String,
    /// Namespace the unit is looked up in. No fallback search is performed.
    #[serde(default)]
    pub namespace: String,
    /// Name of the unit to fire.
    #[serde(default)]
    pub unit: String,
    /// Exit immediately when the parent (host) process disappears.
    #[serde(default = "bool_true")]
    pub watch_host: bool,
    /// Optional JSON file receiving running/idle status updates.
    #[serde(default)]
    pub status_file: Option<PathBuf>,
}

impl Default for SparkConfig {
    fn default() -> Self {
        Self {
            naptime: DEFAULT_NAPTIME_SECS,
            database: String::new(),
            namespace: String::new(),
            unit: String::new(),
            watch_host: true,
            status_file: None,
        }
    }
}

fn default_naptime() -> u64 {
    DEFAULT_NAPTIME_SECS
}

fn bool_true() -> bool {
    true
}

impl SparkConfig {
    /// Load config from a TOML file with SPARK_* env var overrides, then
    /// validate it.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.spark/spark.toml
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);

        let config: SparkConfig = Figment::from(Serialized::defaults(SparkConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SPARK_").ignore(&["config"]))
            .extract()
            .map_err(|e| SparkError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_NAPTIME_SECS..=MAX_NAPTIME_SECS).contains(&self.naptime) {
            return Err(SparkError::Config(format!(
                "naptime must be between {MIN_NAPTIME_SECS} and {MAX_NAPTIME_SECS} seconds, got {}",
                self.naptime
            )));
        }
        for (key, value) in [
            ("database", &self.database),
            ("namespace", &self.namespace),
            ("unit", &self.unit),
        ] {
            if value.trim().is_empty() {
                return Err(SparkError::Config(format!("{key} must be set")));
            }
        }
        Ok(())
    }

    pub fn naptime(&self) -> Duration {
        Duration::from_secs(self.naptime)
    }

    pub fn unit_descriptor(&self) -> UnitDescriptor {
        UnitDescriptor::new(self.namespace.clone(), self.unit.clone())
    }
}

fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(format!("{}/.spark/spark.toml", home))
}

/// Where the worker (re)reads its settings from.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<SparkConfig>;
}

/// Reads spark.toml plus SPARK_* overrides on every `load`.
#[derive(Debug, Clone, Default)]
pub struct FileConfigSource {
    path: Option<PathBuf>,
}

impl FileConfigSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<SparkConfig> {
        SparkConfig::load(self.path.as_deref())
    }
}

impl<F> ConfigSource for F
where
    F: Fn() -> Result<SparkConfig> + Send + Sync,
{
    fn load(&self) -> Result<SparkConfig> {
        self()
    }
}
