use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub use crate::check::{CheckConfig, CheckConfigItemResult, CheckConfigResult};
pub use crate::lock_config::*;
pub use crate::log_config::*;
pub use crate::query_config::*;
pub use crate::stats_config::*;
pub use crate::storage_config::*;
pub use crate::version_check_config::*;
use crate::override_by_env::{entry_override, OverrideByEnv};

mod check;
pub mod codec;
mod lock_config;
mod log_config;
pub mod override_by_env;
mod query_config;
mod stats_config;
mod storage_config;
mod version_check_config;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("Failed to read configuration file '{}': {}", path.display(), source))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse configuration file '{}': {}", path.display(), source))]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Name of the catalog table; every physical table of the catalog is
    /// prefixed with it.
    #[serde(default = "CatalogConfig::default_catalog")]
    pub catalog: String,

    #[serde(default = "Default::default")]
    pub lock: LockConfig,

    #[serde(default = "Default::default")]
    pub query: QueryConfig,

    #[serde(default = "Default::default")]
    pub stats: StatsConfig,

    #[serde(default = "Default::default")]
    pub version_check: VersionCheckConfig,

    #[serde(default = "Default::default")]
    pub storage: StorageConfig,

    #[serde(default = "Default::default")]
    pub log: LogConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            catalog: Self::default_catalog(),
            lock: Default::default(),
            query: Default::default(),
            stats: Default::default(),
            version_check: Default::default(),
            storage: Default::default(),
            log: Default::default(),
        }
    }
}

impl CatalogConfig {
    fn default_catalog() -> String {
        "geomesa".to_string()
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = catalog.into();
        self
    }

    pub fn override_by_env(&mut self) {
        entry_override(&mut self.catalog, "GEOMETA_CATALOG");
        self.lock.override_by_env();
        self.query.override_by_env();
        self.stats.override_by_env();
        self.version_check.override_by_env();
        self.storage.override_by_env();
        self.log.override_by_env();
    }

    pub fn to_string_pretty(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|_| "Failed to stringify Config".to_string())
    }

    pub fn check(&self) -> CheckConfigResult {
        let mut check_results = CheckConfigResult::default();

        if self.catalog.is_empty() || self.catalog.contains('~') {
            check_results.add_error(CheckConfigItemResult {
                config: std::sync::Arc::new("catalog".to_string()),
                item: "catalog".to_string(),
                message: "'catalog' must be a non-empty name without '~'".to_string(),
            });
        }
        if let Some(c) = self.lock.check(self) {
            check_results.add_all(c)
        }
        if let Some(c) = self.query.check(self) {
            check_results.add_all(c)
        }
        if let Some(c) = self.storage.check(self) {
            check_results.add_all(c)
        }
        if let Some(c) = self.log.check(self) {
            check_results.add_all(c)
        }

        check_results
    }
}

pub fn get_config(path: impl AsRef<Path>) -> ConfigResult<CatalogConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).context(ReadFileSnafu { path })?;
    let mut config: CatalogConfig = toml::from_str(&content).context(ParseFileSnafu { path })?;
    config.override_by_env();
    Ok(config)
}

pub fn get_config_for_test() -> CatalogConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.toml");
    get_config(path).unwrap_or_default()
}

pub fn check_config(path: impl AsRef<Path>) -> String {
    match get_config(path) {
        Ok(cfg) => cfg.check().to_string(),
        Err(err) => err.to_string(),
    }
}
