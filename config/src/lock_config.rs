use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::check::{CheckConfig, CheckConfigItemResult, CheckConfigResult};
use crate::codec::duration;
use crate::override_by_env::{entry_override, entry_override_to_duration, OverrideByEnv};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    /// Lease rows in the backing store, shared by every process using it.
    Store,
    /// In-process mutex, only excludes callers inside one process.
    Local,
}

impl Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for LockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "store" => Ok(Self::Store),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown lock kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockConfig {
    #[serde(default = "LockConfig::default_kind")]
    pub kind: LockKind,

    #[serde(default = "LockConfig::default_path_prefix")]
    pub path_prefix: String,

    /// Suffix of the table holding lease rows, `<catalog>_<table>`.
    #[serde(default = "LockConfig::default_table")]
    pub table: String,

    #[serde(with = "duration", default = "LockConfig::default_timeout")]
    pub timeout: Duration,

    #[serde(with = "duration", default = "LockConfig::default_ttl")]
    pub ttl: Duration,

    #[serde(with = "duration", default = "LockConfig::default_retry_interval")]
    pub retry_interval: Duration,
}

impl LockConfig {
    fn default_kind() -> LockKind {
        LockKind::Store
    }

    fn default_path_prefix() -> String {
        "/geometa/catalog".to_string()
    }

    fn default_table() -> String {
        "locks".to_string()
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(120)
    }

    fn default_ttl() -> Duration {
        Duration::from_secs(300)
    }

    fn default_retry_interval() -> Duration {
        Duration::from_millis(100)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            kind: Self::default_kind(),
            path_prefix: Self::default_path_prefix(),
            table: Self::default_table(),
            timeout: Self::default_timeout(),
            ttl: Self::default_ttl(),
            retry_interval: Self::default_retry_interval(),
        }
    }
}

impl OverrideByEnv for LockConfig {
    fn override_by_env(&mut self) {
        entry_override(&mut self.kind, "GEOMETA_LOCK_KIND");
        entry_override(&mut self.path_prefix, "GEOMETA_LOCK_PATH_PREFIX");
        entry_override(&mut self.table, "GEOMETA_LOCK_TABLE");
        entry_override_to_duration(&mut self.timeout, "GEOMETA_LOCK_TIMEOUT");
        entry_override_to_duration(&mut self.ttl, "GEOMETA_LOCK_TTL");
        entry_override_to_duration(&mut self.retry_interval, "GEOMETA_LOCK_RETRY_INTERVAL");
    }
}

impl CheckConfig for LockConfig {
    fn check(&self, _: &crate::CatalogConfig) -> Option<CheckConfigResult> {
        let config_name = Arc::new("lock".to_string());
        let mut ret = CheckConfigResult::default();

        if self.timeout.is_zero() {
            ret.add_error(CheckConfigItemResult {
                config: config_name.clone(),
                item: "timeout".to_string(),
                message: "'timeout' must be greater than zero".to_string(),
            });
        }
        if self.kind == LockKind::Store && self.ttl <= self.timeout {
            ret.add_warn(CheckConfigItemResult {
                config: config_name.clone(),
                item: "ttl".to_string(),
                message: "'ttl' is not longer than 'timeout', a slow holder may lose its lease"
                    .to_string(),
            });
        }
        if self.retry_interval > self.timeout {
            ret.add_warn(CheckConfigItemResult {
                config: config_name,
                item: "retry_interval".to_string(),
                message: "'retry_interval' is longer than 'timeout'".to_string(),
            });
        }

        ret.into_option()
    }
}
