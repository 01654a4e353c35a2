use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::check::{CheckConfig, CheckConfigItemResult, CheckConfigResult};
use crate::override_by_env::{entry_override, OverrideByEnv};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sled,
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Sled => write!(f, "sled"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sled" => Ok(Self::Sled),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_backend")]
    pub backend: StorageBackend,

    #[serde(default = "StorageConfig::default_path")]
    pub path: String,
}

impl StorageConfig {
    fn default_backend() -> StorageBackend {
        StorageBackend::Sled
    }

    fn default_path() -> String {
        let path = std::path::Path::new("geometa_data").join("store");
        path.to_string_lossy().to_string()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            path: Self::default_path(),
        }
    }
}

impl OverrideByEnv for StorageConfig {
    fn override_by_env(&mut self) {
        entry_override(&mut self.backend, "GEOMETA_STORAGE_BACKEND");
        entry_override(&mut self.path, "GEOMETA_STORAGE_PATH");
    }
}

impl CheckConfig for StorageConfig {
    fn check(&self, _: &crate::CatalogConfig) -> Option<CheckConfigResult> {
        let mut ret = CheckConfigResult::default();
        match self.backend {
            StorageBackend::Sled if self.path.is_empty() => {
                ret.add_error(CheckConfigItemResult {
                    config: Arc::new("storage".to_string()),
                    item: "path".to_string(),
                    message: "'path' is required by the sled backend".to_string(),
                });
            }
            StorageBackend::Memory => {
                ret.add_warn(CheckConfigItemResult {
                    config: Arc::new("storage".to_string()),
                    item: "backend".to_string(),
                    message: "the memory backend loses every catalog on exit".to_string(),
                });
            }
            _ => {}
        }
        ret.into_option()
    }
}
