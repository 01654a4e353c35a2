use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::check::{CheckConfig, CheckConfigItemResult, CheckConfigResult};
use crate::codec::duration;
use crate::override_by_env::{
    entry_override, entry_override_to_duration, entry_override_to_vec_string, OverrideByEnv,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryConfig {
    /// Scan threads suggested for the spatial, spatio-temporal and attribute
    /// index tables.
    #[serde(default = "QueryConfig::default_query_threads")]
    pub query_threads: usize,

    /// Scan threads suggested for record table lookups, kept low since those
    /// are point reads.
    #[serde(default = "QueryConfig::default_record_threads")]
    pub record_threads: usize,

    /// Threads used by batch deleters when removing shared table rows.
    #[serde(default = "QueryConfig::default_write_threads")]
    pub write_threads: usize,

    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub query_timeout: Option<Duration>,

    #[serde(default)]
    pub authorizations: Vec<String>,
}

impl QueryConfig {
    fn default_query_threads() -> usize {
        8
    }

    fn default_record_threads() -> usize {
        3
    }

    fn default_write_threads() -> usize {
        2
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            query_threads: Self::default_query_threads(),
            record_threads: Self::default_record_threads(),
            write_threads: Self::default_write_threads(),
            query_timeout: None,
            authorizations: vec![],
        }
    }
}

impl OverrideByEnv for QueryConfig {
    fn override_by_env(&mut self) {
        entry_override(&mut self.query_threads, "GEOMETA_QUERY_THREADS");
        entry_override(&mut self.record_threads, "GEOMETA_QUERY_RECORD_THREADS");
        entry_override(&mut self.write_threads, "GEOMETA_QUERY_WRITE_THREADS");
        let mut timeout = Duration::ZERO;
        if entry_override_to_duration(&mut timeout, "GEOMETA_QUERY_TIMEOUT") {
            self.query_timeout = Some(timeout);
        }
        entry_override_to_vec_string(&mut self.authorizations, "GEOMETA_QUERY_AUTHORIZATIONS");
    }
}

impl CheckConfig for QueryConfig {
    fn check(&self, _: &crate::CatalogConfig) -> Option<CheckConfigResult> {
        let config_name = Arc::new("query".to_string());
        let mut ret = CheckConfigResult::default();

        for (item, value) in [
            ("query_threads", self.query_threads),
            ("record_threads", self.record_threads),
            ("write_threads", self.write_threads),
        ] {
            if value == 0 {
                ret.add_error(CheckConfigItemResult {
                    config: config_name.clone(),
                    item: item.to_string(),
                    message: format!("'{}' must be greater than zero", item),
                });
            }
        }
        if self.record_threads > self.query_threads {
            ret.add_warn(CheckConfigItemResult {
                config: config_name,
                item: "record_threads".to_string(),
                message: "'record_threads' is larger than 'query_threads', record lookups rarely benefit from it".to_string(),
            });
        }

        ret.into_option()
    }
}
