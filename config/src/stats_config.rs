use serde::{Deserialize, Serialize};

use crate::override_by_env::{entry_override, OverrideByEnv};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsConfig {
    /// Keep cached statistics for every schema and back-fill them for
    /// schemas created before statistics existed.
    #[serde(default = "StatsConfig::default_generate_stats")]
    pub generate_stats: bool,

    /// Attach usage recording to query plans.
    #[serde(default = "StatsConfig::default_collect_usage_stats")]
    pub collect_usage_stats: bool,
}

impl StatsConfig {
    fn default_generate_stats() -> bool {
        true
    }

    fn default_collect_usage_stats() -> bool {
        false
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            generate_stats: Self::default_generate_stats(),
            collect_usage_stats: Self::default_collect_usage_stats(),
        }
    }
}

impl OverrideByEnv for StatsConfig {
    fn override_by_env(&mut self) {
        entry_override(&mut self.generate_stats, "GEOMETA_STATS_GENERATE");
        entry_override(&mut self.collect_usage_stats, "GEOMETA_STATS_COLLECT_USAGE");
    }
}
