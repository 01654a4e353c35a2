use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::duration;
use crate::override_by_env::{entry_override_to_duration, OverrideByEnv};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionCheckConfig {
    /// Minimum time between two comparisons of the client and store versions.
    #[serde(with = "duration", default = "VersionCheckConfig::default_interval")]
    pub interval: Duration,
}

impl VersionCheckConfig {
    fn default_interval() -> Duration {
        Duration::from_secs(3600)
    }
}

impl Default for VersionCheckConfig {
    fn default() -> Self {
        Self {
            interval: Self::default_interval(),
        }
    }
}

impl OverrideByEnv for VersionCheckConfig {
    fn override_by_env(&mut self) {
        entry_override_to_duration(&mut self.interval, "GEOMETA_VERSION_CHECK_INTERVAL");
    }
}
