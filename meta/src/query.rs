//! Hand-off of a stored schema to a query planner.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use models::schema::FeatureType;

use crate::error::MetaResult;
use crate::index::IndexTableKind;
use crate::stats::UsageStatsEngine;
use crate::store::Authorizations;

/// What a planner may ask the catalog while planning.
#[async_trait]
pub trait TableResolver: Send + Sync {
    async fn table_name(&self, schema: &str, kind: IndexTableKind) -> MetaResult<String>;

    fn suggested_threads(&self, schema: &str, kind: IndexTableKind) -> usize;
}

/// Settings a reader is opened with.
#[derive(Clone, Default)]
pub struct QueryHints {
    pub timeout: Option<Duration>,
    pub authorizations: Authorizations,
    /// Present when usage of the reader is recorded.
    pub usage: Option<Arc<dyn UsageStatsEngine>>,
}

impl fmt::Debug for QueryHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHints")
            .field("timeout", &self.timeout)
            .field("authorizations", &self.authorizations)
            .field("record_usage", &self.usage.is_some())
            .finish()
    }
}

#[async_trait]
pub trait QueryPlanner: Send + Sync {
    type Plan: Send;

    async fn plan(
        &self,
        ft: &FeatureType,
        resolver: &dyn TableResolver,
        hints: &QueryHints,
    ) -> MetaResult<Self::Plan>;
}
