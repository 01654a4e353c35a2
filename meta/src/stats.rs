//! Statistics kept per schema in the `<catalog>_stats` table.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use models::schema::spec::encode_type;
use models::schema::FeatureType;
use trace::{debug, info};

use crate::error::MetaResult;
use crate::metadata::CatalogMetadata;
use crate::query::QueryHints;
use crate::store::{Authorizations, KeyRange, KeyValueStore};

pub const STATS_COUNT_KEY: &str = "stats-count";
pub const COMBINER_PROPERTY: &str = "table.iterator.majc.stats-combiner";
pub const COMBINER_SCHEMA_PREFIX: &str = "table.iterator.majc.stats-combiner.opt.sft-";

/// Rows a statistics pass reads: the records of one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSource {
    pub table: String,
    pub prefix: Vec<u8>,
}

#[async_trait]
pub trait StatsEngine: Send + Sync + Debug {
    /// Registers `ft` with the server side combiner of the stats table.
    async fn configure_combiner(
        &self,
        store: &dyn KeyValueStore,
        stats_table: &str,
        ft: &FeatureType,
    ) -> MetaResult<()>;

    /// Computes the statistics of `ft` from `source`, returning the number of
    /// records seen.
    async fn generate_stats(&self, ft: &FeatureType, source: &StatsSource) -> MetaResult<u64>;

    async fn clear_stats(&self, ft: &FeatureType) -> MetaResult<()>;

    async fn close(&self) -> MetaResult<()>;
}

/// Records how schemas are queried. Only consulted to decide whether usage
/// recording is attached to a reader.
pub trait UsageStatsEngine: Send + Sync + Debug {
    fn record_usage(&self, schema: &str, hints: &QueryHints);
}

/// Keeps a record count per schema in the stats metadata.
#[derive(Debug)]
pub struct MetadataStatsEngine {
    store: Arc<dyn KeyValueStore>,
    metadata: Arc<CatalogMetadata>,
    auths: Authorizations,
    closed: AtomicBool,
}

impl MetadataStatsEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        metadata: Arc<CatalogMetadata>,
        auths: Authorizations,
    ) -> Self {
        Self {
            store,
            metadata,
            auths,
            closed: AtomicBool::new(false),
        }
    }

    pub async fn stats_count(&self, schema: &str) -> MetaResult<Option<u64>> {
        Ok(self
            .metadata
            .read(schema, STATS_COUNT_KEY, false)
            .await?
            .and_then(|v| v.parse::<u64>().ok()))
    }
}

#[async_trait]
impl StatsEngine for MetadataStatsEngine {
    async fn configure_combiner(
        &self,
        store: &dyn KeyValueStore,
        stats_table: &str,
        ft: &FeatureType,
    ) -> MetaResult<()> {
        store.create_table_if_absent(stats_table).await?;
        store
            .set_table_property(stats_table, COMBINER_PROPERTY, "10,StatsCombiner")
            .await?;
        store
            .set_table_property(
                stats_table,
                &format!("{}{}", COMBINER_SCHEMA_PREFIX, ft.name()),
                &encode_type(ft, false),
            )
            .await?;
        debug!("configured stats combiner of {} on {}", ft.name(), stats_table);
        Ok(())
    }

    async fn generate_stats(&self, ft: &FeatureType, source: &StatsSource) -> MetaResult<u64> {
        if self.closed.load(Ordering::SeqCst) {
            debug!("stats engine closed, skip stats of {}", ft.name());
            return Ok(0);
        }
        if !self.store.table_exists(&source.table).await? {
            return Ok(0);
        }

        let range = if source.prefix.is_empty() {
            KeyRange::all()
        } else {
            KeyRange::prefix(source.prefix.clone())
        };
        let count = self
            .store
            .scan(&source.table, &range, &self.auths)
            .await?
            .len() as u64;
        self.metadata
            .insert(ft.name(), STATS_COUNT_KEY, &count.to_string())
            .await?;
        info!("generated stats of {}: {} records", ft.name(), count);
        Ok(count)
    }

    async fn clear_stats(&self, ft: &FeatureType) -> MetaResult<()> {
        self.metadata.delete(ft.name()).await?;
        let table = self.metadata.table();
        if self.store.table_exists(table).await? {
            self.store
                .remove_table_property(table, &format!("{}{}", COMBINER_SCHEMA_PREFIX, ft.name()))
                .await?;
        }
        Ok(())
    }

    async fn close(&self) -> MetaResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
