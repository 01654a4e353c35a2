//! The schema catalog: creates, reads, updates and removes feature type
//! schemas and the physical index tables backing them.
//!
//! Schema creation, schema id allocation, legacy migration and the first
//! stats combiner setup are serialized through one lock per catalog. Every
//! other operation is lock free.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use config::{CatalogConfig, LockKind};
use models::schema::spec::encode_type;
use models::schema::{
    FeatureType, FeatureTypeRef, CURRENT_SCHEMA_VERSION, MANAGED_USER_DATA, SHARING_PREFIX_KEY,
};
use models::utils::now_rfc3339;
use models::{SchemaId, MAX_SCHEMA_ID};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use trace::{debug, error, info, warn};

use crate::error::{MetaError, MetaResult};
use crate::index::IndexTableKind;
use crate::lock::{DistributedLock, LocalLock, LockGuard, StoreLock};
use crate::metadata::{
    CatalogMetadata, ATTRIBUTES_KEY, SCHEMA_ID_KEY, STATS_CONFIGURED_KEY, STATS_GENERATION_KEY,
    VERSION_KEY,
};
use crate::query::{QueryHints, QueryPlanner, TableResolver};
use crate::stats::{MetadataStatsEngine, StatsEngine, StatsSource, UsageStatsEngine};
use crate::store::key_path::KeyPath;
use crate::store::{create_batch_deleter, open_store, Authorizations, KeyValueStore};
use crate::version_check::VersionChecker;

pub mod compat;

/// Summary of a stored schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaDescription {
    pub name: String,
    pub spec: String,
    pub schema_version: Option<u32>,
    pub schema_id: Option<String>,
    pub table_sharing: bool,
    /// Index kind suffix -> physical table.
    pub tables: BTreeMap<String, String>,
    pub stats_date: Option<String>,
}

pub struct CatalogBuilder {
    config: CatalogConfig,
    store: Arc<dyn KeyValueStore>,
    lock: Option<Arc<dyn DistributedLock>>,
    stats: Option<Arc<dyn StatsEngine>>,
    usage: Option<Arc<dyn UsageStatsEngine>>,
    version_checker: Option<Arc<VersionChecker>>,
}

impl CatalogBuilder {
    pub fn new(config: CatalogConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            store,
            lock: None,
            stats: None,
            usage: None,
            version_checker: None,
        }
    }

    pub fn with_lock(mut self, lock: Arc<dyn DistributedLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn with_stats_engine(mut self, stats: Arc<dyn StatsEngine>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_usage_stats(mut self, usage: Arc<dyn UsageStatsEngine>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_version_checker(mut self, checker: Arc<VersionChecker>) -> Self {
        self.version_checker = Some(checker);
        self
    }

    /// Creates the catalog and stats tables when they are missing.
    pub async fn build(self) -> MetaResult<SchemaCatalog> {
        let Self {
            config,
            store,
            lock,
            stats,
            usage,
            version_checker,
        } = self;

        let metadata = Arc::new(CatalogMetadata::new(store.clone(), &config.catalog));
        metadata.ensure_table().await?;
        let stats_table = KeyPath::stats_table(&config.catalog);
        let stats_metadata = Arc::new(CatalogMetadata::new(store.clone(), &stats_table));
        stats_metadata.ensure_table().await?;

        let auths = Authorizations::new(config.query.authorizations.iter().cloned());
        let lock = lock.unwrap_or_else(|| default_lock(&config, store.clone()));
        let stats = stats.unwrap_or_else(|| {
            Arc::new(MetadataStatsEngine::new(
                store.clone(),
                stats_metadata.clone(),
                auths.clone(),
            ))
        });
        let version_checker = version_checker.unwrap_or_else(|| {
            Arc::new(VersionChecker::new(
                version::project_version(),
                config.version_check.interval,
            ))
        });

        info!("opened catalog {}", config.catalog);
        Ok(SchemaCatalog {
            lock_path: KeyPath::lock_path(&config.lock.path_prefix, &config.catalog),
            stats_table,
            config,
            store,
            lock,
            metadata,
            stats_metadata,
            stats,
            usage,
            version_checker,
            backfills: Arc::new(Mutex::new(HashSet::new())),
            auths,
        })
    }
}

fn default_lock(config: &CatalogConfig, store: Arc<dyn KeyValueStore>) -> Arc<dyn DistributedLock> {
    match config.lock.kind {
        LockKind::Local => Arc::new(LocalLock::new()),
        LockKind::Store => Arc::new(StoreLock::new(
            store,
            KeyPath::lock_table(&config.catalog, &config.lock.table),
            config.lock.ttl,
            config.lock.retry_interval,
        )),
    }
}

#[derive(Debug)]
pub struct SchemaCatalog {
    config: CatalogConfig,
    store: Arc<dyn KeyValueStore>,
    lock: Arc<dyn DistributedLock>,
    lock_path: String,
    metadata: Arc<CatalogMetadata>,
    stats_metadata: Arc<CatalogMetadata>,
    stats_table: String,
    stats: Arc<dyn StatsEngine>,
    usage: Option<Arc<dyn UsageStatsEngine>>,
    version_checker: Arc<VersionChecker>,
    /// Schemas with a stats backfill in flight.
    backfills: Arc<Mutex<HashSet<String>>>,
    auths: Authorizations,
}

impl SchemaCatalog {
    /// Opens the store named by `config.storage` and builds a catalog on it.
    pub async fn open(config: CatalogConfig) -> MetaResult<Self> {
        let store = open_store(&config.storage)?;
        CatalogBuilder::new(config, store).build().await
    }

    pub fn catalog(&self) -> &str {
        &self.config.catalog
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn metadata(&self) -> &CatalogMetadata {
        &self.metadata
    }

    pub fn stats_metadata(&self) -> &CatalogMetadata {
        &self.stats_metadata
    }

    pub fn version_checker(&self) -> &Arc<VersionChecker> {
        &self.version_checker
    }

    async fn acquire_lock(&self) -> MetaResult<LockGuard> {
        self.lock
            .acquire(&self.lock_path, self.config.lock.timeout)
            .await
    }

    fn not_initialized(&self, name: &str) -> MetaError {
        MetaError::NotInitialized {
            name: name.to_string(),
            catalog: self.catalog().to_string(),
        }
    }

    /// Names of every schema in either metadata layout.
    pub async fn list_schema_names(&self) -> MetaResult<Vec<String>> {
        let mut names = self.metadata.list_schema_names().await?;
        names.extend(self.metadata.legacy().list_schema_names().await?);
        Ok(names.into_iter().collect())
    }

    async fn schema_exists(&self, name: &str, cache: bool) -> MetaResult<bool> {
        Ok(self.metadata.read(name, ATTRIBUTES_KEY, cache).await?.is_some()
            || self
                .metadata
                .legacy()
                .read(name, ATTRIBUTES_KEY, cache)
                .await?
                .is_some())
    }

    /// Creates `ft` unless a schema of the same name exists. An existing
    /// schema is left untouched even if it differs from `ft`.
    pub async fn create_schema(&self, ft: &FeatureType) -> MetaResult<()> {
        if self.schema_exists(ft.name(), true).await? {
            debug!("schema {} already exists", ft.name());
            return Ok(());
        }

        let lock = self.acquire_lock().await?;
        let result = self.create_schema_locked(ft).await;
        lock.release().await;
        result
    }

    async fn create_schema_locked(&self, requested: &FeatureType) -> MetaResult<()> {
        let name = requested.name();
        if self.schema_exists(name, false).await? {
            debug!("schema {} was created by another client", name);
            return Ok(());
        }
        requested
            .validate()
            .map_err(|source| MetaError::Validation {
                name: name.to_string(),
                source,
            })?;

        let id = self.next_schema_id().await?;
        let mut ft = requested.clone();
        ft.set_schema_version(CURRENT_SCHEMA_VERSION);
        let sharing = ft.is_table_sharing();
        ft.set_table_sharing(sharing);
        if sharing {
            ft.set_table_sharing_prefix(id.to_string());
        } else {
            ft.remove_user_data(SHARING_PREFIX_KEY);
        }

        let mut entries = BTreeMap::new();
        entries.insert(ATTRIBUTES_KEY.to_string(), encode_type(&ft, true));
        for kind in IndexTableKind::all() {
            entries.insert(kind.metadata_key(), kind.format_table_name(self.catalog(), &ft));
        }
        entries.insert(STATS_GENERATION_KEY.to_string(), now_rfc3339());
        entries.insert(VERSION_KEY.to_string(), CURRENT_SCHEMA_VERSION.to_string());
        entries.insert(SCHEMA_ID_KEY.to_string(), id.to_string());
        self.metadata.insert_all(name, &entries).await?;

        for kind in IndexTableKind::applicable(&ft) {
            let table = kind.format_table_name(self.catalog(), &ft);
            if self.store.create_table_if_absent(&table).await? {
                debug!("created {} table {}", kind, table);
            }
            kind.configure_table(&ft, &table, self.store.as_ref()).await?;
        }

        if self.config.stats.generate_stats {
            self.stats
                .configure_combiner(self.store.as_ref(), &self.stats_table, &ft)
                .await?;
            self.metadata
                .insert(name, STATS_CONFIGURED_KEY, "true")
                .await?;
        }

        info!(
            "created schema {} with id {} in catalog {}",
            name,
            id,
            self.catalog()
        );
        Ok(())
    }

    /// Smallest id not used by any stored schema. Must run under the lock.
    async fn next_schema_id(&self) -> MetaResult<SchemaId> {
        let mut used = BTreeSet::new();
        for name in self.list_schema_names().await? {
            let id = match self.metadata.read(&name, SCHEMA_ID_KEY, false).await? {
                Some(id) => Some(id),
                None => {
                    self.metadata
                        .legacy()
                        .read(&name, SCHEMA_ID_KEY, false)
                        .await?
                }
            };
            if let Some(id) = id.and_then(|v| v.trim().parse::<SchemaId>().ok()) {
                used.insert(id);
            }
        }

        (0..=MAX_SCHEMA_ID)
            .find(|id| !used.contains(id))
            .ok_or_else(|| MetaError::SchemaIdExhausted {
                catalog: self.catalog().to_string(),
                max: MAX_SCHEMA_ID as usize + 1,
            })
    }

    /// The stored schema, migrating it out of the legacy layout on first
    /// access. `None` when no schema of that name exists.
    pub async fn get_schema(&self, name: &str) -> MetaResult<Option<FeatureTypeRef>> {
        let encoded = match self.read_encoded(name, None).await? {
            Some(encoded) => encoded,
            None => return Ok(None),
        };

        self.version_checker.check(self.store.as_ref()).await;

        let ft = compat::resolve_schema(name, &encoded, &self.metadata).await?;
        if self.config.stats.generate_stats {
            self.ensure_stats(&ft).await?;
        }
        Ok(Some(Arc::new(ft)))
    }

    /// Reads the encoded schema, migrating a legacy only schema first. Pass
    /// the held guard when the caller already holds the catalog lock.
    async fn read_encoded(
        &self,
        name: &str,
        held: Option<&LockGuard>,
    ) -> MetaResult<Option<String>> {
        if let Some(encoded) = self.metadata.read(name, ATTRIBUTES_KEY, true).await? {
            return Ok(Some(encoded));
        }
        // absent entries are cached too, never trust them here
        if let Some(encoded) = self.metadata.read(name, ATTRIBUTES_KEY, false).await? {
            return Ok(Some(encoded));
        }
        if self
            .metadata
            .legacy()
            .read(name, ATTRIBUTES_KEY, false)
            .await?
            .is_none()
        {
            return Ok(None);
        }

        match held {
            Some(lock) => self.migrate_locked(name, lock).await?,
            None => {
                let lock = self.acquire_lock().await?;
                let result = self.migrate_locked(name, &lock).await;
                lock.release().await;
                result?
            }
        }
        self.metadata.read(name, ATTRIBUTES_KEY, false).await
    }

    async fn migrate_locked(&self, name: &str, _lock: &LockGuard) -> MetaResult<()> {
        if self.metadata.read(name, ATTRIBUTES_KEY, false).await?.is_some() {
            debug!("schema {} was migrated by another client", name);
            return Ok(());
        }
        if self.metadata.migrate(name).await? {
            info!("migrated schema {} to the current metadata layout", name);
        }
        self.stats_metadata.migrate(name).await?;
        Ok(())
    }

    async fn load_schema(
        &self,
        name: &str,
        held: Option<&LockGuard>,
    ) -> MetaResult<Option<FeatureType>> {
        match self.read_encoded(name, held).await? {
            Some(encoded) => Ok(Some(
                compat::resolve_schema(name, &encoded, &self.metadata).await?,
            )),
            None => Ok(None),
        }
    }

    /// Schemas created before stats were kept get their combiner configured
    /// once and their stats generated in the background.
    async fn ensure_stats(&self, ft: &FeatureType) -> MetaResult<()> {
        let name = ft.name();
        if self
            .metadata
            .read(name, STATS_GENERATION_KEY, true)
            .await?
            .is_some()
            || self
                .metadata
                .read(name, STATS_GENERATION_KEY, false)
                .await?
                .is_some()
        {
            return Ok(());
        }

        if !self.is_stats_configured(name, true).await? {
            let lock = self.acquire_lock().await?;
            let result = self.configure_stats_locked(ft).await;
            lock.release().await;
            result?;
        }

        self.spawn_stats_backfill(ft).await
    }

    async fn is_stats_configured(&self, name: &str, cache: bool) -> MetaResult<bool> {
        Ok(self
            .metadata
            .read(name, STATS_CONFIGURED_KEY, cache)
            .await?
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false))
    }

    async fn configure_stats_locked(&self, ft: &FeatureType) -> MetaResult<()> {
        if self.is_stats_configured(ft.name(), false).await? {
            return Ok(());
        }
        self.stats
            .configure_combiner(self.store.as_ref(), &self.stats_table, ft)
            .await?;
        self.metadata
            .insert(ft.name(), STATS_CONFIGURED_KEY, "true")
            .await?;
        info!("configured stats combiner of existing schema {}", ft.name());
        Ok(())
    }

    /// Runs at most one backfill per schema in this process. Other clients
    /// may run their own, generating the same stats twice is harmless.
    async fn spawn_stats_backfill(&self, ft: &FeatureType) -> MetaResult<()> {
        let source = self.stats_source(ft).await?;
        if !self.backfills.lock().insert(ft.name().to_string()) {
            return Ok(());
        }

        let stats = self.stats.clone();
        let metadata = self.metadata.clone();
        let backfills = self.backfills.clone();
        let ft = ft.clone();
        tokio::spawn(async move {
            match stats.generate_stats(&ft, &source).await {
                Ok(count) => {
                    match metadata
                        .insert(ft.name(), STATS_GENERATION_KEY, &now_rfc3339())
                        .await
                    {
                        Ok(()) => info!(
                            "backfilled stats of {}: {} records",
                            ft.name(),
                            count
                        ),
                        Err(err) => error!("failed to mark stats of {}: {}", ft.name(), err),
                    }
                }
                Err(err) => error!("failed to generate stats of {}: {}", ft.name(), err),
            }
            backfills.lock().remove(ft.name());
        });
        Ok(())
    }

    async fn stats_source(&self, ft: &FeatureType) -> MetaResult<StatsSource> {
        Ok(StatsSource {
            table: self.resolve_table_name(ft, IndexTableKind::Records).await?,
            prefix: IndexTableKind::Records.row_prefix(ft),
        })
    }

    /// Replaces the free form user data of the stored schema. Managed keys
    /// missing from `ft` keep their stored values, and managed keys that are
    /// present must not change.
    pub async fn update_schema(&self, name: &str, ft: &FeatureType) -> MetaResult<()> {
        if ft.name() != name {
            return Err(MetaError::ImmutableField {
                name: name.to_string(),
                field: "name".to_string(),
            });
        }
        let existing = self
            .get_schema(name)
            .await?
            .ok_or_else(|| self.not_initialized(name))?;
        let merged = merge_user_data(&existing, ft);
        check_immutable(&existing, &merged)?;
        merged.validate().map_err(|source| MetaError::Validation {
            name: name.to_string(),
            source,
        })?;

        self.metadata
            .insert(name, ATTRIBUTES_KEY, &encode_type(&merged, true))
            .await?;
        info!("updated schema {}", name);
        Ok(())
    }

    /// Removes the schema, its rows or tables, its stats and finally its
    /// metadata. A failure leaves the metadata in place so the removal can
    /// be retried.
    pub async fn remove_schema(&self, name: &str) -> MetaResult<()> {
        let lock = self.acquire_lock().await?;
        let result = self.remove_schema_locked(name, &lock).await;
        lock.release().await;
        result
    }

    async fn remove_schema_locked(&self, name: &str, lock: &LockGuard) -> MetaResult<()> {
        let ft = self
            .load_schema(name, Some(lock))
            .await?
            .ok_or_else(|| self.not_initialized(name))?;

        if ft.is_table_sharing() && self.has_other_sharing_schema(name, lock).await? {
            self.delete_shared_rows(&ft).await?;
        } else {
            self.delete_standalone_tables(&ft).await?;
        }

        self.stats.clear_stats(&ft).await?;
        self.metadata.delete(name).await?;
        info!("removed schema {} from catalog {}", name, self.catalog());
        Ok(())
    }

    async fn has_other_sharing_schema(&self, name: &str, lock: &LockGuard) -> MetaResult<bool> {
        for other in self.list_schema_names().await? {
            if other == name {
                continue;
            }
            match self.load_schema(&other, Some(lock)).await {
                Ok(Some(ft)) if ft.is_table_sharing() => return Ok(true),
                Ok(_) => {}
                Err(err) => {
                    // keep shared tables when a neighbour can not be read
                    warn!("unable to read schema {}: {}", other, err);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn delete_shared_rows(&self, ft: &FeatureType) -> MetaResult<()> {
        for kind in IndexTableKind::applicable(ft) {
            let table = self.resolve_table_name(ft, kind).await?;
            if !self.store.table_exists(&table).await? {
                continue;
            }
            if kind.is_shareable() {
                let deleter = create_batch_deleter(
                    self.store.clone(),
                    &table,
                    self.auths.clone(),
                    self.config.query.write_threads,
                );
                let deleted = kind.delete_features_for_type(ft, deleter).await?;
                debug!("deleted {} rows of {} from {}", deleted, ft.name(), table);
            } else {
                self.store.delete_table(&table).await?;
                debug!("deleted table {}", table);
            }
        }
        Ok(())
    }

    async fn delete_standalone_tables(&self, ft: &FeatureType) -> MetaResult<()> {
        for table in self.schema_tables(ft).await? {
            if self.store.table_exists(&table).await? {
                self.store.delete_table(&table).await?;
                debug!("deleted table {}", table);
            }
        }
        Ok(())
    }

    /// Stored table name of `kind`, falling back to the computed name for
    /// schemas that predate per-kind table names.
    async fn resolve_table_name(&self, ft: &FeatureType, kind: IndexTableKind) -> MetaResult<String> {
        match self
            .metadata
            .read(ft.name(), &kind.metadata_key(), true)
            .await?
        {
            Some(table) => Ok(table),
            None => Ok(kind.format_table_name(self.catalog(), ft)),
        }
    }

    async fn schema_tables(&self, ft: &FeatureType) -> MetaResult<BTreeSet<String>> {
        let mut tables = BTreeSet::new();
        for kind in IndexTableKind::applicable(ft) {
            tables.insert(self.resolve_table_name(ft, kind).await?);
        }
        Ok(tables)
    }

    /// Physical tables owned by the schema.
    pub async fn get_table_names(&self, name: &str) -> MetaResult<BTreeSet<String>> {
        let ft = self
            .get_schema(name)
            .await?
            .ok_or_else(|| self.not_initialized(name))?;
        self.schema_tables(&ft).await
    }

    pub async fn table_name(&self, name: &str, kind: IndexTableKind) -> MetaResult<String> {
        let key = kind.metadata_key();
        if let Some(table) = self.metadata.read(name, &key, true).await? {
            return Ok(table);
        }
        if let Some(table) = self.metadata.legacy().read(name, &key, true).await? {
            return Ok(table);
        }
        if !self.schema_exists(name, false).await? {
            return Err(self.not_initialized(name));
        }
        Err(MetaError::MissingMetadata {
            name: name.to_string(),
            key,
        })
    }

    /// Like [`SchemaCatalog::table_name`] with the kind given by its name.
    pub async fn get_table_name(&self, name: &str, kind: &str) -> MetaResult<String> {
        let kind = kind.parse::<IndexTableKind>()?;
        self.table_name(name, kind).await
    }

    /// Record lookups are point reads that do not profit from many threads.
    pub fn get_suggested_threads(&self, _schema: &str, kind: IndexTableKind) -> usize {
        match kind {
            IndexTableKind::Records => self.config.query.record_threads,
            _ => self.config.query.query_threads,
        }
    }

    pub async fn describe_schema(&self, name: &str) -> MetaResult<Option<SchemaDescription>> {
        let ft = match self.get_schema(name).await? {
            Some(ft) => ft,
            None => return Ok(None),
        };

        let mut tables = BTreeMap::new();
        for kind in IndexTableKind::applicable(&ft) {
            tables.insert(
                kind.suffix().to_string(),
                self.resolve_table_name(&ft, kind).await?,
            );
        }
        Ok(Some(SchemaDescription {
            name: ft.name().to_string(),
            spec: encode_type(&ft, true),
            schema_version: ft.schema_version(),
            schema_id: self.metadata.read(name, SCHEMA_ID_KEY, true).await?,
            table_sharing: ft.is_table_sharing(),
            tables,
            stats_date: self
                .metadata
                .read(name, STATS_GENERATION_KEY, false)
                .await?,
        }))
    }

    pub fn query_hints(&self) -> QueryHints {
        let usage = if self.config.stats.collect_usage_stats {
            self.usage.clone()
        } else {
            None
        };
        QueryHints {
            timeout: self.config.query.query_timeout,
            authorizations: self.auths.clone(),
            usage,
        }
    }

    /// Hands the resolved schema, with this catalog as table resolver, to
    /// `planner`.
    pub async fn plan_query<P: QueryPlanner>(&self, name: &str, planner: &P) -> MetaResult<P::Plan> {
        let ft = self
            .get_schema(name)
            .await?
            .ok_or_else(|| self.not_initialized(name))?;
        let hints = self.query_hints();
        planner.plan(&ft, self, &hints).await
    }

    /// Deletes every table of the catalog. The catalog can not be used
    /// afterwards.
    pub async fn delete_catalog(&self) -> MetaResult<()> {
        let lock = self.acquire_lock().await?;
        let result = self.delete_catalog_locked(&lock).await;
        lock.release().await;
        result
    }

    async fn delete_catalog_locked(&self, lock: &LockGuard) -> MetaResult<()> {
        let mut tables = BTreeSet::new();
        for name in self.list_schema_names().await? {
            match self.load_schema(&name, Some(lock)).await {
                Ok(Some(ft)) => tables.extend(self.schema_tables(&ft).await?),
                Ok(None) => {}
                Err(err) => warn!("unable to resolve tables of schema {}: {}", name, err),
            }
        }

        // tables of schemas that could not be decoded still carry the prefix
        let prefix = format!("{}_", self.catalog());
        let lock_table = KeyPath::lock_table(self.catalog(), &self.config.lock.table);
        for table in self.store.list_tables().await? {
            if table.starts_with(&prefix) && table != lock_table && table != self.stats_table {
                tables.insert(table);
            }
        }

        for table in tables.iter().chain([&self.stats_table]) {
            if self.store.table_exists(table).await? {
                self.store.delete_table(table).await?;
            }
        }
        if self.store.table_exists(self.catalog()).await? {
            self.store.delete_table(self.catalog()).await?;
        }
        self.metadata.expire_cache();
        self.stats_metadata.expire_cache();
        info!("deleted catalog {} and {} tables", self.catalog(), tables.len() + 1);
        Ok(())
    }

    pub async fn close(&self) -> MetaResult<()> {
        self.stats.close().await
    }
}

/// The stored schema with its free form user data replaced by that of
/// `updated`. Managed keys set on `updated` override the stored ones so that
/// `check_immutable` sees them.
fn merge_user_data(existing: &FeatureType, updated: &FeatureType) -> FeatureType {
    let mut merged = FeatureType::new(existing.name(), updated.attributes().to_vec());
    for (key, value) in existing.user_data() {
        if MANAGED_USER_DATA.contains(&key.as_str()) {
            merged.set_user_data(key.clone(), value.clone());
        }
    }
    for (key, value) in updated.user_data() {
        merged.set_user_data(key.clone(), value.clone());
    }
    merged
}

fn check_immutable(existing: &FeatureType, updated: &FeatureType) -> MetaResult<()> {
    let changes = [
        ("attributes", existing.attributes() != updated.attributes()),
        (
            "schema version",
            existing.schema_version() != updated.schema_version(),
        ),
        (
            "table sharing",
            existing.is_table_sharing() != updated.is_table_sharing(),
        ),
        (
            "table sharing prefix",
            existing.table_sharing_prefix() != updated.table_sharing_prefix(),
        ),
        ("default date field", existing.dtg_field() != updated.dtg_field()),
        (
            "spatio-temporal index schema",
            existing.st_index_schema() != updated.st_index_schema(),
        ),
        (
            "enabled indices",
            existing.enabled_indices() != updated.enabled_indices(),
        ),
    ];
    match changes.iter().find(|(_, changed)| *changed) {
        Some((field, _)) => Err(MetaError::ImmutableField {
            name: existing.name().to_string(),
            field: field.to_string(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl TableResolver for SchemaCatalog {
    async fn table_name(&self, schema: &str, kind: IndexTableKind) -> MetaResult<String> {
        SchemaCatalog::table_name(self, schema, kind).await
    }

    fn suggested_threads(&self, schema: &str, kind: IndexTableKind) -> usize {
        self.get_suggested_threads(schema, kind)
    }
}

#[cfg(test)]
mod test {
    use models::gis::data_type::GeometryType;
    use models::schema::{AttributeDescriptor, AttributeType, FeatureType};

    use super::{check_immutable, merge_user_data};
    use crate::error::MetaError;

    fn trips() -> FeatureType {
        let mut ft = FeatureType::new(
            "trips",
            vec![
                AttributeDescriptor::new("id", AttributeType::String),
                AttributeDescriptor::new_geometry("geom", GeometryType::Point, 4326).as_default(),
                AttributeDescriptor::new("dtg", AttributeType::Date),
            ],
        );
        ft.set_schema_version(10);
        ft.set_table_sharing(true);
        ft.set_table_sharing_prefix("0");
        ft
    }

    #[test]
    fn test_check_immutable() {
        let existing = trips();

        let mut keywords = trips();
        keywords.add_keywords(&["taxi"]);
        assert!(check_immutable(&existing, &keywords).is_ok());

        let mut sharing = trips();
        sharing.set_table_sharing(false);
        let err = check_immutable(&existing, &sharing).unwrap_err();
        assert!(matches!(err, MetaError::ImmutableField { ref field, .. } if field == "table sharing"));

        let mut attrs = trips().attributes().to_vec();
        attrs.push(AttributeDescriptor::new("extra", AttributeType::Long));
        let mut added = FeatureType::new("trips", attrs);
        for (k, v) in trips().user_data() {
            added.set_user_data(k.clone(), v.clone());
        }
        assert!(check_immutable(&existing, &added).is_err());

        let mut dtg = trips();
        dtg.set_dtg_field("other");
        assert!(check_immutable(&existing, &dtg).is_err());

        let mut unversioned = trips();
        unversioned.remove_user_data("geomesa.version");
        let err = check_immutable(&existing, &unversioned).unwrap_err();
        assert!(matches!(err, MetaError::ImmutableField { ref field, .. } if field == "schema version"));
    }

    #[test]
    fn test_merge_user_data() {
        let mut existing = trips();
        existing.add_keywords(&["old"]);
        existing.set_user_data("note", "stale");

        let mut fresh = FeatureType::new("trips", trips().attributes().to_vec());
        fresh.add_keywords(&["taxi"]);
        let merged = merge_user_data(&existing, &fresh);
        assert!(check_immutable(&existing, &merged).is_ok());
        assert_eq!(merged.schema_version(), Some(10));
        assert!(merged.is_table_sharing());
        assert_eq!(merged.table_sharing_prefix(), Some("0"));
        assert_eq!(merged.keywords(), vec!["taxi".to_string()]);
        assert_eq!(merged.user_data_value("note"), None);

        let mut older = fresh.clone();
        older.set_schema_version(9);
        let merged = merge_user_data(&existing, &older);
        let err = check_immutable(&existing, &merged).unwrap_err();
        assert!(matches!(err, MetaError::ImmutableField { ref field, .. } if field == "schema version"));
    }
}
