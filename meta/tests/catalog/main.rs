use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use config::{CatalogConfig, LockKind, StorageBackend};
use meta::index::IndexTableKind;
use meta::lock::{DistributedLock, LocalLock, StoreLock};
use meta::metadata::legacy::encode_legacy_row;
use meta::metadata::{ATTRIBUTES_KEY, SCHEMA_ID_KEY, STATS_GENERATION_KEY};
use meta::query::{QueryHints, QueryPlanner, TableResolver};
use meta::stats::UsageStatsEngine;
use meta::store::key_path::KeyPath;
use meta::store::{KeyValueStore, MemoryStore, Mutation};
use meta::version_check::VersionChecker;
use meta::{CatalogBuilder, MetaError, MetaResult, SchemaCatalog};
use models::gis::data_type::GeometryType;
use models::schema::{AttributeDescriptor, AttributeType, FeatureType, CURRENT_SCHEMA_VERSION};

fn test_config() -> CatalogConfig {
    let mut config = CatalogConfig::default();
    config.lock.kind = LockKind::Local;
    config.lock.timeout = Duration::from_secs(10);
    config.storage.backend = StorageBackend::Memory;
    config
}

async fn new_catalog(store: Arc<MemoryStore>) -> SchemaCatalog {
    CatalogBuilder::new(test_config(), store).build().await.unwrap()
}

fn points(name: &str, sharing: bool) -> FeatureType {
    let mut ft = FeatureType::new(
        name,
        vec![
            AttributeDescriptor::new("id", AttributeType::String),
            AttributeDescriptor::new_geometry("geom", GeometryType::Point, 4326).as_default(),
        ],
    );
    ft.set_table_sharing(sharing);
    ft
}

fn tracks(name: &str) -> FeatureType {
    let mut ft = FeatureType::new(
        name,
        vec![
            AttributeDescriptor::new("id", AttributeType::String),
            AttributeDescriptor::new("dtg", AttributeType::Date),
            AttributeDescriptor::new_geometry("geom", GeometryType::Point, 4326).as_default(),
        ],
    );
    ft.set_table_sharing(true);
    ft
}

fn names_only(name: &str) -> FeatureType {
    let mut ft = FeatureType::new(
        name,
        vec![AttributeDescriptor::new("name", AttributeType::String)],
    );
    ft.set_table_sharing(true);
    ft
}

async fn schema_id(catalog: &SchemaCatalog, name: &str) -> u8 {
    catalog
        .metadata()
        .read(name, SCHEMA_ID_KEY, false)
        .await
        .unwrap()
        .unwrap()
        .parse()
        .unwrap()
}

async fn seed_legacy(store: &MemoryStore, table: &str, schema: &str, entries: &[(&str, &str)]) {
    let entries: BTreeMap<String, String> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    store
        .write(
            table,
            vec![Mutation::put(
                KeyPath::legacy_row(schema),
                encode_legacy_row(&entries).unwrap(),
            )],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_and_get_trips() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;

    catalog.create_schema(&points("trips", false)).await.unwrap();

    let ft = catalog.get_schema("trips").await.unwrap().unwrap();
    assert_eq!(ft.attributes().len(), 2);
    assert_eq!(ft.schema_version(), Some(CURRENT_SCHEMA_VERSION));
    assert!(!ft.is_table_sharing());
    assert_eq!(ft.table_sharing_prefix(), None);

    for kind in [IndexTableKind::Records, IndexTableKind::Z2] {
        let table = catalog.table_name("trips", kind).await.unwrap();
        assert!(!table.is_empty());
        assert!(store.table_exists(&table).await.unwrap());
    }
    assert_eq!(
        catalog.get_table_name("trips", "records").await.unwrap(),
        "geomesa_trips_records"
    );
    assert_eq!(
        catalog.get_table_names("trips").await.unwrap(),
        BTreeSet::from([
            "geomesa_trips_records".to_string(),
            "geomesa_trips_z2".to_string()
        ])
    );
    assert_eq!(catalog.list_schema_names().await.unwrap(), vec!["trips"]);
    assert!(catalog.get_schema("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;

    catalog.create_schema(&points("trips", false)).await.unwrap();
    let rows = store.row_count("geomesa");

    // a differing definition under the same name is ignored
    catalog.create_schema(&names_only("trips")).await.unwrap();
    assert_eq!(store.row_count("geomesa"), rows);
    let ft = catalog.get_schema("trips").await.unwrap().unwrap();
    assert_eq!(ft.attributes().len(), 2);
}

#[tokio::test]
async fn test_reserved_separator_rejected() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;

    let err = catalog
        .create_schema(&points("a~b", true))
        .await
        .unwrap_err();
    assert!(matches!(err, MetaError::Validation { .. }));
    assert_eq!(store.row_count("geomesa"), 0);
    assert!(catalog.list_schema_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shared_tables_removal() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;

    catalog.create_schema(&points("a", true)).await.unwrap();
    catalog.create_schema(&points("b", true)).await.unwrap();

    let a = schema_id(&catalog, "a").await;
    let b = schema_id(&catalog, "b").await;
    assert_ne!(a, b);
    assert!(a <= 1 && b <= 1);
    assert_eq!(
        catalog.table_name("a", IndexTableKind::Records).await.unwrap(),
        "geomesa_records"
    );

    for table in ["geomesa_records", "geomesa_z2"] {
        store
            .write(
                table,
                vec![
                    Mutation::put(vec![a, 1], "a1"),
                    Mutation::put(vec![a, 2], "a2"),
                    Mutation::put(vec![b, 1], "b1"),
                ],
            )
            .await
            .unwrap();
    }

    catalog.remove_schema("a").await.unwrap();

    assert!(catalog.get_schema("a").await.unwrap().is_none());
    assert!(catalog.get_schema("b").await.unwrap().is_some());
    for table in ["geomesa_records", "geomesa_z2"] {
        assert!(store.table_exists(table).await.unwrap());
        assert_eq!(store.row_count(table), 1);
    }

    // the last sharing schema owns the shared tables outright
    catalog.remove_schema("b").await.unwrap();
    assert!(!store.table_exists("geomesa_records").await.unwrap());
    assert!(!store.table_exists("geomesa_z2").await.unwrap());
}

#[tokio::test]
async fn test_shared_removal_drops_own_z3_table() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;

    catalog.create_schema(&tracks("a")).await.unwrap();
    catalog.create_schema(&tracks("b")).await.unwrap();
    assert_eq!(
        catalog.table_name("a", IndexTableKind::Z3).await.unwrap(),
        "geomesa_a_z3"
    );
    assert!(store.table_exists("geomesa_a_z3").await.unwrap());
    assert!(store.table_exists("geomesa_b_z3").await.unwrap());

    let a = schema_id(&catalog, "a").await;
    let b = schema_id(&catalog, "b").await;
    for table in ["geomesa_records", "geomesa_z2"] {
        store
            .write(
                table,
                vec![Mutation::put(vec![a, 1], "a1"), Mutation::put(vec![b, 1], "b1")],
            )
            .await
            .unwrap();
    }
    store
        .write("geomesa_b_z3", vec![Mutation::put(vec![0, 1], "b1")])
        .await
        .unwrap();

    catalog.remove_schema("a").await.unwrap();

    assert!(!store.table_exists("geomesa_a_z3").await.unwrap());
    assert!(store.table_exists("geomesa_b_z3").await.unwrap());
    assert_eq!(store.row_count("geomesa_b_z3"), 1);
    for table in ["geomesa_records", "geomesa_z2"] {
        assert!(store.table_exists(table).await.unwrap());
        assert_eq!(store.row_count(table), 1);
    }
    assert!(catalog.get_schema("b").await.unwrap().is_some());
}

#[tokio::test]
async fn test_standalone_removal() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;

    catalog.create_schema(&points("trips", false)).await.unwrap();
    catalog.create_schema(&points("shared", true)).await.unwrap();
    catalog.remove_schema("trips").await.unwrap();

    let tables = store.list_tables().await.unwrap();
    assert!(tables.iter().all(|t| !t.contains("trips")));
    assert!(tables.contains(&"geomesa_records".to_string()));
    assert!(catalog.metadata().read_all("trips").await.unwrap().is_empty());

    let err = catalog.remove_schema("trips").await.unwrap_err();
    assert!(matches!(err, MetaError::NotInitialized { .. }));
}

#[tokio::test]
async fn test_update_immutable_fields() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;
    catalog.create_schema(&points("trips", true)).await.unwrap();
    let stored = catalog
        .metadata()
        .read("trips", ATTRIBUTES_KEY, false)
        .await
        .unwrap();

    let existing = catalog.get_schema("trips").await.unwrap().unwrap();

    let mut changed = (*existing).clone();
    changed.set_schema_version(9);
    let err = catalog.update_schema("trips", &changed).await.unwrap_err();
    assert!(matches!(err, MetaError::ImmutableField { .. }));

    let mut changed = (*existing).clone();
    changed.set_table_sharing(false);
    assert!(catalog.update_schema("trips", &changed).await.is_err());

    let mut changed = (*existing).clone();
    changed.set_enabled_indices(&["z2".to_string()]);
    assert!(catalog.update_schema("trips", &changed).await.is_err());

    let renamed = FeatureType::new("other", existing.attributes().to_vec());
    assert!(catalog.update_schema("trips", &renamed).await.is_err());
    assert_eq!(
        catalog
            .metadata()
            .read("trips", ATTRIBUTES_KEY, false)
            .await
            .unwrap(),
        stored
    );

    let mut keywords = (*existing).clone();
    keywords.add_keywords(&["taxi"]);
    catalog.update_schema("trips", &keywords).await.unwrap();
    let ft = catalog.get_schema("trips").await.unwrap().unwrap();
    assert_eq!(ft.keywords(), vec!["taxi".to_string()]);

    let err = catalog
        .update_schema("missing", &points("missing", true))
        .await
        .unwrap_err();
    assert!(matches!(err, MetaError::NotInitialized { .. }));
}

#[tokio::test]
async fn test_update_keywords_keeps_managed_user_data() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;
    catalog.create_schema(&points("trips", false)).await.unwrap();
    let existing = catalog.get_schema("trips").await.unwrap().unwrap();
    assert!(!existing.is_table_sharing());

    let mut fresh = FeatureType::new("trips", existing.attributes().to_vec());
    fresh.add_keywords(&["taxi"]);
    catalog.update_schema("trips", &fresh).await.unwrap();

    let ft = catalog.get_schema("trips").await.unwrap().unwrap();
    assert!(!ft.is_table_sharing());
    assert_eq!(ft.table_sharing_prefix(), None);
    assert_eq!(ft.schema_version(), Some(CURRENT_SCHEMA_VERSION));
    assert_eq!(ft.keywords(), vec!["taxi".to_string()]);
    assert_eq!(
        catalog.table_name("trips", IndexTableKind::Records).await.unwrap(),
        "geomesa_trips_records"
    );
}

#[tokio::test]
async fn test_spec_delimiters_rejected_on_create() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;

    let ft = FeatureType::new(
        "delims",
        vec![
            AttributeDescriptor::new("a,b", AttributeType::String),
            AttributeDescriptor::new_geometry("geom", GeometryType::Point, 4326).as_default(),
        ],
    );
    let err = catalog.create_schema(&ft).await.unwrap_err();
    assert!(matches!(err, MetaError::Validation { .. }));
    assert!(catalog.metadata().read_all("delims").await.unwrap().is_empty());
    assert!(catalog.list_schema_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_newer_schema_version_is_fatal() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;
    catalog
        .metadata()
        .insert("future", ATTRIBUTES_KEY, "name:String;geomesa.version='11'")
        .await
        .unwrap();

    let err = catalog.get_schema("future").await.unwrap_err();
    assert!(matches!(
        err,
        MetaError::IncompatibleSchemaVersion { found: 11, .. }
    ));
}

#[tokio::test]
async fn test_legacy_schema_migration() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;
    seed_legacy(
        &store,
        "geomesa",
        "old",
        &[
            (ATTRIBUTES_KEY, "name:String,*geom:Point:srid=4326,dtg:Date"),
            ("version", "2"),
            ("dtgfield", "dtg"),
        ],
    )
    .await;
    seed_legacy(&store, "geomesa_stats", "old", &[("stats-count", "5")]).await;
    assert_eq!(catalog.list_schema_names().await.unwrap(), vec!["old"]);

    let ft = catalog.get_schema("old").await.unwrap().unwrap();
    assert_eq!(ft.schema_version(), Some(2));
    assert_eq!(ft.dtg_field(), Some("dtg"));
    assert!(ft.is_table_sharing());
    assert_eq!(ft.table_sharing_prefix(), Some("old~"));

    assert!(catalog
        .metadata()
        .legacy()
        .list_schema_names()
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        catalog
            .stats_metadata()
            .read("old", "stats-count", false)
            .await
            .unwrap(),
        Some("5".to_string())
    );

    // a second client finds the schema already migrated
    let other = new_catalog(store.clone()).await;
    assert_eq!(other.get_schema("old").await.unwrap().unwrap(), ft);
    assert_eq!(other.list_schema_names().await.unwrap(), vec!["old"]);

    let err = catalog.get_table_name("old", "z3").await.unwrap_err();
    assert!(matches!(err, MetaError::MissingMetadata { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_migration() {
    let store = Arc::new(MemoryStore::new());
    let catalog = Arc::new(new_catalog(store.clone()).await);
    seed_legacy(
        &store,
        "geomesa",
        "old",
        &[
            (ATTRIBUTES_KEY, "name:String;geomesa.version='10'"),
            ("id", "3"),
            (STATS_GENERATION_KEY, "2016-01-01T00:00:00.000Z"),
        ],
    )
    .await;

    let mut handles = vec![];
    for _ in 0..8 {
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move { catalog.get_schema("old").await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_some());
    }

    let entries = catalog.metadata().read_all("old").await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(catalog
        .metadata()
        .legacy()
        .read_all("old")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_stats_backfill_for_old_schema() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;
    catalog
        .metadata()
        .insert("old", ATTRIBUTES_KEY, "name:String;geomesa.version='9'")
        .await
        .unwrap();

    catalog.get_schema("old").await.unwrap().unwrap();

    let mut generated = None;
    for _ in 0..200 {
        generated = catalog
            .metadata()
            .read("old", STATS_GENERATION_KEY, false)
            .await
            .unwrap();
        if generated.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(generated.is_some());
    assert!(store
        .table_properties("geomesa_stats")
        .await
        .unwrap()
        .contains_key("table.iterator.majc.stats-combiner.opt.sft-old"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_unique_ids() {
    let store = Arc::new(MemoryStore::new());
    let catalog = Arc::new(new_catalog(store.clone()).await);

    let mut handles = vec![];
    for i in 0..16 {
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move {
            catalog.create_schema(&names_only(&format!("s{}", i))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut ids = BTreeSet::new();
    for name in catalog.list_schema_names().await.unwrap() {
        ids.insert(schema_id(&catalog, &name).await);
    }
    assert_eq!(ids, (0..16).collect::<BTreeSet<u8>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clients_exclude_each_other_through_store_lock() {
    let store = Arc::new(MemoryStore::new());
    let mut handles = vec![];
    for client in 0..2 {
        let mut config = test_config();
        config.lock.kind = LockKind::Store;
        config.lock.retry_interval = Duration::from_millis(2);
        let catalog = CatalogBuilder::new(config, store.clone())
            .build()
            .await
            .unwrap();
        handles.push(tokio::spawn(async move {
            for i in 0..5 {
                catalog
                    .create_schema(&names_only(&format!("c{}_{}", client, i)))
                    .await?;
            }
            Ok::<_, MetaError>(catalog)
        }));
    }

    let mut catalogs = vec![];
    for handle in handles {
        catalogs.push(handle.await.unwrap().unwrap());
    }
    let mut ids = BTreeSet::new();
    for name in catalogs[0].list_schema_names().await.unwrap() {
        ids.insert(schema_id(&catalogs[0], &name).await);
    }
    assert_eq!(ids.len(), 10);
    assert_eq!(store.row_count("geomesa_locks"), 0);
}

#[tokio::test]
async fn test_schema_ids_exhausted() {
    let store = Arc::new(MemoryStore::new());
    let mut config = test_config();
    config.stats.generate_stats = false;
    let catalog = CatalogBuilder::new(config, store.clone())
        .build()
        .await
        .unwrap();

    for i in 0..128 {
        catalog
            .create_schema(&names_only(&format!("s{}", i)))
            .await
            .unwrap();
    }
    let err = catalog
        .create_schema(&names_only("one_too_many"))
        .await
        .unwrap_err();
    assert!(matches!(err, MetaError::SchemaIdExhausted { max: 128, .. }));

    // removing a schema frees its id
    let freed = schema_id(&catalog, "s42").await;
    catalog.remove_schema("s42").await.unwrap();
    catalog
        .create_schema(&names_only("one_too_many"))
        .await
        .unwrap();
    assert_eq!(schema_id(&catalog, "one_too_many").await, freed);
}

#[tokio::test]
async fn test_lock_timeout_writes_nothing() {
    let log_dir = tempfile::tempdir().unwrap();
    trace::init_default_global_tracing(log_dir.path(), "catalog_test.log", "debug");

    let store = Arc::new(MemoryStore::new());
    let lock = Arc::new(LocalLock::new());
    let mut config = test_config();
    config.lock.timeout = Duration::from_millis(30);
    let catalog = CatalogBuilder::new(config, store.clone())
        .with_lock(lock.clone())
        .build()
        .await
        .unwrap();

    let held = lock
        .acquire("/geometa/catalog/geomesa", Duration::from_secs(1))
        .await
        .unwrap();
    let err = catalog
        .create_schema(&points("trips", false))
        .await
        .unwrap_err();
    assert!(matches!(err, MetaError::LockTimeout { .. }));
    assert!(err.is_retryable());
    assert_eq!(store.row_count("geomesa"), 0);

    held.release().await;
    catalog.create_schema(&points("trips", false)).await.unwrap();
}

#[tokio::test]
async fn test_table_name_errors() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store).await;
    catalog.create_schema(&points("trips", false)).await.unwrap();

    assert!(matches!(
        catalog.get_table_name("trips", "geohash").await,
        Err(MetaError::UnknownIndexKind { .. })
    ));
    assert!(matches!(
        catalog.get_table_name("missing", "records").await,
        Err(MetaError::NotInitialized { .. })
    ));
    // every kind has a name stored, applicable or not
    assert_eq!(
        catalog.get_table_name("trips", "xz3").await.unwrap(),
        "geomesa_trips_xz3"
    );

    assert_eq!(
        catalog.get_suggested_threads("trips", IndexTableKind::Records),
        3
    );
    assert_eq!(catalog.get_suggested_threads("trips", IndexTableKind::Z3), 8);
}

#[tokio::test]
async fn test_version_check_per_catalog() {
    let store = Arc::new(MemoryStore::with_server_version("0.0.1"));
    let first = new_catalog(store.clone()).await;
    let second = new_catalog(store.clone()).await;
    first.create_schema(&points("trips", false)).await.unwrap();

    first.get_schema("trips").await.unwrap();
    first.get_schema("trips").await.unwrap();
    assert_eq!(store.version_requests(), 1);

    // schedules are not shared between catalogs
    second.get_schema("trips").await.unwrap();
    assert_eq!(store.version_requests(), 2);

    // a failing version query never fails the read
    store.set_server_version(None);
    let checker = Arc::new(VersionChecker::new("2.4.0", Duration::ZERO));
    let third = CatalogBuilder::new(test_config(), store.clone())
        .with_version_checker(checker)
        .build()
        .await
        .unwrap();
    assert!(third.get_schema("trips").await.unwrap().is_some());
    assert_eq!(store.version_requests(), 3);
}

#[derive(Debug, Default)]
struct CountingUsage {
    records: AtomicUsize,
}

impl UsageStatsEngine for CountingUsage {
    fn record_usage(&self, _schema: &str, _hints: &QueryHints) {
        self.records.fetch_add(1, Ordering::SeqCst);
    }
}

/// Resolves the tables a z2 scan would read.
struct Z2Planner;

#[derive(Debug)]
struct Z2Plan {
    table: String,
    threads: usize,
    timeout: Option<Duration>,
}

#[async_trait]
impl QueryPlanner for Z2Planner {
    type Plan = Z2Plan;

    async fn plan(
        &self,
        ft: &FeatureType,
        resolver: &dyn TableResolver,
        hints: &QueryHints,
    ) -> MetaResult<Z2Plan> {
        if let Some(usage) = &hints.usage {
            usage.record_usage(ft.name(), hints);
        }
        Ok(Z2Plan {
            table: resolver.table_name(ft.name(), IndexTableKind::Z2).await?,
            threads: resolver.suggested_threads(ft.name(), IndexTableKind::Z2),
            timeout: hints.timeout,
        })
    }
}

#[tokio::test]
async fn test_plan_query() {
    let store = Arc::new(MemoryStore::new());
    let usage = Arc::new(CountingUsage::default());
    let mut config = test_config();
    config.query.query_timeout = Some(Duration::from_secs(30));
    config.stats.collect_usage_stats = true;
    let catalog = CatalogBuilder::new(config, store)
        .with_usage_stats(usage.clone())
        .build()
        .await
        .unwrap();
    catalog.create_schema(&points("trips", true)).await.unwrap();

    let plan = catalog.plan_query("trips", &Z2Planner).await.unwrap();
    assert_eq!(plan.table, "geomesa_z2");
    assert_eq!(plan.threads, 8);
    assert_eq!(plan.timeout, Some(Duration::from_secs(30)));
    assert_eq!(usage.records.load(Ordering::SeqCst), 1);

    assert!(matches!(
        catalog.plan_query("missing", &Z2Planner).await,
        Err(MetaError::NotInitialized { .. })
    ));
}

#[tokio::test]
async fn test_describe_and_delete_catalog() {
    let store = Arc::new(MemoryStore::new());
    let catalog = new_catalog(store.clone()).await;
    catalog.create_schema(&points("trips", false)).await.unwrap();
    catalog.create_schema(&points("shared", true)).await.unwrap();

    let description = catalog.describe_schema("trips").await.unwrap().unwrap();
    assert_eq!(description.schema_id.as_deref(), Some("0"));
    assert!(!description.table_sharing);
    assert_eq!(
        description.tables.get("z2").map(|s| s.as_str()),
        Some("geomesa_trips_z2")
    );
    assert!(description.stats_date.is_some());
    assert!(catalog.describe_schema("missing").await.unwrap().is_none());

    catalog.delete_catalog().await.unwrap();
    assert!(store.list_tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sled_backed_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.lock.kind = LockKind::Store;
    config.storage.backend = StorageBackend::Sled;
    config.storage.path = dir.path().join("store").to_string_lossy().to_string();

    {
        let catalog = SchemaCatalog::open(config.clone()).await.unwrap();
        catalog.create_schema(&points("trips", true)).await.unwrap();
        catalog.close().await.unwrap();
    }

    let catalog = SchemaCatalog::open(config).await.unwrap();
    let ft = catalog.get_schema("trips").await.unwrap().unwrap();
    assert_eq!(ft.table_sharing_prefix(), Some("0"));
    assert_eq!(
        catalog.get_table_name("trips", "records").await.unwrap(),
        "geomesa_records"
    );
}

#[tokio::test]
async fn test_external_lock_holder_blocks_catalog() {
    let store = Arc::new(MemoryStore::new());
    let mut config = test_config();
    config.lock.kind = LockKind::Store;
    let catalog = CatalogBuilder::new(config, store.clone())
        .build()
        .await
        .unwrap();
    catalog.create_schema(&points("trips", false)).await.unwrap();
    assert!(store.table_exists("geomesa_locks").await.unwrap());

    // an external holder of the same lock row blocks the catalog
    let external = StoreLock::new(
        store.clone(),
        "geomesa_locks",
        Duration::from_secs(60),
        Duration::from_millis(5),
    );
    let held = external
        .acquire("/geometa/catalog/geomesa", Duration::from_secs(1))
        .await
        .unwrap();
    let mut blocked = test_config();
    blocked.lock.kind = LockKind::Store;
    blocked.lock.timeout = Duration::from_millis(30);
    let other = CatalogBuilder::new(blocked, store.clone())
        .build()
        .await
        .unwrap();
    assert!(matches!(
        other.remove_schema("trips").await,
        Err(MetaError::LockTimeout { .. })
    ));
    held.release().await;
    other.remove_schema("trips").await.unwrap();
}
