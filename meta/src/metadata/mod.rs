//! Per schema key/value metadata kept in the catalog table.
//!
//! The current layout stores one row per `(schema, key)`. Catalogs written
//! by old clients hold a single json row per schema instead, see
//! [`LegacyMetadata`]. [`CatalogMetadata::migrate`] moves a schema from the
//! legacy layout to the current one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use trace::{debug, info};

use crate::error::{MetaError, MetaResult};
use crate::store::key_path::KeyPath;
use crate::store::{Authorizations, KeyRange, KeyValueStore, Mutation};

pub mod legacy;

pub use legacy::LegacyMetadata;

pub const ATTRIBUTES_KEY: &str = "attributes";
pub const VERSION_KEY: &str = "version";
pub const SCHEMA_ID_KEY: &str = "id";
pub const STATS_GENERATION_KEY: &str = "stats-date";
pub const STATS_CONFIGURED_KEY: &str = "stats-configured";

// written by clients older than the versioned schema format
pub const DTG_FIELD_KEY: &str = "dtgfield";
pub const SHARED_TABLES_KEY: &str = "tables.sharing";
pub const TABLES_ENABLED_KEY: &str = "tables.enabled";
pub const ST_IDX_SCHEMA_KEY: &str = "schema";

/// Cached lookups, absent keys are cached too.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<(String, String), Option<String>>>,
}

impl MetadataCache {
    pub fn get(&self, schema: &str, key: &str) -> Option<Option<String>> {
        self.entries
            .read()
            .get(&(schema.to_string(), key.to_string()))
            .cloned()
    }

    pub fn put(&self, schema: &str, key: &str, value: Option<String>) {
        self.entries
            .write()
            .insert((schema.to_string(), key.to_string()), value);
    }

    pub fn invalidate(&self, schema: &str) {
        self.entries.write().retain(|(s, _), _| s != schema);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[derive(Debug)]
pub struct CatalogMetadata {
    store: Arc<dyn KeyValueStore>,
    table: String,
    auths: Authorizations,
    cache: MetadataCache,
    legacy: LegacyMetadata,
}

impl CatalogMetadata {
    pub fn new(store: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            legacy: LegacyMetadata::new(store.clone(), table.clone()),
            store,
            table,
            auths: Authorizations::empty(),
            cache: MetadataCache::default(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn legacy(&self) -> &LegacyMetadata {
        &self.legacy
    }

    pub async fn ensure_table(&self) -> MetaResult<()> {
        if self.store.create_table_if_absent(&self.table).await? {
            info!("created metadata table {}", self.table);
        }
        Ok(())
    }

    pub async fn read(&self, schema: &str, key: &str, cache: bool) -> MetaResult<Option<String>> {
        if cache {
            if let Some(value) = self.cache.get(schema, key) {
                return Ok(value);
            }
        }

        let value = self
            .store
            .get(&self.table, &KeyPath::metadata_row(schema, key), &self.auths)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).to_string());
        self.cache.put(schema, key, value.clone());
        Ok(value)
    }

    pub async fn read_required(&self, schema: &str, key: &str) -> MetaResult<String> {
        self.read(schema, key, true)
            .await?
            .ok_or_else(|| MetaError::MissingMetadata {
                name: schema.to_string(),
                key: key.to_string(),
            })
    }

    pub async fn read_all(&self, schema: &str) -> MetaResult<BTreeMap<String, String>> {
        let rows = self
            .store
            .scan(
                &self.table,
                &KeyRange::prefix(KeyPath::metadata_prefix(schema)),
                &self.auths,
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|kv| {
                let (_, key) = KeyPath::split_metadata_row(&kv.key)?;
                Some((key, String::from_utf8_lossy(&kv.value).to_string()))
            })
            .collect())
    }

    pub async fn insert(&self, schema: &str, key: &str, value: &str) -> MetaResult<()> {
        self.store
            .write(
                &self.table,
                vec![Mutation::put(KeyPath::metadata_row(schema, key), value)],
            )
            .await?;
        self.cache.put(schema, key, Some(value.to_string()));
        Ok(())
    }

    /// Writes every entry in one batch.
    pub async fn insert_all(
        &self,
        schema: &str,
        entries: &BTreeMap<String, String>,
    ) -> MetaResult<()> {
        let mutations = entries
            .iter()
            .map(|(k, v)| Mutation::put(KeyPath::metadata_row(schema, k), v.as_str()))
            .collect();
        self.store.write(&self.table, mutations).await?;
        for (k, v) in entries {
            self.cache.put(schema, k, Some(v.clone()));
        }
        Ok(())
    }

    pub async fn remove(&self, schema: &str, key: &str) -> MetaResult<()> {
        self.store
            .write(
                &self.table,
                vec![Mutation::delete(KeyPath::metadata_row(schema, key))],
            )
            .await?;
        self.cache.put(schema, key, None);
        Ok(())
    }

    /// Removes every current layout row of `schema`.
    pub async fn delete(&self, schema: &str) -> MetaResult<()> {
        let rows = self
            .store
            .scan(
                &self.table,
                &KeyRange::prefix(KeyPath::metadata_prefix(schema)),
                &self.auths,
            )
            .await?;
        if !rows.is_empty() {
            let mutations = rows.into_iter().map(|kv| Mutation::delete(kv.key)).collect();
            self.store.write(&self.table, mutations).await?;
        }
        self.cache.invalidate(schema);
        debug!("deleted metadata of {} from {}", schema, self.table);
        Ok(())
    }

    /// Schema names of the current layout.
    pub async fn list_schema_names(&self) -> MetaResult<BTreeSet<String>> {
        let rows = self
            .store
            .scan(&self.table, &KeyRange::all(), &self.auths)
            .await?;
        Ok(rows
            .iter()
            .filter_map(|kv| KeyPath::split_metadata_row(&kv.key))
            .filter(|(_, key)| key == ATTRIBUTES_KEY)
            .map(|(schema, _)| schema)
            .collect())
    }

    /// Copies the legacy row of `schema` into the current layout and removes
    /// it. Returns false when there was nothing to migrate. The copy is
    /// written before the legacy row is removed, so a failed migration can be
    /// run again.
    pub async fn migrate(&self, schema: &str) -> MetaResult<bool> {
        let entries = match self.legacy.read_all(schema).await? {
            Some(entries) => entries,
            None => return Ok(false),
        };

        if !entries.is_empty() {
            self.insert_all(schema, &entries).await?;
        }
        self.legacy.remove(schema).await?;
        info!(
            "migrated {} metadata entries of {} in {} to the current layout",
            entries.len(),
            schema,
            self.table
        );
        Ok(true)
    }

    pub fn expire_cache(&self) {
        self.cache.clear();
        self.legacy.expire_cache();
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::legacy::encode_legacy_row;
    use super::{CatalogMetadata, ATTRIBUTES_KEY};
    use crate::store::key_path::KeyPath;
    use crate::store::{KeyValueStore, MemoryStore, Mutation};

    async fn metadata() -> (Arc<MemoryStore>, CatalogMetadata) {
        let store = Arc::new(MemoryStore::new());
        let metadata = CatalogMetadata::new(store.clone(), "geomesa");
        metadata.ensure_table().await.unwrap();
        (store, metadata)
    }

    async fn seed_legacy(store: &MemoryStore, schema: &str, entries: &[(&str, &str)]) {
        let entries: BTreeMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        store
            .write(
                "geomesa",
                vec![Mutation::put(
                    KeyPath::legacy_row(schema),
                    encode_legacy_row(&entries).unwrap(),
                )],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_write() {
        let (store, metadata) = metadata().await;
        assert_eq!(metadata.read("trips", "k", true).await.unwrap(), None);

        metadata.insert("trips", "k", "v").await.unwrap();
        assert_eq!(
            metadata.read("trips", "k", true).await.unwrap(),
            Some("v".to_string())
        );

        // a write behind the cache is only seen by uncached reads
        store
            .write("geomesa", vec![Mutation::put("trips~k", "w")])
            .await
            .unwrap();
        assert_eq!(
            metadata.read("trips", "k", true).await.unwrap(),
            Some("v".to_string())
        );
        assert_eq!(
            metadata.read("trips", "k", false).await.unwrap(),
            Some("w".to_string())
        );

        assert!(metadata.read_required("trips", "missing").await.is_err());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (store, metadata) = metadata().await;
        metadata.insert("trips", ATTRIBUTES_KEY, "id:String").await.unwrap();
        metadata.insert("trips", "id", "0").await.unwrap();
        metadata.insert("trips2", ATTRIBUTES_KEY, "id:String").await.unwrap();
        seed_legacy(&store, "old", &[(ATTRIBUTES_KEY, "name:String")]).await;

        let names = metadata.list_schema_names().await.unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains("trips"));
        assert!(names.contains("trips2"));
        assert_eq!(
            metadata.legacy().list_schema_names().await.unwrap().len(),
            1
        );

        metadata.delete("trips").await.unwrap();
        assert!(metadata.read_all("trips").await.unwrap().is_empty());
        assert_eq!(metadata.read_all("trips2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_migrate() {
        let (store, metadata) = metadata().await;
        seed_legacy(
            &store,
            "old",
            &[(ATTRIBUTES_KEY, "name:String"), ("dtgfield", "dtg")],
        )
        .await;

        assert!(metadata.migrate("old").await.unwrap());
        let entries = metadata.read_all("old").await.unwrap();
        assert_eq!(entries.get("dtgfield").map(|s| s.as_str()), Some("dtg"));
        assert_eq!(
            metadata.legacy().read("old", ATTRIBUTES_KEY, false).await.unwrap(),
            None
        );

        // nothing left to migrate
        assert!(!metadata.migrate("old").await.unwrap());
        assert_eq!(store.row_count("geomesa"), 2);
    }
}
