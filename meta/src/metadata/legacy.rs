use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{MetaError, MetaResult};
use crate::metadata::MetadataCache;
use crate::store::key_path::KeyPath;
use crate::store::{Authorizations, KeyRange, KeyValueStore, Mutation};

/// Read only view of the legacy layout: one row per schema holding a json
/// map of every metadata key.
#[derive(Debug)]
pub struct LegacyMetadata {
    store: Arc<dyn KeyValueStore>,
    table: String,
    auths: Authorizations,
    cache: MetadataCache,
}

impl LegacyMetadata {
    pub fn new(store: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            auths: Authorizations::empty(),
            cache: MetadataCache::default(),
        }
    }

    pub async fn read(&self, schema: &str, key: &str, cache: bool) -> MetaResult<Option<String>> {
        if cache {
            if let Some(value) = self.cache.get(schema, key) {
                return Ok(value);
            }
        }
        let value = self
            .read_all(schema)
            .await?
            .and_then(|mut entries| entries.remove(key));
        self.cache.put(schema, key, value.clone());
        Ok(value)
    }

    pub async fn read_all(&self, schema: &str) -> MetaResult<Option<BTreeMap<String, String>>> {
        let row = self
            .store
            .get(&self.table, &KeyPath::legacy_row(schema), &self.auths)
            .await?;
        match row {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice::<BTreeMap<String, String>>(&bytes)
                .map(Some)
                .map_err(|e| MetaError::SerdeMsgDecode { err: e.to_string() }),
        }
    }

    pub async fn list_schema_names(&self) -> MetaResult<BTreeSet<String>> {
        let rows = self
            .store
            .scan(
                &self.table,
                &KeyRange::prefix(KeyPath::LEGACY_ROW_PREFIX),
                &self.auths,
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|kv| KeyPath::legacy_schema_name(&kv.key))
            .collect())
    }

    /// Only the migration of the current layout removes legacy rows.
    pub(crate) async fn remove(&self, schema: &str) -> MetaResult<()> {
        self.store
            .write(&self.table, vec![Mutation::delete(KeyPath::legacy_row(schema))])
            .await?;
        self.cache.invalidate(schema);
        Ok(())
    }

    pub fn expire_cache(&self) {
        self.cache.clear();
    }
}

/// Encodes a legacy row, only used to seed catalogs written by old clients.
pub fn encode_legacy_row(entries: &BTreeMap<String, String>) -> MetaResult<Vec<u8>> {
    serde_json::to_vec(entries).map_err(|e| MetaError::SerdeMsgEncode { err: e.to_string() })
}
