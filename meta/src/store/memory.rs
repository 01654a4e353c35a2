use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::store::{
    Authorizations, Cell, KeyRange, KeyValue, KeyValueStore, Mutation, StoreError, StoreResult,
};

#[derive(Debug, Default)]
struct MemTable {
    rows: BTreeMap<Vec<u8>, Cell>,
    properties: BTreeMap<String, String>,
    splits: BTreeSet<Vec<u8>>,
}

/// In process store, used by tests and by the `memory` storage backend.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemTable>>,
    server_version: RwLock<Option<String>>,
    version_requests: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_server_version(version::project_version())
    }

    pub fn with_server_version(server_version: impl Into<String>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            server_version: RwLock::new(Some(server_version.into())),
            version_requests: AtomicUsize::new(0),
        }
    }

    /// `None` makes every following version query fail.
    pub fn set_server_version(&self, server_version: Option<String>) {
        *self.server_version.write() = server_version;
    }

    pub fn version_requests(&self) -> usize {
        self.version_requests.load(Ordering::SeqCst)
    }

    /// Number of rows stored in `table`, ignoring visibility.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    fn not_found(table: &str) -> StoreError {
        StoreError::TableNotFound {
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn scan(
        &self,
        table: &str,
        range: &KeyRange,
        auths: &Authorizations,
    ) -> StoreResult<Vec<KeyValue>> {
        let tables = self.tables.read();
        let mem = tables.get(table).ok_or_else(|| Self::not_found(table))?;
        if range.is_empty() {
            return Ok(vec![]);
        }

        let rows = mem
            .rows
            .range::<[u8], _>(range.as_bounds())
            .filter(|(_, cell)| auths.can_see(cell.visibility.as_deref()))
            .map(|(key, cell)| KeyValue {
                key: key.clone(),
                value: cell.value.clone(),
            })
            .collect();
        Ok(rows)
    }

    async fn write(&self, table: &str, mutations: Vec<Mutation>) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let mem = tables.get_mut(table).ok_or_else(|| Self::not_found(table))?;
        for mutation in mutations {
            match mutation {
                Mutation::Put {
                    key,
                    value,
                    visibility,
                } => {
                    mem.rows.insert(key, Cell::new(value, visibility));
                }
                Mutation::Delete { key } => {
                    mem.rows.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        table: &str,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let mem = tables.get_mut(table).ok_or_else(|| Self::not_found(table))?;

        let current = mem.rows.get(key).map(|cell| cell.value.as_slice());
        if current != expected {
            return Ok(false);
        }
        match new {
            Some(value) => {
                mem.rows.insert(key.to_vec(), Cell::new(value, None));
            }
            None => {
                mem.rows.remove(key);
            }
        }
        Ok(true)
    }

    async fn table_exists(&self, table: &str) -> StoreResult<bool> {
        Ok(self.tables.read().contains_key(table))
    }

    async fn create_table_if_absent(&self, table: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Ok(false);
        }
        tables.insert(table.to_string(), MemTable::default());
        Ok(true)
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        self.tables
            .write()
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(table))
    }

    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn set_table_property(&self, table: &str, key: &str, value: &str) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let mem = tables.get_mut(table).ok_or_else(|| Self::not_found(table))?;
        mem.properties.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_table_property(&self, table: &str, key: &str) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let mem = tables.get_mut(table).ok_or_else(|| Self::not_found(table))?;
        mem.properties.remove(key);
        Ok(())
    }

    async fn table_properties(&self, table: &str) -> StoreResult<BTreeMap<String, String>> {
        let tables = self.tables.read();
        let mem = tables.get(table).ok_or_else(|| Self::not_found(table))?;
        Ok(mem.properties.clone())
    }

    async fn add_splits(&self, table: &str, splits: BTreeSet<Vec<u8>>) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let mem = tables.get_mut(table).ok_or_else(|| Self::not_found(table))?;
        mem.splits.extend(splits);
        Ok(())
    }

    async fn splits(&self, table: &str) -> StoreResult<Vec<Vec<u8>>> {
        let tables = self.tables.read();
        let mem = tables.get(table).ok_or_else(|| Self::not_found(table))?;
        Ok(mem.splits.iter().cloned().collect())
    }

    async fn server_version(&self) -> StoreResult<String> {
        self.version_requests.fetch_add(1, Ordering::SeqCst);
        self.server_version
            .read()
            .clone()
            .ok_or_else(|| StoreError::Unavailable {
                msg: "server version is not reachable".to_string(),
            })
    }
}
