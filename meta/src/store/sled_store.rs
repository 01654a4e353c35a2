use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use sled::{Batch, Db, Tree};
use trace::debug;

use crate::store::{
    Authorizations, Cell, KeyRange, KeyValue, KeyValueStore, Mutation, StoreError, StoreResult,
};

const TABLES_TREE: &str = "__tables__";
const SYSTEM_TREE: &str = "__system__";
const SERVER_VERSION_KEY: &[u8] = b"server_version";

// **    __tables__              table name -> ""
// **    t/<table>               row -> [Cell]
// **    p/<table>               property -> value
// **    s/<table>               split -> ""
// **    __system__              server_version -> release that created the store
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = sled::open(path.as_ref())?;
        let system = db.open_tree(SYSTEM_TREE)?;
        // the first release to open the store plays the server side
        let _ = system.compare_and_swap(
            SERVER_VERSION_KEY,
            None as Option<&[u8]>,
            Some(version::project_version().as_bytes()),
        )?;
        debug!("opened sled store at {}", path.as_ref().display());
        Ok(Self { db })
    }

    fn rows_tree_name(table: &str) -> String {
        format!("t/{}", table)
    }

    fn properties_tree_name(table: &str) -> String {
        format!("p/{}", table)
    }

    fn splits_tree_name(table: &str) -> String {
        format!("s/{}", table)
    }

    fn registry(&self) -> StoreResult<Tree> {
        Ok(self.db.open_tree(TABLES_TREE)?)
    }

    fn tree(&self, table: &str, name: String) -> StoreResult<Tree> {
        if !self.registry()?.contains_key(table.as_bytes())? {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }
        Ok(self.db.open_tree(name)?)
    }

    fn rows(&self, table: &str) -> StoreResult<Tree> {
        self.tree(table, Self::rows_tree_name(table))
    }
}

#[async_trait]
impl KeyValueStore for SledStore {
    async fn scan(
        &self,
        table: &str,
        range: &KeyRange,
        auths: &Authorizations,
    ) -> StoreResult<Vec<KeyValue>> {
        let tree = self.rows(table)?;
        if range.is_empty() {
            return Ok(vec![]);
        }

        let mut rows = vec![];
        for item in tree.range::<Vec<u8>, _>((range.start.clone(), range.end.clone())) {
            let (key, value) = item?;
            let cell = Cell::decode(table, &value)?;
            if auths.can_see(cell.visibility.as_deref()) {
                rows.push(KeyValue {
                    key: key.to_vec(),
                    value: cell.value,
                });
            }
        }
        Ok(rows)
    }

    async fn write(&self, table: &str, mutations: Vec<Mutation>) -> StoreResult<()> {
        let tree = self.rows(table)?;
        let mut batch = Batch::default();
        for mutation in mutations {
            match mutation {
                Mutation::Put {
                    key,
                    value,
                    visibility,
                } => batch.insert(key, Cell::new(value, visibility).encode()),
                Mutation::Delete { key } => batch.remove(key),
            }
        }
        tree.apply_batch(batch)?;
        tree.flush()?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        table: &str,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> StoreResult<bool> {
        let tree = self.rows(table)?;
        let expected = expected.map(|v| Cell::new(v.to_vec(), None).encode());
        let new = new.map(|v| Cell::new(v, None).encode());
        let swapped = tree.compare_and_swap(key, expected, new)?.is_ok();
        if swapped {
            tree.flush()?;
        }
        Ok(swapped)
    }

    async fn table_exists(&self, table: &str) -> StoreResult<bool> {
        Ok(self.registry()?.contains_key(table.as_bytes())?)
    }

    async fn create_table_if_absent(&self, table: &str) -> StoreResult<bool> {
        let created = self
            .registry()?
            .compare_and_swap(table.as_bytes(), None as Option<&[u8]>, Some(&[] as &[u8]))?
            .is_ok();
        if created {
            self.db.open_tree(Self::rows_tree_name(table))?;
            self.db.flush()?;
        }
        Ok(created)
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        if self.registry()?.remove(table.as_bytes())?.is_none() {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }
        for name in [
            Self::rows_tree_name(table),
            Self::properties_tree_name(table),
            Self::splits_tree_name(table),
        ] {
            self.db.drop_tree(name)?;
        }
        self.db.flush()?;
        Ok(())
    }

    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        let mut names = vec![];
        for item in self.registry()?.iter() {
            let (key, _) = item?;
            names.push(String::from_utf8_lossy(&key).to_string());
        }
        Ok(names)
    }

    async fn set_table_property(&self, table: &str, key: &str, value: &str) -> StoreResult<()> {
        let tree = self.tree(table, Self::properties_tree_name(table))?;
        tree.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    async fn remove_table_property(&self, table: &str, key: &str) -> StoreResult<()> {
        let tree = self.tree(table, Self::properties_tree_name(table))?;
        tree.remove(key.as_bytes())?;
        Ok(())
    }

    async fn table_properties(&self, table: &str) -> StoreResult<BTreeMap<String, String>> {
        let tree = self.tree(table, Self::properties_tree_name(table))?;
        let mut properties = BTreeMap::new();
        for item in tree.iter() {
            let (key, value) = item?;
            properties.insert(
                String::from_utf8_lossy(&key).to_string(),
                String::from_utf8_lossy(&value).to_string(),
            );
        }
        Ok(properties)
    }

    async fn add_splits(&self, table: &str, splits: BTreeSet<Vec<u8>>) -> StoreResult<()> {
        let tree = self.tree(table, Self::splits_tree_name(table))?;
        let mut batch = Batch::default();
        for split in splits {
            batch.insert(split, &[] as &[u8]);
        }
        tree.apply_batch(batch)?;
        Ok(())
    }

    async fn splits(&self, table: &str) -> StoreResult<Vec<Vec<u8>>> {
        let tree = self.tree(table, Self::splits_tree_name(table))?;
        let mut splits = vec![];
        for item in tree.iter() {
            let (key, _) = item?;
            splits.push(key.to_vec());
        }
        Ok(splits)
    }

    async fn server_version(&self) -> StoreResult<String> {
        let system = self.db.open_tree(SYSTEM_TREE)?;
        match system.get(SERVER_VERSION_KEY)? {
            Some(v) => Ok(String::from_utf8_lossy(&v).to_string()),
            None => Err(StoreError::Unavailable {
                msg: "store carries no server version".to_string(),
            }),
        }
    }
}
