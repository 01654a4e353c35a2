//! Sorted key/value table capability the catalog is written against.
//!
//! A store hosts named tables of byte rows ordered lexicographically. Every
//! row may carry a visibility label which is only returned to readers whose
//! authorizations include it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use config::{StorageBackend, StorageConfig};
use snafu::Snafu;

pub mod deleter;
pub mod key_path;
pub mod memory;
pub mod sled_store;

pub use deleter::{create_batch_deleter, BatchDeleter};
pub use memory::MemoryStore;
pub use sled_store::SledStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("Table not found: {}", table))]
    TableNotFound { table: String },

    #[snafu(display("Store unavailable: {}", msg))]
    Unavailable { msg: String },

    #[snafu(display("Corrupted cell in table {}: {}", table, msg))]
    CorruptedCell { table: String, msg: String },

    #[snafu(display("Sled error: {}", source))]
    Sled { source: sled::Error },
}

impl From<sled::Error> for StoreError {
    fn from(source: sled::Error) -> Self {
        StoreError::Sled { source }
    }
}

/// Visibility labels a reader may see.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Authorizations(BTreeSet<String>);

impl Authorizations {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    /// Unlabelled rows are visible to everyone, labelled rows only to holders
    /// of the label.
    pub fn can_see(&self, visibility: Option<&str>) -> bool {
        match visibility {
            None => true,
            Some(label) if label.is_empty() => true,
            Some(label) => self.0.contains(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A stored value with its optional visibility label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub value: Vec<u8>,
    pub visibility: Option<String>,
}

impl Cell {
    pub fn new(value: Vec<u8>, visibility: Option<String>) -> Self {
        Self { value, visibility }
    }

    /// `[label length: u16 BE][label][value]`
    pub fn encode(&self) -> Vec<u8> {
        let label = self.visibility.as_deref().unwrap_or_default().as_bytes();
        let mut buf = Vec::with_capacity(2 + label.len() + self.value.len());
        buf.extend_from_slice(&(label.len() as u16).to_be_bytes());
        buf.extend_from_slice(label);
        buf.extend_from_slice(&self.value);
        buf
    }

    pub fn decode(table: &str, buf: &[u8]) -> StoreResult<Self> {
        if buf.len() < 2 {
            return Err(StoreError::CorruptedCell {
                table: table.to_string(),
                msg: format!("cell of {} bytes has no header", buf.len()),
            });
        }
        let label_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        if buf.len() < 2 + label_len {
            return Err(StoreError::CorruptedCell {
                table: table.to_string(),
                msg: format!("label of {} bytes exceeds cell", label_len),
            });
        }
        let label = String::from_utf8(buf[2..2 + label_len].to_vec()).map_err(|e| {
            StoreError::CorruptedCell {
                table: table.to_string(),
                msg: e.to_string(),
            }
        })?;
        Ok(Self {
            value: buf[2 + label_len..].to_vec(),
            visibility: if label.is_empty() { None } else { Some(label) },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        visibility: Option<String>,
    },
    Delete {
        key: Vec<u8>,
    },
}

impl Mutation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
            visibility: None,
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self::Delete { key: key.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } => key,
            Self::Delete { key } => key,
        }
    }
}

/// A range of row keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Bound<Vec<u8>>,
    pub end: Bound<Vec<u8>>,
}

impl KeyRange {
    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    pub fn exact(key: impl Into<Vec<u8>>) -> Self {
        let key = key.into();
        Self {
            start: Bound::Included(key.clone()),
            end: Bound::Included(key),
        }
    }

    /// Every row starting with `prefix`.
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        let prefix = prefix.into();
        let end = match prefix_successor(&prefix) {
            Some(next) => Bound::Excluded(next),
            None => Bound::Unbounded,
        };
        Self {
            start: Bound::Included(prefix),
            end,
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let after_start = match &self.start {
            Bound::Included(s) => key >= s.as_slice(),
            Bound::Excluded(s) => key > s.as_slice(),
            Bound::Unbounded => true,
        };
        let before_end = match &self.end {
            Bound::Included(e) => key <= e.as_slice(),
            Bound::Excluded(e) => key < e.as_slice(),
            Bound::Unbounded => true,
        };
        after_start && before_end
    }

    /// A range that can not hold any key. Ordered map range lookups panic on
    /// these so they are filtered out before reaching a backend.
    pub fn is_empty(&self) -> bool {
        match (&self.start, &self.end) {
            (Bound::Included(s), Bound::Included(e)) => s > e,
            (Bound::Included(s), Bound::Excluded(e))
            | (Bound::Excluded(s), Bound::Included(e)) => s >= e,
            (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
            _ => false,
        }
    }

    pub fn as_bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        (as_slice_bound(&self.start), as_slice_bound(&self.end))
    }
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(v) => Bound::Included(v.as_slice()),
        Bound::Excluded(v) => Bound::Excluded(v.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Smallest key greater than every key starting with `prefix`, `None` when
/// the prefix is all `0xff`.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    while let Some(last) = next.pop() {
        if last < u8::MAX {
            next.push(last + 1);
            return Some(next);
        }
    }
    None
}

#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Rows in `range` visible under `auths`, in key order.
    async fn scan(
        &self,
        table: &str,
        range: &KeyRange,
        auths: &Authorizations,
    ) -> StoreResult<Vec<KeyValue>>;

    async fn get(
        &self,
        table: &str,
        key: &[u8],
        auths: &Authorizations,
    ) -> StoreResult<Option<Vec<u8>>> {
        let mut rows = self.scan(table, &KeyRange::exact(key), auths).await?;
        Ok(rows.pop().map(|kv| kv.value))
    }

    /// Applies every mutation of the batch, all or nothing.
    async fn write(&self, table: &str, mutations: Vec<Mutation>) -> StoreResult<()>;

    /// Replaces the value under `key` with `new` (removing it when `None`) if
    /// the current value equals `expected` (absent when `None`). Returns
    /// whether the swap took place.
    async fn compare_and_swap(
        &self,
        table: &str,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<Vec<u8>>,
    ) -> StoreResult<bool>;

    async fn table_exists(&self, table: &str) -> StoreResult<bool>;

    /// Returns true when the table was created by this call.
    async fn create_table_if_absent(&self, table: &str) -> StoreResult<bool>;

    async fn delete_table(&self, table: &str) -> StoreResult<()>;

    async fn list_tables(&self) -> StoreResult<Vec<String>>;

    async fn set_table_property(&self, table: &str, key: &str, value: &str) -> StoreResult<()>;

    async fn remove_table_property(&self, table: &str, key: &str) -> StoreResult<()>;

    async fn table_properties(&self, table: &str) -> StoreResult<BTreeMap<String, String>>;

    async fn add_splits(&self, table: &str, splits: BTreeSet<Vec<u8>>) -> StoreResult<()>;

    async fn splits(&self, table: &str) -> StoreResult<Vec<Vec<u8>>>;

    /// Version of the code running on the store side.
    async fn server_version(&self) -> StoreResult<String>;
}

pub type KeyValueStoreRef = Arc<dyn KeyValueStore>;

pub fn open_store(config: &StorageConfig) -> StoreResult<KeyValueStoreRef> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sled => Ok(Arc::new(SledStore::open(&config.path)?)),
    }
}
