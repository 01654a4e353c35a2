use std::fmt;
use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use trace::debug;

use crate::store::{Authorizations, KeyRange, KeyValueStore, Mutation, StoreResult};

type RowFilter = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Deletes every visible row in a set of ranges of one table, optionally
/// narrowed by a row key predicate.
pub struct BatchDeleter {
    store: Arc<dyn KeyValueStore>,
    table: String,
    auths: Authorizations,
    threads: usize,
    ranges: Vec<KeyRange>,
    filter: Option<RowFilter>,
}

impl fmt::Debug for BatchDeleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchDeleter")
            .field("table", &self.table)
            .field("threads", &self.threads)
            .field("ranges", &self.ranges)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

pub fn create_batch_deleter(
    store: Arc<dyn KeyValueStore>,
    table: impl Into<String>,
    auths: Authorizations,
    threads: usize,
) -> BatchDeleter {
    BatchDeleter {
        store,
        table: table.into(),
        auths,
        threads: threads.max(1),
        ranges: vec![],
        filter: None,
    }
}

impl BatchDeleter {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set_ranges(&mut self, ranges: Vec<KeyRange>) {
        self.ranges = ranges;
    }

    pub fn set_row_filter<F>(&mut self, filter: F)
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
    }

    /// Scans the ranges with up to `threads` scans in flight and deletes the
    /// matching rows in a single batch. Returns the number of rows deleted.
    pub async fn delete(self) -> StoreResult<u64> {
        let store = self.store.as_ref();
        let table = self.table.as_str();
        let auths = &self.auths;

        let scanned: Vec<_> = stream::iter(self.ranges.iter())
            .map(|range| store.scan(table, range, auths))
            .buffer_unordered(self.threads)
            .try_collect()
            .await?;

        let mutations: Vec<Mutation> = scanned
            .into_iter()
            .flatten()
            .filter(|kv| self.filter.as_ref().map(|f| f(&kv.key)).unwrap_or(true))
            .map(|kv| Mutation::delete(kv.key))
            .collect();

        let deleted = mutations.len() as u64;
        if deleted > 0 {
            store.write(table, mutations).await?;
        }
        debug!("deleted {} rows from table {}", deleted, table);
        Ok(deleted)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::create_batch_deleter;
    use crate::store::{Authorizations, KeyRange, KeyValueStore, MemoryStore, Mutation};

    #[tokio::test]
    async fn test_delete_ranges_with_filter() {
        let store = Arc::new(MemoryStore::new());
        store.create_table_if_absent("t").await.unwrap();
        store
            .write(
                "t",
                vec![
                    Mutation::put(vec![1u8, 1], "a"),
                    Mutation::put(vec![1u8, 2], "b"),
                    Mutation::put(vec![2u8, 1], "c"),
                    Mutation::put(vec![3u8, 1], "d"),
                ],
            )
            .await
            .unwrap();

        let mut deleter = create_batch_deleter(store.clone(), "t", Authorizations::empty(), 2);
        deleter.set_ranges(vec![KeyRange::prefix(vec![1u8]), KeyRange::prefix(vec![3u8])]);
        assert_eq!(deleter.delete().await.unwrap(), 3);
        assert_eq!(store.row_count("t"), 1);

        let mut deleter = create_batch_deleter(store.clone(), "t", Authorizations::empty(), 1);
        deleter.set_ranges(vec![KeyRange::all()]);
        deleter.set_row_filter(|row| row.first() == Some(&9));
        assert_eq!(deleter.delete().await.unwrap(), 0);
        assert_eq!(store.row_count("t"), 1);
    }
}
