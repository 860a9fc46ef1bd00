//! Flat-file record store.
//!
//! Every collection lives in `<data_dir>/<name>.json` as one JSON array.
//! Writers on the same collection are serialized by a per-collection lock and
//! replace the file through a synced temp file + rename, so readers see either
//! the previous contents or the new ones in full.

pub mod collection;
pub mod error;
pub mod locks;
pub mod record;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

pub use collection::{CollectionFile, CollectionName, StagedWrite};
pub use error::{StoreError, StoreResult};
pub use locks::LockRegistry;
pub use record::{ID_FIELD, Record, RecordId, next_numeric_id};

use record::ensure_unique_ids;

/// Handle to a directory of collections. Cheap to clone; clones share locks.
#[derive(Debug, Clone)]
pub struct RecordStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    data_dir: PathBuf,
    locks: LockRegistry,
}

impl RecordStore {
    /// Opens a store rooted at `data_dir`. The directory is created on first write.
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                data_dir: data_dir.into(),
                locks: LockRegistry::new(),
            }),
        }
    }

    pub fn collection_file(&self, collection: &str) -> StoreResult<CollectionFile> {
        let name = CollectionName::new(collection)?;
        Ok(CollectionFile::new(&self.inner.data_dir, name))
    }

    pub async fn exists(&self, collection: &str) -> StoreResult<bool> {
        let file = self.collection_file(collection)?;
        tokio::task::spawn_blocking(move || file.exists()).await?
    }

    /// Current contents in insertion order; empty when never written.
    pub async fn load_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let file = self.collection_file(collection)?;
        tokio::task::spawn_blocking(move || file.read()).await?
    }

    pub async fn find_by_key(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> StoreResult<Option<Record>> {
        let records = self.load_all(collection).await?;
        Ok(records.into_iter().find(|record| record.id() == id))
    }

    /// Appends `record`, failing with `DuplicateKey` if its id is taken.
    pub async fn append(&self, collection: &str, record: Record) -> StoreResult<()> {
        let name = collection.to_string();
        self.update(collection, move |records| {
            reject_existing_id(&name, records, record.id())?;
            records.push(record);
            Ok(())
        })
        .await
    }

    /// Appends `record` unless another record already holds the same value in `field`.
    /// Both checks and the write happen under the collection lock.
    pub async fn append_unique_by(
        &self,
        collection: &str,
        record: Record,
        field: &str,
    ) -> StoreResult<()> {
        let name = collection.to_string();
        let field = field.to_string();
        self.update(collection, move |records| {
            reject_existing_id(&name, records, record.id())?;
            if let Some(value) = record.get(&field) {
                reject_existing_field(&name, records, &field, value)?;
            }
            records.push(record);
            Ok(())
        })
        .await
    }

    /// Removes the record with `id`; `None` when absent.
    pub async fn remove(&self, collection: &str, id: &RecordId) -> StoreResult<Option<Record>> {
        let id = id.clone();
        self.update(collection, move |records| {
            let position = records.iter().position(|record| record.id() == &id);
            Ok(position.map(|index| records.remove(index)))
        })
        .await
    }

    /// Overwrites the collection with `records`, creating the file if needed.
    pub async fn replace_all(&self, collection: &str, records: Vec<Record>) -> StoreResult<()> {
        self.with_write_lock(collection, move |file| {
            ensure_unique_ids(file.name(), &records)?;
            file.write(&records)?;
            debug!(collection = file.name(), records = records.len(), "collection replaced");
            Ok(())
        })
        .await
    }

    /// Read-modify-write under the collection lock.
    ///
    /// `f` sees the current records and may change them or fail. The file is
    /// rewritten only when `f` succeeds, the result still has unique ids, and
    /// the sequence actually changed.
    pub async fn update<T, F>(&self, collection: &str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Vec<Record>) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_write_lock(collection, move |file| {
            let mut records = file.read()?;
            let before = records.clone();
            let output = f(&mut records)?;

            if records != before {
                ensure_unique_ids(file.name(), &records)?;
                file.write(&records)?;
                debug!(
                    collection = file.name(),
                    before = before.len(),
                    after = records.len(),
                    "collection updated"
                );
            }
            Ok(output)
        })
        .await
    }

    async fn with_write_lock<T, F>(&self, collection: &str, job: F) -> StoreResult<T>
    where
        F: FnOnce(&CollectionFile) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let file = self.collection_file(collection)?;
        let guard = self.inner.locks.acquire(file.collection_name()).await;

        // The guard moves into the blocking job: the lock is released when the
        // job finishes, even if the awaiting caller is dropped first.
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            job(&file)
        })
        .await?
    }
}

fn reject_existing_id(collection: &str, records: &[Record], id: &RecordId) -> StoreResult<()> {
    if records.iter().any(|existing| existing.id() == id) {
        return Err(StoreError::DuplicateKey {
            collection: collection.to_string(),
            id: id.clone(),
        });
    }
    Ok(())
}

/// Fails with `DuplicateField` when any record already holds `value` in `field`.
/// Meant for closures passed to [`RecordStore::update`].
pub fn reject_existing_field(
    collection: &str,
    records: &[Record],
    field: &str,
    value: &serde_json::Value,
) -> StoreResult<()> {
    if records.iter().any(|existing| existing.get(field) == Some(value)) {
        return Err(StoreError::DuplicateField {
            collection: collection.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}
