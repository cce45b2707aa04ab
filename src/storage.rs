use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use serde_json::Value;

// Re-export core storage types so code using crate::storage::* sees one module
pub use rentbook_core::storage::{
    Collection, Document, Filter, Page, StorageBackend, StorageError, TransactionId,
    INTERNAL_ID_FIELD,
};

type Collections = BTreeMap<Collection, Vec<Document>>;

struct Snapshot {
    collections: Collections,
    sequence_value: u64,
}

/// Document store kept entirely in process memory.
///
/// Documents are held per collection in insertion order and stamped with a
/// sequence number under `_id`. Transactions snapshot every collection and
/// restore the snapshot on rollback.
pub struct InMemoryStorage {
    collections: RwLock<Collections>,
    sequence_counter: AtomicU64,
    tx_counter: AtomicU64,
    snapshots: RwLock<HashMap<TransactionId, Snapshot>>,
    closed: AtomicBool,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        let collections = Collection::ALL.iter().map(|c| (*c, Vec::new())).collect();
        Self {
            collections: RwLock::new(collections),
            sequence_counter: AtomicU64::new(1),
            tx_counter: AtomicU64::new(1),
            snapshots: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StorageError> {
        self.ensure_open()?;
        self.collections
            .read()
            .map_err(|_| StorageError::Other("collection lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StorageError> {
        self.ensure_open()?;
        self.collections
            .write()
            .map_err(|_| StorageError::Other("collection lock poisoned".to_string()))
    }

    fn snapshots(&self) -> Result<RwLockWriteGuard<'_, HashMap<TransactionId, Snapshot>>, StorageError> {
        self.snapshots
            .write()
            .map_err(|_| StorageError::Other("snapshot lock poisoned".to_string()))
    }

    fn stamp(&self, mut doc: Document) -> Document {
        doc.insert(INTERNAL_ID_FIELD.to_string(), Value::from(self.next_sequence()));
        doc
    }
}

fn has_id(doc: &Document, id: &str) -> bool {
    matches!(doc.get("id"), Some(Value::String(s)) if s == id)
}

impl StorageBackend for InMemoryStorage {
    fn insert(&self, collection: Collection, doc: Document) -> Result<(), StorageError> {
        let doc = self.stamp(doc);
        let mut collections = self.write()?;
        collections.entry(collection).or_default().push(doc);
        Ok(())
    }

    fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> Result<(), StorageError> {
        let docs: Vec<Document> = docs.into_iter().map(|d| self.stamp(d)).collect();
        let mut collections = self.write()?;
        collections.entry(collection).or_default().extend(docs);
        Ok(())
    }

    fn replace(&self, collection: Collection, id: &str, mut doc: Document) -> Result<bool, StorageError> {
        let mut collections = self.write()?;
        let docs = collections.entry(collection).or_default();
        match docs.iter_mut().find(|d| has_id(d, id)) {
            Some(existing) => {
                if let Some(internal) = existing.get(INTERNAL_ID_FIELD) {
                    doc.insert(INTERNAL_ID_FIELD.to_string(), internal.clone());
                }
                *existing = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_by_id(&self, collection: Collection, id: &str) -> Result<bool, StorageError> {
        let mut collections = self.write()?;
        let docs = collections.entry(collection).or_default();
        match docs.iter().position(|d| has_id(d, id)) {
            Some(pos) => {
                docs.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_by_filter(&self, collection: Collection, filter: &Filter) -> Result<usize, StorageError> {
        let mut collections = self.write()?;
        let docs = collections.entry(collection).or_default();
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok(before - docs.len())
    }

    fn find(&self, collection: Collection, filter: &Filter, page: Page) -> Result<Vec<Document>, StorageError> {
        let collections = self.read()?;
        let docs = match collections.get(&collection) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };
        Ok(page.apply(docs.iter().filter(|d| filter.matches(d)).cloned()))
    }

    fn count(&self, collection: Collection) -> Result<usize, StorageError> {
        let collections = self.read()?;
        Ok(collections.get(&collection).map_or(0, Vec::len))
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let snapshot = Snapshot {
            collections: self.read()?.clone(),
            sequence_value: self.sequence_counter.load(Ordering::SeqCst),
        };
        self.snapshots()?.insert(tx_id, snapshot);
        tracing::debug!(tx_id, "Transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.snapshots()?
            .remove(&tx_id)
            .ok_or(StorageError::NoActiveTransaction)?;
        tracing::debug!(tx_id, "Transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let snapshot = self.snapshots()?
            .remove(&tx_id)
            .ok_or(StorageError::NoActiveTransaction)?;
        *self.write()? = snapshot.collections;
        self.sequence_counter.store(snapshot.sequence_value, Ordering::SeqCst);
        tracing::debug!(tx_id, "Transaction rolled back");
        Ok(())
    }

    fn ping(&self) -> Result<(), StorageError> {
        self.ensure_open()
    }

    fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!("In-memory storage closed");
        Ok(())
    }
}
