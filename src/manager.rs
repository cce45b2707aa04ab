use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rentbook_core::{new_id, Collection, Filter, Page, Record};

use crate::{
    exchange::ImportMode,
    storage::{StorageBackend, StorageError},
};

/// Entry point for every operation on the rental store.
///
/// Holds the explicitly opened storage handle and a single write lock that
/// serializes all mutations, so cascades and imports never interleave.
pub struct RentalManager {
    storage: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
    import_mode: ImportMode,
}

impl RentalManager {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
            import_mode: ImportMode::default(),
        }
    }

    pub fn with_import_mode(mut self, import_mode: ImportMode) -> Self {
        self.import_mode = import_mode;
        self
    }

    pub fn import_mode(&self) -> ImportMode {
        self.import_mode
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub(crate) fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` inside a storage transaction, rolling back if it fails.
    pub(crate) fn in_transaction<T>(
        &self,
        f: impl FnOnce(&dyn StorageBackend) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let tx_id = self.storage.begin_transaction()?;
        match f(self.storage.as_ref()) {
            Ok(value) => {
                self.storage.commit_transaction(tx_id)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.storage.rollback_transaction(tx_id) {
                    tracing::error!(tx_id, error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    pub fn list<R: Record>(&self, page: Page) -> Result<Vec<R>, StorageError> {
        let docs = self.storage.find(R::COLLECTION, &Filter::All, page)?;
        docs.into_iter().map(R::from_document).collect()
    }

    /// Inserts `record`, generating an id from the collection prefix if it has none.
    pub fn create<R: Record>(&self, mut record: R) -> Result<R, StorageError> {
        if record.id().is_empty() {
            record.set_id(new_id(R::COLLECTION.id_prefix()));
        }
        let doc = record.to_document()?;
        let _guard = self.write_guard();
        self.storage.insert(R::COLLECTION, doc)?;
        tracing::debug!(collection = %R::COLLECTION, id = record.id(), "Record created");
        Ok(record)
    }

    /// Full replace. The stored id is always `id`, whatever the payload carried.
    pub fn update<R: Record>(&self, id: &str, mut record: R) -> Result<R, StorageError> {
        record.set_id(id.to_string());
        let doc = record.to_document()?;
        let _guard = self.write_guard();
        let matched = self.storage.replace(R::COLLECTION, id, doc)?;
        tracing::debug!(collection = %R::COLLECTION, id, matched, "Record replaced");
        Ok(record)
    }

    /// Deletes one record; properties and units take their dependents with them.
    pub fn delete<R: Record>(&self, id: &str) -> Result<(), StorageError> {
        match R::COLLECTION {
            Collection::Properties => self.delete_property_cascade(id).map(|_| ()),
            Collection::Units => self.delete_unit_cascade(id).map(|_| ()),
            collection => {
                let _guard = self.write_guard();
                let removed = self.storage.delete_by_id(collection, id)?;
                tracing::debug!(%collection, id, removed, "Record deleted");
                Ok(())
            }
        }
    }
}
