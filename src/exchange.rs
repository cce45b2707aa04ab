//! Whole-dataset export and destructive import.

use serde::{Deserialize, Serialize};

use crate::{
    manager::RentalManager,
    storage::{Collection, Document, Filter, StorageError, INTERNAL_ID_FIELD},
};

/// Which collections an import clears before inserting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Clear all four collections, then insert whichever keys are present.
    #[default]
    ReplaceAll,
    /// Clear and refill only the collections whose key is present.
    ReplacePresent,
}

/// Every record of every collection, without store-internal keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub properties: Vec<Document>,
    pub units: Vec<Document>,
    pub bookings: Vec<Document>,
    pub expenses: Vec<Document>,
}

impl ExportBundle {
    fn slot(&mut self, collection: Collection) -> &mut Vec<Document> {
        match collection {
            Collection::Properties => &mut self.properties,
            Collection::Units => &mut self.units,
            Collection::Bookings => &mut self.bookings,
            Collection::Expenses => &mut self.expenses,
        }
    }

    pub fn get(&self, collection: Collection) -> &[Document] {
        match collection {
            Collection::Properties => &self.properties,
            Collection::Units => &self.units,
            Collection::Bookings => &self.bookings,
            Collection::Expenses => &self.expenses,
        }
    }
}

/// Import body. An absent key and an empty array differ only under
/// `ImportMode::ReplacePresent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookings: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expenses: Option<Vec<Document>>,
}

impl ImportPayload {
    pub fn contains(&self, collection: Collection) -> bool {
        match collection {
            Collection::Properties => self.properties.is_some(),
            Collection::Units => self.units.is_some(),
            Collection::Bookings => self.bookings.is_some(),
            Collection::Expenses => self.expenses.is_some(),
        }
    }

    fn take(&mut self, collection: Collection) -> Option<Vec<Document>> {
        match collection {
            Collection::Properties => self.properties.take(),
            Collection::Units => self.units.take(),
            Collection::Bookings => self.bookings.take(),
            Collection::Expenses => self.expenses.take(),
        }
    }
}

impl From<ExportBundle> for ImportPayload {
    fn from(bundle: ExportBundle) -> Self {
        Self {
            properties: Some(bundle.properties),
            units: Some(bundle.units),
            bookings: Some(bundle.bookings),
            expenses: Some(bundle.expenses),
        }
    }
}

fn strip_internal_id(mut doc: Document) -> Document {
    doc.remove(INTERNAL_ID_FIELD);
    doc
}

impl RentalManager {
    /// Reads every collection in full.
    pub fn export_all(&self) -> Result<ExportBundle, StorageError> {
        let _guard = self.write_guard();
        let mut bundle = ExportBundle::default();
        for collection in Collection::ALL {
            let docs = self.storage().find_all(collection)?;
            *bundle.slot(collection) = docs.into_iter().map(strip_internal_id).collect();
        }

        tracing::info!(
            properties = bundle.properties.len(),
            units = bundle.units.len(),
            bookings = bundle.bookings.len(),
            expenses = bundle.expenses.len(),
            "Data exported"
        );
        metrics::increment_counter!("rentbook_exports_total");
        Ok(bundle)
    }

    /// Replaces stored data with `payload`. Records are inserted verbatim,
    /// without validation or id collision checks.
    pub fn import_all(&self, mut payload: ImportPayload) -> Result<(), StorageError> {
        let mode = self.import_mode();
        let _guard = self.write_guard();
        self.in_transaction(|store| {
            for collection in Collection::ALL {
                if mode == ImportMode::ReplaceAll || payload.contains(collection) {
                    let cleared = store.delete_by_filter(collection, &Filter::All)?;
                    tracing::debug!(%collection, cleared, "Collection cleared for import");
                }
            }

            for collection in Collection::ALL {
                if let Some(docs) = payload.take(collection) {
                    let count = docs.len();
                    if count > 0 {
                        store.insert_many(collection, docs.into_iter().map(strip_internal_id).collect())?;
                    }
                    tracing::debug!(%collection, count, "Collection imported");
                }
            }
            Ok(())
        })?;

        tracing::info!(?mode, "Data imported");
        metrics::increment_counter!("rentbook_imports_total");
        Ok(())
    }
}
