use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored record: a JSON object keyed by camelCase field names.
pub type Document = Map<String, Value>;

/// Field holding the store-assigned key of every stored document.
pub const INTERNAL_ID_FIELD: &str = "_id";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
    #[error("storage is closed")]
    Closed,
    #[error("no active transaction")]
    NoActiveTransaction,
}

pub type TransactionId = u64;

/// The four logical collections of the rental store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Properties,
    Units,
    Bookings,
    Expenses,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Properties,
        Collection::Units,
        Collection::Bookings,
        Collection::Expenses,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Properties => "properties",
            Collection::Units => "units",
            Collection::Bookings => "bookings",
            Collection::Expenses => "expenses",
        }
    }

    /// Lower-case singular noun, used in log lines and error messages.
    pub fn singular(&self) -> &'static str {
        match self {
            Collection::Properties => "property",
            Collection::Units => "unit",
            Collection::Bookings => "booking",
            Collection::Expenses => "expense",
        }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            Collection::Properties => "prop",
            Collection::Units => "unit",
            Collection::Bookings => "book",
            Collection::Expenses => "expense",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Selects documents by a string-valued top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq { field: String, value: String },
    In { field: String, values: Vec<String> },
}

impl Filter {
    pub fn field_eq(field: &str, value: &str) -> Self {
        Filter::Eq {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn field_in(field: &str, values: Vec<String>) -> Self {
        Filter::In {
            field: field.to_string(),
            values,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => {
                matches!(doc.get(field), Some(Value::String(s)) if s == value)
            }
            Filter::In { field, values } => match doc.get(field) {
                Some(Value::String(s)) => values.iter().any(|v| v == s),
                _ => false,
            },
        }
    }
}

/// Window over a collection in insertion order. `limit: None` is uncapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Page {
    pub const ALL: Page = Page {
        offset: 0,
        limit: None,
    };

    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// Applies the window to an already ordered iterator.
    pub fn apply<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        let items = items.skip(self.offset);
        match self.limit {
            Some(limit) => items.take(limit).collect(),
            None => items.collect(),
        }
    }
}

/// Document store over the rental collections.
///
/// Every call is a direct pass-through; implementations do no caching and
/// no retries. `replace` and `delete_*` on absent ids are no-ops.
pub trait StorageBackend: Send + Sync {
    fn insert(&self, collection: Collection, doc: Document) -> Result<(), StorageError>;
    fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> Result<(), StorageError>;
    /// Replaces the document whose `id` field equals `id`. Returns whether one matched.
    fn replace(&self, collection: Collection, id: &str, doc: Document) -> Result<bool, StorageError>;
    fn delete_by_id(&self, collection: Collection, id: &str) -> Result<bool, StorageError>;
    fn delete_by_filter(&self, collection: Collection, filter: &Filter) -> Result<usize, StorageError>;
    fn find(&self, collection: Collection, filter: &Filter, page: Page) -> Result<Vec<Document>, StorageError>;
    fn count(&self, collection: Collection) -> Result<usize, StorageError>;

    fn find_all(&self, collection: Collection) -> Result<Vec<Document>, StorageError> {
        self.find(collection, &Filter::All, Page::ALL)
    }

    fn find_by_filter(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StorageError> {
        self.find(collection, filter, Page::ALL)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError>;
    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;

    /// Checks that the store is reachable.
    fn ping(&self) -> Result<(), StorageError>;
    /// Releases the store. Every later call fails with `StorageError::Closed`.
    fn close(&self) -> Result<(), StorageError>;
}
