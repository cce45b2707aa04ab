//! SQLite document-store backend.
//!
//! Every document is kept as a JSON text body in a single `documents` table,
//! tagged with its collection name. The autoincrement `seq` column is the
//! store-internal key and is surfaced as `_id` on read.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, MutexGuard,
};

use rentbook_core::storage::{
    Collection, Document, Filter, Page, StorageBackend, StorageError, TransactionId,
    INTERNAL_ID_FIELD,
};
use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection};
use serde_json::Value;

pub struct SqliteStorage {
    conn: Mutex<Option<Connection>>,
    tx_counter: AtomicU64,
    active_tx: Mutex<Option<TransactionId>>,
}

fn sql_err(e: rusqlite::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|_| StorageError::Other("sqlite lock poisoned".to_string()))
}

fn json_path(field: &str) -> String {
    format!("$.{}", field)
}

/// Builds the `WHERE` clause and its parameters for one collection.
fn where_clause(collection: Collection, filter: &Filter) -> (String, Vec<SqlValue>) {
    let mut args = vec![SqlValue::Text(collection.name().to_string())];
    let clause = match filter {
        Filter::All => "collection = ?1".to_string(),
        Filter::Eq { field, value } => {
            args.push(SqlValue::Text(json_path(field)));
            args.push(SqlValue::Text(value.clone()));
            "collection = ?1 AND json_extract(body, ?2) = ?3".to_string()
        }
        Filter::In { values, .. } if values.is_empty() => "collection = ?1 AND 0".to_string(),
        Filter::In { field, values } => {
            args.push(SqlValue::Text(json_path(field)));
            let placeholders: Vec<String> = (0..values.len()).map(|i| format!("?{}", i + 3)).collect();
            args.extend(values.iter().map(|v| SqlValue::Text(v.clone())));
            format!(
                "collection = ?1 AND json_extract(body, ?2) IN ({})",
                placeholders.join(", ")
            )
        }
    };
    (clause, args)
}

fn encode(mut doc: Document) -> Result<String, StorageError> {
    doc.remove(INTERNAL_ID_FIELD);
    Ok(serde_json::to_string(&doc)?)
}

fn decode(seq: i64, body: &str) -> Result<Document, StorageError> {
    let mut doc: Document = serde_json::from_str(body)?;
    doc.insert(INTERNAL_ID_FIELD.to_string(), Value::from(seq));
    Ok(doc)
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`. `":memory:"` opens a private in-memory database.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(sql_err)?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(sql_err)?;

        let storage = Self {
            conn: Mutex::new(Some(conn)),
            tx_counter: AtomicU64::new(1),
            active_tx: Mutex::new(None),
        };
        storage.init_schema()?;
        tracing::debug!(path, "SQLite storage opened");
        Ok(storage)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, StorageError> {
        let guard = lock(&self.conn)?;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        f(conn).map_err(sql_err)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS documents (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    collection TEXT NOT NULL,
                    body TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_documents_collection
                    ON documents(collection, seq);

                CREATE INDEX IF NOT EXISTS idx_documents_record_id
                    ON documents(collection, json_extract(body, '$.id'));
                ",
            )
        })
    }
}

impl StorageBackend for SqliteStorage {
    fn insert(&self, collection: Collection, doc: Document) -> Result<(), StorageError> {
        let body = encode(doc)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
                params![collection.name(), body],
            )
        })?;
        Ok(())
    }

    fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> Result<(), StorageError> {
        let bodies = docs.into_iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("INSERT INTO documents (collection, body) VALUES (?1, ?2)")?;
            for body in &bodies {
                stmt.execute(params![collection.name(), body])?;
            }
            Ok(())
        })
    }

    fn replace(&self, collection: Collection, id: &str, doc: Document) -> Result<bool, StorageError> {
        let body = encode(doc)?;
        let changed = self.with_conn(|conn| {
            conn.execute(
                "UPDATE documents SET body = ?3
                 WHERE seq = (SELECT seq FROM documents
                              WHERE collection = ?1 AND json_extract(body, '$.id') = ?2
                              ORDER BY seq LIMIT 1)",
                params![collection.name(), id, body],
            )
        })?;
        Ok(changed > 0)
    }

    fn delete_by_id(&self, collection: Collection, id: &str) -> Result<bool, StorageError> {
        let changed = self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM documents
                 WHERE seq = (SELECT seq FROM documents
                              WHERE collection = ?1 AND json_extract(body, '$.id') = ?2
                              ORDER BY seq LIMIT 1)",
                params![collection.name(), id],
            )
        })?;
        Ok(changed > 0)
    }

    fn delete_by_filter(&self, collection: Collection, filter: &Filter) -> Result<usize, StorageError> {
        let (clause, args) = where_clause(collection, filter);
        let sql = format!("DELETE FROM documents WHERE {}", clause);
        self.with_conn(|conn| conn.execute(&sql, params_from_iter(args)))
    }

    fn find(&self, collection: Collection, filter: &Filter, page: Page) -> Result<Vec<Document>, StorageError> {
        let (clause, mut args) = where_clause(collection, filter);
        let sql = format!(
            "SELECT seq, body FROM documents WHERE {} ORDER BY seq LIMIT ?{} OFFSET ?{}",
            clause,
            args.len() + 1,
            args.len() + 2
        );
        // SQLite treats a negative LIMIT as unbounded
        let limit = page.limit.map_or(-1, |l| l as i64);
        args.push(SqlValue::Integer(limit));
        args.push(SqlValue::Integer(page.offset as i64));

        let rows: Vec<(i64, String)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args), |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })?;

        rows.iter().map(|(seq, body)| decode(*seq, body)).collect()
    }

    fn count(&self, collection: Collection) -> Result<usize, StorageError> {
        let count: i64 = self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection.name()],
                |row| row.get(0),
            )
        })?;
        Ok(count as usize)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let mut active = lock(&self.active_tx)?;
        if active.is_some() {
            return Err(StorageError::Other("transaction already active".to_string()));
        }
        self.with_conn(|conn| conn.execute_batch("SAVEPOINT rentbook_tx"))?;
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        *active = Some(tx_id);
        tracing::debug!(tx_id, "SQLite transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let mut active = lock(&self.active_tx)?;
        if *active != Some(tx_id) {
            return Err(StorageError::NoActiveTransaction);
        }
        self.with_conn(|conn| conn.execute_batch("RELEASE SAVEPOINT rentbook_tx"))?;
        *active = None;
        tracing::debug!(tx_id, "SQLite transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let mut active = lock(&self.active_tx)?;
        if *active != Some(tx_id) {
            return Err(StorageError::NoActiveTransaction);
        }
        // ROLLBACK TO leaves the savepoint open; RELEASE closes it
        self.with_conn(|conn| {
            conn.execute_batch("ROLLBACK TO SAVEPOINT rentbook_tx; RELEASE SAVEPOINT rentbook_tx")
        })?;
        *active = None;
        tracing::debug!(tx_id, "SQLite transaction rolled back");
        Ok(())
    }

    fn ping(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))?;
        Ok(())
    }

    fn close(&self) -> Result<(), StorageError> {
        let conn = lock(&self.conn)?.take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| sql_err(e))?;
            tracing::debug!("SQLite storage closed");
        }
        Ok(())
    }
}
