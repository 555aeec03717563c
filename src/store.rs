//! Processed-disclosure store
//!
//! Durable record of every disclosure id the engine has already evaluated.
//! A row means "never notify this id again", whether it was delivered or
//! suppressed.
//!
//! Architecture:
//! - Single `kap_records` table keyed by `disclosure_id` (PRIMARY KEY, so
//!   point lookups are index-backed)
//! - Inserts use `INSERT OR IGNORE`, so a repeated id is a silent no-op
//! - Each insert is its own autocommit statement and is durable on return
//! - Grows without bound; only the maintenance [`SqliteRecordStore::clear`]
//!   removes rows, and the cycle never calls it
//!
//! Schema: `sql/01_kap_records.sql`

use crate::feed::Disclosure;
use rusqlite::{Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = include_str!("../sql/01_kap_records.sql");

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store connection lock poisoned")]
    Poisoned,
}

/// One persisted disclosure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRecord {
    pub id: String,
    pub publish_date: String,
    pub issuer_codes: String,
    pub title: String,
    pub body: String,
    /// false when the disclosure was recorded without being delivered
    pub notified: bool,
}

impl ProcessedRecord {
    pub fn from_disclosure(disclosure: &Disclosure, notified: bool) -> Self {
        Self {
            id: disclosure.id.clone(),
            publish_date: disclosure.publish_date.clone(),
            issuer_codes: disclosure.issuer_codes.clone(),
            title: disclosure.title.clone(),
            body: disclosure.body.clone(),
            notified,
        }
    }
}

/// Record store used by the engine and the cycle
pub trait RecordStore: Send + Sync {
    /// Create tables and indexes if missing (idempotent)
    fn initialize(&self) -> Result<(), StoreError>;

    /// True iff a record with this id has been committed
    fn exists(&self, id: &str) -> Result<bool, StoreError>;

    /// Commit a record
    ///
    /// # Returns
    /// * `Ok(true)` - row written
    /// * `Ok(false)` - id already present, nothing changed
    fn insert(&self, record: &ProcessedRecord) -> Result<bool, StoreError>;
}

/// SQLite implementation of [`RecordStore`]
///
/// Uses Arc<Mutex<Connection>> so clones share one connection.
#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) the store at `db_path` and apply the schema
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("📊 Opened record store at {} (journal_mode={})", db_path, mode);

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize()?;
        Ok(store)
    }

    /// In-memory store (tests and dry runs)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.initialize()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of processed records
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM kap_records", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Fetch one record by id
    pub fn get(&self, id: &str) -> Result<Option<ProcessedRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT disclosure_id, publish_date, stock, title, summary, notified
                 FROM kap_records WHERE disclosure_id = ?",
                [id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Most recently inserted records, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<ProcessedRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT disclosure_id, publish_date, stock, title, summary, notified
             FROM kap_records ORDER BY recorded_at DESC, rowid DESC LIMIT ?",
        )?;
        let records = stmt
            .query_map([limit as i64], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Delete every record (maintenance only)
    ///
    /// Returns the number of rows removed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM kap_records", [])?;
        log::warn!("🧹 Cleared {} processed disclosures", removed);
        Ok(removed)
    }
}

impl RecordStore for SqliteRecordStore {
    fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached("SELECT 1 FROM kap_records WHERE disclosure_id = ?")?;
        Ok(stmt.exists([id])?)
    }

    fn insert(&self, record: &ProcessedRecord) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp();

        let written = conn.execute(
            r#"
            INSERT OR IGNORE INTO kap_records
                (disclosure_id, publish_date, stock, title, summary, notified, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            rusqlite::params![
                record.id,
                record.publish_date,
                record.issuer_codes,
                record.title,
                record.body,
                record.notified,
                now,
            ],
        )?;

        Ok(written > 0)
    }
}

impl Clone for SqliteRecordStore {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcessedRecord> {
    Ok(ProcessedRecord {
        id: row.get(0)?,
        publish_date: row.get(1)?,
        issuer_codes: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        notified: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    /// Helper to create a file-backed store in a temp file
    fn create_test_store() -> (NamedTempFile, SqliteRecordStore) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteRecordStore::open(temp_file.path().to_str().unwrap()).unwrap();
        (temp_file, store)
    }

    fn record(id: &str, title: &str) -> ProcessedRecord {
        ProcessedRecord::from_disclosure(
            &Disclosure::new(id, "01.01.2025 10:00:00", "ABC").with_title(title),
            true,
        )
    }

    #[test]
    fn test_exists_after_insert() {
        let (_temp, store) = create_test_store();

        assert!(!store.exists("A").unwrap());
        assert!(store.insert(&record("A", "first")).unwrap());
        assert!(store.exists("A").unwrap());
        assert!(!store.exists("B").unwrap());
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let (_temp, store) = create_test_store();

        assert!(store.insert(&record("A", "first")).unwrap());
        // Same id with drifted content: ignored, original row kept
        assert!(!store.insert(&record("A", "second")).unwrap());

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("A").unwrap().unwrap().title, "first");
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        {
            let store = SqliteRecordStore::open(&path).unwrap();
            store.insert(&record("A", "first")).unwrap();
        }

        let reopened = SqliteRecordStore::open(&path).unwrap();
        assert!(reopened.exists("A").unwrap());
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (_temp, store) = create_test_store();
        store.insert(&record("A", "first")).unwrap();

        store.initialize().unwrap();
        store.initialize().unwrap();

        assert!(store.exists("A").unwrap());
    }

    #[test]
    fn test_suppressed_flag_roundtrip() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let suppressed = ProcessedRecord::from_disclosure(&Disclosure::new("S", "", "ISMEN"), false);

        store.insert(&suppressed).unwrap();
        let loaded = store.get("S").unwrap().unwrap();
        assert!(!loaded.notified);
        assert_eq!(loaded.issuer_codes, "ISMEN");
        assert_eq!(loaded.publish_date, "");
    }

    #[test]
    fn test_recent_and_clear() {
        let (_temp, store) = create_test_store();
        for id in ["A", "B", "C"] {
            store.insert(&record(id, id)).unwrap();
        }

        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "C");
        assert_eq!(recent[1].id, "B");

        assert_eq!(store.clear().unwrap(), 3);
        assert_eq!(store.count().unwrap(), 0);
        assert!(!store.exists("A").unwrap());
    }

    #[test]
    fn test_id_lookup_uses_index() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let conn = store.lock().unwrap();

        let plan: String = conn
            .query_row(
                "EXPLAIN QUERY PLAN SELECT 1 FROM kap_records WHERE disclosure_id = 'A'",
                [],
                |row| row.get(3),
            )
            .unwrap();

        assert!(plan.contains("USING"), "unexpected plan: {}", plan);
    }

    #[test]
    fn test_clone_shares_connection() {
        let store1 = SqliteRecordStore::open_in_memory().unwrap();
        let store2 = store1.clone();

        store1.insert(&record("A", "first")).unwrap();
        assert!(store2.exists("A").unwrap());
    }
}
