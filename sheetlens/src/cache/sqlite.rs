//! SQLite-backed cache store for analyses that survive restarts.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};

use super::{CacheStore, Fingerprint};
use crate::error::CacheError;
use crate::model::Analysis;

/// Persists analyses as JSON rows keyed by fingerprint.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Create or open a store at the given file path.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path)
            .map_err(|e| CacheError::storage(format!("Failed to open cache database: {e}")))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store for testing.
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CacheError::storage(format!("Failed to create in-memory cache: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, CacheError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), CacheError> {
        self.lock()?
            .execute(
                "CREATE TABLE IF NOT EXISTS analyses (
                    fingerprint TEXT PRIMARY KEY,
                    payload TEXT NOT NULL,
                    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
                )",
                [],
            )
            .map_err(|e| CacheError::storage(format!("Failed to create schema: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|e| CacheError::storage(format!("Failed to acquire lock: {e}")))
    }

    /// Removes one entry. Returns true if it existed.
    pub fn remove(&self, fingerprint: &Fingerprint) -> Result<bool, CacheError> {
        let removed = self
            .lock()?
            .execute(
                "DELETE FROM analyses WHERE fingerprint = ?1",
                [fingerprint.as_str()],
            )
            .map_err(|e| CacheError::storage(format!("Failed to remove analysis: {e}")))?;
        Ok(removed > 0)
    }

    /// Remove all cached entries.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.lock()?
            .execute("DELETE FROM analyses", [])
            .map_err(|e| CacheError::storage(format!("Failed to clear cache: {e}")))?;
        Ok(())
    }

    /// Number of stored analyses.
    pub fn count(&self) -> Result<usize, CacheError> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))
            .map_err(|e| CacheError::storage(format!("Failed to count analyses: {e}")))?;
        Ok(count as usize)
    }
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Analysis>, CacheError> {
        let payload: Option<String> = self
            .lock()?
            .query_row(
                "SELECT payload FROM analyses WHERE fingerprint = ?1",
                [fingerprint.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CacheError::storage(format!("Failed to read analysis: {e}")))?;

        payload
            .map(|json| serde_json::from_str(&json).map_err(CacheError::from))
            .transpose()
    }

    fn put(&self, fingerprint: &Fingerprint, analysis: &Analysis) -> Result<(), CacheError> {
        let payload = serde_json::to_string(analysis)?;
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO analyses (fingerprint, payload) VALUES (?1, ?2)",
                rusqlite::params![fingerprint.as_str(), payload],
            )
            .map_err(|e| CacheError::storage(format!("Failed to save analysis: {e}")))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::grid::{CellRange, WorkbookIdentity};
    use crate::model::{AnalysisNote, Region};

    fn fp(name: &str) -> Fingerprint {
        Fingerprint::compute(&WorkbookIdentity::path_only(name), &AnalysisConfig::default())
    }

    fn sample() -> Analysis {
        let mut analysis = Analysis::new("book.xlsx", vec!["Sheet1".into()]);
        let mut region = Region::new("Sheet1", CellRange::new(0, 0, 2, 1));
        region.headers = vec!["Name".into(), "Age".into()];
        region.sample_rows = vec![vec!["Alice".into(), 30.into()]];
        analysis.regions.push(region);
        analysis.notes.push(AnalysisNote::ingest("Hidden", "locked"));
        analysis.metadata.record_start();
        analysis.metadata.record_end();
        analysis
    }

    #[test]
    fn test_round_trip() {
        let store = SqliteCacheStore::in_memory().unwrap();
        let analysis = sample();
        store.put(&fp("book"), &analysis).unwrap();
        assert_eq!(store.get(&fp("book")).unwrap(), Some(analysis));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_missing_entry() {
        let store = SqliteCacheStore::in_memory().unwrap();
        assert!(store.get(&fp("nope")).unwrap().is_none());
        assert!(!store.remove(&fp("nope")).unwrap());
    }

    #[test]
    fn test_replace_and_clear() {
        let store = SqliteCacheStore::in_memory().unwrap();
        store.put(&fp("book"), &sample()).unwrap();
        store.put(&fp("book"), &sample()).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_file_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyses.db");
        let analysis = sample();
        {
            let store = SqliteCacheStore::open(&path).unwrap();
            store.put(&fp("book"), &analysis).unwrap();
        }
        let reopened = SqliteCacheStore::open(&path).unwrap();
        assert_eq!(reopened.get(&fp("book")).unwrap(), Some(analysis));
    }
}
