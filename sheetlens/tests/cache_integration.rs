//! Caching behavior through the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use sheetlens::cache::{CacheStore, Fingerprint, MemoryCacheStore, SqliteCacheStore};
use sheetlens::error::CacheError;
use sheetlens::test_fixtures::{orders_and_customers, people_grid, shared, CountingGrid};
use sheetlens::{Analysis, AnalysisConfig, AnalysisOrchestrator};
use tempfile::TempDir;

#[tokio::test]
async fn test_sqlite_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("analyses.db");

    let first = {
        let store = Arc::new(SqliteCacheStore::open(&path).unwrap());
        let orchestrator =
            AnalysisOrchestrator::with_store(AnalysisConfig::default(), store.clone()).unwrap();
        let analysis = orchestrator
            .analyze(Arc::new(orders_and_customers()))
            .await
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
        analysis
    };

    let (counting, grid) = shared(CountingGrid::new(orders_and_customers()));
    let store = Arc::new(SqliteCacheStore::open(&path).unwrap());
    let orchestrator = AnalysisOrchestrator::with_store(AnalysisConfig::default(), store).unwrap();
    let second = orchestrator.analyze(grid).await.unwrap();

    assert_eq!(counting.workbook_reads(), 0);
    assert_eq!(*first, *second);
    assert_eq!(second.relationships().count(), 1);
}

#[tokio::test]
async fn test_disabled_cache_recomputes() {
    let store = Arc::new(SqliteCacheStore::in_memory().unwrap());
    let config = AnalysisConfig::default().with_cache(false);
    let orchestrator = AnalysisOrchestrator::with_store(config, store.clone()).unwrap();
    let (counting, grid) = shared(CountingGrid::new(people_grid()));

    orchestrator.analyze(Arc::clone(&grid)).await.unwrap();
    orchestrator.analyze(grid).await.unwrap();

    assert_eq!(counting.workbook_reads(), 2);
    assert_eq!(store.count().unwrap(), 0);
    assert!(!orchestrator.cache().is_persistent());
}

#[tokio::test]
async fn test_expired_entries_are_recomputed() {
    let store = Arc::new(MemoryCacheStore::with_config(
        Some(Duration::from_millis(20)),
        16,
    ));
    let orchestrator =
        AnalysisOrchestrator::with_store(AnalysisConfig::default(), store.clone()).unwrap();
    let (counting, grid) = shared(CountingGrid::new(people_grid()));

    orchestrator.analyze(Arc::clone(&grid)).await.unwrap();
    orchestrator.analyze(Arc::clone(&grid)).await.unwrap();
    assert_eq!(counting.workbook_reads(), 1);

    tokio::time::sleep(Duration::from_millis(40)).await;
    orchestrator.analyze(grid).await.unwrap();
    assert_eq!(counting.workbook_reads(), 2);
}

struct BrokenStore;

impl CacheStore for BrokenStore {
    fn get(&self, _: &Fingerprint) -> Result<Option<Analysis>, CacheError> {
        Err(CacheError::storage("disk unavailable"))
    }

    fn put(&self, _: &Fingerprint, _: &Analysis) -> Result<(), CacheError> {
        Err(CacheError::storage("disk unavailable"))
    }
}

#[tokio::test]
async fn test_broken_store_does_not_fail_analysis() {
    let orchestrator =
        AnalysisOrchestrator::with_store(AnalysisConfig::default(), Arc::new(BrokenStore)).unwrap();

    let analysis = orchestrator.analyze(Arc::new(people_grid())).await.unwrap();
    assert_eq!(analysis.regions.len(), 1);

    let stats = orchestrator.cache().stats();
    assert_eq!(stats.store_errors, 2);
    assert_eq!(stats.hits, 0);
}

#[tokio::test]
async fn test_fingerprint_matches_stored_key() {
    let store = Arc::new(SqliteCacheStore::in_memory().unwrap());
    let orchestrator =
        AnalysisOrchestrator::with_store(AnalysisConfig::default(), store.clone()).unwrap();
    let grid = Arc::new(people_grid());

    let analysis = orchestrator.analyze(grid.clone()).await.unwrap();
    let fingerprint = orchestrator.fingerprint(grid.as_ref());

    assert_eq!(fingerprint.as_str().len(), 64);
    assert_eq!(store.get(&fingerprint).unwrap().as_ref(), Some(&*analysis));
    assert!(store.remove(&fingerprint).unwrap());
    assert_eq!(store.count().unwrap(), 0);
}
