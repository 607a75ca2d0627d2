//! Persistent cache example.
//!
//! Analyses are stored in a SQLite file keyed by a fingerprint of the workbook
//! and the configuration. A second orchestrator opening the same file serves
//! the analysis without reading the workbook again.
//!
//! Run with:
//! ```bash
//! cargo run --example persistent_cache_example
//! ```

use std::sync::Arc;

use sheetlens::cache::SqliteCacheStore;
use sheetlens::formatters::JsonFormatter;
use sheetlens::prelude::*;
use sheetlens::test_fixtures::{orders_and_customers, shared, CountingGrid};
use tempfile::TempDir;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("sheetlens-cache.db");
    let config = AnalysisConfig::default();

    println!("Cache database: {}\n", path.display());

    {
        let store = Arc::new(SqliteCacheStore::open(&path)?);
        let orchestrator = AnalysisOrchestrator::with_store(config.clone(), store.clone())?;
        let (counting, grid) = shared(CountingGrid::new(orders_and_customers()));

        let analysis = orchestrator.analyze(grid).await?;
        println!(
            "First run: {} regions, {} workbook read(s), {} stored analysis",
            analysis.regions.len(),
            counting.workbook_reads(),
            store.count()?
        );
    }

    // Simulates a restart: new store handle, new orchestrator
    let store = Arc::new(SqliteCacheStore::open(&path)?);
    let orchestrator = AnalysisOrchestrator::with_store(config, store)?;
    let (counting, grid) = shared(CountingGrid::new(orders_and_customers()));

    println!("Fingerprint: {}", orchestrator.fingerprint(grid.as_ref()));
    let analysis = orchestrator.analyze(grid).await?;
    println!(
        "Second run: {} regions, {} workbook read(s), {} cache hit(s)\n",
        analysis.regions.len(),
        counting.workbook_reads(),
        orchestrator.cache().stats().hits
    );

    let json = JsonFormatter::with_config(FormatterConfig::minimal()).with_pretty(true);
    println!("{}", json.format(&analysis)?);

    Ok(())
}
