//! Example demonstrating structured logging during analysis.
//!
//! This example shows how sheetlens logs with:
//! - JSON output from the global subscriber
//! - Span fields for workbook, sheet and worker
//! - Per-region and per-cache detail controlled by `LogConfig`
//!
//! Run with:
//! ```bash
//! RUST_LOG=info,sheetlens=debug cargo run --example structured_logging_example
//! ```

use std::sync::Arc;
use std::time::Duration;

use sheetlens::logging::setup::{init_logging, LoggingConfig};
use sheetlens::prelude::*;
use sheetlens::test_fixtures::{orders_and_customers, wide_workbook, CountingGrid, FlakyGrid};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging(
        LoggingConfig::development()
            .with_json_format(true)
            .with_engine_level(Level::DEBUG),
    )?;

    info!("Structured logging initialized");

    let orchestrator = Arc::new(
        AnalysisOrchestrator::new(AnalysisConfig::default().with_max_sheets(6))?
            .with_log_config(LogConfig::verbose()),
    );

    // A partially unreadable workbook still produces an analysis
    let flaky = FlakyGrid::new(orders_and_customers(), ["Customers"]);
    let analysis = orchestrator.analyze(Arc::new(flaky)).await?;
    info!(
        regions = analysis.regions.len(),
        ingest_errors = analysis.ingest_errors().count(),
        "Partial analysis finished"
    );

    // Concurrent requests for one workbook share a computation
    let grid: Arc<dyn GridSource> =
        Arc::new(CountingGrid::new(wide_workbook(8, 200, 5)).with_delay(Duration::from_millis(5)));
    let requests = (0..4).map(|_| {
        let orchestrator = Arc::clone(&orchestrator);
        let grid = Arc::clone(&grid);
        tokio::spawn(async move { orchestrator.analyze(grid).await })
    });
    for request in requests.collect::<Vec<_>>() {
        let analysis = request.await??;
        info!(
            regions = analysis.regions.len(),
            limit_notes = analysis.limit_notes().count(),
            "Request served"
        );
    }

    let stats = orchestrator.cache().stats();
    info!(
        hits = stats.hits,
        computations = stats.computations,
        joined = stats.joined,
        "Cache statistics"
    );

    Ok(())
}
