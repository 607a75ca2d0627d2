//! End-to-end tests for AnalysisOrchestrator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sheetlens::grid::{CellValue, GridSource, MemoryGrid};
use sheetlens::test_fixtures::{
    numeric_table, orders_and_customers, people_grid, shared, wide_workbook, CountingGrid,
    FlakyGrid,
};
use sheetlens::{
    cancellation, AnalysisConfig, AnalysisError, AnalysisNote, AnalysisOrchestrator, Cardinality,
    DataType, LimitScope,
};

fn orchestrator(config: AnalysisConfig) -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(config).unwrap()
}

#[tokio::test]
async fn test_name_age_table() {
    let analysis = orchestrator(AnalysisConfig::default())
        .analyze(Arc::new(people_grid()))
        .await
        .unwrap();

    assert_eq!(analysis.workbook, "people.xlsx");
    assert_eq!(analysis.sheet_names, vec!["Sheet1"]);
    assert_eq!(analysis.regions.len(), 1);
    assert!(analysis.notes.is_empty());

    let region = &analysis.regions[0];
    assert_eq!(region.sheet_name, "Sheet1");
    assert_eq!(region.address(), "A1:B4");
    assert!(region.has_headers);
    assert_eq!(region.headers, vec!["Name", "Age"]);
    assert_eq!(region.row_count, 3);
    assert_eq!(region.column_type("Name"), Some(DataType::Text));
    assert_eq!(region.column_type("Age"), Some(DataType::Number));
    assert_eq!(
        region.sample_rows[0],
        vec![CellValue::from("Alice"), CellValue::from(30)]
    );
    assert!(region.relationships.is_empty());
    assert!(analysis.metadata.duration().is_some());
}

#[tokio::test]
async fn test_regions_follow_sheet_order() {
    let grid = MemoryGrid::new("book")
        .with_sheet_at("First", 0, 0, numeric_table(3, 2))
        .with_sheet_at("First", 10, 0, numeric_table(2, 2))
        .with_sheet("Second", numeric_table(2, 3))
        .with_empty_sheet("Third");

    let analysis = orchestrator(AnalysisConfig::default().with_concurrency_limit(3))
        .analyze(Arc::new(grid))
        .await
        .unwrap();

    let located: Vec<String> = analysis.regions.iter().map(|r| r.reference()).collect();
    assert_eq!(located, vec!["First!A1:B4", "First!A11:B13", "Second!A1:C3"]);
    assert_eq!(analysis.regions_on("Third").count(), 0);
}

#[tokio::test]
async fn test_relationships_across_sheets() {
    let analysis = orchestrator(AnalysisConfig::default())
        .analyze(Arc::new(orders_and_customers()))
        .await
        .unwrap();

    let relationships: Vec<_> = analysis.relationships().collect();
    assert_eq!(relationships.len(), 1);
    let relationship = relationships[0];
    assert_eq!(relationship.kind, Cardinality::ManyToOne);
    assert_eq!(relationship.source_region, "Orders!A1:C5");
    assert_eq!(relationship.source_column, "Customer");
    assert_eq!(relationship.target_region, "Customers!A1:B4");
    assert_eq!(relationship.target_column, "Name");

    let orders = analysis.region("Orders", "A1:C5").unwrap();
    assert_eq!(orders.relationships.len(), 1);
    assert_eq!(orders.column_type("Total"), Some(DataType::Currency));
}

#[tokio::test]
async fn test_relationships_disabled() {
    let config = AnalysisConfig::default().with_advanced_detection(false);
    let analysis = orchestrator(config)
        .analyze(Arc::new(orders_and_customers()))
        .await
        .unwrap();
    assert_eq!(analysis.relationships().count(), 0);
}

#[tokio::test]
async fn test_partial_failure_is_noted() {
    let grid = FlakyGrid::new(orders_and_customers(), ["Orders"]);
    let analysis = orchestrator(AnalysisConfig::default())
        .analyze(Arc::new(grid))
        .await
        .unwrap();

    assert!(analysis.is_partial());
    assert_eq!(analysis.regions.len(), 1);
    assert_eq!(analysis.regions[0].sheet_name, "Customers");
    let errors: Vec<_> = analysis.ingest_errors().collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], AnalysisNote::Ingest { sheet, .. } if sheet == "Orders"));
}

#[tokio::test]
async fn test_all_sheets_failing_is_fatal() {
    let grid = FlakyGrid::new(orders_and_customers(), ["Orders", "Customers"]);
    let err = orchestrator(AnalysisConfig::default())
        .analyze(Arc::new(grid))
        .await
        .unwrap_err();

    match err {
        AnalysisError::NoReadableSheets { attempted, source } => {
            assert_eq!(attempted, 2);
            assert!(source.to_string().contains("Customers"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_empty_workbook_is_fatal() {
    let err = orchestrator(AnalysisConfig::default())
        .analyze(Arc::new(MemoryGrid::new("empty.xlsx")))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyWorkbook));
}

#[tokio::test]
async fn test_blank_sheets_are_not_failures() {
    let grid = MemoryGrid::new("blank.xlsx").with_empty_sheet("Sheet1");
    let analysis = orchestrator(AnalysisConfig::default())
        .analyze(Arc::new(grid))
        .await
        .unwrap();
    assert!(analysis.regions.is_empty());
    assert!(!analysis.is_partial());
}

#[tokio::test]
async fn test_limits_produce_notes() {
    let config = AnalysisConfig::default()
        .with_max_sheets(2)
        .with_max_rows(4)
        .with_max_samples(2);
    let analysis = orchestrator(config)
        .analyze(Arc::new(wide_workbook(3, 10, 2)))
        .await
        .unwrap();

    assert_eq!(analysis.sheet_names.len(), 3);
    assert_eq!(analysis.regions.len(), 2);
    assert!(analysis.regions.iter().all(|r| r.range.row_count() == 4));
    assert!(analysis.regions.iter().all(|r| r.sample_rows.len() == 2));

    let scopes: Vec<LimitScope> = analysis
        .limit_notes()
        .filter_map(|n| match n {
            AnalysisNote::LimitExceeded { scope, .. } => Some(*scope),
            _ => None,
        })
        .collect();
    assert_eq!(scopes.iter().filter(|s| **s == LimitScope::Sheets).count(), 1);
    assert_eq!(scopes.iter().filter(|s| **s == LimitScope::Rows).count(), 2);
    assert_eq!(scopes.iter().filter(|s| **s == LimitScope::Samples).count(), 2);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_computation() {
    let (counting, grid) =
        shared(CountingGrid::new(wide_workbook(4, 20, 3)).with_delay(Duration::from_millis(20)));
    let orchestrator = Arc::new(orchestrator(AnalysisConfig::default().with_cache(false)));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let orchestrator = Arc::clone(&orchestrator);
        let grid = Arc::clone(&grid);
        handles.push(tokio::spawn(async move { orchestrator.analyze(grid).await }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(counting.workbook_reads(), 1);
    assert_eq!(counting.sheet_reads(), 4);
    assert!(results.iter().all(|r| **r == *results[0]));
}

#[tokio::test]
async fn test_cached_result_is_reused() {
    let (counting, grid) = shared(CountingGrid::new(people_grid()));
    let orchestrator = orchestrator(AnalysisConfig::default());

    let first = orchestrator.analyze(Arc::clone(&grid)).await.unwrap();
    let second = orchestrator.analyze(grid).await.unwrap();

    assert_eq!(counting.workbook_reads(), 1);
    assert_eq!(*first, *second);
    assert_eq!(orchestrator.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_config_change_is_a_different_fingerprint() {
    let grid: Arc<dyn GridSource> = Arc::new(people_grid());
    let a = orchestrator(AnalysisConfig::default());
    let b = orchestrator(AnalysisConfig::default().with_max_samples(1));
    assert_ne!(a.fingerprint(grid.as_ref()), b.fingerprint(grid.as_ref()));
}

#[tokio::test]
async fn test_content_change_invalidates_cache() {
    let orchestrator = orchestrator(AnalysisConfig::default());
    let before = orchestrator.analyze(Arc::new(people_grid())).await.unwrap();

    let mut edited = people_grid();
    edited.set_cell("Sheet1", 4, 0, sheetlens::grid::CellData::new("Dave"));
    edited.set_cell("Sheet1", 4, 1, sheetlens::grid::CellData::new(52));
    let after = orchestrator.analyze(Arc::new(edited)).await.unwrap();

    assert_eq!(before.regions[0].row_count, 3);
    assert_eq!(after.regions[0].row_count, 4);
}

#[tokio::test]
async fn test_cancellation_before_start() {
    let (handle, signal) = cancellation();
    handle.cancel();
    let (counting, grid) = shared(CountingGrid::new(people_grid()));
    let orchestrator = orchestrator(AnalysisConfig::default());

    let err = orchestrator
        .analyze_with_cancel(grid.clone(), signal)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(counting.sheet_reads(), 0);

    // nothing was cached, so a later request computes
    orchestrator.analyze(grid).await.unwrap();
    assert_eq!(orchestrator.cache().stats().hits, 0);
}

#[tokio::test]
async fn test_cancellation_mid_run_stops_new_sheets() {
    let (counting, grid) =
        shared(CountingGrid::new(wide_workbook(6, 5, 2)).with_delay(Duration::from_millis(40)));
    let orchestrator = Arc::new(orchestrator(
        AnalysisConfig::default().with_concurrency_limit(1),
    ));
    let (handle, signal) = cancellation();

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        let grid = Arc::clone(&grid);
        tokio::spawn(async move { orchestrator.analyze_with_cancel(grid, signal).await })
    };
    tokio::time::sleep(Duration::from_millis(60)).await;
    handle.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(counting.sheet_reads() < 6);

    let analysis = orchestrator.analyze(grid).await.unwrap();
    assert_eq!(analysis.regions.len(), 6);
}

#[tokio::test]
async fn test_progress_reports_every_sheet() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let orchestrator = AnalysisOrchestrator::new(AnalysisConfig::default())
        .unwrap()
        .on_progress(move |fraction| {
            assert!((0.0..=1.0).contains(&fraction));
            seen.fetch_add(1, Ordering::SeqCst);
        });

    orchestrator
        .analyze(Arc::new(wide_workbook(3, 2, 2)))
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = AnalysisOrchestrator::new(AnalysisConfig::default().with_concurrency_limit(0))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Configuration(_)));
}
