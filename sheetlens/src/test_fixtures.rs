//! Workbook fixtures and instrumented grid sources for tests and demos.
//!
//! Available with the `test-utils` feature.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GridError;
use crate::grid::{CellData, CellRange, CellValue, GridSource, MemoryGrid, WorkbookIdentity};

/// One sheet with a `Name`/`Age` table at A1.
pub fn people_grid() -> MemoryGrid {
    MemoryGrid::new("people.xlsx").with_sheet(
        "Sheet1",
        vec![
            vec!["Name".into(), "Age".into()],
            vec!["Alice".into(), 30.into()],
            vec!["Bob".into(), 25.into()],
            vec!["Carol".into(), 41.into()],
        ],
    )
}

/// An `Orders` sheet whose `Customer` column refers to the `Customers` sheet.
pub fn orders_and_customers() -> MemoryGrid {
    MemoryGrid::new("sales.xlsx")
        .with_sheet(
            "Customers",
            vec![
                vec!["Name".into(), "City".into()],
                vec!["Alice".into(), "Paris".into()],
                vec!["Bob".into(), "Lyon".into()],
                vec!["Carol".into(), "Nice".into()],
            ],
        )
        .with_sheet(
            "Orders",
            vec![
                vec!["Order".into(), "Customer".into(), "Total".into()],
                vec![1001.into(), "Alice".into(), "$10.00".into()],
                vec![1002.into(), "Bob".into(), "$12.50".into()],
                vec![1003.into(), "Alice".into(), "$7.25".into()],
                vec![1004.into(), "Carol".into(), "$3.00".into()],
            ],
        )
}

/// A dense numeric table with a header row, `rows` data rows and `cols` columns.
pub fn numeric_table(rows: usize, cols: usize) -> Vec<Vec<CellValue>> {
    let mut table = Vec::with_capacity(rows + 1);
    table.push((0..cols).map(|c| CellValue::from(format!("Metric {c}"))).collect());
    for r in 0..rows {
        table.push((0..cols).map(|c| CellValue::from((r * cols + c) as f64)).collect());
    }
    table
}

/// A workbook with `sheets` sheets, each holding one numeric table.
pub fn wide_workbook(sheets: usize, rows: usize, cols: usize) -> MemoryGrid {
    (0..sheets).fold(MemoryGrid::new("wide.xlsx"), |grid, i| {
        grid.with_sheet(format!("Sheet{}", i + 1), numeric_table(rows, cols))
    })
}

/// Counts how often a workbook is actually read, with an optional delay per sheet.
#[derive(Debug)]
pub struct CountingGrid<G> {
    inner: G,
    delay: Option<Duration>,
    workbook_reads: AtomicUsize,
    sheet_reads: AtomicUsize,
}

impl<G: GridSource> CountingGrid<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            delay: None,
            workbook_reads: AtomicUsize::new(0),
            sheet_reads: AtomicUsize::new(0),
        }
    }

    /// Sleeps for `delay` before every block read.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times the sheet list was read, one per computed analysis.
    pub fn workbook_reads(&self) -> usize {
        self.workbook_reads.load(Ordering::SeqCst)
    }

    /// Number of sheet blocks read.
    pub fn sheet_reads(&self) -> usize {
        self.sheet_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<G: GridSource> GridSource for CountingGrid<G> {
    fn identity(&self) -> WorkbookIdentity {
        self.inner.identity()
    }

    async fn sheet_names(&self) -> Result<Vec<String>, GridError> {
        self.workbook_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.sheet_names().await
    }

    async fn used_range(&self, sheet: &str) -> Result<Option<CellRange>, GridError> {
        self.inner.used_range(sheet).await
    }

    async fn cell(&self, sheet: &str, row: u32, col: u32) -> Result<CellData, GridError> {
        self.inner.cell(sheet, row, col).await
    }

    async fn read_block(
        &self,
        sheet: &str,
        range: CellRange,
    ) -> Result<Vec<Vec<CellData>>, GridError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sheet_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_block(sheet, range).await
    }
}

/// Fails to read the named sheets.
#[derive(Debug)]
pub struct FlakyGrid<G> {
    inner: G,
    failing: HashSet<String>,
}

impl<G: GridSource> FlakyGrid<G> {
    pub fn new<I, S>(inner: G, failing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            failing: failing.into_iter().map(Into::into).collect(),
        }
    }

    fn check(&self, sheet: &str) -> Result<(), GridError> {
        if self.failing.contains(sheet) {
            let cause = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "sheet is protected");
            return Err(GridError::unreadable_with_source(sheet, "sheet is protected", Box::new(cause)));
        }
        Ok(())
    }
}

#[async_trait]
impl<G: GridSource> GridSource for FlakyGrid<G> {
    fn identity(&self) -> WorkbookIdentity {
        self.inner.identity()
    }

    async fn sheet_names(&self) -> Result<Vec<String>, GridError> {
        self.inner.sheet_names().await
    }

    async fn used_range(&self, sheet: &str) -> Result<Option<CellRange>, GridError> {
        self.check(sheet)?;
        self.inner.used_range(sheet).await
    }

    async fn cell(&self, sheet: &str, row: u32, col: u32) -> Result<CellData, GridError> {
        self.check(sheet)?;
        self.inner.cell(sheet, row, col).await
    }

    async fn read_block(
        &self,
        sheet: &str,
        range: CellRange,
    ) -> Result<Vec<Vec<CellData>>, GridError> {
        self.check(sheet)?;
        self.inner.read_block(sheet, range).await
    }
}

/// Wraps a fixture for the orchestrator, keeping a typed handle for assertions.
pub fn shared<G: GridSource + 'static>(grid: G) -> (Arc<G>, Arc<dyn GridSource>) {
    let typed = Arc::new(grid);
    let erased: Arc<dyn GridSource> = typed.clone();
    (typed, erased)
}
