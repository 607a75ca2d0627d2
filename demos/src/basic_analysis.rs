//! Basic analysis example demonstrating sheetlens' core functionality.
//!
//! This example shows how to:
//! - Describe a workbook through the in-memory grid source
//! - Run an analysis with the default configuration
//! - Render the result for people and for language models
//!
//! Run with:
//! ```bash
//! cargo run --example basic_analysis
//! ```

use std::sync::Arc;

use sheetlens::formatters::{HumanFormatter, MarkdownFormatter};
use sheetlens::grid::{CellData, CellValue, MemoryGrid};
use sheetlens::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // A sales workbook: a product list, an order log with a notes cell beside it
    let mut grid = MemoryGrid::new("sales.xlsx")
        .with_sheet(
            "Products",
            vec![
                vec!["Sku".into(), "Name".into(), "Price".into()],
                vec!["P-100".into(), "Notebook".into(), "$4.50".into()],
                vec!["P-200".into(), "Pencil".into(), "$0.80".into()],
                vec!["P-300".into(), "Stapler".into(), "$12.00".into()],
            ],
        )
        .with_sheet(
            "Orders",
            vec![
                vec!["Date".into(), "Sku".into(), "Qty".into(), "Paid".into()],
                vec!["2024-03-01".into(), "P-100".into(), 3.into(), true.into()],
                vec!["2024-03-01".into(), "P-200".into(), 12.into(), true.into()],
                vec!["2024-03-04".into(), "P-100".into(), 1.into(), false.into()],
                vec!["2024-03-07".into(), "P-300".into(), 2.into(), true.into()],
            ],
        );
    grid.set_cell("Orders", 1, 6, CellData::new("Week 10 figures, unaudited"));
    grid.set_cell(
        "Orders",
        6,
        3,
        CellData::new(CellValue::Formula {
            expression: "=COUNTIF(D2:D5,TRUE)".to_string(),
            cached: Some(Box::new(CellValue::Number(3.0))),
        }),
    );

    println!("Running basic analysis example...\n");

    let orchestrator = AnalysisOrchestrator::new(AnalysisConfig::default())?;
    let analysis = orchestrator.analyze(Arc::new(grid)).await?;

    println!("{}", HumanFormatter::new().format(&analysis)?);
    println!("--- Markdown for model context ---\n");
    println!("{}", MarkdownFormatter::new().format(&analysis)?);

    for relationship in analysis.relationships() {
        println!("Link: {}", relationship.describe());
    }

    Ok(())
}
