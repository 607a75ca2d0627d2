//! # sheetlens - Structure Analysis for Spreadsheets
//!
//! sheetlens inspects schema-less workbooks and reports what is in them: where
//! the tables are, which rows are headers, what type each column holds, a few
//! sample rows, and which columns of different tables refer to each other. The
//! result is an [`Analysis`] that hosts can hand to people, tools or language
//! models.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use sheetlens::prelude::*;
//! use sheetlens::grid::{CellValue, MemoryGrid};
//!
//! # async fn example() -> sheetlens::Result<()> {
//! let grid = MemoryGrid::new("people.xlsx").with_sheet(
//!     "Sheet1",
//!     vec![
//!         vec!["Name".into(), "Age".into()],
//!         vec!["Alice".into(), CellValue::from(30)],
//!         vec!["Bob".into(), CellValue::from(25)],
//!     ],
//! );
//!
//! let orchestrator = AnalysisOrchestrator::new(AnalysisConfig::default())?;
//! let analysis = orchestrator.analyze(Arc::new(grid)).await?;
//!
//! for region in &analysis.regions {
//!     println!("{}: {}", region.reference(), region.description);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! Each sheet is read once through a [`GridSource`](grid::GridSource) and then:
//!
//! 1. split into regions of connected occupied cells, where a single blank row
//!    or column does not break a region;
//! 2. checked for a header row;
//! 3. sampled (at most `max_samples` leading data rows);
//! 4. typed column by column.
//!
//! When `use_advanced_detection` is on, a final pass links columns across
//! regions whose values overlap, classifying each link as one-to-one,
//! one-to-many or many-to-one.
//!
//! ## Concurrency and Caching
//!
//! Sheets are processed by a fixed pool of `concurrency_limit` workers.
//! Results are cached by a fingerprint of the workbook identity and the
//! configuration, and concurrent requests for the same fingerprint share one
//! computation. A persistent SQLite store is available behind the default
//! `sqlite-cache` feature.
//!
//! ## Architecture
//!
//! - **`grid`**: the [`GridSource`](grid::GridSource) boundary and cell types
//! - **`analysis`**: segmentation, header classification, sampling, type and
//!   relationship inference
//! - **`orchestrator`**: workbook-level fan-out, cancellation and error policy
//! - **`cache`**: fingerprints, stores and in-flight deduplication
//! - **`formatters`**: human, JSON and Markdown output
//! - **`logging`**: logging presets and subscriber setup

pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod formatters;
pub mod grid;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod prelude;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use model::{
    Analysis, AnalysisMetadata, AnalysisNote, Cardinality, DataType, LimitScope, Region,
    Relationship,
};
pub use orchestrator::{cancellation, AnalysisOrchestrator, CancellationHandle, CancellationSignal};
