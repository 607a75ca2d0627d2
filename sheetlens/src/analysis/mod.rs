//! Structural analysis stages.
//!
//! A sheet flows through the stages in order:
//!
//! 1. [`RegionSegmenter`] splits the used range into rectangular regions.
//! 2. [`HeaderClassifier`] decides whether each region's first row is a header.
//! 3. [`SampleExtractor`] copies a bounded number of leading data rows.
//! 4. [`TypeInferencer`] assigns one [`DataType`](crate::DataType) per column.
//!
//! [`SheetAnalyzer`] chains these for one sheet. Once every sheet is done,
//! [`RelationshipInferrer`] looks for links between regions across the whole
//! workbook.

pub mod header;
pub mod inference;
pub mod relationships;
pub mod sample;
pub mod segmenter;
pub mod sheet;

pub use header::{HeaderClassifier, HeaderDecision};
pub use inference::{ColumnTypeResult, TypeInferencer, TypeVotes};
pub use relationships::RelationshipInferrer;
pub use sample::SampleExtractor;
pub use segmenter::{OccupancyMask, RegionSegmenter};
pub use sheet::{SheetAnalysis, SheetAnalyzer};
