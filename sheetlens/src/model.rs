//! The structural model produced by an analysis run.
//!
//! An [`Analysis`] is the aggregate root: it owns every [`Region`] found across
//! the workbook, in sheet order and then row-major order within each sheet,
//! together with the non-fatal [`AnalysisNote`]s collected along the way.
//! Once the orchestrator returns it, an analysis is shared read-only behind an
//! `Arc` and may be serialized to the cache.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grid::{qualified_reference, CellRange, CellValue};

/// Semantic type assigned to a column.
///
/// Variants are declared in precedence order: when votes tie, the variant
/// declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Formula,
    Currency,
    Date,
    Number,
    Boolean,
    Text,
    Unknown,
}

impl DataType {
    /// All types, most specific first.
    pub const PRECEDENCE: [DataType; 7] = [
        DataType::Formula,
        DataType::Currency,
        DataType::Date,
        DataType::Number,
        DataType::Boolean,
        DataType::Text,
        DataType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Formula => "Formula",
            DataType::Currency => "Currency",
            DataType::Date => "Date",
            DataType::Number => "Number",
            DataType::Boolean => "Boolean",
            DataType::Text => "Text",
            DataType::Unknown => "Unknown",
        }
    }

    /// Numeric types whose values can be joined against each other.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Number | DataType::Currency)
    }

    /// Returns true if two columns of these types may hold the same keys.
    pub fn is_join_compatible(&self, other: &DataType) -> bool {
        (*self == DataType::Text && *other == DataType::Text)
            || (self.is_numeric() && other.is_numeric())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a column correspondence between two regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
}

impl Cardinality {
    /// The same relationship seen from the other side.
    pub fn inverse(&self) -> Cardinality {
        match self {
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cardinality::OneToOne => "OneToOne",
            Cardinality::OneToMany => "OneToMany",
            Cardinality::ManyToOne => "ManyToOne",
        };
        f.write_str(name)
    }
}

/// A foreign-key-like correspondence from a column of one region to a column of another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Qualified reference of the source region, e.g. `Orders!A1:C20`
    pub source_region: String,
    pub source_column: String,
    /// Qualified reference of the target region
    pub target_region: String,
    pub target_column: String,
    pub kind: Cardinality,
    /// Share of the source column's distinct sampled values found in the target column
    pub overlap: f64,
}

impl Relationship {
    /// One-line description, e.g. `ManyToOne: Orders!A1:C20[Customer] -> Customers!A1:B5[Name]`.
    pub fn describe(&self) -> String {
        format!(
            "{}: {}[{}] -> {}[{}]",
            self.kind, self.source_region, self.source_column, self.target_region, self.target_column
        )
    }
}

/// A detected rectangular block of related cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub sheet_name: String,
    /// Full extent of the region, header row included
    pub range: CellRange,
    /// Column labels in column order, synthesized when the region has no header row
    pub headers: Vec<String>,
    pub has_headers: bool,
    /// Number of data rows, header row excluded
    pub row_count: usize,
    /// Exactly one entry per header name
    pub column_types: BTreeMap<String, DataType>,
    /// Leading data rows in document order
    pub sample_rows: Vec<Vec<CellValue>>,
    pub description: String,
    pub relationships: Vec<Relationship>,
}

impl Region {
    /// Creates an unclassified region covering `range`.
    pub fn new(sheet_name: impl Into<String>, range: CellRange) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            range,
            headers: Vec::new(),
            has_headers: false,
            row_count: range.row_count() as usize,
            column_types: BTreeMap::new(),
            sample_rows: Vec::new(),
            description: String::new(),
            relationships: Vec::new(),
        }
    }

    /// A1 address of the region within its sheet.
    pub fn address(&self) -> String {
        self.range.to_a1()
    }

    /// Sheet-qualified reference, e.g. `Sheet1!A1:B4`.
    pub fn reference(&self) -> String {
        qualified_reference(&self.sheet_name, &self.range)
    }

    pub fn column_count(&self) -> usize {
        self.range.col_count() as usize
    }

    /// Extent of the data rows, or `None` for a header-only region.
    pub fn data_range(&self) -> Option<CellRange> {
        if self.has_headers {
            if self.range.row_count() < 2 {
                return None;
            }
            Some(CellRange {
                first_row: self.range.first_row + 1,
                ..self.range
            })
        } else {
            Some(self.range)
        }
    }

    pub fn column_type(&self, header: &str) -> Option<DataType> {
        self.column_types.get(header).copied()
    }

    /// Index of a header in column order.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// First `n` sample rows.
    pub fn preview(&self, n: usize) -> &[Vec<CellValue>] {
        &self.sample_rows[..n.min(self.sample_rows.len())]
    }

    /// Sampled values of one column, in row order.
    pub fn sample_column(&self, index: usize) -> impl Iterator<Item = &CellValue> {
        self.sample_rows.iter().filter_map(move |row| row.get(index))
    }

    pub fn is_single_cell(&self) -> bool {
        self.range.row_count() == 1 && self.range.col_count() == 1
    }
}

/// Which configured cap truncated processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitScope {
    /// Sheets beyond `max_sheets` were not analyzed
    Sheets,
    /// Rows beyond `max_rows` were not read
    Rows,
    /// Only `max_samples` rows of a region were sampled
    Samples,
}

/// Non-fatal record attached to an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisNote {
    /// A sheet could not be read; the rest of the workbook was still analyzed.
    Ingest { sheet: String, message: String },
    /// A configured cap truncated processing.
    LimitExceeded {
        scope: LimitScope,
        /// Sheet the limit applied to, if any
        sheet: Option<String>,
        /// Region the limit applied to, if any
        region: Option<String>,
        limit: usize,
        actual: usize,
    },
}

impl AnalysisNote {
    pub fn ingest(sheet: impl Into<String>, message: impl Into<String>) -> Self {
        AnalysisNote::Ingest {
            sheet: sheet.into(),
            message: message.into(),
        }
    }

    pub fn is_ingest_error(&self) -> bool {
        matches!(self, AnalysisNote::Ingest { .. })
    }
}

impl fmt::Display for AnalysisNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisNote::Ingest { sheet, message } => {
                write!(f, "sheet '{sheet}' could not be read: {message}")
            }
            AnalysisNote::LimitExceeded {
                scope,
                sheet,
                region,
                limit,
                actual,
            } => {
                let target = match (region, sheet) {
                    (Some(region), _) => format!(" in {region}"),
                    (None, Some(sheet)) => format!(" on sheet '{sheet}'"),
                    (None, None) => String::new(),
                };
                write!(f, "{scope:?} limit of {limit} reached{target} ({actual} present)")
            }
        }
    }
}

/// Timing information about an analysis run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AnalysisMetadata {
    pub fn record_start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn record_end(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Structural analysis of a whole workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Logical name of the analyzed workbook
    pub workbook: String,
    /// All sheet names in workbook order, including sheets skipped by limits
    pub sheet_names: Vec<String>,
    /// Regions in sheet order, then row-major order within each sheet
    pub regions: Vec<Region>,
    pub notes: Vec<AnalysisNote>,
    pub metadata: AnalysisMetadata,
}

impl Analysis {
    pub fn new(workbook: impl Into<String>, sheet_names: Vec<String>) -> Self {
        Self {
            workbook: workbook.into(),
            sheet_names,
            regions: Vec::new(),
            notes: Vec::new(),
            metadata: AnalysisMetadata::default(),
        }
    }

    /// Regions found on one sheet.
    pub fn regions_on<'a>(&'a self, sheet: &'a str) -> impl Iterator<Item = &'a Region> + 'a {
        self.regions.iter().filter(move |r| r.sheet_name == sheet)
    }

    /// Looks up a region by sheet name and A1 address.
    pub fn region(&self, sheet: &str, address: &str) -> Option<&Region> {
        let range = CellRange::parse_a1(address)?;
        self.regions
            .iter()
            .find(|r| r.sheet_name == sheet && r.range == range)
    }

    /// Every relationship in the analysis, in source-region order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.regions.iter().flat_map(|r| r.relationships.iter())
    }

    pub fn ingest_errors(&self) -> impl Iterator<Item = &AnalysisNote> {
        self.notes.iter().filter(|n| n.is_ingest_error())
    }

    pub fn limit_notes(&self) -> impl Iterator<Item = &AnalysisNote> {
        self.notes.iter().filter(|n| !n.is_ingest_error())
    }

    /// Returns true if any sheet failed to load.
    pub fn is_partial(&self) -> bool {
        self.ingest_errors().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order_matches_ord() {
        let mut sorted = DataType::PRECEDENCE.to_vec();
        sorted.sort();
        assert_eq!(sorted, DataType::PRECEDENCE.to_vec());
        assert!(DataType::Currency < DataType::Number);
    }

    #[test]
    fn test_join_compatibility() {
        assert!(DataType::Text.is_join_compatible(&DataType::Text));
        assert!(DataType::Number.is_join_compatible(&DataType::Currency));
        assert!(!DataType::Text.is_join_compatible(&DataType::Number));
        assert!(!DataType::Date.is_join_compatible(&DataType::Date));
    }

    #[test]
    fn test_region_data_range() {
        let mut region = Region::new("Sheet1", CellRange::new(0, 0, 3, 1));
        assert_eq!(region.data_range(), Some(CellRange::new(0, 0, 3, 1)));
        region.has_headers = true;
        assert_eq!(region.data_range(), Some(CellRange::new(1, 0, 3, 1)));
        assert_eq!(region.reference(), "Sheet1!A1:B4");
    }

    #[test]
    fn test_region_lookup() {
        let mut analysis = Analysis::new("book", vec!["Sheet1".into()]);
        analysis
            .regions
            .push(Region::new("Sheet1", CellRange::new(0, 0, 3, 1)));
        assert!(analysis.region("Sheet1", "A1:B4").is_some());
        assert!(analysis.region("Sheet1", "A1:B5").is_none());
        assert!(analysis.region("Other", "A1:B4").is_none());
    }

    #[test]
    fn test_note_display() {
        let note = AnalysisNote::LimitExceeded {
            scope: LimitScope::Rows,
            sheet: Some("Data".into()),
            region: None,
            limit: 100,
            actual: 250,
        };
        assert_eq!(
            note.to_string(),
            "Rows limit of 100 reached on sheet 'Data' (250 present)"
        );
        assert!(AnalysisNote::ingest("Data", "locked").is_ingest_error());
    }

    #[test]
    fn test_cardinality_inverse() {
        assert_eq!(Cardinality::ManyToOne.inverse(), Cardinality::OneToMany);
        assert_eq!(Cardinality::OneToOne.inverse(), Cardinality::OneToOne);
    }
}
