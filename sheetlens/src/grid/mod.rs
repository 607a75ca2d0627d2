//! The grid boundary: how the engine reads raw cells from a workbook.
//!
//! The engine never opens files itself. A host exposes a workbook through the
//! [`GridSource`] trait, which hands out cell values, display formats and the
//! used range of each sheet. Implementations must tolerate concurrent calls for
//! different sheets, since the orchestrator reads sheets from several workers
//! at once.
//!
//! [`MemoryGrid`] is an in-memory implementation used by hosts that already
//! hold the cell values and by the test suite.

mod address;
mod memory;

pub use address::{column_index, column_letter, column_letters, qualified_reference, CellRange};
pub use memory::MemoryGrid;

use std::fmt::{self, Debug};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::GridError;

/// Raw value stored in a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// A formula with its last computed value, when the source provides one.
    Formula {
        expression: String,
        cached: Option<Box<CellValue>>,
    },
    /// An error value such as `#N/A` or `#DIV/0!`.
    Error(String),
}

impl CellValue {
    /// Returns true for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// The value a formula evaluated to, or the value itself for non-formulas.
    pub fn resolved(&self) -> &CellValue {
        match self {
            CellValue::Formula {
                cached: Some(inner),
                ..
            } => inner.resolved(),
            other => other,
        }
    }

    /// Textual rendering used for samples, comparisons and header labels.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(text) => text.trim().to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Formula {
                cached: Some(inner),
                ..
            } => inner.as_text(),
            CellValue::Formula {
                expression,
                cached: None,
            } => expression.clone(),
            CellValue::Error(code) => code.clone(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Formats a number the way a spreadsheet shows it in "General" format.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::from(value.as_str())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// A cell as exposed by a grid source: its raw value plus its display format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CellData {
    pub value: CellValue,
    /// Number format string such as `"$#,##0.00"` or `"yyyy-mm-dd"`.
    /// `None` and `"General"` both mean the default format.
    pub format: Option<String>,
}

impl CellData {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the cell carries a non-default display format.
    pub fn has_custom_format(&self) -> bool {
        matches!(&self.format, Some(f) if !f.trim().is_empty() && !f.eq_ignore_ascii_case("general"))
    }

    /// A cell is occupied when it holds a non-blank value or a non-default format.
    pub fn is_occupied(&self) -> bool {
        !self.value.is_blank() || self.has_custom_format()
    }
}

impl From<CellValue> for CellData {
    fn from(value: CellValue) -> Self {
        CellData::new(value)
    }
}

/// Identity of a workbook as used for cache fingerprinting.
///
/// Identities built with [`WorkbookIdentity::from_path`] or
/// [`WorkbookIdentity::from_bytes`] change whenever the file content changes.
/// [`WorkbookIdentity::path_only`] does not, so a file edited in place keeps
/// its old fingerprint and may be served a stale analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkbookIdentity {
    /// Path or logical name of the workbook
    pub name: String,
    /// Size in bytes, when known
    pub size: Option<u64>,
    /// Last modification time in Unix milliseconds, when known
    pub modified_ms: Option<i64>,
    /// Hex-encoded SHA-256 of the content, when computed
    pub digest: Option<String>,
}

impl WorkbookIdentity {
    /// Identity from file metadata (size and modification time).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GridError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let modified_ms = metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis());
        Ok(Self {
            name: path.display().to_string(),
            size: Some(metadata.len()),
            modified_ms,
            digest: None,
        })
    }

    /// Identity from file metadata plus a SHA-256 digest of the file content.
    pub fn from_path_with_digest(path: impl AsRef<Path>) -> Result<Self, GridError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mut identity = Self::from_path(path)?;
        identity.digest = Some(hex::encode(Sha256::digest(&bytes)));
        Ok(identity)
    }

    /// Identity from in-memory content.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            size: Some(bytes.len() as u64),
            modified_ms: None,
            digest: Some(hex::encode(Sha256::digest(bytes))),
        }
    }

    /// Identity from the path alone. Edits to the file are not detected.
    pub fn path_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            modified_ms: None,
            digest: None,
        }
    }

    /// Returns true if the identity changes when the workbook content changes.
    pub fn is_content_based(&self) -> bool {
        self.digest.is_some() || (self.size.is_some() && self.modified_ms.is_some())
    }
}

/// Uniform accessor over the cells of a workbook.
///
/// Coordinates are 0-based. Implementations must be safe to call from multiple
/// workers concurrently for different sheets.
#[async_trait]
pub trait GridSource: Debug + Send + Sync {
    /// Identity of the underlying workbook, used for cache fingerprints.
    fn identity(&self) -> WorkbookIdentity;

    /// Sheet names in workbook order.
    async fn sheet_names(&self) -> Result<Vec<String>, GridError>;

    /// Bounds of the used range, or `None` for an empty sheet.
    async fn used_range(&self, sheet: &str) -> Result<Option<CellRange>, GridError>;

    /// Value and display format of a single cell.
    async fn cell(&self, sheet: &str, row: u32, col: u32) -> Result<CellData, GridError>;

    /// Reads a rectangular block, row by row.
    ///
    /// The default implementation calls [`GridSource::cell`] for every cell;
    /// sources with a cheaper bulk read should override it.
    async fn read_block(
        &self,
        sheet: &str,
        range: CellRange,
    ) -> Result<Vec<Vec<CellData>>, GridError> {
        let mut rows = Vec::with_capacity(range.row_count() as usize);
        for row in range.first_row..=range.last_row {
            let mut cells = Vec::with_capacity(range.col_count() as usize);
            for col in range.first_col..=range.last_col {
                cells.push(self.cell(sheet, row, col).await?);
            }
            rows.push(cells);
        }
        Ok(rows)
    }
}
