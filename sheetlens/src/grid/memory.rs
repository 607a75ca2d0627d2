//! In-memory grid source.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{CellData, CellRange, CellValue, GridSource, WorkbookIdentity};
use crate::error::GridError;

#[derive(Debug, Clone, Default)]
struct MemorySheet {
    name: String,
    cells: BTreeMap<(u32, u32), CellData>,
}

/// A workbook held entirely in memory.
///
/// # Example
///
/// ```rust
/// use sheetlens::grid::{CellValue, MemoryGrid};
///
/// let grid = MemoryGrid::new("people.xlsx").with_sheet(
///     "People",
///     vec![
///         vec![CellValue::from("Name"), CellValue::from("Age")],
///         vec![CellValue::from("Alice"), CellValue::from(30)],
///     ],
/// );
/// assert_eq!(grid.sheet_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryGrid {
    name: String,
    sheets: Vec<MemorySheet>,
}

impl MemoryGrid {
    /// Creates an empty workbook with the given logical name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Vec::new(),
        }
    }

    /// Adds a sheet whose rows start at cell A1.
    pub fn with_sheet(self, name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        self.with_sheet_at(name, 0, 0, rows)
    }

    /// Adds a sheet whose rows start at the given 0-based top-left cell.
    pub fn with_sheet_at(
        mut self,
        name: impl Into<String>,
        top: u32,
        left: u32,
        rows: Vec<Vec<CellValue>>,
    ) -> Self {
        let name = name.into();
        self.ensure_sheet(&name);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                self.set_cell(&name, top + r as u32, left + c as u32, CellData::new(value));
            }
        }
        self
    }

    /// Adds an empty sheet.
    pub fn with_empty_sheet(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.ensure_sheet(&name);
        self
    }

    /// Sets one cell, creating the sheet if needed. Blank unformatted cells are removed.
    pub fn set_cell(&mut self, sheet: &str, row: u32, col: u32, cell: CellData) {
        let index = self.ensure_sheet(sheet);
        let cells = &mut self.sheets[index].cells;
        if cell.is_occupied() {
            cells.insert((row, col), cell);
        } else {
            cells.remove(&(row, col));
        }
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn ensure_sheet(&mut self, name: &str) -> usize {
        if let Some(index) = self.sheets.iter().position(|s| s.name == name) {
            return index;
        }
        self.sheets.push(MemorySheet {
            name: name.to_string(),
            cells: BTreeMap::new(),
        });
        self.sheets.len() - 1
    }

    fn sheet(&self, name: &str) -> Result<&MemorySheet, GridError> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| GridError::SheetNotFound {
                sheet: name.to_string(),
            })
    }

    fn content_digest(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for sheet in &self.sheets {
            hasher.update(sheet.name.as_bytes());
            hasher.update([0u8]);
            for ((row, col), cell) in &sheet.cells {
                hasher.update(row.to_le_bytes());
                hasher.update(col.to_le_bytes());
                hasher.update(format!("{:?}|{:?}", cell.value, cell.format).as_bytes());
            }
            hasher.update([0xffu8]);
        }
        hasher.finalize().to_vec()
    }
}

#[async_trait]
impl GridSource for MemoryGrid {
    fn identity(&self) -> WorkbookIdentity {
        WorkbookIdentity::from_bytes(self.name.clone(), &self.content_digest())
    }

    async fn sheet_names(&self) -> Result<Vec<String>, GridError> {
        Ok(self.sheets.iter().map(|s| s.name.clone()).collect())
    }

    async fn used_range(&self, sheet: &str) -> Result<Option<CellRange>, GridError> {
        let sheet = self.sheet(sheet)?;
        let mut bounds: Option<CellRange> = None;
        for &(row, col) in sheet.cells.keys() {
            let cell = CellRange::cell(row, col);
            bounds = Some(match bounds {
                Some(b) => b.union(&cell),
                None => cell,
            });
        }
        Ok(bounds)
    }

    async fn cell(&self, sheet: &str, row: u32, col: u32) -> Result<CellData, GridError> {
        Ok(self
            .sheet(sheet)?
            .cells
            .get(&(row, col))
            .cloned()
            .unwrap_or_default())
    }

    async fn read_block(
        &self,
        sheet: &str,
        range: CellRange,
    ) -> Result<Vec<Vec<CellData>>, GridError> {
        let sheet = self.sheet(sheet)?;
        let mut rows =
            vec![vec![CellData::empty(); range.col_count() as usize]; range.row_count() as usize];
        for (&(row, col), cell) in sheet
            .cells
            .range((range.first_row, 0)..=(range.last_row, u32::MAX))
        {
            if range.contains(row, col) {
                rows[(row - range.first_row) as usize][(col - range.first_col) as usize] =
                    cell.clone();
            }
        }
        Ok(rows)
    }
}
