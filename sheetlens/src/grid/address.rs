//! Spreadsheet addressing: column letters and rectangular A1 ranges.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Converts a 0-based column index to spreadsheet column letters (A, B, ..., Z, AA, AB, ...).
pub fn column_letter(index: u32) -> String {
    let mut letters = Vec::new();
    let mut n = index as u64 + 1;
    while n > 0 {
        let remainder = ((n - 1) % 26) as u8;
        letters.push((b'A' + remainder) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Converts spreadsheet column letters back to a 0-based index.
///
/// Returns `None` for an empty string or any non-alphabetic character.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut index: u64 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u64 + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
        if index > u32::MAX as u64 {
            return None;
        }
    }
    Some((index - 1) as u32)
}

/// Generates `count` consecutive column letters starting at `first`.
pub fn column_letters(first: u32, count: u32) -> Vec<String> {
    (first..first.saturating_add(count)).map(column_letter).collect()
}

/// Inclusive rectangular block of cells using 0-based coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRange {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl CellRange {
    /// Creates a range from two corners, normalizing their order.
    pub fn new(first_row: u32, first_col: u32, last_row: u32, last_col: u32) -> Self {
        Self {
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        }
    }

    /// A range covering a single cell.
    pub fn cell(row: u32, col: u32) -> Self {
        Self::new(row, col, row, col)
    }

    pub fn row_count(&self) -> u32 {
        self.last_row - self.first_row + 1
    }

    pub fn col_count(&self) -> u32 {
        self.last_col - self.first_col + 1
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.first_row && row <= self.last_row && col >= self.first_col && col <= self.last_col
    }

    /// Returns true if the two ranges share at least one cell.
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.first_row <= other.last_row
            && other.first_row <= self.last_row
            && self.first_col <= other.last_col
            && other.first_col <= self.last_col
    }

    /// Smallest range containing both ranges.
    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange {
            first_row: self.first_row.min(other.first_row),
            first_col: self.first_col.min(other.first_col),
            last_row: self.last_row.max(other.last_row),
            last_col: self.last_col.max(other.last_col),
        }
    }

    /// Number of blank rows strictly between the two ranges (0 when they touch or overlap).
    pub fn row_gap(&self, other: &CellRange) -> u32 {
        gap(self.first_row, self.last_row, other.first_row, other.last_row)
    }

    /// Number of blank columns strictly between the two ranges (0 when they touch or overlap).
    pub fn col_gap(&self, other: &CellRange) -> u32 {
        gap(self.first_col, self.last_col, other.first_col, other.last_col)
    }

    /// Keeps at most `max_rows` rows from the top of the range.
    pub fn truncate_rows(&self, max_rows: u32) -> CellRange {
        let max_rows = max_rows.max(1);
        CellRange {
            last_row: self.last_row.min(self.first_row.saturating_add(max_rows - 1)),
            ..*self
        }
    }

    /// A1 notation, e.g. `A1:D10`, or `B3` for a single cell.
    pub fn to_a1(&self) -> String {
        let start = format!("{}{}", column_letter(self.first_col), self.first_row + 1);
        if self.first_row == self.last_row && self.first_col == self.last_col {
            start
        } else {
            format!(
                "{start}:{}{}",
                column_letter(self.last_col),
                self.last_row + 1
            )
        }
    }

    /// Parses A1 notation (`A1:D10` or `B3`), ignoring `$` anchors.
    pub fn parse_a1(address: &str) -> Option<CellRange> {
        let address = address.replace('$', "");
        let mut parts = address.split(':');
        let (r1, c1) = parse_cell(parts.next()?)?;
        let (r2, c2) = match parts.next() {
            Some(end) => parse_cell(end)?,
            None => (r1, c1),
        };
        if parts.next().is_some() {
            return None;
        }
        Some(CellRange::new(r1, c1, r2, c2))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

fn gap(a_first: u32, a_last: u32, b_first: u32, b_last: u32) -> u32 {
    if b_first > a_last {
        b_first - a_last - 1
    } else if a_first > b_last {
        a_first - b_last - 1
    } else {
        0
    }
}

fn parse_cell(cell: &str) -> Option<(u32, u32)> {
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    let col = column_index(letters)?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col))
}

/// Quotes a sheet name for use in a qualified reference when needed.
pub fn qualified_reference(sheet: &str, range: &CellRange) -> String {
    let needs_quotes = sheet
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '_'));
    if needs_quotes {
        format!("'{}'!{}", sheet.replace('\'', "''"), range.to_a1())
    } else {
        format!("{sheet}!{}", range.to_a1())
    }
}
