//! Decides whether a region's first row is a header row.

use std::collections::HashSet;

use tracing::trace;

use super::inference::classify_content;
use crate::grid::{column_letter, CellData};
use crate::model::DataType;

/// Outcome of header classification for one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDecision {
    pub has_headers: bool,
    /// One unique, non-empty label per column
    pub headers: Vec<String>,
}

/// Classifies the first row of a region as header or data.
///
/// The first row is a header row when the region has at least two rows and
/// either
///
/// - a strict majority of columns are header signals: a non-numeric label in
///   the first row over a number, currency, date or boolean in the second, or
/// - every first-row cell is unique non-blank text and some column's data rows
///   contain a repeated value or a non-text value.
///
/// A blank or numeric first-row cell only withholds that column's signal.
///
/// Headerless regions get synthesized labels of the form `Column C`, using the
/// sheet column letter.
#[derive(Debug, Clone, Default)]
pub struct HeaderClassifier;

impl HeaderClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classifies `rows`, whose first column sits at sheet column `first_col`.
    pub fn classify(&self, rows: &[&[CellData]], first_col: u32) -> HeaderDecision {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let has_headers = self.looks_like_header(rows, width);
        trace!(width, has_headers, "Classified first row");

        let headers = if has_headers {
            label_headers(rows[0], width, first_col)
        } else {
            synthesized_headers(width, first_col)
        };
        HeaderDecision {
            has_headers,
            headers,
        }
    }

    fn looks_like_header(&self, rows: &[&[CellData]], width: usize) -> bool {
        if rows.len() < 2 || width == 0 {
            return false;
        }
        let first = rows[0];
        let signals = (0..width)
            .filter(|&c| is_header_signal(first.get(c), rows[1].get(c)))
            .count();
        if signals * 2 > width {
            return true;
        }

        let mut labels = HashSet::with_capacity(width);
        let unique_labels = (0..width).all(|c| {
            first.get(c).is_some_and(|cell| {
                classify_content(cell) == Some(DataType::Text)
                    && labels.insert(cell.value.as_text())
            })
        });
        unique_labels && (0..width).any(|c| column_has_duplicate_or_non_text(&rows[1..], c))
    }
}

/// Type of a cell usable as a column label: non-blank and not numeric.
fn label_kind(cell: &CellData) -> Option<DataType> {
    classify_content(cell)
        .filter(|kind| !matches!(kind, DataType::Number | DataType::Currency | DataType::Date))
}

fn is_header_signal(label: Option<&CellData>, value: Option<&CellData>) -> bool {
    let Some(label) = label.and_then(label_kind) else {
        return false;
    };
    // A yes/no label over a boolean is just another boolean row
    value.and_then(classify_content).is_some_and(|kind| {
        kind != label
            && matches!(
                kind,
                DataType::Number | DataType::Currency | DataType::Date | DataType::Boolean
            )
    })
}

fn column_has_duplicate_or_non_text(data: &[&[CellData]], col: usize) -> bool {
    let mut seen = HashSet::new();
    for cell in data.iter().filter_map(|row| row.get(col)) {
        let Some(kind) = classify_content(cell) else {
            continue;
        };
        if kind != DataType::Text || !seen.insert(cell.value.as_text()) {
            return true;
        }
    }
    false
}

/// Labels from the header row. Blank labels are synthesized and repeated labels
/// get a numeric suffix so every label is unique.
fn label_headers(first: &[CellData], width: usize, first_col: u32) -> Vec<String> {
    let mut used = HashSet::with_capacity(width);
    (0..width)
        .map(|c| {
            let label = first
                .get(c)
                .map(|cell| cell.value.as_text())
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| synthesized_label(first_col + c as u32));
            unique_label(label, &mut used)
        })
        .collect()
}

fn unique_label(label: String, used: &mut HashSet<String>) -> String {
    if used.insert(label.clone()) {
        return label;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{label}_{suffix}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn synthesized_headers(width: usize, first_col: u32) -> Vec<String> {
    (0..width)
        .map(|c| synthesized_label(first_col + c as u32))
        .collect()
}

/// Label used for a column without a header, e.g. `Column C`.
pub fn synthesized_label(col: u32) -> String {
    format!("Column {}", column_letter(col))
}
