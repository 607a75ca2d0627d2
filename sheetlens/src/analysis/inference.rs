//! Column type inference from sampled cells.
//!
//! Every sampled cell votes for the most specific type it parses as, following
//! the precedence Formula > Currency > Date > Number > Boolean > Text. The
//! column takes the type with the most votes, ties going to the more specific
//! type. Text is the conservative fallback: a column where text sits next to
//! any other kind of value is Text, because the other types cannot represent
//! those text values. Blank and error cells do not vote; a column without
//! votes is Unknown.
//!
//! # Example
//!
//! ```rust
//! use sheetlens::analysis::TypeInferencer;
//! use sheetlens::grid::CellData;
//! use sheetlens::DataType;
//!
//! let inferencer = TypeInferencer::new(5);
//! let cells = vec![CellData::new(30), CellData::new("25"), CellData::new(41.5)];
//! let result = inferencer.infer_column(cells.iter());
//! assert_eq!(result.data_type, DataType::Number);
//! assert_eq!(result.confidence, 1.0);
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::{CellData, CellValue};
use crate::model::DataType;

/// Pattern matching utilities for type detection
struct TypePatterns {
    number: Regex,
    currency_prefix: Regex,
    currency_suffix: Regex,
    date_iso: Regex,
    date_slash: Regex,
    date_dotted: Regex,
    date_named_month: Regex,
    datetime_iso: Regex,
    boolean: Regex,
}

impl TypePatterns {
    fn new() -> Self {
        const NUM: &str = r"((\d{1,3}(,\d{3})+|\d+)(\.\d*)?|\.\d+)";
        Self {
            number: Regex::new(&format!(r"^[+-]?{NUM}([eE][+-]?\d+)?%?$")).expect("valid regex"),
            currency_prefix: Regex::new(&format!(r"^\(?[+-]?\s*[$€£¥]\s*[+-]?{NUM}\)?$"))
                .expect("valid regex"),
            currency_suffix: Regex::new(&format!(r"^[+-]?{NUM}\s*[€£¥$]$")).expect("valid regex"),
            date_iso: Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("valid regex"),
            date_slash: Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("valid regex"),
            date_dotted: Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{4}$").expect("valid regex"),
            date_named_month: Regex::new(r"^\d{1,2}[- ][A-Za-z]{3}[- ]\d{4}$")
                .expect("valid regex"),
            datetime_iso: Regex::new(
                r"^(\d{4}-\d{2}-\d{2})[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$",
            )
            .expect("valid regex"),
            boolean: Regex::new(r"(?i)^(true|false|yes|no)$").expect("valid regex"),
        }
    }

    fn is_date(&self, value: &str) -> bool {
        if self.date_iso.is_match(value) {
            return NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
        }
        if self.date_slash.is_match(value) {
            return NaiveDate::parse_from_str(value, "%m/%d/%Y").is_ok()
                || NaiveDate::parse_from_str(value, "%d/%m/%Y").is_ok();
        }
        if self.date_dotted.is_match(value) {
            return NaiveDate::parse_from_str(value, "%d.%m.%Y").is_ok();
        }
        if self.date_named_month.is_match(value) {
            let normalized = value.replace(' ', "-");
            return NaiveDate::parse_from_str(&normalized, "%d-%b-%Y").is_ok();
        }
        if let Some(captures) = self.datetime_iso.captures(value) {
            return NaiveDate::parse_from_str(&captures[1], "%Y-%m-%d").is_ok();
        }
        false
    }
}

static PATTERNS: Lazy<TypePatterns> = Lazy::new(TypePatterns::new);

/// Returns true if a number format displays currency.
pub fn is_currency_format(format: &str) -> bool {
    format.contains("[$") || format.chars().any(|c| matches!(c, '$' | '€' | '£' | '¥'))
}

/// Returns true if a number format displays a date or time.
pub fn is_date_format(format: &str) -> bool {
    let mut plain = String::with_capacity(format.len());
    let mut in_quotes = false;
    let mut in_brackets = false;
    for c in format.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            _ if in_quotes || in_brackets => {}
            _ => plain.push(c.to_ascii_lowercase()),
        }
    }
    plain.contains('y')
        || plain.contains('d')
        || plain.contains("mmm")
        || (plain.contains('h') && plain.contains(':'))
}

/// Classifies a trimmed text value.
fn classify_text(text: &str, format: Option<&str>) -> Option<DataType> {
    if text.is_empty() {
        return None;
    }
    if text.starts_with('=') {
        return Some(DataType::Formula);
    }
    let patterns = &*PATTERNS;
    if patterns.currency_prefix.is_match(text) || patterns.currency_suffix.is_match(text) {
        return Some(DataType::Currency);
    }
    if patterns.is_date(text) {
        return Some(DataType::Date);
    }
    if patterns.number.is_match(text) {
        if format.is_some_and(is_currency_format) {
            return Some(DataType::Currency);
        }
        return Some(DataType::Number);
    }
    if patterns.boolean.is_match(text) {
        return Some(DataType::Boolean);
    }
    Some(DataType::Text)
}

fn classify_plain(value: &CellValue, format: Option<&str>) -> Option<DataType> {
    match value {
        CellValue::Empty | CellValue::Error(_) => None,
        CellValue::Formula { .. } => Some(DataType::Formula),
        CellValue::Number(_) => match format {
            Some(f) if is_currency_format(f) => Some(DataType::Currency),
            Some(f) if is_date_format(f) => Some(DataType::Date),
            _ => Some(DataType::Number),
        },
        CellValue::Bool(_) => Some(DataType::Boolean),
        CellValue::Text(text) => classify_text(text.trim(), format),
    }
}

/// The most specific type a cell parses as, or `None` for blank and error cells.
pub fn classify_cell(cell: &CellData) -> Option<DataType> {
    classify_plain(&cell.value, cell.format.as_deref())
}

/// Like [`classify_cell`], but looks through formulas to their computed value.
pub fn classify_content(cell: &CellData) -> Option<DataType> {
    match &cell.value {
        CellValue::Formula { cached: None, .. } => None,
        value => classify_plain(value.resolved(), cell.format.as_deref()),
    }
}

/// Parses a cell as a plain number, ignoring currency symbols, separators and
/// accounting parentheses.
pub fn numeric_value(value: &CellValue) -> Option<f64> {
    match value.resolved() {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(text) => {
            let trimmed = text.trim();
            let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
            let cleaned: String = trimmed
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '(' | ')' | ' ' | '%'))
                .collect();
            let parsed: f64 = cleaned.parse().ok()?;
            Some(if negative { -parsed } else { parsed })
        }
        _ => None,
    }
}

/// Vote tally for one column.
#[derive(Debug, Default, Clone)]
pub struct TypeVotes {
    pub total_samples: usize,
    pub blank_count: usize,
    pub votes: BTreeMap<DataType, usize>,
}

impl TypeVotes {
    pub fn record(&mut self, vote: Option<DataType>) {
        self.total_samples += 1;
        match vote {
            Some(data_type) => *self.votes.entry(data_type).or_insert(0) += 1,
            None => self.blank_count += 1,
        }
    }

    pub fn count(&self, data_type: DataType) -> usize {
        self.votes.get(&data_type).copied().unwrap_or(0)
    }

    pub fn voting_samples(&self) -> usize {
        self.votes.values().sum()
    }
}

/// Type inference result with confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTypeResult {
    pub data_type: DataType,
    /// Share of voting samples that agreed with the chosen type (0.0 to 1.0)
    pub confidence: f64,
    pub samples_analyzed: usize,
    pub blank_count: usize,
}

/// Assigns one semantic type per column from a bounded sample.
#[derive(Debug, Clone)]
pub struct TypeInferencer {
    max_samples: usize,
}

impl TypeInferencer {
    /// Creates an inferencer that looks at no more than `max_samples` rows per column.
    pub fn new(max_samples: usize) -> Self {
        Self { max_samples }
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Tallies votes over at most `max_samples` cells.
    pub fn tally<'a>(&self, cells: impl Iterator<Item = &'a CellData>) -> TypeVotes {
        let mut votes = TypeVotes::default();
        for cell in cells.take(self.max_samples) {
            votes.record(classify_cell(cell));
        }
        votes
    }

    /// Picks the column type from a vote tally.
    pub fn determine_type(&self, votes: &TypeVotes) -> ColumnTypeResult {
        let voting = votes.voting_samples();
        let result = |data_type: DataType, count: usize| ColumnTypeResult {
            data_type,
            confidence: if voting == 0 {
                0.0
            } else {
                count as f64 / voting as f64
            },
            samples_analyzed: votes.total_samples,
            blank_count: votes.blank_count,
        };

        if voting == 0 {
            return result(DataType::Unknown, 0);
        }

        let text = votes.count(DataType::Text);
        if text > 0 && text < voting {
            return result(DataType::Text, text);
        }

        // PRECEDENCE is most-specific first, so a strict comparison keeps the
        // more specific type on ties.
        let mut best = (DataType::Unknown, 0);
        for data_type in DataType::PRECEDENCE {
            let count = votes.count(data_type);
            if count > best.1 {
                best = (data_type, count);
            }
        }
        result(best.0, best.1)
    }

    /// Infers the type of one column.
    pub fn infer_column<'a>(&self, cells: impl Iterator<Item = &'a CellData>) -> ColumnTypeResult {
        self.determine_type(&self.tally(cells))
    }

    /// Infers one type per header from the region's data rows.
    pub fn infer_region(
        &self,
        data_rows: &[&[CellData]],
        headers: &[String],
    ) -> BTreeMap<String, DataType> {
        headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let result = self.infer_column(data_rows.iter().filter_map(|row| row.get(index)));
                debug!(
                    column = header.as_str(),
                    data_type = result.data_type.as_str(),
                    confidence = result.confidence,
                    samples = result.samples_analyzed,
                    "Inferred column type"
                );
                (header.clone(), result.data_type)
            })
            .collect()
    }
}

impl Default for TypeInferencer {
    fn default() -> Self {
        Self::new(5)
    }
}
