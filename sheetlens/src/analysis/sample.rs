//! Bounded sample extraction.

use crate::grid::{CellData, CellValue};

/// Copies the leading data rows of a region.
#[derive(Debug, Clone)]
pub struct SampleExtractor {
    max_rows: usize,
}

impl SampleExtractor {
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// The first `max_rows` data rows, in document order.
    pub fn extract(&self, data_rows: &[&[CellData]]) -> Vec<Vec<CellValue>> {
        data_rows
            .iter()
            .take(self.max_rows)
            .map(|row| row.iter().map(|cell| cell.value.clone()).collect())
            .collect()
    }

    /// Returns true if `row_count` data rows exceed the sample size.
    pub fn truncates(&self, row_count: usize) -> bool {
        row_count > self.max_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> Vec<Vec<CellData>> {
        (0..n)
            .map(|i| vec![CellData::new(i as i64), CellData::new(format!("row {i}"))])
            .collect()
    }

    #[test]
    fn test_takes_leading_rows() {
        let rows = data(8);
        let slices: Vec<&[CellData]> = rows.iter().map(|r| r.as_slice()).collect();
        let samples = SampleExtractor::new(5).extract(&slices);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0][0], CellValue::Number(0.0));
        assert_eq!(samples[4][1], CellValue::Text("row 4".into()));
        assert!(SampleExtractor::new(5).truncates(8));
    }

    #[test]
    fn test_short_regions_are_copied_whole() {
        let rows = data(2);
        let slices: Vec<&[CellData]> = rows.iter().map(|r| r.as_slice()).collect();
        let extractor = SampleExtractor::new(5);
        assert_eq!(extractor.extract(&slices).len(), 2);
        assert!(!extractor.truncates(2));
        assert!(SampleExtractor::new(0).extract(&slices).is_empty());
    }
}
