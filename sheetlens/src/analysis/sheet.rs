//! Per-sheet pipeline: read, segment, classify headers, sample, infer types.

use tracing::{debug, info, instrument, warn};

use super::header::HeaderClassifier;
use super::inference::TypeInferencer;
use super::sample::SampleExtractor;
use super::segmenter::RegionSegmenter;
use crate::config::AnalysisConfig;
use crate::error::GridError;
use crate::grid::{CellData, CellRange, GridSource};
use crate::model::{AnalysisNote, LimitScope, Region};

/// Number of column summaries spelled out in a region description.
const DESCRIBED_COLUMNS: usize = 8;

/// Longest value quoted in a single-cell description.
const QUOTED_VALUE_CHARS: usize = 40;

/// Regions and notes produced for one sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetAnalysis {
    pub sheet: String,
    pub regions: Vec<Region>,
    pub notes: Vec<AnalysisNote>,
}

/// Runs the structural pipeline over one sheet.
#[derive(Debug, Clone)]
pub struct SheetAnalyzer {
    max_rows: usize,
    segmenter: RegionSegmenter,
    headers: HeaderClassifier,
    inferencer: TypeInferencer,
    sampler: SampleExtractor,
}

impl SheetAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            max_rows: config.max_rows,
            segmenter: RegionSegmenter::new(),
            headers: HeaderClassifier::new(),
            inferencer: TypeInferencer::new(config.max_samples),
            sampler: SampleExtractor::new(config.max_samples),
        }
    }

    /// Reads and analyzes one sheet.
    ///
    /// Rows beyond `max_rows` are never read; a limit note records the cut.
    #[instrument(skip(self, source), fields(sheet = %sheet))]
    pub async fn analyze(
        &self,
        source: &dyn GridSource,
        sheet: &str,
    ) -> Result<SheetAnalysis, GridError> {
        let mut result = SheetAnalysis {
            sheet: sheet.to_string(),
            ..Default::default()
        };

        let Some(used) = source.used_range(sheet).await? else {
            debug!("Sheet is empty");
            return Ok(result);
        };

        let total_rows = used.row_count() as usize;
        let range = if total_rows > self.max_rows {
            warn!(
                rows = total_rows,
                limit = self.max_rows,
                "Sheet exceeds row limit, truncating"
            );
            result.notes.push(AnalysisNote::LimitExceeded {
                scope: LimitScope::Rows,
                sheet: Some(sheet.to_string()),
                region: None,
                limit: self.max_rows,
                actual: total_rows,
            });
            used.truncate_rows(self.max_rows as u32)
        } else {
            used
        };

        let block = source.read_block(sheet, range).await?;
        result.regions = self.analyze_block(sheet, &block, range);

        for region in &result.regions {
            if self.sampler.truncates(region.row_count) {
                result.notes.push(AnalysisNote::LimitExceeded {
                    scope: LimitScope::Samples,
                    sheet: Some(sheet.to_string()),
                    region: Some(region.reference()),
                    limit: self.sampler.max_rows(),
                    actual: region.row_count,
                });
            }
        }

        info!(
            regions = result.regions.len(),
            range = %range,
            "Analyzed sheet"
        );
        Ok(result)
    }

    /// Segments an already-read block whose top-left cell sits at `origin`.
    pub fn analyze_block(
        &self,
        sheet: &str,
        block: &[Vec<CellData>],
        origin: CellRange,
    ) -> Vec<Region> {
        self.segmenter
            .segment(block, origin)
            .into_iter()
            .map(|bounds| self.build_region(sheet, block, origin, bounds))
            .collect()
    }

    fn build_region(
        &self,
        sheet: &str,
        block: &[Vec<CellData>],
        origin: CellRange,
        bounds: CellRange,
    ) -> Region {
        let cols = (bounds.first_col - origin.first_col) as usize
            ..=(bounds.last_col - origin.first_col) as usize;
        let cells: Vec<&[CellData]> = block
            [(bounds.first_row - origin.first_row) as usize..=(bounds.last_row - origin.first_row) as usize]
            .iter()
            .map(|row| row.get(cols.clone()).unwrap_or(&[]))
            .collect();

        let decision = self.headers.classify(&cells, bounds.first_col);
        let data = if decision.has_headers {
            &cells[1..]
        } else {
            &cells[..]
        };

        let mut region = Region::new(sheet, bounds);
        region.has_headers = decision.has_headers;
        region.row_count = data.len();
        region.sample_rows = self.sampler.extract(data);
        region.column_types = self.inferencer.infer_region(data, &decision.headers);
        region.headers = decision.headers;
        region.description = describe(&region);
        region
    }
}

/// Human-readable summary of a region.
pub fn describe(region: &Region) -> String {
    if region.is_single_cell() {
        let value = region
            .sample_rows
            .first()
            .and_then(|row| row.first())
            .map(|v| v.as_text())
            .unwrap_or_default();
        return format!(
            "Single value '{}' on '{}' at {}",
            truncate_chars(&value, QUOTED_VALUE_CHARS),
            region.sheet_name,
            region.address()
        );
    }

    let kind = if region.has_headers {
        "Table"
    } else {
        "Headerless block"
    };
    let mut columns: Vec<String> = region
        .headers
        .iter()
        .take(DESCRIBED_COLUMNS)
        .map(|h| match region.column_type(h) {
            Some(t) => format!("{h} ({t})"),
            None => h.clone(),
        })
        .collect();
    if region.headers.len() > DESCRIBED_COLUMNS {
        columns.push(format!("and {} more", region.headers.len() - DESCRIBED_COLUMNS));
    }

    format!(
        "{kind} on '{}' with {} data {} and {} {}: {}",
        region.sheet_name,
        region.row_count,
        plural(region.row_count, "row"),
        region.headers.len(),
        plural(region.headers.len(), "column"),
        columns.join(", ")
    )
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let mut truncated: String = value.chars().take(max).collect();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellValue, MemoryGrid};
    use crate::model::DataType;

    fn analyzer() -> SheetAnalyzer {
        SheetAnalyzer::new(&AnalysisConfig::default())
    }

    fn people() -> MemoryGrid {
        MemoryGrid::new("people.xlsx").with_sheet(
            "Sheet1",
            vec![
                vec!["Name".into(), "Age".into()],
                vec!["Alice".into(), 30.into()],
                vec!["Bob".into(), 25.into()],
                vec!["Carol".into(), 41.into()],
            ],
        )
    }

    #[tokio::test]
    async fn test_people_table() {
        let result = analyzer().analyze(&people(), "Sheet1").await.unwrap();
        assert!(result.notes.is_empty());
        assert_eq!(result.regions.len(), 1);

        let region = &result.regions[0];
        assert_eq!(region.address(), "A1:B4");
        assert!(region.has_headers);
        assert_eq!(region.headers, vec!["Name", "Age"]);
        assert_eq!(region.row_count, 3);
        assert_eq!(region.column_type("Name"), Some(DataType::Text));
        assert_eq!(region.column_type("Age"), Some(DataType::Number));
        assert_eq!(region.sample_rows.len(), 3);
        assert_eq!(region.sample_rows[0][0], CellValue::Text("Alice".into()));
        assert_eq!(
            region.description,
            "Table on 'Sheet1' with 3 data rows and 2 columns: Name (Text), Age (Number)"
        );
    }

    #[tokio::test]
    async fn test_row_limit_note() {
        let config = AnalysisConfig::default().with_max_rows(2);
        let result = SheetAnalyzer::new(&config)
            .analyze(&people(), "Sheet1")
            .await
            .unwrap();
        assert_eq!(result.regions[0].address(), "A1:B2");
        assert!(result.notes.iter().any(|n| matches!(
            n,
            AnalysisNote::LimitExceeded {
                scope: LimitScope::Rows,
                limit: 2,
                actual: 4,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_sample_limit_note() {
        let config = AnalysisConfig::default().with_max_samples(2);
        let result = SheetAnalyzer::new(&config)
            .analyze(&people(), "Sheet1")
            .await
            .unwrap();
        assert_eq!(result.regions[0].sample_rows.len(), 2);
        assert_eq!(result.regions[0].row_count, 3);
        assert!(result.notes.iter().any(|n| matches!(
            n,
            AnalysisNote::LimitExceeded {
                scope: LimitScope::Samples,
                region: Some(r),
                ..
            } if r == "Sheet1!A1:B4"
        )));
    }

    #[tokio::test]
    async fn test_empty_sheet() {
        let grid = MemoryGrid::new("book").with_empty_sheet("Blank");
        let result = analyzer().analyze(&grid, "Blank").await.unwrap();
        assert!(result.regions.is_empty());
        assert!(result.notes.is_empty());
    }

    #[tokio::test]
    async fn test_single_cell_region() {
        let grid = MemoryGrid::new("book").with_sheet_at("Notes", 2, 3, vec![vec!["Draft".into()]]);
        let result = analyzer().analyze(&grid, "Notes").await.unwrap();
        let region = &result.regions[0];
        assert_eq!(region.address(), "D3");
        assert!(!region.has_headers);
        assert_eq!(region.headers, vec!["Column D"]);
        assert_eq!(region.row_count, 1);
        assert_eq!(region.description, "Single value 'Draft' on 'Notes' at D3");
    }

    #[test]
    fn test_description_truncates_columns() {
        let mut region = Region::new("Wide", CellRange::new(0, 0, 3, 9));
        region.headers = (0..10).map(|i| format!("c{i}")).collect();
        region.row_count = 1;
        let text = describe(&region);
        assert!(text.starts_with("Headerless block on 'Wide' with 1 data row and 10 columns"));
        assert!(text.ends_with("and 2 more"));
    }
}
