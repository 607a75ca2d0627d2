//! Rendering analyses for people, tools and prompts.
//!
//! Three formatters ship with the crate:
//!
//! - [`HumanFormatter`]: console output
//! - [`JsonFormatter`]: the full analysis as JSON
//! - [`MarkdownFormatter`]: a compact outline suited to documentation and
//!   language-model prompts
//!
//! # Examples
//!
//! ```rust
//! use sheetlens::formatters::{AnalysisFormatter, HumanFormatter};
//! use sheetlens::Analysis;
//!
//! let analysis = Analysis::new("empty.xlsx", vec!["Sheet1".into()]);
//! let output = HumanFormatter::new().format(&analysis).unwrap();
//! assert!(output.contains("empty.xlsx"));
//! ```

use std::fmt::Write;

use crate::error::{AnalysisError, Result};
use crate::grid::column_letter;
use crate::model::{Analysis, Region};

/// Configuration options for formatting analyses.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include sample rows under each region
    pub include_samples: bool,
    /// Include detected relationships
    pub include_relationships: bool,
    /// Include limit and ingest notes
    pub include_notes: bool,
    /// Maximum sample rows shown per region
    pub max_sample_rows: usize,
    /// Whether to use colorized output (human formatter only)
    pub use_colors: bool,
    /// Whether to include run timestamps
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_samples: true,
            include_relationships: true,
            include_notes: true,
            max_sample_rows: 3,
            use_colors: true,
            include_timestamps: false,
        }
    }
}

impl FormatterConfig {
    /// Regions and columns only.
    pub fn minimal() -> Self {
        Self {
            include_samples: false,
            include_relationships: false,
            include_notes: false,
            max_sample_rows: 0,
            use_colors: false,
            include_timestamps: false,
        }
    }

    /// Everything, including all sampled rows and timestamps.
    pub fn detailed() -> Self {
        Self {
            include_samples: true,
            include_relationships: true,
            include_notes: true,
            max_sample_rows: usize::MAX,
            use_colors: true,
            include_timestamps: true,
        }
    }

    /// Plain output for logs and CI systems.
    pub fn ci() -> Self {
        Self {
            use_colors: false,
            ..Self::default()
        }
    }

    pub fn with_samples(mut self, include: bool) -> Self {
        self.include_samples = include;
        self
    }

    pub fn with_relationships(mut self, include: bool) -> Self {
        self.include_relationships = include;
        self
    }

    pub fn with_max_sample_rows(mut self, max: usize) -> Self {
        self.max_sample_rows = max;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

/// Renders an [`Analysis`] as text.
///
/// # Examples
///
/// ```rust
/// use sheetlens::formatters::AnalysisFormatter;
/// use sheetlens::Analysis;
///
/// struct RegionCount;
///
/// impl AnalysisFormatter for RegionCount {
///     fn format(&self, analysis: &Analysis) -> sheetlens::Result<String> {
///         Ok(format!("{} regions", analysis.regions.len()))
///     }
/// }
/// ```
pub trait AnalysisFormatter {
    fn format(&self, analysis: &Analysis) -> Result<String>;

    /// Formats with a configuration other than the formatter's own.
    fn format_with_config(&self, analysis: &Analysis, _config: &FormatterConfig) -> Result<String> {
        self.format(analysis)
    }
}

fn render_error(e: std::fmt::Error) -> AnalysisError {
    AnalysisError::internal(format!("Failed to render analysis: {e}"))
}

/// Formats analyses as JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisFormatter for JsonFormatter {
    fn format(&self, analysis: &Analysis) -> Result<String> {
        self.format_with_config(analysis, &self.config)
    }

    fn format_with_config(&self, analysis: &Analysis, config: &FormatterConfig) -> Result<String> {
        let filtered = filter_for_config(analysis, config);
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&filtered)
        } else {
            serde_json::to_string(&filtered)
        };
        rendered.map_err(|e| AnalysisError::internal(format!("Failed to serialize analysis to JSON: {e}")))
    }
}

/// Copy of `analysis` with the sections the configuration excludes removed.
fn filter_for_config(analysis: &Analysis, config: &FormatterConfig) -> Analysis {
    let mut filtered = analysis.clone();
    for region in &mut filtered.regions {
        if config.include_samples {
            region.sample_rows.truncate(config.max_sample_rows);
        } else {
            region.sample_rows.clear();
        }
        if !config.include_relationships {
            region.relationships.clear();
        }
    }
    if !config.include_notes {
        filtered.notes.clear();
    }
    filtered
}

/// Formats analyses for terminal output.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn render(&self, analysis: &Analysis, config: &FormatterConfig) -> std::result::Result<String, std::fmt::Error> {
        let (bold, reset) = if config.use_colors {
            ("\x1b[1m", "\x1b[0m")
        } else {
            ("", "")
        };

        let mut output = String::new();
        writeln!(output, "{bold}Workbook: {}{reset}", analysis.workbook)?;
        writeln!(
            output,
            "Sheets: {} | Regions: {} | Relationships: {}",
            analysis.sheet_names.len(),
            analysis.regions.len(),
            analysis.relationships().count()
        )?;
        if config.include_timestamps {
            if let Some(started) = analysis.metadata.started_at {
                writeln!(output, "Started: {}", started.to_rfc3339())?;
            }
            if let Some(duration) = analysis.metadata.duration() {
                writeln!(output, "Duration: {} ms", duration.num_milliseconds())?;
            }
        }

        for region in &analysis.regions {
            writeln!(output)?;
            writeln!(output, "{bold}{}{reset}", region.reference())?;
            writeln!(output, "  {}", region.description)?;
            for (index, header) in region.headers.iter().enumerate() {
                let data_type = region
                    .column_type(header)
                    .map(|t| t.as_str())
                    .unwrap_or("Unknown");
                writeln!(
                    output,
                    "  - {header} [{data_type}] (column {})",
                    column_letter(region.range.first_col + index as u32)
                )?;
            }
            if config.include_samples && config.max_sample_rows > 0 && !region.sample_rows.is_empty() {
                writeln!(output, "  Samples:")?;
                for row in region.preview(config.max_sample_rows) {
                    let cells: Vec<String> = row.iter().map(|v| v.as_text()).collect();
                    writeln!(output, "    | {} |", cells.join(" | "))?;
                }
            }
            if config.include_relationships {
                for relationship in &region.relationships {
                    writeln!(output, "  -> {}", relationship.describe())?;
                }
            }
        }

        if config.include_notes && !analysis.notes.is_empty() {
            writeln!(output)?;
            writeln!(output, "Notes:")?;
            for note in &analysis.notes {
                writeln!(output, "  * {note}")?;
            }
        }
        Ok(output)
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisFormatter for HumanFormatter {
    fn format(&self, analysis: &Analysis) -> Result<String> {
        self.format_with_config(analysis, &self.config)
    }

    fn format_with_config(&self, analysis: &Analysis, config: &FormatterConfig) -> Result<String> {
        self.render(analysis, config).map_err(render_error)
    }
}

/// Formats analyses as a Markdown outline.
///
/// Each column is listed as `[header:Name] (Column A, Type: Text)`, a shape
/// that prompt templates can match on.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            heading_level: 2,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the level of the workbook heading (1 to 5); regions sit one level below.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 5);
        self
    }

    fn render_region(
        &self,
        output: &mut String,
        region: &Region,
        config: &FormatterConfig,
    ) -> std::fmt::Result {
        let heading = "#".repeat(self.heading_level as usize + 1);
        writeln!(output, "{heading} {}", region.reference())?;
        writeln!(output)?;
        writeln!(output, "{}", region.description)?;
        writeln!(output)?;
        for (index, header) in region.headers.iter().enumerate() {
            let data_type = region
                .column_type(header)
                .map(|t| t.as_str())
                .unwrap_or("Unknown");
            writeln!(
                output,
                "- [header:{header}] (Column {}, Type: {data_type})",
                column_letter(region.range.first_col + index as u32)
            )?;
        }

        let samples = region.preview(config.max_sample_rows);
        if config.include_samples && !samples.is_empty() {
            writeln!(output)?;
            writeln!(output, "| {} |", region.headers.join(" | "))?;
            writeln!(output, "|{}", "---|".repeat(region.headers.len()))?;
            for row in samples {
                let cells: Vec<String> = row
                    .iter()
                    .map(|v| v.as_text().replace('|', "\\|"))
                    .collect();
                writeln!(output, "| {} |", cells.join(" | "))?;
            }
        }

        if config.include_relationships && !region.relationships.is_empty() {
            writeln!(output)?;
            for relationship in &region.relationships {
                writeln!(
                    output,
                    "- {} `{}` -> `{}` in {} ({:.0}% overlap)",
                    relationship.kind,
                    relationship.source_column,
                    relationship.target_column,
                    relationship.target_region,
                    relationship.overlap * 100.0
                )?;
            }
        }
        writeln!(output)
    }

    fn render(&self, analysis: &Analysis, config: &FormatterConfig) -> std::result::Result<String, std::fmt::Error> {
        let mut output = String::new();
        let heading = "#".repeat(self.heading_level as usize);
        writeln!(output, "{heading} {}", analysis.workbook)?;
        writeln!(output)?;
        for region in &analysis.regions {
            self.render_region(&mut output, region, config)?;
        }
        if config.include_notes && !analysis.notes.is_empty() {
            writeln!(output, "{heading}# Notes")?;
            writeln!(output)?;
            for note in &analysis.notes {
                writeln!(output, "- {note}")?;
            }
        }
        Ok(output)
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisFormatter for MarkdownFormatter {
    fn format(&self, analysis: &Analysis) -> Result<String> {
        self.format_with_config(analysis, &self.config)
    }

    fn format_with_config(&self, analysis: &Analysis, config: &FormatterConfig) -> Result<String> {
        self.render(analysis, config).map_err(render_error)
    }
}
