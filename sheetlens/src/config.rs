//! Limits and switches for an analysis run.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Configuration for the analysis engine.
///
/// The host owns loading (from TOML, JSON or its own settings store); the
/// engine only receives the resulting value. Missing fields fall back to
/// [`AnalysisConfig::default`] when deserializing.
///
/// # Example
///
/// ```rust
/// use sheetlens::AnalysisConfig;
///
/// let config = AnalysisConfig::default()
///     .with_max_rows(5_000)
///     .with_max_samples(3)
///     .with_concurrency_limit(2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum number of sheets to analyze (default: 20)
    pub max_sheets: usize,
    /// Maximum rows read per sheet (default: 10 000)
    pub max_rows: usize,
    /// Maximum sample rows kept per region (default: 5)
    pub max_samples: usize,
    /// Enables relationship inference (default: true)
    pub use_advanced_detection: bool,
    /// Enables reading and writing the analysis cache (default: true)
    pub cache_enabled: bool,
    /// Number of sheet workers (default: number of CPUs)
    pub concurrency_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_sheets: 20,
            max_rows: 10_000,
            max_samples: 5,
            use_advanced_detection: true,
            cache_enabled: true,
            concurrency_limit: num_cpus::get().max(1),
        }
    }
}

impl AnalysisConfig {
    /// A small configuration for previews and tests.
    pub fn minimal() -> Self {
        Self {
            max_sheets: 5,
            max_rows: 1_000,
            max_samples: 3,
            use_advanced_detection: false,
            cache_enabled: false,
            concurrency_limit: 1,
        }
    }

    /// Sets the maximum number of sheets to analyze.
    pub fn with_max_sheets(mut self, max_sheets: usize) -> Self {
        self.max_sheets = max_sheets;
        self
    }

    /// Sets the maximum number of rows read per sheet.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Sets the maximum number of sample rows per region.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Enables or disables relationship inference.
    pub fn with_advanced_detection(mut self, enabled: bool) -> Self {
        self.use_advanced_detection = enabled;
        self
    }

    /// Enables or disables the analysis cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Sets the number of sheet workers.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Checks that every limit is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_sheets == 0 {
            return Err(AnalysisError::configuration("max_sheets must be at least 1"));
        }
        if self.max_rows == 0 {
            return Err(AnalysisError::configuration("max_rows must be at least 1"));
        }
        if self.max_rows > u32::MAX as usize {
            return Err(AnalysisError::configuration(format!(
                "max_rows must not exceed {}",
                u32::MAX
            )));
        }
        if self.concurrency_limit == 0 {
            return Err(AnalysisError::configuration(
                "concurrency_limit must be at least 1",
            ));
        }
        Ok(())
    }

    /// The parts of the configuration that change analysis output.
    ///
    /// Concurrency and caching do not, so they stay out of cache fingerprints.
    pub(crate) fn fingerprint_fields(&self) -> String {
        format!(
            "sheets={};rows={};samples={};advanced={}",
            self.max_sheets, self.max_rows, self.max_samples, self.use_advanced_detection
        )
    }
}
