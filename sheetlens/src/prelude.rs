//! Prelude for commonly used types and traits in sheetlens.

pub use crate::cache::{AnalysisCache, CacheStore, Fingerprint, MemoryCacheStore};
pub use crate::config::AnalysisConfig;
pub use crate::error::{AnalysisError, ErrorContext, Result};
pub use crate::formatters::{AnalysisFormatter, FormatterConfig};
pub use crate::grid::{CellData, CellRange, CellValue, GridSource, WorkbookIdentity};
pub use crate::logging::LogConfig;
pub use crate::model::{Analysis, AnalysisNote, Cardinality, DataType, Region, Relationship};
pub use crate::orchestrator::{
    cancellation, AnalysisOrchestrator, CancellationHandle, CancellationSignal,
};
