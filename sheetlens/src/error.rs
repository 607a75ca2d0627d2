//! Error types for the sheetlens analysis engine.
//!
//! Errors are split by how far they propagate. [`GridError`] describes a
//! failure to read one sheet and is downgraded to a note on the
//! [`Analysis`](crate::model::Analysis). [`CacheError`] never leaves the cache
//! layer except as a log line. [`AnalysisError`] is the only error a caller of
//! the orchestrator ever sees.

use thiserror::Error;

/// Fatal errors returned by the orchestrator when no analysis could be produced.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Every sheet that was attempted failed to load.
    #[error("No readable sheets: all {attempted} sheet(s) failed to load")]
    NoReadableSheets {
        /// Number of sheets that were attempted
        attempted: usize,
        /// The first ingest failure, kept as the originating cause
        #[source]
        source: GridError,
    },

    /// The workbook did not expose any sheets at all.
    #[error("Workbook contains no sheets")]
    EmptyWorkbook,

    /// The sheet list itself could not be read.
    #[error("Failed to open workbook: {0}")]
    Workbook(#[source] GridError),

    /// The configuration failed validation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The run was cancelled before all sheets were processed.
    #[error("Analysis cancelled")]
    Cancelled,

    /// A concurrent computation for the same fingerprint failed.
    #[error("In-flight analysis failed: {0}")]
    InFlight(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, AnalysisError>`.
pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    /// Creates a configuration error with the given message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error was caused by cancellation rather than data.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Cancelled)
    }
}

/// Errors raised by a [`GridSource`](crate::grid::GridSource) implementation.
#[derive(Error, Debug)]
pub enum GridError {
    /// The named sheet does not exist in the workbook.
    #[error("Sheet '{sheet}' not found")]
    SheetNotFound { sheet: String },

    /// A cell or range could not be read.
    #[error("Failed to read sheet '{sheet}': {message}")]
    Unreadable {
        /// Sheet that failed
        sheet: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GridError {
    /// Creates an unreadable-sheet error.
    pub fn unreadable(sheet: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreadable {
            sheet: sheet.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unreadable-sheet error with an underlying cause.
    pub fn unreadable_with_source(
        sheet: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Unreadable {
            sheet: sheet.into(),
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Errors from a [`CacheStore`](crate::cache::CacheStore).
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing store failed.
    #[error("Cache storage error: {message}")]
    Storage { message: String },

    /// A cached payload could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Creates a storage error with the given message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| AnalysisError::Internal(format!("{msg}: {e}")))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AnalysisError::Internal(format!("{}: {e}", f())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_no_readable_sheets_keeps_cause() {
        let err = AnalysisError::NoReadableSheets {
            attempted: 2,
            source: GridError::unreadable("Sheet1", "locked"),
        };
        assert_eq!(
            err.to_string(),
            "No readable sheets: all 2 sheet(s) failed to load"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_grid_error_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = GridError::unreadable_with_source("Data", "cannot open", Box::new(io));
        assert_eq!(err.to_string(), "Failed to read sheet 'Data': cannot open");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_cancelled_flag() {
        assert!(AnalysisError::Cancelled.is_cancelled());
        assert!(!AnalysisError::EmptyWorkbook.is_cancelled());
    }

    #[test]
    fn test_error_context() {
        fn failing() -> std::result::Result<(), CacheError> {
            Err(CacheError::storage("disk full"))
        }

        let err = failing().context("While persisting").unwrap_err();
        assert!(err.to_string().contains("While persisting"));
        assert!(err.to_string().contains("disk full"));
    }
}
