//! Workbook-level orchestration.
//!
//! [`AnalysisOrchestrator`] is the entry point of the engine. For a request it
//! computes the cache fingerprint, then either serves a cached analysis, joins
//! an identical request already in flight, or runs the pipeline: sheets are
//! fanned out to a fixed pool of workers, their results are joined back in
//! sheet order, and a final relationship pass links regions across sheets.
//!
//! A sheet that fails to load becomes an ingest note and the rest of the
//! workbook is still analyzed. Only when no attempted sheet could be read does
//! the request fail.

mod worker;

pub use worker::{cancellation, CancellationHandle, CancellationSignal, WorkerStats};

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

use crate::analysis::{RelationshipInferrer, SheetAnalyzer};
use crate::cache::{AnalysisCache, CacheStore, Fingerprint, MemoryCacheStore};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, GridError, Result};
use crate::grid::GridSource;
use crate::logging::{truncate_field, LogConfig};
use crate::model::{Analysis, AnalysisNote, LimitScope};
use worker::{AnalysisTask, SheetOutcome, WorkerPool};

/// Type alias for progress callback function, called with the share of
/// attempted sheets completed (0.0 to 1.0).
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Runs structural analysis over workbooks.
///
/// One orchestrator is meant to be shared (for example behind an `Arc`) by
/// every caller in the host, so that concurrent requests for the same workbook
/// share work.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use sheetlens::grid::{CellValue, MemoryGrid};
/// use sheetlens::{AnalysisConfig, AnalysisOrchestrator, DataType};
///
/// # async fn example() -> sheetlens::Result<()> {
/// let grid = MemoryGrid::new("people.xlsx").with_sheet(
///     "Sheet1",
///     vec![
///         vec!["Name".into(), "Age".into()],
///         vec!["Alice".into(), CellValue::from(30)],
///         vec!["Bob".into(), CellValue::from(25)],
///     ],
/// );
///
/// let orchestrator = AnalysisOrchestrator::new(AnalysisConfig::default())?;
/// let analysis = orchestrator.analyze(Arc::new(grid)).await?;
///
/// let region = &analysis.regions[0];
/// assert_eq!(region.address(), "A1:B3");
/// assert_eq!(region.column_type("Age"), Some(DataType::Number));
/// # Ok(())
/// # }
/// ```
pub struct AnalysisOrchestrator {
    config: AnalysisConfig,
    cache: AnalysisCache,
    analyzer: Arc<SheetAnalyzer>,
    inferrer: RelationshipInferrer,
    log_config: LogConfig,
    on_progress: Option<ProgressCallback>,
}

impl AnalysisOrchestrator {
    /// Creates an orchestrator with an in-memory cache.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(MemoryCacheStore::new()))
    }

    /// Creates an orchestrator that caches into `store`.
    ///
    /// The store is ignored when `cache_enabled` is false.
    pub fn with_store(config: AnalysisConfig, store: Arc<dyn CacheStore>) -> Result<Self> {
        config.validate()?;
        let cache = if config.cache_enabled {
            AnalysisCache::new(store)
        } else {
            AnalysisCache::disabled()
        };
        Ok(Self {
            analyzer: Arc::new(SheetAnalyzer::new(&config)),
            inferrer: RelationshipInferrer::new(),
            config,
            cache,
            log_config: LogConfig::default(),
            on_progress: None,
        })
    }

    /// Sets how much detail is logged per region and per cache lookup.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Sets a callback for progress updates.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Cache key for `source` under this orchestrator's configuration.
    pub fn fingerprint(&self, source: &dyn GridSource) -> Fingerprint {
        Fingerprint::compute(&source.identity(), &self.config)
    }

    /// Analyzes a workbook.
    pub async fn analyze(&self, source: Arc<dyn GridSource>) -> Result<Arc<Analysis>> {
        self.analyze_with_cancel(source, CancellationSignal::never())
            .await
    }

    /// Analyzes a workbook, stopping early when `cancel` fires.
    ///
    /// Sheets already being read when cancellation is requested are finished,
    /// no further sheet is started, and the request fails with
    /// [`AnalysisError::Cancelled`]. Cancelled runs are never cached.
    #[instrument(skip_all, fields(workbook = %source.identity().name))]
    pub async fn analyze_with_cancel(
        &self,
        source: Arc<dyn GridSource>,
        cancel: CancellationSignal,
    ) -> Result<Arc<Analysis>> {
        let fingerprint = self.fingerprint(source.as_ref());
        debug!(fingerprint = %fingerprint, "Resolving analysis");
        let analysis = self
            .cache
            .get_or_compute(&fingerprint, || self.compute(source, cancel))
            .await?;

        let stats = self.cache.stats();
        crate::log_cache_event!(
            self.log_config,
            fingerprint = %fingerprint,
            hits = stats.hits,
            computations = stats.computations,
            joined = stats.joined,
            "Analysis resolved"
        );
        Ok(analysis)
    }

    async fn compute(
        &self,
        source: Arc<dyn GridSource>,
        cancel: CancellationSignal,
    ) -> Result<Analysis> {
        let identity = source.identity();
        let sheet_names = source
            .sheet_names()
            .await
            .map_err(AnalysisError::Workbook)?;
        if sheet_names.is_empty() {
            return Err(AnalysisError::EmptyWorkbook);
        }
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let mut analysis = Analysis::new(identity.name, sheet_names.clone());
        analysis.metadata.record_start();

        let selected: Vec<String> = sheet_names
            .iter()
            .take(self.config.max_sheets)
            .cloned()
            .collect();
        if sheet_names.len() > self.config.max_sheets {
            warn!(
                sheets = sheet_names.len(),
                limit = self.config.max_sheets,
                "Workbook exceeds sheet limit"
            );
            analysis.notes.push(AnalysisNote::LimitExceeded {
                scope: LimitScope::Sheets,
                sheet: None,
                region: None,
                limit: self.config.max_sheets,
                actual: sheet_names.len(),
            });
        }

        info!(
            sheets = selected.len(),
            workers = self.config.concurrency_limit,
            "Starting analysis"
        );

        let pool = WorkerPool::spawn(
            self.config.concurrency_limit,
            Arc::clone(&source),
            Arc::clone(&self.analyzer),
            self.inferrer.clone(),
            cancel,
        );

        let result = self
            .run_sheets(&pool, &selected, &mut analysis)
            .await;
        let result = match result {
            Ok(()) => self.run_relationships(&pool, &mut analysis).await,
            Err(e) => Err(e),
        };
        let stats = pool.shutdown().await;
        result?;

        analysis.metadata.record_end();
        info!(
            regions = analysis.regions.len(),
            relationships = analysis.relationships().count(),
            notes = analysis.notes.len(),
            failed_sheets = stats.sheets_failed,
            "Analysis complete"
        );
        Ok(analysis)
    }

    async fn run_sheets(
        &self,
        pool: &WorkerPool,
        sheets: &[String],
        analysis: &mut Analysis,
    ) -> Result<()> {
        let mut pending = Vec::with_capacity(sheets.len());
        for (index, sheet) in sheets.iter().enumerate() {
            let (reply, receiver) = oneshot::channel();
            pool.submit(AnalysisTask::SegmentSheet {
                index,
                sheet: sheet.clone(),
                reply,
            })
            .await?;
            pending.push((sheet, receiver));
        }

        let total = pending.len();
        let mut first_failure: Option<GridError> = None;
        let mut failures = 0;
        let mut skipped = false;

        // Joining in submission order keeps regions in sheet order.
        for (done, (sheet, receiver)) in pending.into_iter().enumerate() {
            match receiver.await {
                Ok(SheetOutcome::Analyzed(sheet_analysis)) => {
                    for region in &sheet_analysis.regions {
                        crate::log_region!(
                            self.log_config,
                            region = %region.reference(),
                            description = %truncate_field(&region.description, self.log_config.max_field_length),
                            "Detected region"
                        );
                    }
                    analysis.regions.extend(sheet_analysis.regions);
                    analysis.notes.extend(sheet_analysis.notes);
                }
                Ok(SheetOutcome::Failed(e)) => {
                    crate::perf_debug!(self.log_config, sheet = %sheet, "Recording ingest failure");
                    analysis.notes.push(AnalysisNote::ingest(sheet, e.to_string()));
                    failures += 1;
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
                Ok(SheetOutcome::Skipped) => skipped = true,
                Err(_) => {
                    error!(sheet = %sheet, "Worker stopped before reporting");
                    analysis
                        .notes
                        .push(AnalysisNote::ingest(sheet, "worker stopped before reporting"));
                    failures += 1;
                    if first_failure.is_none() {
                        first_failure = Some(GridError::unreadable(sheet, "worker stopped"));
                    }
                }
            }
            if let Some(callback) = &self.on_progress {
                callback((done + 1) as f64 / total as f64);
            }
        }

        if skipped {
            info!("Analysis cancelled");
            return Err(AnalysisError::Cancelled);
        }
        if failures == total {
            if let Some(source) = first_failure {
                return Err(AnalysisError::NoReadableSheets {
                    attempted: total,
                    source,
                });
            }
        }
        Ok(())
    }

    async fn run_relationships(&self, pool: &WorkerPool, analysis: &mut Analysis) -> Result<()> {
        if !self.config.use_advanced_detection || analysis.regions.len() < 2 {
            return Ok(());
        }
        let (reply, receiver) = oneshot::channel();
        pool.submit(AnalysisTask::InferRelationships {
            regions: std::mem::take(&mut analysis.regions),
            reply,
        })
        .await?;
        analysis.regions = receiver
            .await
            .map_err(|_| AnalysisError::internal("relationship worker stopped"))?;
        Ok(())
    }
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("log_config", &self.log_config)
            .finish()
    }
}
