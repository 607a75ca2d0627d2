//! Fixed-size worker pool fed by a bounded task queue.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::analysis::{RelationshipInferrer, SheetAnalysis, SheetAnalyzer};
use crate::error::{AnalysisError, GridError, Result};
use crate::grid::GridSource;
use crate::model::Region;

/// Sender half of a cancellation signal.
#[derive(Debug)]
pub struct CancellationHandle {
    sender: watch::Sender<bool>,
}

impl CancellationHandle {
    /// Requests cancellation. Sheets already being read finish; no new sheet starts.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Receiver half of a cancellation signal, cheap to clone.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    receiver: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::never()
    }
}

/// Creates a linked cancellation handle and signal.
///
/// # Example
///
/// ```rust
/// let (handle, signal) = sheetlens::cancellation();
/// assert!(!signal.is_cancelled());
/// handle.cancel();
/// assert!(signal.is_cancelled());
/// ```
pub fn cancellation() -> (CancellationHandle, CancellationSignal) {
    let (sender, receiver) = watch::channel(false);
    (CancellationHandle { sender }, CancellationSignal { receiver })
}

/// Result of one sheet task.
#[derive(Debug)]
pub(crate) enum SheetOutcome {
    Analyzed(SheetAnalysis),
    Failed(GridError),
    /// Cancellation was requested before the sheet started
    Skipped,
}

/// Work items accepted by the pool.
#[derive(Debug)]
pub(crate) enum AnalysisTask {
    /// Segment and classify one sheet
    SegmentSheet {
        index: usize,
        sheet: String,
        reply: oneshot::Sender<SheetOutcome>,
    },
    /// Find relationships across all regions of the workbook
    InferRelationships {
        regions: Vec<Region>,
        reply: oneshot::Sender<Vec<Region>>,
    },
}

/// Statistics from one worker, summed over the pool on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub sheets_analyzed: u64,
    pub sheets_failed: u64,
    pub sheets_skipped: u64,
    pub relationship_passes: u64,
}

impl WorkerStats {
    fn merge(&mut self, other: WorkerStats) {
        self.sheets_analyzed += other.sheets_analyzed;
        self.sheets_failed += other.sheets_failed;
        self.sheets_skipped += other.sheets_skipped;
        self.relationship_passes += other.relationship_passes;
    }
}

/// Everything a worker needs to execute tasks.
struct WorkerContext {
    source: Arc<dyn GridSource>,
    analyzer: Arc<SheetAnalyzer>,
    inferrer: RelationshipInferrer,
    cancel: CancellationSignal,
}

pub(crate) struct WorkerPool {
    sender: mpsc::Sender<AnalysisTask>,
    workers: Vec<JoinHandle<WorkerStats>>,
}

impl WorkerPool {
    /// Spawns `size` workers sharing one bounded queue.
    pub fn spawn(
        size: usize,
        source: Arc<dyn GridSource>,
        analyzer: Arc<SheetAnalyzer>,
        inferrer: RelationshipInferrer,
        cancel: CancellationSignal,
    ) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel(size * 2);
        let receiver = Arc::new(Mutex::new(receiver));
        let context = Arc::new(WorkerContext {
            source,
            analyzer,
            inferrer,
            cancel,
        });

        let workers = (0..size)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let context = Arc::clone(&context);
                tokio::spawn(run_worker(id, receiver, context))
            })
            .collect();
        debug!(workers = size, "Worker pool started");
        Self { sender, workers }
    }

    /// Queues a task, waiting while the queue is full.
    pub async fn submit(&self, task: AnalysisTask) -> Result<()> {
        self.sender
            .send(task)
            .await
            .map_err(|_| AnalysisError::internal("worker pool stopped accepting tasks"))
    }

    /// Closes the queue and waits for every worker to drain it.
    pub async fn shutdown(self) -> WorkerStats {
        drop(self.sender);
        let mut total = WorkerStats::default();
        for handle in self.workers {
            match handle.await {
                Ok(stats) => total.merge(stats),
                Err(e) => error!(error = %e, "Worker terminated abnormally"),
            }
        }
        info!(
            analyzed = total.sheets_analyzed,
            failed = total.sheets_failed,
            skipped = total.sheets_skipped,
            "Worker pool stopped"
        );
        total
    }
}

#[instrument(skip(receiver, context))]
async fn run_worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<AnalysisTask>>>,
    context: Arc<WorkerContext>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        let task = receiver.lock().await.recv().await;
        let Some(task) = task else {
            break;
        };

        match task {
            AnalysisTask::SegmentSheet {
                index,
                sheet,
                reply,
            } => {
                let outcome = if context.cancel.is_cancelled() {
                    debug!(index, sheet = %sheet, "Cancelled, skipping sheet");
                    stats.sheets_skipped += 1;
                    SheetOutcome::Skipped
                } else {
                    match context.analyzer.analyze(context.source.as_ref(), &sheet).await {
                        Ok(analysis) => {
                            stats.sheets_analyzed += 1;
                            SheetOutcome::Analyzed(analysis)
                        }
                        Err(e) => {
                            warn!(index, sheet = %sheet, error = %e, "Failed to read sheet");
                            stats.sheets_failed += 1;
                            SheetOutcome::Failed(e)
                        }
                    }
                };
                if reply.send(outcome).is_err() {
                    debug!(index, "Sheet result dropped, requester is gone");
                }
            }
            AnalysisTask::InferRelationships { mut regions, reply } => {
                let found = context.inferrer.apply(&mut regions);
                debug!(relationships = found, "Relationship pass complete");
                stats.relationship_passes += 1;
                if reply.send(regions).is_err() {
                    debug!("Relationship result dropped, requester is gone");
                }
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::grid::MemoryGrid;

    fn pool(cancel: CancellationSignal) -> WorkerPool {
        let grid = MemoryGrid::new("book")
            .with_sheet("A", vec![vec!["x".into()]])
            .with_sheet("B", vec![vec![1.into()]]);
        WorkerPool::spawn(
            2,
            Arc::new(grid),
            Arc::new(SheetAnalyzer::new(&AnalysisConfig::default())),
            RelationshipInferrer::new(),
            cancel,
        )
    }

    #[test]
    fn test_cancellation_signal() {
        let (handle, signal) = cancellation();
        let copy = signal.clone();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(copy.is_cancelled());
        assert!(!CancellationSignal::never().is_cancelled());
    }

    #[tokio::test]
    async fn test_sheets_are_processed() {
        let pool = pool(CancellationSignal::never());
        let mut replies = Vec::new();
        for (index, sheet) in ["A", "B", "Missing"].into_iter().enumerate() {
            let (reply, rx) = oneshot::channel();
            pool.submit(AnalysisTask::SegmentSheet {
                index,
                sheet: sheet.to_string(),
                reply,
            })
            .await
            .unwrap();
            replies.push(rx);
        }

        let outcomes: Vec<SheetOutcome> = futures::future::join_all(replies)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert!(matches!(&outcomes[0], SheetOutcome::Analyzed(a) if a.sheet == "A"));
        assert!(matches!(&outcomes[1], SheetOutcome::Analyzed(a) if a.sheet == "B"));
        assert!(matches!(&outcomes[2], SheetOutcome::Failed(GridError::SheetNotFound { .. })));

        let stats = pool.shutdown().await;
        assert_eq!(stats.sheets_analyzed, 2);
        assert_eq!(stats.sheets_failed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_pool_skips_sheets() {
        let (handle, signal) = cancellation();
        handle.cancel();
        let pool = pool(signal);

        let (reply, rx) = oneshot::channel();
        pool.submit(AnalysisTask::SegmentSheet {
            index: 0,
            sheet: "A".into(),
            reply,
        })
        .await
        .unwrap();
        assert!(matches!(rx.await.unwrap(), SheetOutcome::Skipped));
        assert_eq!(pool.shutdown().await.sheets_skipped, 1);
    }

    #[tokio::test]
    async fn test_relationship_task() {
        let pool = pool(CancellationSignal::never());
        let (reply, rx) = oneshot::channel();
        pool.submit(AnalysisTask::InferRelationships {
            regions: Vec::new(),
            reply,
        })
        .await
        .unwrap();
        assert!(rx.await.unwrap().is_empty());
        assert_eq!(pool.shutdown().await.relationship_passes, 1);
    }
}
