//! Analysis caching and in-flight deduplication.
//!
//! Results are keyed by a [`Fingerprint`] of the workbook identity and the
//! configuration fields that change analysis output. [`AnalysisCache`] sits in
//! front of a [`CacheStore`] and guarantees that concurrent requests for the
//! same fingerprint share a single computation: the first caller computes,
//! later callers wait for its outcome. If the computing caller is cancelled or
//! dropped, one of the waiters takes over.
//!
//! Store failures are logged and treated as a miss (on read) or skipped (on
//! write); they never fail an analysis.

mod memory;
#[cfg(feature = "sqlite-cache")]
mod sqlite;

pub use memory::MemoryCacheStore;
#[cfg(feature = "sqlite-cache")]
pub use sqlite::SqliteCacheStore;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, CacheError, Result};
use crate::grid::WorkbookIdentity;
use crate::model::Analysis;

/// Cache key for one workbook under one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derives the fingerprint from a workbook identity and the configuration.
    pub fn compute(identity: &WorkbookIdentity, config: &AnalysisConfig) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(identity.name.as_bytes());
        hasher.update([0u8]);
        if let Some(size) = identity.size {
            hasher.update(size.to_le_bytes());
        }
        hasher.update([0u8]);
        if let Some(modified) = identity.modified_ms {
            hasher.update(modified.to_le_bytes());
        }
        hasher.update([0u8]);
        if let Some(digest) = &identity.digest {
            hasher.update(digest.as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(config.fingerprint_fields().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistence behind the analysis cache.
///
/// Implementations must be safe to share between tasks. A stored analysis must
/// come back equal to what was put.
pub trait CacheStore: Send + Sync {
    /// Returns the stored analysis, or `None` on a miss.
    fn get(&self, fingerprint: &Fingerprint) -> std::result::Result<Option<Analysis>, CacheError>;

    /// Stores an analysis, replacing any previous entry.
    fn put(
        &self,
        fingerprint: &Fingerprint,
        analysis: &Analysis,
    ) -> std::result::Result<(), CacheError>;

    /// Name used in log output.
    fn name(&self) -> &'static str {
        "store"
    }
}

/// Outcome published to callers waiting on an in-flight computation.
#[derive(Debug, Clone)]
enum Outcome {
    Ready(Arc<Analysis>),
    Failed(String),
    /// The computing caller went away without a result
    Abandoned,
}

type InFlightTable = HashMap<Fingerprint, watch::Receiver<Option<Outcome>>>;

enum Role<'a> {
    Leader(InFlightGuard<'a>),
    Follower(watch::Receiver<Option<Outcome>>),
}

/// Registration of the computing caller. Publishing an outcome, or dropping the
/// guard without one, removes the entry and wakes every waiter.
struct InFlightGuard<'a> {
    table: &'a Mutex<InFlightTable>,
    fingerprint: Fingerprint,
    sender: watch::Sender<Option<Outcome>>,
    published: bool,
}

impl InFlightGuard<'_> {
    fn publish(mut self, outcome: Outcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Outcome) {
        if self.published {
            return;
        }
        self.published = true;
        lock(self.table).remove(&self.fingerprint);
        self.sender.send_replace(Some(outcome));
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.finish(Outcome::Abandoned);
    }
}

fn lock(table: &Mutex<InFlightTable>) -> MutexGuard<'_, InFlightTable> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Counters describing cache behavior since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from the store
    pub hits: u64,
    /// Requests that had to compute
    pub computations: u64,
    /// Requests that joined another caller's computation
    pub joined: u64,
    /// Store reads or writes that failed
    pub store_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    computations: AtomicU64,
    joined: AtomicU64,
    store_errors: AtomicU64,
}

/// Fingerprint-keyed cache with single-flight computation.
pub struct AnalysisCache {
    store: Option<Arc<dyn CacheStore>>,
    in_flight: Mutex<InFlightTable>,
    counters: Counters,
}

impl AnalysisCache {
    /// A cache that reads from and writes to `store`.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store: Some(store),
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// A cache without persistence. Concurrent requests are still deduplicated.
    pub fn disabled() -> Self {
        Self {
            store: None,
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            joined: self.counters.joined.load(Ordering::Relaxed),
            store_errors: self.counters.store_errors.load(Ordering::Relaxed),
        }
    }

    /// Number of computations currently running.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Returns the cached analysis for `fingerprint`, joins a running
    /// computation for it, or runs `compute`.
    ///
    /// A cancelled computation is never stored, and waiters on it retry.
    /// Other failures are shared with the waiters as [`AnalysisError::InFlight`].
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        compute: F,
    ) -> Result<Arc<Analysis>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Analysis>>,
    {
        let mut compute = Some(compute);
        let mut joined = false;
        loop {
            match self.register(fingerprint) {
                Role::Follower(receiver) => {
                    if !joined {
                        joined = true;
                        self.counters.joined.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!(fingerprint = %fingerprint, "Joining in-flight analysis");
                    match wait_for(receiver).await {
                        Outcome::Ready(analysis) => return Ok(analysis),
                        Outcome::Failed(message) => return Err(AnalysisError::InFlight(message)),
                        Outcome::Abandoned => {
                            debug!(fingerprint = %fingerprint, "In-flight analysis abandoned, retrying");
                            continue;
                        }
                    }
                }
                Role::Leader(guard) => {
                    if let Some(hit) = self.lookup(fingerprint) {
                        guard.publish(Outcome::Ready(Arc::clone(&hit)));
                        return Ok(hit);
                    }

                    let compute = compute
                        .take()
                        .ok_or_else(|| AnalysisError::internal("analysis computed twice"))?;
                    self.counters.computations.fetch_add(1, Ordering::Relaxed);

                    return match compute().await {
                        Ok(analysis) => {
                            let analysis = Arc::new(analysis);
                            self.persist(fingerprint, &analysis);
                            guard.publish(Outcome::Ready(Arc::clone(&analysis)));
                            Ok(analysis)
                        }
                        Err(err) if err.is_cancelled() => {
                            guard.publish(Outcome::Abandoned);
                            Err(err)
                        }
                        Err(err) => {
                            guard.publish(Outcome::Failed(err.to_string()));
                            Err(err)
                        }
                    };
                }
            }
        }
    }

    fn register(&self, fingerprint: &Fingerprint) -> Role<'_> {
        let mut table = lock(&self.in_flight);
        if let Some(receiver) = table.get(fingerprint) {
            return Role::Follower(receiver.clone());
        }
        let (sender, receiver) = watch::channel(None);
        table.insert(fingerprint.clone(), receiver);
        Role::Leader(InFlightGuard {
            table: &self.in_flight,
            fingerprint: fingerprint.clone(),
            sender,
            published: false,
        })
    }

    fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<Analysis>> {
        let store = self.store.as_ref()?;
        match store.get(fingerprint) {
            Ok(Some(analysis)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fingerprint, store = store.name(), "Cache hit");
                Some(Arc::new(analysis))
            }
            Ok(None) => {
                debug!(fingerprint = %fingerprint, store = store.name(), "Cache miss");
                None
            }
            Err(e) => {
                self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
                warn!(fingerprint = %fingerprint, store = store.name(), error = %e, "Cache read failed, recomputing");
                None
            }
        }
    }

    fn persist(&self, fingerprint: &Fingerprint, analysis: &Analysis) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.put(fingerprint, analysis) {
            self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
            warn!(fingerprint = %fingerprint, store = store.name(), error = %e, "Cache write failed");
        }
    }
}

impl fmt::Debug for AnalysisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisCache")
            .field("store", &self.store.as_ref().map(|s| s.name()))
            .field("in_flight", &self.in_flight())
            .field("stats", &self.stats())
            .finish()
    }
}

async fn wait_for(mut receiver: watch::Receiver<Option<Outcome>>) -> Outcome {
    loop {
        let current = receiver.borrow_and_update().clone();
        if let Some(outcome) = current {
            return outcome;
        }
        if receiver.changed().await.is_err() {
            return receiver.borrow().clone().unwrap_or(Outcome::Abandoned);
        }
    }
}
