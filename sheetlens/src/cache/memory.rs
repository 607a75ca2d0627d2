//! In-process cache store with expiry and bounded size.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{CacheStore, Fingerprint};
use crate::error::CacheError;
use crate::model::Analysis;

/// Cache entry with timestamp.
#[derive(Debug, Clone)]
struct CacheEntry {
    analysis: Analysis,
    stored_at: Instant,
}

/// Keeps analyses in memory for the lifetime of the process.
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    /// Time-to-live for entries; `None` keeps them until evicted
    ttl: Option<Duration>,
    max_entries: usize,
}

impl MemoryCacheStore {
    /// Creates an unbounded-lifetime store holding up to 256 analyses.
    pub fn new() -> Self {
        Self::with_config(None, 256)
    }

    /// Creates a store with a custom expiry and capacity.
    pub fn with_config(ttl: Option<Duration>, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Removes expired entries.
    pub fn remove_expired(&self) {
        if let Some(ttl) = self.ttl {
            self.lock().retain(|_, entry| entry.stored_at.elapsed() < ttl);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.ttl.map_or(true, |ttl| entry.stored_at.elapsed() < ttl)
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Analysis>, CacheError> {
        let entries = self.lock();
        Ok(entries
            .get(fingerprint)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.analysis.clone()))
    }

    fn put(&self, fingerprint: &Fingerprint, analysis: &Analysis) -> Result<(), CacheError> {
        let mut entries = self.lock();
        if !entries.contains_key(fingerprint) && entries.len() >= self.max_entries {
            // Evict oldest entry
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            fingerprint.clone(),
            CacheEntry {
                analysis: analysis.clone(),
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
