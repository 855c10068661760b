//! Evaluation cache keyed by position hash.
//!
//! Transpositions and re-searched positions skip the evaluator. Entries are
//! evicted oldest-first once the configured capacity is reached.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::evaluator::Evaluation;

struct CacheInner {
    map: HashMap<u64, Arc<Evaluation>>,
    order: VecDeque<u64>,
    max_entries: usize,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub lookups: u64,
    pub hits: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

/// Thread-safe memo of evaluator output.
pub struct EvalCache {
    inner: Mutex<CacheInner>,
    entry_bytes: usize,
    lookups: AtomicU64,
    hits: AtomicU64,
}

impl EvalCache {
    pub fn new(max_entries: usize, entry_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
                max_entries,
            }),
            entry_bytes,
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    pub fn lookup(&self, hash: u64) -> Option<Arc<Evaluation>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let found = self.inner.lock().map.get(&hash).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, hash: u64, evaluation: Arc<Evaluation>) {
        let mut inner = self.inner.lock();
        if inner.max_entries == 0 || inner.map.contains_key(&hash) {
            return;
        }
        while inner.map.len() >= inner.max_entries {
            match inner.order.pop_front() {
                Some(old) => {
                    inner.map.remove(&old);
                }
                None => break,
            }
        }
        inner.map.insert(hash, evaluation);
        inner.order.push_back(hash);
    }

    /// Change the capacity, evicting the oldest entries if it shrinks.
    pub fn resize(&self, max_entries: usize) {
        let mut inner = self.inner.lock();
        inner.max_entries = max_entries;
        while inner.map.len() > max_entries {
            match inner.order.pop_front() {
                Some(old) => {
                    inner.map.remove(&old);
                }
                None => break,
            }
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate resident size of the cached entries.
    pub fn estimated_bytes(&self) -> usize {
        let inner = self.inner.lock();
        inner.map.len() * self.entry_bytes
            + inner.order.capacity() * mem::size_of::<u64>()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.map.len(),
            capacity: inner.max_entries,
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}
