//! Memory accounting for the search tree and the evaluation cache.
//!
//! The tree never grows past its byte ceiling: every node allocation first
//! reserves bytes here, and a refused reservation leaves the tree unchanged.
//! [`MemoryPlan`] splits a total budget between the evaluator, the cache and
//! the tree.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::config::{MemoryConfig, DEFAULT_MAX_MEMORY};

/// Errors rejecting a memory budget. The previous settings stay in force.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Cache ratio {0}% out of range (1-99)")]
    InvalidCacheRatio(u32),

    #[error("Not enough memory for evaluator: {required} bytes needed, {available} available")]
    NotEnoughForEvaluator { required: usize, available: usize },

    #[error("Not enough memory for cache: room for {entries} entries, {required} required")]
    NotEnoughForCache { entries: usize, required: usize },

    #[error("Not enough memory for search tree: {available} bytes, {required} required")]
    NotEnoughForTree { available: usize, required: usize },
}

/// A validated split of the memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPlan {
    pub total_bytes: usize,
    pub cache_ratio_percent: u32,
    pub evaluator_bytes: usize,
    pub cache_bytes: usize,
    pub cache_entries: usize,
    pub tree_bytes: usize,
}

impl MemoryPlan {
    /// Split `total` bytes (0 = default) between evaluator, cache and tree.
    pub fn compute(
        total: usize,
        cache_ratio_percent: u32,
        evaluator_bytes: usize,
        limits: &MemoryConfig,
    ) -> Result<Self, MemoryError> {
        let total = if total == 0 { DEFAULT_MAX_MEMORY } else { total };
        if !(1..=99).contains(&cache_ratio_percent) {
            return Err(MemoryError::InvalidCacheRatio(cache_ratio_percent));
        }
        if total < evaluator_bytes {
            return Err(MemoryError::NotEnoughForEvaluator {
                required: evaluator_bytes,
                available: total,
            });
        }

        let search_bytes = total - evaluator_bytes;
        let cache_bytes = search_bytes / 100 * cache_ratio_percent as usize
            + search_bytes % 100 * cache_ratio_percent as usize / 100;
        let cache_entries = cache_bytes / limits.cache_entry_bytes.max(1);
        if cache_entries < limits.min_cache_entries {
            return Err(MemoryError::NotEnoughForCache {
                entries: cache_entries,
                required: limits.min_cache_entries,
            });
        }

        let tree_bytes = search_bytes - cache_bytes;
        if tree_bytes < limits.min_tree_bytes {
            return Err(MemoryError::NotEnoughForTree {
                available: tree_bytes,
                required: limits.min_tree_bytes,
            });
        }

        Ok(Self {
            total_bytes: total,
            cache_ratio_percent,
            evaluator_bytes,
            cache_bytes,
            cache_entries,
            tree_bytes,
        })
    }
}

impl fmt::Display for MemoryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MIB: f64 = 1024.0 * 1024.0;
        write!(
            f,
            "Setting max tree size to {:.2} MiB and cache size to {:.2} MiB ({} entries).",
            self.tree_bytes as f64 / MIB,
            self.cache_bytes as f64 / MIB,
            self.cache_entries
        )
    }
}

/// Shared byte counter with a ceiling.
#[derive(Debug)]
pub struct MemoryAccountant {
    used: AtomicUsize,
    limit: AtomicUsize,
}

impl MemoryAccountant {
    pub fn new(limit: usize) -> Self {
        Self {
            used: AtomicUsize::new(0),
            limit: AtomicUsize::new(limit),
        }
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Acquire)
    }

    pub(crate) fn set_limit(&self, limit: usize) {
        self.limit.store(limit, Ordering::Release);
    }

    /// Reserve `bytes` unless that would exceed the ceiling.
    pub fn try_reserve(&self, bytes: usize) -> bool {
        let limit = self.limit();
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&next| next <= limit)
            })
            .is_ok()
    }

    /// Reserve regardless of the ceiling. Used for the root of a fresh tree
    /// and when re-registering a subtree that already fitted.
    pub(crate) fn force_reserve(&self, bytes: usize) {
        self.used.fetch_add(bytes, Ordering::AcqRel);
    }

    pub fn release(&self, bytes: usize) {
        let prev = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(bytes))
            })
            .unwrap_or(0);
        debug_assert!(prev >= bytes, "released more memory than reserved");
    }

    /// Used share of the ceiling (may exceed 1.0 transiently after a shrink).
    pub fn fullness(&self) -> f32 {
        match self.limit() {
            0 => 1.0,
            limit => self.used() as f32 / limit as f32,
        }
    }

    /// Prior floor implied by memory pressure: expansion gets pickier as the
    /// tree fills up, and stops entirely once it is full.
    pub fn pressure_prior(&self) -> f32 {
        let full = self.fullness();
        if full >= 1.0 {
            2.0
        } else if full > 0.95 {
            0.01
        } else if full > 0.5 {
            0.001
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn small_limits() -> MemoryConfig {
        MemoryConfig {
            max_memory: 10_000,
            cache_ratio_percent: 10,
            min_tree_bytes: 1_000,
            min_cache_entries: 4,
            cache_entry_bytes: 100,
        }
    }

    #[test]
    fn test_plan_split() {
        let plan = MemoryPlan::compute(10_000, 10, 2_000, &small_limits()).unwrap();
        assert_eq!(plan.cache_bytes, 800);
        assert_eq!(plan.cache_entries, 8);
        assert_eq!(plan.tree_bytes, 7_200);
        assert!(plan.to_string().starts_with("Setting max tree size"));
    }

    #[test]
    fn test_plan_zero_means_default() {
        let plan = MemoryPlan::compute(0, 10, 0, &MemoryConfig::default()).unwrap();
        assert_eq!(plan.total_bytes, DEFAULT_MAX_MEMORY);
    }

    #[test]
    fn test_plan_rejections() {
        let limits = small_limits();
        assert_eq!(
            MemoryPlan::compute(10_000, 0, 0, &limits),
            Err(MemoryError::InvalidCacheRatio(0))
        );
        assert_eq!(
            MemoryPlan::compute(10_000, 100, 0, &limits),
            Err(MemoryError::InvalidCacheRatio(100))
        );
        assert!(matches!(
            MemoryPlan::compute(1_000, 10, 2_000, &limits),
            Err(MemoryError::NotEnoughForEvaluator { .. })
        ));
        // 1% of 10k = 100 bytes = 1 entry
        assert!(matches!(
            MemoryPlan::compute(10_000, 1, 0, &limits),
            Err(MemoryError::NotEnoughForCache { entries: 1, .. })
        ));
        // 95% to cache leaves 500 bytes for the tree
        assert!(matches!(
            MemoryPlan::compute(10_000, 95, 0, &limits),
            Err(MemoryError::NotEnoughForTree { available: 500, .. })
        ));
    }

    #[test]
    fn test_reserve_respects_limit() {
        let acct = MemoryAccountant::new(100);
        assert!(acct.try_reserve(60));
        assert!(!acct.try_reserve(41));
        assert_eq!(acct.used(), 60);
        assert!(acct.try_reserve(40));
        assert!((acct.fullness() - 1.0).abs() < 1e-6);
        acct.release(100);
        assert_eq!(acct.used(), 0);
    }

    #[test]
    fn test_pressure_prior() {
        let acct = MemoryAccountant::new(100);
        assert_eq!(acct.pressure_prior(), 0.0);
        acct.force_reserve(60);
        assert!((acct.pressure_prior() - 0.001).abs() < 1e-9);
        acct.force_reserve(36);
        assert!((acct.pressure_prior() - 0.01).abs() < 1e-9);
        acct.force_reserve(4);
        assert!(acct.pressure_prior() > 1.0);
    }

    #[test]
    fn test_concurrent_reserve_never_exceeds_limit() {
        let acct = Arc::new(MemoryAccountant::new(1_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let acct = Arc::clone(&acct);
                thread::spawn(move || (0..200).filter(|_| acct.try_reserve(7)).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 1_000 / 7);
        assert!(acct.used() <= acct.limit());
    }
}
