//! Search configuration parameters.

use crate::time::TimeManagement;
use engine_core::Move;
use std::time::Duration;

/// Sentinel for "no playout / visit limit".
pub const UNLIMITED_PLAYOUTS: u32 = i32::MAX as u32 / 2;

/// Default total memory budget for tree and cache (5.2 GB).
pub const DEFAULT_MAX_MEMORY: usize = 5_200_000_000;

/// Default share of the budget reserved for the evaluation cache, in percent.
pub const DEFAULT_CACHE_RATIO_PERCENT: u32 = 10;

/// Smallest tree budget accepted when applying a memory plan (100 MB).
pub const MIN_TREE_SPACE: usize = 100_000_000;

/// Smallest evaluation cache accepted when applying a memory plan.
pub const MIN_CACHE_COUNT: usize = 6_000;

/// Approximate bytes per cache entry (hash, policy and value floats).
pub const DEFAULT_CACHE_ENTRY_BYTES: usize = 1_600;

/// Memory budget and the floors used when splitting it.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    /// Total bytes for tree plus cache (evaluator footprint included).
    pub max_memory: usize,

    /// Percentage of the search budget given to the evaluation cache (1..=99).
    pub cache_ratio_percent: u32,

    /// Reject plans leaving less than this for the tree.
    pub min_tree_bytes: usize,

    /// Reject plans leaving room for fewer cache entries than this.
    pub min_cache_entries: usize,

    /// Estimated size of one cache entry.
    pub cache_entry_bytes: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memory: DEFAULT_MAX_MEMORY,
            cache_ratio_percent: DEFAULT_CACHE_RATIO_PERCENT,
            min_tree_bytes: MIN_TREE_SPACE,
            min_cache_entries: MIN_CACHE_COUNT,
            cache_entry_bytes: DEFAULT_CACHE_ENTRY_BYTES,
        }
    }
}

/// Configuration for the search engine.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Threads running simulations, the calling thread included.
    pub num_threads: usize,

    /// Playouts per `think` (UNLIMITED_PLAYOUTS = no limit).
    pub max_playouts: u32,

    /// Stop once the root has this many visits (UNLIMITED_PLAYOUTS = no limit).
    pub max_visits: u32,

    /// Exploration constant scaling the prior term.
    pub c_puct: f32,

    /// Growth rate of the exploration numerator: sqrt(N * ln(log_puct * N + log_const)).
    pub log_puct: f32,
    pub log_const: f32,

    /// First-play-urgency reduction for unvisited children below the root.
    pub fpu_reduction: f32,

    /// First-play-urgency reduction at the root.
    pub fpu_root_reduction: f32,

    /// Weight of the score-based winrate in the blended value (0 = outcome only).
    pub lambda: f32,

    /// Score offset at which the score-based winrate is 50%.
    pub mu: f32,

    /// Virtual losses added per traversal of a node.
    pub virtual_loss: u32,

    /// Floor for the normalized prior a move needs to get a child node.
    pub min_adoption_prior: f32,

    /// Tail probability for the one-sided confidence bounds.
    pub ci_alpha: f32,

    /// Children need this share of the most-visited child's visits to take
    /// part in confidence-bound pruning.
    pub lcb_min_visit_ratio: f32,

    /// Fraction of the budget that must be spent before confidence-bound
    /// pruning may discard candidates.
    pub lcb_min_budget_fraction: f32,

    /// Resign when the best blended value drops below this (0 disables).
    pub resign_threshold: f32,

    /// Do not resign while the expected margin is closer than this.
    pub resign_min_score: f32,

    /// Skip the pass-loses / pass-out heuristics.
    pub dumb_pass: bool,

    /// Mix Dirichlet noise into root priors.
    pub noise: bool,

    /// Dirichlet alpha; scaled by 361 / board cells when applied.
    pub dirichlet_alpha: f32,

    /// Fraction of each root prior replaced by noise.
    pub dirichlet_epsilon: f32,

    /// Pick moves proportionally to visits during the first N moves.
    pub random_moves: usize,

    /// Minimum visits for a child to be eligible for random selection.
    pub random_min_visits: u32,

    /// Memoize evaluator output by position hash.
    pub use_cache: bool,

    pub time_management: TimeManagement,

    /// Safety margin subtracted from the clock for each move.
    pub lag_buffer: Duration,

    /// Stop early once any of these root moves has `stopping_visits` visits.
    pub stopping_moves: Vec<Move>,
    pub stopping_visits: u32,

    /// Seed for noise and random move selection (None = from entropy).
    pub seed: Option<u64>,

    pub memory: MemoryConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_threads: 2,
            max_playouts: UNLIMITED_PLAYOUTS,
            max_visits: UNLIMITED_PLAYOUTS,
            c_puct: 0.5,
            log_puct: 0.015,
            log_const: 1.7,
            fpu_reduction: 0.25,
            fpu_root_reduction: 0.25,
            lambda: 0.5,
            mu: 0.0,
            virtual_loss: 3,
            min_adoption_prior: 0.0,
            ci_alpha: 1e-5,
            lcb_min_visit_ratio: 0.10,
            lcb_min_budget_fraction: 0.5,
            resign_threshold: 0.10,
            resign_min_score: 0.0,
            dumb_pass: false,
            noise: false,
            dirichlet_alpha: 0.03,
            dirichlet_epsilon: 0.25,
            random_moves: 0,
            random_min_visits: 1,
            use_cache: true,
            time_management: TimeManagement::Auto,
            lag_buffer: Duration::from_millis(1_000),
            stopping_moves: Vec::new(),
            stopping_visits: UNLIMITED_PLAYOUTS,
            seed: None,
            memory: MemoryConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Create config for self-play (noise on, randomized opening).
    pub fn for_training() -> Self {
        Self {
            noise: true,
            random_moves: 30,
            resign_threshold: 0.05,
            ..Self::default()
        }
    }

    /// Create config for match play (no noise, deterministic choice).
    pub fn for_evaluation() -> Self {
        Self::default()
    }

    /// Create a small, deterministic config for testing.
    pub fn for_testing() -> Self {
        Self {
            num_threads: 1,
            max_playouts: 64,
            time_management: TimeManagement::Off,
            lag_buffer: Duration::ZERO,
            seed: Some(42),
            memory: MemoryConfig {
                max_memory: 64 << 20,
                cache_ratio_percent: 10,
                min_tree_bytes: 1 << 20,
                min_cache_entries: 16,
                cache_entry_bytes: 256,
            },
            ..Self::default()
        }
    }

    /// Builder pattern: set worker thread count (at least one).
    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = n.max(1);
        self
    }

    /// Builder pattern: set the playout limit (0 = unlimited).
    pub fn with_playouts(mut self, n: u32) -> Self {
        self.max_playouts = limit_or_unlimited(n);
        self
    }

    /// Builder pattern: set the root visit limit (0 = unlimited).
    pub fn with_visits(mut self, n: u32) -> Self {
        self.max_visits = limit_or_unlimited(n);
        self
    }

    /// Builder pattern: set the outcome/score blending weights.
    pub fn with_blend(mut self, lambda: f32, mu: f32) -> Self {
        self.lambda = lambda.clamp(0.0, 1.0);
        self.mu = mu;
        self
    }

    /// Builder pattern: set the resignation threshold (0 disables).
    pub fn with_resign_threshold(mut self, threshold: f32) -> Self {
        self.resign_threshold = threshold;
        self
    }

    /// Builder pattern: set the minimum adoption prior for new children.
    pub fn with_min_adoption_prior(mut self, prior: f32) -> Self {
        self.min_adoption_prior = prior;
        self
    }

    pub fn with_time_management(mut self, mode: TimeManagement) -> Self {
        self.time_management = mode;
        self
    }

    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Map the protocol convention "0 means no limit" onto the sentinel.
pub(crate) fn limit_or_unlimited(n: u32) -> u32 {
    if n == 0 {
        UNLIMITED_PLAYOUTS
    } else {
        n.min(UNLIMITED_PLAYOUTS)
    }
}
