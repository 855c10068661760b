//! Configuration struct definitions.
//!
//! Every section deserializes with `#[serde(default)]`, so a config.toml only
//! needs the keys it changes; missing keys fall back to config.defaults.toml.

use crate::defaults;
use serde::Deserialize;

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub memory: MemorySection,
    #[serde(default)]
    pub time: TimeSection,
    #[serde(default)]
    pub actor: ActorConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    pub log_level: String,
    /// RNG seed; 0 seeds from entropy.
    pub seed: u64,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level().into(),
            seed: defaults::seed(),
        }
    }
}

/// Search tuning
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchSection {
    pub threads: usize,
    /// Playouts per move (0 = unlimited)
    pub playouts: u32,
    /// Root visits per move (0 = unlimited)
    pub visits: u32,
    pub c_puct: f64,
    pub log_puct: f64,
    pub log_const: f64,
    pub fpu_reduction: f64,
    pub fpu_root_reduction: f64,
    pub lambda: f64,
    pub mu: f64,
    pub virtual_loss: u32,
    pub min_adoption_prior: f64,
    pub ci_alpha: f64,
    pub lcb_min_visit_ratio: f64,
    pub lcb_min_budget_fraction: f64,
    pub resign_threshold: f64,
    pub resign_min_score: f64,
    pub dumb_pass: bool,
    pub noise: bool,
    pub dirichlet_alpha: f64,
    pub dirichlet_epsilon: f64,
    pub random_moves: usize,
    pub random_min_visits: u32,
    pub use_cache: bool,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            threads: defaults::threads(),
            playouts: defaults::playouts(),
            visits: defaults::visits(),
            c_puct: defaults::c_puct(),
            log_puct: defaults::log_puct(),
            log_const: defaults::log_const(),
            fpu_reduction: defaults::fpu_reduction(),
            fpu_root_reduction: defaults::fpu_root_reduction(),
            lambda: defaults::lambda(),
            mu: defaults::mu(),
            virtual_loss: defaults::virtual_loss(),
            min_adoption_prior: defaults::min_adoption_prior(),
            ci_alpha: defaults::ci_alpha(),
            lcb_min_visit_ratio: defaults::lcb_min_visit_ratio(),
            lcb_min_budget_fraction: defaults::lcb_min_budget_fraction(),
            resign_threshold: defaults::resign_threshold(),
            resign_min_score: defaults::resign_min_score(),
            dumb_pass: defaults::dumb_pass(),
            noise: defaults::noise(),
            dirichlet_alpha: defaults::dirichlet_alpha(),
            dirichlet_epsilon: defaults::dirichlet_epsilon(),
            random_moves: defaults::random_moves(),
            random_min_visits: defaults::random_min_visits(),
            use_cache: defaults::use_cache(),
        }
    }
}

/// Memory budget split between evaluator, cache and tree
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemorySection {
    /// Total budget in MiB (0 = engine default)
    pub max_memory_mb: u64,
    pub cache_ratio_percent: u32,
    pub min_tree_mb: u64,
    pub min_cache_entries: usize,
    pub cache_entry_bytes: usize,
    /// Resident size of the evaluator, subtracted from the budget
    pub evaluator_mb: u64,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_memory_mb: defaults::max_memory_mb(),
            cache_ratio_percent: defaults::cache_ratio_percent(),
            min_tree_mb: defaults::min_tree_mb(),
            min_cache_entries: defaults::min_cache_entries(),
            cache_entry_bytes: defaults::cache_entry_bytes(),
            evaluator_mb: defaults::evaluator_mb(),
        }
    }
}

/// Clock and time management
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimeSection {
    /// One of auto, off, on, fast, no_pruning
    pub management: String,
    pub lag_buffer_ms: u64,
    pub main_time_secs: u64,
    pub byo_time_secs: u64,
    pub byo_stones: u32,
    pub byo_periods: u32,
}

impl Default for TimeSection {
    fn default() -> Self {
        Self {
            management: defaults::management().into(),
            lag_buffer_ms: defaults::lag_buffer_ms(),
            main_time_secs: defaults::main_time_secs(),
            byo_time_secs: defaults::byo_time_secs(),
            byo_stones: defaults::byo_stones(),
            byo_periods: defaults::byo_periods(),
        }
    }
}

/// Actor (self-play) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ActorConfig {
    pub games: u32,
    pub board_size: usize,
    pub komi: f64,
    /// Move cap per game (0 = three times the board cells)
    pub max_moves: usize,
    /// Ponder between moves for this long (0 = never)
    pub ponder_ms: u64,
    pub log_interval: u32,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            games: defaults::games(),
            board_size: defaults::board_size(),
            komi: defaults::komi(),
            max_moves: defaults::max_moves(),
            ponder_ms: defaults::ponder_ms(),
            log_interval: defaults::log_interval(),
        }
    }
}
