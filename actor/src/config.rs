//! Configuration for the self-play actor
//!
//! Defaults come from the central config (config.toml plus `KEIMA_*`
//! environment overrides). CLI arguments take highest priority.

use clap::Parser;
use engine_config::{load_config, CentralConfig};

use crate::evaluator::TerritoryEvaluator;
use mcts::{MemoryConfig, SearchConfig, TimeControl, TimeManagement};
use once_cell::sync::Lazy;
use std::time::Duration;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

const MIB: usize = 1 << 20;

/// Invalid actor settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level '{0}', expected one of trace, debug, info, warn, error")]
    LogLevel(String),

    #[error("board size {0} unsupported (expected 2..=19)")]
    BoardSize(usize),

    #[error("threads must be greater than 0")]
    Threads,

    #[error("{0}")]
    TimeManagement(#[from] mcts::time::ParseTimeManagementError),
}

fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}

fn default_seed() -> u64 {
    CENTRAL_CONFIG.common.seed
}

fn default_games() -> u32 {
    CENTRAL_CONFIG.actor.games
}

fn default_board_size() -> usize {
    CENTRAL_CONFIG.actor.board_size
}

fn default_komi() -> f64 {
    CENTRAL_CONFIG.actor.komi
}

fn default_max_moves() -> usize {
    CENTRAL_CONFIG.actor.max_moves
}

fn default_ponder_ms() -> u64 {
    CENTRAL_CONFIG.actor.ponder_ms
}

fn default_log_interval() -> u32 {
    CENTRAL_CONFIG.actor.log_interval
}

fn default_threads() -> usize {
    CENTRAL_CONFIG.search.threads
}

fn default_playouts() -> u32 {
    CENTRAL_CONFIG.search.playouts
}

fn default_visits() -> u32 {
    CENTRAL_CONFIG.search.visits
}

fn default_noise() -> bool {
    CENTRAL_CONFIG.search.noise
}

fn default_time_management() -> String {
    CENTRAL_CONFIG.time.management.clone()
}

fn default_main_time() -> u64 {
    CENTRAL_CONFIG.time.main_time_secs
}

fn default_byo_time() -> u64 {
    CENTRAL_CONFIG.time.byo_time_secs
}

fn default_max_memory_mb() -> u64 {
    CENTRAL_CONFIG.memory.max_memory_mb
}

fn default_evaluator_mb() -> u64 {
    CENTRAL_CONFIG.memory.evaluator_mb
}

#[derive(Parser, Debug, Clone)]
#[command(name = "actor")]
#[command(about = "Keima actor - self-play runner for the search engine")]
#[command(
    long_about = "Actor that plays self-play Go games with the Keima search engine
and logs per-game statistics.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// RNG seed for noise and opening randomization (0 = from entropy)
    #[arg(long, default_value_t = default_seed())]
    pub seed: u64,

    /// Number of self-play games
    #[arg(long, default_value_t = default_games())]
    pub games: u32,

    /// Board edge length (2..=19)
    #[arg(long, default_value_t = default_board_size())]
    pub board_size: usize,

    #[arg(long, default_value_t = default_komi())]
    pub komi: f64,

    /// Move cap per game (0 = three times the board cells)
    #[arg(long, default_value_t = default_max_moves())]
    pub max_moves: usize,

    /// Ponder between moves for this many milliseconds (0 = never)
    #[arg(long, default_value_t = default_ponder_ms())]
    pub ponder_ms: u64,

    /// Log aggregate stats every N games (0 to disable)
    #[arg(long, default_value_t = default_log_interval())]
    pub log_interval: u32,

    /// Search threads, the calling thread included
    #[arg(long, default_value_t = default_threads())]
    pub threads: usize,

    /// Playouts per move (0 = unlimited)
    #[arg(long, default_value_t = default_playouts())]
    pub playouts: u32,

    /// Root visits per move (0 = unlimited)
    #[arg(long, default_value_t = default_visits())]
    pub visits: u32,

    /// Mix Dirichlet noise into root priors
    #[arg(long, default_value_t = default_noise(), action = clap::ArgAction::Set)]
    pub noise: bool,

    /// Time management: auto, off, on, fast or no_pruning
    #[arg(long, default_value_t = default_time_management())]
    pub time_management: String,

    /// Main time per player in seconds (0 with no byo-yomi = no clock)
    #[arg(long, default_value_t = default_main_time())]
    pub main_time_secs: u64,

    /// Byo-yomi period in seconds
    #[arg(long, default_value_t = default_byo_time())]
    pub byo_time_secs: u64,

    /// Memory budget for tree and cache in MiB (0 = engine default)
    #[arg(long, default_value_t = default_max_memory_mb())]
    pub max_memory_mb: u64,

    /// Evaluator footprint taken out of the memory budget, in MiB
    /// (0 = the evaluator's own estimate)
    #[arg(long, default_value_t = default_evaluator_mb())]
    pub evaluator_mb: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::LogLevel(self.log_level.clone()));
        }

        if !(2..=games_go::MAX_SIZE).contains(&self.board_size) {
            return Err(ConfigError::BoardSize(self.board_size));
        }

        if self.threads == 0 {
            return Err(ConfigError::Threads);
        }

        self.time_management.parse::<TimeManagement>()?;
        Ok(())
    }

    /// Search settings from the central config, overridden by the CLI.
    pub fn search_config(&self) -> Result<SearchConfig, ConfigError> {
        self.search_config_from(&CENTRAL_CONFIG)
    }

    pub fn search_config_from(&self, central: &CentralConfig) -> Result<SearchConfig, ConfigError> {
        let search = &central.search;
        let memory = &central.memory;
        let defaults = MemoryConfig::default();

        let max_memory = if self.max_memory_mb == 0 {
            defaults.max_memory
        } else {
            self.max_memory_mb as usize * MIB
        };

        let mut config = SearchConfig {
            num_threads: self.threads.max(1),
            c_puct: search.c_puct as f32,
            log_puct: search.log_puct as f32,
            log_const: search.log_const as f32,
            fpu_reduction: search.fpu_reduction as f32,
            fpu_root_reduction: search.fpu_root_reduction as f32,
            virtual_loss: search.virtual_loss,
            ci_alpha: search.ci_alpha as f32,
            lcb_min_visit_ratio: search.lcb_min_visit_ratio as f32,
            lcb_min_budget_fraction: search.lcb_min_budget_fraction as f32,
            resign_min_score: search.resign_min_score as f32,
            dumb_pass: search.dumb_pass,
            noise: self.noise,
            dirichlet_alpha: search.dirichlet_alpha as f32,
            dirichlet_epsilon: search.dirichlet_epsilon as f32,
            random_moves: search.random_moves,
            random_min_visits: search.random_min_visits,
            use_cache: search.use_cache,
            lag_buffer: Duration::from_millis(central.time.lag_buffer_ms),
            memory: MemoryConfig {
                max_memory,
                cache_ratio_percent: memory.cache_ratio_percent,
                min_tree_bytes: memory.min_tree_mb as usize * MIB,
                min_cache_entries: memory.min_cache_entries,
                cache_entry_bytes: memory.cache_entry_bytes,
            },
            ..SearchConfig::default()
        }
        .with_playouts(self.playouts)
        .with_visits(self.visits)
        .with_blend(search.lambda as f32, search.mu as f32)
        .with_resign_threshold(search.resign_threshold as f32)
        .with_min_adoption_prior(search.min_adoption_prior as f32)
        .with_time_management(self.time_management.parse()?);

        if self.seed != 0 {
            config = config.with_seed(self.seed);
        }
        Ok(config)
    }

    /// Evaluator for each self-play game.
    pub fn evaluator(&self) -> TerritoryEvaluator {
        match self.evaluator_mb {
            0 => TerritoryEvaluator::new(),
            mb => TerritoryEvaluator::with_footprint(mb as usize * MIB),
        }
    }

    /// Game clock for each self-play game.
    pub fn time_control(&self) -> TimeControl {
        TimeControl::new(
            Duration::from_secs(self.main_time_secs),
            Duration::from_secs(self.byo_time_secs),
            CENTRAL_CONFIG.time.byo_stones,
            CENTRAL_CONFIG.time.byo_periods,
        )
    }

    /// Move cap per game.
    pub fn move_cap(&self) -> usize {
        if self.max_moves == 0 {
            3 * self.board_size * self.board_size
        } else {
            self.max_moves
        }
    }

    pub fn ponder_time(&self) -> Option<Duration> {
        (self.ponder_ms > 0).then(|| Duration::from_millis(self.ponder_ms))
    }
}
