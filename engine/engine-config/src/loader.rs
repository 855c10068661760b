//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::{defaults, CentralConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",      // Current directory
    "../config.toml",   // Parent directory (when running from subdirectory)
    "/app/config.toml", // Docker container
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by KEIMA_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
/// 4. Docker container path (/app/config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    // Check for explicit config path
    if let Ok(path) = std::env::var("KEIMA_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from KEIMA_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "KEIMA_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    // Search default locations
    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    // Fall back to defaults
    debug!("No config.toml found, using built-in defaults");
    finish(CentralConfig::default())
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => finish(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                finish(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            finish(CentralConfig::default())
        }
    }
}

fn finish(config: CentralConfig) -> CentralConfig {
    sanitize(apply_env_overrides(config))
}

/// Time management modes understood by the engine.
const TIME_MANAGEMENT_MODES: &[&str] = &["auto", "off", "on", "fast", "no_pruning"];

/// Replace values the engine cannot use with their defaults.
pub fn sanitize(mut config: CentralConfig) -> CentralConfig {
    if config.search.threads == 0 {
        warn!("search.threads = 0, using 1");
        config.search.threads = 1;
    }
    if !(0.0..=1.0).contains(&config.search.lambda) {
        warn!(lambda = config.search.lambda, "search.lambda outside [0, 1], clamping");
        config.search.lambda = config.search.lambda.clamp(0.0, 1.0);
    }
    if !(1..=99).contains(&config.memory.cache_ratio_percent) {
        warn!(
            ratio = config.memory.cache_ratio_percent,
            "memory.cache_ratio_percent outside 1-99, using default"
        );
        config.memory.cache_ratio_percent = defaults::cache_ratio_percent();
    }
    let mode = config.time.management.to_ascii_lowercase();
    if !TIME_MANAGEMENT_MODES.contains(&mode.as_str()) {
        warn!(mode = %config.time.management, "unknown time.management, using default");
        config.time.management = defaults::management().into();
    } else {
        config.time.management = mode;
    }
    if !(2..=19).contains(&config.actor.board_size) {
        warn!(
            size = config.actor.board_size,
            "actor.board_size outside 2-19, using default"
        );
        config.actor.board_size = defaults::board_size();
    }
    config
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (i32, u64, f64, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: KEIMA_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.log_level, "KEIMA_COMMON_LOG_LEVEL");
    env_override!(config, common.seed, "KEIMA_COMMON_SEED", parse);

    // Search
    env_override!(config, search.threads, "KEIMA_SEARCH_THREADS", parse);
    env_override!(config, search.playouts, "KEIMA_SEARCH_PLAYOUTS", parse);
    env_override!(config, search.visits, "KEIMA_SEARCH_VISITS", parse);
    env_override!(config, search.c_puct, "KEIMA_SEARCH_C_PUCT", parse);
    env_override!(config, search.log_puct, "KEIMA_SEARCH_LOG_PUCT", parse);
    env_override!(config, search.log_const, "KEIMA_SEARCH_LOG_CONST", parse);
    env_override!(
        config,
        search.fpu_reduction,
        "KEIMA_SEARCH_FPU_REDUCTION",
        parse
    );
    env_override!(
        config,
        search.fpu_root_reduction,
        "KEIMA_SEARCH_FPU_ROOT_REDUCTION",
        parse
    );
    env_override!(config, search.lambda, "KEIMA_SEARCH_LAMBDA", parse);
    env_override!(config, search.mu, "KEIMA_SEARCH_MU", parse);
    env_override!(
        config,
        search.virtual_loss,
        "KEIMA_SEARCH_VIRTUAL_LOSS",
        parse
    );
    env_override!(
        config,
        search.min_adoption_prior,
        "KEIMA_SEARCH_MIN_ADOPTION_PRIOR",
        parse
    );
    env_override!(config, search.ci_alpha, "KEIMA_SEARCH_CI_ALPHA", parse);
    env_override!(
        config,
        search.lcb_min_visit_ratio,
        "KEIMA_SEARCH_LCB_MIN_VISIT_RATIO",
        parse
    );
    env_override!(
        config,
        search.lcb_min_budget_fraction,
        "KEIMA_SEARCH_LCB_MIN_BUDGET_FRACTION",
        parse
    );
    env_override!(
        config,
        search.resign_threshold,
        "KEIMA_SEARCH_RESIGN_THRESHOLD",
        parse
    );
    env_override!(
        config,
        search.resign_min_score,
        "KEIMA_SEARCH_RESIGN_MIN_SCORE",
        parse
    );
    env_override!(config, search.dumb_pass, "KEIMA_SEARCH_DUMB_PASS", parse);
    env_override!(config, search.noise, "KEIMA_SEARCH_NOISE", parse);
    env_override!(
        config,
        search.dirichlet_alpha,
        "KEIMA_SEARCH_DIRICHLET_ALPHA",
        parse
    );
    env_override!(
        config,
        search.dirichlet_epsilon,
        "KEIMA_SEARCH_DIRICHLET_EPSILON",
        parse
    );
    env_override!(
        config,
        search.random_moves,
        "KEIMA_SEARCH_RANDOM_MOVES",
        parse
    );
    env_override!(
        config,
        search.random_min_visits,
        "KEIMA_SEARCH_RANDOM_MIN_VISITS",
        parse
    );
    env_override!(config, search.use_cache, "KEIMA_SEARCH_USE_CACHE", parse);

    // Memory
    env_override!(
        config,
        memory.max_memory_mb,
        "KEIMA_MEMORY_MAX_MEMORY_MB",
        parse
    );
    env_override!(
        config,
        memory.cache_ratio_percent,
        "KEIMA_MEMORY_CACHE_RATIO_PERCENT",
        parse
    );
    env_override!(config, memory.min_tree_mb, "KEIMA_MEMORY_MIN_TREE_MB", parse);
    env_override!(
        config,
        memory.min_cache_entries,
        "KEIMA_MEMORY_MIN_CACHE_ENTRIES",
        parse
    );
    env_override!(
        config,
        memory.cache_entry_bytes,
        "KEIMA_MEMORY_CACHE_ENTRY_BYTES",
        parse
    );
    env_override!(
        config,
        memory.evaluator_mb,
        "KEIMA_MEMORY_EVALUATOR_MB",
        parse
    );

    // Time
    env_override!(config, time.management, "KEIMA_TIME_MANAGEMENT");
    env_override!(config, time.lag_buffer_ms, "KEIMA_TIME_LAG_BUFFER_MS", parse);
    env_override!(
        config,
        time.main_time_secs,
        "KEIMA_TIME_MAIN_TIME_SECS",
        parse
    );
    env_override!(config, time.byo_time_secs, "KEIMA_TIME_BYO_TIME_SECS", parse);
    env_override!(config, time.byo_stones, "KEIMA_TIME_BYO_STONES", parse);
    env_override!(config, time.byo_periods, "KEIMA_TIME_BYO_PERIODS", parse);

    // Actor
    env_override!(config, actor.games, "KEIMA_ACTOR_GAMES", parse);
    env_override!(config, actor.board_size, "KEIMA_ACTOR_BOARD_SIZE", parse);
    env_override!(config, actor.komi, "KEIMA_ACTOR_KOMI", parse);
    env_override!(config, actor.max_moves, "KEIMA_ACTOR_MAX_MOVES", parse);
    env_override!(config, actor.ponder_ms, "KEIMA_ACTOR_PONDER_MS", parse);
    env_override!(
        config,
        actor.log_interval,
        "KEIMA_ACTOR_LOG_INTERVAL",
        parse
    );

    config
}
