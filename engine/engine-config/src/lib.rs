//! Centralized configuration loading from config.toml.
//!
//! This crate provides the configuration structs and loading logic used by
//! the actor binary and any other front end driving the engine.
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`KEIMA_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults (config.defaults.toml, embedded at compile time)
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! KEIMA_<SECTION>_<KEY>=value
//!
//! Examples:
//!     KEIMA_COMMON_LOG_LEVEL=debug
//!     KEIMA_SEARCH_THREADS=8
//!     KEIMA_SEARCH_PLAYOUTS=1600
//!     KEIMA_MEMORY_MAX_MEMORY_MB=4096
//!     KEIMA_TIME_MANAGEMENT=fast
//!     KEIMA_ACTOR_BOARD_SIZE=19
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, sanitize, CONFIG_SEARCH_PATHS};
pub use structs::*;
