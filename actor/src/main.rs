//! Actor - self-play runner for the Keima search engine
//!
//! Plays Go games against itself:
//! 1. Loads settings from config.toml, `KEIMA_*` env vars and the CLI
//! 2. Searches each move with a shared tree reused across moves
//! 3. Optionally ponders on the opponent's turn
//! 4. Logs per-game results and periodic aggregate statistics

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod actor;
mod config;
mod evaluator;
mod stats;

use crate::actor::Actor;
use crate::config::Config;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;

    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");

    info!(
        games = config.games,
        board_size = config.board_size,
        "Starting self-play"
    );

    let actor = Actor::new(config)?;
    actor.run()?;

    Ok(())
}
