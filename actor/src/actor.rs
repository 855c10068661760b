//! Self-play loop driving the search engine.

use anyhow::Result;
use engine_core::{Color, GameState};
use games_go::GoState;
use mcts::{PassFlags, Search, SearchConfig, SearchState, TimeControl};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::evaluator::TerritoryEvaluator;
use crate::stats::{ActorStats, GameRecord, GameResult};

/// Poll interval of the ponder timer.
const TIMER_TICK: Duration = Duration::from_millis(1);

type GoSearch = Search<GoState, TerritoryEvaluator>;

pub struct Actor {
    config: Config,
    search_config: SearchConfig,
    time_control: TimeControl,
    stats: ActorStats,
}

impl Actor {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let search_config = config.search_config()?;
        Ok(Self::with_search_config(config, search_config))
    }

    pub fn with_search_config(config: Config, search_config: SearchConfig) -> Self {
        let time_control = config.time_control();
        info!(
            board_size = config.board_size,
            komi = config.komi,
            threads = search_config.num_threads,
            playouts = config.playouts,
            time_control = %time_control,
            "Actor initialized"
        );
        Self {
            config,
            search_config,
            time_control,
            stats: ActorStats::new(),
        }
    }

    pub fn stats(&self) -> &ActorStats {
        &self.stats
    }

    /// Play the configured number of games.
    pub fn run(&self) -> Result<()> {
        for game in 0..self.config.games {
            let record = self.play_game(game)?;
            info!(
                game = game + 1,
                moves = record.moves,
                result = %record.result,
                playouts = record.playouts,
                elapsed_ms = record.elapsed.as_millis() as u64,
                "Game finished"
            );
            self.stats.record_game(&record);

            let completed = game + 1;
            if self.config.log_interval > 0 && completed % self.config.log_interval == 0 {
                self.log_progress();
            }
        }

        let snapshot = self.stats.snapshot();
        info!(
            games = snapshot.games_completed,
            black_wins = snapshot.black_wins,
            white_wins = snapshot.white_wins,
            undecided = snapshot.undecided,
            runtime_s = format!("{:.1}", snapshot.runtime_seconds),
            "Self-play complete"
        );
        Ok(())
    }

    /// Play one game from the empty board.
    pub fn play_game(&self, game: u32) -> Result<GameRecord> {
        let mut search_config = self.search_config.clone();
        if let Some(seed) = search_config.seed {
            search_config.seed = Some(seed.wrapping_add(game as u64));
        }

        let position = GoState::new(self.config.board_size, self.config.komi as f32);
        let mut search = Search::new(search_config, self.config.evaluator(), position)?;
        search.set_time_control(self.time_control.clone());

        let started = Instant::now();
        let cap = self.config.move_cap();
        let ponder_time = self.config.ponder_time();
        let mut playouts = 0u64;

        let result = loop {
            let position = search.position();
            if position.is_terminal() {
                break final_result(position);
            }
            if position.move_number() >= cap {
                break GameResult::MoveCap;
            }

            let color = position.to_move();
            let mv = search.think(color, PassFlags::NORMAL);
            playouts += search.playouts() as u64;
            debug!(
                game,
                move_number = search.position().move_number() + 1,
                mv = %search.position().move_to_text(mv),
                "{}",
                search.explain_last_decision()
            );
            search.play_move(mv)?;

            if let Some(duration) = ponder_time {
                ponder_for(&mut search, duration);
            }
        };

        Ok(GameRecord {
            moves: search.position().move_number(),
            result,
            playouts,
            elapsed: started.elapsed(),
        })
    }

    fn log_progress(&self) {
        let snapshot = self.stats.snapshot();
        info!(
            games = snapshot.games_completed,
            avg_length = format!("{:.1}", snapshot.avg_game_length),
            black_wins = snapshot.black_wins,
            white_wins = snapshot.white_wins,
            resignations = snapshot.resignations,
            pps = format!("{:.0}", snapshot.playouts_per_second),
            "Progress"
        );
    }
}

/// Ponder on the opponent's turn until `duration` elapses or a playout
/// limit ends the session.
fn ponder_for(search: &mut GoSearch, duration: Duration) {
    let handle = search.handle();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            let deadline = Instant::now() + duration;
            while !done.load(Ordering::Acquire) {
                // Stop only a running ponder session; a stop issued earlier
                // would be cleared when the session starts.
                if Instant::now() >= deadline && handle.state() == SearchState::Pondering {
                    handle.stop();
                    break;
                }
                thread::sleep(TIMER_TICK);
            }
        });

        search.ponder();
        done.store(true, Ordering::Release);
    });
}

fn final_result(position: &GoState) -> GameResult {
    if let Some(loser) = position.resigned() {
        return GameResult::Resignation(loser);
    }
    let margin = position.score();
    let winner = if margin > 0.0 {
        Some(Color::Black)
    } else if margin < 0.0 {
        Some(Color::White)
    } else {
        None
    };
    GameResult::Score { winner, margin }
}
