//! Self-play statistics tracking.
//!
//! Tracks game counts, outcomes, lengths and search throughput so the actor
//! can log a summary every few games.

use engine_core::Color;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameResult {
    /// Winner and area margin (komi included).
    Score { winner: Option<Color>, margin: f32 },
    /// The given color resigned.
    Resignation(Color),
    /// Stopped at the move cap.
    MoveCap,
}

impl GameResult {
    pub fn winner(&self) -> Option<Color> {
        match *self {
            GameResult::Score { winner, .. } => winner,
            GameResult::Resignation(loser) => Some(loser.opponent()),
            GameResult::MoveCap => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            GameResult::Score {
                winner: Some(color),
                margin,
            } => write!(f, "{}+{:.1}", color.letter(), margin.abs()),
            GameResult::Score { winner: None, .. } => write!(f, "0"),
            GameResult::Resignation(loser) => write!(f, "{}+R", loser.opponent().letter()),
            GameResult::MoveCap => write!(f, "capped"),
        }
    }
}

/// One finished game.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub moves: usize,
    pub result: GameResult,
    pub playouts: u64,
    pub elapsed: Duration,
}

/// Aggregated actor statistics, designed for lock-free updates.
#[derive(Debug)]
pub struct ActorStats {
    games_completed: AtomicU32,
    total_moves: AtomicU64,
    black_wins: AtomicU32,
    white_wins: AtomicU32,
    /// Jigo or move cap
    undecided: AtomicU32,
    resignations: AtomicU32,
    total_playouts: AtomicU64,
    /// Time spent inside games (microseconds)
    game_time_us: AtomicU64,
    start_time: Instant,
}

/// Point-in-time view of [`ActorStats`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActorStatsSnapshot {
    pub games_completed: u32,
    pub total_moves: u64,
    pub black_wins: u32,
    pub white_wins: u32,
    pub undecided: u32,
    pub resignations: u32,
    pub avg_game_length: f64,
    pub playouts_per_second: f64,
    pub games_per_second: f64,
    pub runtime_seconds: f64,
}

impl Default for ActorStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorStats {
    pub fn new() -> Self {
        Self {
            games_completed: AtomicU32::new(0),
            total_moves: AtomicU64::new(0),
            black_wins: AtomicU32::new(0),
            white_wins: AtomicU32::new(0),
            undecided: AtomicU32::new(0),
            resignations: AtomicU32::new(0),
            total_playouts: AtomicU64::new(0),
            game_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed game.
    pub fn record_game(&self, record: &GameRecord) {
        self.games_completed.fetch_add(1, Ordering::Relaxed);
        self.total_moves
            .fetch_add(record.moves as u64, Ordering::Relaxed);
        self.total_playouts
            .fetch_add(record.playouts, Ordering::Relaxed);
        self.game_time_us
            .fetch_add(record.elapsed.as_micros() as u64, Ordering::Relaxed);

        match record.result.winner() {
            Some(Color::Black) => self.black_wins.fetch_add(1, Ordering::Relaxed),
            Some(Color::White) => self.white_wins.fetch_add(1, Ordering::Relaxed),
            None => self.undecided.fetch_add(1, Ordering::Relaxed),
        };
        if matches!(record.result, GameResult::Resignation(_)) {
            self.resignations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ActorStatsSnapshot {
        let games = self.games_completed.load(Ordering::Relaxed);
        let moves = self.total_moves.load(Ordering::Relaxed);
        let playouts = self.total_playouts.load(Ordering::Relaxed);
        let game_secs = self.game_time_us.load(Ordering::Relaxed) as f64 / 1e6;
        let runtime = self.start_time.elapsed().as_secs_f64();

        let avg_game_length = if games > 0 {
            moves as f64 / games as f64
        } else {
            0.0
        };
        let playouts_per_second = if game_secs > 0.0 {
            playouts as f64 / game_secs
        } else {
            0.0
        };
        let games_per_second = if runtime > 0.0 {
            games as f64 / runtime
        } else {
            0.0
        };

        ActorStatsSnapshot {
            games_completed: games,
            total_moves: moves,
            black_wins: self.black_wins.load(Ordering::Relaxed),
            white_wins: self.white_wins.load(Ordering::Relaxed),
            undecided: self.undecided.load(Ordering::Relaxed),
            resignations: self.resignations.load(Ordering::Relaxed),
            avg_game_length,
            playouts_per_second,
            games_per_second,
            runtime_seconds: runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(moves: usize, result: GameResult) -> GameRecord {
        GameRecord {
            moves,
            result,
            playouts: 1_000,
            elapsed: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_record_game() {
        let stats = ActorStats::new();
        stats.record_game(&record(
            60,
            GameResult::Score {
                winner: Some(Color::Black),
                margin: 3.5,
            },
        ));
        stats.record_game(&record(40, GameResult::Resignation(Color::Black)));
        stats.record_game(&record(243, GameResult::MoveCap));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.games_completed, 3);
        assert_eq!(snapshot.black_wins, 1);
        assert_eq!(snapshot.white_wins, 1);
        assert_eq!(snapshot.undecided, 1);
        assert_eq!(snapshot.resignations, 1);
        assert_eq!(snapshot.total_moves, 343);
    }

    #[test]
    fn test_average_with_zero_games() {
        let snapshot = ActorStats::new().snapshot();
        assert_eq!(snapshot.games_completed, 0);
        assert_eq!(snapshot.avg_game_length, 0.0);
        assert_eq!(snapshot.playouts_per_second, 0.0);
        assert!(!snapshot.avg_game_length.is_nan());
    }

    #[test]
    fn test_playout_rate_uses_game_time() {
        let stats = ActorStats::new();
        stats.record_game(&record(10, GameResult::MoveCap));
        stats.record_game(&record(20, GameResult::MoveCap));

        let snapshot = stats.snapshot();
        // 2000 playouts over 1 s of game time
        assert!((snapshot.playouts_per_second - 2000.0).abs() < 0.1);
        assert!((snapshot.avg_game_length - 15.0).abs() < 0.01);
    }

    #[test]
    fn test_result_display() {
        let win = GameResult::Score {
            winner: Some(Color::White),
            margin: -2.5,
        };
        assert_eq!(win.to_string(), "W+2.5");
        assert_eq!(GameResult::Resignation(Color::White).to_string(), "B+R");
        assert_eq!(
            GameResult::Score {
                winner: None,
                margin: 0.0
            }
            .to_string(),
            "0"
        );
        assert_eq!(GameResult::MoveCap.to_string(), "capped");
    }

    #[test]
    fn test_resignation_winner_is_opponent() {
        assert_eq!(
            GameResult::Resignation(Color::Black).winner(),
            Some(Color::White)
        );
        assert_eq!(GameResult::MoveCap.winner(), None);
    }
}
