//! The rules-engine interface the search is written against.
//!
//! The search never interprets moves itself: it asks the position for its
//! legal moves, plays them on private copies, and reads back terminal status,
//! the score and a hash identifying the position.

use crate::moves::{Color, Move};
use std::fmt;

/// A game position that the search can copy and advance.
///
/// Positions are cloned once per simulation, so `Clone` should be cheap
/// relative to an evaluator call. Scores follow the Go convention: positive
/// means Black is ahead, and the value already includes komi.
///
/// # Example
///
/// ```rust,ignore
/// let mut pos = state.clone();
/// for mv in pos.legal_moves() {
///     if pos.is_legal(mv) {
///         pos.play(mv)?;
///         break;
///     }
/// }
/// ```
pub trait GameState: Clone + Send + Sync + fmt::Debug + 'static {
    /// Player whose turn it is.
    fn to_move(&self) -> Color;

    /// Override the side to move (e.g. a caller asking for a move out of turn).
    fn set_to_move(&mut self, color: Color);

    /// Every legal move for the side to move, pass included.
    ///
    /// Resign is never listed. A terminal position has no legal moves.
    fn legal_moves(&self) -> Vec<Move>;

    /// Whether `mv` may be played now (covers superko and similar history rules).
    fn is_legal(&self, mv: Move) -> bool;

    /// Play `mv` for the side to move.
    fn play(&mut self, mv: Move) -> Result<(), GameError>;

    /// Number of consecutive passes ending the move sequence.
    fn consecutive_passes(&self) -> u32;

    /// True after two consecutive passes or a resignation.
    fn is_terminal(&self) -> bool;

    /// Final-style score from Black's point of view, komi included.
    fn score(&self) -> f32;

    /// Hash identifying the position, including the side to move.
    fn position_hash(&self) -> u64;

    /// Moves played so far.
    fn move_number(&self) -> usize;

    fn last_move(&self) -> Option<Move>;

    /// Number of board cells; drives game-phase estimates.
    fn board_cells(&self) -> usize;

    /// Human-readable move text (e.g. "D4").
    fn move_to_text(&self, mv: Move) -> String;

    /// Copy of the position suitable for a later [`GameState::restore`].
    fn snapshot(&self) -> Self {
        self.clone()
    }

    fn restore(&mut self, snapshot: &Self) {
        self.clone_from(snapshot);
    }

    /// Score from `color`'s point of view.
    fn score_for(&self, color: Color) -> f32 {
        match color {
            Color::Black => self.score(),
            Color::White => -self.score(),
        }
    }
}

/// Outcome in [0, 1] implied by a score margin: win 1, loss 0, jigo 0.5.
#[inline]
pub fn winner_value(score: f32) -> f32 {
    if score > 0.0 {
        1.0
    } else if score < 0.0 {
        0.0
    } else {
        0.5
    }
}

/// Errors raised by rules engines.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Illegal move {mv} for {color}")]
    IllegalMove { mv: Move, color: Color },
    #[error("Game is already over")]
    GameOver,
    #[error("Vertex {0} is off the board")]
    OffBoard(u16),
}
