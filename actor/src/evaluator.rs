//! Heuristic evaluator for self-play without a trained network.

use engine_core::{GameState, Move};
use games_go::GoState;
use mcts::{Evaluation, Evaluator, EvaluatorError};

/// Default reported resident size; the heuristic keeps no tables.
const FOOTPRINT_BYTES: usize = 64 << 10;

/// Prior weight of a move with no stones nearby.
const BASE_WEIGHT: f32 = 1.0;

/// Extra weight per stone within Manhattan distance 2.
const NEIGHBOR_WEIGHT: f32 = 0.5;

/// Multiplier for filling a point surrounded by friendly stones.
const EYE_FILL_FACTOR: f32 = 0.05;

const PASS_WEIGHT: f32 = 0.1;

/// Points of area margin per logistic unit of winrate.
const SCORE_SCALE: f32 = 4.0;

/// Scores positions by current area and prefers moves near existing stones.
///
/// The winrate is a logistic function of the area score for the side to
/// move, so it sharpens as the board fills in.
#[derive(Debug, Clone)]
pub struct TerritoryEvaluator {
    footprint: usize,
}

impl Default for TerritoryEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TerritoryEvaluator {
    pub fn new() -> Self {
        Self::with_footprint(FOOTPRINT_BYTES)
    }

    /// Report `bytes` as the resident size, e.g. to reserve room for a
    /// network that shares the process.
    pub fn with_footprint(bytes: usize) -> Self {
        Self { footprint: bytes }
    }

    pub fn footprint(&self) -> usize {
        self.footprint
    }

    fn move_weight(&self, position: &GoState, mv: Move) -> f32 {
        let vertex = match mv {
            Move::Play(v) => v as usize,
            Move::Pass => return PASS_WEIGHT,
            Move::Resign => return 0.0,
        };
        let size = position.size() as isize;
        let (col, row) = ((vertex as isize) % size, (vertex as isize) / size);
        let me = position.to_move();

        let mut nearby = 0u32;
        for dr in -2..=2isize {
            for dc in -2..=2isize {
                let dist = dr.abs() + dc.abs();
                if dist == 0 || dist > 2 {
                    continue;
                }
                let (c, r) = (col + dc, row + dr);
                if c < 0 || r < 0 || c >= size || r >= size {
                    continue;
                }
                if position.stone_at((r * size + c) as usize).is_some() {
                    nearby += 1;
                }
            }
        }

        let own_eye = [(0, 1), (0, -1), (1, 0), (-1, 0)]
            .iter()
            .map(|(dc, dr)| (col + dc, row + dr))
            .filter(|&(c, r)| c >= 0 && r >= 0 && c < size && r < size)
            .all(|(c, r)| position.stone_at((r * size + c) as usize) == Some(me));

        let weight = BASE_WEIGHT + NEIGHBOR_WEIGHT * nearby as f32;
        if own_eye {
            weight * EYE_FILL_FACTOR
        } else {
            weight
        }
    }
}

impl Evaluator<GoState> for TerritoryEvaluator {
    fn evaluate(&self, position: &GoState) -> Result<Evaluation, EvaluatorError> {
        let legal = position.legal_moves();
        if legal.is_empty() {
            return Err(EvaluatorError::InvalidState("no legal moves".into()));
        }

        let weights: Vec<(Move, f32)> = legal
            .into_iter()
            .map(|mv| (mv, self.move_weight(position, mv)))
            .collect();
        let total: f32 = weights.iter().map(|(_, w)| w).sum();
        let policy = weights.into_iter().map(|(mv, w)| (mv, w / total)).collect();

        let score = position.score_for(position.to_move());
        Ok(Evaluation {
            policy,
            winrate: sigmoid(score / SCORE_SCALE),
            score,
            beta: 1.0 / SCORE_SCALE,
        })
    }

    fn estimated_bytes(&self) -> usize {
        self.footprint
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
