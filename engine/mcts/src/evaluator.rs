//! Evaluator trait for position evaluation.
//!
//! The evaluator provides a policy (move priors) and value estimates for a
//! position. In production this is a neural network; for testing we provide
//! a uniform evaluator that returns equal priors and a neutral value.

use engine_core::{GameState, Move};
use std::collections::HashMap;
use thiserror::Error;

/// Blending scale used for positions scored by the rules engine.
pub const TERMINAL_BETA: f32 = 10.0;

/// Blending scale reported by [`UniformEvaluator`] and the failure fallback.
pub const DEFAULT_BETA: f32 = 1.0;

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Malformed output: {0}")]
    Malformed(String),
}

/// Result of evaluating a position, from the side to move's perspective.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Prior for each move. Moves missing from the list get no prior;
    /// entries for illegal moves are ignored.
    pub policy: Vec<(Move, f32)>,

    /// Win probability in [0, 1].
    pub winrate: f32,

    /// Expected final margin in points.
    pub score: f32,

    /// Scale applied to the score margin when blending it into a winrate.
    pub beta: f32,
}

impl Evaluation {
    /// Uniform priors over the legal moves with a neutral value.
    pub fn uniform<G: GameState>(position: &G) -> Self {
        let legal = position.legal_moves();
        let p = if legal.is_empty() {
            0.0
        } else {
            1.0 / legal.len() as f32
        };
        Self {
            policy: legal.into_iter().map(|mv| (mv, p)).collect(),
            winrate: 0.5,
            score: 0.0,
            beta: DEFAULT_BETA,
        }
    }

    /// Reject output the search cannot use.
    pub fn validate(&self) -> Result<(), EvaluatorError> {
        if !self.winrate.is_finite() || !(0.0..=1.0).contains(&self.winrate) {
            return Err(EvaluatorError::Malformed(format!(
                "winrate {} outside [0, 1]",
                self.winrate
            )));
        }
        if !self.score.is_finite() {
            return Err(EvaluatorError::Malformed("non-finite score".into()));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(EvaluatorError::Malformed(format!("bad beta {}", self.beta)));
        }
        if let Some((mv, p)) = self
            .policy
            .iter()
            .find(|(_, p)| !p.is_finite() || *p < 0.0)
        {
            return Err(EvaluatorError::Malformed(format!(
                "prior {} for {}",
                p, mv
            )));
        }
        Ok(())
    }

    /// Priors restricted to `legal` and renormalized, highest first.
    ///
    /// Falls back to uniform when the legal moves carry no probability mass.
    /// Ties keep the order of `legal`.
    pub fn legal_priors(&self, legal: &[Move]) -> Vec<(Move, f32)> {
        let given: HashMap<Move, f32> = self.policy.iter().copied().collect();
        let mut priors: Vec<(Move, f32)> = legal
            .iter()
            .map(|&mv| (mv, given.get(&mv).copied().unwrap_or(0.0)))
            .collect();

        // Summed in f64: large raw priors would overflow an f32 sum
        let sum: f64 = priors.iter().map(|(_, p)| f64::from(*p)).sum();
        if sum > f64::from(f32::MIN_POSITIVE) && sum.is_finite() {
            for (_, p) in priors.iter_mut() {
                *p = (f64::from(*p) / sum) as f32;
            }
        } else if !priors.is_empty() {
            let p = 1.0 / priors.len() as f32;
            for (_, prior) in priors.iter_mut() {
                *prior = p;
            }
        }
        priors.sort_by(|a, b| b.1.total_cmp(&a.1));
        priors
    }
}

/// Trait for position evaluators.
///
/// Implementations could be:
/// - UniformEvaluator: uniform policy (for testing)
/// - a neural network wrapper (policy, winrate and score heads)
/// - a heuristic evaluator (see the actor)
pub trait Evaluator<G: GameState>: Send + Sync {
    /// Evaluate a single position.
    fn evaluate(&self, position: &G) -> Result<Evaluation, EvaluatorError>;

    /// Resident size of the evaluator, subtracted from the memory budget.
    fn estimated_bytes(&self) -> usize {
        0
    }
}

/// Uniform evaluator that assigns equal probability to all legal moves.
/// Winrate is always 0.5 and score 0 (neutral).
#[derive(Debug, Clone, Default)]
pub struct UniformEvaluator;

impl UniformEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl<G: GameState> Evaluator<G> for UniformEvaluator {
    fn evaluate(&self, position: &G) -> Result<Evaluation, EvaluatorError> {
        Ok(Evaluation::uniform(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use games_go::GoState;

    #[test]
    fn test_uniform_evaluator() {
        let eval = UniformEvaluator::new();
        let state = GoState::new(3, 0.5);
        let result = eval.evaluate(&state).unwrap();

        // 9 points plus pass
        assert_eq!(result.policy.len(), 10);
        let expected_prob = 1.0 / 10.0;
        for (_, p) in &result.policy {
            assert!((p - expected_prob).abs() < 1e-6);
        }
        assert!((result.winrate - 0.5).abs() < 1e-6);
        assert!(result.score.abs() < 1e-6);
    }

    #[test]
    fn test_uniform_evaluator_terminal_position() {
        let eval = UniformEvaluator::new();
        let mut state = GoState::new(3, 0.5);
        state.play(Move::Pass).unwrap();
        state.play(Move::Pass).unwrap();

        let result = eval.evaluate(&state).unwrap();
        assert!(result.policy.is_empty());
    }

    #[test]
    fn test_legal_priors_normalized_and_sorted() {
        let eval = Evaluation {
            policy: vec![
                (Move::Play(0), 0.1),
                (Move::Play(1), 0.3),
                (Move::Play(2), 0.4), // not legal below
                (Move::Pass, 0.2),
            ],
            winrate: 0.6,
            score: 1.0,
            beta: 1.0,
        };
        let legal = [Move::Play(0), Move::Play(1), Move::Pass];
        let priors = eval.legal_priors(&legal);

        assert_eq!(priors[0].0, Move::Play(1));
        assert_eq!(priors[1].0, Move::Pass);
        assert_eq!(priors[2].0, Move::Play(0));
        let sum: f32 = priors.iter().map(|(_, p)| p).sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!((priors[0].1 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_legal_priors_without_mass_falls_back_to_uniform() {
        let eval = Evaluation {
            policy: vec![(Move::Play(7), 1.0)],
            winrate: 0.5,
            score: 0.0,
            beta: 1.0,
        };
        let priors = eval.legal_priors(&[Move::Play(0), Move::Pass]);
        assert_eq!(priors.len(), 2);
        assert!((priors[0].1 - 0.5).abs() < 1e-6);
        assert_eq!(priors[0].0, Move::Play(0));
    }

    #[test]
    fn test_legal_priors_large_values_do_not_overflow() {
        let eval = Evaluation {
            policy: vec![
                (Move::Play(0), f32::MAX),
                (Move::Play(1), f32::MAX),
                (Move::Pass, f32::MAX / 2.0),
            ],
            winrate: 0.5,
            score: 0.0,
            beta: 1.0,
        };
        let priors = eval.legal_priors(&[Move::Play(0), Move::Play(1), Move::Pass]);
        assert!(priors.iter().all(|(_, p)| p.is_finite()));
        assert!((priors[0].1 - 0.4).abs() < 1e-6);
        assert!((priors[1].1 - 0.4).abs() < 1e-6);
        assert!((priors[2].1 - 0.2).abs() < 1e-6);
        assert_eq!(priors[2].0, Move::Pass);
    }

    #[test]
    fn test_validate_rejects_malformed_output() {
        let good = Evaluation {
            policy: vec![(Move::Pass, 1.0)],
            winrate: 0.5,
            score: 0.0,
            beta: 1.0,
        };
        assert!(good.validate().is_ok());

        let mut bad = good.clone();
        bad.winrate = f32::NAN;
        assert!(bad.validate().is_err());

        let mut bad = good.clone();
        bad.policy = vec![(Move::Pass, -0.1)];
        assert!(matches!(bad.validate(), Err(EvaluatorError::Malformed(_))));

        let mut bad = good;
        bad.score = f32::INFINITY;
        assert!(bad.validate().is_err());
    }
}
