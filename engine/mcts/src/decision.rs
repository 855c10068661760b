//! Root move reduction: restrictions, confidence-bound pruning, tie-breaks
//! and the pass/resign flags.
//!
//! These are pure functions over [`Candidate`] rows so the policy can be
//! exercised without running a search.

use engine_core::{Color, Move};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use std::ops::BitOr;

/// Caller flags for a single decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassFlags {
    /// Avoid passing unless pass is the only acceptable move.
    pub no_pass: bool,
    /// Never resign.
    pub no_resign: bool,
}

impl PassFlags {
    pub const NORMAL: PassFlags = PassFlags {
        no_pass: false,
        no_resign: false,
    };
    pub const NO_PASS: PassFlags = PassFlags {
        no_pass: true,
        no_resign: false,
    };
    pub const NO_RESIGN: PassFlags = PassFlags {
        no_pass: false,
        no_resign: true,
    };
}

impl BitOr for PassFlags {
    type Output = PassFlags;

    fn bitor(self, rhs: PassFlags) -> PassFlags {
        PassFlags {
            no_pass: self.no_pass || rhs.no_pass,
            no_resign: self.no_resign || rhs.no_resign,
        }
    }
}

/// One restricted move: applies to `color` while the position's move number
/// is at most `until_move`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restriction {
    pub color: Color,
    pub mv: Move,
    pub until_move: usize,
}

impl Restriction {
    fn applies(&self, color: Color, move_number: usize) -> bool {
        self.color == color && move_number <= self.until_move
    }
}

/// Caller-supplied limits on which root moves may be chosen.
///
/// The avoid list removes moves outright, pass included. An allow list in
/// force for the side to move removes every other placement but never
/// removes pass; resignation is never restricted. Each entry is tied to a
/// color and expires after its `until_move`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveRestrictions {
    pub allow: Vec<Restriction>,
    pub avoid: Vec<Restriction>,
}

impl MoveRestrictions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn allow(color: Color, moves: impl IntoIterator<Item = Move>, until_move: usize) -> Self {
        Self::none().and_allow(color, moves, until_move)
    }

    pub fn avoid(color: Color, moves: impl IntoIterator<Item = Move>, until_move: usize) -> Self {
        Self::none().and_avoid(color, moves, until_move)
    }

    /// Builder pattern: add allowed moves for `color`.
    pub fn and_allow(
        mut self,
        color: Color,
        moves: impl IntoIterator<Item = Move>,
        until_move: usize,
    ) -> Self {
        self.allow
            .extend(moves.into_iter().map(|mv| Restriction { color, mv, until_move }));
        self
    }

    /// Builder pattern: add avoided moves for `color`.
    pub fn and_avoid(
        mut self,
        color: Color,
        moves: impl IntoIterator<Item = Move>,
        until_move: usize,
    ) -> Self {
        self.avoid
            .extend(moves.into_iter().map(|mv| Restriction { color, mv, until_move }));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.avoid.is_empty()
    }

    /// Whether `color` may play `mv` at `move_number`.
    pub fn permits(&self, color: Color, mv: Move, move_number: usize) -> bool {
        if mv == Move::Resign {
            return true;
        }
        if self
            .avoid
            .iter()
            .any(|r| r.mv == mv && r.applies(color, move_number))
        {
            return false;
        }
        if mv == Move::Pass {
            return true;
        }
        let mut in_force = self
            .allow
            .iter()
            .filter(|r| r.applies(color, move_number))
            .peekable();
        in_force.peek().is_none() || in_force.any(|r| r.mv == mv)
    }
}

/// Statistics of one root child, from the side to move's perspective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub mv: Move,
    pub visits: u32,
    pub prior: f32,
    /// Blended value of the backed-up results.
    pub value: f32,
    /// Mean backed-up score margin.
    pub score: f32,
    pub lcb: f32,
    pub ucb: f32,
}

/// Discard candidates whose upper bound falls below the leader's lower bound.
///
/// Only candidates with at least `min_visit_ratio` of the most-visited
/// candidate's visits (and at least 2) take part; the leader is the eligible
/// candidate with the highest lower bound.
pub fn prune_by_confidence(candidates: &mut Vec<Candidate>, min_visit_ratio: f32) {
    let max_visits = candidates.iter().map(|c| c.visits).max().unwrap_or(0);
    let min_visits = (min_visit_ratio * max_visits as f32).max(2.0);
    let eligible = |c: &Candidate| c.visits as f32 >= min_visits;

    let Some(leader_lcb) = candidates
        .iter()
        .filter(|c| eligible(c))
        .map(|c| c.lcb)
        .max_by(f32::total_cmp)
    else {
        return;
    };
    candidates.retain(|c| !eligible(c) || c.ucb >= leader_lcb);
}

/// Order best first: more visits, then higher value. The sort is stable, so
/// full ties keep the incoming (stored) order.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.visits
            .cmp(&a.visits)
            .then_with(|| b.value.total_cmp(&a.value))
    });
}

/// First candidate that is not a pass.
pub fn best_non_pass(candidates: &[Candidate]) -> Option<Candidate> {
    candidates.iter().copied().find(|c| c.mv != Move::Pass)
}

/// Pick a candidate with probability proportional to its visits, among those
/// with more than `min_visits`.
pub fn sample_by_visits(
    candidates: &[Candidate],
    min_visits: u32,
    rng: &mut ChaCha20Rng,
) -> Option<Candidate> {
    let eligible: Vec<&Candidate> = candidates.iter().filter(|c| c.visits > min_visits).collect();
    let total: f64 = eligible.iter().map(|c| f64::from(c.visits)).sum();
    if total <= 0.0 {
        return None;
    }
    let r: f64 = rng.gen::<f64>() * total;
    let mut cumsum = 0.0;
    for c in &eligible {
        cumsum += f64::from(c.visits);
        if r < cumsum {
            return Some(**c);
        }
    }
    // Floating point edge: fall back to the last eligible candidate
    eligible.last().map(|c| **c)
}
