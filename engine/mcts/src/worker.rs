//! One simulation: select, expand, evaluate, back up.
//!
//! Workers share the tree, the cache and the evaluator by reference and keep
//! only a private copy of the root position. Virtual loss marks the path
//! while a simulation is in flight so concurrent workers spread out.

use std::sync::Arc;

use engine_core::{winner_value, GameState};
use tracing::{debug, trace, warn};

use crate::cache::EvalCache;
use crate::config::SearchConfig;
use crate::evaluator::{Evaluation, Evaluator, EvaluatorError, TERMINAL_BETA};
use crate::node::{NodeId, NodeState};
use crate::tree::MctsTree;

/// A backed-up result: outcome in [0, 1] and score margin, from the
/// perspective of the player who moved into the leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Backup {
    pub outcome: f32,
    pub score: f32,
}

impl Backup {
    fn flip(self) -> Self {
        Self {
            outcome: 1.0 - self.outcome,
            score: -self.score,
        }
    }
}

/// Borrowed view of everything a simulation touches.
pub(crate) struct Worker<'a, G: GameState, E: Evaluator<G>> {
    pub tree: &'a MctsTree,
    pub config: &'a SearchConfig,
    pub evaluator: &'a E,
    pub cache: Option<&'a EvalCache>,
    pub root_state: &'a G,
}

impl<'a, G: GameState, E: Evaluator<G>> Worker<'a, G, E> {
    /// Run one simulation from the root. Returns true if a result was backed
    /// up (a completed playout).
    pub fn simulate(&self) -> bool {
        let tree = self.tree;
        let vl = self.config.virtual_loss;
        let mut position = self.root_state.clone();
        let mut current = tree.root();
        let mut path = vec![current];
        tree.get(current).add_virtual_loss(vl);

        let result = loop {
            let node = tree.get(current);

            if node.state() == NodeState::Terminal || position.is_terminal() {
                break Some(self.score_terminal(current, &position));
            }

            match node.state() {
                NodeState::Unexpanded => {
                    if !node.try_claim_expansion() {
                        break None;
                    }
                    break Some(self.expand(current, &position));
                }
                NodeState::Leaf => {
                    if current != tree.root()
                        && node.expandable(self.min_prior())
                        && node.try_claim_from(NodeState::Leaf)
                    {
                        break Some(self.expand(current, &position));
                    }
                    break Some(Backup {
                        outcome: node.net_outcome(),
                        score: node.net_score(),
                    });
                }
                NodeState::Expanded => {
                    // Root children carry per-session flags; the root is
                    // expanded and widened between sessions instead.
                    if current != tree.root()
                        && node.expandable(self.min_prior())
                        && node.try_claim_from(NodeState::Expanded)
                    {
                        self.widen(current, &position);
                    }
                    let Some(child) = tree.select_child(current, self.config, current == tree.root())
                    else {
                        break None;
                    };
                    let mv = tree.get(child).mv();
                    if !position.is_legal(mv) || position.play(mv).is_err() {
                        trace!(node = child.0, mv = %mv, "invalidating illegal child");
                        tree.get(child).invalidate();
                        break None;
                    }
                    tree.get(child).add_virtual_loss(vl);
                    path.push(child);
                    current = child;
                }
                NodeState::Expanding | NodeState::Invalid | NodeState::Terminal => break None,
            }
        };

        self.backup(&path, result);
        result.is_some()
    }

    /// Prior a move needs to get a child node right now: the configured floor
    /// or the memory pressure floor, whichever is higher.
    pub fn min_prior(&self) -> f32 {
        self.config
            .min_adoption_prior
            .max(self.tree.accountant().pressure_prior())
    }

    /// Claim-holder expansion of `id`. The evaluation is backed up even when
    /// the memory ceiling refuses the children; the node is then a leaf.
    pub fn expand(&self, id: NodeId, position: &G) -> Backup {
        let tree = self.tree;
        let evaluation = self.evaluate(position);
        let backup = Backup {
            outcome: 1.0 - evaluation.winrate,
            score: -evaluation.score,
        };
        let node = tree.get(id);
        node.set_net_eval(backup.outcome, backup.score, evaluation.beta);

        let priors = evaluation.legal_priors(&position.legal_moves());
        if tree.create_children(id, &priors, self.min_prior()).is_err() {
            debug!(
                node = id.0,
                used = tree.accountant().used(),
                limit = tree.accountant().limit(),
                "expansion refused, scoring as leaf"
            );
        }
        backup
    }

    /// Claim-holder widening of an expanded `id` under the current, lower
    /// prior threshold. Statistics are left alone.
    pub fn widen(&self, id: NodeId, position: &G) {
        let evaluation = self.evaluate(position);
        let priors = evaluation.legal_priors(&position.legal_moves());
        match self.tree.widen_children(id, &priors, self.min_prior()) {
            Ok(added) => trace!(node = id.0, added, "widened"),
            Err(_) => debug!(node = id.0, "widening refused"),
        }
    }

    /// Cached evaluation of `position`, or the uniform fallback if the
    /// evaluator fails. Fallbacks are not cached.
    fn evaluate(&self, position: &G) -> Arc<Evaluation> {
        let hash = position.position_hash();
        if let Some(cached) = self.cache.and_then(|cache| cache.lookup(hash)) {
            return cached;
        }

        let checked = self.evaluator.evaluate(position).and_then(|evaluation| {
            evaluation.validate()?;
            if evaluation.policy.is_empty() && !position.is_terminal() {
                return Err(EvaluatorError::Malformed(
                    "empty policy for a live position".into(),
                ));
            }
            Ok(evaluation)
        });

        match checked {
            Ok(evaluation) => {
                let evaluation = Arc::new(evaluation);
                if let Some(cache) = self.cache {
                    cache.insert(hash, Arc::clone(&evaluation));
                }
                evaluation
            }
            Err(e) => {
                warn!(error = %e, hash, "evaluator failed, using uniform priors");
                Arc::new(Evaluation::uniform(position))
            }
        }
    }

    /// Result of a finished game, from the rules alone.
    fn score_terminal(&self, id: NodeId, position: &G) -> Backup {
        let mover = position.to_move().opponent();
        let score = position.score_for(mover);
        let backup = Backup {
            outcome: winner_value(score),
            score,
        };
        let node = self.tree.get(id);
        if node.state() != NodeState::Terminal {
            node.set_net_eval(backup.outcome, backup.score, TERMINAL_BETA);
            node.mark_terminal();
        }
        backup
    }

    fn backup(&self, path: &[NodeId], result: Option<Backup>) {
        let vl = self.config.virtual_loss;
        let mut result = result;
        for &id in path.iter().rev() {
            let node = self.tree.get(id);
            if let Some(r) = result {
                node.update(r.outcome, r.score);
                result = Some(r.flip());
            }
            node.undo_virtual_loss(vl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAccountant;
    use engine_core::Move;
    use games_go::GoState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEvaluator {
        calls: AtomicUsize,
        winrate: f32,
    }

    impl CountingEvaluator {
        fn new(winrate: f32) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                winrate,
            }
        }
    }

    impl Evaluator<GoState> for CountingEvaluator {
        fn evaluate(&self, position: &GoState) -> Result<Evaluation, EvaluatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Evaluation {
                winrate: self.winrate,
                ..Evaluation::uniform(position)
            })
        }
    }

    struct FailingEvaluator;

    impl Evaluator<GoState> for FailingEvaluator {
        fn evaluate(&self, _position: &GoState) -> Result<Evaluation, EvaluatorError> {
            Err(EvaluatorError::EvaluationFailed("backend offline".into()))
        }
    }

    fn small_tree() -> MctsTree {
        MctsTree::new(Arc::new(MemoryAccountant::new(16 << 20)))
    }

    #[test]
    fn test_first_simulation_expands_root() {
        let tree = small_tree();
        let config = SearchConfig::for_testing();
        let evaluator = CountingEvaluator::new(0.8);
        let position = GoState::new(3, 0.5);
        let worker = Worker {
            tree: &tree,
            config: &config,
            evaluator: &evaluator,
            cache: None,
            root_state: &position,
        };

        assert!(worker.simulate());
        let root = tree.get(tree.root());
        assert_eq!(root.state(), NodeState::Expanded);
        assert_eq!(root.child_count(), 10);
        assert_eq!(root.visits(), 1);
        assert_eq!(root.virtual_loss(), 0);
        // Side to move wins 80%: the root stores the mover's view
        assert!((root.outcome_mean() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_backup_flips_perspective() {
        let tree = small_tree();
        let config = SearchConfig::for_testing();
        let evaluator = CountingEvaluator::new(0.8);
        let position = GoState::new(3, 0.5);
        let worker = Worker {
            tree: &tree,
            config: &config,
            evaluator: &evaluator,
            cache: None,
            root_state: &position,
        };

        worker.simulate();
        assert!(worker.simulate());

        let child = tree
            .children(tree.root())
            .find(|&c| tree.get(c).visits() == 1)
            .unwrap();
        assert!((tree.get(child).outcome_mean() - 0.2).abs() < 1e-6);
        // Root: 0.2 from its own evaluation, 0.8 from the child's
        let root = tree.get(tree.root());
        assert_eq!(root.visits(), 2);
        assert!((root.outcome_mean() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_cache_avoids_reevaluation() {
        let tree = small_tree();
        let config = SearchConfig::for_testing();
        let evaluator = CountingEvaluator::new(0.5);
        let cache = EvalCache::new(64, 256);
        let position = GoState::new(3, 0.5);
        let worker = Worker {
            tree: &tree,
            config: &config,
            evaluator: &evaluator,
            cache: Some(&cache),
            root_state: &position,
        };
        worker.simulate();
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);

        let other = small_tree();
        let worker = Worker {
            tree: &other,
            ..worker
        };
        worker.simulate();
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_evaluator_failure_falls_back_to_uniform() {
        let tree = small_tree();
        let config = SearchConfig::for_testing();
        let cache = EvalCache::new(64, 256);
        let position = GoState::new(3, 0.5);
        let worker = Worker {
            tree: &tree,
            config: &config,
            evaluator: &FailingEvaluator,
            cache: Some(&cache),
            root_state: &position,
        };

        assert!(worker.simulate());
        let root = tree.get(tree.root());
        assert_eq!(root.child_count(), 10);
        assert!((root.outcome_mean() - 0.5).abs() < 1e-6);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_terminal_position_bypasses_evaluator() {
        let tree = small_tree();
        let config = SearchConfig::for_testing();
        let evaluator = CountingEvaluator::new(0.5);
        let mut position = GoState::new(3, 0.5);
        position.play(Move::Play(4)).unwrap();
        position.play(Move::Pass).unwrap();
        position.play(Move::Pass).unwrap();
        assert!(position.is_terminal());

        let worker = Worker {
            tree: &tree,
            config: &config,
            evaluator: &evaluator,
            cache: None,
            root_state: &position,
        };
        assert!(worker.simulate());
        assert!(worker.simulate());
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);

        let root = tree.get(tree.root());
        assert_eq!(root.state(), NodeState::Terminal);
        // Black passed last and owns the whole board
        assert!((root.outcome_mean() - 1.0).abs() < 1e-6);
        assert!((root.score_mean() - 8.5).abs() < 1e-6);
        assert!((root.beta() - TERMINAL_BETA).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_memory_still_backs_up() {
        let accountant = Arc::new(MemoryAccountant::new(crate::tree::NODE_BYTES * 4));
        let tree = MctsTree::new(accountant);
        let config = SearchConfig::for_testing();
        let evaluator = CountingEvaluator::new(0.7);
        let position = GoState::new(3, 0.5);
        let worker = Worker {
            tree: &tree,
            config: &config,
            evaluator: &evaluator,
            cache: None,
            root_state: &position,
        };

        assert!(worker.simulate());
        let root = tree.get(tree.root());
        assert_eq!(root.state(), NodeState::Leaf);
        assert_eq!(root.visits(), 1);
        assert_eq!(root.virtual_loss(), 0);
        assert!((root.outcome_mean() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_refused_leaf_is_not_reevaluated() {
        let accountant = Arc::new(MemoryAccountant::new(crate::tree::NODE_BYTES * 4));
        let tree = MctsTree::new(accountant);
        let config = SearchConfig::for_testing();
        let evaluator = CountingEvaluator::new(0.7);
        let position = GoState::new(3, 0.5);
        let worker = Worker {
            tree: &tree,
            config: &config,
            evaluator: &evaluator,
            cache: None,
            root_state: &position,
        };

        for _ in 0..5 {
            assert!(worker.simulate());
        }
        let root = tree.get(tree.root());
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(root.state(), NodeState::Leaf);
        assert_eq!(root.visits(), 5);
        assert!((root.outcome_mean() - 0.3).abs() < 1e-6);
        assert!((root.outcome_variance(1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_lower_threshold_widens_interior_node() {
        let tree = small_tree();
        let strict = SearchConfig::for_testing().with_min_adoption_prior(0.5);
        let evaluator = CountingEvaluator::new(0.5);
        let position = GoState::new(3, 0.5);
        let worker = Worker {
            tree: &tree,
            config: &strict,
            evaluator: &evaluator,
            cache: None,
            root_state: &position,
        };

        // Uniform priors of 0.1 all miss the floor: one child per expansion
        worker.simulate();
        worker.simulate();
        let root = tree.get(tree.root());
        assert_eq!(root.child_count(), 1);
        let child = tree.children(tree.root()).next().unwrap();
        assert_eq!(tree.get(child).child_count(), 1);
        assert_eq!(tree.get(child).visits(), 1);

        let relaxed = SearchConfig::for_testing();
        let worker = Worker {
            config: &relaxed,
            ..worker
        };
        assert!(worker.simulate());

        // The root is left for the session driver; the child gains the
        // skipped replies: 8 empty points and pass
        assert_eq!(root.child_count(), 1);
        let node = tree.get(child);
        assert_eq!(node.child_count(), 9);
        assert!(!node.expandable(worker.min_prior()));
        assert_eq!(node.visits(), 2);
        let below: u32 = tree.children(child).map(|c| tree.get(c).visits()).sum();
        assert_eq!(below, 1);
    }
}
