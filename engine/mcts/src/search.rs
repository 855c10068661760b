//! Search orchestration: root management, the worker pool, stop conditions
//! and the final move decision.
//!
//! A [`Search`] owns the tree, the cache and the mirrored game position.
//! Each `think` call:
//! 1. Opens the session (a stop request from here on ends it) and reuses
//!    the subtree of the moves played since the last session
//! 2. Expands and prepares the root (superko filter, noise, restrictions)
//! 3. Runs `num_threads - 1` scoped workers plus the calling thread until a
//!    stop condition fires
//! 4. Reduces the root children to a move, applying the pass and
//!    resignation policy

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use engine_core::{Color, GameError, GameState, Move};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, EvalCache};
use crate::config::{limit_or_unlimited, SearchConfig, UNLIMITED_PLAYOUTS};
use crate::decision::{
    best_non_pass, prune_by_confidence, sample_by_visits, sort_candidates, Candidate, MoveRestrictions,
    PassFlags,
};
use crate::evaluator::Evaluator;
use crate::memory::{MemoryAccountant, MemoryError, MemoryPlan};
use crate::node::{NodeId, NodeState};
use crate::time::{TimeControl, TimeManagement};
use crate::tree::{MctsTree, TreeStats};
use crate::worker::Worker;

/// Playouts and wall time required before the playout rate is trusted.
const MIN_RATE_PLAYOUTS: u32 = 100;
const MIN_RATE_ELAPSED: Duration = Duration::from_secs(1);

/// Longest principal variation written to the explanation.
const MAX_PV_LEN: usize = 12;

/// Errors that can occur while driving a search session.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
}

/// Lifecycle of a search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchState {
    Idle = 0,
    Thinking = 1,
    Stopping = 2,
    Pondering = 3,
}

impl SearchState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SearchState::Thinking,
            2 => SearchState::Stopping,
            3 => SearchState::Pondering,
            _ => SearchState::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct HandleInner {
    stop: AtomicBool,
    state: AtomicU8,
}

/// Cloneable remote control for a [`Search`]: read its state or ask a
/// running session to stop.
///
/// A stop request only affects the session that is running when it is made;
/// each new session clears it.
#[derive(Debug, Clone, Default)]
pub struct SearchHandle {
    inner: Arc<HandleInner>,
}

impl SearchHandle {
    /// Ask the running session to stop at its next check.
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SearchState {
        SearchState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    fn begin(&self, state: SearchState) {
        self.inner.stop.store(false, Ordering::Release);
        self.set_state(state);
    }

    fn set_state(&self, state: SearchState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }
}

/// Limits for one session.
#[derive(Debug, Clone, Copy)]
struct SessionLimits {
    budget: Option<Duration>,
    mode: TimeManagement,
    pondering: bool,
}

/// Main search driver.
pub struct Search<G: GameState, E: Evaluator<G>> {
    config: SearchConfig,
    evaluator: E,
    cache: EvalCache,
    accountant: Arc<MemoryAccountant>,
    tree: MctsTree,
    position: G,
    /// Position of the last session's root and the moves committed since.
    last_root: Option<G>,
    played_since: Vec<Move>,
    playouts: AtomicU32,
    handle: SearchHandle,
    time_control: TimeControl,
    restrictions: MoveRestrictions,
    rng: ChaCha20Rng,
    budget_fraction: f32,
    explanation: String,
}

impl<G: GameState, E: Evaluator<G>> Search<G, E> {
    /// Create a search for `position`, sizing the tree and the cache from
    /// `config.memory`.
    pub fn new(config: SearchConfig, evaluator: E, position: G) -> Result<Self, SearchError> {
        let plan = MemoryPlan::compute(
            config.memory.max_memory,
            config.memory.cache_ratio_percent,
            evaluator.estimated_bytes(),
            &config.memory,
        )?;
        debug!(%plan, "memory plan");

        let accountant = Arc::new(MemoryAccountant::new(plan.tree_bytes));
        let tree = MctsTree::new(Arc::clone(&accountant));
        let cache = EvalCache::new(plan.cache_entries, config.memory.cache_entry_bytes);
        let rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };

        Ok(Self {
            config,
            evaluator,
            cache,
            accountant,
            tree,
            position,
            last_root: None,
            played_since: Vec::new(),
            playouts: AtomicU32::new(0),
            handle: SearchHandle::default(),
            time_control: TimeControl::unlimited(),
            restrictions: MoveRestrictions::none(),
            rng,
            budget_fraction: 0.0,
            explanation: String::new(),
        })
    }

    /// Search the current position for `color` and pick a move.
    ///
    /// The position is not advanced; commit the result with
    /// [`Search::play_move`].
    pub fn think(&mut self, color: Color, flags: PassFlags) -> Move {
        let started = Instant::now();
        self.handle.begin(SearchState::Thinking);
        self.time_control.start(color);
        self.update_root(color);

        let mode = self.config.time_management.resolve(self.config.noise);
        let budget = self.time_control.max_time_for_move(
            self.position.board_cells(),
            color,
            self.position.move_number(),
            self.config.lag_buffer,
            mode != TimeManagement::Off,
        );
        debug!(
            color = %color,
            move_number = self.position.move_number(),
            budget_ms = budget.map(|b| b.as_millis() as u64),
            reused_visits = self.tree.get(self.tree.root()).visits(),
            "thinking"
        );

        self.prepare_root(self.config.noise);
        self.run_session(SessionLimits {
            budget,
            mode,
            pondering: false,
        });
        self.handle.set_state(SearchState::Idle);
        self.tree.activate_root_children();
        self.time_control.stop(color);

        let mv = self.get_best_move(flags);
        let elapsed = started.elapsed();
        let playouts = self.playouts();
        info!(
            color = %color,
            mv = %self.position.move_to_text(mv),
            visits = self.tree.get(self.tree.root()).visits(),
            playouts,
            nodes = self.tree.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            pps = playouts as f64 / elapsed.as_secs_f64().max(1e-3),
            "move chosen"
        );

        self.remember_root();
        mv
    }

    /// Search without a deadline until a playout or visit limit is reached
    /// or [`SearchHandle::stop`] is called. The tree is kept for the next
    /// `think`.
    pub fn ponder(&mut self) {
        if self.position.is_terminal() {
            return;
        }
        self.handle.begin(SearchState::Pondering);
        self.update_root(self.position.to_move());
        self.prepare_root(false);
        self.run_session(SessionLimits {
            budget: None,
            mode: TimeManagement::Off,
            pondering: true,
        });
        self.handle.set_state(SearchState::Idle);
        self.tree.activate_root_children();
        debug!(
            playouts = self.playouts(),
            visits = self.tree.get(self.tree.root()).visits(),
            "ponder finished"
        );
        self.remember_root();
    }

    /// Bring the tree in line with the current position.
    fn update_root(&mut self, color: Color) {
        let reused = match self.last_root.take() {
            Some(last) => self.reuse_subtree(last),
            None => false,
        };
        if !reused {
            self.tree.reset();
        }
        self.played_since.clear();

        if self.position.to_move() != color {
            debug!(color = %color, "side to move changed, discarding tree");
            self.position.set_to_move(color);
            self.tree.reset();
        }
    }

    /// Descend along the moves played since `last` and make that node the
    /// root. False if the history does not lead to the current position.
    fn reuse_subtree(&mut self, mut replay: G) -> bool {
        let mut node = self.tree.root();
        for &mv in &self.played_since {
            if replay.play(mv).is_err() {
                return false;
            }
            match self.tree.find_child(node, mv) {
                Some(child) => node = child,
                None => return false,
            }
        }
        if replay.position_hash() != self.position.position_hash() {
            return false;
        }
        if node == self.tree.root() {
            return true;
        }
        let trimmed = self.tree.promote(node);
        debug!(trimmed, nodes = self.tree.len(), "tree reuse");
        true
    }

    fn remember_root(&mut self) {
        self.last_root = Some(self.position.snapshot());
        self.played_since.clear();
    }

    fn worker(&self) -> Worker<'_, G, E> {
        Worker {
            tree: &self.tree,
            config: &self.config,
            evaluator: &self.evaluator,
            cache: self.config.use_cache.then_some(&self.cache),
            root_state: &self.position,
        }
    }

    /// Expand the root and filter its children before a session.
    fn prepare_root(&mut self, noise: bool) {
        if self.position.is_terminal() {
            return;
        }
        let root_id = self.tree.root();
        let root = self.tree.get(root_id);
        let worker = self.worker();
        if root.try_claim_expansion() || root.try_claim_from(NodeState::Leaf) {
            let backup = worker.expand(root_id, &self.position);
            root.update(backup.outcome, backup.score);
        } else if root.expandable(worker.min_prior()) && root.try_claim_from(NodeState::Expanded) {
            worker.widen(root_id, &self.position);
        }

        for id in self.tree.children(root_id) {
            let child = self.tree.get(id);
            if child.is_valid() && !self.position.is_legal(child.mv()) {
                debug!(mv = %self.position.move_to_text(child.mv()), "superko, invalidating root child");
                child.invalidate();
            }
        }

        if noise {
            self.add_dirichlet_noise();
        }

        if !self.restrictions.is_empty() {
            for id in self.tree.children(root_id) {
                let child = self.tree.get(id);
                child.set_active(self.permitted(child.mv()));
            }
        }
    }

    /// Whether the restrictions let the side to move play `mv` now.
    fn permitted(&self, mv: Move) -> bool {
        self.restrictions
            .permits(self.position.to_move(), mv, self.position.move_number())
    }

    /// Mix Dirichlet noise into the root priors for exploration.
    fn add_dirichlet_noise(&mut self) {
        let children: Vec<NodeId> = self.tree.children(self.tree.root()).collect();
        if children.is_empty() {
            return;
        }
        let alpha = self.config.dirichlet_alpha * 361.0 / self.position.board_cells() as f32;
        let noise = dirichlet_noise(children.len(), alpha, &mut self.rng);

        let eps = self.config.dirichlet_epsilon;
        for (id, n) in children.into_iter().zip(noise) {
            let child = self.tree.get(id);
            child.set_prior((1.0 - eps) * child.prior() + eps * n);
        }
    }

    fn run_session(&mut self, limits: SessionLimits) {
        self.playouts.store(0, Ordering::Relaxed);
        self.budget_fraction = 0.0;
        if self.position.is_terminal() || !self.root_is_searchable() {
            return;
        }

        let started = Instant::now();
        let running = AtomicBool::new(true);
        let this = &*self;
        let worker = this.worker();

        thread::scope(|s| {
            for _ in 1..this.config.num_threads {
                s.spawn(|| {
                    while running.load(Ordering::Acquire) {
                        if worker.simulate() {
                            this.playouts.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }

            while !this.should_stop(started, limits) {
                if worker.simulate() {
                    this.playouts.fetch_add(1, Ordering::Relaxed);
                }
            }
            running.store(false, Ordering::Release);
            this.handle.set_state(SearchState::Stopping);
        });

        self.budget_fraction = self.budget_fraction(started.elapsed(), limits.budget);
        let cache = self.cache.stats();
        debug!(
            playouts = self.playouts(),
            budget_fraction = self.budget_fraction,
            cache_entries = cache.entries,
            cache_hit_rate = cache.hit_rate(),
            memory_used = self.accountant.used(),
            "session drained"
        );
    }

    /// False when restrictions left no root child to explore.
    fn root_is_searchable(&self) -> bool {
        let root_id = self.tree.root();
        self.tree.get(root_id).state() != NodeState::Expanded
            || self.tree.children(root_id).any(|id| {
                let child = self.tree.get(id);
                child.is_active() && child.is_valid()
            })
    }

    fn should_stop(&self, started: Instant, limits: SessionLimits) -> bool {
        if self.handle.is_stop_requested() {
            return true;
        }
        if !self.root_is_searchable() {
            warn!("no selectable root move left, stopping");
            return true;
        }
        let root = self.tree.get(self.tree.root());
        if self.playouts() >= self.config.max_playouts || root.visits() >= self.config.max_visits {
            return true;
        }
        if self.stopping_move_reached() {
            debug!("stopping move reached its visit target");
            return true;
        }
        if limits.pondering {
            return false;
        }
        let elapsed = started.elapsed();
        if limits.budget.is_some_and(|budget| elapsed >= budget) {
            return true;
        }
        if !self.have_alternate_moves(elapsed, limits) {
            info!(
                left_ms = limits
                    .budget
                    .map(|b| b.saturating_sub(elapsed).as_millis() as u64),
                "leader cannot be caught, stopping early"
            );
            return true;
        }
        false
    }

    fn stopping_move_reached(&self) -> bool {
        let target = self.config.stopping_visits;
        !self.config.stopping_moves.is_empty()
            && self.config.stopping_moves.iter().any(|&mv| {
                self.tree
                    .find_child(self.tree.root(), mv)
                    .is_some_and(|id| self.tree.get(id).visits() >= target)
            })
    }

    /// Whether the session should keep going because some root child other
    /// than the leader can still matter.
    fn have_alternate_moves(&self, elapsed: Duration, limits: SessionLimits) -> bool {
        if limits.mode == TimeManagement::Off {
            return true;
        }
        let contenders = self.contenders();
        if contenders.is_empty() {
            return true;
        }
        let pruned = self.prune_noncontenders(&contenders, elapsed, limits);
        if pruned + 1 < contenders.len() {
            return true;
        }
        // Only `Fast` gives back time that cannot be banked, or playouts
        // under a fixed playout limit.
        let color = self.position.to_move();
        limits.mode != TimeManagement::Fast
            && (!self.time_control.can_accumulate_time(color)
                || self.config.max_playouts < UNLIMITED_PLAYOUTS)
    }

    /// Valid root children the restrictions permit.
    fn contenders(&self) -> Vec<NodeId> {
        self.tree
            .children(self.tree.root())
            .filter(|&id| {
                let child = self.tree.get(id);
                child.is_valid() && self.permitted(child.mv())
            })
            .collect()
    }

    /// Count (and, unless `NoPruning`, deactivate) contenders that can no
    /// longer become the chosen move.
    fn prune_noncontenders(
        &self,
        children: &[NodeId],
        elapsed: Duration,
        limits: SessionLimits,
    ) -> usize {
        let (lambda, mu, alpha) = (self.config.lambda, self.config.mu, self.config.ci_alpha);

        let mut max_visits = 0u32;
        let mut lcb_max = f32::NEG_INFINITY;
        for &id in children {
            let child = self.tree.get(id);
            max_visits = max_visits.max(child.visits());
            if child.visits() > 0 {
                lcb_max = lcb_max.max(child.lcb(lambda, mu, alpha));
            }
        }

        let min_required = i64::from(max_visits) - self.est_playouts_left(elapsed, limits.budget);
        let lcb_active =
            self.budget_fraction(elapsed, limits.budget) >= self.config.lcb_min_budget_fraction;
        let eligible = (self.config.lcb_min_visit_ratio * max_visits as f32).max(2.0);

        let mut pruned = 0;
        for &id in children {
            let child = self.tree.get(id);
            let visits = child.visits();
            let can_catch = i64::from(visits) >= min_required;
            let high_value = visits > 0 && child.value(lambda, mu) >= lcb_max;
            let dominated = lcb_active
                && visits as f32 >= eligible
                && child.ucb(lambda, mu, alpha) < lcb_max;
            let prune = dominated || !(can_catch || high_value);
            if limits.mode != TimeManagement::NoPruning {
                child.set_active(!prune);
            }
            if prune {
                pruned += 1;
            }
        }
        pruned
    }

    /// Playouts the session can still run, extrapolated from the playout
    /// rate once it is reliable.
    fn est_playouts_left(&self, elapsed: Duration, budget: Option<Duration>) -> i64 {
        let playouts = self.playouts();
        let root_visits = self.tree.get(self.tree.root()).visits();
        let by_limits = i64::from(self.config.max_playouts.saturating_sub(playouts))
            .min(i64::from(self.config.max_visits.saturating_sub(root_visits)));
        let Some(budget) = budget else {
            return by_limits;
        };
        if elapsed < MIN_RATE_ELAPSED || playouts < MIN_RATE_PLAYOUTS {
            return by_limits;
        }
        let rate = f64::from(playouts) / elapsed.as_secs_f64();
        let time_left = budget.saturating_sub(elapsed).as_secs_f64();
        by_limits.min((rate * time_left).ceil() as i64)
    }

    /// Share of the session's budget already spent, by the tightest limit.
    fn budget_fraction(&self, elapsed: Duration, budget: Option<Duration>) -> f32 {
        let mut fraction = 0.0f32;
        if self.config.max_playouts < UNLIMITED_PLAYOUTS {
            fraction = fraction.max(self.playouts() as f32 / self.config.max_playouts.max(1) as f32);
        }
        if self.config.max_visits < UNLIMITED_PLAYOUTS {
            let visits = self.tree.get(self.tree.root()).visits();
            fraction = fraction.max(visits as f32 / self.config.max_visits.max(1) as f32);
        }
        if let Some(budget) = budget {
            fraction = fraction.max(elapsed.as_secs_f32() / budget.as_secs_f32().max(1e-3));
        }
        fraction
    }

    /// Reduce the root to a move, applying restrictions and the pass and
    /// resignation policy.
    pub fn get_best_move(&mut self, flags: PassFlags) -> Move {
        let color = self.position.to_move();
        let mut candidates = self.root_children();
        candidates.retain(|c| self.permitted(c.mv));
        if self.budget_fraction >= self.config.lcb_min_budget_fraction {
            prune_by_confidence(&mut candidates, self.config.lcb_min_visit_ratio);
        }
        sort_candidates(&mut candidates);

        let mut reason = "most visits";
        let Some(&top) = candidates.first() else {
            self.explain(Move::Pass, None, "no candidates");
            return Move::Pass;
        };
        let mut best = top;

        if self.position.move_number() < self.config.random_moves {
            if let Some(pick) =
                sample_by_visits(&candidates, self.config.random_min_visits, &mut self.rng)
            {
                if pick.mv != best.mv {
                    reason = "random opening move";
                }
                best = pick;
            }
        }

        let pass_candidate = candidates.iter().copied().find(|c| c.mv == Move::Pass);
        if flags.no_pass {
            if best.mv == Move::Pass {
                if let Some(alt) = best_non_pass(&candidates) {
                    best = alt;
                    reason = "avoiding pass";
                }
            }
        } else if !self.config.dumb_pass {
            let board = self.position.score_for(color);
            if best.mv == Move::Pass {
                if let Some(alt) = best_non_pass(&candidates) {
                    if board < 0.0 || (board == 0.0 && alt.value > 0.5) {
                        best = alt;
                        reason = "passing loses on the board";
                    }
                }
            } else if self.position.last_move() == Some(Move::Pass) {
                if let Some(pass) = pass_candidate {
                    if board > 0.0 || (board == 0.0 && best.value < 0.5) {
                        best = pass;
                        reason = "opponent passed and passing wins";
                    }
                }
            }
        }

        if self.should_resign(flags, &top) {
            self.explain(Move::Resign, Some(top), "value below resign threshold");
            return Move::Resign;
        }

        self.explain(best.mv, Some(best), reason);
        best.mv
    }

    fn should_resign(&self, flags: PassFlags, best: &Candidate) -> bool {
        if flags.no_resign || self.config.resign_threshold <= 0.0 {
            return false;
        }
        if self.position.is_terminal() {
            return false;
        }
        if self.position.move_number() <= self.position.board_cells() / 4 {
            return false;
        }
        best.value < self.config.resign_threshold
            && best.score.abs() >= self.config.resign_min_score
    }

    fn explain(&mut self, mv: Move, best: Option<Candidate>, reason: &str) {
        let position = &self.position;
        let mut text = format!("{} plays {}", position.to_move(), position.move_to_text(mv));
        if let Some(c) = best {
            let _ = write!(
                text,
                " ({}): {} visits, value {:.1}%, score {:+.1}, lcb {:.1}%",
                reason,
                c.visits,
                c.value * 100.0,
                c.score,
                c.lcb.max(0.0) * 100.0
            );
        } else {
            let _ = write!(text, " ({})", reason);
        }
        let pv = self.principal_variation(mv);
        if !pv.is_empty() {
            let _ = write!(text, "\nPV: {}", pv.join(" "));
        }
        let stats = self.tree.stats();
        let _ = write!(
            text,
            "\n{} playouts, {} nodes, depth {}",
            self.playouts(),
            stats.total_nodes,
            stats.max_depth
        );
        self.explanation = text;
    }

    /// Most-visited line starting with `first`.
    fn principal_variation(&self, first: Move) -> Vec<String> {
        let mut pv = Vec::new();
        let mut position = self.position.clone();
        let mut node = self.tree.find_child(self.tree.root(), first);
        while let Some(id) = node {
            let mv = self.tree.get(id).mv();
            pv.push(position.move_to_text(mv));
            if pv.len() >= MAX_PV_LEN || position.play(mv).is_err() {
                break;
            }
            node = self
                .tree
                .children(id)
                .filter(|&c| self.tree.get(c).visits() > 0)
                .max_by_key(|&c| self.tree.get(c).visits());
        }
        pv
    }

    /// Explanation of the last decision (best line and statistics).
    pub fn explain_last_decision(&self) -> &str {
        &self.explanation
    }

    /// Valid root children as candidates, in stored order.
    pub fn root_children(&self) -> Vec<Candidate> {
        let (lambda, mu, alpha) = (self.config.lambda, self.config.mu, self.config.ci_alpha);
        self.tree
            .children(self.tree.root())
            .map(|id| self.tree.get(id))
            .filter(|node| node.is_valid())
            .map(|node| Candidate {
                mv: node.mv(),
                visits: node.visits(),
                prior: node.prior(),
                value: node.value(lambda, mu),
                score: node.score_mean(),
                lcb: node.lcb(lambda, mu, alpha),
                ucb: node.ucb(lambda, mu, alpha),
            })
            .collect()
    }

    /// Commit a move to the mirrored position. Call between sessions.
    pub fn play_move(&mut self, mv: Move) -> Result<(), SearchError> {
        self.position.play(mv)?;
        self.played_since.push(mv);
        Ok(())
    }

    /// Replace the position; the tree is discarded.
    pub fn set_position(&mut self, position: G) {
        self.position = position;
        self.reset();
    }

    /// Discard the tree and the reuse history.
    pub fn reset(&mut self) {
        self.tree.reset();
        self.last_root = None;
        self.played_since.clear();
        self.playouts.store(0, Ordering::Relaxed);
        self.budget_fraction = 0.0;
    }

    /// Set the playout limit per session (0 = unlimited).
    pub fn set_playout_limit(&mut self, n: u32) {
        self.config.max_playouts = limit_or_unlimited(n);
    }

    /// Set the root visit limit (0 = unlimited).
    pub fn set_visit_limit(&mut self, n: u32) {
        self.config.max_visits = limit_or_unlimited(n);
    }

    /// Re-split `total_bytes` (0 = default) between the evaluator, the cache
    /// and the tree. On error nothing changes.
    pub fn set_memory_budget(
        &mut self,
        total_bytes: usize,
        cache_ratio_percent: u32,
    ) -> Result<MemoryPlan, MemoryError> {
        let plan = MemoryPlan::compute(
            total_bytes,
            cache_ratio_percent,
            self.evaluator.estimated_bytes(),
            &self.config.memory,
        )
        .inspect_err(|e| warn!(error = %e, "memory budget rejected"))?;

        self.config.memory.max_memory = plan.total_bytes;
        self.config.memory.cache_ratio_percent = plan.cache_ratio_percent;
        self.accountant.set_limit(plan.tree_bytes);
        self.cache.resize(plan.cache_entries);
        let trimmed = self.tree.fit_to_limit();
        if trimmed > 0 {
            info!(trimmed, nodes = self.tree.len(), "tree trimmed to the new memory limit");
        }
        info!("{}", plan);
        Ok(plan)
    }

    pub fn set_time_control(&mut self, time_control: TimeControl) {
        self.time_control = time_control;
    }

    pub fn time_control(&self) -> &TimeControl {
        &self.time_control
    }

    pub fn time_control_mut(&mut self) -> &mut TimeControl {
        &mut self.time_control
    }

    pub fn set_move_restrictions(&mut self, restrictions: MoveRestrictions) {
        self.restrictions = restrictions;
    }

    /// Stop a session early once any of `moves` has `visits` root visits.
    pub fn set_stopping_moves(&mut self, moves: Vec<Move>, visits: u32) {
        self.config.stopping_moves = moves;
        self.config.stopping_visits = limit_or_unlimited(visits);
    }

    pub fn handle(&self) -> SearchHandle {
        self.handle.clone()
    }

    /// Number of nodes in the tree.
    pub fn tree_size(&self) -> usize {
        self.tree.len()
    }

    pub fn tree_stats(&self) -> TreeStats {
        self.tree.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Playouts completed by the last (or running) session.
    pub fn playouts(&self) -> u32 {
        self.playouts.load(Ordering::Relaxed)
    }

    pub fn position(&self) -> &G {
        &self.position
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn memory(&self) -> &MemoryAccountant {
        &self.accountant
    }

    pub fn tree(&self) -> &MctsTree {
        &self.tree
    }

    /// Whether the root holds a finished game.
    pub fn root_is_terminal(&self) -> bool {
        self.position.is_terminal() || self.tree.get(self.tree.root()).state() == NodeState::Terminal
    }
}

/// Generate Dirichlet-distributed noise using Gamma variates.
fn dirichlet_noise(n: usize, alpha: f32, rng: &mut ChaCha20Rng) -> Vec<f32> {
    use rand_distr::{Distribution, Gamma};

    let Ok(gamma) = Gamma::new(f64::from(alpha), 1.0) else {
        return vec![1.0 / n as f32; n];
    };
    let mut samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();

    // Normalize
    let sum: f32 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    }

    samples
}
