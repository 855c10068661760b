//! Search tree node.
//!
//! Each node represents the position reached by playing `mv` from its parent.
//! All fields are atomics so that any number of workers can read and update a
//! node concurrently through a shared reference. Statistics are stored from
//! the perspective of the player who played `mv`.

use engine_core::Move;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::evaluator::DEFAULT_BETA;

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);
    pub const ROOT: NodeId = NodeId(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Expansion state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    /// No children yet; the next visitor may claim it.
    Unexpanded = 0,
    /// A worker holds the expansion claim.
    Expanding = 1,
    /// Children are published.
    Expanded = 2,
    /// Game over at this node; scored by the rules engine.
    Terminal = 3,
    /// The move turned out to be illegal (superko); never selected.
    Invalid = 4,
    /// Children were refused for lack of memory; the stored evaluation is
    /// backed up instead until the node can be expanded again.
    Leaf = 5,
}

impl NodeState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => NodeState::Unexpanded,
            1 => NodeState::Expanding,
            2 => NodeState::Expanded,
            3 => NodeState::Terminal,
            5 => NodeState::Leaf,
            _ => NodeState::Invalid,
        }
    }
}

/// Winrate blended from the outcome mean and a squashed score margin:
/// `(1 - lambda) * outcome + lambda * sigmoid(beta * (score - mu))`.
#[inline]
pub fn blend(outcome: f32, score: f32, beta: f32, lambda: f32, mu: f32) -> f32 {
    if lambda <= 0.0 {
        return outcome;
    }
    let score_winrate = 1.0 / (1.0 + (-beta * (score - mu)).exp());
    (1.0 - lambda) * outcome + lambda * score_winrate
}

/// One-sided Student-t quantile: the `t` with P(T > t) = `alpha`.
///
/// Normal quantile (Acklam) with a Cornish-Fisher correction for `dof`.
pub fn t_quantile(alpha: f32, dof: u32) -> f32 {
    let z = -normal_quantile(f64::from(alpha).clamp(1e-12, 0.5));
    if dof == 0 {
        return f32::INFINITY;
    }
    let n = f64::from(dof);
    let z2 = z * z;
    let t = z
        + (z2 * z + z) / (4.0 * n)
        + (5.0 * z2 * z2 * z + 16.0 * z2 * z + 3.0 * z) / (96.0 * n * n)
        + (3.0 * z2 * z2 * z2 * z + 19.0 * z2 * z2 * z + 17.0 * z2 * z - 15.0 * z)
            / (384.0 * n * n * n);
    t as f32
}

fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };
    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[inline]
fn load_f32(a: &AtomicU32) -> f32 {
    f32::from_bits(a.load(Ordering::Relaxed))
}

#[inline]
fn store_f32(a: &AtomicU32, v: f32) {
    a.store(v.to_bits(), Ordering::Relaxed);
}

#[inline]
fn load_f64(a: &AtomicU64) -> f64 {
    f64::from_bits(a.load(Ordering::Relaxed))
}

/// A sample count and its running mean, packed so both change together.
#[inline]
fn pack_mean(count: u32, mean: f32) -> u64 {
    (u64::from(count) << 32) | u64::from(mean.to_bits())
}

#[inline]
fn unpack_mean(bits: u64) -> (u32, f32) {
    ((bits >> 32) as u32, f32::from_bits(bits as u32))
}

/// Fold `x` into a packed running mean. Returns the means before and after.
#[inline]
fn push_mean(a: &AtomicU64, x: f32) -> (f32, f32) {
    let mut current = a.load(Ordering::Acquire);
    loop {
        let (count, mean) = unpack_mean(current);
        let count = count.saturating_add(1);
        let next_mean = mean + (x - mean) / count as f32;
        match a.compare_exchange_weak(
            current,
            pack_mean(count, next_mean),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return (mean, next_mean),
            Err(actual) => current = actual,
        }
    }
}

/// Lock-free `+=` on an f64 stored as bits.
#[inline]
fn atomic_add_f64(a: &AtomicU64, delta: f64) {
    let mut current = a.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(current) + delta).to_bits();
        match a.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// A node in the search tree.
#[derive(Debug)]
pub struct Node {
    /// Move that led to this node from its parent (packed `Move`).
    mv: AtomicU32,

    /// Prior probability from the parent's policy, normalized over legal moves.
    prior: AtomicU32,

    state: AtomicU8,

    /// Cleared for root children excluded from the current search.
    active: AtomicBool,

    /// Visit count and mean backed-up outcome, packed (see `pack_mean`).
    outcome: AtomicU64,

    /// Sum of squared deviations from the outcome mean (Welford).
    outcome_m2: AtomicU64,

    /// Backed-up score count and mean, packed the same way.
    score: AtomicU64,

    /// In-flight traversals, each counted as a loss during selection.
    virtual_loss: AtomicU32,

    /// Evaluator output for this node's position, mover's perspective.
    net_outcome: AtomicU32,
    net_score: AtomicU32,
    beta: AtomicU32,

    /// Children occupy `first_child .. first_child + child_count` in the arena.
    first_child: AtomicU32,
    child_count: AtomicU32,

    /// Prior threshold the children were created with (see [`Node::expandable`]).
    min_prior: AtomicU32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            mv: AtomicU32::new(Move::Pass.to_bits()),
            prior: AtomicU32::new(1.0f32.to_bits()),
            state: AtomicU8::new(NodeState::Unexpanded as u8),
            active: AtomicBool::new(true),
            outcome: AtomicU64::new(0),
            outcome_m2: AtomicU64::new(0),
            score: AtomicU64::new(0),
            virtual_loss: AtomicU32::new(0),
            net_outcome: AtomicU32::new(0.5f32.to_bits()),
            net_score: AtomicU32::new(0.0f32.to_bits()),
            beta: AtomicU32::new(DEFAULT_BETA.to_bits()),
            first_child: AtomicU32::new(NodeId::NONE.0),
            child_count: AtomicU32::new(0),
            min_prior: AtomicU32::new(0.0f32.to_bits()),
        }
    }
}

impl Node {
    /// Prepare a freshly allocated slot. Only the allocating thread may call
    /// this, before the slot is published through its parent.
    pub(crate) fn init(&self, mv: Move, prior: f32) {
        self.mv.store(mv.to_bits(), Ordering::Relaxed);
        store_f32(&self.prior, prior.clamp(0.0, 1.0));
        self.state
            .store(NodeState::Unexpanded as u8, Ordering::Relaxed);
        self.active.store(true, Ordering::Relaxed);
        self.outcome.store(0, Ordering::Relaxed);
        self.outcome_m2.store(0, Ordering::Relaxed);
        self.score.store(0, Ordering::Relaxed);
        self.virtual_loss.store(0, Ordering::Relaxed);
        store_f32(&self.net_outcome, 0.5);
        store_f32(&self.net_score, 0.0);
        store_f32(&self.beta, DEFAULT_BETA);
        self.first_child.store(NodeId::NONE.0, Ordering::Relaxed);
        self.child_count.store(0, Ordering::Relaxed);
        store_f32(&self.min_prior, 0.0);
    }

    /// Copy statistics and flags from `other`, pointing children at `first`.
    pub(crate) fn copy_from(&self, other: &Node, first: NodeId) {
        self.mv.store(other.mv.load(Ordering::Relaxed), Ordering::Relaxed);
        self.prior
            .store(other.prior.load(Ordering::Relaxed), Ordering::Relaxed);
        self.active
            .store(other.active.load(Ordering::Relaxed), Ordering::Relaxed);
        self.virtual_loss.store(0, Ordering::Relaxed);
        for (dst, src) in [
            (&self.outcome, &other.outcome),
            (&self.outcome_m2, &other.outcome_m2),
            (&self.score, &other.score),
        ] {
            dst.store(src.load(Ordering::Acquire), Ordering::Relaxed);
        }
        for (dst, src) in [
            (&self.net_outcome, &other.net_outcome),
            (&self.net_score, &other.net_score),
            (&self.beta, &other.beta),
            (&self.min_prior, &other.min_prior),
        ] {
            dst.store(src.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        let count = if first.is_some() { other.child_count() } else { 0 };
        self.first_child.store(first.0, Ordering::Relaxed);
        self.child_count.store(count, Ordering::Relaxed);
        let state = match other.state() {
            NodeState::Expanded if count == 0 => NodeState::Unexpanded,
            NodeState::Expanding => NodeState::Unexpanded,
            s => s,
        };
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn mv(&self) -> Move {
        Move::from_bits(self.mv.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn prior(&self) -> f32 {
        load_f32(&self.prior)
    }

    pub fn set_prior(&self, prior: f32) {
        store_f32(&self.prior, prior.clamp(0.0, 1.0));
    }

    #[inline]
    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn visits(&self) -> u32 {
        unpack_mean(self.outcome.load(Ordering::Acquire)).0
    }

    #[inline]
    pub fn virtual_loss(&self) -> u32 {
        self.virtual_loss.load(Ordering::Relaxed)
    }

    pub fn add_virtual_loss(&self, count: u32) {
        self.virtual_loss.fetch_add(count, Ordering::Relaxed);
    }

    pub fn undo_virtual_loss(&self, count: u32) {
        let prev = self.virtual_loss.fetch_sub(count, Ordering::Relaxed);
        assert!(prev >= count, "virtual loss underflow");
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    /// Selectable: active and not known to be illegal.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.state() != NodeState::Invalid
    }

    /// Try to take the expansion claim. Exactly one caller wins.
    pub fn try_claim_expansion(&self) -> bool {
        self.try_claim_from(NodeState::Unexpanded)
    }

    /// Take the expansion claim from a node in state `from` (a refused
    /// [`NodeState::Leaf`] or an [`NodeState::Expanded`] node being widened).
    /// While claimed, the node reports no children.
    pub(crate) fn try_claim_from(&self, from: NodeState) -> bool {
        self.state
            .compare_exchange(
                from as u8,
                NodeState::Expanding as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Publish children claimed with [`Node::try_claim_expansion`].
    pub(crate) fn finish_expansion(&self, first: NodeId, count: u32) {
        self.first_child.store(first.0, Ordering::Relaxed);
        self.child_count.store(count, Ordering::Relaxed);
        self.state
            .store(NodeState::Expanded as u8, Ordering::Release);
    }

    /// Release the claim without children: the node becomes a [`NodeState::Leaf`].
    pub(crate) fn refuse_expansion(&self) {
        let _ = self.state.compare_exchange(
            NodeState::Expanding as u8,
            NodeState::Leaf as u8,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }

    /// Raw child block, readable while the claim is held.
    pub(crate) fn child_block(&self) -> (NodeId, u32) {
        (
            NodeId(self.first_child.load(Ordering::Relaxed)),
            self.child_count(),
        )
    }

    pub(crate) fn set_min_prior(&self, min_prior: f32) {
        store_f32(&self.min_prior, min_prior);
    }

    /// Prior threshold of the last expansion attempt.
    pub fn min_prior(&self) -> f32 {
        load_f32(&self.min_prior)
    }

    /// Whether expanding now at `min_prior` would add children: the node is
    /// a refused leaf or was expanded under a stricter threshold.
    pub fn expandable(&self, min_prior: f32) -> bool {
        matches!(self.state(), NodeState::Leaf | NodeState::Expanded) && min_prior < self.min_prior()
    }

    pub(crate) fn mark_terminal(&self) {
        self.state
            .store(NodeState::Terminal as u8, Ordering::Release);
    }

    pub(crate) fn invalidate(&self) {
        self.state.store(NodeState::Invalid as u8, Ordering::Release);
    }

    #[inline]
    pub fn child_count(&self) -> u32 {
        self.child_count.load(Ordering::Relaxed)
    }

    /// Child range; empty unless expanded.
    pub fn children(&self) -> std::ops::Range<u32> {
        if self.state() != NodeState::Expanded {
            return 0..0;
        }
        let first = self.first_child.load(Ordering::Relaxed);
        first..first + self.child_count()
    }

    pub fn has_children(&self) -> bool {
        !self.children().is_empty()
    }

    /// Record the evaluator's view of this node's position (mover's perspective).
    pub(crate) fn set_net_eval(&self, outcome: f32, score: f32, beta: f32) {
        store_f32(&self.net_outcome, outcome);
        store_f32(&self.net_score, score);
        store_f32(&self.beta, beta);
    }

    pub fn net_outcome(&self) -> f32 {
        load_f32(&self.net_outcome)
    }

    pub fn net_score(&self) -> f32 {
        load_f32(&self.net_score)
    }

    pub fn beta(&self) -> f32 {
        load_f32(&self.beta)
    }

    /// Blended evaluator value of this node's position.
    pub fn net_value(&self, lambda: f32, mu: f32) -> f32 {
        blend(self.net_outcome(), self.net_score(), self.beta(), lambda, mu)
    }

    /// Back up one result, already in this node's perspective.
    ///
    /// The visit count and the outcome mean move in one step, so readers
    /// never see a count without its result.
    pub fn update(&self, outcome: f32, score: f32) {
        let (old_mean, new_mean) = push_mean(&self.outcome, outcome);
        let delta = f64::from(outcome - old_mean) * f64::from(outcome - new_mean);
        atomic_add_f64(&self.outcome_m2, delta);
        push_mean(&self.score, score);
    }

    /// Mean backed-up outcome; 0.5 when unvisited.
    pub fn outcome_mean(&self) -> f32 {
        match unpack_mean(self.outcome.load(Ordering::Acquire)) {
            (0, _) => 0.5,
            (_, mean) => mean,
        }
    }

    /// Mean backed-up score margin; 0 when unvisited.
    pub fn score_mean(&self) -> f32 {
        match unpack_mean(self.score.load(Ordering::Acquire)) {
            (0, _) => 0.0,
            (_, mean) => mean,
        }
    }

    /// Sample variance of the backed-up outcomes (`default` below 2 visits).
    pub fn outcome_variance(&self, default: f32) -> f32 {
        let n = self.visits();
        if n < 2 {
            return default;
        }
        ((load_f64(&self.outcome_m2) / f64::from(n - 1)).max(0.0)) as f32
    }

    /// Blended value of the backed-up statistics.
    pub fn value(&self, lambda: f32, mu: f32) -> f32 {
        blend(
            self.outcome_mean(),
            self.score_mean(),
            self.beta(),
            lambda,
            mu,
        )
    }

    /// Blended value counting each virtual loss as a lost visit.
    pub fn value_with_virtual_loss(&self, lambda: f32, mu: f32) -> f32 {
        let visits = self.visits() as f32;
        let vl = self.virtual_loss() as f32;
        if visits + vl == 0.0 {
            return 0.0;
        }
        self.value(lambda, mu) * visits / (visits + vl)
    }

    /// Lower confidence bound of the blended value.
    pub fn lcb(&self, lambda: f32, mu: f32, alpha: f32) -> f32 {
        let visits = self.visits();
        if visits < 2 {
            return -1e6 + visits as f32;
        }
        self.value(lambda, mu) - self.confidence_radius(alpha)
    }

    /// Upper confidence bound of the blended value.
    pub fn ucb(&self, lambda: f32, mu: f32, alpha: f32) -> f32 {
        if self.visits() < 2 {
            return 1e6;
        }
        self.value(lambda, mu) + self.confidence_radius(alpha)
    }

    fn confidence_radius(&self, alpha: f32) -> f32 {
        let visits = self.visits();
        let stddev = (self.outcome_variance(1.0) / visits as f32).sqrt();
        t_quantile(alpha, visits - 1) * stddev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_node_id_none() {
        assert!(NodeId::NONE.is_none());
        assert!(!NodeId::NONE.is_some());
        assert!(!NodeId(0).is_none());
        assert!(NodeId::ROOT.is_some());
    }

    #[test]
    fn test_new_node() {
        let node = Node::default();
        node.init(Move::Play(7), 0.25);

        assert_eq!(node.mv(), Move::Play(7));
        assert_eq!(node.visits(), 0);
        assert!((node.prior() - 0.25).abs() < 1e-6);
        assert_eq!(node.state(), NodeState::Unexpanded);
        assert!(node.children().is_empty());
        assert!(node.is_active());
    }

    #[test]
    fn test_running_means() {
        let node = Node::default();

        // Unvisited
        assert!((node.outcome_mean() - 0.5).abs() < 1e-6);
        assert!(node.score_mean().abs() < 1e-6);

        node.update(1.0, 4.0);
        node.update(0.0, -2.0);
        node.update(1.0, 1.0);
        node.update(0.0, 1.0);
        assert_eq!(node.visits(), 4);
        assert!((node.outcome_mean() - 0.5).abs() < 1e-6);
        assert!((node.score_mean() - 1.0).abs() < 1e-6);
        // sample variance of [1, 0, 1, 0] = 1/3
        assert!((node.outcome_variance(0.0) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_blend() {
        // lambda 0 ignores the score
        assert!((blend(0.7, 30.0, 1.0, 0.0, 0.0) - 0.7).abs() < 1e-6);
        // score at mu squashes to 0.5
        assert!((blend(0.7, 2.0, 1.0, 1.0, 2.0) - 0.5).abs() < 1e-6);
        // half and half
        let v = blend(1.0, 0.0, 1.0, 0.5, 0.0);
        assert!((v - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_virtual_loss_lowers_value() {
        let node = Node::default();
        node.update(1.0, 0.0);
        node.update(1.0, 0.0);
        assert!((node.value_with_virtual_loss(0.0, 0.0) - 1.0).abs() < 1e-6);

        node.add_virtual_loss(2);
        assert!((node.value_with_virtual_loss(0.0, 0.0) - 0.5).abs() < 1e-6);

        node.undo_virtual_loss(2);
        assert_eq!(node.virtual_loss(), 0);
    }

    #[test]
    #[should_panic(expected = "virtual loss underflow")]
    fn test_virtual_loss_underflow_is_fatal() {
        let node = Node::default();
        node.undo_virtual_loss(1);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let node = Node::default();
        assert!(node.try_claim_expansion());
        assert!(!node.try_claim_expansion());
        assert_eq!(node.state(), NodeState::Expanding);

        node.refuse_expansion();
        assert_eq!(node.state(), NodeState::Leaf);
        assert!(!node.try_claim_expansion());
        assert!(node.try_claim_from(NodeState::Leaf));
        node.finish_expansion(NodeId(5), 3);
        assert_eq!(node.children(), 5..8);
        assert!(!node.try_claim_expansion());
    }

    #[test]
    fn test_expandable_under_lower_threshold() {
        let node = Node::default();
        // Unexpanded nodes go through the ordinary claim instead
        assert!(!node.expandable(0.0));

        assert!(node.try_claim_expansion());
        node.set_min_prior(0.01);
        node.finish_expansion(NodeId(1), 2);
        assert!(!node.expandable(0.01));
        assert!(!node.expandable(0.5));
        assert!(node.expandable(0.001));

        assert!(node.try_claim_from(NodeState::Expanded));
        assert!(node.children().is_empty());
        assert_eq!(node.child_block(), (NodeId(1), 2));
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_update() {
        let node = Node::default();
        let finished = AtomicUsize::new(0);
        let mut lowest = 1.0f32;
        thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    for _ in 0..200_000 {
                        node.update(1.0, 0.0);
                    }
                    finished.fetch_add(1, Ordering::Release);
                });
            }
            while finished.load(Ordering::Acquire) < 3 {
                if node.visits() > 0 {
                    lowest = lowest.min(node.outcome_mean());
                }
            }
        });
        assert_eq!(lowest, 1.0);
        assert_eq!(node.visits(), 600_000);
        assert_eq!(node.outcome_variance(1.0), 0.0);
    }

    #[test]
    fn test_concurrent_claim_single_winner() {
        let node = Arc::new(Node::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let node = Arc::clone(&node);
                thread::spawn(move || node.try_claim_expansion())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_confidence_bounds() {
        let node = Node::default();
        node.update(1.0, 0.0);
        // Too few visits: sentinel bounds
        assert!(node.lcb(0.0, 0.0, 1e-5) < -1e5);
        assert!(node.ucb(0.0, 0.0, 1e-5) > 1e5);

        for i in 0..99 {
            node.update(if i % 10 == 0 { 0.0 } else { 1.0 }, 0.0);
        }
        let mean = node.value(0.0, 0.0);
        let lcb = node.lcb(0.0, 0.0, 1e-5);
        let ucb = node.ucb(0.0, 0.0, 1e-5);
        assert!(lcb < mean && mean < ucb);
        assert!(((mean - lcb) - (ucb - mean)).abs() < 1e-5);
    }

    #[test]
    fn test_t_quantile() {
        // Large dof approaches the normal quantile
        assert!((t_quantile(0.025, 100_000) - 1.96).abs() < 0.01);
        assert!((t_quantile(0.05, 100_000) - 1.645).abs() < 0.01);
        // Fewer degrees of freedom widen the bound
        assert!(t_quantile(1e-5, 10) > t_quantile(1e-5, 1000));
    }

    #[test]
    fn test_copy_from_preserves_stats() {
        let src = Node::default();
        src.init(Move::Play(3), 0.4);
        src.update(0.25, 3.0);
        src.update(0.75, -1.0);
        src.set_net_eval(0.6, 2.0, 0.8);

        let dst = Node::default();
        dst.copy_from(&src, NodeId::NONE);
        assert_eq!(dst.mv(), Move::Play(3));
        assert_eq!(dst.state(), NodeState::Unexpanded);
        assert_eq!(dst.visits(), 2);
        assert_eq!(dst.outcome_mean(), src.outcome_mean());
        assert_eq!(dst.score_mean(), src.score_mean());
        assert_eq!(dst.outcome_variance(0.0), src.outcome_variance(0.0));
        assert_eq!(dst.beta(), src.beta());
    }
}
