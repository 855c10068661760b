//! Search tree with lock-free arena allocation.
//!
//! Nodes live in fixed-size segments that are allocated on first use and
//! never move, so a `&Node` stays valid for the lifetime of the arena while
//! workers keep appending. A node's children occupy one contiguous block,
//! reserved with a single compare-and-swap on the arena length.
//!
//! Every allocation is charged to the shared [`MemoryAccountant`]; a refused
//! charge leaves the tree as it was, except that the node being expanded
//! becomes a [`NodeState::Leaf`].

use engine_core::Move;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::SearchConfig;
use crate::memory::MemoryAccountant;
use crate::node::{Node, NodeId, NodeState};

/// Bytes charged per node.
pub const NODE_BYTES: usize = mem::size_of::<Node>();

const SEGMENT_BITS: u32 = 12;
const SEGMENT_LEN: usize = 1 << SEGMENT_BITS;
const SEGMENT_MASK: u32 = (1 << SEGMENT_BITS) - 1;

/// Growable node storage with stable addresses.
struct Arena {
    segments: Box<[OnceLock<Box<[Node]>>]>,
    len: AtomicU32,
    capacity: u32,
}

impl Arena {
    fn new(capacity: u32) -> Self {
        let num_segments = (capacity as usize).div_ceil(SEGMENT_LEN);
        Self {
            segments: (0..num_segments).map(|_| OnceLock::new()).collect(),
            len: AtomicU32::new(0),
            capacity,
        }
    }

    #[inline]
    fn len(&self) -> u32 {
        self.len.load(Ordering::Acquire)
    }

    /// Reserve `count` consecutive slots; None if the arena is full.
    fn alloc(&self, count: u32) -> Option<NodeId> {
        let mut current = self.len.load(Ordering::Acquire);
        let end = loop {
            let end = current.checked_add(count)?;
            if end > self.capacity {
                return None;
            }
            match self.len.compare_exchange_weak(
                current,
                end,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break end,
                Err(actual) => current = actual,
            }
        };
        if count > 0 {
            let first_segment = (current >> SEGMENT_BITS) as usize;
            let last_segment = ((end - 1) >> SEGMENT_BITS) as usize;
            for segment in &self.segments[first_segment..=last_segment] {
                segment.get_or_init(|| (0..SEGMENT_LEN).map(|_| Node::default()).collect());
            }
        }
        Some(NodeId(current))
    }

    #[inline]
    fn get(&self, id: NodeId) -> &Node {
        let segment = self.segments[(id.0 >> SEGMENT_BITS) as usize]
            .get()
            .expect("node segment must be allocated before use");
        &segment[(id.0 & SEGMENT_MASK) as usize]
    }
}

/// Why a node could not get children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandError {
    /// The memory ceiling (or arena capacity) refused the allocation.
    OutOfMemory,
}

/// Source of a slot in a widened child block.
enum WidenedChild {
    Existing(NodeId),
    Added(Move),
}

/// Search tree with arena-based node storage. The root is always slot 0.
pub struct MctsTree {
    arena: Arena,
    accountant: Arc<MemoryAccountant>,
}

impl MctsTree {
    /// Create a tree holding only a root node.
    pub fn new(accountant: Arc<MemoryAccountant>) -> Self {
        let arena = Arena::new(Self::capacity_for(accountant.limit()));
        let root = arena
            .alloc(1)
            .expect("arena always has room for the root");
        arena.get(root).init(Move::Pass, 1.0);
        accountant.force_reserve(NODE_BYTES);
        Self { arena, accountant }
    }

    fn capacity_for(limit_bytes: usize) -> u32 {
        (limit_bytes / NODE_BYTES).clamp(1, u32::MAX as usize - 1) as u32
    }

    /// Get the root node ID.
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a reference to a node by ID.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        self.arena.get(id)
    }

    /// Get the total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.arena.len() as usize
    }

    /// Check if tree is empty (never true after construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn accountant(&self) -> &Arc<MemoryAccountant> {
        &self.accountant
    }

    /// Children of a node, in stored order (highest prior first).
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        self.get(id).children().map(NodeId)
    }

    pub fn find_child(&self, parent: NodeId, mv: Move) -> Option<NodeId> {
        self.children(parent).find(|&c| self.get(c).mv() == mv)
    }

    /// Select the child maximizing the PUCT score.
    ///
    /// Children that are inactive or invalid are skipped. Unvisited children
    /// get the first-play-urgency value; a child another worker is expanding
    /// is avoided unless nothing else is available.
    pub fn select_child(
        &self,
        parent: NodeId,
        config: &SearchConfig,
        is_root: bool,
    ) -> Option<NodeId> {
        let node = self.get(parent);
        let (lambda, mu) = (config.lambda, config.mu);

        let mut parent_visits = 0u64;
        let mut visited_policy = 0.0f32;
        for id in self.children(parent) {
            let child = self.get(id);
            if child.is_valid() {
                let visits = child.visits();
                parent_visits += u64::from(visits);
                if visits > 0 {
                    visited_policy += child.prior();
                }
            }
        }

        let n = parent_visits as f32;
        let numerator = if parent_visits > 0 {
            (n * (config.log_puct * n + config.log_const).ln()).sqrt()
        } else {
            0.0
        };
        let fpu_reduction = if is_root {
            config.fpu_root_reduction
        } else {
            config.fpu_reduction
        } * visited_policy.sqrt();
        // Children are scored from the side to move here: the opposite of
        // the perspective stored on `node`.
        let fpu_eval = (1.0 - node.net_value(lambda, mu)) - fpu_reduction;

        let mut best: Option<(NodeId, f32)> = None;
        for id in self.children(parent) {
            let child = self.get(id);
            if !child.is_active() || !child.is_valid() {
                continue;
            }
            let winrate = if child.state() == NodeState::Expanding {
                -1.0 - fpu_reduction
            } else if child.visits() == 0 {
                fpu_eval
            } else {
                child.value_with_virtual_loss(lambda, mu)
            };
            let puct =
                config.c_puct * child.prior() * numerator / (1.0 + child.visits() as f32);
            let value = winrate + puct;
            if best.map_or(true, |(_, v)| value > v) {
                best = Some((id, value));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Create children for a node whose expansion claim the caller holds.
    ///
    /// `priors` must be normalized and sorted highest first. Moves below
    /// `min_prior` are skipped, except that the single best move is always
    /// kept when nothing clears the threshold. On failure no node is
    /// allocated and the claimed node becomes a [`NodeState::Leaf`].
    pub fn create_children(
        &self,
        id: NodeId,
        priors: &[(Move, f32)],
        min_prior: f32,
    ) -> Result<u32, ExpandError> {
        let node = self.get(id);
        debug_assert_eq!(node.state(), NodeState::Expanding);
        node.set_min_prior(min_prior);

        let mut keep = priors.iter().take_while(|(_, p)| *p >= min_prior).count();
        if keep == 0 && !priors.is_empty() {
            keep = 1;
        }

        let count = keep as u32;
        let Some(first) = self.alloc(count) else {
            node.refuse_expansion();
            return Err(ExpandError::OutOfMemory);
        };
        for (i, &(mv, prior)) in priors[..keep].iter().enumerate() {
            self.get(NodeId(first.0 + i as u32)).init(mv, prior);
        }
        node.finish_expansion(first, count);
        Ok(count)
    }

    /// Add the moves an earlier, stricter expansion skipped. The caller holds
    /// the claim taken from [`NodeState::Expanded`].
    ///
    /// Existing children keep their statistics and subtrees but move to a new
    /// block together with the added ones; the old block stays allocated until
    /// the next compaction. On failure the node keeps its current children.
    pub fn widen_children(
        &self,
        id: NodeId,
        priors: &[(Move, f32)],
        min_prior: f32,
    ) -> Result<u32, ExpandError> {
        let node = self.get(id);
        debug_assert_eq!(node.state(), NodeState::Expanding);
        node.set_min_prior(min_prior);

        let (old_first, old_count) = node.child_block();
        let existing: HashSet<Move> = (old_first.0..old_first.0 + old_count)
            .map(|c| self.get(NodeId(c)).mv())
            .collect();

        let mut merged: Vec<(f32, WidenedChild)> = (old_first.0..old_first.0 + old_count)
            .map(|c| (self.get(NodeId(c)).prior(), WidenedChild::Existing(NodeId(c))))
            .collect();
        merged.extend(
            priors
                .iter()
                .filter(|(mv, p)| *p >= min_prior && !existing.contains(mv))
                .map(|&(mv, p)| (p, WidenedChild::Added(mv))),
        );
        if merged.len() == old_count as usize {
            node.finish_expansion(old_first, old_count);
            return Ok(old_count);
        }
        merged.sort_by(|a, b| b.0.total_cmp(&a.0));

        let count = merged.len() as u32;
        let Some(first) = self.alloc(count) else {
            node.finish_expansion(old_first, old_count);
            return Err(ExpandError::OutOfMemory);
        };
        for (i, (prior, source)) in merged.into_iter().enumerate() {
            let slot = self.get(NodeId(first.0 + i as u32));
            match source {
                WidenedChild::Existing(old) => {
                    let old = self.get(old);
                    slot.copy_from(old, old.child_block().0);
                }
                WidenedChild::Added(mv) => slot.init(mv, prior),
            }
        }
        node.finish_expansion(first, count);
        Ok(count - old_count)
    }

    fn alloc(&self, count: u32) -> Option<NodeId> {
        let bytes = count as usize * NODE_BYTES;
        if !self.accountant.try_reserve(bytes) {
            return None;
        }
        let first = self.arena.alloc(count);
        if first.is_none() {
            self.accountant.release(bytes);
        }
        first
    }

    /// Number of nodes reachable from `id`, `id` included.
    pub fn subtree_size(&self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut count = 0;
        while let Some(current) = stack.pop() {
            count += 1;
            stack.extend(self.children(current));
        }
        count
    }

    /// Make `new_root` the root, keeping its subtree and dropping the rest.
    ///
    /// The kept nodes are compacted into a fresh arena sized for the current
    /// memory ceiling; their statistics are copied bit for bit. When the
    /// subtree does not fit, the most visited nodes get their children first
    /// and the rest are collapsed into unexpanded nodes that keep their own
    /// statistics. Returns the number of nodes dropped from the subtree.
    /// Must not run concurrently with workers.
    pub fn promote(&mut self, new_root: NodeId) -> usize {
        let capacity = Self::capacity_for(self.accountant.limit());
        let subtree = self.subtree_size(new_root);

        let arena = Arena::new(capacity);
        let root = arena
            .alloc(1)
            .expect("arena always has room for the root");
        // Highest visits first; ties in breadth-first order
        let mut queue = BinaryHeap::from([(self.get(new_root).visits(), Reverse(0u64), new_root, root)]);
        let mut pushed = 1u64;
        while let Some((_, _, old_id, new_id)) = queue.pop() {
            let old = self.get(old_id);
            let children = old.children();
            let first = if children.is_empty() {
                NodeId::NONE
            } else {
                match arena.alloc(children.len() as u32) {
                    Some(first) => {
                        for (i, child) in children.enumerate() {
                            let child = NodeId(child);
                            let slot = NodeId(first.0 + i as u32);
                            queue.push((self.get(child).visits(), Reverse(pushed), child, slot));
                            pushed += 1;
                        }
                        first
                    }
                    None => NodeId::NONE,
                }
            };
            arena.get(new_id).copy_from(old, first);
        }

        let old_len = self.len();
        self.arena = arena;
        self.accountant.release(old_len * NODE_BYTES);
        self.accountant.force_reserve(self.len() * NODE_BYTES);
        subtree - self.len()
    }

    /// Discard everything but a fresh, unexpanded root.
    pub fn reset(&mut self) {
        let old_len = self.len();
        let arena = Arena::new(Self::capacity_for(self.accountant.limit()));
        let root = arena
            .alloc(1)
            .expect("arena always has room for the root");
        arena.get(root).init(Move::Pass, 1.0);
        self.arena = arena;
        self.accountant.release(old_len * NODE_BYTES);
        self.accountant.force_reserve(NODE_BYTES);
    }

    /// Re-home the tree after the memory ceiling changed, trimming the least
    /// visited subtrees if needed. Returns the number of nodes dropped.
    pub fn fit_to_limit(&mut self) -> usize {
        self.promote(NodeId::ROOT)
    }

    /// Re-enable every root child (after pruning or move restrictions).
    pub fn activate_root_children(&self) {
        for id in self.children(NodeId::ROOT) {
            self.get(id).set_active(true);
        }
    }

    /// Get statistics about the tree for debugging.
    pub fn stats(&self) -> TreeStats {
        let root = self.get(NodeId::ROOT);
        let mut expanded_nodes = 0usize;
        let mut child_links = 0usize;
        let mut max_depth = 0u32;
        let mut stack = vec![(NodeId::ROOT, 0u32)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let children = self.get(id).children();
            if !children.is_empty() {
                expanded_nodes += 1;
                child_links += children.len();
                stack.extend(children.map(|c| (NodeId(c), depth + 1)));
            }
        }
        TreeStats {
            total_nodes: self.len(),
            expanded_nodes,
            root_visits: root.visits(),
            root_value: root.outcome_mean(),
            max_depth,
            avg_branching: if expanded_nodes == 0 {
                0.0
            } else {
                child_links as f32 / expanded_nodes as f32
            },
        }
    }
}

impl Drop for MctsTree {
    fn drop(&mut self) {
        self.accountant.release(self.len() * NODE_BYTES);
    }
}

/// Statistics about a search tree.
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub expanded_nodes: usize,
    pub root_visits: u32,
    /// Mean outcome at the root, from the perspective of the player who
    /// moved into the root position.
    pub root_value: f32,
    pub max_depth: u32,
    pub avg_branching: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    fn tree_with_room(nodes: usize) -> MctsTree {
        MctsTree::new(Arc::new(MemoryAccountant::new(nodes * NODE_BYTES)))
    }

    fn priors(values: &[f32]) -> Vec<(Move, f32)> {
        values
            .iter()
            .enumerate()
            .map(|(i, &p)| (Move::Play(i as u16), p))
            .collect()
    }

    fn expand(tree: &MctsTree, id: NodeId, values: &[f32], min_prior: f32) -> u32 {
        assert!(tree.get(id).try_claim_expansion());
        tree.create_children(id, &priors(values), min_prior).unwrap()
    }

    #[test]
    fn test_new_tree() {
        let tree = tree_with_room(100);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), NodeId(0));
        assert_eq!(tree.accountant().used(), NODE_BYTES);
        assert!(!tree.get(tree.root()).has_children());
    }

    #[test]
    fn test_create_children_respects_min_prior() {
        let tree = tree_with_room(100);
        let count = expand(&tree, NodeId::ROOT, &[0.5, 0.3, 0.15, 0.05], 0.2);
        assert_eq!(count, 2);
        let moves: Vec<Move> = tree
            .children(NodeId::ROOT)
            .map(|c| tree.get(c).mv())
            .collect();
        assert_eq!(moves, vec![Move::Play(0), Move::Play(1)]);
        for c in tree.children(NodeId::ROOT) {
            assert!(tree.get(c).prior() >= 0.2);
        }
    }

    #[test]
    fn test_create_children_keeps_single_best_when_all_below() {
        let tree = tree_with_room(100);
        let count = expand(&tree, NodeId::ROOT, &[0.3, 0.3, 0.2, 0.2], 0.5);
        assert_eq!(count, 1);
        let only = tree.children(NodeId::ROOT).next().unwrap();
        assert_eq!(tree.get(only).mv(), Move::Play(0));
    }

    #[test]
    fn test_expansion_refused_when_over_budget() {
        let tree = tree_with_room(3);
        let used_before = tree.accountant().used();

        assert!(tree.get(NodeId::ROOT).try_claim_expansion());
        let result = tree.create_children(NodeId::ROOT, &priors(&[0.4, 0.3, 0.3]), 0.0);
        assert_eq!(result, Err(ExpandError::OutOfMemory));

        // Nothing allocated; the node is left as a leaf
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.accountant().used(), used_before);
        assert_eq!(tree.get(NodeId::ROOT).state(), NodeState::Leaf);
        assert!(!tree.get(NodeId::ROOT).try_claim_expansion());
        assert!(tree.accountant().used() <= tree.accountant().limit());

        // A smaller expansion still fits once the leaf is reclaimed
        assert!(tree.get(NodeId::ROOT).try_claim_from(NodeState::Leaf));
        assert_eq!(
            tree.create_children(NodeId::ROOT, &priors(&[0.6, 0.4]), 0.0),
            Ok(2)
        );
        assert_eq!(tree.accountant().used(), 3 * NODE_BYTES);
    }

    #[test]
    fn test_widen_children_keeps_existing_statistics() {
        let tree = tree_with_room(100);
        let values = [0.5, 0.3, 0.15, 0.05];
        assert_eq!(expand(&tree, NodeId::ROOT, &values, 0.2), 2);
        let strong = tree.children(NodeId::ROOT).next().unwrap();
        expand(&tree, strong, &[0.6, 0.4], 0.0);
        tree.get(strong).update(0.75, 2.0);
        tree.get(strong).update(0.25, 0.0);

        let root = tree.get(NodeId::ROOT);
        assert!(root.expandable(0.01));
        assert!(root.try_claim_from(NodeState::Expanded));
        assert_eq!(tree.widen_children(NodeId::ROOT, &priors(&values), 0.01), Ok(2));
        assert!(!root.expandable(0.01));

        let moves: Vec<Move> = tree
            .children(NodeId::ROOT)
            .map(|c| tree.get(c).mv())
            .collect();
        assert_eq!(
            moves,
            vec![Move::Play(0), Move::Play(1), Move::Play(2), Move::Play(3)]
        );
        let moved = tree.find_child(NodeId::ROOT, Move::Play(0)).unwrap();
        assert_ne!(moved, strong);
        assert_eq!(tree.get(moved).visits(), 2);
        assert!((tree.get(moved).outcome_mean() - 0.5).abs() < 1e-6);
        assert!((tree.get(moved).score_mean() - 1.0).abs() < 1e-6);
        assert_eq!(tree.children(moved).count(), 2);
    }

    #[test]
    fn test_widen_children_refused_keeps_children() {
        let tree = tree_with_room(3);
        let values = [0.5, 0.3, 0.2];
        assert_eq!(expand(&tree, NodeId::ROOT, &values, 0.4), 1);

        let root = tree.get(NodeId::ROOT);
        assert!(root.try_claim_from(NodeState::Expanded));
        assert_eq!(
            tree.widen_children(NodeId::ROOT, &priors(&values), 0.0),
            Err(ExpandError::OutOfMemory)
        );
        assert_eq!(root.state(), NodeState::Expanded);
        assert_eq!(tree.children(NodeId::ROOT).count(), 1);
        // Not retried until the threshold drops again
        assert!(!root.expandable(0.0));
    }

    #[test]
    fn test_select_child_prefers_prior_when_unvisited() {
        let tree = tree_with_room(100);
        expand(&tree, NodeId::ROOT, &[0.6, 0.3, 0.1], 0.0);
        let config = SearchConfig::default();
        let best = tree.select_child(NodeId::ROOT, &config, true).unwrap();
        assert_eq!(tree.get(best).mv(), Move::Play(0));
    }

    #[test]
    fn test_select_child_follows_value() {
        let tree = tree_with_room(100);
        expand(&tree, NodeId::ROOT, &[0.5, 0.5], 0.0);
        let ids: Vec<NodeId> = tree.children(NodeId::ROOT).collect();
        for _ in 0..10 {
            tree.get(ids[0]).update(0.1, -5.0);
            tree.get(ids[1]).update(0.9, 5.0);
        }
        let config = SearchConfig::default();
        assert_eq!(tree.select_child(NodeId::ROOT, &config, true), Some(ids[1]));

        // Inactive children are never selected
        tree.get(ids[1]).set_active(false);
        assert_eq!(tree.select_child(NodeId::ROOT, &config, true), Some(ids[0]));

        // Invalid children neither
        tree.get(ids[0]).invalidate();
        tree.activate_root_children();
        assert_eq!(tree.select_child(NodeId::ROOT, &config, true), Some(ids[1]));
    }

    #[test]
    fn test_select_child_avoids_expanding() {
        let tree = tree_with_room(100);
        expand(&tree, NodeId::ROOT, &[0.9, 0.1], 0.0);
        let ids: Vec<NodeId> = tree.children(NodeId::ROOT).collect();
        assert!(tree.get(ids[0]).try_claim_expansion());
        let config = SearchConfig::default();
        assert_eq!(tree.select_child(NodeId::ROOT, &config, false), Some(ids[1]));
    }

    #[test]
    fn test_promote_preserves_statistics() {
        let mut tree = tree_with_room(1_000);
        expand(&tree, NodeId::ROOT, &[0.7, 0.3], 0.0);
        let ids: Vec<NodeId> = tree.children(NodeId::ROOT).collect();
        let keep = ids[1];
        expand(&tree, keep, &[0.5, 0.25, 0.25], 0.0);
        let grandchild = tree.children(keep).next().unwrap();
        expand(&tree, grandchild, &[1.0], 0.0);

        for (i, outcome) in [0.2f32, 0.9, 0.4, 0.7].iter().enumerate() {
            tree.get(keep).update(*outcome, i as f32 - 1.5);
        }
        tree.get(grandchild).update(0.35, 2.0);
        tree.get(keep).set_net_eval(0.6, 1.25, 0.7);

        let visits = tree.get(keep).visits();
        let outcome = tree.get(keep).outcome_mean();
        let score = tree.get(keep).score_mean();
        let variance = tree.get(keep).outcome_variance(0.0);
        let grandchild_outcome = tree.get(grandchild).outcome_mean();

        assert_eq!(tree.promote(keep), 0);
        let root = tree.get(NodeId::ROOT);
        assert_eq!(root.visits(), visits);
        assert_eq!(root.outcome_mean(), outcome);
        assert_eq!(root.score_mean(), score);
        assert_eq!(root.outcome_variance(0.0), variance);
        assert_eq!(root.net_score(), 1.25);
        assert_eq!(tree.children(NodeId::ROOT).count(), 3);

        let first = tree.children(NodeId::ROOT).next().unwrap();
        assert_eq!(tree.get(first).outcome_mean(), grandchild_outcome);
        assert_eq!(tree.children(first).count(), 1);

        // root + 3 children + 1 great-grandchild
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.accountant().used(), 5 * NODE_BYTES);
    }

    #[test]
    fn test_fit_to_limit_collapses_root_when_nothing_else_fits() {
        let mut tree = tree_with_room(10);
        expand(&tree, NodeId::ROOT, &[0.5, 0.5], 0.0);
        tree.get(NodeId::ROOT).update(0.8, 1.0);
        tree.accountant().set_limit(NODE_BYTES);
        assert_eq!(tree.fit_to_limit(), 2);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.accountant().used(), NODE_BYTES);

        let root = tree.get(NodeId::ROOT);
        assert_eq!(root.state(), NodeState::Unexpanded);
        assert_eq!(root.visits(), 1);
        assert!((root.outcome_mean() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_fit_to_limit_keeps_principal_variation() {
        let mut tree = tree_with_room(100);
        expand(&tree, NodeId::ROOT, &[0.5, 0.5], 0.0);
        let ids: Vec<NodeId> = tree.children(NodeId::ROOT).collect();
        let (a, b) = (ids[0], ids[1]);
        expand(&tree, a, &[0.6, 0.4], 0.0);
        let a_children: Vec<NodeId> = tree.children(a).collect();
        expand(&tree, a_children[0], &[1.0], 0.0);
        let a11 = tree.children(a_children[0]).next().unwrap();
        expand(&tree, b, &[0.5, 0.3, 0.2], 0.0);
        assert_eq!(tree.len(), 9);

        let visit = |id: NodeId, n: u32| {
            for _ in 0..n {
                tree.get(id).update(0.6, 1.0);
            }
        };
        visit(a, 8);
        visit(b, 2);
        visit(a_children[0], 5);
        visit(a_children[1], 2);
        visit(a11, 3);

        // Room for the root, both children, A's children and one more node
        tree.accountant().set_limit(6 * NODE_BYTES);
        assert_eq!(tree.fit_to_limit(), 3);
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.accountant().used(), 6 * NODE_BYTES);

        // Most visited line survives intact
        let best = |id: NodeId| tree.children(id).max_by_key(|&c| tree.get(c).visits());
        let a = best(NodeId::ROOT).unwrap();
        assert_eq!(tree.get(a).mv(), Move::Play(0));
        assert_eq!(tree.get(a).visits(), 8);
        let a1 = best(a).unwrap();
        assert_eq!(tree.get(a1).visits(), 5);
        let a11 = best(a1).unwrap();
        assert_eq!(tree.get(a11).visits(), 3);

        // The light sibling keeps its statistics but loses its children
        let b = tree.find_child(NodeId::ROOT, Move::Play(1)).unwrap();
        assert_eq!(tree.get(b).visits(), 2);
        assert_eq!(tree.get(b).state(), NodeState::Unexpanded);
        assert_eq!(tree.children(b).count(), 0);
    }

    #[test]
    fn test_drop_releases_memory() {
        let accountant = Arc::new(MemoryAccountant::new(100 * NODE_BYTES));
        {
            let tree = MctsTree::new(Arc::clone(&accountant));
            expand(&tree, NodeId::ROOT, &[0.25; 4], 0.0);
            assert_eq!(accountant.used(), 5 * NODE_BYTES);
        }
        assert_eq!(accountant.used(), 0);
    }

    #[test]
    fn test_allocation_spans_segments() {
        let tree = tree_with_room(3 * SEGMENT_LEN);
        let wide = vec![1.0 / 5000.0; 5000];
        assert_eq!(expand(&tree, NodeId::ROOT, &wide, 0.0), 5000);
        let last = tree.children(NodeId::ROOT).last().unwrap();
        assert_eq!(tree.get(last).mv(), Move::Play(4999));
        assert_eq!(tree.len(), 5001);
    }

    #[test]
    fn test_tree_stats() {
        let tree = tree_with_room(100);
        expand(&tree, NodeId::ROOT, &[0.5, 0.5], 0.0);
        let first = tree.children(NodeId::ROOT).next().unwrap();
        expand(&tree, first, &[0.4, 0.3, 0.3], 0.0);
        tree.get(NodeId::ROOT).update(1.0, 0.0);

        let stats = tree.stats();
        assert_eq!(stats.total_nodes, 6);
        assert_eq!(stats.expanded_nodes, 2);
        assert_eq!(stats.root_visits, 1);
        assert_eq!(stats.max_depth, 2);
        assert!((stats.avg_branching - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_concurrent_expansion_single_winner() {
        let tree = tree_with_room(1_000);
        let created: u32 = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let root = tree.get(NodeId::ROOT);
                        if root.try_claim_expansion() {
                            tree.create_children(NodeId::ROOT, &priors(&[0.5, 0.5]), 0.0)
                                .unwrap()
                        } else {
                            0
                        }
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(created, 2);
        assert_eq!(tree.len(), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_concurrent_updates_are_linearizable(
            per_thread in proptest::collection::vec(1usize..200, 1..6)
        ) {
            let tree = tree_with_room(10);
            let root = tree.get(NodeId::ROOT);
            thread::scope(|s| {
                for &n in &per_thread {
                    s.spawn(move || {
                        for _ in 0..n {
                            root.add_virtual_loss(1);
                            root.update(1.0, 2.0);
                            root.undo_virtual_loss(1);
                        }
                    });
                }
            });
            let total: usize = per_thread.iter().sum();
            prop_assert_eq!(root.visits() as usize, total);
            prop_assert_eq!(root.virtual_loss(), 0);
            prop_assert!((root.outcome_mean() - 1.0).abs() < 1e-6);
            prop_assert!((root.score_mean() - 2.0).abs() < 1e-4);
        }
    }
}
