//! Concurrent Monte Carlo Tree Search for two-player board games.
//!
//! This crate is game-agnostic: it searches any position implementing the
//! `engine-core` [`GameState`](engine_core::GameState) trait, scoring leaves
//! with a pluggable [`Evaluator`] that returns move priors, a winrate and an
//! expected score margin.
//!
//! # Overview
//!
//! A [`Search`] keeps one shared tree that several threads explore at once:
//!
//! 1. **Selection**: descend by PUCT with first-play urgency; virtual loss
//!    steers concurrent workers apart
//! 2. **Expansion**: one CAS claims a leaf; children are allocated as one
//!    block from a lock-free arena, charged to a [`MemoryAccountant`]
//! 3. **Evaluation**: evaluator output is memoized by position hash in an
//!    [`EvalCache`]; finished games are scored by the rules alone
//! 4. **Backup**: outcome and score are added along the path, flipping
//!    perspective at every ply
//!
//! Values blend the two coordinate systems:
//! `(1 - lambda) * outcome + lambda * sigmoid(beta * (score - mu))`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use games_go::GoState;
//! use mcts::{PassFlags, Search, SearchConfig, UniformEvaluator};
//!
//! let position = GoState::new(9, 7.0);
//! let config = SearchConfig::for_testing().with_playouts(400);
//! let mut search = Search::new(config, UniformEvaluator::new(), position)?;
//!
//! let mv = search.think(search.position().to_move(), PassFlags::NORMAL);
//! println!("{}", search.explain_last_decision());
//! search.play_move(mv)?;
//! ```
//!
//! # Stopping
//!
//! A session ends on the first of: playout or visit limit, the time budget
//! from [`TimeControl`], a stopping move reaching its visit target, an
//! external [`SearchHandle::stop`], or (with time management on) the leader
//! becoming impossible to catch.

pub mod cache;
pub mod config;
pub mod decision;
pub mod evaluator;
pub mod memory;
pub mod node;
pub mod search;
pub mod time;
pub mod tree;
mod worker;

// Re-export main types
pub use cache::{CacheStats, EvalCache};
pub use config::{MemoryConfig, SearchConfig, UNLIMITED_PLAYOUTS};
pub use decision::{Candidate, MoveRestrictions, PassFlags, Restriction};
pub use evaluator::{Evaluation, Evaluator, EvaluatorError, UniformEvaluator};
pub use memory::{MemoryAccountant, MemoryError, MemoryPlan};
pub use node::{Node, NodeId, NodeState};
pub use search::{Search, SearchError, SearchHandle, SearchState};
pub use time::{TimeControl, TimeManagement};
pub use tree::{ExpandError, MctsTree, TreeStats};
