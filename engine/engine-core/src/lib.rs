//! Core traits and types for the Keima search engine
//!
//! This crate provides the contracts the search is written against:
//! - `Move`, `Color`: the move vocabulary shared by rules and search
//! - `GameState`: the rules-engine interface (legality, play, scoring, hashing)
//! - `GameError`: rejected moves and finished games

pub mod moves;
pub mod typed;

pub use moves::{Color, Move};
pub use typed::{winner_value, GameError, GameState};
