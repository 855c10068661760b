//! Move and color vocabulary.

use std::fmt;

/// Side to move. Black moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// The other player.
    #[inline]
    pub fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Index usable for per-color arrays (Black = 0, White = 1).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Color::Black => 0,
            Color::White => 1,
        }
    }

    /// Single-letter form used in logs and explanations.
    pub fn letter(self) -> char {
        match self {
            Color::Black => 'B',
            Color::White => 'W',
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => write!(f, "black"),
            Color::White => write!(f, "white"),
        }
    }
}

/// A move: a placement on a board vertex, a pass, or a resignation.
///
/// Vertices are plain indices; their meaning belongs to the rules engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Move {
    Play(u16),
    Pass,
    Resign,
}

impl Move {
    const PASS_BITS: u32 = u32::MAX - 1;
    const RESIGN_BITS: u32 = u32::MAX - 2;

    /// Pack into a `u32` so a move fits in an atomic slot.
    #[inline]
    pub fn to_bits(self) -> u32 {
        match self {
            Move::Play(v) => u32::from(v),
            Move::Pass => Self::PASS_BITS,
            Move::Resign => Self::RESIGN_BITS,
        }
    }

    /// Inverse of [`Move::to_bits`]. Unknown patterns decode as pass.
    #[inline]
    pub fn from_bits(bits: u32) -> Move {
        match bits {
            Self::RESIGN_BITS => Move::Resign,
            b if b <= u32::from(u16::MAX) => Move::Play(b as u16),
            _ => Move::Pass,
        }
    }

    pub fn is_pass(self) -> bool {
        self == Move::Pass
    }

    pub fn is_resign(self) -> bool {
        self == Move::Resign
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Play(v) => write!(f, "#{}", v),
            Move::Pass => write!(f, "pass"),
            Move::Resign => write!(f, "resign"),
        }
    }
}
