//! Go rules for small boards.
//!
//! A compact rules engine used to drive the search in tests, benchmarks and
//! the self-play actor. It implements:
//! - stone placement with captures and no suicide
//! - positional superko (a placement may not recreate an earlier board)
//! - pass, resignation and the double-pass game end
//! - area scoring (stones plus surrounded territory) with komi
//!
//! Vertices are numbered `row * size + col` with row 0 at the bottom, so
//! `A1` is vertex 0. Column letters skip `I` as in GTP.

use engine_core::{Color, GameError, GameState, Move};
use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::fmt;

/// Largest supported board edge.
pub const MAX_SIZE: usize = 19;

/// Komi used when none is given.
pub const DEFAULT_KOMI: f32 = 7.5;

const COLUMNS: &[u8] = b"ABCDEFGHJKLMNOPQRST";

struct Zobrist {
    stones: Vec<[u64; 2]>,
    black_to_move: u64,
    passes: [u64; 3],
}

static ZOBRIST: Lazy<Zobrist> = Lazy::new(|| {
    let mut rng = ChaCha20Rng::seed_from_u64(0x6b65_696d_61);
    Zobrist {
        stones: (0..MAX_SIZE * MAX_SIZE)
            .map(|_| [rng.gen(), rng.gen()])
            .collect(),
        black_to_move: rng.gen(),
        passes: [rng.gen(), rng.gen(), rng.gen()],
    }
});

/// A Go position.
#[derive(Clone, PartialEq)]
pub struct GoState {
    size: usize,
    board: Vec<Option<Color>>,
    to_move: Color,
    komi: f32,
    passes: u32,
    move_number: usize,
    last_move: Option<Move>,
    stone_hash: u64,
    /// Stone hashes of every board seen so far, for superko.
    history: Vec<u64>,
    resigned: Option<Color>,
    captures: [u32; 2],
}

impl GoState {
    /// Empty board of the given size. Panics if `size` is outside 2..=19.
    pub fn new(size: usize, komi: f32) -> Self {
        assert!(
            (2..=MAX_SIZE).contains(&size),
            "board size {} unsupported",
            size
        );
        Self {
            size,
            board: vec![None; size * size],
            to_move: Color::Black,
            komi,
            passes: 0,
            move_number: 0,
            last_move: None,
            stone_hash: 0,
            history: vec![0],
            resigned: None,
            captures: [0, 0],
        }
    }

    /// Build a position by playing GTP-style moves ("D4", "pass") in order.
    pub fn from_moves(size: usize, komi: f32, moves: &[&str]) -> Result<Self, GameError> {
        let mut state = Self::new(size, komi);
        for text in moves {
            let mv = state.parse_move(text).ok_or(GameError::IllegalMove {
                mv: Move::Pass,
                color: state.to_move,
            })?;
            state.play(mv)?;
        }
        Ok(state)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn komi(&self) -> f32 {
        self.komi
    }

    pub fn stone_at(&self, vertex: usize) -> Option<Color> {
        self.board.get(vertex).copied().flatten()
    }

    /// Stones captured so far by `color`.
    pub fn captures(&self, color: Color) -> u32 {
        self.captures[color.index()]
    }

    pub fn resigned(&self) -> Option<Color> {
        self.resigned
    }

    pub fn vertex(&self, col: usize, row: usize) -> Move {
        Move::Play((row * self.size + col) as u16)
    }

    /// Parse "D4", "pass" or "resign" (case-insensitive).
    pub fn parse_move(&self, text: &str) -> Option<Move> {
        let text = text.trim().to_ascii_uppercase();
        match text.as_str() {
            "PASS" => return Some(Move::Pass),
            "RESIGN" => return Some(Move::Resign),
            _ => {}
        }
        let mut chars = text.chars();
        let letter = chars.next()? as u8;
        let col = COLUMNS[..self.size].iter().position(|&c| c == letter)?;
        let row: usize = chars.as_str().parse().ok()?;
        if row == 0 || row > self.size {
            return None;
        }
        Some(self.vertex(col, row - 1))
    }

    fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> {
        let size = self.size;
        let (row, col) = (v / size, v % size);
        let up = (row + 1 < size).then(|| v + size);
        let down = (row > 0).then(|| v - size);
        let right = (col + 1 < size).then(|| v + 1);
        let left = (col > 0).then(|| v - 1);
        [up, down, right, left].into_iter().flatten()
    }

    /// Stones of the chain through `v` and whether it has any liberty.
    fn chain(&self, board: &[Option<Color>], v: usize) -> (Vec<usize>, bool) {
        let color = board[v];
        let mut seen = vec![false; board.len()];
        let mut stack = vec![v];
        let mut stones = Vec::new();
        let mut has_liberty = false;
        seen[v] = true;
        while let Some(cur) = stack.pop() {
            stones.push(cur);
            for n in self.neighbors(cur) {
                match board[n] {
                    None => has_liberty = true,
                    c if c == color && !seen[n] => {
                        seen[n] = true;
                        stack.push(n);
                    }
                    _ => {}
                }
            }
        }
        (stones, has_liberty)
    }

    /// Board, hash and capture count after placing a stone, or None if the
    /// placement is suicide or repeats an earlier board.
    fn try_place(&self, v: usize) -> Option<(Vec<Option<Color>>, u64, u32)> {
        if self.board[v].is_some() {
            return None;
        }
        let color = self.to_move;
        let enemy = Some(color.opponent());
        let mut board = self.board.clone();
        let mut hash = self.stone_hash ^ ZOBRIST.stones[v][color.index()];
        board[v] = Some(color);

        let mut captured = 0;
        for n in self.neighbors(v) {
            if board[n] != enemy {
                continue;
            }
            let (stones, has_liberty) = self.chain(&board, n);
            if !has_liberty {
                for s in stones {
                    board[s] = None;
                    hash ^= ZOBRIST.stones[s][color.opponent().index()];
                    captured += 1;
                }
            }
        }

        if !self.chain(&board, v).1 {
            return None;
        }
        if self.history.contains(&hash) {
            return None;
        }
        Some((board, hash, captured))
    }

    /// Area score from Black's perspective before komi.
    fn area_balance(&self) -> i32 {
        let mut balance = 0i32;
        let mut seen = vec![false; self.board.len()];
        for v in 0..self.board.len() {
            match self.board[v] {
                Some(Color::Black) => balance += 1,
                Some(Color::White) => balance -= 1,
                None if !seen[v] => {
                    let mut region = 0i32;
                    let mut borders = [false, false];
                    let mut stack = vec![v];
                    seen[v] = true;
                    while let Some(cur) = stack.pop() {
                        region += 1;
                        for n in self.neighbors(cur) {
                            match self.board[n] {
                                Some(c) => borders[c.index()] = true,
                                None if !seen[n] => {
                                    seen[n] = true;
                                    stack.push(n);
                                }
                                None => {}
                            }
                        }
                    }
                    match borders {
                        [true, false] => balance += region,
                        [false, true] => balance -= region,
                        _ => {}
                    }
                }
                None => {}
            }
        }
        balance
    }
}

impl GameState for GoState {
    fn to_move(&self) -> Color {
        self.to_move
    }

    fn set_to_move(&mut self, color: Color) {
        self.to_move = color;
    }

    fn legal_moves(&self) -> Vec<Move> {
        if self.is_terminal() {
            return Vec::new();
        }
        let mut moves: Vec<Move> = (0..self.board.len())
            .filter(|&v| self.try_place(v).is_some())
            .map(|v| Move::Play(v as u16))
            .collect();
        moves.push(Move::Pass);
        moves
    }

    fn is_legal(&self, mv: Move) -> bool {
        if self.is_terminal() {
            return false;
        }
        match mv {
            Move::Pass | Move::Resign => true,
            Move::Play(v) => (v as usize) < self.board.len() && self.try_place(v as usize).is_some(),
        }
    }

    fn play(&mut self, mv: Move) -> Result<(), GameError> {
        if self.is_terminal() {
            return Err(GameError::GameOver);
        }
        match mv {
            Move::Pass => self.passes += 1,
            Move::Resign => self.resigned = Some(self.to_move),
            Move::Play(v) => {
                if v as usize >= self.board.len() {
                    return Err(GameError::OffBoard(v));
                }
                let (board, hash, captured) =
                    self.try_place(v as usize).ok_or(GameError::IllegalMove {
                        mv,
                        color: self.to_move,
                    })?;
                self.board = board;
                self.stone_hash = hash;
                self.history.push(hash);
                self.captures[self.to_move.index()] += captured;
                self.passes = 0;
            }
        }
        self.last_move = Some(mv);
        self.move_number += 1;
        self.to_move = self.to_move.opponent();
        Ok(())
    }

    fn consecutive_passes(&self) -> u32 {
        self.passes
    }

    fn is_terminal(&self) -> bool {
        self.passes >= 2 || self.resigned.is_some()
    }

    fn score(&self) -> f32 {
        let cells = self.board.len() as f32;
        match self.resigned {
            Some(Color::Black) => -(cells + self.komi.abs()),
            Some(Color::White) => cells + self.komi.abs(),
            None => self.area_balance() as f32 - self.komi,
        }
    }

    fn position_hash(&self) -> u64 {
        let mut hash = self.stone_hash ^ ZOBRIST.passes[self.passes.min(2) as usize];
        if self.to_move == Color::Black {
            hash ^= ZOBRIST.black_to_move;
        }
        hash
    }

    fn move_number(&self) -> usize {
        self.move_number
    }

    fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    fn board_cells(&self) -> usize {
        self.board.len()
    }

    fn move_to_text(&self, mv: Move) -> String {
        match mv {
            Move::Pass => "pass".to_string(),
            Move::Resign => "resign".to_string(),
            Move::Play(v) => {
                let v = v as usize;
                let col = COLUMNS.get(v % self.size).copied().unwrap_or(b'?') as char;
                format!("{}{}", col, v / self.size + 1)
            }
        }
    }
}

impl fmt::Debug for GoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoState")
            .field("size", &self.size)
            .field("to_move", &self.to_move)
            .field("move_number", &self.move_number)
            .field("passes", &self.passes)
            .field("hash", &format_args!("{:016x}", self.position_hash()))
            .finish()
    }
}

impl fmt::Display for GoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..self.size).rev() {
            write!(f, "{:>2} ", row + 1)?;
            for col in 0..self.size {
                let c = match self.board[row * self.size + col] {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                write!(f, "{} ", c)?;
            }
            writeln!(f)?;
        }
        write!(f, "   ")?;
        for &c in &COLUMNS[..self.size] {
            write!(f, "{} ", c as char)?;
        }
        writeln!(f)
    }
}
