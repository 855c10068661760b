//! Clock tracking and per-move time budgets.
//!
//! Supports absolute main time followed by byo-yomi, either Canadian (a
//! number of stones per period) or Japanese (a number of fixed periods).
//! The per-move budget spreads the remaining time over the moves still
//! expected in the game, thinking less in the opening.

use engine_core::Color;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How aggressively the search manages its clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeManagement {
    /// `NoPruning` with root noise, `On` otherwise.
    Auto,
    /// Use the whole budget; no early exit.
    Off,
    /// Exit early when the leader cannot be caught, unless time can be banked
    /// and no playout limit is set.
    On,
    /// Always exit early when the leader cannot be caught.
    Fast,
    /// Exit early, but never deactivate root candidates while searching.
    NoPruning,
}

impl TimeManagement {
    /// Resolve `Auto` for a search with or without root noise.
    pub fn resolve(self, noise: bool) -> Self {
        match self {
            TimeManagement::Auto if noise => TimeManagement::NoPruning,
            TimeManagement::Auto => TimeManagement::On,
            other => other,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown time management mode '{0}' (expected auto, off, on, fast or no_pruning)")]
pub struct ParseTimeManagementError(pub String);

impl FromStr for TimeManagement {
    type Err = ParseTimeManagementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(TimeManagement::Auto),
            "off" => Ok(TimeManagement::Off),
            "on" => Ok(TimeManagement::On),
            "fast" => Ok(TimeManagement::Fast),
            "no_pruning" | "nopruning" => Ok(TimeManagement::NoPruning),
            _ => Err(ParseTimeManagementError(s.to_string())),
        }
    }
}

/// Game clock for both players.
#[derive(Debug, Clone)]
pub struct TimeControl {
    main_time: Duration,
    byo_time: Duration,
    byo_stones: u32,
    byo_periods: u32,

    remaining: [Duration; 2],
    stones_left: [u32; 2],
    periods_left: [u32; 2],
    in_byo: [bool; 2],
    started: [Option<Instant>; 2],
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl TimeControl {
    /// Main time plus byo-yomi. `byo_stones` > 0 selects Canadian overtime,
    /// otherwise `byo_periods` > 0 selects Japanese overtime.
    pub fn new(main_time: Duration, byo_time: Duration, byo_stones: u32, byo_periods: u32) -> Self {
        let mut tc = Self {
            main_time,
            byo_time,
            byo_stones,
            byo_periods,
            remaining: [Duration::ZERO; 2],
            stones_left: [0; 2],
            periods_left: [0; 2],
            in_byo: [false; 2],
            started: [None; 2],
        };
        tc.reset_clocks();
        tc
    }

    /// No time limit.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0, 0)
    }

    /// No main time nor byo-yomi, or byo-yomi with neither stones nor periods.
    pub fn is_infinite(&self) -> bool {
        (self.main_time.is_zero() && self.byo_time.is_zero())
            || (!self.byo_time.is_zero() && self.byo_stones == 0 && self.byo_periods == 0)
    }

    /// Restore both clocks to the initial settings.
    pub fn reset_clocks(&mut self) {
        self.remaining = [self.main_time; 2];
        self.stones_left = [self.byo_stones; 2];
        self.periods_left = [self.byo_periods; 2];
        self.in_byo = [self.main_time.is_zero(); 2];
        if self.main_time.is_zero() {
            self.remaining = [self.byo_time; 2];
        }
        self.started = [None; 2];
    }

    /// Start `color`'s clock.
    pub fn start(&mut self, color: Color) {
        self.started[color.index()] = Some(Instant::now());
    }

    /// Stop `color`'s clock and charge the time used since [`TimeControl::start`].
    pub fn stop(&mut self, color: Color) -> Duration {
        let c = color.index();
        let elapsed = self.started[c]
            .take()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        self.charge(color, elapsed);
        elapsed
    }

    /// Charge `elapsed` to `color` and handle byo-yomi transitions.
    pub fn charge(&mut self, color: Color, elapsed: Duration) {
        if self.is_infinite() {
            return;
        }
        let c = color.index();
        let exhausted = elapsed >= self.remaining[c];
        self.remaining[c] = self.remaining[c].saturating_sub(elapsed);

        if self.in_byo[c] {
            if self.byo_stones > 0 {
                self.stones_left[c] = self.stones_left[c].saturating_sub(1);
            } else if self.byo_periods > 0 && elapsed > self.byo_time {
                self.periods_left[c] = self.periods_left[c].saturating_sub(1);
            }
        }

        if !self.in_byo[c] && exhausted {
            // Main time used up: enter byo-yomi.
            self.remaining[c] = self.byo_time;
            self.stones_left[c] = self.byo_stones;
            self.periods_left[c] = self.byo_periods;
            self.in_byo[c] = true;
        } else if self.in_byo[c] && self.byo_stones > 0 && self.stones_left[c] == 0 {
            // Canadian period completed: new period.
            self.remaining[c] = self.byo_time;
            self.stones_left[c] = self.byo_stones;
        } else if self.in_byo[c] && self.byo_periods > 0 {
            self.remaining[c] = self.byo_time;
        }
    }

    /// Set the clock from an external source (e.g. a `time_left` command).
    ///
    /// `stones` is only meaningful in byo-yomi; a report of zero time and
    /// zero stones means main time just ran out.
    pub fn adjust_time(&mut self, color: Color, remaining: Duration, stones: u32) {
        let c = color.index();
        self.remaining[c] = remaining;
        if remaining.is_zero() && stones == 0 {
            self.in_byo[c] = true;
            self.remaining[c] = self.byo_time;
            self.stones_left[c] = self.byo_stones;
            self.periods_left[c] = self.byo_periods;
            return;
        }
        if stones > 0 {
            self.in_byo[c] = true;
        }
        if self.in_byo[c] {
            if self.byo_stones > 0 {
                self.stones_left[c] = stones;
            } else if self.byo_periods > 0 {
                self.periods_left[c] = stones;
            }
        }
    }

    /// Moves the player is still expected to make; generous in the opening.
    pub fn moves_expected(board_cells: usize, move_number: usize, managed: bool) -> usize {
        let board_div = if managed { 9 } else { 5 };
        let base_remaining = board_cells / board_div;
        let fast_moves = board_cells / 6;
        if move_number < fast_moves {
            base_remaining + fast_moves - move_number
        } else {
            base_remaining
        }
    }

    /// Time budget for `color`'s next move; None when the clock is unlimited.
    pub fn max_time_for_move(
        &self,
        board_cells: usize,
        color: Color,
        move_number: usize,
        lag_buffer: Duration,
        managed: bool,
    ) -> Option<Duration> {
        if self.is_infinite() {
            return None;
        }
        let c = color.index();
        let mut time_remaining = self.remaining[c];
        let mut moves_remaining = Self::moves_expected(board_cells, move_number, managed);
        let mut extra_per_move = Duration::ZERO;

        if !self.byo_time.is_zero() {
            if self.in_byo[c] {
                if self.byo_stones > 0 {
                    moves_remaining = self.stones_left[c] as usize;
                } else {
                    time_remaining = Duration::ZERO;
                    extra_per_move = self.byo_time;
                }
            } else if self.byo_stones > 0 {
                let byo_extra = self.byo_time / self.byo_stones;
                time_remaining += byo_extra;
                extra_per_move = byo_extra;
            } else {
                let byo_extra = self.byo_time * self.periods_left[c].saturating_sub(1);
                time_remaining += byo_extra;
                extra_per_move = self.byo_time;
            }
        }

        let base = time_remaining.saturating_sub(lag_buffer) / moves_remaining.max(1) as u32;
        let increment = extra_per_move.saturating_sub(lag_buffer);
        Some(base + increment)
    }

    /// Whether time saved on this move carries over to later moves.
    pub fn can_accumulate_time(&self, color: Color) -> bool {
        let c = color.index();
        if self.in_byo[c] {
            if self.byo_periods > 0 && self.byo_stones == 0 {
                return false;
            }
            if self.byo_stones > 0 && self.stones_left[c] == 1 {
                return false;
            }
        }
        true
    }

    pub fn remaining(&self, color: Color) -> Duration {
        self.remaining[color.index()]
    }

    pub fn in_byoyomi(&self, color: Color) -> bool {
        self.in_byo[color.index()]
    }

    pub fn stones_left(&self, color: Color) -> u32 {
        self.stones_left[color.index()]
    }

    pub fn periods_left(&self, color: Color) -> u32 {
        self.periods_left[color.index()]
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            return write!(f, "unlimited");
        }
        for (i, color) in [Color::Black, Color::White].into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let secs = self.remaining(color).as_secs();
            write!(f, "{} {:02}:{:02}:{:02}", color, secs / 3600, secs / 60 % 60, secs % 60)?;
            if self.in_byoyomi(color) {
                if self.byo_stones > 0 {
                    write!(f, " ({} stones)", self.stones_left(color))?;
                } else {
                    write!(f, " ({} periods)", self.periods_left(color))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAG: Duration = Duration::from_secs(1);

    #[test]
    fn test_unlimited() {
        let tc = TimeControl::unlimited();
        assert!(tc.is_infinite());
        assert_eq!(tc.max_time_for_move(81, Color::Black, 0, LAG, true), None);
        // byo-yomi without stones or periods also means no limit
        let tc = TimeControl::new(Duration::from_secs(60), Duration::from_secs(30), 0, 0);
        assert!(tc.is_infinite());
    }

    #[test]
    fn test_moves_expected_by_phase() {
        // 9x9, managed: 81/9 = 9 base, 81/6 = 13 fast moves
        assert_eq!(TimeControl::moves_expected(81, 0, true), 22);
        assert_eq!(TimeControl::moves_expected(81, 10, true), 12);
        assert_eq!(TimeControl::moves_expected(81, 40, true), 9);
        assert_eq!(TimeControl::moves_expected(81, 40, false), 16);
    }

    #[test]
    fn test_absolute_time_budget() {
        let tc = TimeControl::new(Duration::from_secs(221), Duration::ZERO, 0, 0);
        let budget = tc.max_time_for_move(81, Color::Black, 40, LAG, true).unwrap();
        // (221 - 1) / 9 moves
        assert_eq!(budget.as_millis(), 220_000 / 9);
        let opening = tc.max_time_for_move(81, Color::Black, 0, LAG, true).unwrap();
        assert!(opening < budget);
    }

    #[test]
    fn test_canadian_byoyomi_transitions() {
        let mut tc = TimeControl::new(
            Duration::from_secs(10),
            Duration::from_secs(60),
            5,
            0,
        );
        assert!(!tc.in_byoyomi(Color::White));

        tc.charge(Color::White, Duration::from_secs(12));
        assert!(tc.in_byoyomi(Color::White));
        assert_eq!(tc.remaining(Color::White), Duration::from_secs(60));
        assert_eq!(tc.stones_left(Color::White), 5);

        // Budget is the period split over the remaining stones
        let budget = tc.max_time_for_move(81, Color::White, 50, LAG, true).unwrap();
        assert_eq!(budget, Duration::from_secs(59) / 5);

        for _ in 0..4 {
            tc.charge(Color::White, Duration::from_secs(5));
        }
        assert_eq!(tc.stones_left(Color::White), 1);
        assert!(!tc.can_accumulate_time(Color::White));

        // Last stone of the period: fresh period afterwards
        tc.charge(Color::White, Duration::from_secs(5));
        assert_eq!(tc.stones_left(Color::White), 5);
        assert_eq!(tc.remaining(Color::White), Duration::from_secs(60));

        // Black untouched
        assert_eq!(tc.remaining(Color::Black), Duration::from_secs(10));
    }

    #[test]
    fn test_japanese_byoyomi_periods() {
        let mut tc = TimeControl::new(Duration::ZERO, Duration::from_secs(30), 0, 3);
        assert!(tc.in_byoyomi(Color::Black));
        assert!(!tc.can_accumulate_time(Color::Black));

        let budget = tc.max_time_for_move(81, Color::Black, 0, LAG, true).unwrap();
        assert_eq!(budget, Duration::from_secs(29));

        tc.charge(Color::Black, Duration::from_secs(31));
        assert_eq!(tc.periods_left(Color::Black), 2);
        assert_eq!(tc.remaining(Color::Black), Duration::from_secs(30));

        tc.charge(Color::Black, Duration::from_secs(10));
        assert_eq!(tc.periods_left(Color::Black), 2);
    }

    #[test]
    fn test_adjust_time() {
        let mut tc = TimeControl::new(
            Duration::from_secs(300),
            Duration::from_secs(30),
            10,
            0,
        );
        tc.adjust_time(Color::Black, Duration::from_secs(100), 0);
        assert_eq!(tc.remaining(Color::Black), Duration::from_secs(100));
        assert!(!tc.in_byoyomi(Color::Black));

        tc.adjust_time(Color::Black, Duration::from_secs(25), 4);
        assert!(tc.in_byoyomi(Color::Black));
        assert_eq!(tc.stones_left(Color::Black), 4);

        tc.adjust_time(Color::White, Duration::ZERO, 0);
        assert!(tc.in_byoyomi(Color::White));
        assert_eq!(tc.remaining(Color::White), Duration::from_secs(30));
        assert_eq!(tc.stones_left(Color::White), 10);
    }

    #[test]
    fn test_start_stop_charges_clock() {
        let mut tc = TimeControl::new(Duration::from_secs(100), Duration::ZERO, 0, 0);
        tc.start(Color::Black);
        let used = tc.stop(Color::Black);
        assert!(tc.remaining(Color::Black) <= Duration::from_secs(100) - used);
        // Stopping without a start charges nothing
        assert_eq!(tc.stop(Color::White), Duration::ZERO);
    }

    #[test]
    fn test_time_management_parse_and_resolve() {
        assert_eq!("fast".parse::<TimeManagement>(), Ok(TimeManagement::Fast));
        assert_eq!("NO_PRUNING".parse(), Ok(TimeManagement::NoPruning));
        assert!("sometimes".parse::<TimeManagement>().is_err());
        assert_eq!(TimeManagement::Auto.resolve(true), TimeManagement::NoPruning);
        assert_eq!(TimeManagement::Auto.resolve(false), TimeManagement::On);
        assert_eq!(TimeManagement::Off.resolve(true), TimeManagement::Off);
    }

    #[test]
    fn test_display() {
        let tc = TimeControl::new(Duration::from_secs(3_725), Duration::ZERO, 0, 0);
        assert_eq!(tc.to_string(), "black 01:02:05, white 01:02:05");
        assert_eq!(TimeControl::unlimited().to_string(), "unlimited");
    }
}
