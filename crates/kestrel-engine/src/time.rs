//! Search limits and time management.
//!
//! A [`SearchLimits`] describes the caller's budget. For clock-based games
//! [`compute_limits`] turns the remaining time into a soft deadline (do not
//! start another iteration) and a hard deadline (abort the iteration).

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use kestrel_core::{Color, Position};

use crate::eval::phase::{MAX_PHASE, game_phase};
use crate::search::control::SearchControl;

/// Reserved per move for communication and scheduling delays.
const MOVE_OVERHEAD_MS: u64 = 10;

/// Clock allocation constants for one kind of time control.
struct Allocation {
    /// Expected moves left in an endgame...
    base_moves: u64,
    /// ...plus this many more, scaled by the game phase.
    phase_moves: u64,
    /// Hard deadline never exceeds this share of the usable time.
    hard_share: f64,
    /// Hard deadline never exceeds this multiple of the soft one.
    hard_ratio: f64,
    /// Share of the increment added to the soft deadline.
    increment_share: f64,
}

const SUDDEN_DEATH: Allocation = Allocation {
    base_moves: 18,
    phase_moves: 22,
    hard_share: 0.12,
    hard_ratio: 2.5,
    increment_share: 0.0,
};

const WITH_INCREMENT: Allocation = Allocation {
    base_moves: 15,
    phase_moves: 20,
    hard_share: 0.25,
    hard_ratio: 3.0,
    increment_share: 0.75,
};

/// What the caller allows one search to spend.
///
/// Every field is optional; with none set the search runs to the maximum
/// depth unless cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: Option<u8>,
    pub nodes: Option<u64>,
    /// Stop once a mate in at most this many moves is found.
    pub mate: Option<u32>,
    /// Exact time to spend on this move.
    pub movetime: Option<Duration>,
    pub white_time: Option<Duration>,
    pub black_time: Option<Duration>,
    pub white_increment: Option<Duration>,
    pub black_increment: Option<Duration>,
    pub moves_to_go: Option<u32>,
    /// Ignore every clock field; run until cancelled or a depth or node
    /// limit is hit.
    pub infinite: bool,
}

impl SearchLimits {
    /// Limits that only bound the depth.
    pub fn depth(depth: u8) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }

    /// Limits that only bound the node count.
    pub fn nodes(nodes: u64) -> Self {
        Self {
            nodes: Some(nodes),
            ..Self::default()
        }
    }

    /// Soft and hard deadlines for searching `pos`, or `None` when the
    /// search is not clock-bound.
    ///
    /// Precedence: `infinite`, then `movetime`, then the clock of the side
    /// to move.
    pub fn deadlines(&self, pos: &Position) -> Option<(Duration, Duration)> {
        if self.infinite {
            return None;
        }
        if let Some(movetime) = self.movetime {
            return Some((movetime, movetime));
        }

        let (remaining, increment) = match pos.side_to_move() {
            Color::White => (self.white_time, self.white_increment),
            Color::Black => (self.black_time, self.black_increment),
        };
        let remaining = remaining?;
        Some(compute_limits(
            remaining,
            increment.unwrap_or(Duration::ZERO),
            self.moves_to_go,
            game_phase(pos),
        ))
    }

    /// Build the [`SearchControl`] for one search of `pos`.
    pub fn control<'a>(&self, cancel: &'a AtomicBool, pos: &Position) -> SearchControl<'a> {
        let control = match self.deadlines(pos) {
            Some((soft, hard)) => SearchControl::new_timed(cancel, soft, hard),
            None => SearchControl::new_infinite(cancel),
        };
        control.with_node_limit(self.nodes)
    }
}

/// Soft and hard time limits from the remaining clock.
///
/// Without `moves_to_go` the expected number of remaining moves shrinks with
/// the game `phase` (0 = bare kings, [`MAX_PHASE`] = all pieces): the engine
/// saves time in the opening and spends it in the endgame.
///
/// | Time control | Moves left (phase 24 / 0) | Hard cap | Hard/soft cap | Increment used |
/// |--------------|---------------------------|----------|---------------|----------------|
/// | Sudden death | 40 / 18                   | 12%      | 2.5x          | none           |
/// | Increment    | 35 / 15                   | 25%      | 3.0x          | 75%            |
///
/// Under 10 ms remaining both limits are 1 ms.
pub fn compute_limits(
    remaining: Duration,
    increment: Duration,
    moves_to_go: Option<u32>,
    phase: i32,
) -> (Duration, Duration) {
    let remaining_ms = remaining.as_millis() as u64;
    if remaining_ms < MOVE_OVERHEAD_MS {
        let minimum = Duration::from_millis(1);
        return (minimum, minimum);
    }

    let increment_ms = increment.as_millis() as f64;
    let allocation = if increment_ms > 0.0 {
        &WITH_INCREMENT
    } else {
        &SUDDEN_DEATH
    };

    let usable = ((remaining_ms - MOVE_OVERHEAD_MS) as f64).max(1.0);
    let moves_left = match moves_to_go {
        Some(moves) => u64::from(moves.max(1)),
        None => {
            let phase = phase.clamp(0, MAX_PHASE) as u64;
            allocation.base_moves + allocation.phase_moves * phase / MAX_PHASE as u64
        }
    };

    let soft = usable / moves_left as f64 + increment_ms * allocation.increment_share;
    let hard = (usable * allocation.hard_share).min(soft * allocation.hard_ratio);

    let clamp = |ms: f64| Duration::from_millis(ms.min(usable).max(1.0) as u64);
    (clamp(soft), clamp(hard))
}
