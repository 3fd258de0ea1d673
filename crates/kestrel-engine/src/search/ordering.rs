//! Staged move iterator and late-move-reduction table.
//!
//! Moves are split once, when the iterator is initialised, into an
//! "important" bucket (hash move, winning or even captures and promotions,
//! killers) and a "remaining" bucket (everything else). The remaining bucket
//! is only scored by history, and sorted, once the important moves run out;
//! a cutoff among the important moves skips that work entirely.

use std::sync::OnceLock;

use kestrel_core::{Color, Move, Position};

use crate::search::history::HistoryTable;
use crate::search::see::{piece_value, see_ge};

/// Score bands inside the important bucket. Every capture outranks both
/// killers; both killers outrank any history score.
const HASH_SCORE: i32 = i32::MAX;
const CAPTURE_BASE: i32 = 1_000_000;
const KILLER_BASE: i32 = 500_000;

/// Gap sequence for sorting; the final gap of 1 leaves the slice fully sorted.
const SORT_GAPS: [usize; 3] = [10, 4, 1];

#[derive(Debug, Clone, Copy)]
struct ScoredMove {
    mv: Move,
    score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Important,
    ScoreRemaining,
    Remaining,
    /// Every legal evasion, unsorted.
    Plain,
    Done,
}

/// MVV/LVA score for a capture or promotion.
fn tactical_score(mv: Move) -> i32 {
    let gained = mv.capture().map_or(0, piece_value) + mv.promotion().map_or(0, piece_value);
    CAPTURE_BASE + 100 * gained - piece_value(mv.role())
}

/// Gap insertion sort, highest score first.
fn sort_descending(moves: &mut [ScoredMove]) {
    for gap in SORT_GAPS {
        for i in gap..moves.len() {
            let item = moves[i];
            let mut j = i;
            while j >= gap && moves[j - gap].score < item.score {
                moves[j] = moves[j - gap];
                j -= gap;
            }
            moves[j] = item;
        }
    }
}

/// Staged, allocation-free (after warm-up) move source for one search node.
#[derive(Debug)]
pub struct MoveIterator {
    legal: Vec<Move>,
    important: Vec<ScoredMove>,
    remaining: Vec<ScoredMove>,
    stage: Stage,
    cursor: usize,
    side: Color,
}

impl MoveIterator {
    pub fn new() -> Self {
        Self {
            legal: Vec::with_capacity(64),
            important: Vec::with_capacity(32),
            remaining: Vec::with_capacity(64),
            stage: Stage::Done,
            cursor: 0,
            side: Color::White,
        }
    }

    fn reset(&mut self, pos: &Position) {
        pos.legal_moves(&mut self.legal);
        self.important.clear();
        self.remaining.clear();
        self.cursor = 0;
        self.side = pos.side_to_move();
    }

    /// Prepare a main-search node.
    ///
    /// `hash_move` is yielded first if it is legal here; killers only count
    /// when they are legal quiet moves in this position.
    pub fn init_moves(&mut self, pos: &Position, hash_move: Move, killers: [Move; 2]) {
        self.reset(pos);
        for &mv in &self.legal {
            let score = if mv == hash_move {
                HASH_SCORE
            } else if mv.is_tactical() {
                if !see_ge(pos, mv, 0) {
                    self.remaining.push(ScoredMove { mv, score: 0 });
                    continue;
                }
                tactical_score(mv)
            } else if mv == killers[0] {
                KILLER_BASE + 1
            } else if mv == killers[1] {
                KILLER_BASE
            } else {
                self.remaining.push(ScoredMove { mv, score: 0 });
                continue;
            };
            self.important.push(ScoredMove { mv, score });
        }
        sort_descending(&mut self.important);
        self.stage = Stage::Important;
    }

    /// Prepare a quiescence node.
    ///
    /// In check every evasion is yielded. Otherwise only captures and
    /// promotions that do not lose material, plus quiet checks when
    /// `generate_checks` is set.
    pub fn init_quiescence_moves(&mut self, pos: &Position, generate_checks: bool) {
        self.reset(pos);
        if pos.in_check() {
            self.stage = Stage::Plain;
            return;
        }
        for &mv in &self.legal {
            if mv.is_tactical() {
                if see_ge(pos, mv, 0) {
                    self.important.push(ScoredMove {
                        mv,
                        score: tactical_score(mv),
                    });
                }
            } else if generate_checks && pos.gives_check(mv) {
                self.remaining.push(ScoredMove { mv, score: 0 });
            }
        }
        sort_descending(&mut self.important);
        self.stage = Stage::Important;
    }

    /// Next move in order, or `None` when exhausted.
    pub fn next_move(&mut self, history: &HistoryTable) -> Option<Move> {
        loop {
            match self.stage {
                Stage::Important => {
                    if let Some(entry) = self.important.get(self.cursor) {
                        self.cursor += 1;
                        return Some(entry.mv);
                    }
                    self.stage = Stage::ScoreRemaining;
                }
                Stage::ScoreRemaining => {
                    for entry in &mut self.remaining {
                        entry.score = history.score(self.side, entry.mv);
                    }
                    sort_descending(&mut self.remaining);
                    self.cursor = 0;
                    self.stage = Stage::Remaining;
                }
                Stage::Remaining => {
                    if let Some(entry) = self.remaining.get(self.cursor) {
                        self.cursor += 1;
                        return Some(entry.mv);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Plain => {
                    if let Some(&mv) = self.legal.get(self.cursor) {
                        self.cursor += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return None,
            }
        }
    }

    /// Sizes of the important and remaining buckets.
    pub fn bucket_sizes(&self) -> (usize, usize) {
        match self.stage {
            Stage::Plain => (0, self.legal.len()),
            _ => (self.important.len(), self.remaining.len()),
        }
    }
}

impl Default for MoveIterator {
    fn default() -> Self {
        Self::new()
    }
}

// ── LMR Table ─────────────────────────────────────────────────────────────────

/// Reductions in plies, indexed by `[depth][move_number]`.
static LMR_TABLE: OnceLock<[[u8; 64]; 64]> = OnceLock::new();

fn lmr_table() -> &'static [[u8; 64]; 64] {
    LMR_TABLE.get_or_init(|| {
        let mut table = [[0u8; 64]; 64];
        for (depth, row) in table.iter_mut().enumerate().skip(1) {
            for (number, cell) in row.iter_mut().enumerate().skip(1) {
                let r = 0.75 + (depth as f64).ln() * (number as f64).ln() / 2.25;
                *cell = r as u8;
            }
        }
        table
    })
}

/// Late move reduction for the `move_number`-th move (1-based) at `depth`.
pub fn lmr_reduction(depth: i32, move_number: usize) -> i32 {
    let depth = depth.clamp(0, 63) as usize;
    i32::from(lmr_table()[depth][move_number.min(63)])
}
