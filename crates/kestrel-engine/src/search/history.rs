//! History heuristic for quiet move ordering.
//!
//! One table is shared by every search worker. Entries are plain relaxed
//! atomics updated with load-then-store, so concurrent updates to the same
//! entry can be lost; the heuristic tolerates that.

use std::sync::atomic::{AtomicI32, Ordering};

use kestrel_core::{Color, Move};

/// Maximum absolute value of a history score.
pub const HISTORY_MAX: i32 = 16_384;

const SQUARES: usize = 64;

/// History scores indexed by `[side][from][to]`.
pub struct HistoryTable {
    table: Box<[AtomicI32]>,
}

fn index(side: Color, mv: Move) -> usize {
    (usize::from(side) * SQUARES + usize::from(mv.from())) * SQUARES + usize::from(mv.to())
}

impl HistoryTable {
    /// Create a zeroed table.
    pub fn new() -> Self {
        Self {
            table: (0..2 * SQUARES * SQUARES).map(|_| AtomicI32::new(0)).collect(),
        }
    }

    /// Score of a quiet move for `side`.
    pub fn score(&self, side: Color, mv: Move) -> i32 {
        self.table[index(side, mv)].load(Ordering::Relaxed)
    }

    /// Reward a quiet move that caused a beta cutoff.
    pub fn reward(&self, side: Color, mv: Move, depth: i32) {
        self.adjust(side, mv, depth * depth);
    }

    /// Penalise a quiet move searched before the cutoff move.
    pub fn penalize(&self, side: Color, mv: Move, depth: i32) {
        self.adjust(side, mv, -depth * depth);
    }

    fn adjust(&self, side: Color, mv: Move, delta: i32) {
        let entry = &self.table[index(side, mv)];
        let value = (entry.load(Ordering::Relaxed) + delta).clamp(-HISTORY_MAX, HISTORY_MAX);
        entry.store(value, Ordering::Relaxed);
    }

    /// Reset every score. Called once at the start of each search.
    pub fn clear(&self) {
        for entry in self.table.iter() {
            entry.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HistoryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryTable")
            .field("entries", &self.table.len())
            .finish()
    }
}
