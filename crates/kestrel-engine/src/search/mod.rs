//! Search algorithms, move ordering and shared search tables.

pub mod context;
pub mod control;
pub mod engine;
pub mod history;
pub mod negamax;
pub mod ordering;
pub mod see;
pub mod tt;

use std::time::Duration;

use kestrel_core::Move;

/// Score representing an unreachable upper/lower bound.
pub const INF: i32 = 30_000;

/// Base score for checkmate (adjusted by ply for mate distance).
pub const MATE_SCORE: i32 = 29_000;

/// Scores above this threshold indicate a forced mate.
pub const MATE_THRESHOLD: i32 = 28_000;

/// Maximum search height in plies; also the deepest iteration.
pub const MAX_PLY: usize = 128;

/// Moves to mate encoded in `score`: positive when the side to move mates,
/// negative when it is mated, `None` for ordinary scores.
pub fn mate_in(score: i32) -> Option<i32> {
    if score > MATE_THRESHOLD {
        Some((MATE_SCORE - score + 1) / 2)
    } else if score < -MATE_THRESHOLD {
        Some(-(MATE_SCORE + score) / 2)
    } else {
        None
    }
}

/// Result of a completed search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Principal variation of the deepest completed iteration. Empty only
    /// when the root has no legal moves.
    pub main_line: Vec<Move>,
    /// Depth reached; 0 when no iteration completed.
    pub depth: u8,
    /// Score in centipawns from the side to move's perspective.
    pub score: i32,
    /// Nodes visited by all workers.
    pub nodes: u64,
    pub elapsed: Duration,
}

impl SearchResult {
    /// First move of the main line.
    pub fn best_move(&self) -> Option<Move> {
        self.main_line.first().copied()
    }

    /// Expected reply to the best move.
    pub fn ponder_move(&self) -> Option<Move> {
        self.main_line.get(1).copied()
    }
}

/// Progress report sent after every completed root iteration.
#[derive(Debug, Clone)]
pub struct SearchInfo {
    pub depth: u8,
    pub score: i32,
    pub nodes: u64,
    pub elapsed: Duration,
    /// Transposition table usage in permille.
    pub hashfull: u32,
    pub main_line: Vec<Move>,
}

impl SearchInfo {
    /// Nodes per second so far.
    pub fn nps(&self) -> u64 {
        let micros = self.elapsed.as_micros().max(1);
        (u128::from(self.nodes) * 1_000_000 / micros) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_distance_in_moves() {
        assert_eq!(mate_in(MATE_SCORE - 1), Some(1), "mate on the next ply");
        assert_eq!(mate_in(MATE_SCORE - 3), Some(2));
        assert_eq!(mate_in(-MATE_SCORE), Some(0), "already mated");
        assert_eq!(mate_in(-(MATE_SCORE - 2)), Some(-1));
        assert_eq!(mate_in(250), None);
        assert_eq!(mate_in(-MATE_THRESHOLD), None);
    }

    #[test]
    fn best_and_ponder_moves_follow_main_line() {
        let pos = kestrel_core::Position::startpos();
        let e4 = pos.parse_uci_move("e2e4").unwrap();
        let e5 = pos.make_move(e4).parse_uci_move("e7e5").unwrap();
        let result = SearchResult {
            main_line: vec![e4, e5],
            depth: 2,
            score: 20,
            nodes: 100,
            elapsed: Duration::from_millis(1),
        };
        assert_eq!(result.best_move(), Some(e4));
        assert_eq!(result.ponder_move(), Some(e5));

        let empty = SearchResult {
            main_line: Vec::new(),
            ..result
        };
        assert_eq!(empty.best_move(), None);
        assert_eq!(empty.ponder_move(), None);
    }
}
