//! Position value type used by the search.
//!
//! Wraps the board library's legal-move generator together with a cached
//! zobrist key, a repetition window and the last move played. Positions are
//! plain values: making a move produces a new position (or overwrites a
//! caller-owned buffer) and never mutates a position another context reads.

use std::fmt;
use std::str::FromStr;

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::zobrist::Zobrist64;
use shakmaty::{Board, CastlingMode, Chess, Color, EnPassantMode, Position as _, Role};

use crate::chess_move::Move;
use crate::error::PositionError;

/// Standard starting position in FEN.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A chess position plus the bookkeeping the search needs.
#[derive(Clone, Debug)]
pub struct Position {
    chess: Chess,
    key: u64,
    /// Plies since the last irreversible move or null move. Repetitions can
    /// only occur inside this window.
    reversible: u32,
    last_move: Move,
}

impl Position {
    /// The standard starting position.
    pub fn startpos() -> Position {
        Position::from_chess(Chess::default())
    }

    /// Parse a position from FEN.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::InvalidFen`] when the string is malformed or
    /// describes an illegal setup.
    pub fn from_fen(fen: &str) -> Result<Position, PositionError> {
        let invalid = |reason: String| PositionError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };
        let parsed = Fen::from_ascii(fen.trim().as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let chess: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Position::from_chess(chess))
    }

    fn from_chess(chess: Chess) -> Position {
        let key = chess.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0;
        let reversible = chess.halfmoves();
        Position {
            chess,
            key,
            reversible,
            last_move: Move::EMPTY,
        }
    }

    /// Zobrist key of this position.
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn side_to_move(&self) -> Color {
        self.chess.turn()
    }

    /// Halfmove clock for the fifty-move rule.
    pub fn halfmove_clock(&self) -> u32 {
        self.chess.halfmoves()
    }

    /// Plies back to the last capture, pawn move or null move.
    pub fn reversible_plies(&self) -> u32 {
        self.reversible
    }

    /// The move that produced this position, or [`Move::EMPTY`].
    pub fn last_move(&self) -> Move {
        self.last_move
    }

    pub fn board(&self) -> &Board {
        self.chess.board()
    }

    pub fn in_check(&self) -> bool {
        self.chess.is_check()
    }

    pub fn is_insufficient_material(&self) -> bool {
        self.chess.is_insufficient_material()
    }

    /// Whether `color` owns anything besides pawns and its king.
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        let board = self.chess.board();
        (board.by_color(color) & !(board.pawns() | board.kings())).any()
    }

    /// Number of pieces of `role` belonging to `color`.
    pub fn count(&self, color: Color, role: Role) -> u32 {
        let board = self.chess.board();
        (board.by_color(color) & board.by_role(role)).count() as u32
    }

    /// Fill `buf` with every legal move, replacing its contents.
    pub fn legal_moves(&self, buf: &mut Vec<Move>) {
        buf.clear();
        buf.extend(self.chess.legal_moves().iter().map(Move::from_shakmaty));
    }

    pub fn has_legal_moves(&self) -> bool {
        !self.chess.legal_moves().is_empty()
    }

    pub fn is_legal(&self, mv: Move) -> bool {
        !mv.is_empty() && self.chess.is_legal(mv.to_shakmaty())
    }

    /// Whether playing `mv` puts the opponent in check.
    pub fn gives_check(&self, mv: Move) -> bool {
        let mut next = self.chess.clone();
        next.play_unchecked(mv.to_shakmaty());
        next.is_check()
    }

    /// Play a legal move and return the resulting position.
    pub fn make_move(&self, mv: Move) -> Position {
        let mut next = self.clone();
        next.play(mv);
        next
    }

    /// Play a legal move into a caller-owned buffer.
    pub fn make_move_into(&self, mv: Move, dst: &mut Position) {
        dst.clone_from(self);
        dst.play(mv);
    }

    fn play(&mut self, mv: Move) {
        debug_assert!(self.is_legal(mv), "illegal move {mv} in {self}");
        let m = mv.to_shakmaty();
        let updated = self
            .chess
            .update_zobrist_hash::<Zobrist64>(Zobrist64(self.key), m, EnPassantMode::Legal);
        self.chess.play_unchecked(m);
        self.key = match updated {
            Some(Zobrist64(key)) => key,
            None => self.chess.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0,
        };
        self.reversible = if mv.is_zeroing() { 0 } else { self.reversible + 1 };
        self.last_move = mv;
    }

    /// Pass the turn into `dst`. Returns `false` (leaving `dst` untouched)
    /// when the side to move is in check.
    pub fn null_move_into(&self, dst: &mut Position) -> bool {
        if self.in_check() {
            return false;
        }
        match self.chess.clone().swap_turn() {
            Ok(chess) => {
                dst.key = chess.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0;
                dst.chess = chess;
                dst.reversible = 0;
                dst.last_move = Move::EMPTY;
                true
            }
            Err(_) => false,
        }
    }

    /// Parse a UCI move string and check it is legal here.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::IllegalMove`] for malformed or illegal moves.
    pub fn parse_uci_move(&self, uci: &str) -> Result<Move, PositionError> {
        uci.parse::<UciMove>()
            .ok()
            .and_then(|u| u.to_move(&self.chess).ok())
            .map(|m| Move::from_shakmaty(&m))
            .ok_or_else(|| PositionError::IllegalMove {
                uci: uci.to_string(),
            })
    }

    /// Parse and play a UCI move.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::IllegalMove`] for malformed or illegal moves.
    pub fn play_uci(&self, uci: &str) -> Result<Position, PositionError> {
        let mv = self.parse_uci_move(uci)?;
        Ok(self.make_move(mv))
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::startpos()
    }
}

impl FromStr for Position {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s)
    }
}

impl fmt::Display for Position {
    /// FEN of the position.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Fen::from_position(&self.chess, EnPassantMode::Legal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_has_twenty_moves() {
        let pos = Position::startpos();
        let mut moves = Vec::new();
        pos.legal_moves(&mut moves);
        assert_eq!(moves.len(), 20);
        assert_eq!(pos.to_string(), STARTING_FEN);
    }

    #[test]
    fn invalid_fen_is_rejected() {
        let err = Position::from_fen("not a fen").unwrap_err();
        assert!(matches!(err, PositionError::InvalidFen { .. }));
    }

    #[test]
    fn incremental_key_matches_fresh_parse() {
        let mut pos = Position::startpos();
        for uci in ["e2e4", "c7c5", "g1f3", "d7d6", "f1b5", "c8d7", "e1g1"] {
            pos = pos.play_uci(uci).unwrap();
        }
        let fresh = Position::from_fen(&pos.to_string()).unwrap();
        assert_eq!(pos.key(), fresh.key(), "incremental key diverged from scratch key");
    }

    #[test]
    fn transposition_reaches_same_key() {
        let a = Position::startpos()
            .play_uci("g1f3")
            .and_then(|p| p.play_uci("g8f6"))
            .and_then(|p| p.play_uci("b1c3"))
            .unwrap();
        let b = Position::startpos()
            .play_uci("b1c3")
            .and_then(|p| p.play_uci("g8f6"))
            .and_then(|p| p.play_uci("g1f3"))
            .unwrap();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn reversible_window_resets_on_pawn_move() {
        let pos = Position::startpos().play_uci("g1f3").unwrap();
        assert_eq!(pos.reversible_plies(), 1);
        let pos = pos.play_uci("e7e5").unwrap();
        assert_eq!(pos.reversible_plies(), 0);
        assert_eq!(pos.last_move().to_string(), "e7e5");
    }

    #[test]
    fn null_move_flips_side_and_key() {
        let pos = Position::startpos();
        let mut dst = Position::startpos();
        assert!(pos.null_move_into(&mut dst));
        assert_eq!(dst.side_to_move(), Color::Black);
        assert_ne!(dst.key(), pos.key());
        assert_eq!(dst.reversible_plies(), 0);
    }

    #[test]
    fn null_move_refused_in_check() {
        let pos: Position = "4k3/8/8/8/8/8/4q3/4K3 w - - 0 1".parse().unwrap();
        let mut dst = Position::startpos();
        assert!(!pos.null_move_into(&mut dst));
    }

    #[test]
    fn illegal_uci_move_is_rejected() {
        let pos = Position::startpos();
        assert!(matches!(
            pos.parse_uci_move("e2e5"),
            Err(PositionError::IllegalMove { .. })
        ));
        assert!(pos.parse_uci_move("garbage").is_err());
    }

    #[test]
    fn gives_check_detects_scholars_mate() {
        let pos: Position = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4"
            .parse()
            .unwrap();
        let mate = pos.parse_uci_move("h5f7").unwrap();
        assert!(pos.gives_check(mate));
        assert!(!pos.make_move(mate).has_legal_moves());
    }

    #[test]
    fn non_pawn_material() {
        let pos: Position = "4k3/pppp4/8/8/8/8/4P3/4K2R w K - 0 1".parse().unwrap();
        assert!(pos.has_non_pawn_material(Color::White));
        assert!(!pos.has_non_pawn_material(Color::Black));
    }
}
