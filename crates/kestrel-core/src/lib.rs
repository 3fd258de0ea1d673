//! Board collaborator for kestrel: positions, compact moves and parse errors.
//!
//! Legal move generation and attack tables come from `shakmaty`; this crate
//! adds the value semantics and move encoding the search is written against.

mod chess_move;
mod error;
mod position;

pub use chess_move::Move;
pub use error::PositionError;
pub use position::{Position, STARTING_FEN};

pub use shakmaty::{Bitboard, Board, Color, File, Rank, Role, Square, attacks};
