//! Compact move encoding, bit-packed into a u32.

use std::fmt;

use shakmaty::{File, Role, Square};

const FROM_MASK: u32 = 0x3F;
const TO_SHIFT: u32 = 6;
const ROLE_SHIFT: u32 = 12;
const CAPTURE_SHIFT: u32 = 15;
const PROMOTION_SHIFT: u32 = 18;
const ROLE_MASK: u32 = 0x7;
const EN_PASSANT_FLAG: u32 = 1 << 21;
const CASTLE_FLAG: u32 = 1 << 22;

/// A chess move encoded in 32 bits.
///
/// ```text
/// bits  0-5:  from square        (0-63)
/// bits  6-11: to square          (0-63, king destination for castling)
/// bits 12-14: moving role        (Pawn=1 .. King=6)
/// bits 15-17: captured role      (0 = none)
/// bits 18-20: promotion role     (0 = none)
/// bit  21:    en passant
/// bit  22:    castling
/// ```
///
/// Moves carry enough context to be scored without consulting the board,
/// and compare equal only when every field agrees.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Move(u32);

const fn role_bits(role: Role) -> u32 {
    role as u32
}

const fn role_from_bits(bits: u32) -> Option<Role> {
    match bits {
        1 => Some(Role::Pawn),
        2 => Some(Role::Knight),
        3 => Some(Role::Bishop),
        4 => Some(Role::Rook),
        5 => Some(Role::Queen),
        6 => Some(Role::King),
        _ => None,
    }
}

const fn optional_role_bits(role: Option<Role>) -> u32 {
    match role {
        Some(role) => role_bits(role),
        None => 0,
    }
}

impl Move {
    /// The empty move. Never legal; used as the "no move" sentinel.
    pub const EMPTY: Move = Move(0);

    /// Pack a plain (quiet, capture or promotion) move.
    pub const fn new(
        from: Square,
        to: Square,
        role: Role,
        capture: Option<Role>,
        promotion: Option<Role>,
    ) -> Move {
        Move(
            (from as u32)
                | ((to as u32) << TO_SHIFT)
                | (role_bits(role) << ROLE_SHIFT)
                | (optional_role_bits(capture) << CAPTURE_SHIFT)
                | (optional_role_bits(promotion) << PROMOTION_SHIFT),
        )
    }

    /// Pack an en passant capture.
    pub const fn en_passant(from: Square, to: Square) -> Move {
        Move(Move::new(from, to, Role::Pawn, Some(Role::Pawn), None).0 | EN_PASSANT_FLAG)
    }

    /// Pack a castling move from the king's origin and destination squares.
    pub const fn castle(king_from: Square, king_to: Square) -> Move {
        Move(Move::new(king_from, king_to, Role::King, None, None).0 | CASTLE_FLAG)
    }

    /// Raw bit pattern, as stored in the transposition table.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Rebuild a move from [`raw`](Self::raw) bits.
    pub const fn from_raw(raw: u32) -> Move {
        Move(raw)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn from(self) -> Square {
        Square::new(self.0 & FROM_MASK)
    }

    pub const fn to(self) -> Square {
        Square::new((self.0 >> TO_SHIFT) & FROM_MASK)
    }

    /// The moving piece. The empty move reads as a pawn.
    pub const fn role(self) -> Role {
        match role_from_bits((self.0 >> ROLE_SHIFT) & ROLE_MASK) {
            Some(role) => role,
            None => Role::Pawn,
        }
    }

    /// The captured piece, if any. En passant reports a pawn.
    pub const fn capture(self) -> Option<Role> {
        role_from_bits((self.0 >> CAPTURE_SHIFT) & ROLE_MASK)
    }

    pub const fn promotion(self) -> Option<Role> {
        role_from_bits((self.0 >> PROMOTION_SHIFT) & ROLE_MASK)
    }

    pub const fn is_capture(self) -> bool {
        self.capture().is_some()
    }

    pub const fn is_promotion(self) -> bool {
        self.promotion().is_some()
    }

    pub const fn is_en_passant(self) -> bool {
        self.0 & EN_PASSANT_FLAG != 0
    }

    pub const fn is_castle(self) -> bool {
        self.0 & CASTLE_FLAG != 0
    }

    /// Captures and promotions: the moves quiescence search looks at.
    pub const fn is_tactical(self) -> bool {
        self.is_capture() || self.is_promotion()
    }

    /// Neither a capture nor a promotion.
    pub const fn is_quiet(self) -> bool {
        !self.is_tactical()
    }

    /// Resets the fifty-move counter.
    pub const fn is_zeroing(self) -> bool {
        self.is_capture() || matches!(self.role(), Role::Pawn)
    }

    /// Convert from the board library's move type.
    ///
    /// Returns [`Move::EMPTY`] for drops, which standard chess never produces.
    pub fn from_shakmaty(m: &shakmaty::Move) -> Move {
        match *m {
            shakmaty::Move::Normal {
                role,
                from,
                capture,
                to,
                promotion,
            } => Move::new(from, to, role, capture, promotion),
            shakmaty::Move::EnPassant { from, to } => Move::en_passant(from, to),
            shakmaty::Move::Castle { king, rook } => {
                let file = if rook > king { File::G } else { File::C };
                Move::castle(king, Square::from_coords(file, king.rank()))
            }
            shakmaty::Move::Put { .. } => Move::EMPTY,
        }
    }

    /// Convert back into the board library's move type.
    pub fn to_shakmaty(self) -> shakmaty::Move {
        let from = self.from();
        let to = self.to();
        if self.is_castle() {
            let file = if to > from { File::H } else { File::A };
            shakmaty::Move::Castle {
                king: from,
                rook: Square::from_coords(file, from.rank()),
            }
        } else if self.is_en_passant() {
            shakmaty::Move::EnPassant { from, to }
        } else {
            shakmaty::Move::Normal {
                role: self.role(),
                from,
                capture: self.capture(),
                to,
                promotion: self.promotion(),
            }
        }
    }
}

impl fmt::Display for Move {
    /// UCI long algebraic notation (`e2e4`, `e7e8q`, `e1g1`), `0000` when empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("0000");
        }
        write!(f, "{}{}", self.from(), self.to())?;
        if let Some(promotion) = self.promotion() {
            write!(f, "{}", promotion.char())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({self})")
    }
}
