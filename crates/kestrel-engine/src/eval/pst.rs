//! Piece-square tables.
//!
//! Tables are written the way a board is drawn: the first row is rank 8,
//! from a8 to h8, as seen by White. White squares are mirrored with `sq ^ 56`
//! before lookup; Black squares index the table directly, which gives Black
//! the same view from its own side.

use kestrel_core::{Color, Role, Square};

#[rustfmt::skip]
const PAWN: [i16; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
     60,  60,  60,  60,  60,  60,  60,  60,
     15,  15,  25,  35,  35,  25,  15,  15,
      5,   5,  12,  28,  28,  12,   5,   5,
      0,   0,   5,  22,  22,   5,   0,   0,
      5,  -5,  -8,   2,   2,  -8,  -5,   5,
      5,  10,  10, -20, -20,  10,  10,   5,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const KNIGHT: [i16; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP: [i16; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK: [i16; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
      5,  10,  10,  10,  10,  10,  10,   5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
      0,   0,   0,   5,   5,   0,   0,   0,
];

#[rustfmt::skip]
const QUEEN: [i16; 64] = [
    -20, -10, -10,  -5,  -5, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,   5,   5,   5,   0, -10,
     -5,   0,   5,   5,   5,   5,   0,  -5,
      0,   0,   5,   5,   5,   5,   0,  -5,
    -10,   5,   5,   5,   5,   5,   0, -10,
    -10,   0,   5,   0,   0,   0,   0, -10,
    -20, -10, -10,  -5,  -5, -10, -10, -20,
];

/// Middlegame king: stay behind the pawn shield.
#[rustfmt::skip]
const KING_MG: [i16; 64] = [
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -10, -20, -20, -20, -20, -20, -20, -10,
     20,  20,   0,   0,   0,   0,  20,  20,
     20,  30,  10,   0,   0,  10,  30,  20,
];

/// Endgame king: walk to the centre.
#[rustfmt::skip]
const KING_EG: [i16; 64] = [
    -50, -40, -30, -20, -20, -30, -40, -50,
    -30, -20, -10,   0,   0, -10, -20, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -30,   0,   0,   0,   0, -30, -30,
    -50, -30, -30, -30, -30, -30, -30, -50,
];

/// Middlegame and endgame bonus for `role` of `color` standing on `sq`.
pub fn pst_value(role: Role, color: Color, sq: Square) -> (i32, i32) {
    let index = match color {
        Color::White => usize::from(sq) ^ 56,
        Color::Black => usize::from(sq),
    };
    let flat = |table: &[i16; 64]| {
        let v = i32::from(table[index]);
        (v, v)
    };
    match role {
        Role::Pawn => flat(&PAWN),
        Role::Knight => flat(&KNIGHT),
        Role::Bishop => flat(&BISHOP),
        Role::Rook => flat(&ROOK),
        Role::Queen => flat(&QUEEN),
        Role::King => (i32::from(KING_MG[index]), i32::from(KING_EG[index])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_mirrored_between_colors() {
        for role in Role::ALL {
            for sq in [Square::E2, Square::G1, Square::D4, Square::A7] {
                let white = pst_value(role, Color::White, sq);
                let black = pst_value(role, Color::Black, sq.flip_vertical());
                assert_eq!(white, black, "{role:?} on {sq} should mirror");
            }
        }
    }

    #[test]
    fn central_knight_beats_rim_knight() {
        let centre = pst_value(Role::Knight, Color::White, Square::E4).0;
        let rim = pst_value(Role::Knight, Color::White, Square::A4).0;
        assert!(centre > rim);
    }

    #[test]
    fn king_prefers_shelter_then_centre() {
        let castled = pst_value(Role::King, Color::White, Square::G1);
        let central = pst_value(Role::King, Color::White, Square::E4);
        assert!(castled.0 > central.0, "middlegame king belongs behind pawns");
        assert!(central.1 > castled.1, "endgame king belongs in the centre");
    }
}
