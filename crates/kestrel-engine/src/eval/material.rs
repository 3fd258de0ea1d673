//! Material values.

use kestrel_core::Role;

/// Middlegame and endgame value of a piece.
pub const fn material_value(role: Role) -> (i32, i32) {
    match role {
        Role::Pawn => (100, 120),
        Role::Knight => (320, 310),
        Role::Bishop => (330, 320),
        Role::Rook => (500, 520),
        Role::Queen => (900, 950),
        Role::King => (0, 0),
    }
}

/// Bonus for owning both bishops.
pub const BISHOP_PAIR: (i32, i32) = (40, 55);
