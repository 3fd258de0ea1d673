//! Game phase from remaining non-pawn material.

use kestrel_core::{Color, Position, Role};

/// Phase of a full set of pieces.
///
/// Weights: Knight=1, Bishop=1, Rook=2, Queen=4, so the starting position
/// totals 4 + 4 + 8 + 8 = 24.
pub const MAX_PHASE: i32 = 24;

const PHASE_WEIGHTS: [(Role, i32); 4] = [
    (Role::Knight, 1),
    (Role::Bishop, 1),
    (Role::Rook, 2),
    (Role::Queen, 4),
];

/// Game phase in `0..=MAX_PHASE`: [`MAX_PHASE`] is a full middlegame,
/// 0 a king-and-pawn ending. Promotions cannot push it past the maximum.
pub fn game_phase(pos: &Position) -> i32 {
    let phase: i32 = PHASE_WEIGHTS
        .iter()
        .map(|&(role, weight)| {
            let count = pos.count(Color::White, role) + pos.count(Color::Black, role);
            count as i32 * weight
        })
        .sum();
    phase.min(MAX_PHASE)
}
