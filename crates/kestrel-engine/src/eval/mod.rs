//! Static evaluation.
//!
//! The search only sees the [`Evaluator`] trait, so alternative scoring
//! functions can be plugged in with
//! [`Engine::set_evaluator`](crate::Engine::set_evaluator).

pub mod material;
pub mod phase;
pub mod pst;

use kestrel_core::{Color, Position, Role};

use material::{BISHOP_PAIR, material_value};
use phase::{MAX_PHASE, game_phase};
use pst::pst_value;

/// Scores a position in centipawns from the side to move's perspective.
///
/// Implementations are shared by every search worker, so they must be
/// `Send + Sync` and must not rely on interior mutability for correctness.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, pos: &Position) -> i32;
}

/// Tapered material plus piece-square evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialEvaluator;

/// Small bonus for having the move.
const TEMPO: i32 = 10;

impl Evaluator for MaterialEvaluator {
    fn evaluate(&self, pos: &Position) -> i32 {
        let board = pos.board();
        let mut mg = 0;
        let mut eg = 0;

        for color in Color::ALL {
            let sign = if color == Color::White { 1 } else { -1 };
            let ours = board.by_color(color);
            for role in Role::ALL {
                let (value_mg, value_eg) = material_value(role);
                for sq in ours & board.by_role(role) {
                    let (bonus_mg, bonus_eg) = pst_value(role, color, sq);
                    mg += sign * (value_mg + bonus_mg);
                    eg += sign * (value_eg + bonus_eg);
                }
            }
            if (ours & board.bishops()).count() >= 2 {
                mg += sign * BISHOP_PAIR.0;
                eg += sign * BISHOP_PAIR.1;
            }
        }

        let phase = game_phase(pos);
        let white = (mg * phase + eg * (MAX_PHASE - phase)) / MAX_PHASE;
        let relative = match pos.side_to_move() {
            Color::White => white,
            Color::Black => -white,
        };
        relative + TEMPO
    }
}

#[cfg(test)]
mod tests {
    use kestrel_core::Position;

    use super::{Evaluator, MaterialEvaluator, TEMPO};

    #[test]
    fn starting_position_is_balanced() {
        let score = MaterialEvaluator.evaluate(&Position::startpos());
        assert_eq!(score, TEMPO, "symmetric position should only score the tempo");
    }

    #[test]
    fn extra_queen_is_winning_for_either_side_to_move() {
        let white: Position = "4k3/8/8/8/8/8/8/3QK3 w - - 0 1".parse().unwrap();
        let black: Position = "4k3/8/8/8/8/8/8/3QK3 b - - 0 1".parse().unwrap();
        assert!(MaterialEvaluator.evaluate(&white) > 800);
        assert!(MaterialEvaluator.evaluate(&black) < -800);
    }

    #[test]
    fn mirrored_positions_score_identically() {
        let white: Position = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"
            .parse()
            .unwrap();
        let black: Position = "rnbqkb1r/pppp1ppp/5n2/4p3/4P3/2N5/PPPP1PPP/R1BQKBNR b KQkq - 2 3"
            .parse()
            .unwrap();
        assert_eq!(
            MaterialEvaluator.evaluate(&white),
            MaterialEvaluator.evaluate(&black)
        );
    }
}
