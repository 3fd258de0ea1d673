//! Static Exchange Evaluation (SEE).
//!
//! Resolves the material outcome of the capture sequence on one square when
//! both sides always recapture with their least valuable attacker and may
//! stop whenever continuing would lose material.
//!
//! A piece pinned to its king before the exchange only recaptures along the
//! pin line. Pins opened or closed by the exchange itself, and checks given
//! during it, are not tracked.

use kestrel_core::{Bitboard, Board, Color, Move, Position, Rank, Role, Square, attacks};

/// Exchange values indexed by `Role as usize` (index 0 unused).
const SEE_VALUE: [i32; 7] = [0, 100, 320, 330, 500, 900, 20_000];

/// Longest possible exchange: 32 pieces.
const MAX_EXCHANGE: usize = 32;

/// Exchange value of a piece.
pub const fn piece_value(role: Role) -> i32 {
    SEE_VALUE[role as usize]
}

/// Every piece of either color attacking `sq` through `occupied`.
///
/// Pieces outside `occupied` are excluded, so removing a piece from the
/// occupancy both drops it as an attacker and uncovers sliders behind it.
fn attackers_to(board: &Board, sq: Square, occupied: Bitboard) -> Bitboard {
    let white_pawns = attacks::pawn_attacks(Color::Black, sq) & board.pawns() & board.white();
    let black_pawns = attacks::pawn_attacks(Color::White, sq) & board.pawns() & board.black();
    let attackers = (attacks::knight_attacks(sq) & board.knights())
        | (attacks::king_attacks(sq) & board.kings())
        | (attacks::rook_attacks(sq, occupied) & board.rooks_and_queens())
        | (attacks::bishop_attacks(sq, occupied) & board.bishops_and_queens())
        | white_pawns
        | black_pawns;
    attackers & occupied
}

/// Least valuable piece among `candidates`.
fn least_valuable(board: &Board, candidates: Bitboard) -> Option<(Square, Role)> {
    Role::ALL.into_iter().find_map(|role| {
        (candidates & board.by_role(role))
            .first()
            .map(|sq| (sq, role))
    })
}

/// Pieces of `color` pinned to their king that cannot legally reach `to`.
fn pinned_off_line(board: &Board, color: Color, to: Square) -> Bitboard {
    let Some(king) = board.king_of(color) else {
        return Bitboard::EMPTY;
    };
    let snipers = ((attacks::rook_attacks(king, Bitboard::EMPTY) & board.rooks_and_queens())
        | (attacks::bishop_attacks(king, Bitboard::EMPTY) & board.bishops_and_queens()))
        & board.by_color(!color);

    let mut blocked = Bitboard::EMPTY;
    for sniper in snipers {
        let Some(pinned) = (attacks::between(king, sniper) & board.occupied()).single_square()
        else {
            continue;
        };
        if board.by_color(color).contains(pinned) && !attacks::aligned(king, pinned, to) {
            blocked.add(pinned);
        }
    }
    blocked
}

fn is_promotion_rank(sq: Square) -> bool {
    matches!(sq.rank(), Rank::First | Rank::Eighth)
}

/// What the first capture wins outright: the victim plus any promotion gain.
fn initial_gain(mv: Move) -> i32 {
    let captured = mv.capture().map_or(0, piece_value);
    let promoted = mv
        .promotion()
        .map_or(0, |role| piece_value(role) - piece_value(Role::Pawn));
    captured + promoted
}

/// Value of the piece left standing on the target square after `mv`.
fn standing_value(mv: Move) -> i32 {
    piece_value(mv.promotion().unwrap_or(mv.role()))
}

/// Exact exchange value of `mv` for the side to move.
///
/// Castling and quiet moves are evaluated as the exchange that follows
/// moving the piece to its destination.
pub fn see(pos: &Position, mv: Move) -> i32 {
    if mv.is_castle() {
        return 0;
    }

    let board = pos.board();
    let from = mv.from();
    let to = mv.to();

    let mut occupied = board.occupied().without(from);
    if mv.is_en_passant() {
        occupied = occupied.without(Square::from_coords(to.file(), from.rank()));
    }

    let mut gain = [0i32; MAX_EXCHANGE];
    gain[0] = initial_gain(mv);
    let mut on_square = standing_value(mv);

    let white_pinned = pinned_off_line(board, Color::White, to);
    let black_pinned = pinned_off_line(board, Color::Black, to);

    let mut attackers = attackers_to(board, to, occupied);
    let mut side = !pos.side_to_move();
    let mut depth = 0;

    while depth + 1 < MAX_EXCHANGE {
        let pinned = match side {
            Color::White => white_pinned,
            Color::Black => black_pinned,
        };
        let Some((sq, role)) = least_valuable(board, attackers & board.by_color(side) & !pinned)
        else {
            break;
        };

        let next_occupied = occupied.without(sq);
        let next_attackers = attackers_to(board, to, next_occupied);

        // A king may only recapture onto a square the opponent no longer attacks.
        if role == Role::King && (next_attackers & board.by_color(!side)).any() {
            break;
        }

        depth += 1;
        gain[depth] = on_square - gain[depth - 1];
        on_square = piece_value(role);
        if role == Role::Pawn && is_promotion_rank(to) {
            let bonus = piece_value(Role::Queen) - piece_value(Role::Pawn);
            gain[depth] += bonus;
            on_square = piece_value(Role::Queen);
        }

        occupied = next_occupied;
        attackers = next_attackers;
        side = !side;
    }

    // Each side may decline to continue the exchange.
    while depth > 0 {
        gain[depth - 1] = -(-gain[depth - 1]).max(gain[depth]);
        depth -= 1;
    }
    gain[0]
}

/// Whether the exchange value of `mv` is at least `threshold`.
///
/// Answers from cheap bounds when they settle the question and falls back to
/// the exact [`see`] otherwise.
pub fn see_ge(pos: &Position, mv: Move, threshold: i32) -> bool {
    if mv.is_castle() {
        return threshold <= 0;
    }

    // The opponent can always stop: the result never exceeds the first gain.
    let best_case = initial_gain(mv);
    if best_case < threshold {
        return false;
    }

    // Without promotions in the sequence, losing the moved piece is the worst
    // the opponent can inflict.
    if !is_promotion_rank(mv.to()) && best_case - standing_value(mv) >= threshold {
        return true;
    }

    see(pos, mv) >= threshold
}
