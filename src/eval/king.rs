//! King safety: piece-weighted attacks on the king ring plus file
//! shelter. Danger only kicks in once at least two attackers converge,
//! and then grows quadratically with the accumulated attack units.

use crate::board::{attacks, Bitboard, Color, Piece, Position};

use super::tables::{
    KING_ATTACKERS_MIN, KING_ATTACK_WEIGHT, KING_DANGER_DIVISOR, KING_DANGER_MAX,
    KING_OPEN_FILE, KING_SEMI_OPEN_FILE, S,
};

/// King danger for `color`'s king, returned as a penalty (≤ 0) from
/// `color`'s perspective.
#[must_use]
pub fn king_safety(pos: &Position, color: Color) -> S {
    let us = color;
    let them = !us;
    let king = pos.king_sq(us);
    let ring = attacks::king_attacks(king) | Bitboard::from_square(king);
    let occupied = pos.occupied();

    let mut units = 0i32;
    let mut attackers = 0u32;

    for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
        for sq in pos.pieces(them, piece) {
            let reach = attacks::piece_attacks(piece, them, sq, occupied);
            let hits = (reach & ring).count() as i32;
            if hits > 0 {
                attackers += 1;
                units += KING_ATTACK_WEIGHT[piece.index()] * hits;
            }
        }
    }

    let mut mg_penalty = 0;
    if attackers >= KING_ATTACKERS_MIN {
        mg_penalty = (units * units / KING_DANGER_DIVISOR).min(KING_DANGER_MAX);
    }

    // Shelter files: the king's file and its neighbors. A file without
    // own pawns is semi-open toward the king; without any pawns, open.
    let own_pawns = pos.pieces(us, Piece::Pawn);
    let their_pawns = pos.pieces(them, Piece::Pawn);
    let kf = king.file();
    for file in kf.saturating_sub(1)..=(kf + 1).min(7) {
        let file_bb = Bitboard::file(file);
        if (file_bb & own_pawns).is_empty() {
            if (file_bb & their_pawns).is_empty() {
                mg_penalty += KING_OPEN_FILE;
            } else {
                mg_penalty += KING_SEMI_OPEN_FILE;
            }
        }
    }

    S(-mg_penalty, -mg_penalty / 4)
}
