//! Pseudo-legality validation for moves from outside the generator.
//!
//! Transposition-table moves, killers, and counter moves were stored in
//! other positions; before such a move is searched it must be replayed
//! against every constraint the generator enforces. The contract:
//! `is_pseudo_legal(pos, mv)` returns true iff full generation for
//! `pos` would emit `mv`.

use super::attacks;
use super::state::Position;
use super::types::{Bitboard, CastleRooks, CastleSide, Move, MoveList, Piece};

impl Position {
    #[must_use]
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        if mv.is_null() {
            return false;
        }

        let us = self.side_to_move();
        let from = mv.from();
        let to = mv.to();

        let Some((color, piece)) = self.piece_at(from) else {
            return false;
        };
        if color != us {
            return false;
        }

        if mv.is_castle() {
            return self.castle_is_pseudo_legal(mv);
        }

        // Destination must hold an enemy piece exactly for plain and
        // promotion captures; en passant lands on an empty square. The
        // enemy king is never capturable.
        match self.piece_at(to) {
            Some((c, _)) if c == us => return false,
            Some((_, Piece::King)) => return false,
            Some(_) => {
                if !mv.is_capture() || mv.is_en_passant() {
                    return false;
                }
            }
            None => {
                if mv.is_capture() && !mv.is_en_passant() {
                    return false;
                }
            }
        }

        if piece == Piece::Pawn {
            return self.pawn_move_is_pseudo_legal(mv);
        }

        // Non-pawn flag sanity: no pawn-only flags.
        if mv.is_promotion() || mv.is_en_passant() || mv.is_double_push() {
            return false;
        }

        attacks::piece_attacks(piece, us, from, self.occupied()).contains(to)
    }

    fn pawn_move_is_pseudo_legal(&self, mv: Move) -> bool {
        let us = self.side_to_move();
        let from = mv.from();
        let to = mv.to();
        let white = us.is_white();

        // Promotion flag must match arrival on the last rank.
        let last_rank = if white { 7 } else { 0 };
        if (to.rank() == last_rank) != mv.is_promotion() {
            return false;
        }

        if mv.is_en_passant() {
            return self.ep_square() == Some(to)
                && attacks::pawn_attacks(us, from).contains(to);
        }

        if mv.is_capture() {
            return attacks::pawn_attacks(us, from).contains(to);
        }

        let forward = us.forward();
        let Some(one) = from.offset(forward) else {
            return false;
        };
        if !(!self.occupied()).contains(one) {
            return false;
        }

        if mv.is_double_push() {
            if from.relative_rank(white) != 1 {
                return false;
            }
            return one.offset(forward) == Some(to) && !self.occupied().contains(to);
        }

        one == to
    }

    fn castle_is_pseudo_legal(&self, mv: Move) -> bool {
        let us = self.side_to_move();
        let them = !us;
        let side = if mv.is_kingside_castle() {
            CastleSide::King
        } else {
            CastleSide::Queen
        };

        if !self.castling().has(us, side) {
            return false;
        }
        let king_from = self.king_sq(us);
        if mv.from() != king_from {
            return false;
        }
        let rook_from = self.castle_rook_from(us, side);
        if self.piece_at(rook_from) != Some((us, Piece::Rook)) {
            return false;
        }
        let (king_to, rook_to) = CastleRooks::destinations(us, side);
        if mv.to() != king_to {
            return false;
        }

        let movers = Bitboard::from_square(king_from) | Bitboard::from_square(rook_from);
        let others = self.occupied() & !movers;
        let king_path = attacks::between(king_from, king_to) | Bitboard::from_square(king_to);
        let rook_path = attacks::between(rook_from, rook_to) | Bitboard::from_square(rook_to);
        if ((king_path | rook_path) & others).any() {
            return false;
        }

        if self.is_attacked(king_from, them) {
            return false;
        }
        king_path.into_iter().all(|sq| !self.is_attacked(sq, them))
    }
}
