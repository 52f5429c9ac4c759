//! Incremental make/unmake with Zobrist maintenance.

use super::state::{Position, Undo};
use super::types::{CastleRooks, CastleSide, Color, Move, Piece, Square};
use super::zobrist::ZOBRIST;

impl Position {
    /// Play `mv` on the board. The move must be pseudo-legal; legality
    /// (own king left in check) is the caller's concern.
    pub fn make(&mut self, mv: Move) {
        let us = self.side_to_move();
        let them = !us;

        self.undo_stack.push(Undo {
            captured: None,
            castling: self.castling(),
            ep_square: self.ep_square(),
            rule50: self.rule50(),
            key: self.key(),
            pawn_key: self.pawn_key(),
        });

        // Hash out the state components that are about to change.
        *self.key_mut() ^= ZOBRIST.castling_key(self.castling());
        if let Some(ep) = self.ep_square() {
            *self.key_mut() ^= ZOBRIST.ep_key(ep);
        }
        *self.ep_square_mut() = None;

        let from = mv.from();
        let to = mv.to();
        let piece = self
            .piece_on(from)
            .expect("make: origin square is empty");

        let mut captured = None;
        if mv.is_en_passant() {
            // The victim pawn sits on the capture file at the mover's
            // from-rank, one rank behind the landing square.
            let victim_sq = Square::new(to.file(), from.rank());
            self.take_piece(victim_sq, them, Piece::Pawn);
            captured = Some(Piece::Pawn);
        } else if mv.is_capture() {
            let victim = self
                .piece_on(to)
                .expect("make: capture with empty destination");
            self.take_piece(to, them, victim);
            captured = Some(victim);
        }

        if mv.is_castle() {
            let side = if mv.is_kingside_castle() {
                CastleSide::King
            } else {
                CastleSide::Queen
            };
            let rook_from = self.castle_rook_from(us, side);
            let (king_to, rook_to) = CastleRooks::destinations(us, side);
            self.take_piece(from, us, Piece::King);
            self.take_piece(rook_from, us, Piece::Rook);
            self.put_piece(king_to, us, Piece::King);
            self.put_piece(rook_to, us, Piece::Rook);
        } else {
            self.take_piece(from, us, piece);
            let placed = mv.promoted_piece().unwrap_or(piece);
            self.put_piece(to, us, placed);
        }

        if mv.is_double_push() {
            let skipped = Square::new(from.file(), (from.rank() + to.rank()) / 2);
            *self.ep_square_mut() = Some(skipped);
            *self.key_mut() ^= ZOBRIST.ep_key(skipped);
        }

        self.update_castling_rights(us, them, piece, from, to, captured);
        *self.key_mut() ^= ZOBRIST.castling_key(self.castling());

        if piece == Piece::Pawn || captured.is_some() {
            *self.rule50_mut() = 0;
        } else {
            *self.rule50_mut() += 1;
        }
        if us == Color::Black {
            *self.fullmove_mut() += 1;
        }

        *self.stm_mut() = them;
        *self.key_mut() ^= ZOBRIST.black_to_move;

        if let Some(undo) = self.undo_stack.last_mut() {
            undo.captured = captured;
        }

        debug_assert_eq!(self.key(), self.compute_key());
        debug_assert_eq!(self.pawn_key(), self.compute_pawn_key());
    }

    /// Restore the state prior to `mv`. Must mirror the most recent `make`.
    pub fn unmake(&mut self, mv: Move) {
        let undo = self
            .undo_stack
            .pop()
            .expect("unmake with empty undo stack");

        let them = self.side_to_move();
        let us = !them;

        let from = mv.from();
        let to = mv.to();

        if mv.is_castle() {
            let side = if mv.is_kingside_castle() {
                CastleSide::King
            } else {
                CastleSide::Queen
            };
            let rook_from = self.castle_rook_from(us, side);
            let (king_to, rook_to) = CastleRooks::destinations(us, side);
            self.take_piece(king_to, us, Piece::King);
            self.take_piece(rook_to, us, Piece::Rook);
            self.put_piece(from, us, Piece::King);
            self.put_piece(rook_from, us, Piece::Rook);
        } else {
            let placed = self
                .piece_on(to)
                .expect("unmake: destination square is empty");
            self.take_piece(to, us, placed);
            let original = if mv.is_promotion() { Piece::Pawn } else { placed };
            self.put_piece(from, us, original);

            if let Some(victim) = undo.captured {
                let victim_sq = if mv.is_en_passant() {
                    Square::new(to.file(), from.rank())
                } else {
                    to
                };
                self.put_piece(victim_sq, them, victim);
            }
        }

        *self.stm_mut() = us;
        *self.castling_mut() = undo.castling;
        *self.ep_square_mut() = undo.ep_square;
        *self.rule50_mut() = undo.rule50;
        if us == Color::Black {
            *self.fullmove_mut() -= 1;
        }
        *self.key_mut() = undo.key;
        self.set_pawn_key(undo.pawn_key);
    }

    /// Hand the move to the opponent without touching the board. The
    /// 50-move counter is incremented, matching the behavior this engine
    /// has always had; a null move never feeds repetition detection on
    /// its own because the search forbids consecutive null moves.
    pub fn make_null(&mut self) {
        self.undo_stack.push(Undo {
            captured: None,
            castling: self.castling(),
            ep_square: self.ep_square(),
            rule50: self.rule50(),
            key: self.key(),
            pawn_key: self.pawn_key(),
        });

        if let Some(ep) = self.ep_square() {
            *self.key_mut() ^= ZOBRIST.ep_key(ep);
        }
        *self.ep_square_mut() = None;
        *self.rule50_mut() += 1;
        let next = !self.side_to_move();
        *self.stm_mut() = next;
        *self.key_mut() ^= ZOBRIST.black_to_move;
    }

    pub fn unmake_null(&mut self) {
        let undo = self
            .undo_stack
            .pop()
            .expect("unmake_null with empty undo stack");
        let prev = !self.side_to_move();
        *self.stm_mut() = prev;
        *self.ep_square_mut() = undo.ep_square;
        *self.rule50_mut() = undo.rule50;
        *self.key_mut() = undo.key;
    }

    /// Revocations: a king move drops both of that side's rights; moving
    /// from or capturing on a rook origin square drops that single right.
    fn update_castling_rights(
        &mut self,
        us: Color,
        them: Color,
        piece: Piece,
        from: Square,
        to: Square,
        captured: Option<Piece>,
    ) {
        if !self.castling().any_for(us) && !self.castling().any_for(them) {
            return;
        }

        if piece == Piece::King {
            self.castling_mut().revoke_all(us);
        } else if piece == Piece::Rook {
            for side in [CastleSide::King, CastleSide::Queen] {
                if from == self.castle_rook_from(us, side) {
                    self.castling_mut().revoke(us, side);
                }
            }
        }

        if captured == Some(Piece::Rook) {
            for side in [CastleSide::King, CastleSide::Queen] {
                if to == self.castle_rook_from(them, side) {
                    self.castling_mut().revoke(them, side);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::board::types::{Color, Move, MoveFlag, Piece, Square};
    use crate::board::Position;

    fn snapshot(pos: &Position) -> (u64, u64, String, usize) {
        (
            pos.key(),
            pos.pawn_key(),
            pos.to_fen(),
            pos.undo_stack.len(),
        )
    }

    #[test]
    fn test_make_unmake_identity_quiet() {
        let mut pos = Position::startpos();
        let before = snapshot(&pos);
        let mv = Move::new(Square::new(6, 0), Square::new(5, 2), MoveFlag::Quiet);
        pos.make(mv);
        assert_ne!(pos.key(), before.0);
        pos.unmake(mv);
        assert_eq!(snapshot(&pos), before);
        assert!(pos.is_consistent());
    }

    #[test]
    fn test_make_unmake_identity_capture_promotion() {
        let mut pos =
            Position::from_fen("r3k3/1P6/8/8/8/8/8/4K3 w q - 0 1").unwrap();
        let before = snapshot(&pos);
        let mv = Move::promotion(Square::new(1, 6), Square::new(0, 7), Piece::Queen, true);
        pos.make(mv);
        assert_eq!(pos.piece_at(Square::A8), Some((Color::White, Piece::Queen)));
        // Capturing the a8 rook revokes black's queenside right.
        assert!(!pos.castling().any_for(Color::Black));
        pos.unmake(mv);
        assert_eq!(snapshot(&pos), before);
        assert!(pos.is_consistent());
    }

    #[test]
    fn test_en_passant_capture_removes_pusher() {
        let mut pos =
            Position::from_fen("4k3/8/8/8/4pP2/8/8/4K3 b - f3 0 1").unwrap();
        let before = snapshot(&pos);
        let mv = Move::new(Square::new(4, 3), Square::new(5, 2), MoveFlag::EnPassant);
        pos.make(mv);
        assert_eq!(pos.piece_on(Square::new(5, 3)), None, "pusher pawn removed");
        assert_eq!(
            pos.piece_at(Square::new(5, 2)),
            Some((Color::Black, Piece::Pawn))
        );
        pos.unmake(mv);
        assert_eq!(snapshot(&pos), before);
    }

    #[test]
    fn test_double_push_sets_skipped_square() {
        let mut pos = Position::startpos();
        let mv = Move::new(Square::new(4, 1), Square::new(4, 3), MoveFlag::DoublePush);
        pos.make(mv);
        assert_eq!(pos.ep_square(), Some(Square::new(4, 2)));
        pos.unmake(mv);
        assert_eq!(pos.ep_square(), None);
    }

    #[test]
    fn test_castling_moves_rook() {
        let mut pos =
            Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let before = snapshot(&pos);
        let mv = Move::new(Square::E1, Square::G1, MoveFlag::CastleKing);
        pos.make(mv);
        assert_eq!(pos.piece_at(Square::G1), Some((Color::White, Piece::King)));
        assert_eq!(pos.piece_at(Square::F1), Some((Color::White, Piece::Rook)));
        assert!(pos.piece_at(Square::H1).is_none());
        assert!(!pos.castling().any_for(Color::White));
        pos.unmake(mv);
        assert_eq!(snapshot(&pos), before);
        assert!(pos.is_consistent());
    }

    #[test]
    fn test_null_move_increments_rule50() {
        let mut pos =
            Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 7 1").unwrap();
        let key = pos.key();
        pos.make_null();
        assert_eq!(pos.rule50(), 8);
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_ne!(pos.key(), key);
        pos.unmake_null();
        assert_eq!(pos.rule50(), 7);
        assert_eq!(pos.key(), key);
    }

    #[test]
    fn test_repetition_detected_after_shuffle() {
        let mut pos =
            Position::from_fen("4k3/8/8/8/8/8/8/4K1N1 w - - 0 1").unwrap();
        assert!(!pos.is_repetition());
        for uci in ["g1f3", "e8d8", "f3g1", "d8e8"] {
            let mv = pos.parse_uci_move(uci).unwrap();
            pos.make(mv);
        }
        assert!(pos.is_repetition());
    }

    #[test]
    fn test_rule50_zeroed_by_pawn_move_and_capture() {
        let mut pos =
            Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 12 1").unwrap();
        let push = pos.parse_uci_move("e4d5").unwrap();
        assert!(push.is_capture());
        pos.make(push);
        assert_eq!(pos.rule50(), 0);
    }

    #[test]
    fn test_key_determinism_across_move_orders() {
        let mut a = Position::startpos();
        for uci in ["g1f3", "g8f6", "b1c3", "b8c6"] {
            let mv = a.parse_uci_move(uci).unwrap();
            a.make(mv);
        }
        let mut b = Position::startpos();
        for uci in ["b1c3", "b8c6", "g1f3", "g8f6"] {
            let mv = b.parse_uci_move(uci).unwrap();
            b.make(mv);
        }
        assert_eq!(a.key(), b.key());
        assert_eq!(a.pawn_key(), b.pawn_key());
    }
}
