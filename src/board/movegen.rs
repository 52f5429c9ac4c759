//! Pseudo-legal move generation.
//!
//! Generation is not pin-aware: legality is established by making the
//! move and testing whether the mover's king is attacked. Captures and
//! quiets have separate entry points so the move picker can stage them.

use super::attacks;
use super::state::Position;
use super::types::{
    Bitboard, CastleRooks, CastleSide, Color, Move, MoveFlag, MoveList, Piece, Square,
};

const PROMOTION_PIECES: [Piece; 4] = [Piece::Queen, Piece::Knight, Piece::Rook, Piece::Bishop];

impl Position {
    /// All pseudo-legal moves for the side to move.
    pub fn generate_moves(&self, list: &mut MoveList) {
        self.generate_captures(list);
        self.generate_quiets(list);
    }

    /// Captures, en passant, and promotions (the tactical set). The
    /// enemy king is never a capture target, even in corrupt positions
    /// fed from outside: taking it would wreck the board invariants.
    pub fn generate_captures(&self, list: &mut MoveList) {
        let us = self.side_to_move();
        let targets = self.occupied_by(!us) & !self.pieces(!us, Piece::King);

        self.generate_pawn_captures(list);
        self.generate_piece_moves(list, targets, true);
    }

    /// Non-capture, non-promotion moves.
    pub fn generate_quiets(&self, list: &mut MoveList) {
        let empty = !self.occupied();

        self.generate_pawn_quiets(list);
        self.generate_piece_moves(list, empty, false);
        self.generate_castles(list);
    }

    /// Knight through king moves restricted to `targets`.
    fn generate_piece_moves(&self, list: &mut MoveList, targets: Bitboard, captures: bool) {
        let us = self.side_to_move();
        let occupied = self.occupied();
        let flag = if captures {
            MoveFlag::Capture
        } else {
            MoveFlag::Quiet
        };

        for piece in [
            Piece::Knight,
            Piece::Bishop,
            Piece::Rook,
            Piece::Queen,
            Piece::King,
        ] {
            for from in self.pieces(us, piece) {
                let reachable = attacks::piece_attacks(piece, us, from, occupied) & targets;
                for to in reachable {
                    list.push(Move::new(from, to, flag));
                }
            }
        }
    }

    fn generate_pawn_captures(&self, list: &mut MoveList) {
        let us = self.side_to_move();
        let them = !us;
        let pawns = self.pieces(us, Piece::Pawn);
        let enemies = self.occupied_by(them) & !self.pieces(them, Piece::King);
        let empty = !self.occupied();
        let promo_rank = if us.is_white() { 7 } else { 0 };

        for from in pawns {
            let grabs = attacks::pawn_attacks(us, from) & enemies;
            for to in grabs {
                if to.rank() == promo_rank {
                    for piece in PROMOTION_PIECES {
                        list.push(Move::promotion(from, to, piece, true));
                    }
                } else {
                    list.push(Move::new(from, to, MoveFlag::Capture));
                }
            }

            // Push promotions count as tactical moves.
            if from.relative_rank(us.is_white()) == 6 {
                if let Some(to) = from.offset(us.forward()) {
                    if empty.contains(to) {
                        for piece in PROMOTION_PIECES {
                            list.push(Move::promotion(from, to, piece, false));
                        }
                    }
                }
            }
        }

        if let Some(ep) = self.ep_square() {
            let attackers = attacks::pawn_attacks(them, ep) & pawns;
            for from in attackers {
                list.push(Move::new(from, ep, MoveFlag::EnPassant));
            }
        }
    }

    fn generate_pawn_quiets(&self, list: &mut MoveList) {
        let us = self.side_to_move();
        let empty = !self.occupied();
        let pawns = self.pieces(us, Piece::Pawn);
        let forward = us.forward();

        for from in pawns {
            // Promotion pushes are emitted by the capture generator.
            if from.relative_rank(us.is_white()) == 6 {
                continue;
            }
            let Some(one) = from.offset(forward) else { continue };
            if !empty.contains(one) {
                continue;
            }
            list.push(Move::new(from, one, MoveFlag::Quiet));

            if from.relative_rank(us.is_white()) == 1 {
                let Some(two) = one.offset(forward) else { continue };
                if empty.contains(two) {
                    list.push(Move::new(from, two, MoveFlag::DoublePush));
                }
            }
        }
    }

    /// Castling is emitted only when fully playable: rights intact, the
    /// connecting squares empty, the king not in check, and no traversed
    /// square (destination included) attacked by the opponent.
    fn generate_castles(&self, list: &mut MoveList) {
        let us = self.side_to_move();
        let them = !us;
        let king_from = self.king_sq(us);

        if !self.castling().any_for(us) || self.is_attacked(king_from, them) {
            return;
        }

        for side in [CastleSide::King, CastleSide::Queen] {
            if !self.castling().has(us, side) {
                continue;
            }
            let rook_from = self.castle_rook_from(us, side);
            let (king_to, rook_to) = CastleRooks::destinations(us, side);

            // Occupancy without the two castling pieces: the squares they
            // travel over may only be blocked by themselves.
            let movers = Bitboard::from_square(king_from) | Bitboard::from_square(rook_from);
            let others = self.occupied() & !movers;

            let king_path = attacks::between(king_from, king_to) | Bitboard::from_square(king_to);
            let rook_path = attacks::between(rook_from, rook_to) | Bitboard::from_square(rook_to);
            if ((king_path | rook_path) & others).any() {
                continue;
            }

            if king_path.into_iter().any(|sq| self.is_attacked(sq, them)) {
                continue;
            }

            let flag = match side {
                CastleSide::King => MoveFlag::CastleKing,
                CastleSide::Queen => MoveFlag::CastleQueen,
            };
            list.push(Move::new(king_from, king_to, flag));
        }
    }

    /// Does making `mv` leave the mover's own king attacked?
    pub fn leaves_king_in_check(&mut self, mv: Move) -> bool {
        let us = self.side_to_move();
        self.make(mv);
        let illegal = self.is_attacked(self.king_sq(us), self.side_to_move());
        self.unmake(mv);
        illegal
    }

    /// Fully legal moves; convenience for the front-ends and tests.
    #[must_use]
    pub fn legal_moves(&mut self) -> MoveList {
        let mut list = MoveList::new();
        self.generate_moves(&mut list);
        let mut legal = MoveList::new();
        for &mv in list.iter() {
            if !self.leaves_king_in_check(mv) {
                legal.push(mv);
            }
        }
        legal
    }

    #[must_use]
    pub fn is_checkmate(&mut self) -> bool {
        self.in_check() && self.legal_moves().is_empty()
    }

    #[must_use]
    pub fn is_stalemate(&mut self) -> bool {
        !self.in_check() && self.legal_moves().is_empty()
    }

    /// Leaf count of the legal move tree; the movegen ground truth.
    #[must_use]
    pub fn perft(&mut self, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        let moves = self.legal_moves();
        if depth == 1 {
            return moves.len() as u64;
        }
        let mut nodes = 0;
        for &mv in moves.iter() {
            self.make(mv);
            nodes += self.perft(depth - 1);
            self.unmake(mv);
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_moves(fen: &str) -> usize {
        Position::from_fen(fen).unwrap().legal_moves().len()
    }

    #[test]
    fn test_startpos_has_twenty_moves() {
        assert_eq!(count_moves(super::super::fen::STARTPOS_FEN), 20);
    }

    #[test]
    fn test_no_duplicate_moves() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let mut list = MoveList::new();
        pos.generate_moves(&mut list);
        let mut seen = std::collections::HashSet::new();
        for &mv in list.iter() {
            assert!(seen.insert(mv.as_u16()), "duplicate move {mv}");
        }
    }

    #[test]
    fn test_captures_and_quiets_partition() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let mut all = MoveList::new();
        pos.generate_moves(&mut all);
        let mut captures = MoveList::new();
        pos.generate_captures(&mut captures);
        let mut quiets = MoveList::new();
        pos.generate_quiets(&mut quiets);

        assert_eq!(all.len(), captures.len() + quiets.len());
        assert!(captures.iter().all(|m| m.is_tactical()));
        assert!(quiets.iter().all(|m| !m.is_tactical()));
    }

    #[test]
    fn test_promotions_expand_to_four() {
        let mut pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let legal = pos.legal_moves();
        let promos: Vec<_> = legal.iter().filter(|m| m.is_promotion()).collect();
        assert_eq!(promos.len(), 4);
    }

    #[test]
    fn test_castle_blocked_by_attack() {
        // Black rook on f8 covers f1: kingside castling must not appear.
        let mut pos =
            Position::from_fen("4kr2/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(pos.legal_moves().iter().all(|m| !m.is_castle()));

        // Remove the rook and castling appears.
        let mut pos = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(pos.legal_moves().iter().any(|m| m.is_kingside_castle()));
    }

    #[test]
    fn test_castle_blocked_by_piece() {
        let mut pos =
            Position::from_fen("4k3/8/8/8/8/8/8/4KB1R w K - 0 1").unwrap();
        assert!(pos.legal_moves().iter().all(|m| !m.is_castle()));
    }

    #[test]
    fn test_no_castle_while_in_check() {
        let mut pos =
            Position::from_fen("4k3/8/8/8/8/8/4r3/4K2R w K - 0 1").unwrap();
        assert!(pos.in_check());
        assert!(pos.legal_moves().iter().all(|m| !m.is_castle()));
    }

    #[test]
    fn test_en_passant_generated() {
        let pos =
            Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let mut list = MoveList::new();
        pos.generate_captures(&mut list);
        assert!(list.iter().any(|m| m.is_en_passant()));
    }

    #[test]
    fn test_ep_capture_exposing_king_is_illegal() {
        // After dxe3 both pawns leave the fourth rank and the h4 rook
        // would hit the king on a4.
        let mut pos =
            Position::from_fen("8/8/8/8/k2pP2R/8/8/4K3 b - e3 0 1").unwrap();
        assert!(pos.parse_uci_move("d4e3").is_none());
    }
}
