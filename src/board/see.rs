//! Static exchange evaluation.
//!
//! Resolves the capture sequence on a single square assuming each side
//! always recaptures with its least valuable attacker. The running
//! material balances are folded back minimax-style, so either side may
//! stand pat once continuing the exchange stops paying.

use super::attacks;
use super::state::Position;
use super::types::{Bitboard, Color, Move, Piece, Square};

/// Exchange values. The king value guarantees a "capture" of the king
/// dominates any material swing.
pub const SEE_VALUES: [i32; 6] = [100, 320, 330, 500, 900, 20000];

#[inline]
#[must_use]
pub fn see_value(piece: Piece) -> i32 {
    SEE_VALUES[piece.index()]
}

/// Longest possible exchange: 32 pieces on the board.
const MAX_EXCHANGE: usize = 32;

impl Position {
    /// Exchange score of `mv` from the mover's point of view. Non-capture
    /// promotions score the promotion gain; plain quiet moves score 0.
    #[must_use]
    pub fn see(&self, mv: Move) -> i32 {
        let from = mv.from();
        let to = mv.to();

        let Some((us, piece)) = self.piece_at(from) else {
            return 0;
        };

        // balance[k]: the initiator's material total once exchange event
        // k has been played. Event 0 is `mv` itself and is committed.
        let mut balance = [0i32; MAX_EXCHANGE];
        balance[0] = if mv.is_en_passant() {
            see_value(Piece::Pawn)
        } else {
            self.piece_on(to).map_or(0, see_value)
        };

        // A promotion trades the pawn for the promoted piece up front,
        // and it is the promoted piece that stands on the target square.
        let mut on_target = see_value(piece);
        if let Some(promo) = mv.promoted_piece() {
            balance[0] += see_value(promo) - see_value(Piece::Pawn);
            on_target = see_value(promo);
        }

        let mut occupied = self.occupied() & !Bitboard::from_square(from);
        if mv.is_en_passant() {
            occupied &= !Bitboard::from_square(Square::new(to.file(), from.rank()));
        }

        let mut attackers = self.attackers_to(to, occupied) & occupied;
        let mut side = !us;
        let mut events = 1usize;

        loop {
            // Removing a slider or pawn can reveal a stacked attacker
            // behind it; re-query the rays under the thinned occupancy.
            attackers |= attacks::bishop_attacks(to, occupied)
                & (self.pieces_of_type(Piece::Bishop) | self.pieces_of_type(Piece::Queen))
                | attacks::rook_attacks(to, occupied)
                    & (self.pieces_of_type(Piece::Rook) | self.pieces_of_type(Piece::Queen));
            attackers &= occupied;

            let ours = attackers & self.occupied_by(side);
            if ours.is_empty() {
                break;
            }
            let Some((capturer, from_bb)) = self.least_valuable(ours, side) else {
                break;
            };

            // The king may only recapture once the opponent has nothing
            // left to answer with.
            if capturer == Piece::King && (attackers & self.occupied_by(!side)).any() {
                break;
            }
            if events >= MAX_EXCHANGE {
                break;
            }

            // Event `events` captures the piece currently on the target.
            balance[events] = if events % 2 == 0 {
                balance[events - 1] + on_target
            } else {
                balance[events - 1] - on_target
            };

            occupied &= !from_bb;
            attackers &= !from_bb;
            on_target = see_value(capturer);
            side = !side;
            events += 1;
        }

        // Fold back: at each event the side to move may decline and keep
        // the balance reached so far.
        let last = events - 1;
        let mut value = balance[last];
        for k in (1..=last).rev() {
            value = if k % 2 == 1 {
                value.min(balance[k - 1])
            } else {
                value.max(balance[k - 1])
            };
        }
        value
    }

    fn least_valuable(&self, candidates: Bitboard, side: Color) -> Option<(Piece, Bitboard)> {
        for piece in Piece::ALL {
            let subset = candidates & self.pieces(side, piece);
            if subset.any() {
                return Some((piece, Bitboard::from_square(subset.lsb())));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn see_of(fen: &str, uci: &str) -> i32 {
        let mut pos = Position::from_fen(fen).unwrap();
        let mv = pos.parse_uci_move(uci).expect("legal move");
        pos.see(mv)
    }

    #[test]
    fn test_free_pawn_capture() {
        assert_eq!(see_of("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1", "e4d5"), 100);
    }

    #[test]
    fn test_defended_pawn_costs_a_knight() {
        // Nxd5 wins a pawn but loses the knight to exd5.
        assert_eq!(
            see_of("4k3/8/4p3/3p4/8/4N3/8/4K3 w - - 0 1", "e3d5"),
            100 - 320
        );
    }

    #[test]
    fn test_hanging_rook_capture() {
        assert_eq!(see_of("4k3/8/8/3r4/8/8/3R4/3RK3 w - - 0 1", "d2d5"), 500);
    }

    #[test]
    fn test_defended_rook_trade_is_even() {
        // Rxd5 Rxd5 Rxd5: black declines the doomed recapture, white
        // still banks the first rook.
        assert_eq!(see_of("3rk3/8/8/3r4/8/8/3R4/3RK3 w - - 0 1", "d2d5"), 500);
    }

    #[test]
    fn test_stacked_file_exchange_is_losing() {
        // Three white heavy pieces against pawn plus two rooks; every
        // recapture is answered and white ends a rook down. The queen
        // hides the back rook until x-ray discovery brings it in.
        assert_eq!(
            see_of("3rk3/3r4/8/3p4/8/3R4/3Q4/3RK3 w - - 0 1", "d3d5"),
            -300
        );
    }

    #[test]
    fn test_deep_exchange_declines_early() {
        // Nxd5 exd5 would leave rook takes rook takes: white stops the
        // bleeding after the pawn recapture.
        assert_eq!(
            see_of("3rk3/8/4p3/3p4/8/2N5/8/3RK3 w - - 0 1", "c3d5"),
            100 - 320
        );
    }

    #[test]
    fn test_king_recapture_allowed_when_safe() {
        // Qxd5 exd5 Kxd5: nothing else covers the square.
        assert_eq!(
            see_of("4k3/8/4p3/3q4/3K4/8/8/3Q4 w - - 0 1", "d1d5"),
            100
        );
    }

    #[test]
    fn test_king_cannot_recapture_into_attack() {
        // Same shape, but the d8 rook covers d5: the king must decline
        // and the queens simply trade off.
        assert_eq!(
            see_of("3rk3/8/4p3/3q4/3K4/8/8/3Q4 w - - 0 1", "d1d5"),
            0
        );
    }

    #[test]
    fn test_promotion_capture_gain() {
        // axb8=Q: knight captured plus queen-for-pawn upgrade.
        assert_eq!(
            see_of("1n2k3/P7/8/8/8/8/8/4K3 w - - 0 1", "a7b8q"),
            320 + 900 - 100
        );
    }

    #[test]
    fn test_promotion_capture_refuted() {
        // axb8=Q Rxb8: the fresh queen is taken at once.
        assert_eq!(
            see_of("1n1rk3/P7/8/8/8/8/8/4K3 w - - 0 1", "a7b8q"),
            320 + 900 - 100 - 900
        );
    }

    #[test]
    fn test_en_passant_capture() {
        assert_eq!(see_of("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1", "e5d6"), 100);
    }

    #[test]
    fn test_quiet_move_scores_zero() {
        let mut pos = Position::startpos();
        let mv = pos.parse_uci_move("g1f3").unwrap();
        assert_eq!(pos.see(mv), 0);
    }
}
