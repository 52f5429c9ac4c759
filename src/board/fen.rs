//! FEN input/output and UCI move token parsing.

use std::str::FromStr;

use super::error::FenError;
use super::state::Position;
use super::types::{CastleSide, CastlingRights, Color, Move, Piece, Square};

pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl Position {
    #[must_use]
    pub fn startpos() -> Self {
        Position::from_fen(STARTPOS_FEN).expect("startpos FEN is valid")
    }

    /// Parse a FEN string. On error the returned position does not exist;
    /// callers keeping a live position should use [`Position::set_fen`].
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut pos = Position::empty();
        pos.set_fen(fen)?;
        Ok(pos)
    }

    /// Replace this position with the one described by `fen`. On error
    /// the position is reset to the defined empty state.
    pub fn set_fen(&mut self, fen: &str) -> Result<(), FenError> {
        *self = Position::empty();
        match self.parse_fen_into(fen) {
            Ok(()) => Ok(()),
            Err(err) => {
                *self = Position::empty();
                Err(err)
            }
        }
    }

    fn parse_fen_into(&mut self, fen: &str) -> Result<(), FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::TooFewFields {
                found: fields.len(),
            });
        }

        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::InvalidRankCount { ranks: ranks.len() });
        }
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for ch in rank_str.chars() {
                if let Some(skip) = ch.to_digit(10) {
                    file += skip as usize;
                } else {
                    let piece = Piece::from_char(ch).ok_or(FenError::InvalidPiece { ch })?;
                    let color = if ch.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    if file >= 8 {
                        return Err(FenError::OverfullRank { rank });
                    }
                    self.put_piece(Square::new(file, rank), color, piece);
                    file += 1;
                }
            }
            if file > 8 {
                return Err(FenError::OverfullRank { rank });
            }
        }

        if self.pieces(Color::White, Piece::King).count() != 1
            || self.pieces(Color::Black, Piece::King).count() != 1
        {
            return Err(FenError::MissingKing);
        }

        let stm = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(FenError::InvalidSideToMove {
                    found: other.to_string(),
                })
            }
        };

        let mut castling = CastlingRights::NONE;
        for ch in fields[2].chars() {
            match ch {
                'K' => self.add_castle_right(&mut castling, Color::White, CastleSide::King, None),
                'Q' => self.add_castle_right(&mut castling, Color::White, CastleSide::Queen, None),
                'k' => self.add_castle_right(&mut castling, Color::Black, CastleSide::King, None),
                'q' => self.add_castle_right(&mut castling, Color::Black, CastleSide::Queen, None),
                // Shredder-FEN file letters (Chess960 rook files).
                'A'..='H' => {
                    let file = ch as usize - 'A' as usize;
                    self.add_shredder_right(&mut castling, Color::White, file)?;
                }
                'a'..='h' => {
                    let file = ch as usize - 'a' as usize;
                    self.add_shredder_right(&mut castling, Color::Black, file)?;
                }
                '-' => {}
                _ => return Err(FenError::InvalidCastling { ch }),
            }
        }

        let ep_square = match fields[3] {
            "-" => None,
            text => Some(
                Square::from_str(text).map_err(|()| FenError::InvalidEnPassant {
                    found: text.to_string(),
                })?,
            ),
        };

        let rule50 = fields.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
        let fullmove = fields.get(5).and_then(|s| s.parse().ok()).unwrap_or(1);

        self.set_state_fields(stm, castling, ep_square, rule50, fullmove);
        Ok(())
    }

    /// Grant a right, resolving the rook origin: explicit file when given
    /// (Shredder), otherwise the outermost rook on the king's rank.
    fn add_castle_right(
        &mut self,
        castling: &mut CastlingRights,
        color: Color,
        side: CastleSide,
        rook_file: Option<usize>,
    ) {
        let rank = if color.is_white() { 0 } else { 7 };
        let rook_from = match rook_file {
            Some(file) => Square::new(file, rank),
            None => {
                // Scan outward from the edge for the side's rook.
                let files: &[usize] = match side {
                    CastleSide::King => &[7, 6, 5],
                    CastleSide::Queen => &[0, 1, 2, 3],
                };
                files
                    .iter()
                    .map(|&f| Square::new(f, rank))
                    .find(|&sq| self.piece_at(sq) == Some((color, Piece::Rook)))
                    .unwrap_or(Square::new(if side == CastleSide::King { 7 } else { 0 }, rank))
            }
        };
        castling.grant(color, side);
        self.castle_rooks.set_rook_from(color, side, rook_from);
    }

    fn add_shredder_right(
        &mut self,
        castling: &mut CastlingRights,
        color: Color,
        file: usize,
    ) -> Result<(), FenError> {
        let king_file = self.king_sq(color).file();
        let side = if file > king_file {
            CastleSide::King
        } else {
            CastleSide::Queen
        };
        self.add_castle_right(castling, color, side, Some(file));
        self.set_chess960(true);
        Ok(())
    }

    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut board = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.piece_at(Square::new(file, rank)) {
                    Some((color, piece)) => {
                        if empty > 0 {
                            board.push_str(&empty.to_string());
                            empty = 0;
                        }
                        board.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                board.push_str(&empty.to_string());
            }
            if rank > 0 {
                board.push('/');
            }
        }

        let stm = if self.side_to_move().is_white() { "w" } else { "b" };
        let ep = self
            .ep_square()
            .map_or_else(|| "-".to_string(), |sq| sq.to_string());

        format!(
            "{} {} {} {} {} {}",
            board,
            stm,
            self.castling(),
            ep,
            self.rule50(),
            self.fullmove()
        )
    }

    /// Resolve a UCI move token ("e2e4", "a7a8q", castling as a king
    /// move, or king-takes-rook in Chess960) against the legal moves of
    /// this position.
    #[must_use]
    pub fn parse_uci_move(&mut self, token: &str) -> Option<Move> {
        if !token.is_ascii() || token.len() < 4 || token.len() > 5 {
            return None;
        }
        let from = Square::from_str(&token[0..2]).ok()?;
        let to = Square::from_str(&token[2..4]).ok()?;
        let promo = match token.len() {
            5 => Some(Piece::from_char(token.chars().nth(4)?)?),
            _ => None,
        };
        if matches!(promo, Some(Piece::Pawn | Piece::King)) {
            return None;
        }

        // Chess960 castling arrives as king-takes-own-rook.
        if self.is_chess960() && promo.is_none() {
            if let Some(side) = self.castle_side_of(from, to) {
                return self.legal_moves().iter().copied().find(|mv| {
                    mv.is_castle() && (side == CastleSide::King) == mv.is_kingside_castle()
                });
            }
        }

        let legal = self.legal_moves();
        legal
            .iter()
            .copied()
            .find(|mv| mv.from() == from && mv.to() == to && mv.promoted_piece() == promo)
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_roundtrip() {
        let pos = Position::startpos();
        assert_eq!(pos.to_fen(), STARTPOS_FEN);
        assert!(pos.is_consistent());
    }

    #[test]
    fn test_fen_roundtrip_kiwipete() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn test_malformed_fen_leaves_empty_state() {
        let mut pos = Position::startpos();
        assert!(pos.set_fen("not a fen").is_err());
        assert!(pos.occupied().is_empty());
        assert_eq!(pos.castling(), CastlingRights::NONE);

        assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err()); // no kings
        assert!(Position::from_fen("9/8/8/8/8/8/8/4K2k w - - 0 1").is_err());
        assert!(Position::from_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1").is_err());
        assert!(Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - e9 0 1").is_err());
    }

    #[test]
    fn test_key_matches_scratch_computation() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R b KQkq - 3 7";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.key(), pos.compute_key());
        assert_eq!(pos.pawn_key(), pos.compute_pawn_key());
    }

    #[test]
    fn test_ep_square_parsed() {
        let pos =
            Position::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2")
                .unwrap();
        assert_eq!(pos.ep_square(), Some(Square::new(3, 5)));
    }

    #[test]
    fn test_shredder_castling_enables_chess960() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/1R2K2R w HB - 0 1").unwrap();
        assert!(pos.is_chess960());
        assert_eq!(
            pos.castle_rook_from(Color::White, CastleSide::Queen),
            Square::new(1, 0)
        );
        assert_eq!(
            pos.castle_rook_from(Color::White, CastleSide::King),
            Square::H1
        );
    }

    #[test]
    fn test_parse_uci_move() {
        let mut pos = Position::startpos();
        let mv = pos.parse_uci_move("e2e4").unwrap();
        assert!(mv.is_double_push());
        assert!(pos.parse_uci_move("e2e5").is_none());
        assert!(pos.parse_uci_move("zz99").is_none());
        assert!(pos.parse_uci_move("e2e4x").is_none());
    }
}
