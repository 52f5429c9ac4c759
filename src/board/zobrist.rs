//! Zobrist keys for incremental position hashing.

use once_cell::sync::Lazy;
use rand::prelude::*;

use super::types::{CastlingRights, Color, Piece, Square};

pub struct ZobristKeys {
    /// piece[color][piece_type][square]
    pub piece: [[[u64; 64]; 6]; 2],
    pub black_to_move: u64,
    /// One key per castling-rights mask so an update is a single XOR pair.
    pub castling: [u64; 16],
    /// En passant keys by target file.
    pub en_passant: [u64; 8],
}

impl ZobristKeys {
    fn new() -> Self {
        // Fixed seed keeps keys stable across runs and platforms.
        let mut rng = StdRng::seed_from_u64(0x41455448_u64);
        let mut piece = [[[0u64; 64]; 6]; 2];
        for color in &mut piece {
            for table in color.iter_mut() {
                for key in table.iter_mut() {
                    *key = rng.gen();
                }
            }
        }
        let black_to_move = rng.gen();
        let mut castling = [0u64; 16];
        // Mask keys are the XOR of independent per-right keys so that
        // revoking a right always changes the hash by the same delta.
        let rights: [u64; 4] = [rng.gen(), rng.gen(), rng.gen(), rng.gen()];
        for (mask, key) in castling.iter_mut().enumerate() {
            for (bit, right_key) in rights.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    *key ^= right_key;
                }
            }
        }
        let mut en_passant = [0u64; 8];
        for key in &mut en_passant {
            *key = rng.gen();
        }
        ZobristKeys {
            piece,
            black_to_move,
            castling,
            en_passant,
        }
    }

    #[inline]
    #[must_use]
    pub fn piece_key(&self, color: Color, piece: Piece, sq: Square) -> u64 {
        self.piece[color.index()][piece.index()][sq.index()]
    }

    #[inline]
    #[must_use]
    pub fn castling_key(&self, rights: CastlingRights) -> u64 {
        self.castling[rights.index()]
    }

    #[inline]
    #[must_use]
    pub fn ep_key(&self, sq: Square) -> u64 {
        self.en_passant[sq.file()]
    }
}

pub static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::new);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::CastleSide;

    #[test]
    fn test_keys_are_distinct() {
        let a = ZOBRIST.piece_key(Color::White, Piece::Pawn, Square::E1);
        let b = ZOBRIST.piece_key(Color::Black, Piece::Pawn, Square::E1);
        let c = ZOBRIST.piece_key(Color::White, Piece::Knight, Square::E1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, 0);
    }

    #[test]
    fn test_no_rights_has_zero_key() {
        assert_eq!(ZOBRIST.castling_key(CastlingRights::NONE), 0);
    }

    #[test]
    fn test_castling_mask_is_xor_of_rights() {
        let wk = CastlingRights(CastlingRights::bit(Color::White, CastleSide::King));
        let bq = CastlingRights(CastlingRights::bit(Color::Black, CastleSide::Queen));
        let both = CastlingRights(wk.0 | bq.0);
        assert_eq!(
            ZOBRIST.castling_key(both),
            ZOBRIST.castling_key(wk) ^ ZOBRIST.castling_key(bq)
        );
    }
}
