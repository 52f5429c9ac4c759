//! Position state: bitboards, mailbox, keys, and the undo stack.

use super::attacks;
use super::types::{
    Bitboard, CastleRooks, CastleSide, CastlingRights, Color, Piece, Square, MAX_PLY,
};
use super::zobrist::ZOBRIST;

/// Everything needed to unmake one move. The undo stack is the sole
/// owner of unmake information; `unmake` only needs the move itself.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Undo {
    pub captured: Option<Piece>,
    pub castling: CastlingRights,
    pub ep_square: Option<Square>,
    pub rule50: u32,
    pub key: u64,
    pub pawn_key: u64,
}

/// Undo stack capacity: longest realistic game plus full search depth.
const UNDO_CAPACITY: usize = MAX_PLY + 512;

/// A chess position.
///
/// Bitboards are kept per piece type and per color; the mailbox is
/// derivable from them but kept for O(1) square lookup. The Zobrist key
/// and the pawn-only key are updated incrementally by make/unmake.
#[derive(Clone)]
pub struct Position {
    piece_bb: [Bitboard; 6],
    color_bb: [Bitboard; 2],
    mailbox: [Option<(Color, Piece)>; 64],
    stm: Color,
    castling: CastlingRights,
    pub(crate) castle_rooks: CastleRooks,
    ep_square: Option<Square>,
    rule50: u32,
    fullmove: u32,
    key: u64,
    pawn_key: u64,
    chess960: bool,
    pub(crate) undo_stack: Vec<Undo>,
}

impl Position {
    /// An empty board: no pieces, white to move, no rights. This is the
    /// defined state a failed FEN parse leaves behind.
    #[must_use]
    pub fn empty() -> Self {
        Position {
            piece_bb: [Bitboard::EMPTY; 6],
            color_bb: [Bitboard::EMPTY; 2],
            mailbox: [None; 64],
            stm: Color::White,
            castling: CastlingRights::NONE,
            castle_rooks: CastleRooks::standard(),
            ep_square: None,
            rule50: 0,
            fullmove: 1,
            key: 0,
            pawn_key: 0,
            chess960: false,
            undo_stack: Vec::with_capacity(UNDO_CAPACITY),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.stm
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn pawn_key(&self) -> u64 {
        self.pawn_key
    }

    #[inline]
    #[must_use]
    pub fn rule50(&self) -> u32 {
        self.rule50
    }

    #[inline]
    #[must_use]
    pub fn fullmove(&self) -> u32 {
        self.fullmove
    }

    #[inline]
    #[must_use]
    pub fn ep_square(&self) -> Option<Square> {
        self.ep_square
    }

    #[inline]
    #[must_use]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    #[must_use]
    pub fn is_chess960(&self) -> bool {
        self.chess960
    }

    pub fn set_chess960(&mut self, enabled: bool) {
        self.chess960 = enabled;
    }

    #[inline]
    #[must_use]
    pub fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        self.piece_bb[piece.index()] & self.color_bb[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn pieces_of_type(&self, piece: Piece) -> Bitboard {
        self.piece_bb[piece.index()]
    }

    #[inline]
    #[must_use]
    pub fn occupied_by(&self, color: Color) -> Bitboard {
        self.color_bb[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn occupied(&self) -> Bitboard {
        self.color_bb[0] | self.color_bb[1]
    }

    #[inline]
    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        self.mailbox[sq.index()]
    }

    #[inline]
    #[must_use]
    pub fn piece_on(&self, sq: Square) -> Option<Piece> {
        self.mailbox[sq.index()].map(|(_, p)| p)
    }

    /// King square. Every legal position has exactly one king per side.
    #[inline]
    #[must_use]
    pub fn king_sq(&self, color: Color) -> Square {
        self.pieces(color, Piece::King).lsb()
    }

    #[must_use]
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        (self.occupied_by(color)
            & !self.pieces(color, Piece::Pawn)
            & !self.pieces(color, Piece::King))
        .any()
    }

    /// Game ply count since the stack was last reset; used by datagen.
    #[must_use]
    pub fn ply_from_root(&self) -> usize {
        self.undo_stack.len()
    }

    // ------------------------------------------------------------------
    // Board surgery (bitboards + mailbox + keys kept in lockstep)
    // ------------------------------------------------------------------

    pub(crate) fn put_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        debug_assert!(self.mailbox[sq.index()].is_none());
        let bb = Bitboard::from_square(sq);
        self.piece_bb[piece.index()] |= bb;
        self.color_bb[color.index()] |= bb;
        self.mailbox[sq.index()] = Some((color, piece));
        self.key ^= ZOBRIST.piece_key(color, piece, sq);
        if piece == Piece::Pawn {
            self.pawn_key ^= ZOBRIST.piece_key(color, piece, sq);
        }
    }

    pub(crate) fn take_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        debug_assert_eq!(self.mailbox[sq.index()], Some((color, piece)));
        let bb = Bitboard::from_square(sq);
        self.piece_bb[piece.index()] ^= bb;
        self.color_bb[color.index()] ^= bb;
        self.mailbox[sq.index()] = None;
        self.key ^= ZOBRIST.piece_key(color, piece, sq);
        if piece == Piece::Pawn {
            self.pawn_key ^= ZOBRIST.piece_key(color, piece, sq);
        }
    }

    // ------------------------------------------------------------------
    // Attack queries
    // ------------------------------------------------------------------

    /// All pieces of either color attacking `sq` under `occupied`.
    #[must_use]
    pub fn attackers_to(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        attacks::pawn_attacks(Color::Black, sq) & self.pieces(Color::White, Piece::Pawn)
            | attacks::pawn_attacks(Color::White, sq) & self.pieces(Color::Black, Piece::Pawn)
            | attacks::knight_attacks(sq) & self.piece_bb[Piece::Knight.index()]
            | attacks::king_attacks(sq) & self.piece_bb[Piece::King.index()]
            | attacks::bishop_attacks(sq, occupied)
                & (self.piece_bb[Piece::Bishop.index()] | self.piece_bb[Piece::Queen.index()])
            | attacks::rook_attacks(sq, occupied)
                & (self.piece_bb[Piece::Rook.index()] | self.piece_bb[Piece::Queen.index()])
    }

    #[must_use]
    pub fn is_attacked(&self, sq: Square, by: Color) -> bool {
        (self.attackers_to(sq, self.occupied()) & self.occupied_by(by)).any()
    }

    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        self.is_attacked(self.king_sq(self.stm), !self.stm)
    }

    // ------------------------------------------------------------------
    // Draw detection
    // ------------------------------------------------------------------

    /// Walk the undo stack backwards for a key match. The walk is bounded
    /// by rule50: an irreversible move invalidates everything before it.
    /// A single prior occurrence counts as a repetition.
    #[must_use]
    pub fn is_repetition(&self) -> bool {
        let limit = (self.rule50 as usize).min(self.undo_stack.len());
        self.undo_stack
            .iter()
            .rev()
            .take(limit)
            .any(|undo| undo.key == self.key)
    }

    #[must_use]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.rule50 >= 100
    }

    /// Bare-material draw heuristic: lone kings or king + single minor.
    #[must_use]
    pub fn is_insufficient_material(&self) -> bool {
        if (self.piece_bb[Piece::Pawn.index()]
            | self.piece_bb[Piece::Rook.index()]
            | self.piece_bb[Piece::Queen.index()])
        .any()
        {
            return false;
        }
        let minors = self.piece_bb[Piece::Knight.index()] | self.piece_bb[Piece::Bishop.index()];
        match minors.count() {
            0 | 1 => true,
            2 => {
                let bishops = self.piece_bb[Piece::Bishop.index()];
                bishops.count() == 2
                    && ((bishops & Bitboard::LIGHT_SQUARES).is_empty()
                        || (bishops & Bitboard::DARK_SQUARES).is_empty())
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Key verification (tests and debug assertions)
    // ------------------------------------------------------------------

    /// Recompute the main key from scratch.
    #[must_use]
    pub fn compute_key(&self) -> u64 {
        let mut key = 0u64;
        for idx in 0..64 {
            if let Some((color, piece)) = self.mailbox[idx] {
                key ^= ZOBRIST.piece_key(color, piece, Square::from_index(idx));
            }
        }
        if self.stm == Color::Black {
            key ^= ZOBRIST.black_to_move;
        }
        key ^= ZOBRIST.castling_key(self.castling);
        if let Some(ep) = self.ep_square {
            key ^= ZOBRIST.ep_key(ep);
        }
        key
    }

    /// Recompute the pawn-only key from scratch.
    #[must_use]
    pub fn compute_pawn_key(&self) -> u64 {
        let mut key = 0u64;
        for color in [Color::White, Color::Black] {
            for sq in self.pieces(color, Piece::Pawn) {
                key ^= ZOBRIST.piece_key(color, Piece::Pawn, sq);
            }
        }
        key
    }

    pub(crate) fn set_state_fields(
        &mut self,
        stm: Color,
        castling: CastlingRights,
        ep_square: Option<Square>,
        rule50: u32,
        fullmove: u32,
    ) {
        self.stm = stm;
        self.castling = castling;
        self.ep_square = ep_square;
        self.rule50 = rule50;
        self.fullmove = fullmove;
        self.key = self.compute_key();
        self.pawn_key = self.compute_pawn_key();
    }

    pub(crate) fn stm_mut(&mut self) -> &mut Color {
        &mut self.stm
    }

    pub(crate) fn castling_mut(&mut self) -> &mut CastlingRights {
        &mut self.castling
    }

    pub(crate) fn ep_square_mut(&mut self) -> &mut Option<Square> {
        &mut self.ep_square
    }

    pub(crate) fn rule50_mut(&mut self) -> &mut u32 {
        &mut self.rule50
    }

    pub(crate) fn fullmove_mut(&mut self) -> &mut u32 {
        &mut self.fullmove
    }

    pub(crate) fn key_mut(&mut self) -> &mut u64 {
        &mut self.key
    }

    pub(crate) fn set_pawn_key(&mut self, key: u64) {
        self.pawn_key = key;
    }

    /// Rook origin for a castling right, honoring Chess960 setups.
    #[must_use]
    pub fn castle_rook_from(&self, color: Color, side: CastleSide) -> Square {
        self.castle_rooks.rook_from(color, side)
    }

    /// Classify a king move as a castle attempt in Chess960 terms: in
    /// standard mode the king travels two files, in 960 mode the notation
    /// is king-takes-own-rook.
    #[must_use]
    pub fn castle_side_of(&self, from: Square, to: Square) -> Option<CastleSide> {
        if self.chess960 {
            if from != self.king_sq(self.stm) {
                return None;
            }
            match self.piece_at(to) {
                Some((c, Piece::Rook)) if c == self.stm => {
                    if to == self.castle_rook_from(c, CastleSide::King) {
                        Some(CastleSide::King)
                    } else if to == self.castle_rook_from(c, CastleSide::Queen) {
                        Some(CastleSide::Queen)
                    } else {
                        None
                    }
                }
                _ => None,
            }
        } else if from.rank() == to.rank() && from.file().abs_diff(to.file()) == 2 {
            if to.file() == 6 {
                Some(CastleSide::King)
            } else {
                Some(CastleSide::Queen)
            }
        } else {
            None
        }
    }

    /// Full consistency check between the mailbox and the bitboards.
    /// Only used by tests and debug assertions.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut colors = [Bitboard::EMPTY; 2];
        let mut types = [Bitboard::EMPTY; 6];
        for idx in 0..64 {
            if let Some((color, piece)) = self.mailbox[idx] {
                colors[color.index()].set(Square::from_index(idx));
                types[piece.index()].set(Square::from_index(idx));
            }
        }
        colors == self.color_bb
            && types == self.piece_bb
            && self.pieces(Color::White, Piece::King).count() == 1
            && self.pieces(Color::Black, Piece::King).count() == 1
            && self.key == self.compute_key()
            && self.pawn_key == self.compute_pawn_key()
    }

    /// Apply a sequence of moves by UCI token, stopping silently at the
    /// first token that is not a legal move (UCI convention).
    pub fn apply_uci_moves<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) {
        for token in tokens {
            match self.parse_uci_move(token) {
                Some(mv) => {
                    self.make(mv);
                }
                None => break,
            }
        }
    }
}

