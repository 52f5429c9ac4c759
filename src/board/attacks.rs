//! Precomputed attack tables and sliding-attack generation.
//!
//! Leaper attacks (pawn, knight, king) come from lazily built lookup
//! tables. Sliding attacks walk the four (or eight) rays from the
//! origin until the first blocker; the blocker square itself is always
//! included so captures are generated naturally.

use once_cell::sync::Lazy;

use super::types::{Bitboard, Color, Piece, Square};

const KNIGHT_DELTAS: [(i32, i32); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_DELTAS: [(i32, i32); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

const BISHOP_DIRS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];
const ROOK_DIRS: [(i32, i32); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

fn leaper_mask(sq: Square, deltas: &[(i32, i32)]) -> Bitboard {
    let mut bb = Bitboard::EMPTY;
    for &(df, dr) in deltas {
        let f = sq.file() as i32 + df;
        let r = sq.rank() as i32 + dr;
        if (0..8).contains(&f) && (0..8).contains(&r) {
            bb.set(Square::new(f as usize, r as usize));
        }
    }
    bb
}

static KNIGHT_ATTACKS: Lazy<[Bitboard; 64]> = Lazy::new(|| {
    let mut table = [Bitboard::EMPTY; 64];
    for (idx, entry) in table.iter_mut().enumerate() {
        *entry = leaper_mask(Square::from_index(idx), &KNIGHT_DELTAS);
    }
    table
});

static KING_ATTACKS: Lazy<[Bitboard; 64]> = Lazy::new(|| {
    let mut table = [Bitboard::EMPTY; 64];
    for (idx, entry) in table.iter_mut().enumerate() {
        *entry = leaper_mask(Square::from_index(idx), &KING_DELTAS);
    }
    table
});

static PAWN_ATTACKS: Lazy<[[Bitboard; 64]; 2]> = Lazy::new(|| {
    let mut table = [[Bitboard::EMPTY; 64]; 2];
    for idx in 0..64 {
        let bb = Bitboard(1 << idx);
        table[Color::White.index()][idx] = bb.pawn_attacks(true);
        table[Color::Black.index()][idx] = bb.pawn_attacks(false);
    }
    table
});

/// Squares strictly between two aligned squares; empty when the squares
/// do not share a rank, file, or diagonal.
static BETWEEN: Lazy<Box<[[Bitboard; 64]; 64]>> = Lazy::new(|| {
    let mut table = Box::new([[Bitboard::EMPTY; 64]; 64]);
    for a in 0..64usize {
        let sa = Square::from_index(a);
        for &(df, dr) in BISHOP_DIRS.iter().chain(ROOK_DIRS.iter()) {
            let mut path = Bitboard::EMPTY;
            let mut f = sa.file() as i32 + df;
            let mut r = sa.rank() as i32 + dr;
            while (0..8).contains(&f) && (0..8).contains(&r) {
                let sb = Square::new(f as usize, r as usize);
                table[a][sb.index()] = path;
                path.set(sb);
                f += df;
                r += dr;
            }
        }
    }
    table
});

#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> Bitboard {
    KNIGHT_ATTACKS[sq.index()]
}

#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> Bitboard {
    KING_ATTACKS[sq.index()]
}

#[inline]
#[must_use]
pub fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    PAWN_ATTACKS[color.index()][sq.index()]
}

#[inline]
#[must_use]
pub fn between(a: Square, b: Square) -> Bitboard {
    BETWEEN[a.index()][b.index()]
}

fn ray_attacks(sq: Square, occupied: Bitboard, dirs: &[(i32, i32); 4]) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    for &(df, dr) in dirs {
        let mut f = sq.file() as i32 + df;
        let mut r = sq.rank() as i32 + dr;
        while (0..8).contains(&f) && (0..8).contains(&r) {
            let target = Square::new(f as usize, r as usize);
            attacks.set(target);
            if occupied.contains(target) {
                break;
            }
            f += df;
            r += dr;
        }
    }
    attacks
}

#[inline]
#[must_use]
pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    ray_attacks(sq, occupied, &BISHOP_DIRS)
}

#[inline]
#[must_use]
pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    ray_attacks(sq, occupied, &ROOK_DIRS)
}

#[inline]
#[must_use]
pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    bishop_attacks(sq, occupied) | rook_attacks(sq, occupied)
}

/// Attack set for any piece type from `sq` with the given occupancy.
#[must_use]
pub fn piece_attacks(piece: Piece, color: Color, sq: Square, occupied: Bitboard) -> Bitboard {
    match piece {
        Piece::Pawn => pawn_attacks(color, sq),
        Piece::Knight => knight_attacks(sq),
        Piece::Bishop => bishop_attacks(sq, occupied),
        Piece::Rook => rook_attacks(sq, occupied),
        Piece::Queen => queen_attacks(sq, occupied),
        Piece::King => king_attacks(sq),
    }
}
