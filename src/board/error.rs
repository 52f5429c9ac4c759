//! Error types for board-boundary operations.

use std::fmt;

/// FEN parsing failure. The position is left in its defined empty state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    TooFewFields { found: usize },
    InvalidPiece { ch: char },
    InvalidRankCount { ranks: usize },
    OverfullRank { rank: usize },
    InvalidSideToMove { found: String },
    InvalidCastling { ch: char },
    InvalidEnPassant { found: String },
    MissingKing,
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::TooFewFields { found } => {
                write!(f, "FEN needs at least 4 fields, found {found}")
            }
            FenError::InvalidPiece { ch } => write!(f, "invalid piece character '{ch}'"),
            FenError::InvalidRankCount { ranks } => {
                write!(f, "FEN board must have 8 ranks, found {ranks}")
            }
            FenError::OverfullRank { rank } => write!(f, "rank {rank} describes more than 8 files"),
            FenError::InvalidSideToMove { found } => {
                write!(f, "side to move must be 'w' or 'b', found '{found}'")
            }
            FenError::InvalidCastling { ch } => write!(f, "invalid castling character '{ch}'"),
            FenError::InvalidEnPassant { found } => {
                write!(f, "invalid en passant square '{found}'")
            }
            FenError::MissingKing => write!(f, "each side needs exactly one king"),
        }
    }
}

impl std::error::Error for FenError {}
