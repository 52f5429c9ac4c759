//! Board representation: bitboards, position state, move generation,
//! and static exchange evaluation.

pub mod attacks;
mod error;
mod fen;
mod make_unmake;
mod movegen;
mod see;
mod state;
mod types;
mod validate;
pub mod zobrist;

pub use error::FenError;
pub use fen::STARTPOS_FEN;
pub use see::{see_value, SEE_VALUES};
pub use state::Position;
pub use types::{
    Bitboard, CastleRooks, CastleSide, CastlingRights, Color, Move, MoveFlag, MoveList, Piece,
    Square, MAX_MOVES, MAX_PLY,
};
