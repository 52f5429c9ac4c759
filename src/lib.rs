//! Aether - a UCI chess engine with self-play data generation.
//!
//! The crate is organized in three layers: the board layer (bitboard
//! position, move generation, static exchange evaluation), the search
//! layer (negamax workers around a shared transposition table), and
//! the front-ends (the UCI loop and the datagen binary).

pub mod board;
pub mod datagen;
pub mod eval;
pub mod logger;
pub mod search;
pub mod tt;
pub mod uci;
