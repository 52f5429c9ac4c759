//! Search: negamax workers, staged move picking, iterative deepening,
//! and the thread pool that hosts them.

mod deepening;
mod history;
mod negamax;
mod picker;
mod qsearch;
mod time;
mod worker;

pub use history::HistoryTables;
pub use picker::MovePicker;
pub use time::allocate_time;
pub use worker::{SearchContext, SearchShared, WorkerState};

use std::sync::Arc;

use crate::board::{Move, MAX_PLY};

pub const INFINITY_SCORE: i32 = 32000;
pub const MATE_SCORE: i32 = 31000;
/// Scores at or beyond this magnitude encode a forced mate.
pub const MATE_BOUND: i32 = MATE_SCORE - MAX_PLY as i32;
/// Deepest iteration the root loop will attempt.
pub const MAX_PLY_DEPTH: i32 = MAX_PLY as i32 - 1;
/// Sentinel returned up the stack after a cooperative stop; the
/// iterative deepener discards it.
pub const STOP_SENTINEL: i32 = 0;

/// Mate scores are stored ply-independent: encode by pushing the score
/// away from zero by `ply`, decode symmetrically.
#[inline]
#[must_use]
pub fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_BOUND {
        score + ply as i32
    } else if score <= -MATE_BOUND {
        score - ply as i32
    } else {
        score
    }
}

#[inline]
#[must_use]
pub fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_BOUND {
        score - ply as i32
    } else if score <= -MATE_BOUND {
        score + ply as i32
    } else {
        score
    }
}

/// Moves until mate, signed; `None` for non-mate scores.
#[must_use]
pub fn mate_distance(score: i32) -> Option<i32> {
    if score >= MATE_BOUND {
        Some((MATE_SCORE - score + 1) / 2)
    } else if score <= -MATE_BOUND {
        Some(-(MATE_SCORE + score + 1) / 2)
    } else {
        None
    }
}

/// Everything `go` can constrain, plus the feature gates that UCI
/// options toggle.
#[derive(Clone, Debug)]
pub struct SearchLimits {
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    /// Remaining clock per color, milliseconds.
    pub time: [Option<u64>; 2],
    /// Increment per color, milliseconds.
    pub inc: [u64; 2],
    pub movestogo: Option<u32>,
    pub infinite: bool,
    pub move_overhead_ms: u64,
    pub use_null_move: bool,
    pub use_probcut: bool,
    pub use_singular: bool,
    pub use_history: bool,
    pub contempt: i32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            depth: None,
            nodes: None,
            movetime: None,
            time: [None, None],
            inc: [0, 0],
            movestogo: None,
            infinite: false,
            move_overhead_ms: 10,
            use_null_move: true,
            use_probcut: true,
            use_singular: true,
            use_history: true,
            contempt: 0,
        }
    }
}

/// Per-iteration report the master hands to the UCI layer.
#[derive(Clone, Debug)]
pub struct IterationInfo {
    pub depth: i32,
    pub seldepth: u32,
    pub score: i32,
    pub nodes: u64,
    pub time_ms: u64,
    pub nps: u64,
    pub hashfull: u32,
    pub pv: Vec<Move>,
}

pub type InfoCallback = Arc<dyn Fn(&IterationInfo) + Send + Sync>;

/// Outcome of a completed search.
#[derive(Clone, Debug, Default)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub score: i32,
    pub depth: i32,
}

// ---------------------------------------------------------------------
// Tuned parameters
// ---------------------------------------------------------------------

pub(crate) mod params {
    /// Reverse futility: prune when eval - MARGIN * depth >= beta.
    pub const RFP_MAX_DEPTH: i32 = 3;
    pub const RFP_MARGIN: i32 = 120;

    pub const NMP_MIN_DEPTH: i32 = 3;
    pub const NMP_BASE_REDUCTION: i32 = 2;
    pub const NMP_DEEP_THRESHOLD: i32 = 8;
    pub const NMP_VERIFY_DEPTH: i32 = 6;

    pub const PROBCUT_MIN_DEPTH: i32 = 5;
    pub const PROBCUT_MARGIN: i32 = 200;
    pub const PROBCUT_REDUCTION: i32 = 4;
    pub const PROBCUT_MAX_CAPTURES: usize = 6;

    pub const IID_MIN_DEPTH: i32 = 5;
    pub const IID_REDUCTION: i32 = 2;

    pub const SINGULAR_MIN_DEPTH: i32 = 6;
    /// Fixed margin below the table score for the singular test window.
    pub const SINGULAR_MARGIN: i32 = 60;

    /// Quiets tried before late-move pruning cuts, by depth.
    pub const LMP_TABLE: [usize; 6] = [0, 3, 5, 8, 12, 20];
    pub const LMP_MAX_DEPTH: i32 = 5;

    pub const FUTILITY_MAX_DEPTH: i32 = 6;
    pub const FUTILITY_MARGIN: i32 = 150;
    pub const FUTILITY_NONPV_MAX_DEPTH: i32 = 4;
    pub const FUTILITY_NONPV_MARGIN: i32 = 100;
    pub const FUTILITY_NONPV_BASE: i32 = 50;

    pub const SEE_PRUNE_MIN_DEPTH: i32 = 4;
    pub const SEE_PRUNE_MAX_DEPTH: i32 = 5;
    pub const SEE_PRUNE_MARGIN: i32 = -50;

    /// Quiescence delta pruning margin.
    pub const QS_DELTA_MARGIN: i32 = 975;

    /// Stop-flag poll granularity in nodes.
    pub const NODE_POLL_MASK: u64 = 1023;

    /// Aspiration window: initial half-width, growth, give-up point.
    pub const ASPIRATION_DELTA: i32 = 15;
    pub const ASPIRATION_MAX_DELTA: i32 = 2000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mate_encoding_roundtrip() {
        for ply in [0usize, 1, 5, 63, 127] {
            for score in [
                0,
                150,
                -987,
                MATE_SCORE - 1,
                -(MATE_SCORE - 1),
                MATE_BOUND,
                -MATE_BOUND,
            ] {
                assert_eq!(
                    score_from_tt(score_to_tt(score, ply), ply),
                    score,
                    "score {score} at ply {ply}"
                );
            }
        }
    }

    #[test]
    fn test_tt_encoding_is_ply_independent() {
        // Mate-in-3 found at ply 4 and probed at ply 2 must decode to a
        // mate-in-4-from-there score.
        let found = MATE_SCORE - 7; // mate at ply 7, seen from ply 4
        let stored = score_to_tt(found, 4);
        assert_eq!(stored, MATE_SCORE - 3);
        let decoded = score_from_tt(stored, 2);
        assert_eq!(decoded, MATE_SCORE - 5);
    }

    #[test]
    fn test_mate_distance_signs() {
        assert_eq!(mate_distance(MATE_SCORE - 1), Some(1));
        assert_eq!(mate_distance(MATE_SCORE - 4), Some(2));
        assert_eq!(mate_distance(-(MATE_SCORE - 2)), Some(-1));
        assert_eq!(mate_distance(500), None);
    }

    #[test]
    fn test_limits_default_enables_all_features() {
        let limits = SearchLimits::default();
        assert!(limits.use_null_move);
        assert!(limits.use_probcut);
        assert!(limits.use_singular);
        assert!(limits.use_history);
        assert!(!limits.infinite);
    }

    /// Entering the kernel at depth 0 is exactly a quiescence call.
    #[test]
    fn test_depth_zero_reduces_to_quiescence() {
        use std::sync::atomic::AtomicBool;

        use crate::board::Position;

        let fens = [
            crate::board::STARTPOS_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "4k3/8/8/3r4/4P3/8/8/4K3 w - - 0 1",
        ];
        for fen in fens {
            let shared = SearchShared::with_hash(1);
            let stop = Arc::new(AtomicBool::new(false));
            for window in [(-50, 50), (-INFINITY_SCORE, INFINITY_SCORE), (-300, -200)] {
                let mut a = WorkerState::new(0, Arc::clone(&shared), Arc::clone(&stop));
                a.pos = Position::from_fen(fen).unwrap();
                let through_search = a.negamax(0, window.0, window.1, 1, false, Move::null());

                let mut b = WorkerState::new(0, Arc::clone(&shared), Arc::clone(&stop));
                b.pos = Position::from_fen(fen).unwrap();
                let direct = b.qsearch(window.0, window.1, 1);

                assert_eq!(through_search, direct, "{fen} with window {window:?}");
            }
        }
    }
}
