//! Staged move picker.
//!
//! Yields moves in cutoff-likelihood order without generating more than
//! necessary and without ever repeating a move: transposition move
//! first, then winning captures, killers, history-ordered quiets, and
//! finally the losing captures. Quiescence mode restricts the stream to
//! tactical moves.

use crate::board::{see_value, Move, MoveList, Piece, Position, Square, MAX_MOVES};

use super::history::HistoryTables;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    TtMove,
    GenCaptures,
    GoodCaptures,
    FirstKiller,
    SecondKiller,
    GenQuiets,
    Quiets,
    BadCaptures,
    Done,
}

/// Scored move bucket with incremental selection: each pick swaps the
/// best remaining entry to the cursor, so early cutoffs never pay for a
/// full sort.
struct ScoredMoves {
    moves: [(Move, i32); MAX_MOVES],
    len: usize,
    cursor: usize,
}

impl ScoredMoves {
    fn new() -> Self {
        ScoredMoves {
            moves: [(Move::null(), 0); MAX_MOVES],
            len: 0,
            cursor: 0,
        }
    }

    fn push(&mut self, mv: Move, score: i32) {
        self.moves[self.len] = (mv, score);
        self.len += 1;
    }

    fn pick_best(&mut self) -> Option<Move> {
        if self.cursor >= self.len {
            return None;
        }
        let mut best = self.cursor;
        for i in self.cursor + 1..self.len {
            if self.moves[i].1 > self.moves[best].1 {
                best = i;
            }
        }
        self.moves.swap(self.cursor, best);
        let mv = self.moves[self.cursor].0;
        self.cursor += 1;
        Some(mv)
    }
}

pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: [Move; 2],
    counter: Move,
    /// Previous move's piece and destination, for continuation history.
    prev: Option<(Piece, Square)>,
    good_captures: ScoredMoves,
    bad_captures: ScoredMoves,
    quiets: ScoredMoves,
    captures_only: bool,
    skip_bad_captures: bool,
}

impl MovePicker {
    /// Picker for a main-search node.
    #[must_use]
    pub fn new(
        pos: &Position,
        history: &HistoryTables,
        tt_move: Move,
        ply: usize,
        prev_move: Move,
        prev_piece: Option<Piece>,
    ) -> Self {
        let tt_move = if !tt_move.is_null() && pos.is_pseudo_legal(tt_move) {
            tt_move
        } else {
            Move::null()
        };
        let counter = history.counter_move(pos.side_to_move(), prev_move);
        let prev = prev_piece.map(|p| (p, prev_move.to()));
        MovePicker {
            stage: Stage::TtMove,
            tt_move,
            killers: history.killers_at(ply),
            counter,
            prev,
            good_captures: ScoredMoves::new(),
            bad_captures: ScoredMoves::new(),
            quiets: ScoredMoves::new(),
            captures_only: false,
            skip_bad_captures: false,
        }
    }

    /// Picker for quiescence: tactical moves only, stages 4-6 skipped.
    #[must_use]
    pub fn for_quiescence(pos: &Position, tt_move: Move, skip_bad_captures: bool) -> Self {
        let tt_move = if !tt_move.is_null() && tt_move.is_tactical() && pos.is_pseudo_legal(tt_move)
        {
            tt_move
        } else {
            Move::null()
        };
        MovePicker {
            stage: Stage::TtMove,
            tt_move,
            killers: [Move::null(); 2],
            counter: Move::null(),
            prev: None,
            good_captures: ScoredMoves::new(),
            bad_captures: ScoredMoves::new(),
            quiets: ScoredMoves::new(),
            captures_only: true,
            skip_bad_captures,
        }
    }

    /// Next move in staged order, or `None` when exhausted.
    pub fn next(&mut self, pos: &Position, history: &HistoryTables) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove => {
                    self.stage = Stage::GenCaptures;
                    if !self.tt_move.is_null() {
                        return Some(self.tt_move);
                    }
                }
                Stage::GenCaptures => {
                    self.score_captures(pos, history);
                    self.stage = Stage::GoodCaptures;
                }
                Stage::GoodCaptures => match self.good_captures.pick_best() {
                    Some(mv) => {
                        if mv != self.tt_move {
                            return Some(mv);
                        }
                    }
                    None => {
                        self.stage = if self.captures_only {
                            if self.skip_bad_captures {
                                Stage::Done
                            } else {
                                Stage::BadCaptures
                            }
                        } else {
                            Stage::FirstKiller
                        };
                    }
                },
                Stage::FirstKiller | Stage::SecondKiller => {
                    let killer = if self.stage == Stage::FirstKiller {
                        self.stage = Stage::SecondKiller;
                        self.killers[0]
                    } else {
                        self.stage = Stage::GenQuiets;
                        self.killers[1]
                    };
                    if !killer.is_null()
                        && killer != self.tt_move
                        && !killer.is_capture()
                        && pos.is_pseudo_legal(killer)
                    {
                        return Some(killer);
                    }
                }
                Stage::GenQuiets => {
                    self.score_quiets(pos, history);
                    self.stage = Stage::Quiets;
                }
                Stage::Quiets => match self.quiets.pick_best() {
                    Some(mv) => {
                        if mv != self.tt_move && mv != self.killers[0] && mv != self.killers[1] {
                            return Some(mv);
                        }
                    }
                    None => self.stage = Stage::BadCaptures,
                },
                Stage::BadCaptures => match self.bad_captures.pick_best() {
                    Some(mv) => {
                        if mv != self.tt_move {
                            return Some(mv);
                        }
                    }
                    None => self.stage = Stage::Done,
                },
                Stage::Done => return None,
            }
        }
    }

    /// Generate and score captures, splitting winning from losing by
    /// exchange outcome.
    fn score_captures(&mut self, pos: &Position, history: &HistoryTables) {
        let mut list = MoveList::new();
        pos.generate_captures(&mut list);
        let us = pos.side_to_move();

        for &mv in list.iter() {
            let attacker = pos.piece_on(mv.from()).unwrap_or(Piece::Pawn);
            let victim = if mv.is_en_passant() {
                Piece::Pawn
            } else {
                pos.piece_on(mv.to()).unwrap_or(Piece::Pawn)
            };

            let see = pos.see(mv);
            let mvv_lva = see_value(victim) * 8 - attacker.index() as i32 * 8;
            let cap_hist = history.capture_score(us, attacker, mv.to(), victim);
            let score = see + mvv_lva + cap_hist;

            if see >= 0 {
                self.good_captures.push(mv, score);
            } else {
                self.bad_captures.push(mv, score);
            }
        }
    }

    /// Generate and score quiets by main history, continuation history,
    /// and a bump for the counter move to the opponent's last move.
    fn score_quiets(&mut self, pos: &Position, history: &HistoryTables) {
        let mut list = MoveList::new();
        pos.generate_quiets(&mut list);
        let us = pos.side_to_move();

        for &mv in list.iter() {
            let piece = pos.piece_on(mv.from()).unwrap_or(Piece::Pawn);
            let mut score = history.main_score(us, piece, mv.to());
            if let Some((prev_piece, prev_to)) = self.prev {
                score += history.continuation_score(us, prev_piece, prev_to, piece, mv.to());
            }
            if mv == self.counter {
                score += 4000;
            }
            self.quiets.push(mv, score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Color, MoveFlag, Position};

    fn drain(pos: &Position, history: &HistoryTables, mut picker: MovePicker) -> Vec<Move> {
        let mut out = Vec::new();
        while let Some(mv) = picker.next(pos, history) {
            out.push(mv);
        }
        out
    }

    #[test]
    fn test_yields_every_pseudo_legal_move_once() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let history = HistoryTables::new();
        let picker = MovePicker::new(&pos, &history, Move::null(), 0, Move::null(), None);
        let yielded = drain(&pos, &history, picker);

        let mut expected = MoveList::new();
        pos.generate_moves(&mut expected);
        assert_eq!(yielded.len(), expected.len());

        let mut seen = std::collections::HashSet::new();
        for mv in &yielded {
            assert!(seen.insert(mv.as_u16()), "{mv} yielded twice");
            assert!(expected.contains(*mv));
        }
    }

    #[test]
    fn test_tt_move_comes_first() {
        let mut pos = Position::startpos();
        let history = HistoryTables::new();
        let tt_move = pos.parse_uci_move("d2d4").unwrap();
        let picker = MovePicker::new(&pos, &history, tt_move, 0, Move::null(), None);
        let yielded = drain(&pos, &history, picker);
        assert_eq!(yielded[0], tt_move);
        assert_eq!(yielded.iter().filter(|&&m| m == tt_move).count(), 1);
    }

    #[test]
    fn test_stale_tt_move_is_dropped() {
        let pos = Position::startpos();
        let history = HistoryTables::new();
        let stale = Move::new(Square::from_index(42), Square::from_index(50), MoveFlag::Quiet);
        let picker = MovePicker::new(&pos, &history, stale, 0, Move::null(), None);
        let yielded = drain(&pos, &history, picker);
        assert!(!yielded.contains(&stale));
        assert_eq!(yielded.len(), 20);
    }

    #[test]
    fn test_winning_capture_before_losing_capture() {
        // Rxd5 and Nxd5 win a pawn; Nxe4 runs into the d5 pawn.
        let pos =
            Position::from_fen("4k3/8/8/3p4/4p3/2N5/8/3RK3 w - - 0 1").unwrap();
        let history = HistoryTables::new();
        let picker = MovePicker::new(&pos, &history, Move::null(), 0, Move::null(), None);
        let yielded = drain(&pos, &history, picker);
        let captures: Vec<_> = yielded.iter().filter(|m| m.is_capture()).collect();
        assert!(!captures.is_empty());
        // All non-losing captures appear before any losing one.
        let mut seen_losing = false;
        for mv in &captures {
            let losing = pos.see(**mv) < 0;
            if losing {
                seen_losing = true;
            } else {
                assert!(!seen_losing, "winning capture after losing capture");
            }
        }
    }

    #[test]
    fn test_killer_ordering_beats_plain_quiets() {
        let pos = Position::startpos();
        let mut history = HistoryTables::new();
        let killer = Move::new(Square::from_index(12), Square::from_index(20), MoveFlag::Quiet);
        history.push_killer(0, killer);
        let picker = MovePicker::new(&pos, &history, Move::null(), 0, Move::null(), None);
        let yielded = drain(&pos, &history, picker);
        // No captures at startpos, so the killer leads.
        assert_eq!(yielded[0], killer);
    }

    #[test]
    fn test_quiescence_mode_yields_tactical_only() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let history = HistoryTables::new();
        let picker = MovePicker::for_quiescence(&pos, Move::null(), false);
        let yielded = drain(&pos, &history, picker);
        assert!(!yielded.is_empty());
        assert!(yielded.iter().all(|m| m.is_tactical()));
    }

    #[test]
    fn test_quiescence_skip_bad_captures() {
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let history = HistoryTables::new();
        let picker = MovePicker::for_quiescence(&pos, Move::null(), true);
        let yielded = drain(&pos, &history, picker);
        assert!(yielded.iter().all(|m| pos.see(*m) >= 0 || m.is_promotion()));
    }

    #[test]
    fn test_history_reorders_quiets() {
        let pos = Position::startpos();
        let mut history = HistoryTables::new();
        let favorite = Move::new(Square::from_index(1), Square::from_index(18), MoveFlag::Quiet);
        history.update_main(Color::White, Piece::Knight, Square::from_index(18), 8000);
        let picker = MovePicker::new(&pos, &history, Move::null(), 0, Move::null(), None);
        let yielded = drain(&pos, &history, picker);
        assert_eq!(yielded[0], favorite, "high-history quiet should lead");
    }
}
