//! Iterative deepening: the root loop every worker runs.
//!
//! Root moves are generated once and re-sorted by score between
//! iterations. The master searches with aspiration windows and does all
//! reporting; helpers run full windows over their stripe of the root
//! list and feed the shared table.

use std::sync::atomic::Ordering;

use crate::board::Move;
use crate::tt::Bound;

use super::params::{ASPIRATION_DELTA, ASPIRATION_MAX_DELTA};
use super::worker::WorkerState;
use super::{score_to_tt, IterationInfo, SearchResult, INFINITY_SCORE, MAX_PLY_DEPTH};

impl WorkerState {
    /// Run iterative deepening over the prepared root position and
    /// return the last completed result.
    pub fn iterate(&mut self) -> SearchResult {
        let max_depth = self
            .limits
            .depth
            .unwrap_or(MAX_PLY_DEPTH)
            .clamp(1, MAX_PLY_DEPTH);

        let mut result = SearchResult::default();
        if self.root_moves.is_empty() {
            return result;
        }

        // A prior table hit fronts the list for depth 1.
        if let Some(hit) = self.shared.tt.probe(self.pos.key()) {
            if let Some(idx) = self.root_moves.iter().position(|rm| rm.mv == hit.mv) {
                self.root_moves[idx].score = INFINITY_SCORE;
            }
        }
        self.root_moves.sort_by_key(|rm| -rm.score);

        let mut prev_score = 0;

        for depth in 1..=max_depth {
            if self.check_stop() {
                break;
            }
            if self.should_skip_deeper(depth) {
                break;
            }

            if depth > 1 {
                self.root_moves.sort_by_key(|rm| -rm.score);
            }

            let Some(score) = self.search_root_with_aspiration(depth, prev_score) else {
                break;
            };
            prev_score = score;

            // Best completed root move for this depth.
            let best = self
                .root_moves
                .iter()
                .max_by_key(|rm| rm.score)
                .copied()
                .expect("non-empty root list");

            result = SearchResult {
                best_move: Some(best.mv),
                score: best.score,
                depth,
            };

            if self.is_master() {
                self.flush_nodes();
                self.shared.tt.store(
                    self.pos.key(),
                    best.mv,
                    score_to_tt(best.score, 0),
                    0,
                    depth,
                    Bound::Exact,
                );
                self.report(depth, best.score);
            }
        }

        result
    }

    /// Aspiration loop around one root search; `None` when stopped
    /// before the depth completed.
    fn search_root_with_aspiration(&mut self, depth: i32, prev_score: i32) -> Option<i32> {
        let mut use_aspiration = self.is_master() && depth >= 2;
        let mut delta = ASPIRATION_DELTA;
        let (mut alpha, mut beta) = if use_aspiration {
            (
                (prev_score - delta).max(-INFINITY_SCORE),
                (prev_score + delta).min(INFINITY_SCORE),
            )
        } else {
            (-INFINITY_SCORE, INFINITY_SCORE)
        };

        loop {
            if self.check_stop() {
                return None;
            }

            let best_score = self.search_root(depth, alpha, beta);
            if self.stopped {
                return None;
            }
            if !use_aspiration {
                return Some(best_score);
            }

            // Compare against the window actually searched; a mutated
            // working alpha would mask fail-lows.
            if best_score <= alpha || best_score >= beta {
                delta += delta / 2;
                alpha = (best_score - delta).max(-INFINITY_SCORE);
                beta = (best_score + delta).min(INFINITY_SCORE);
                if delta > ASPIRATION_MAX_DELTA {
                    alpha = -INFINITY_SCORE;
                    beta = INFINITY_SCORE;
                    use_aspiration = false;
                }
                continue;
            }
            return Some(best_score);
        }
    }

    /// One pass over the root moves: PVS with the first move on the
    /// full window. Helpers only touch their stripe of the list.
    fn search_root(&mut self, depth: i32, alpha: i32, beta: i32) -> i32 {
        let mut best_score = -INFINITY_SCORE;
        let mut working_alpha = alpha;

        for i in 0..self.root_moves.len() {
            if !self.is_master() && i % self.num_workers != self.id {
                continue;
            }

            let mv = self.root_moves[i].mv;
            self.moves_at[0] = mv;
            self.pieces_at[0] = self.pos.piece_on(mv.from());
            self.pos.make(mv);

            let score = if i == 0 && self.is_master() {
                -self.negamax(depth - 1, -beta, -working_alpha, 1, true, Move::null())
            } else {
                let mut score = -self.negamax(
                    depth - 1,
                    -working_alpha - 1,
                    -working_alpha,
                    1,
                    true,
                    Move::null(),
                );
                if score > working_alpha && score < beta {
                    score =
                        -self.negamax(depth - 1, -beta, -working_alpha, 1, true, Move::null());
                }
                score
            };

            self.pos.unmake(mv);
            if self.stopped {
                break;
            }

            self.root_moves[i].score = score;
            if score > best_score {
                best_score = score;
            }
            if score > working_alpha {
                working_alpha = score;
            }
            if working_alpha >= beta && self.is_master() {
                break;
            }
        }

        best_score
    }

    /// Soft time management: do not start a depth that cannot finish.
    fn should_skip_deeper(&self, depth: i32) -> bool {
        if depth <= 1 || !self.is_master() {
            return false;
        }
        match self.allocated_ms {
            Some(budget) => self.start.elapsed().as_millis() as u64 * 2 >= budget,
            None => false,
        }
    }

    /// Emit the per-depth info line through the UCI callback.
    fn report(&mut self, depth: i32, score: i32) {
        let Some(callback) = self.info.clone() else {
            return;
        };
        let elapsed = self.start.elapsed();
        let nodes = self.shared.total_nodes.load(Ordering::Relaxed);
        let time_ms = elapsed.as_millis() as u64;
        let nps = if elapsed.as_micros() > 0 {
            (nodes as u128 * 1_000_000 / elapsed.as_micros()) as u64
        } else {
            0
        };
        let info = IterationInfo {
            depth,
            seldepth: self.seldepth,
            score,
            nodes,
            time_ms,
            nps,
            hashfull: self.shared.tt.hashfull(),
            pv: self.extract_pv(depth),
        };
        callback(&info);
    }

    /// Walk the table from the root to reconstruct the principal
    /// variation, guarding against cycles and stale moves.
    fn extract_pv(&self, max_len: i32) -> Vec<Move> {
        let mut pv = Vec::new();
        let mut pos = self.pos.clone();
        let mut seen_keys = vec![pos.key()];

        for _ in 0..max_len.max(1) {
            let Some(hit) = self.shared.tt.probe(pos.key()) else {
                break;
            };
            let mv = hit.mv;
            if mv.is_null() || !pos.is_pseudo_legal(mv) || pos.leaves_king_in_check(mv) {
                break;
            }
            pos.make(mv);
            if seen_keys.contains(&pos.key()) {
                pv.push(mv);
                break;
            }
            seen_keys.push(pos.key());
            pv.push(mv);
        }
        pv
    }
}
