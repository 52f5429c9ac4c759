//! The negamax kernel: fail-soft alpha-beta with principal-variation
//! search and the full selectivity stack.

use std::sync::atomic::Ordering;

use crate::board::{Move, MoveList, Piece, MAX_PLY};
use crate::tt::Bound;

use super::params::{
    FUTILITY_MARGIN, FUTILITY_MAX_DEPTH, FUTILITY_NONPV_BASE, FUTILITY_NONPV_MARGIN,
    FUTILITY_NONPV_MAX_DEPTH, IID_MIN_DEPTH, IID_REDUCTION, LMP_MAX_DEPTH, LMP_TABLE,
    NMP_BASE_REDUCTION, NMP_DEEP_THRESHOLD, NMP_MIN_DEPTH, NMP_VERIFY_DEPTH, NODE_POLL_MASK,
    PROBCUT_MARGIN, PROBCUT_MAX_CAPTURES, PROBCUT_MIN_DEPTH, PROBCUT_REDUCTION,
    SEE_PRUNE_MARGIN, SEE_PRUNE_MAX_DEPTH, SEE_PRUNE_MIN_DEPTH, SINGULAR_MARGIN,
    SINGULAR_MIN_DEPTH,
};
use super::worker::WorkerState;
use super::{
    score_from_tt, score_to_tt, HistoryTables, MovePicker, INFINITY_SCORE, MATE_BOUND, MATE_SCORE,
    STOP_SENTINEL,
};

/// Reduction table indexed by min(depth, 63) and min(move number, 63).
fn lmr_reduction(depth: i32, move_number: i32) -> i32 {
    use once_cell::sync::Lazy;
    static TABLE: Lazy<Box<[[i8; 64]; 64]>> = Lazy::new(|| {
        let mut table = Box::new([[0i8; 64]; 64]);
        for (d, row) in table.iter_mut().enumerate() {
            for (m, cell) in row.iter_mut().enumerate() {
                if d >= 3 && m >= 2 {
                    *cell = (1.0 + (d as f64).ln() * (m as f64).ln() / 2.0) as i8;
                }
            }
        }
        table
    });
    TABLE[depth.clamp(0, 63) as usize][move_number.clamp(0, 63) as usize] as i32
}

impl WorkerState {
    /// Stop poll: the master enforces the clock and node budget, the
    /// helpers only read the shared flag. Polled every 1024 nodes.
    pub(crate) fn check_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.nodes & NODE_POLL_MASK == 0 {
            self.flush_nodes();
            if self.is_master() {
                let mut expired = false;
                if let Some(budget) = self.allocated_ms {
                    expired |= self.start.elapsed().as_millis() as u64 >= budget;
                }
                if let Some(cap) = self.limits.nodes {
                    expired |= self.shared.total_nodes.load(Ordering::Relaxed) >= cap;
                }
                if expired {
                    self.stop.store(true, Ordering::Release);
                }
            }
            if self.stop.load(Ordering::Acquire) {
                self.stopped = true;
            }
        }
        self.stopped
    }

    /// Search a node. The return is side-to-move relative and fail-soft;
    /// `excluded` carves one move out of the tree for singular testing.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn negamax(
        &mut self,
        mut depth: i32,
        mut alpha: i32,
        mut beta: i32,
        ply: usize,
        null_allowed: bool,
        excluded: Move,
    ) -> i32 {
        self.nodes += 1;
        if self.check_stop() {
            return STOP_SENTINEL;
        }

        if ply >= MAX_PLY - 1 {
            return self.evaluator.evaluate(&self.pos);
        }
        self.seldepth = self.seldepth.max(ply as u32 + 1);

        if ply > 0 && (self.pos.is_fifty_move_draw() || self.pos.is_repetition()) {
            return 0;
        }

        // Mate-distance pruning: even an immediate mate cannot beat a
        // shorter one already on the path.
        let original_alpha = alpha;
        if ply > 0 {
            alpha = alpha.max(-(MATE_SCORE - ply as i32));
            beta = beta.min(MATE_SCORE - ply as i32 - 1);
            if alpha >= beta {
                return alpha;
            }
        }

        let in_check = self.pos.in_check();
        let is_pv = beta - alpha > 1;
        if in_check {
            depth += 1;
        }

        if depth <= 0 {
            return self.qsearch(alpha, beta, ply);
        }

        let excluded_active = !excluded.is_null();

        // Transposition probe. Scores cross the table in ply-independent
        // form and are rebased to this ply on the way out.
        let mut tt_move = Move::null();
        let mut tt_score = -INFINITY_SCORE;
        let mut tt_bound = Bound::None;
        let mut tt_depth = -1;
        let mut tt_eval: Option<i32> = None;
        if !excluded_active {
            if let Some(hit) = self.shared.tt.probe(self.pos.key()) {
                tt_move = hit.mv;
                tt_score = score_from_tt(hit.score, ply);
                tt_bound = hit.bound;
                tt_depth = hit.depth;
                tt_eval = Some(hit.eval);

                if hit.depth >= depth {
                    match hit.bound {
                        Bound::Exact => return tt_score,
                        Bound::Lower if tt_score >= beta => return tt_score,
                        Bound::Upper if tt_score <= alpha => return alpha,
                        _ => {}
                    }
                }
            }
        }

        // Internal iterative deepening: no table move at high depth
        // means the previous probe missed; a reduced search refills it.
        if depth >= IID_MIN_DEPTH && tt_move.is_null() && !excluded_active {
            self.negamax(depth - IID_REDUCTION, alpha, beta, ply, false, Move::null());
            if let Some(hit) = self.shared.tt.probe(self.pos.key()) {
                tt_move = hit.mv;
            }
        }

        // Singular extension: if every alternative fails well below the
        // table score, the table move is the only move and deserves an
        // extra ply.
        let mut singular_ext = 0;
        if self.limits.use_singular
            && !excluded_active
            && ply > 0
            && depth >= SINGULAR_MIN_DEPTH
            && !tt_move.is_null()
            && tt_bound == Bound::Exact
            && tt_depth >= depth - 1
            && tt_score.abs() < MATE_BOUND
        {
            let singular_beta = tt_score - SINGULAR_MARGIN;
            let alt = self.negamax(
                depth - 2,
                singular_beta - 1,
                singular_beta,
                ply,
                false,
                tt_move,
            );
            if alt < singular_beta {
                singular_ext = 1;
            }
        }

        let static_eval = if in_check {
            -INFINITY_SCORE
        } else {
            tt_eval
                .filter(|&e| e != 0)
                .unwrap_or_else(|| self.evaluator.evaluate_lazy(&self.pos, alpha, beta))
        };

        if !in_check && !is_pv && !excluded_active {
            // Reverse futility: standing this far above beta at low
            // depth is not going to be refuted.
            if depth <= super::params::RFP_MAX_DEPTH
                && static_eval - super::params::RFP_MARGIN * depth >= beta
            {
                return static_eval;
            }

            // ProbCut: a good capture clearing beta by a margin at
            // reduced depth cuts the node.
            if self.limits.use_probcut
                && depth >= PROBCUT_MIN_DEPTH
                && beta.abs() < MATE_SCORE - 100
            {
                if let Some(score) = self.probcut(depth, beta, ply) {
                    return score;
                }
                if self.stopped {
                    return STOP_SENTINEL;
                }
            }

            // Null move: hand over the move; a reduced refutation-free
            // search still clearing beta proves the position is too
            // good. Verified without null moves at depth >= 6.
            if self.limits.use_null_move
                && null_allowed
                && depth >= NMP_MIN_DEPTH
                && static_eval >= beta
                && self.pos.has_non_pawn_material(self.pos.side_to_move())
            {
                let reduction =
                    NMP_BASE_REDUCTION + i32::from(depth >= NMP_DEEP_THRESHOLD);
                self.pos.make_null();
                let score = -self.negamax(
                    depth - 1 - reduction,
                    -beta,
                    -beta + 1,
                    ply + 1,
                    false,
                    Move::null(),
                );
                self.pos.unmake_null();
                if self.stopped {
                    return STOP_SENTINEL;
                }
                if score >= beta {
                    if depth >= NMP_VERIFY_DEPTH {
                        let verified =
                            self.negamax(depth - 1, alpha, beta, ply, false, Move::null());
                        if verified >= beta {
                            return beta;
                        }
                    } else {
                        return beta;
                    }
                }
            }
        }

        let prev_move = if ply > 0 {
            self.moves_at[ply - 1]
        } else {
            Move::null()
        };
        let prev_piece = if ply > 0 { self.pieces_at[ply - 1] } else { None };

        let mut picker =
            MovePicker::new(&self.pos, &self.history, tt_move, ply, prev_move, prev_piece);

        let mut best_score = -INFINITY_SCORE;
        let mut best_move = Move::null();
        let mut moves_searched = 0i32;
        let mut tried_quiets: [Move; 64] = [Move::null(); 64];
        let mut tried_quiets_len = 0usize;

        while let Some(mv) = picker.next(&self.pos, &self.history) {
            if mv == excluded {
                continue;
            }

            let is_quiet = !mv.is_tactical();
            let is_promo = mv.is_promotion();

            // Late-move pruning: enough quiets tried at low depth.
            if is_quiet
                && !in_check
                && depth <= LMP_MAX_DEPTH
                && moves_searched >= LMP_TABLE[depth as usize] as i32
                && !is_pv
            {
                break;
            }

            // Futility: a quiet move cannot lift a hopeless static eval.
            if is_quiet
                && !in_check
                && depth < FUTILITY_MAX_DEPTH
                && static_eval + FUTILITY_MARGIN * depth <= alpha
            {
                continue;
            }
            if is_quiet
                && !in_check
                && !is_pv
                && depth <= FUTILITY_NONPV_MAX_DEPTH
                && static_eval + FUTILITY_NONPV_MARGIN * depth + FUTILITY_NONPV_BASE <= alpha
            {
                continue;
            }

            // SEE pruning for losing captures in the mid depths.
            let mut see_score = i32::MAX;
            if mv.is_capture() && !in_check && !is_promo {
                if depth <= SEE_PRUNE_MAX_DEPTH {
                    see_score = self.pos.see(mv);
                }
                if (SEE_PRUNE_MIN_DEPTH..=SEE_PRUNE_MAX_DEPTH).contains(&depth)
                    && see_score < SEE_PRUNE_MARGIN * (depth - 1)
                {
                    continue;
                }
            }

            let moving_piece = self.pos.piece_on(mv.from());

            self.pos.make(mv);
            // Legality filter: generation is not pin-aware.
            let us = !self.pos.side_to_move();
            if self.pos.is_attacked(self.pos.king_sq(us), self.pos.side_to_move()) {
                self.pos.unmake(mv);
                continue;
            }

            let gives_check = self.pos.in_check();
            if depth <= 3
                && mv.is_capture()
                && !is_promo
                && !in_check
                && !gives_check
                && see_score != i32::MAX
                && see_score < 0
            {
                self.pos.unmake(mv);
                continue;
            }

            self.shared.tt.prefetch(self.pos.key());
            moves_searched += 1;
            if is_quiet && tried_quiets_len < tried_quiets.len() {
                tried_quiets[tried_quiets_len] = mv;
                tried_quiets_len += 1;
            }
            self.moves_at[ply] = mv;
            self.pieces_at[ply] = moving_piece;

            // Extensions: recapture on the same square, the singular
            // table move, pushes to the seventh rank, promotions.
            let mut ext = 0;
            if !prev_move.is_null() && mv.to() == prev_move.to() && mv.is_tactical() {
                ext = 1;
            }
            if mv == tt_move {
                ext += singular_ext;
            }
            if ext == 0 && moving_piece == Some(Piece::Pawn) {
                let rel_rank = mv.to().relative_rank(us.is_white());
                if rel_rank == 6 || is_promo {
                    ext = 1;
                }
            }

            let mut score;
            if moves_searched == 1 {
                score = -self.negamax(depth - 1 + ext, -beta, -alpha, ply + 1, true, Move::null());
            } else {
                let mut reduction = 0;
                if depth >= 3 && !in_check {
                    reduction = lmr_reduction(depth, moves_searched);
                    if is_quiet {
                        reduction += 1;
                    }
                    if ext > 0 || mv.is_tactical() || gives_check {
                        reduction = 0;
                    }
                    reduction = reduction.clamp(0, depth - 1);
                }

                score = -self.negamax(
                    depth - 1 - reduction + ext,
                    -alpha - 1,
                    -alpha,
                    ply + 1,
                    true,
                    Move::null(),
                );
                if score > alpha && reduction > 0 {
                    score = -self.negamax(
                        depth - 1 + ext,
                        -alpha - 1,
                        -alpha,
                        ply + 1,
                        true,
                        Move::null(),
                    );
                }
                if score > alpha && score < beta {
                    score =
                        -self.negamax(depth - 1 + ext, -beta, -alpha, ply + 1, true, Move::null());
                }
            }

            self.pos.unmake(mv);
            if self.stopped {
                return STOP_SENTINEL;
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
            }

            if score > alpha {
                alpha = score;
                let bonus = HistoryTables::bonus(depth).min(400);
                if score < beta {
                    if mv.is_capture() {
                        self.reward_capture(mv, bonus / 2);
                    }
                } else {
                    // Beta cutoff: reward the refutation, punish the
                    // quiets that were tried before it.
                    self.on_beta_cutoff(mv, ply, prev_move, prev_piece, bonus, &tried_quiets[..tried_quiets_len]);
                    break;
                }
            }
        }

        if moves_searched == 0 {
            if excluded_active {
                // Everything was excluded: report a fail-low to the
                // singular test instead of a phantom mate.
                return alpha;
            }
            return if in_check { -MATE_SCORE + ply as i32 } else { 0 };
        }

        if !excluded_active && !self.stopped {
            let bound = if best_score <= original_alpha {
                Bound::Upper
            } else if best_score >= beta {
                Bound::Lower
            } else {
                Bound::Exact
            };
            let stored_eval = if in_check { 0 } else { static_eval };
            self.shared.tt.store(
                self.pos.key(),
                best_move,
                score_to_tt(best_score, ply),
                stored_eval,
                depth,
                bound,
            );
        }

        best_score
    }

    /// ProbCut: run up to six winning captures through a null-window
    /// search at reduced depth against beta plus a margin.
    fn probcut(&mut self, depth: i32, beta: i32, ply: usize) -> Option<i32> {
        let threshold = beta + PROBCUT_MARGIN;
        let mut captures = MoveList::new();
        self.pos.generate_captures(&mut captures);

        let mut tried = 0usize;
        for &mv in captures.iter() {
            if tried >= PROBCUT_MAX_CAPTURES {
                break;
            }
            if self.pos.see(mv) <= 0 {
                continue;
            }
            tried += 1;

            self.pos.make(mv);
            let us = !self.pos.side_to_move();
            if self.pos.is_attacked(self.pos.king_sq(us), self.pos.side_to_move()) {
                self.pos.unmake(mv);
                continue;
            }
            let score = -self.negamax(
                depth - PROBCUT_REDUCTION,
                -threshold,
                -threshold + 1,
                ply + 1,
                false,
                Move::null(),
            );
            self.pos.unmake(mv);

            if self.stopped {
                return None;
            }
            if score >= threshold {
                return Some(threshold);
            }
        }
        None
    }

    fn reward_capture(&mut self, mv: Move, bonus: i32) {
        let us = self.pos.side_to_move();
        let Some(attacker) = self.pos.piece_on(mv.from()) else {
            return;
        };
        let victim = if mv.is_en_passant() {
            Piece::Pawn
        } else {
            self.pos.piece_on(mv.to()).unwrap_or(Piece::Pawn)
        };
        self.history.update_capture(us, attacker, mv.to(), victim, bonus);
    }

    fn on_beta_cutoff(
        &mut self,
        mv: Move,
        ply: usize,
        prev_move: Move,
        prev_piece: Option<Piece>,
        bonus: i32,
        tried_quiets: &[Move],
    ) {
        if mv.is_capture() {
            self.reward_capture(mv, bonus);
            return;
        }

        self.history.push_killer(ply, mv);
        if !self.limits.use_history {
            return;
        }

        let us = self.pos.side_to_move();
        let piece = self.pos.piece_on(mv.from()).unwrap_or(Piece::Pawn);
        self.history.update_main(us, piece, mv.to(), bonus);
        if let Some(prev_piece) = prev_piece {
            self.history
                .update_continuation(us, prev_piece, prev_move.to(), piece, mv.to(), bonus);
        }
        self.history.set_counter_move(us, prev_move, mv);

        for &quiet in tried_quiets {
            if quiet == mv {
                continue;
            }
            let qpiece = self.pos.piece_on(quiet.from()).unwrap_or(Piece::Pawn);
            self.history.update_main(us, qpiece, quiet.to(), -bonus);
            if let Some(prev_piece) = prev_piece {
                self.history.update_continuation(
                    us,
                    prev_piece,
                    prev_move.to(),
                    qpiece,
                    quiet.to(),
                    -bonus,
                );
            }
        }
    }
}
