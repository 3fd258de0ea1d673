//! Negamax alpha-beta search with quiescence, driven by iterative deepening.

use kestrel_core::Move;
use tracing::{debug, trace};

use crate::config::SearchPolicy;
use crate::eval::Evaluator;
use crate::search::context::{NodeState, SearchTree};
use crate::search::control::{NODE_BATCH, SearchControl};
use crate::search::history::HistoryTable;
use crate::search::ordering::lmr_reduction;
use crate::search::tt::{Bound, TranspositionTable, score_from_tt, score_to_tt};
use crate::search::{INF, MATE_SCORE, MATE_THRESHOLD, MAX_PLY, mate_in};

/// Aspiration windows start at this depth.
const ASPIRATION_MIN_DEPTH: i32 = 5;

/// Initial half-width of the aspiration window; doubles on every failure.
const ASPIRATION_DELTA: i32 = 25;

/// Late move reductions apply from this depth...
const LMR_MIN_DEPTH: i32 = 3;

/// ...to moves after this many have been searched.
const LMR_MIN_MOVES: usize = 3;

/// What one worker achieved: its deepest completed iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub worker: usize,
    /// Deepest completed depth; 0 when none completed.
    pub depth: u8,
    pub score: i32,
    pub main_line: Vec<Move>,
}

/// Shared tables and settings a worker searches with.
#[derive(Clone, Copy)]
pub struct SearchShared<'a> {
    pub tt: &'a TranspositionTable,
    pub history: &'a HistoryTable,
    pub control: &'a SearchControl<'a>,
    pub evaluator: &'a dyn Evaluator,
    pub policy: SearchPolicy,
    /// Keys of the game positions before the root, oldest first.
    pub game_keys: &'a [u64],
    /// Stop after finding a mate in at most this many moves.
    pub mate_limit: Option<u32>,
}

/// One search thread: its own context tree plus the shared tables.
pub struct Worker<'a> {
    id: usize,
    tree: &'a mut SearchTree,
    tt: &'a TranspositionTable,
    history: &'a HistoryTable,
    control: &'a SearchControl<'a>,
    evaluator: &'a dyn Evaluator,
    policy: SearchPolicy,
    game_keys: &'a [u64],
    mate_limit: Option<u32>,
    nodes: u64,
    flushed: u64,
}

impl<'a> Worker<'a> {
    /// Prepare worker `id` to search from the root already loaded into `tree`.
    pub fn new(id: usize, tree: &'a mut SearchTree, shared: SearchShared<'a>) -> Self {
        Self {
            id,
            tree,
            tt: shared.tt,
            history: shared.history,
            control: shared.control,
            evaluator: shared.evaluator,
            policy: shared.policy,
            game_keys: shared.game_keys,
            mate_limit: shared.mate_limit,
            nodes: 0,
            flushed: 0,
        }
    }

    /// Nodes visited by this worker.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Iterative deepening from `start_depth` to `max_depth`.
    ///
    /// `on_iter(depth, score, line)` runs after every completed iteration.
    /// An iteration interrupted by the control is discarded.
    pub fn iterate<F>(&mut self, start_depth: u8, max_depth: u8, mut on_iter: F) -> WorkerOutcome
    where
        F: FnMut(u8, i32, &[Move]),
    {
        let mut outcome = WorkerOutcome {
            worker: self.id,
            depth: 0,
            score: 0,
            main_line: Vec::new(),
        };
        debug!(worker = self.id, start_depth, max_depth, "worker started");

        let mut prev_score = 0;
        for depth in start_depth..=max_depth {
            if self.control.should_stop_iterating() {
                break;
            }

            let score = self.aspiration(i32::from(depth), prev_score);
            if self.control.is_stopped() || self.tree[0].state != NodeState::Done {
                break;
            }
            prev_score = score;

            outcome.depth = depth;
            outcome.score = score;
            outcome.main_line.clear();
            outcome.main_line.extend_from_slice(self.tree.root_line());
            trace!(worker = self.id, depth, score, nodes = self.nodes, "iteration complete");

            on_iter(depth, score, &outcome.main_line);

            if self.mate_found(score) {
                break;
            }
        }

        self.flush_nodes();
        debug!(
            worker = self.id,
            depth = outcome.depth,
            nodes = self.nodes,
            "worker finished"
        );
        outcome
    }

    fn mate_found(&self, score: i32) -> bool {
        match (self.mate_limit, mate_in(score)) {
            (Some(limit), Some(moves)) => moves > 0 && moves.unsigned_abs() <= limit,
            _ => false,
        }
    }

    /// Root search inside a window around `prev`, widened until the score
    /// falls inside it.
    fn aspiration(&mut self, depth: i32, prev: i32) -> i32 {
        if !self.policy.aspiration_windows
            || depth < ASPIRATION_MIN_DEPTH
            || prev.abs() >= MATE_THRESHOLD
        {
            return self.negamax(0, depth, -INF, INF, false);
        }

        let mut delta = ASPIRATION_DELTA;
        let mut alpha = (prev - delta).max(-INF);
        let mut beta = (prev + delta).min(INF);
        loop {
            let score = self.negamax(0, depth, alpha, beta, false);
            if self.control.is_stopped() {
                return score;
            }
            if score <= alpha {
                alpha = (score - delta).max(-INF);
            } else if score >= beta {
                beta = (score + delta).min(INF);
            } else {
                return score;
            }
            delta *= 2;
        }
    }

    /// Count a node; `true` when the search must unwind.
    fn visit(&mut self) -> bool {
        self.nodes += 1;
        if self.nodes % NODE_BATCH == 0 {
            self.flush_nodes();
        }
        self.control.should_stop(self.nodes)
    }

    fn flush_nodes(&mut self) {
        self.control.add_nodes(self.nodes - self.flushed);
        self.flushed = self.nodes;
    }

    fn evaluate(&self, height: usize) -> i32 {
        self.evaluator
            .evaluate(&self.tree[height].position)
            .clamp(-MATE_THRESHOLD + 1, MATE_THRESHOLD - 1)
    }

    /// Draw by the fifty-move rule, insufficient material or repetition.
    ///
    /// Repetitions are looked for at even distances inside the reversible
    /// window, first along the search stack and then in the game history.
    /// A single earlier occurrence counts.
    pub(crate) fn is_draw(&self, height: usize) -> bool {
        let pos = &self.tree[height].position;
        if pos.halfmove_clock() >= 100 || pos.is_insufficient_material() {
            return true;
        }

        let key = pos.key();
        let window = pos.reversible_plies() as usize;
        let mut distance = 2;
        while distance <= window {
            let earlier = if distance <= height {
                self.tree[height - distance].position.key()
            } else {
                let back = distance - height;
                match self.game_keys.len().checked_sub(back) {
                    Some(index) => self.game_keys[index],
                    None => break,
                }
            };
            if earlier == key {
                return true;
            }
            distance += 2;
        }
        false
    }

    /// Play `mv` from `height` into the context above it.
    fn make_move(&mut self, height: usize, mv: Move) {
        let (node, child) = self.tree.pair(height);
        node.position.make_move_into(mv, &mut child.position);
    }

    /// Set the line at `height` to `mv` followed by the child's line.
    fn update_pv(&mut self, height: usize, mv: Move) {
        let (node, child) = self.tree.pair(height);
        debug_assert!(child.is_settled(), "{mv} copied an unfinished line");
        node.pv.clear();
        node.pv.push(mv);
        node.pv.extend_from_slice(&child.pv);
    }

    /// Reward the cutoff move and penalise the quiets tried before it.
    fn update_quiet_stats(&mut self, height: usize, mv: Move, depth: i32) {
        let node = &mut self.tree[height];
        let side = node.position.side_to_move();
        self.history.reward(side, mv, depth);
        for &quiet in &node.quiets {
            self.history.penalize(side, quiet, depth);
        }
        node.store_killer(mv);
    }

    /// Negamax alpha-beta search at `height` with `depth` plies remaining.
    ///
    /// Returns a fail-soft score for the side to move; the best line is
    /// left in the context's `pv`. Returns 0 once the control stops, and the
    /// caller must discard it.
    pub(crate) fn negamax(
        &mut self,
        height: usize,
        depth: i32,
        mut alpha: i32,
        mut beta: i32,
        allow_null: bool,
    ) -> i32 {
        // Check extension; leaves drop into quiescence.
        let in_check = self.tree[height].position.in_check();
        let depth = if in_check { depth.max(0) + 1 } else { depth };
        if depth <= 0 {
            return self.qsearch(height, alpha, beta, 0);
        }

        self.tree[height].pv.clear();
        self.tree[height].state = NodeState::Init;
        if self.visit() {
            return 0;
        }

        let root = height == 0;
        let pv_node = beta - alpha > 1;

        if !root {
            if self.is_draw(height) {
                self.tree[height].state = NodeState::Terminal;
                return 0;
            }

            // Mate-distance pruning
            alpha = alpha.max(-MATE_SCORE + height as i32);
            beta = beta.min(MATE_SCORE - height as i32 - 1);
            if alpha >= beta {
                self.tree[height].state = NodeState::Terminal;
                return alpha;
            }
        }

        if height >= MAX_PLY {
            self.tree[height].state = NodeState::Terminal;
            return self.evaluate(height);
        }

        let key = self.tree[height].position.key();
        let mut hash_move = Move::EMPTY;
        if let Some(entry) = self.tt.read(key) {
            hash_move = entry.mv;
            let score = score_from_tt(entry.score, height);
            if !pv_node && i32::from(entry.depth) >= depth {
                let cutoff = match entry.bound {
                    Bound::Exact => true,
                    Bound::Lower => score >= beta,
                    Bound::Upper => score <= alpha,
                };
                if cutoff {
                    self.tree[height].state = NodeState::Terminal;
                    return score;
                }
            }
        }

        let static_eval = if in_check { -INF } else { self.evaluate(height) };

        // Null-move pruning
        if self.policy.null_move
            && allow_null
            && !pv_node
            && !in_check
            && depth >= 2
            && static_eval >= beta
            && beta.abs() < MATE_THRESHOLD
        {
            let side = self.tree[height].position.side_to_move();
            let (node, child) = self.tree.pair(height);
            if node.position.has_non_pawn_material(side)
                && node.position.null_move_into(&mut child.position)
            {
                let reduction = 3 + depth / 4;
                let score =
                    -self.negamax(height + 1, depth - 1 - reduction, -beta, -beta + 1, false);
                if self.control.is_stopped() {
                    return 0;
                }
                if score >= beta {
                    self.tree[height].state = NodeState::Terminal;
                    // Never trust an unproven mate from a null-move search.
                    return if score >= MATE_THRESHOLD { beta } else { score };
                }
            }
        }

        {
            let node = &mut self.tree[height];
            let killers = node.killers;
            node.moves.init_moves(&node.position, hash_move, killers);
            node.quiets.clear();
            node.state = NodeState::Generating;
        }

        let original_alpha = alpha;
        let mut best_score = -INF;
        let mut best_move = Move::EMPTY;
        let mut move_number = 0;

        while let Some(mv) = self.tree[height].moves.next_move(self.history) {
            move_number += 1;
            self.make_move(height, mv);
            let gives_check = self.tree[height + 1].position.in_check();
            let new_depth = depth - 1;

            let score = if move_number == 1 {
                -self.negamax(height + 1, new_depth, -beta, -alpha, true)
            } else {
                let mut reduction = 0;
                if self.policy.late_move_reductions
                    && depth >= LMR_MIN_DEPTH
                    && move_number > LMR_MIN_MOVES
                    && mv.is_quiet()
                    && !in_check
                    && !gives_check
                {
                    reduction = lmr_reduction(depth, move_number);
                    if pv_node {
                        reduction -= 1;
                    }
                    reduction = reduction.clamp(0, new_depth - 1);
                }

                let mut score =
                    -self.negamax(height + 1, new_depth - reduction, -alpha - 1, -alpha, true);
                if reduction > 0 && score > alpha {
                    score = -self.negamax(height + 1, new_depth, -alpha - 1, -alpha, true);
                }
                if score > alpha && score < beta {
                    score = -self.negamax(height + 1, new_depth, -beta, -alpha, true);
                }
                score
            };

            if self.control.is_stopped() {
                return 0;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    alpha = score;
                    best_move = mv;
                    self.update_pv(height, mv);
                    if alpha >= beta {
                        if mv.is_quiet() {
                            self.update_quiet_stats(height, mv, depth);
                        }
                        break;
                    }
                }
            }

            if mv.is_quiet() {
                self.tree[height].quiets.push(mv);
            }
        }

        if move_number == 0 {
            self.tree[height].state = NodeState::Terminal;
            return if in_check {
                -MATE_SCORE + height as i32
            } else {
                0
            };
        }

        let bound = if best_score >= beta {
            Bound::Lower
        } else if best_score > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        let stored_depth = depth.clamp(0, i32::from(u8::MAX)) as u8;
        self.tt.update(
            key,
            stored_depth,
            score_to_tt(best_score, height),
            bound,
            best_move,
        );

        self.tree[height].state = NodeState::Done;
        best_score
    }

    /// Quiescence search: stand pat, then captures and promotions that do
    /// not lose material. Quiet checks are added on the first ply only.
    pub(crate) fn qsearch(&mut self, height: usize, mut alpha: i32, beta: i32, qply: u32) -> i32 {
        self.tree[height].pv.clear();
        self.tree[height].state = NodeState::Init;
        if self.visit() {
            return 0;
        }

        if height > 0 && self.is_draw(height) {
            self.tree[height].state = NodeState::Terminal;
            return 0;
        }
        if height >= MAX_PLY {
            self.tree[height].state = NodeState::Terminal;
            return self.evaluate(height);
        }

        let in_check = self.tree[height].position.in_check();
        let mut best_score = -INF;
        if !in_check {
            let stand_pat = self.evaluate(height);
            if stand_pat >= beta {
                self.tree[height].state = NodeState::Terminal;
                return stand_pat;
            }
            alpha = alpha.max(stand_pat);
            best_score = stand_pat;
        }

        {
            let node = &mut self.tree[height];
            node.moves.init_quiescence_moves(&node.position, qply == 0);
            node.state = NodeState::Generating;
        }

        let mut searched = 0;
        while let Some(mv) = self.tree[height].moves.next_move(self.history) {
            searched += 1;
            self.make_move(height, mv);
            let score = -self.qsearch(height + 1, -beta, -alpha, qply + 1);
            if self.control.is_stopped() {
                return 0;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    alpha = score;
                    self.update_pv(height, mv);
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        self.tree[height].state = NodeState::Done;
        if in_check && searched == 0 {
            return -MATE_SCORE + height as i32;
        }
        best_score
    }
}

impl std::fmt::Debug for Worker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("nodes", &self.nodes)
            .field("policy", &self.policy)
            .finish()
    }
}
