//! Lazy SMP engine: owns the shared tables and runs the workers.
//!
//! Every worker runs the same iterative-deepening search over the same root
//! and shares only the transposition table and the history table. Worker 0
//! runs on the caller's thread and reports progress; helpers run on scoped
//! threads and start at staggered depths so their trees diverge.

use std::sync::atomic::AtomicBool;
use std::thread;

use kestrel_core::{Move, Position};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, THREADS_RANGE};
use crate::error::EngineError;
use crate::eval::{Evaluator, MaterialEvaluator};
use crate::search::context::SearchTree;
use crate::search::history::HistoryTable;
use crate::search::negamax::{SearchShared, Worker, WorkerOutcome};
use crate::search::ordering::MoveIterator;
use crate::search::tt::TranspositionTable;
use crate::search::{MATE_SCORE, MAX_PLY, SearchInfo, SearchResult};
use crate::time::SearchLimits;

/// Pick the reported outcome: the deepest completed iteration, ties going
/// to the lowest worker index.
pub fn select_result(outcomes: &[WorkerOutcome]) -> Option<&WorkerOutcome> {
    outcomes
        .iter()
        .max_by_key(|o| (o.depth, std::cmp::Reverse(o.worker)))
}

/// The search engine.
///
/// Owns the transposition table, the history table and one
/// [`SearchTree`] per worker. All of them are reused across searches.
pub struct Engine {
    config: EngineConfig,
    tt: TranspositionTable,
    history: HistoryTable,
    trees: Vec<SearchTree>,
    evaluator: Box<dyn Evaluator>,
}

impl Engine {
    /// Create an engine and allocate its tables.
    ///
    /// # Errors
    ///
    /// Returns an error when `config` is out of range or the
    /// transposition table cannot be allocated.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let mut engine = Self {
            config,
            tt: TranspositionTable::new(config.hash_mb)?,
            history: HistoryTable::new(),
            trees: Vec::new(),
            evaluator: Box::new(MaterialEvaluator),
        };
        engine.prepare()?;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration and reallocate what changed.
    ///
    /// # Errors
    ///
    /// On a validation or allocation error the engine keeps working with
    /// its previous tables.
    pub fn set_config(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.reconfigure(config)
    }

    /// Apply `config` and rebuild the tables, restoring the previous
    /// configuration when the rebuild fails.
    fn reconfigure(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        let previous = std::mem::replace(&mut self.config, config);
        if let Err(err) = self.prepare() {
            warn!(megabytes = config.hash_mb, "keeping previous configuration");
            self.config = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Replace the evaluation function.
    pub fn set_evaluator(&mut self, evaluator: Box<dyn Evaluator>) {
        self.evaluator = evaluator;
    }

    /// Bring the tables in line with the configuration. Cheap when nothing
    /// changed.
    ///
    /// # Errors
    ///
    /// [`EngineError::HashAllocation`] when a resize fails.
    pub fn prepare(&mut self) -> Result<(), EngineError> {
        if self.tt.megabytes() != self.config.hash_mb {
            self.tt.resize(self.config.hash_mb)?;
            info!(megabytes = self.config.hash_mb, "transposition table resized");
        }
        if self.trees.len() != self.config.threads {
            self.trees.resize_with(self.config.threads, SearchTree::new);
            info!(threads = self.config.threads, "search workers prepared");
        }
        Ok(())
    }

    /// Forget everything learned so far. Used between unrelated games.
    pub fn clear(&mut self) {
        self.tt.clear();
        self.history.clear();
        debug!("engine state cleared");
    }

    /// Search the last of `positions`; the earlier ones are the game so far
    /// and only feed repetition detection.
    ///
    /// `progress` is called on the caller's thread after every depth the
    /// main worker completes. Raising `cancel` stops the search; the result
    /// of the deepest completed iteration is still returned.
    ///
    /// # Errors
    ///
    /// [`EngineError::EmptyPositionList`] for an empty `positions`, or an
    /// allocation error from [`prepare`](Self::prepare).
    pub fn search<F>(
        &mut self,
        positions: &[Position],
        limits: &SearchLimits,
        cancel: &AtomicBool,
        mut progress: F,
    ) -> Result<SearchResult, EngineError>
    where
        F: FnMut(&SearchInfo),
    {
        let Some((root, earlier)) = positions.split_last() else {
            return Err(EngineError::EmptyPositionList);
        };
        self.prepare()?;

        let control = limits.control(cancel, root);
        let max_depth = limits
            .depth
            .map_or(MAX_PLY as u8, |d| d.clamp(1, MAX_PLY as u8));

        if !root.has_legal_moves() {
            let score = if root.in_check() { -MATE_SCORE } else { 0 };
            debug!(score, "root has no legal moves");
            return Ok(SearchResult {
                main_line: Vec::new(),
                depth: 0,
                score,
                nodes: 0,
                elapsed: control.elapsed(),
            });
        }

        self.tt.prepare_new_search();
        self.history.clear();
        let game_keys: Vec<u64> = earlier.iter().map(Position::key).collect();

        let Engine {
            config,
            tt,
            history,
            trees,
            evaluator,
        } = self;
        let shared = SearchShared {
            tt,
            history,
            control: &control,
            evaluator: evaluator.as_ref(),
            policy: config.policy,
            game_keys: &game_keys,
            mate_limit: limits.mate,
        };
        for tree in trees.iter_mut() {
            tree.start(root);
        }
        let Some((main_tree, helper_trees)) = trees.split_first_mut() else {
            return Err(EngineError::InvalidThreadCount {
                threads: 0,
                min: *THREADS_RANGE.start(),
                max: *THREADS_RANGE.end(),
            });
        };

        info!(
            threads = config.threads,
            max_depth,
            fen = %root,
            "search started"
        );

        let mut outcomes = Vec::with_capacity(config.threads);
        thread::scope(|s| {
            let helpers: Vec<_> = helper_trees
                .iter_mut()
                .enumerate()
                .map(|(i, tree)| {
                    let id = i + 1;
                    s.spawn(move || {
                        let start_depth = 1 + (id % 2) as u8;
                        Worker::new(id, tree, shared).iterate(start_depth, max_depth, |_, _, _| {})
                    })
                })
                .collect();

            let mut main = Worker::new(0, main_tree, shared);
            let outcome = main.iterate(1, max_depth, |depth, score, line| {
                let info = SearchInfo {
                    depth,
                    score,
                    nodes: control.nodes(),
                    elapsed: control.elapsed(),
                    hashfull: shared.tt.hashfull(),
                    main_line: line.to_vec(),
                };
                debug!(depth, score, nodes = info.nodes, "depth complete");
                progress(&info);
            });
            control.halt();
            outcomes.push(outcome);

            for (i, handle) in helpers.into_iter().enumerate() {
                match handle.join() {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(_) => warn!(worker = i + 1, "search helper panicked"),
                }
            }
        });

        let nodes = control.nodes();
        let elapsed = control.elapsed();
        let result = match select_result(&outcomes) {
            Some(best) if best.depth > 0 => SearchResult {
                main_line: best.main_line.clone(),
                depth: best.depth,
                score: best.score,
                nodes,
                elapsed,
            },
            _ => SearchResult {
                main_line: fallback_move(root, tt, history).into_iter().collect(),
                depth: 0,
                score: 0,
                nodes,
                elapsed,
            },
        };

        let best = result.best_move().unwrap_or(Move::EMPTY);
        info!(
            depth = result.depth,
            score = result.score,
            nodes,
            elapsed_ms = elapsed.as_millis() as u64,
            %best,
            "search finished"
        );
        Ok(result)
    }
}

/// First move in search order, for searches that completed no iteration.
fn fallback_move(root: &Position, tt: &TranspositionTable, history: &HistoryTable) -> Option<Move> {
    let hash_move = tt.read(root.key()).map_or(Move::EMPTY, |entry| entry.mv);
    let mut moves = MoveIterator::new();
    moves.init_moves(root, hash_move, [Move::EMPTY; 2]);
    moves.next_move(history)
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("tt", &self.tt)
            .field("trees", &self.trees.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::search::mate_in;

    const SCHOLAR_FEN: &str = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";

    fn outcome(worker: usize, depth: u8, score: i32) -> WorkerOutcome {
        WorkerOutcome {
            worker,
            depth,
            score,
            main_line: Vec::new(),
        }
    }

    fn engine(threads: usize) -> Engine {
        Engine::new(EngineConfig {
            hash_mb: 4,
            threads,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn search(engine: &mut Engine, fen: &str, limits: SearchLimits) -> SearchResult {
        let cancel = AtomicBool::new(false);
        let root: Position = fen.parse().unwrap();
        engine.search(&[root], &limits, &cancel, |_| {}).unwrap()
    }

    #[test]
    fn deepest_outcome_wins() {
        let outcomes = [outcome(0, 7, 10), outcome(1, 9, -5), outcome(2, 8, 40)];
        assert_eq!(select_result(&outcomes).map(|o| o.worker), Some(1));
    }

    #[test]
    fn equal_depth_goes_to_lowest_worker() {
        let outcomes = [outcome(2, 9, 10), outcome(0, 9, -5), outcome(1, 9, 40)];
        assert_eq!(select_result(&outcomes).map(|o| o.worker), Some(0));
        assert!(select_result(&[]).is_none());
    }

    #[test]
    fn empty_position_list_is_an_error() {
        let mut engine = engine(1);
        let cancel = AtomicBool::new(false);
        let err = engine
            .search(&[], &SearchLimits::depth(1), &cancel, |_| {})
            .unwrap_err();
        assert_eq!(err, EngineError::EmptyPositionList);
    }

    #[test]
    fn stalemate_root_scores_zero_with_no_move() {
        let mut engine = engine(1);
        let result = search(&mut engine, "k7/2K5/1Q6/8/8/8/8/8 b - - 0 1", SearchLimits::depth(4));
        assert_eq!(result.score, 0);
        assert!(result.main_line.is_empty());
        assert_eq!(result.best_move(), None);
    }

    #[test]
    fn checkmated_root_scores_mate() {
        let mut engine = engine(1);
        let result = search(&mut engine, "7k/6Q1/5K2/8/8/8/8/8 b - - 0 1", SearchLimits::depth(4));
        assert_eq!(result.score, -MATE_SCORE);
        assert!(result.main_line.is_empty());
    }

    #[test]
    fn finds_mate_in_one_with_helpers() {
        let mut engine = engine(3);
        let result = search(&mut engine, SCHOLAR_FEN, SearchLimits::depth(4));
        assert_eq!(result.best_move().map(|m| m.to_string()).as_deref(), Some("h5f7"));
        assert_eq!(mate_in(result.score), Some(1));
        assert!(result.depth >= 4, "main worker reached the depth limit");
    }

    #[test]
    fn progress_reports_each_depth_in_order() {
        let mut engine = engine(1);
        let cancel = AtomicBool::new(false);
        let mut depths = Vec::new();
        let result = engine
            .search(&[Position::startpos()], &SearchLimits::depth(4), &cancel, |info| {
                assert!(!info.main_line.is_empty());
                assert!(info.hashfull <= 1000);
                depths.push(info.depth);
            })
            .unwrap();
        assert_eq!(depths, vec![1, 2, 3, 4]);
        assert_eq!(result.depth, 4);
        assert!(result.nodes > 0);
    }

    #[test]
    fn precancelled_search_falls_back_to_a_legal_move() {
        let mut engine = engine(2);
        let cancel = AtomicBool::new(true);
        let root = Position::startpos();
        let result = engine
            .search(&[root.clone()], &SearchLimits::default(), &cancel, |_| {
                panic!("no depth can complete")
            })
            .unwrap();
        assert_eq!(result.depth, 0);
        let best = result.best_move().expect("fallback move");
        assert!(root.is_legal(best));
        assert!(cancel.load(Ordering::Relaxed), "caller's flag is left as set");
    }

    #[test]
    fn set_config_revalidates_and_resizes() {
        let mut engine = engine(1);
        let bad = EngineConfig {
            threads: 0,
            ..*engine.config()
        };
        assert!(engine.set_config(bad).is_err());
        assert_eq!(engine.config().threads, 1, "rejected config must not apply");

        let bigger = EngineConfig {
            hash_mb: 8,
            threads: 2,
            ..*engine.config()
        };
        engine.set_config(bigger).unwrap();
        assert_eq!(engine.tt.megabytes(), 8);
        assert_eq!(engine.trees.len(), 2);
    }

    #[test]
    fn failed_resize_keeps_previous_config() {
        let mut engine = engine(1);
        let before = *engine.config();
        let huge = EngineConfig {
            hash_mb: usize::MAX >> 20,
            threads: 2,
            ..before
        };
        assert!(matches!(
            engine.reconfigure(huge),
            Err(EngineError::HashAllocation { .. })
        ));
        assert_eq!(*engine.config(), before, "config must match the tables in use");
        assert_eq!(engine.tt.megabytes(), 4);
        assert_eq!(engine.trees.len(), 1);

        let result = search(&mut engine, SCHOLAR_FEN, SearchLimits::depth(2));
        assert_eq!(result.best_move().map(|m| m.to_string()).as_deref(), Some("h5f7"));
    }

    #[test]
    fn custom_evaluator_is_used() {
        struct Pessimist;
        impl Evaluator for Pessimist {
            fn evaluate(&self, _pos: &Position) -> i32 {
                -77
            }
        }

        let mut engine = engine(1);
        engine.set_evaluator(Box::new(Pessimist));
        // Every leaf scores -77 for the side to move, so after an odd
        // number of plies the root sees +77.
        let result = search(
            &mut engine,
            "4k3/8/8/8/8/8/8/R3K3 w - - 0 1",
            SearchLimits::depth(1),
        );
        assert_eq!(result.score, 77);
    }
}
