//! Integration tests for Lazy SMP search.
//!
//! Verifies correctness (legal moves, mate detection) and robustness
//! (cancellation, node counting) under various thread counts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use kestrel_core::Position;
use kestrel_engine::{Engine, EngineConfig, SearchLimits, SearchResult, mate_in};

const SCHOLARS_MATE_FEN: &str =
    "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";

const SICILIAN_FEN: &str = "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2";

const RUY_LOPEZ_FEN: &str = "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3";

const ENDGAME_FEN: &str = "8/8/8/3k4/8/3K4/4P3/8 w - - 0 1";

fn engine_with_threads(threads: usize) -> Engine {
    Engine::new(EngineConfig {
        hash_mb: 16,
        threads,
        ..EngineConfig::default()
    })
    .unwrap()
}

/// Run a depth-limited search on `pos` with `threads` workers.
fn search_with_threads(pos: &Position, depth: u8, threads: usize) -> SearchResult {
    let mut engine = engine_with_threads(threads);
    let cancel = AtomicBool::new(false);
    engine
        .search(
            std::slice::from_ref(pos),
            &SearchLimits::depth(depth),
            &cancel,
            |_| {},
        )
        .unwrap()
}

fn assert_legal_best(pos: &Position, result: &SearchResult, what: &str) {
    let best = result
        .best_move()
        .unwrap_or_else(|| panic!("{what}: no best move"));
    assert!(pos.is_legal(best), "{what}: {best} is illegal in {pos}");
}

// ── Basic correctness ─────────────────────────────────────────────────────────

#[test]
fn single_thread_returns_legal_move() {
    let pos = Position::startpos();
    let result = search_with_threads(&pos, 4, 1);
    assert_legal_best(&pos, &result, "single-thread startpos");
    assert_eq!(result.depth, 4);
}

#[test]
fn single_thread_finds_mate_in_one() {
    let pos: Position = SCHOLARS_MATE_FEN.parse().unwrap();
    let result = search_with_threads(&pos, 2, 1);
    assert_eq!(
        result.best_move().map(|m| m.to_string()).as_deref(),
        Some("h5f7"),
        "single-thread should find Qxf7# in the Scholar's mate position"
    );
    assert_eq!(mate_in(result.score), Some(1), "score {}", result.score);
}

// ── Multi-thread correctness ──────────────────────────────────────────────────

#[test]
fn multi_thread_returns_legal_move() {
    let pos = Position::startpos();
    for threads in [2, 4] {
        let result = search_with_threads(&pos, 4, threads);
        assert_legal_best(&pos, &result, &format!("{threads}-thread startpos"));
    }
}

#[test]
fn multi_thread_finds_mate_in_one() {
    let pos: Position = SCHOLARS_MATE_FEN.parse().unwrap();
    let result = search_with_threads(&pos, 2, 4);
    assert_eq!(
        result.best_move().map(|m| m.to_string()).as_deref(),
        Some("h5f7"),
        "4-thread search should find Qxf7# in the Scholar's mate position"
    );
    assert!(result.score > 28_000, "score {} should indicate mate", result.score);
}

#[test]
fn multi_thread_various_positions() {
    let positions = [
        ("Sicilian Defence", SICILIAN_FEN),
        ("Ruy Lopez", RUY_LOPEZ_FEN),
        ("King+pawn endgame", ENDGAME_FEN),
    ];

    for (name, fen) in positions {
        let pos: Position = fen
            .parse()
            .unwrap_or_else(|_| panic!("invalid FEN for {name}"));
        let result = search_with_threads(&pos, 4, 4);
        assert_legal_best(&pos, &result, name);
        let mut replay = pos.clone();
        for &mv in &result.main_line {
            assert!(replay.is_legal(mv), "{name}: main line move {mv} is illegal");
            replay = replay.make_move(mv);
        }
    }
}

// ── Cancellation ──────────────────────────────────────────────────────────────

#[test]
fn cancel_terminates_all_threads() {
    let (tx, rx) = mpsc::channel::<SearchResult>();

    thread::spawn(move || {
        let mut engine = engine_with_threads(4);
        let cancel = AtomicBool::new(false);
        let result = thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(50));
                cancel.store(true, Ordering::Relaxed);
            });
            engine
                .search(&[Position::startpos()], &SearchLimits::default(), &cancel, |_| {})
                .unwrap()
        });
        let _ = tx.send(result);
    });

    let result = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("cancelled search did not return within 5 seconds");

    assert!(
        result.depth < 100,
        "search should have been stopped early, got depth {}",
        result.depth
    );
    assert!(result.best_move().is_some(), "a cancelled search still returns a move");
}

#[test]
fn pre_set_cancel_returns_immediately() {
    let pos = Position::startpos();
    let mut engine = engine_with_threads(4);
    let cancel = AtomicBool::new(true);

    let result = engine
        .search(&[pos.clone()], &SearchLimits::depth(100), &cancel, |_| {})
        .unwrap();

    assert_eq!(result.depth, 0, "no iteration can complete with cancel pre-set");
    assert_legal_best(&pos, &result, "fallback");
    assert_eq!(result.main_line.len(), 1);
}

#[test]
fn movetime_is_respected() {
    let mut engine = engine_with_threads(2);
    let cancel = AtomicBool::new(false);
    let limits = SearchLimits {
        movetime: Some(Duration::from_millis(100)),
        ..SearchLimits::default()
    };
    let result = engine
        .search(&[Position::startpos()], &limits, &cancel, |_| {})
        .unwrap();
    assert!(
        result.elapsed < Duration::from_secs(2),
        "100 ms search took {:?}",
        result.elapsed
    );
    assert!(result.best_move().is_some());
}

// ── Node counting ─────────────────────────────────────────────────────────────

#[test]
fn multi_thread_reports_total_nodes() {
    let pos = Position::startpos();

    let single = search_with_threads(&pos, 5, 1);
    let quad = search_with_threads(&pos, 5, 4);

    assert!(single.nodes > 0, "single-thread search should report > 0 nodes");
    assert!(quad.nodes > 0, "4-thread search should report > 0 nodes");
}

#[test]
fn node_limit_stops_search() {
    let mut engine = engine_with_threads(1);
    let cancel = AtomicBool::new(false);
    let result = engine
        .search(&[Position::startpos()], &SearchLimits::nodes(20_000), &cancel, |_| {})
        .unwrap();
    assert!(result.depth >= 1, "20k nodes cover at least depth 1");
    assert!(
        result.nodes < 20_000 + 2 * 2048,
        "node budget overshot: {}",
        result.nodes
    );
}

// ── Progress reports ──────────────────────────────────────────────────────────

#[test]
fn progress_fires_once_per_depth() {
    let mut engine = engine_with_threads(4);
    let cancel = AtomicBool::new(false);

    let mut depths_seen: Vec<u8> = Vec::new();
    engine
        .search(&[Position::startpos()], &SearchLimits::depth(3), &cancel, |info| {
            depths_seen.push(info.depth);
        })
        .unwrap();

    assert_eq!(
        depths_seen,
        vec![1, 2, 3],
        "progress should fire exactly once per completed depth"
    );
}

#[test]
fn repeated_searches_reuse_tables() {
    let mut engine = engine_with_threads(2);
    let cancel = AtomicBool::new(false);
    let pos: Position = RUY_LOPEZ_FEN.parse().unwrap();
    for _ in 0..3 {
        let result = engine
            .search(&[pos.clone()], &SearchLimits::depth(4), &cancel, |_| {})
            .unwrap();
        assert_legal_best(&pos, &result, "warm table");
    }
    engine.clear();
    let result = engine
        .search(&[pos.clone()], &SearchLimits::depth(4), &cancel, |_| {})
        .unwrap();
    assert_legal_best(&pos, &result, "after clear");
}
