//! End-to-end search scenarios through the public `Engine` API.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use kestrel_core::Position;
use kestrel_engine::{
    Engine, EngineConfig, SearchInfo, SearchLimits, SearchPolicy, SearchResult, mate_in,
};

const SCHOLARS_MATE_FEN: &str =
    "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";

/// 1. Rd8+ Rxd8 2. Rxd8#
const BACK_RANK_FEN: &str = "r5k1/5ppp/8/8/8/8/3R1PPP/3R2K1 w - - 0 1";

/// White is a queen down with only king moves and pawn pushes.
const QUEEN_DOWN_FEN: &str = "q6k/6pp/8/8/8/8/6PP/7K w - - 0 1";

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).unwrap()
}

fn run(engine: &mut Engine, positions: &[Position], limits: SearchLimits) -> SearchResult {
    let cancel = AtomicBool::new(false);
    engine.search(positions, &limits, &cancel, |_| {}).unwrap()
}

/// `fen` followed by `moves`, every intermediate position included.
fn game(fen: &str, moves: &[&str]) -> Vec<Position> {
    let mut positions = vec![fen.parse::<Position>().unwrap()];
    for uci in moves {
        let next = positions[positions.len() - 1].play_uci(uci).unwrap();
        positions.push(next);
    }
    positions
}

#[test]
fn startpos_under_node_budget() {
    let mut engine = engine();
    let result = run(&mut engine, &[Position::startpos()], SearchLimits::nodes(50_000));
    assert!(!result.main_line.is_empty(), "a line must be reported");
    assert!(result.depth >= 1);
    assert!(
        result.score.abs() < 100,
        "startpos should be roughly balanced, got {}",
        result.score
    );
}

#[test]
fn mate_in_one_is_played() {
    let mut engine = engine();
    let root: Position = SCHOLARS_MATE_FEN.parse().unwrap();
    let result = run(&mut engine, &[root.clone()], SearchLimits::depth(5));

    let best = result.best_move().unwrap();
    assert_eq!(best.to_string(), "h5f7");
    let after = root.make_move(best);
    assert!(after.in_check() && !after.has_legal_moves(), "h5f7 must mate");
    assert_eq!(mate_in(result.score), Some(1));
}

#[test]
fn mate_in_two_is_found_with_every_policy() {
    let plain = SearchPolicy {
        null_move: false,
        late_move_reductions: false,
        aspiration_windows: false,
    };
    for policy in [SearchPolicy::default(), plain] {
        let mut engine = Engine::new(EngineConfig {
            policy,
            ..EngineConfig::default()
        })
        .unwrap();
        let result = run(
            &mut engine,
            &[BACK_RANK_FEN.parse().unwrap()],
            SearchLimits::depth(5),
        );
        assert_eq!(result.best_move().map(|m| m.to_string()).as_deref(), Some("d2d8"));
        assert_eq!(mate_in(result.score), Some(2), "{policy:?}: score {}", result.score);
        assert_eq!(result.main_line.len(), 3, "Rd8+ Rxd8 Rxd8#");
    }
}

#[test]
fn mate_limit_ends_search_early() {
    let mut engine = engine();
    let limits = SearchLimits {
        depth: Some(12),
        mate: Some(2),
        ..SearchLimits::default()
    };
    let result = run(&mut engine, &[BACK_RANK_FEN.parse().unwrap()], limits);
    assert_eq!(mate_in(result.score), Some(2));
    assert!(result.depth < 12, "stopped at depth {}", result.depth);
}

#[test]
fn losing_side_claims_repetition_from_game_history() {
    // Kg1 Kg8 Kh1 Kh8 brings the root back; Kg1 now repeats.
    let positions = game(QUEEN_DOWN_FEN, &["h1g1", "h8g8", "g1h1", "g8h8"]);
    let mut engine = engine();

    let alone = run(&mut engine, &positions[4..], SearchLimits::depth(4));
    assert!(alone.score < -500, "a queen down without history, got {}", alone.score);

    engine.clear();
    let with_history = run(&mut engine, &positions, SearchLimits::depth(4));
    assert_eq!(
        with_history.best_move().map(|m| m.to_string()).as_deref(),
        Some("h1g1")
    );
    assert_eq!(with_history.score, 0, "repeating the game is a draw");
}

#[test]
fn illegal_history_move_is_reported() {
    let root = Position::startpos();
    assert!(root.play_uci("e2e5").is_err());
    assert!("not a fen".parse::<Position>().is_err());
}

#[test]
fn clock_limits_end_the_search() {
    let mut engine = engine();
    let limits = SearchLimits {
        white_time: Some(Duration::from_millis(500)),
        black_time: Some(Duration::from_millis(500)),
        ..SearchLimits::default()
    };
    let result = run(&mut engine, &[Position::startpos()], limits);
    assert!(result.best_move().is_some());
    assert!(
        result.elapsed < Duration::from_secs(2),
        "half a second on the clock, searched {:?}",
        result.elapsed
    );
}

#[test]
fn progress_scores_match_result() {
    let mut engine = engine();
    let cancel = AtomicBool::new(false);
    let mut reports: Vec<SearchInfo> = Vec::new();
    let result = engine
        .search(
            &[SCHOLARS_MATE_FEN.parse().unwrap()],
            &SearchLimits::depth(3),
            &cancel,
            |info| reports.push(info.clone()),
        )
        .unwrap();

    let last = reports.last().unwrap();
    assert_eq!(last.depth, result.depth);
    assert_eq!(last.score, result.score);
    assert_eq!(last.main_line, result.main_line);
    assert!(reports.windows(2).all(|w| w[0].elapsed <= w[1].elapsed));
}
