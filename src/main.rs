use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kestrel_core::Position;
use kestrel_engine::{Engine, EngineConfig, SearchInfo, SearchLimits, SearchPolicy, mate_in};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Search one chess position and print the best move.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root position in FEN; the standard start position when omitted
    #[arg(long)]
    fen: Option<String>,

    /// Moves in UCI notation played from the FEN before searching
    #[arg(long, num_args = 1..)]
    moves: Vec<String>,

    /// Maximum depth in plies
    #[arg(long)]
    depth: Option<u8>,

    /// Approximate node budget
    #[arg(long)]
    nodes: Option<u64>,

    /// Stop after a mate in this many moves is found
    #[arg(long)]
    mate: Option<u32>,

    /// Exact time for this move, in milliseconds
    #[arg(long)]
    movetime: Option<u64>,

    /// White's remaining clock, in milliseconds
    #[arg(long)]
    wtime: Option<u64>,

    /// Black's remaining clock, in milliseconds
    #[arg(long)]
    btime: Option<u64>,

    /// White's increment, in milliseconds
    #[arg(long)]
    winc: Option<u64>,

    /// Black's increment, in milliseconds
    #[arg(long)]
    binc: Option<u64>,

    /// Moves until the next time control
    #[arg(long)]
    movestogo: Option<u32>,

    /// Number of search threads
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Transposition table size in megabytes
    #[arg(long, default_value_t = 16)]
    hash: usize,

    #[arg(long)]
    no_null_move: bool,

    #[arg(long)]
    no_lmr: bool,

    #[arg(long)]
    no_aspiration: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,
}

impl Args {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            hash_mb: self.hash,
            threads: self.threads,
            policy: SearchPolicy {
                null_move: !self.no_null_move,
                late_move_reductions: !self.no_lmr,
                aspiration_windows: !self.no_aspiration,
            },
        }
    }

    fn limits(&self) -> SearchLimits {
        let ms = Duration::from_millis;
        SearchLimits {
            depth: self.depth,
            nodes: self.nodes,
            mate: self.mate,
            movetime: self.movetime.map(ms),
            white_time: self.wtime.map(ms),
            black_time: self.btime.map(ms),
            white_increment: self.winc.map(ms),
            black_increment: self.binc.map(ms),
            moves_to_go: self.movestogo,
            infinite: false,
        }
    }

    /// The FEN position followed by every position reached through `moves`.
    fn positions(&self) -> Result<Vec<Position>> {
        let root = match &self.fen {
            Some(fen) => Position::from_fen(fen).with_context(|| format!("invalid FEN '{fen}'"))?,
            None => Position::startpos(),
        };
        let mut positions = vec![root];
        for uci in &self.moves {
            let last = &positions[positions.len() - 1];
            let next = last
                .play_uci(uci)
                .with_context(|| format!("cannot play '{uci}'"))?;
            positions.push(next);
        }
        Ok(positions)
    }
}

fn format_score(score: i32) -> String {
    match mate_in(score) {
        Some(moves) => format!("mate {moves}"),
        None => format!("cp {score}"),
    }
}

fn print_info(info: &SearchInfo) {
    let pv: Vec<String> = info.main_line.iter().map(ToString::to_string).collect();
    println!(
        "info depth {} score {} nodes {} nps {} hashfull {} time {} pv {}",
        info.depth,
        format_score(info.score),
        info.nodes,
        info.nps(),
        info.hashfull,
        info.elapsed.as_millis(),
        pv.join(" ")
    );
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log))
        .with_context(|| format!("invalid log level '{}'", args.log))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let positions = args.positions()?;
    let mut engine = Engine::new(args.config()).context("invalid engine configuration")?;
    info!(threads = args.threads, hash_mb = args.hash, "kestrel starting");

    let cancel = AtomicBool::new(false);
    let result = engine
        .search(&positions, &args.limits(), &cancel, print_info)
        .context("search failed")?;

    match (result.best_move(), result.ponder_move()) {
        (Some(best), Some(ponder)) => println!("bestmove {best} ponder {ponder}"),
        (Some(best), None) => println!("bestmove {best}"),
        (None, _) => println!("bestmove 0000"),
    }
    Ok(())
}
