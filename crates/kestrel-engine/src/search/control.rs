//! Search control: cancellation, deadlines and node budget.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Nodes a worker visits between clock checks and counter flushes.
pub const NODE_BATCH: u64 = 2048;

/// Decides when a search should stop.
///
/// Shared by reference between all workers of one search. Two flags can
/// stop it: the caller's cancellation flag and an internal `halted` flag,
/// raised when a deadline or the node budget is exhausted or when the main
/// worker finishes and helpers must unwind.
pub struct SearchControl<'a> {
    cancel: &'a AtomicBool,
    halted: AtomicBool,
    start: Instant,
    soft_limit: Option<Duration>,
    hard_limit: Option<Duration>,
    node_limit: Option<u64>,
    nodes: AtomicU64,
}

impl<'a> SearchControl<'a> {
    /// Control without deadlines; only cancellation (or a node budget) stops it.
    pub fn new_infinite(cancel: &'a AtomicBool) -> Self {
        Self {
            cancel,
            halted: AtomicBool::new(false),
            start: Instant::now(),
            soft_limit: None,
            hard_limit: None,
            node_limit: None,
            nodes: AtomicU64::new(0),
        }
    }

    /// Control with a soft deadline (no new iteration after it) and a hard
    /// deadline (abort mid-iteration). The clock starts immediately.
    pub fn new_timed(cancel: &'a AtomicBool, soft: Duration, hard: Duration) -> Self {
        Self {
            soft_limit: Some(soft),
            hard_limit: Some(hard),
            ..Self::new_infinite(cancel)
        }
    }

    /// Stop once roughly `limit` nodes have been searched by all workers.
    pub fn with_node_limit(mut self, limit: Option<u64>) -> Self {
        self.node_limit = limit;
        self
    }

    /// Add a worker's batch of nodes to the shared counter.
    pub fn add_nodes(&self, nodes: u64) {
        self.nodes.fetch_add(nodes, Ordering::Relaxed);
    }

    /// Nodes flushed so far by all workers.
    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    /// Whether either stop flag is raised.
    pub fn is_stopped(&self) -> bool {
        self.cancel.load(Ordering::Relaxed) || self.halted.load(Ordering::Relaxed)
    }

    /// Per-node stop check.
    ///
    /// `nodes` is the calling worker's own count. The flags are read on
    /// every call; the clock and node budget only once per [`NODE_BATCH`].
    /// Exhausting either raises the halt flag for every worker.
    pub fn should_stop(&self, nodes: u64) -> bool {
        if self.is_stopped() {
            return true;
        }
        if nodes % NODE_BATCH != 0 {
            return false;
        }

        let over_nodes = self.node_limit.is_some_and(|limit| self.nodes() >= limit);
        let over_time = self.hard_limit.is_some_and(|hard| self.elapsed() >= hard);
        if over_nodes || over_time {
            self.halt();
            return true;
        }
        false
    }

    /// Whether iterative deepening should skip the next iteration.
    pub fn should_stop_iterating(&self) -> bool {
        if self.is_stopped() {
            return true;
        }
        if self.node_limit.is_some_and(|limit| self.nodes() >= limit) {
            return true;
        }
        self.soft_limit.is_some_and(|soft| self.elapsed() >= soft)
    }

    /// Ask every worker to unwind.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Relaxed);
    }

    /// Time since the control was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl std::fmt::Debug for SearchControl<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchControl")
            .field("stopped", &self.is_stopped())
            .field("soft_limit", &self.soft_limit)
            .field("hard_limit", &self.hard_limit)
            .field("node_limit", &self.node_limit)
            .field("nodes", &self.nodes())
            .finish()
    }
}
