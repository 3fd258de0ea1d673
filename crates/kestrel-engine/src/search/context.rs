//! Preallocated per-height search state.
//!
//! Each worker owns one [`SearchTree`]: `MAX_PLY + 1` contexts indexed by
//! search height. A node reads its position from its own context and plays
//! moves into the next context's buffer, so recursion allocates nothing
//! once the buffers have grown to their working size.

use std::ops::{Index, IndexMut};

use kestrel_core::{Move, Position};

use crate::search::MAX_PLY;
use crate::search::ordering::MoveIterator;

/// Progress of the node currently using a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Entered, nothing generated yet.
    Init,
    /// Moves are being yielded by the iterator.
    Generating,
    /// Returned without searching moves (draw, mate, cutoff, leaf).
    Terminal,
    /// Every move searched or a beta cutoff taken.
    Done,
}

/// Scratch state for one search height.
#[derive(Debug)]
pub struct SearchContext {
    pub position: Position,
    pub moves: MoveIterator,
    pub killers: [Move; 2],
    /// Best line from this node, filled bottom-up.
    pub pv: Vec<Move>,
    /// Quiet moves searched before the current best; penalised on a cutoff.
    pub quiets: Vec<Move>,
    pub state: NodeState,
}

impl SearchContext {
    fn new() -> Self {
        Self {
            position: Position::startpos(),
            moves: MoveIterator::new(),
            killers: [Move::EMPTY; 2],
            pv: Vec::with_capacity(MAX_PLY + 1),
            quiets: Vec::with_capacity(64),
            state: NodeState::Init,
        }
    }

    /// Remember a quiet cutoff move; the previous first killer moves down.
    pub fn store_killer(&mut self, mv: Move) {
        if self.killers[0] != mv {
            self.killers[1] = self.killers[0];
            self.killers[0] = mv;
        }
    }

    fn reset(&mut self) {
        self.killers = [Move::EMPTY; 2];
        self.pv.clear();
        self.quiets.clear();
        self.state = NodeState::Init;
    }

    /// The node returned a score it stands behind: its line is final.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, NodeState::Terminal | NodeState::Done)
    }
}

/// One worker's contexts, indexed by height.
#[derive(Debug)]
pub struct SearchTree {
    contexts: Vec<SearchContext>,
}

impl SearchTree {
    pub fn new() -> Self {
        Self {
            contexts: (0..=MAX_PLY).map(|_| SearchContext::new()).collect(),
        }
    }

    /// Clear killers and lines left over from a previous search and load
    /// the root position.
    pub fn start(&mut self, root: &Position) {
        for context in &mut self.contexts {
            context.reset();
        }
        self.contexts[0].position.clone_from(root);
    }

    /// The context at `height` and the one above it.
    ///
    /// # Panics
    ///
    /// When `height >= MAX_PLY`; callers stop recursing before that.
    pub fn pair(&mut self, height: usize) -> (&mut SearchContext, &mut SearchContext) {
        let (lower, upper) = self.contexts.split_at_mut(height + 1);
        (&mut lower[height], &mut upper[0])
    }

    /// Principal variation found at the root.
    pub fn root_line(&self) -> &[Move] {
        &self.contexts[0].pv
    }
}

impl Default for SearchTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for SearchTree {
    type Output = SearchContext;

    fn index(&self, height: usize) -> &SearchContext {
        &self.contexts[height]
    }
}

impl IndexMut<usize> for SearchTree {
    fn index_mut(&mut self, height: usize) -> &mut SearchContext {
        &mut self.contexts[height]
    }
}
