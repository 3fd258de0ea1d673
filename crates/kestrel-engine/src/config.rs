//! Engine configuration passed to [`Engine::new`](crate::Engine::new) and
//! [`Engine::set_config`](crate::Engine::set_config).

use std::ops::RangeInclusive;

use crate::error::EngineError;

/// Accepted transposition table sizes, in megabytes.
pub const HASH_MB_RANGE: RangeInclusive<usize> = 1..=65_536;

/// Accepted worker counts.
pub const THREADS_RANGE: RangeInclusive<usize> = 1..=256;

/// Pruning heuristics layered on top of plain alpha-beta.
///
/// Disabling a knob never changes correctness, only speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPolicy {
    /// Null-move pruning at non-PV nodes.
    pub null_move: bool,
    /// Late move reductions for quiet moves ordered late.
    pub late_move_reductions: bool,
    /// Narrow root windows around the previous iteration's score.
    pub aspiration_windows: bool,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            null_move: true,
            late_move_reductions: true,
            aspiration_windows: true,
        }
    }
}

/// Resources and policy for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Transposition table size in megabytes.
    pub hash_mb: usize,
    /// Number of search workers (Lazy SMP).
    pub threads: usize,
    pub policy: SearchPolicy,
}

impl EngineConfig {
    /// Check every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidHashSize`] or
    /// [`EngineError::InvalidThreadCount`] for out-of-range values.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !HASH_MB_RANGE.contains(&self.hash_mb) {
            return Err(EngineError::InvalidHashSize {
                megabytes: self.hash_mb,
                min: *HASH_MB_RANGE.start(),
                max: *HASH_MB_RANGE.end(),
            });
        }
        if !THREADS_RANGE.contains(&self.threads) {
            return Err(EngineError::InvalidThreadCount {
                threads: self.threads,
                min: *THREADS_RANGE.start(),
                max: *THREADS_RANGE.end(),
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hash_mb: 16,
            threads: 1,
            policy: SearchPolicy::default(),
        }
    }
}
