//! Error types surfaced by the engine to its front end.

/// Errors from configuring or running an [`Engine`](crate::Engine).
///
/// Cancellation is not an error: a cancelled search still returns a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The transposition table could not be allocated.
    #[error("failed to allocate a {megabytes} MB transposition table")]
    HashAllocation {
        /// Requested table size.
        megabytes: usize,
    },
    /// The requested hash size is outside the supported range.
    #[error("hash size {megabytes} MB is outside {min}..={max}")]
    InvalidHashSize {
        /// Requested table size.
        megabytes: usize,
        /// Smallest accepted size.
        min: usize,
        /// Largest accepted size.
        max: usize,
    },
    /// The requested worker count is outside the supported range.
    #[error("thread count {threads} is outside {min}..={max}")]
    InvalidThreadCount {
        /// Requested worker count.
        threads: usize,
        /// Smallest accepted count.
        min: usize,
        /// Largest accepted count.
        max: usize,
    },
    /// `search` was called without a current position.
    #[error("search requires at least one position")]
    EmptyPositionList,
}

#[cfg(test)]
mod tests {
    use super::EngineError;

    #[test]
    fn hash_allocation_display() {
        let err = EngineError::HashAllocation { megabytes: 4096 };
        assert_eq!(
            format!("{err}"),
            "failed to allocate a 4096 MB transposition table"
        );
    }

    #[test]
    fn thread_count_display() {
        let err = EngineError::InvalidThreadCount {
            threads: 0,
            min: 1,
            max: 256,
        };
        assert_eq!(format!("{err}"), "thread count 0 is outside 1..=256");
    }
}
