//! Error types for position setup and move parsing.

/// Errors from building a [`Position`](crate::Position) or playing moves on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    /// The FEN string could not be parsed or describes an illegal position.
    #[error("invalid FEN \"{fen}\": {reason}")]
    InvalidFen {
        /// The rejected FEN string.
        fen: String,
        /// Parser or validation message.
        reason: String,
    },
    /// A move string is malformed or not legal in the current position.
    #[error("illegal move \"{uci}\"")]
    IllegalMove {
        /// The rejected move in UCI notation.
        uci: String,
    },
}
