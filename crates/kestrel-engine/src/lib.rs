//! Search and evaluation for kestrel.
//!
//! The entry point is [`Engine`]: configure it with an [`EngineConfig`],
//! then call [`Engine::search`] with the game positions and a
//! [`SearchLimits`] budget.

pub mod config;
pub mod error;
pub mod eval;
pub mod search;
pub mod time;

pub use config::{EngineConfig, SearchPolicy};
pub use error::EngineError;
pub use eval::{Evaluator, MaterialEvaluator};
pub use search::control::SearchControl;
pub use search::engine::{Engine, select_result};
pub use search::negamax::WorkerOutcome;
pub use search::{SearchInfo, SearchResult, mate_in};
pub use time::{SearchLimits, compute_limits};
