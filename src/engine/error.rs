//! Engine error taxonomy (§7).
//!
//! Plain enums with manual `Display`/`Error` impls, matching the teacher's
//! hand-rolled error style (`backtest_v2::settlement::SettlementError`,
//! `backtest_v2::book::BookError`, ...) rather than a derive-macro crate.

use std::fmt;

/// Errors the engine can surface. Any variant other than
/// `ConfigurationError` (construction-time only, §7) poisons the engine:
/// once returned from `process_bar`, the engine refuses further bars and
/// every subsequent call returns `EngineError::Poisoned`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Internal consistency broken. Must never occur in a correct
    /// implementation; carries enough context to diagnose (§7).
    InvariantViolation {
        invariant: &'static str,
        bar_index: u64,
        detail: String,
    },
    /// Incoming bar's index did not strictly increase over the last
    /// accepted bar.
    OutOfOrderBar { expected_index: u64, got_index: u64 },
    /// Incoming bar repeats the last accepted index with different data.
    RevisedBar { bar_index: u64 },
    /// Non-finite threshold, negative `tick_size`, etc. Construction-time
    /// only; does not poison an already-running engine.
    ConfigurationError { detail: String },
    /// The engine already failed fatally and refuses further bars.
    Poisoned { last_good_bar_index: Option<u64> },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvariantViolation {
                invariant,
                bar_index,
                detail,
            } => write!(
                f,
                "invariant violation `{invariant}` at bar {bar_index}: {detail}"
            ),
            EngineError::OutOfOrderBar {
                expected_index,
                got_index,
            } => write!(
                f,
                "out-of-order bar: expected index > {expected_index}, got {got_index}"
            ),
            EngineError::RevisedBar { bar_index } => {
                write!(f, "bar at index {bar_index} was revised after delivery")
            }
            EngineError::ConfigurationError { detail } => {
                write!(f, "configuration error: {detail}")
            }
            EngineError::Poisoned {
                last_good_bar_index,
            } => match last_good_bar_index {
                Some(idx) => write!(f, "engine poisoned after bar {idx}; refusing further bars"),
                None => write!(f, "engine poisoned before processing any bar"),
            },
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Whether this error, once returned, poisons the engine per §7.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::ConfigurationError { .. })
    }
}
