//! Incremental swing-leg detection engine.
//!
//! Identifies structural swings in a streaming OHLC bar series across
//! multiple fractal scales, producing an evolving graph of candidate legs
//! with no lookahead. See `spec.md` / `SPEC_FULL.md` for the design.

pub mod engine;

pub use engine::{
    Bar, Direction, Engine, EngineConfig, EngineError, InvalidationReason, Leg, LegEvent, LegId,
    LegStatus, LegView, PendingOrigin, PersistedState, PivotRecord,
};
