//! Incremental, no-lookahead leg detection and maintenance engine.
//!
//! See `spec.md` / `SPEC_FULL.md` at the workspace root for the full
//! design. This module tree mirrors the five components of §2:
//! classifier, pending-origin tracker, leg lifecycle manager, proximity
//! pruner, and parent-child graph, wired together by [`Engine`].

pub mod bar;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod leg;
pub mod lifecycle;
pub mod pending_origin;
pub mod persisted_state;
pub mod pruner;

#[cfg(test)]
mod test_support;

use serde::{Deserialize, Serialize};

pub use bar::Bar;
pub use config::EngineConfig;
pub use error::EngineError;
pub use events::LegEvent;
pub use leg::{Direction, InvalidationReason, Leg, LegId, LegStatus};
pub use pending_origin::PendingOrigin;
pub use persisted_state::PersistedState;

use lifecycle::LegLifecycleManager;

/// Immutable, read-only view of a leg handed to consumers via the
/// snapshot query interface (§6). Never a mutable alias onto engine
/// state (§5 shared-resource policy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegView {
    pub leg_id: LegId,
    pub direction: Direction,
    pub pivot_price: rust_decimal::Decimal,
    pub pivot_index: u64,
    pub origin_price: rust_decimal::Decimal,
    pub origin_index: u64,
    pub retracement_pct: rust_decimal::Decimal,
    pub formed: bool,
    pub status: LegStatus,
    pub completed: bool,
    pub parent_id: Option<LegId>,
    pub children: Vec<LegId>,
    pub bar_count: u64,
    pub gap_count: u64,
}

impl From<&Leg> for LegView {
    fn from(l: &Leg) -> Self {
        Self {
            leg_id: l.leg_id,
            direction: l.direction,
            pivot_price: l.pivot_price,
            pivot_index: l.pivot_index,
            origin_price: l.origin_price,
            origin_index: l.origin_index,
            retracement_pct: l.retracement_pct,
            formed: l.formed,
            status: l.status,
            completed: l.completed,
            parent_id: l.parent_id,
            children: l.children.clone(),
            bar_count: l.bar_count,
            gap_count: l.gap_count,
        }
    }
}

/// A pivot that survived its leg's invalidation, retained as a candidate
/// anchor for a future leg (§6 `orphaned_pivots`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotRecord {
    pub price: rust_decimal::Decimal,
    pub bar_index: u64,
    pub direction: Direction,
}

/// The engine: single-threaded, one instance per bar stream (§5). Owns
/// the active-leg arena exclusively through its internal
/// [`LegLifecycleManager`]; external code only ever observes read-only
/// snapshots or the `LegEvent` stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    manager: LegLifecycleManager,
    last_bar_index: Option<u64>,
    poisoned: bool,
    poisoned_at: Option<u64>,
}

impl Engine {
    /// Construct a new engine. Validates `config` per §7
    /// (`ConfigurationError`); this is the only point at which
    /// `ConfigurationError` does not poison the engine, since no engine
    /// yet exists to poison.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            manager: LegLifecycleManager::new(config),
            last_bar_index: None,
            poisoned: false,
            poisoned_at: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.manager.config()
    }

    /// Process the next bar in the stream. Enforces §7's `OutOfOrderBar`
    /// / `RevisedBar` checks before delegating to the lifecycle manager;
    /// any error poisons the engine (§7 propagation policy).
    pub fn process_bar(&mut self, bar: Bar) -> Result<Vec<LegEvent>, EngineError> {
        let _span = tracing::debug_span!("process_bar", bar_index = bar.index).entered();
        if self.poisoned {
            return Err(EngineError::Poisoned {
                last_good_bar_index: self.poisoned_at,
            });
        }

        if let Some(last) = self.last_bar_index {
            if bar.index < last {
                let err = EngineError::OutOfOrderBar {
                    expected_index: last,
                    got_index: bar.index,
                };
                self.poison(err.clone());
                return Err(err);
            }
            if bar.index == last {
                let err = EngineError::RevisedBar { bar_index: bar.index };
                self.poison(err.clone());
                return Err(err);
            }
        }

        match self.manager.process_bar(bar) {
            Ok(events) => {
                tracing::trace!(bar_index = bar.index, event_count = events.len(), "bar processed");
                self.last_bar_index = Some(bar.index);
                Ok(events)
            }
            Err(err) => {
                tracing::debug!(bar_index = bar.index, error = %err, "process_bar failed");
                self.poison(err.clone());
                Err(err)
            }
        }
    }

    fn poison(&mut self, err: EngineError) {
        if err.is_fatal() {
            tracing::debug!(?err, "engine poisoned");
            self.poisoned = true;
            self.poisoned_at = self.last_bar_index;
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Immutable view of currently non-terminal legs (§6).
    pub fn active_legs_snapshot(&self) -> Vec<LegView> {
        self.manager
            .active_legs()
            .filter(|l| l.status != LegStatus::Invalidated)
            .map(LegView::from)
            .collect()
    }

    /// Pivots whose leg was invalidated, grouped by direction, retained
    /// as candidate anchors for future legs (§6).
    pub fn orphaned_pivots(&self) -> (Vec<PivotRecord>, Vec<PivotRecord>) {
        let mut bull = Vec::new();
        let mut bear = Vec::new();
        for leg in self.manager.invalidated_ledger() {
            let record = PivotRecord {
                price: leg.pivot_price,
                bar_index: leg.pivot_index,
                direction: leg.direction,
            };
            match leg.direction {
                Direction::Bull => bull.push(record),
                Direction::Bear => bear.push(record),
            }
        }
        (bull, bear)
    }

    /// The current pending origin per direction (§6).
    pub fn pending_origins(&self) -> (Option<PendingOrigin>, Option<PendingOrigin>) {
        (
            self.manager.pending_origins().get(Direction::Bull),
            self.manager.pending_origins().get(Direction::Bear),
        )
    }

    pub fn snapshot_state(&self) -> PersistedState {
        PersistedState::capture(self)
    }

    pub fn restore_state(state: PersistedState) -> Result<Self, EngineError> {
        state.restore()
    }
}
