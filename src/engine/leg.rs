//! The leg: the central entity of the engine (§3).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::bar::PriceSource;
use super::config::EngineConfig;

/// Stable identifier for a leg, unique across its lifetime. Assigned by
/// the `LegLifecycleManager`'s monotonic counter; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LegId(pub u64);

/// `bull` = low-before-high, `bear` = high-before-low (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bull,
    Bear,
}

impl Direction {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Bull => Direction::Bear,
            Direction::Bear => Direction::Bull,
        }
    }
}

/// A leg's observable lifecycle status. `Invalidated` is terminal (§3
/// invariant 5); `Stale` is a soft, non-binding decay hint (§4.3 note,
/// Open Questions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegStatus {
    Active,
    Stale,
    Invalidated,
}

/// Reason a leg was invalidated, carried on `LegEvent::LegInvalidated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Close breached `pivot - invalidation_threshold * range` (bull) or
    /// the symmetric bear condition (§4.3).
    DecisiveBreach,
    /// Proximity-pruned by a newer leg sharing the same pivot (§4.4).
    Proximity,
    /// Stagnated while price moved elsewhere (§4.3 step 8).
    Staleness,
    /// Cascaded from a parent's invalidation (§4.5).
    ParentCascade,
}

/// A candidate swing: pivot (defended anchor) paired with an origin
/// (furthest extremum reached), awaiting a retracement toward the pivot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub leg_id: LegId,
    pub direction: Direction,

    pub pivot_price: Decimal,
    pub pivot_index: u64,
    pub pivot_source: PriceSource,

    pub origin_price: Decimal,
    pub origin_index: u64,

    pub retracement_pct: Decimal,
    pub formed: bool,
    pub status: LegStatus,

    /// True once 2x completion is reached (§3 invariant 8). Orthogonal to
    /// `status`: a completed leg is frozen but not necessarily
    /// `Invalidated`.
    pub completed: bool,

    pub parent_id: Option<LegId>,
    pub children: Vec<LegId>,

    pub bar_count: u64,
    pub gap_count: u64,

    /// Bar index at which this leg was created. Fixed for its lifetime;
    /// used by the staleness sweep to detect "never extended since
    /// creation" (§4.3 step 8).
    pub created_index: u64,

    /// Bar index at which this leg last materially changed (created or
    /// extended). Used by the staleness sweep (§4.3 step 8, Open
    /// Questions: extension resets the stagnation counter).
    pub last_changed_index: u64,
}

impl Leg {
    /// A leg is terminal — no field may ever change again — once
    /// invalidated or completed (§3 invariants 5 and 8).
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status == LegStatus::Invalidated || self.completed
    }

    /// `origin - pivot` for bull, `pivot - origin` for bear: always
    /// positive by invariant 2.
    #[inline]
    pub fn range(&self) -> Decimal {
        match self.direction {
            Direction::Bull => self.origin_price - self.pivot_price,
            Direction::Bear => self.pivot_price - self.origin_price,
        }
    }

    /// Retracement of `price` from origin toward pivot, clamped to
    /// `[0, +inf)` — negative values (price beyond origin) clamp to 0
    /// per §4.3.
    pub fn retracement_at(&self, price: Decimal) -> Decimal {
        let range = self.range();
        if range <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let raw = match self.direction {
            Direction::Bull => (self.origin_price - price) / range,
            Direction::Bear => (price - self.origin_price) / range,
        };
        raw.max(Decimal::ZERO)
    }

    /// The price beyond which the leg is decisively invalidated (§4.3).
    pub fn invalidation_price(&self, cfg: &EngineConfig) -> Decimal {
        let offset = cfg.invalidation_threshold * self.range();
        match self.direction {
            Direction::Bull => self.pivot_price - offset,
            Direction::Bear => self.pivot_price + offset,
        }
    }

    /// True once `price` has decisively breached the pivot (§4.3).
    pub fn is_decisively_invalidated(&self, price: Decimal, cfg: &EngineConfig) -> bool {
        let threshold = self.invalidation_price(cfg);
        match self.direction {
            Direction::Bull => price < threshold,
            Direction::Bear => price > threshold,
        }
    }

    /// True once `price` has reached `completion_multiple * range` beyond
    /// the pivot (§3 invariant 8, §4.3 step 6).
    pub fn is_completed_at(&self, price: Decimal, cfg: &EngineConfig) -> bool {
        let range = self.range();
        if range <= Decimal::ZERO {
            return false;
        }
        (price - self.pivot_price).abs() >= cfg.completion_multiple * range
    }
}
