//! `LegEvent`: the sole observable side effect of `process_bar` (§4.3,
//! §5). A tagged sum over event kinds, matching the teacher's pattern of
//! representing heterogeneous payloads as a plain enum rather than
//! dynamically-typed objects (§9 DESIGN NOTES).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::leg::{Direction, InvalidationReason, LegId};

/// An event emitted during a single `process_bar` call. Events are
/// totally ordered within the call and timestamped with the bar index
/// that produced them (§5); they are never reordered or coalesced across
/// bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LegEvent {
    LegCreated {
        leg_id: LegId,
        bar_index: u64,
        direction: Direction,
        pivot_price: Decimal,
        pivot_index: u64,
        origin_price: Decimal,
        origin_index: u64,
        parent_id: Option<LegId>,
    },
    LegExtended {
        leg_id: LegId,
        bar_index: u64,
        new_origin_price: Decimal,
        new_origin_index: u64,
    },
    LegFormed {
        leg_id: LegId,
        bar_index: u64,
        retracement_pct: Decimal,
    },
    /// 2x completion reached (§3 invariant 8). Not one of the five kinds
    /// named in §4.3's contract verbatim, but required to make
    /// completion terminality (testable property 8) observable; the
    /// leg's `status` is unaffected, only `completed` is set.
    LegCompleted {
        leg_id: LegId,
        bar_index: u64,
    },
    LegPruned {
        leg_id: LegId,
        bar_index: u64,
        survivor_id: LegId,
    },
    LegInvalidated {
        leg_id: LegId,
        bar_index: u64,
        reason: InvalidationReason,
    },
}

impl LegEvent {
    pub fn leg_id(&self) -> LegId {
        match self {
            LegEvent::LegCreated { leg_id, .. }
            | LegEvent::LegExtended { leg_id, .. }
            | LegEvent::LegFormed { leg_id, .. }
            | LegEvent::LegCompleted { leg_id, .. }
            | LegEvent::LegPruned { leg_id, .. }
            | LegEvent::LegInvalidated { leg_id, .. } => *leg_id,
        }
    }

    pub fn bar_index(&self) -> u64 {
        match self {
            LegEvent::LegCreated { bar_index, .. }
            | LegEvent::LegExtended { bar_index, .. }
            | LegEvent::LegFormed { bar_index, .. }
            | LegEvent::LegCompleted { bar_index, .. }
            | LegEvent::LegPruned { bar_index, .. }
            | LegEvent::LegInvalidated { bar_index, .. } => *bar_index,
        }
    }
}
