//! Proximity pruner (§4.4).
//!
//! Within a group of active legs sharing a pivot, eliminates near
//! duplicates so the survivor set stays diverse in both time and range.
//! Bounded-window search keeps this O(N log N) amortized rather than the
//! O(N^2) naive all-pairs check, which degenerates above ~3% proximity
//! as the survivor set grows super-linearly (§4.4).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::leg::{Direction, LegId};

/// Identifies a pivot group: same price, index, and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PivotKey {
    pub pivot_price: Decimal,
    pub pivot_index: u64,
    pub direction: Direction,
}

/// The minimal facts about a leg the pruner needs; decoupled from `Leg`
/// so it can be driven by tests and the lifecycle manager alike.
#[derive(Debug, Clone, Copy)]
pub struct PrunerCandidate {
    pub leg_id: LegId,
    pub origin_index: u64,
    pub range: Decimal,
}

/// Sorted-by-`origin_index` survivor list for one pivot group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PivotGroup {
    /// Sorted ascending by `origin_index`.
    survivors: Vec<(u64, LegId, Decimal)>,
}

impl PivotGroup {
    pub fn is_empty(&self) -> bool {
        self.survivors.is_empty()
    }

    pub fn survivor_ids(&self) -> Vec<LegId> {
        self.survivors.iter().map(|(_, id, _)| *id).collect()
    }

    fn insert_sorted(&mut self, origin_index: u64, leg_id: LegId, range: Decimal) {
        let pos = self
            .survivors
            .partition_point(|(idx, _, _)| *idx < origin_index);
        self.survivors.insert(pos, (origin_index, leg_id, range));
    }

    pub fn remove(&mut self, leg_id: LegId) {
        self.survivors.retain(|(_, id, _)| *id != leg_id);
    }

    /// Refresh an existing survivor's `(origin_index, range)` tuple in
    /// place, a no-op insert if `leg_id` isn't already tracked. Required
    /// because a survivor's underlying leg keeps extending after it first
    /// enters the group (§4.4's comparison must use each leg's *current*
    /// origin/range, not the values captured the bar it was first
    /// inserted); re-sorts since a fresh `origin_index` is always the
    /// newest bar seen so far and therefore belongs at the tail.
    pub fn refresh(&mut self, leg_id: LegId, origin_index: u64, range: Decimal) {
        self.survivors.retain(|(_, id, _)| *id != leg_id);
        self.insert_sorted(origin_index, leg_id, range);
    }

    /// Evaluate `candidate` (a newly created or extended leg) against the
    /// current survivors at bar index `current_index`, per the
    /// bounded-window algorithm in §4.4. Returns the `LegId` of the
    /// survivor that subsumes `candidate` if it is pruned, else inserts
    /// `candidate` and returns `None`.
    pub fn evaluate(
        &mut self,
        candidate: PrunerCandidate,
        current_index: u64,
        threshold: Decimal,
    ) -> Option<LegId> {
        if threshold >= Decimal::ONE {
            // Bound removed entirely: linear scan over every survivor.
            if let Some(survivor) = self.linear_scan(candidate, current_index, threshold) {
                return Some(survivor);
            }
            self.insert_sorted(candidate.origin_index, candidate.leg_id, candidate.range);
            return None;
        }

        let c = Decimal::from(current_index);
        let t = threshold;
        let n = Decimal::from(candidate.origin_index);
        // min_idx = (N.origin_index - T*C) / (1-T); any survivor with
        // origin_index <= min_idx cannot satisfy the time predicate.
        let min_idx_dec = (n - t * c) / (Decimal::ONE - t);
        let start = self
            .survivors
            .partition_point(|(idx, _, _)| Decimal::from(*idx) <= min_idx_dec);

        for &(origin_index, leg_id, range) in &self.survivors[start..] {
            if Self::prunes(candidate, origin_index, range, current_index, threshold) {
                return Some(leg_id);
            }
        }
        self.insert_sorted(candidate.origin_index, candidate.leg_id, candidate.range);
        None
    }

    fn linear_scan(
        &self,
        candidate: PrunerCandidate,
        current_index: u64,
        threshold: Decimal,
    ) -> Option<LegId> {
        for &(origin_index, leg_id, range) in &self.survivors {
            if Self::prunes(candidate, origin_index, range, current_index, threshold) {
                return Some(leg_id);
            }
        }
        None
    }

    fn prunes(
        candidate: PrunerCandidate,
        survivor_origin_index: u64,
        survivor_range: Decimal,
        current_index: u64,
        threshold: Decimal,
    ) -> bool {
        if survivor_origin_index >= candidate.origin_index {
            // Pruner compares a newer candidate against older survivors
            // only; equal or newer origins are not candidates here.
            return false;
        }
        let denom = current_index.saturating_sub(survivor_origin_index);
        if denom == 0 {
            return false;
        }
        let time_ratio = Decimal::from(candidate.origin_index - survivor_origin_index)
            / Decimal::from(denom);
        let max_range = candidate.range.max(survivor_range);
        if max_range <= Decimal::ZERO {
            return false;
        }
        let range_ratio = (candidate.range - survivor_range).abs() / max_range;
        time_ratio < threshold && range_ratio < threshold
    }
}
