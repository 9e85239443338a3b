//! Pending-origin tracker (§4.2).
//!
//! At most one unconfirmed candidate pivot per direction, awaiting the
//! inter-bar temporal ordering that would let it serve as a leg's pivot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::bar::{Bar, PriceSource};
use super::leg::Direction;

/// An unconfirmed candidate pivot (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingOrigin {
    pub price: Decimal,
    pub bar_index: u64,
    pub direction: Direction,
    pub source: PriceSource,
}

/// Tie-break per §4.3: earlier `bar_index` wins; if equal, the smaller
/// source-precedence ordinal (`low < high < open < close`) wins. Returns
/// `true` if `candidate` should replace `incumbent`.
fn candidate_supersedes(
    incumbent_index: u64,
    incumbent_source: PriceSource,
    candidate_index: u64,
    candidate_source: PriceSource,
) -> bool {
    match candidate_index.cmp(&incumbent_index) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => candidate_source < incumbent_source,
    }
}

/// Owns the (at most two) pending origins, one per direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingOriginTracker {
    bull: Option<PendingOrigin>,
    bear: Option<PendingOrigin>,
}

impl PendingOriginTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, direction: Direction) -> &Option<PendingOrigin> {
        match direction {
            Direction::Bull => &self.bull,
            Direction::Bear => &self.bear,
        }
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut Option<PendingOrigin> {
        match direction {
            Direction::Bull => &mut self.bull,
            Direction::Bear => &mut self.bear,
        }
    }

    pub fn get(&self, direction: Direction) -> Option<PendingOrigin> {
        *self.slot(direction)
    }

    /// Consider `bar` as a new bull-pending (lower low) or bear-pending
    /// (higher high) candidate, replacing the current one only if it is
    /// more extreme or wins the tie-break (§4.2).
    pub fn update(&mut self, bar: &Bar) {
        self.consider(Direction::Bull, bar.low, bar.index, PriceSource::Low);
        self.consider(Direction::Bear, bar.high, bar.index, PriceSource::High);
    }

    fn consider(&mut self, direction: Direction, price: Decimal, bar_index: u64, source: PriceSource) {
        let more_extreme = match direction {
            Direction::Bull => |new: Decimal, cur: Decimal| new < cur,
            Direction::Bear => |new: Decimal, cur: Decimal| new > cur,
        };
        let slot = self.slot_mut(direction);
        match *slot {
            None => {
                *slot = Some(PendingOrigin {
                    price,
                    bar_index,
                    direction,
                    source,
                });
            }
            Some(current) => {
                if more_extreme(price, current.price)
                    || (price == current.price
                        && candidate_supersedes(
                            current.bar_index,
                            current.source,
                            bar_index,
                            source,
                        ))
                {
                    *slot = Some(PendingOrigin {
                        price,
                        bar_index,
                        direction,
                        source,
                    });
                }
            }
        }
    }

    /// Return and clear the pending origin for `direction`, for the
    /// caller to promote into a leg pivot.
    pub fn confirm(&mut self, direction: Direction) -> Option<PendingOrigin> {
        self.slot_mut(direction).take()
    }

    /// Clear a pending origin whose price has been violated before
    /// confirmation: a bull pending is violated by a close below it;
    /// symmetric for bear.
    ///
    /// Callers must invoke this *before* `update` folds the same bar's
    /// own extremes in. Once `update` has superseded a pending with this
    /// bar's own low/high, that pending's `bar_index` equals the current
    /// bar's index, which permanently defeats the `bar.index >
    /// p.bar_index` guard below — checking post-`update` is always a
    /// no-op.
    pub fn invalidate_if_violated(&mut self, bar: &Bar) {
        if let Some(p) = self.bull {
            if bar.close < p.price && bar.index > p.bar_index {
                self.bull = None;
            }
        }
        if let Some(p) = self.bear {
            if bar.close > p.price && bar.index > p.bar_index {
                self.bear = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::bar;

    #[test]
    fn creates_pending_origin_from_first_bar() {
        let mut t = PendingOriginTracker::new();
        t.update(&bar(0, "105", "100", "104"));
        let bull = t.get(Direction::Bull).unwrap();
        assert_eq!(bull.price, crate::engine::test_support::d("100"));
        let bear = t.get(Direction::Bear).unwrap();
        assert_eq!(bear.price, crate::engine::test_support::d("105"));
    }

    #[test]
    fn supersedes_with_more_extreme_low() {
        let mut t = PendingOriginTracker::new();
        t.update(&bar(0, "105", "100", "104"));
        t.update(&bar(1, "103", "98", "99"));
        assert_eq!(
            t.get(Direction::Bull).unwrap().price,
            crate::engine::test_support::d("98")
        );
    }

    #[test]
    fn confirm_clears_the_slot() {
        let mut t = PendingOriginTracker::new();
        t.update(&bar(0, "105", "100", "104"));
        let confirmed = t.confirm(Direction::Bull);
        assert!(confirmed.is_some());
        assert!(t.get(Direction::Bull).is_none());
    }

    #[test]
    fn tie_break_prefers_earlier_bar_index() {
        let mut t = PendingOriginTracker::new();
        t.consider(Direction::Bull, crate::engine::test_support::d("100"), 5, PriceSource::Low);
        t.consider(Direction::Bull, crate::engine::test_support::d("100"), 3, PriceSource::High);
        assert_eq!(t.get(Direction::Bull).unwrap().bar_index, 3);
    }

    // `invalidate_if_violated` must be checked against the pending state
    // as it stood *before* the current bar's own extremes are folded in
    // via `update` (callers must invoke it first). Calling it after
    // `update` on the same bar is always a no-op: by the time it runs,
    // any pending that `update` just superseded carries this bar's own
    // index, permanently defeating the `bar.index > p.bar_index` guard.
    #[test]
    fn invalidate_if_violated_clears_a_stale_bull_pending_before_update_runs() {
        let mut t = PendingOriginTracker::new();
        t.consider(Direction::Bull, crate::engine::test_support::d("100"), 2, PriceSource::Low);
        assert!(t.get(Direction::Bull).is_some());

        // A later bar whose close has dropped below the pending price.
        let later = bar(5, "99", "90", "92");
        t.invalidate_if_violated(&later);
        assert!(t.get(Direction::Bull).is_none());
    }

    #[test]
    fn invalidate_if_violated_clears_a_stale_bear_pending_before_update_runs() {
        let mut t = PendingOriginTracker::new();
        t.consider(Direction::Bear, crate::engine::test_support::d("100"), 2, PriceSource::High);
        assert!(t.get(Direction::Bear).is_some());

        let later = bar(5, "110", "101", "108");
        t.invalidate_if_violated(&later);
        assert!(t.get(Direction::Bear).is_none());
    }

    #[test]
    fn calling_invalidate_if_violated_after_update_on_the_same_bar_is_a_no_op() {
        // Documents why callers must check violation *before* `update`:
        // once `update` has already superseded the slot with this bar's
        // own extreme, the guard always blocks the clear.
        let mut t = PendingOriginTracker::new();
        t.update(&bar(0, "105", "100", "104"));
        let same_bar = bar(0, "105", "100", "104");
        t.invalidate_if_violated(&same_bar);
        assert!(t.get(Direction::Bull).is_some());
    }
}
