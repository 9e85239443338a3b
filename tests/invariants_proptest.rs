//! Property tests for the quantified invariants in spec.md §8 (1-8).

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use swing_engine::{Bar, Direction, Engine, EngineConfig, LegStatus};

fn bar_at(index: u64, low: i64, high_delta: i64, close_frac_pct: i64) -> Bar {
    let low_d = Decimal::new(low, 0);
    let high_d = Decimal::new(low + high_delta.max(1), 0);
    let span = high_d - low_d;
    let close_d = low_d + span * Decimal::new(close_frac_pct.clamp(0, 100), 2);
    Bar::new(
        index,
        Utc.timestamp_opt(1_700_000_000 + index as i64 * 60, 0).unwrap(),
        low_d,
        high_d,
        low_d,
        close_d,
    )
}

fn bar_strategy() -> impl Strategy<Value = (i64, i64, i64)> {
    (10i64..2000, 1i64..40, 0i64..=100)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Testable property 2: formation is monotonic once attained.
    /// Testable property 3: invalidation is terminal.
    /// Testable property 4: pivot is immutable from creation onward.
    /// Testable property 8: completion is terminal.
    #[test]
    fn monotonicity_and_terminality_hold_across_random_streams(
        raw in prop::collection::vec(bar_strategy(), 1..40)
    ) {
        let mut engine = Engine::new(EngineConfig::with_tick_size(Decimal::new(1, 2))).unwrap();
        let mut formed_ever: std::collections::HashSet<_> = Default::default();
        let mut invalidated_ever: std::collections::HashSet<_> = Default::default();
        let mut completed_ever: std::collections::HashSet<_> = Default::default();
        let mut pivots: std::collections::HashMap<_, (Decimal, u64)> = Default::default();

        for (i, (low, delta, frac)) in raw.into_iter().enumerate() {
            let bar = bar_at(i as u64, low, delta, frac);
            engine.process_bar(bar).unwrap();

            for leg in engine.active_legs_snapshot() {
                if leg.formed {
                    formed_ever.insert(leg.leg_id);
                }
                if formed_ever.contains(&leg.leg_id) {
                    prop_assert!(leg.formed, "formed flag reverted to false");
                }

                if leg.status == LegStatus::Invalidated {
                    invalidated_ever.insert(leg.leg_id);
                }

                if leg.completed {
                    completed_ever.insert(leg.leg_id);
                }

                match pivots.get(&leg.leg_id) {
                    Some((price, index)) => {
                        prop_assert_eq!(*price, leg.pivot_price, "pivot price mutated");
                        prop_assert_eq!(*index, leg.pivot_index, "pivot index mutated");
                    }
                    None => {
                        pivots.insert(leg.leg_id, (leg.pivot_price, leg.pivot_index));
                    }
                }
            }
        }
    }

    /// Testable property 1: causality / no-lookahead. Replaying any
    /// prefix from scratch matches the state the streaming engine had at
    /// that point.
    #[test]
    fn causality_holds_for_random_prefixes(
        raw in prop::collection::vec(bar_strategy(), 1..25)
    ) {
        let bars: Vec<Bar> = raw
            .into_iter()
            .enumerate()
            .map(|(i, (low, delta, frac))| bar_at(i as u64, low, delta, frac))
            .collect();

        let mut streaming = Engine::new(EngineConfig::with_tick_size(Decimal::new(1, 2))).unwrap();
        let mut snapshots = Vec::new();
        for b in &bars {
            streaming.process_bar(*b).unwrap();
            let mut snap = streaming.active_legs_snapshot();
            snap.sort_by_key(|l| l.leg_id);
            snapshots.push(snap);
        }

        for prefix_len in 1..=bars.len() {
            let mut replay = Engine::new(EngineConfig::with_tick_size(Decimal::new(1, 2))).unwrap();
            for b in &bars[..prefix_len] {
                replay.process_bar(*b).unwrap();
            }
            let mut replayed = replay.active_legs_snapshot();
            replayed.sort_by_key(|l| l.leg_id);
            prop_assert_eq!(&replayed, &snapshots[prefix_len - 1]);
        }
    }

    /// Testable property 7: proximity survivor diversity — any surviving
    /// pair sharing a pivot satisfies time_ratio >= T OR range_ratio >= T.
    #[test]
    fn pruned_survivors_are_diverse(
        raw in prop::collection::vec(bar_strategy(), 1..40)
    ) {
        let cfg = EngineConfig::with_tick_size(Decimal::new(1, 2));
        let threshold = cfg.proximity_threshold;
        let mut engine = Engine::new(cfg).unwrap();

        for (i, (low, delta, frac)) in raw.into_iter().enumerate() {
            let bar = bar_at(i as u64, low, delta, frac);
            engine.process_bar(bar).unwrap();
        }

        let current_index = engine.active_legs_snapshot().iter().map(|l| l.origin_index).max().unwrap_or(0);
        let mut by_pivot: std::collections::HashMap<(Decimal, u64, Direction), Vec<_>> = Default::default();
        for leg in engine.active_legs_snapshot() {
            by_pivot
                .entry((leg.pivot_price, leg.pivot_index, leg.direction))
                .or_default()
                .push(leg);
        }

        for legs in by_pivot.values() {
            for a in legs {
                for b in legs {
                    if a.leg_id == b.leg_id {
                        continue;
                    }
                    let (older, newer) = if a.origin_index <= b.origin_index { (a, b) } else { (b, a) };
                    let denom = current_index.saturating_sub(older.origin_index);
                    if denom == 0 || newer.origin_index <= older.origin_index {
                        continue;
                    }
                    let time_ratio = Decimal::from(newer.origin_index - older.origin_index)
                        / Decimal::from(denom);
                    let range_a = (a.origin_price - a.pivot_price).abs();
                    let range_b = (b.origin_price - b.pivot_price).abs();
                    let max_range = range_a.max(range_b);
                    if max_range <= Decimal::ZERO {
                        continue;
                    }
                    let range_ratio = (range_a - range_b).abs() / max_range;
                    prop_assert!(
                        time_ratio >= threshold || range_ratio >= threshold,
                        "surviving pair too close: time_ratio={time_ratio} range_ratio={range_ratio}"
                    );
                }
            }
        }
    }
}
