//! Leg lifecycle manager (§4.3).
//!
//! Owns the active-leg arena and is the only component that mutates legs.
//! `process_bar` is atomic: events are buffered locally and only applied
//! once the whole bar's processing succeeds (§9 DESIGN NOTES: "collect
//! events into a local buffer and emit them after mutation completes").

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::classifier::{self, BarRelation};
use super::config::EngineConfig;
use super::error::EngineError;
use super::events::LegEvent;
use super::graph::ParentChildGraph;
use super::leg::{Direction, InvalidationReason, Leg, LegId, LegStatus};
use super::pending_origin::PendingOriginTracker;
use super::pruner::{PivotGroup, PivotKey, PrunerCandidate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegLifecycleManager {
    config: EngineConfig,
    legs: HashMap<LegId, Leg>,
    next_leg_id: u64,
    pending: PendingOriginTracker,
    graph: ParentChildGraph,
    #[serde(with = "pivot_group_map")]
    pivot_groups: HashMap<PivotKey, PivotGroup>,
    last_bar: Option<Bar>,
    /// Bounded tail of invalidated legs retained for event-replay context
    /// (§5 memory discipline), drained as emitted events are consumed.
    invalidated_ledger: Vec<Leg>,
}

const INVALIDATED_LEDGER_CAP: usize = 256;

/// `HashMap<PivotKey, PivotGroup>` serializes as a JSON array of pairs
/// rather than an object, since `PivotKey` is not a string (serde_json
/// only supports string map keys natively).
mod pivot_group_map {
    use std::collections::HashMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{PivotGroup, PivotKey};

    pub fn serialize<S>(
        map: &HashMap<PivotKey, PivotGroup>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let entries: Vec<(&PivotKey, &PivotGroup)> = map.iter().collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<PivotKey, PivotGroup>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries: Vec<(PivotKey, PivotGroup)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

impl LegLifecycleManager {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            legs: HashMap::new(),
            next_leg_id: 1,
            pending: PendingOriginTracker::new(),
            graph: ParentChildGraph::new(),
            pivot_groups: HashMap::new(),
            last_bar: None,
            invalidated_ledger: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active_legs(&self) -> impl Iterator<Item = &Leg> {
        self.legs.values()
    }

    pub fn leg(&self, id: LegId) -> Option<&Leg> {
        self.legs.get(&id)
    }

    pub fn pending_origins(&self) -> &PendingOriginTracker {
        &self.pending
    }

    pub fn graph(&self) -> &ParentChildGraph {
        &self.graph
    }

    pub fn invalidated_ledger(&self) -> &[Leg] {
        &self.invalidated_ledger
    }

    fn alloc_leg_id(&mut self) -> LegId {
        let id = LegId(self.next_leg_id);
        self.next_leg_id += 1;
        id
    }

    /// Process one bar, returning the ordered event batch. On `Err`, the
    /// manager's state is guaranteed unchanged (§4.3 atomicity).
    pub fn process_bar(&mut self, bar: Bar) -> Result<Vec<LegEvent>, EngineError> {
        // Work on a scratch copy so a mid-processing invariant failure
        // leaves `self` untouched.
        let mut scratch = self.clone();
        let events = scratch.process_bar_mut(bar)?;
        *self = scratch;
        Ok(events)
    }

    fn process_bar_mut(&mut self, bar: Bar) -> Result<Vec<LegEvent>, EngineError> {
        let mut events = Vec::new();

        let relation = self.last_bar.as_ref().map(|prev| classifier::classify(prev, &bar));
        let gap = self
            .last_bar
            .as_ref()
            .map(|prev| bar.low > prev.high || bar.high < prev.low)
            .unwrap_or(false);

        // Step 6 (reordered ahead of step 3): completion uses each leg's
        // pre-bar origin/range. A bar whose high/low would both complete
        // the leg (2x beyond pivot) and extend its origin freezes the leg
        // at the pre-bar origin — completion is evaluated first so the
        // leg never gets a chance to extend past the point that made it
        // terminal (§3 invariant 8, S3).
        self.check_completion(&bar, &mut events);

        // Step 3: extend existing (still non-terminal) legs and recompute
        // retracement/formation.
        self.extend_and_form(&bar, relation, gap, &mut events)?;

        // Step 4: promote confirmed pending origins into new legs.
        if let Some(rel) = relation {
            self.promote_pending(&bar, rel, &mut events)?;
        }

        // Step 2: update pending origins for the *next* bar's promotion
        // decisions. Deliberately after promotion so a promotion this bar
        // consumes the pending state as it stood before this bar's own
        // extremes are folded in (no intra-bar assumption, §4.1).
        //
        // `invalidate_if_violated` must run against the pending state as
        // it stood *before* `update` folds this bar's own extremes in —
        // otherwise a pending that `update` is about to supersede always
        // carries this bar's own index by the time the violation check
        // runs, permanently defeating its `bar.index > p.bar_index` guard.
        self.pending.invalidate_if_violated(&bar);
        self.pending.update(&bar);

        // Step 5: decisive-invalidation check, with cascade.
        self.check_decisive_invalidation(&bar, &mut events)?;

        // Step 8: staleness sweep.
        self.staleness_sweep(&bar, &mut events)?;

        // Step 7: proximity pruner sweep for groups touched this bar.
        self.prune_touched_groups(&bar, &mut events)?;

        self.trim_invalidated_ledger();
        self.last_bar = Some(bar);
        Ok(events)
    }

    fn retracement_price(&self, bar: &Bar, direction: Direction, relation: Option<BarRelation>) -> Decimal {
        match (relation, direction) {
            (Some(BarRelation::Type1), Direction::Bull) => bar.low,
            (Some(BarRelation::Type1), Direction::Bear) => bar.high,
            _ => bar.close,
        }
    }

    fn extend_and_form(
        &mut self,
        bar: &Bar,
        relation: Option<BarRelation>,
        gap: bool,
        events: &mut Vec<LegEvent>,
    ) -> Result<(), EngineError> {
        let ids: Vec<LegId> = self
            .legs
            .values()
            .filter(|l| !l.is_terminal())
            .map(|l| l.leg_id)
            .collect();

        for id in ids {
            let extends = {
                let leg = self.legs.get(&id).expect("leg exists");
                match leg.direction {
                    Direction::Bull => bar.high > leg.origin_price,
                    Direction::Bear => bar.low < leg.origin_price,
                }
            };

            if extends {
                let leg = self.legs.get_mut(&id).expect("leg exists");
                let (new_price, new_index) = match leg.direction {
                    Direction::Bull => (bar.high, bar.index),
                    Direction::Bear => (bar.low, bar.index),
                };
                leg.origin_price = new_price;
                leg.origin_index = new_index;
                leg.last_changed_index = bar.index;
                events.push(LegEvent::LegExtended {
                    leg_id: id,
                    bar_index: bar.index,
                    new_origin_price: new_price,
                    new_origin_index: new_index,
                });
            }

            let leg = self.legs.get_mut(&id).expect("leg exists");
            leg.bar_count += 1;
            if gap {
                leg.gap_count += 1;
            }

            let price = self.retracement_price(bar, leg.direction, relation);
            let leg = self.legs.get_mut(&id).expect("leg exists");
            let retracement = leg.retracement_at(price);
            leg.retracement_pct = retracement;
            if !leg.formed && retracement >= self.config.formation_threshold {
                leg.formed = true;
                events.push(LegEvent::LegFormed {
                    leg_id: id,
                    bar_index: bar.index,
                    retracement_pct: retracement,
                });
            }
        }
        Ok(())
    }

    /// Whether an active, non-terminal leg of `direction` already defends
    /// a pivot at least as extreme as `candidate_price` — if so, a new
    /// promotion would be redundant with that leg's ongoing extension.
    fn direction_already_covered(&self, direction: Direction, candidate_price: Decimal) -> bool {
        self.legs.values().any(|l| {
            !l.is_terminal()
                && l.direction == direction
                && match direction {
                    Direction::Bull => l.pivot_price <= candidate_price,
                    Direction::Bear => l.pivot_price >= candidate_price,
                }
        })
    }

    fn promote_pending(
        &mut self,
        bar: &Bar,
        relation: BarRelation,
        events: &mut Vec<LegEvent>,
    ) -> Result<(), EngineError> {
        let (bull_ok, bear_ok) = match relation {
            BarRelation::Type2Bull => (true, false),
            BarRelation::Type2Bear => (false, true),
            BarRelation::Type1 => (true, true),
            BarRelation::Type3 => (false, false),
        };

        // Binding implementation choice (§9 Open Questions): bull before
        // bear, for deterministic test reproducibility.
        if bull_ok {
            self.try_promote(bar, Direction::Bull, events)?;
        }
        if bear_ok {
            self.try_promote(bar, Direction::Bear, events)?;
        }
        Ok(())
    }

    fn try_promote(
        &mut self,
        bar: &Bar,
        direction: Direction,
        events: &mut Vec<LegEvent>,
    ) -> Result<(), EngineError> {
        let Some(pending) = self.pending.get(direction) else {
            return Ok(());
        };
        if self.direction_already_covered(direction, pending.price) {
            return Ok(());
        }

        let (origin_price, origin_index) = match direction {
            Direction::Bull => (bar.high, bar.index),
            Direction::Bear => (bar.low, bar.index),
        };
        if pending.bar_index > origin_index {
            return Err(EngineError::InvariantViolation {
                invariant: "pivot_index <= origin_index",
                bar_index: bar.index,
                detail: format!(
                    "pending origin at {} postdates candidate leg origin at {}",
                    pending.bar_index, origin_index
                ),
            });
        }

        self.pending.confirm(direction);

        let leg_id = self.alloc_leg_id();
        let parent_id = self.find_parent(pending.price, pending.bar_index);

        let leg = Leg {
            leg_id,
            direction,
            pivot_price: pending.price,
            pivot_index: pending.bar_index,
            pivot_source: pending.source,
            origin_price,
            origin_index,
            retracement_pct: Decimal::ZERO,
            formed: false,
            status: LegStatus::Active,
            completed: false,
            parent_id,
            children: Vec::new(),
            bar_count: 1,
            gap_count: 0,
            created_index: bar.index,
            last_changed_index: bar.index,
        };

        if let Some(parent) = parent_id {
            self.graph.set_parent(leg_id, parent);
            if let Some(p) = self.legs.get_mut(&parent) {
                p.children.push(leg_id);
            }
        }

        tracing::trace!(?leg_id, ?direction, pivot = %leg.pivot_price, origin = %leg.origin_price, "leg created");
        events.push(LegEvent::LegCreated {
            leg_id,
            bar_index: bar.index,
            direction,
            pivot_price: leg.pivot_price,
            pivot_index: leg.pivot_index,
            origin_price: leg.origin_price,
            origin_index: leg.origin_index,
            parent_id,
        });

        self.legs.insert(leg_id, leg);
        self.touch_pivot_group(leg_id);
        Ok(())
    }

    /// Search active legs for one whose defended pivot or origin is the
    /// source of the new leg's pivot (§4.5: pivot provenance, not
    /// geometric containment).
    ///
    /// Ties (more than one active leg's pivot/origin coincides with the
    /// candidate, plausible with tick-quantized prices) are broken
    /// deterministically by smallest `LegId` — i.e. the oldest surviving
    /// match — rather than by `HashMap` iteration order, which differs
    /// across distinct map instances and would otherwise let two engines
    /// fed the same bar stream assign different parents (violating
    /// causality, testable property 1).
    fn find_parent(&self, pivot_price: Decimal, pivot_index: u64) -> Option<LegId> {
        self.legs
            .values()
            .filter(|p| !p.is_terminal())
            .filter(|p| {
                (p.pivot_price == pivot_price && p.pivot_index == pivot_index)
                    || (p.origin_price == pivot_price && p.origin_index == pivot_index)
            })
            .min_by_key(|p| p.leg_id)
            .map(|p| p.leg_id)
    }

    fn pivot_key(leg: &Leg) -> PivotKey {
        PivotKey {
            pivot_price: leg.pivot_price,
            pivot_index: leg.pivot_index,
            direction: leg.direction,
        }
    }

    fn touch_pivot_group(&mut self, leg_id: LegId) {
        let Some(leg) = self.legs.get(&leg_id) else {
            return;
        };
        let key = Self::pivot_key(leg);
        self.pivot_groups.entry(key).or_default();
    }

    fn check_decisive_invalidation(
        &mut self,
        bar: &Bar,
        events: &mut Vec<LegEvent>,
    ) -> Result<(), EngineError> {
        let ids: Vec<LegId> = self
            .legs
            .values()
            .filter(|l| !l.is_terminal())
            .map(|l| l.leg_id)
            .collect();

        for id in ids {
            let Some(leg) = self.legs.get(&id) else { continue };
            if leg.is_decisively_invalidated(bar.close, &self.config) {
                self.invalidate_leg(id, bar.index, InvalidationReason::DecisiveBreach, events)?;
            }
        }
        Ok(())
    }

    fn check_completion(&mut self, bar: &Bar, events: &mut Vec<LegEvent>) {
        let ids: Vec<LegId> = self
            .legs
            .values()
            .filter(|l| !l.is_terminal())
            .map(|l| l.leg_id)
            .collect();
        for id in ids {
            let Some(leg) = self.legs.get(&id) else { continue };
            if leg.is_completed_at(bar.close, &self.config) {
                let leg = self.legs.get_mut(&id).expect("leg exists");
                leg.completed = true;
                events.push(LegEvent::LegCompleted {
                    leg_id: id,
                    bar_index: bar.index,
                });
            }
        }
    }

    fn staleness_sweep(&mut self, bar: &Bar, events: &mut Vec<LegEvent>) -> Result<(), EngineError> {
        let ids: Vec<LegId> = self
            .legs
            .values()
            .filter(|l| !l.is_terminal())
            .map(|l| l.leg_id)
            .collect();
        for id in ids {
            let Some(leg) = self.legs.get(&id) else { continue };
            let range = leg.range();
            if range <= Decimal::ZERO {
                continue;
            }
            let never_extended = leg.last_changed_index == leg.created_index;
            let drift = (bar.close - leg.origin_price).abs();
            if never_extended && drift > self.config.staleness_multiple * range {
                self.invalidate_leg(id, bar.index, InvalidationReason::Staleness, events)?;
            }
        }
        Ok(())
    }

    fn prune_touched_groups(&mut self, bar: &Bar, events: &mut Vec<LegEvent>) -> Result<(), EngineError> {
        let keys: Vec<PivotKey> = self.pivot_groups.keys().copied().collect();
        for key in keys {
            let candidate_ids: Vec<LegId> = self
                .legs
                .values()
                .filter(|l| !l.is_terminal() && Self::pivot_key(l) == key)
                .map(|l| l.leg_id)
                .collect();
            for id in candidate_ids {
                let Some(leg) = self.legs.get(&id) else { continue };
                let candidate = PrunerCandidate {
                    leg_id: id,
                    origin_index: leg.origin_index,
                    range: leg.range(),
                };
                let group = self.pivot_groups.entry(key).or_default();
                if group.survivor_ids().contains(&id) {
                    // Already a survivor: refresh its stored tuple so
                    // later comparisons in this group use its current
                    // origin/range rather than the stale values captured
                    // the bar it first entered (a leg keeps extending
                    // after that).
                    group.refresh(id, candidate.origin_index, candidate.range);
                    continue;
                }
                if let Some(survivor) = group.evaluate(candidate, bar.index, self.config.proximity_threshold) {
                    events.push(LegEvent::LegPruned {
                        leg_id: id,
                        bar_index: bar.index,
                        survivor_id: survivor,
                    });
                    self.invalidate_leg(id, bar.index, InvalidationReason::Proximity, events)?;
                }
            }
        }
        Ok(())
    }

    /// Invalidate `id` and cascade per §4.5. Recurses through children
    /// whose pivot directly derives from `id`'s pivot; children derived
    /// from `id`'s origin are preserved and detached (reparented to
    /// `id`'s own parent, or made root).
    fn invalidate_leg(
        &mut self,
        id: LegId,
        bar_index: u64,
        reason: InvalidationReason,
        events: &mut Vec<LegEvent>,
    ) -> Result<(), EngineError> {
        let Some(leg) = self.legs.get(&id) else {
            return Ok(());
        };
        if leg.is_terminal() {
            return Ok(());
        }
        let (pivot_price, pivot_index, origin_price, origin_index, children, grandparent) = {
            let leg = self.legs.get(&id).unwrap();
            (
                leg.pivot_price,
                leg.pivot_index,
                leg.origin_price,
                leg.origin_index,
                leg.children.clone(),
                leg.parent_id,
            )
        };

        let leg = self.legs.get_mut(&id).unwrap();
        leg.status = LegStatus::Invalidated;
        tracing::debug!(leg_id = ?id, ?reason, bar_index, "leg invalidated");
        events.push(LegEvent::LegInvalidated {
            leg_id: id,
            bar_index,
            reason,
        });

        self.pivot_groups
            .entry(Self::pivot_key(self.legs.get(&id).unwrap()))
            .or_default()
            .remove(id);

        for child_id in children {
            let Some(child) = self.legs.get(&child_id) else { continue };
            if child.is_terminal() {
                continue;
            }
            let derives_from_pivot =
                child.pivot_price == pivot_price && child.pivot_index == pivot_index;
            if derives_from_pivot {
                self.invalidate_leg(child_id, bar_index, InvalidationReason::ParentCascade, events)?;
            } else {
                debug_assert!(
                    child.pivot_price == origin_price && child.pivot_index == origin_index,
                    "child must derive from parent's pivot or origin"
                );
                // Independently valid: detach and reparent upward.
                self.graph.remove(child_id);
                if let Some(gp) = grandparent {
                    if !self.graph.is_ancestor_of(child_id, gp) {
                        self.graph.set_parent(child_id, gp);
                        if let Some(g) = self.legs.get_mut(&gp) {
                            g.children.push(child_id);
                        }
                        if let Some(c) = self.legs.get_mut(&child_id) {
                            c.parent_id = Some(gp);
                        }
                    }
                } else if let Some(c) = self.legs.get_mut(&child_id) {
                    c.parent_id = None;
                }
            }
        }

        if let Some(leg) = self.legs.get(&id).cloned() {
            self.invalidated_ledger.push(leg);
        }
        self.graph.forget(id);
        Ok(())
    }

    fn trim_invalidated_ledger(&mut self) {
        let len = self.invalidated_ledger.len();
        if len > INVALIDATED_LEDGER_CAP {
            self.invalidated_ledger.drain(0..len - INVALIDATED_LEDGER_CAP);
        }
    }
}
