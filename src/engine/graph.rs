//! Parent-child graph (§4.5).
//!
//! Tracks pivot-derivation relationships between legs and cascades
//! invalidations. Per §9 DESIGN NOTES this holds only `LegId`s — never
//! legs themselves — so it stays a simple, acyclic adjacency structure
//! the `LegLifecycleManager`'s leg arena looks up against.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::leg::LegId;

/// Relational, non-owning view of leg parentage. A leg has at most one
/// parent; a parent may have many children (§4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParentChildGraph {
    parent_of: HashMap<LegId, LegId>,
    children_of: HashMap<LegId, HashSet<LegId>>,
}

impl ParentChildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent_of(&self, child: LegId) -> Option<LegId> {
        self.parent_of.get(&child).copied()
    }

    pub fn children_of(&self, parent: LegId) -> Vec<LegId> {
        self.children_of
            .get(&parent)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Record `child`'s parent as `parent`. Panics never; `set_parent`
    /// overwrites any prior link (used by reparenting, §4.5).
    pub fn set_parent(&mut self, child: LegId, parent: LegId) {
        self.remove(child);
        self.parent_of.insert(child, parent);
        self.children_of.entry(parent).or_default().insert(child);
    }

    /// Clear `child`'s link to its current parent, if any. Used when a
    /// surviving child is reparented or becomes root (§4.5).
    pub fn remove(&mut self, child: LegId) {
        if let Some(old_parent) = self.parent_of.remove(&child) {
            if let Some(siblings) = self.children_of.get_mut(&old_parent) {
                siblings.remove(&child);
            }
        }
    }

    /// Drop every trace of `leg_id` from the graph: its parent link and
    /// its children's membership (children are *not* removed themselves;
    /// callers decide whether to cascade or reparent them).
    pub fn forget(&mut self, leg_id: LegId) {
        self.remove(leg_id);
        self.children_of.remove(&leg_id);
    }

    /// True iff `ancestor` appears somewhere in `leg`'s parent chain.
    /// Used to guard against introducing a cycle when reparenting.
    pub fn is_ancestor_of(&self, ancestor: LegId, leg: LegId) -> bool {
        let mut cursor = leg;
        let mut guard = self.parent_of.len() + 1;
        while let Some(p) = self.parent_of(cursor) {
            if p == ancestor {
                return true;
            }
            cursor = p;
            guard -= 1;
            if guard == 0 {
                // Would only trip if a cycle already existed; treated as
                // "yes, related" so callers refuse the new link rather
                // than loop forever.
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_parent_links_both_directions() {
        let mut g = ParentChildGraph::new();
        g.set_parent(LegId(2), LegId(1));
        assert_eq!(g.parent_of(LegId(2)), Some(LegId(1)));
        assert_eq!(g.children_of(LegId(1)), vec![LegId(2)]);
    }

    #[test]
    fn forget_removes_parent_link_but_not_children_set() {
        let mut g = ParentChildGraph::new();
        g.set_parent(LegId(2), LegId(1));
        g.set_parent(LegId(3), LegId(2));
        g.forget(LegId(1));
        assert_eq!(g.parent_of(LegId(2)), None);
        assert_eq!(g.parent_of(LegId(3)), Some(LegId(2)));
    }

    #[test]
    fn is_ancestor_of_detects_chain() {
        let mut g = ParentChildGraph::new();
        g.set_parent(LegId(2), LegId(1));
        g.set_parent(LegId(3), LegId(2));
        assert!(g.is_ancestor_of(LegId(1), LegId(3)));
        assert!(!g.is_ancestor_of(LegId(3), LegId(1)));
    }
}
