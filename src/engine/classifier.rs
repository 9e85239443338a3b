//! Bar classifier (§4.1).
//!
//! Establishes intra-bar temporal ordering between a bar's high and low by
//! relating it to its predecessor. Classification is total and never
//! fails: every pair of bars maps to exactly one of the four tags below.

use std::cmp::Ordering;

use super::bar::Bar;

/// Relational tag between a bar `B` and its predecessor `A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarRelation {
    /// Higher high, low not lower (higher or tied): `A.low -> B.high`
    /// ordering is available. A tied low still counts as "not lower" —
    /// the high alone is the genuinely new extreme establishing the
    /// bullish continuation, so it is not folded into `Type1`.
    Type2Bull,
    /// Lower low, high not higher (lower or tied): `A.high -> B.low`
    /// ordering is available. Symmetric to `Type2Bull`'s tie handling.
    Type2Bear,
    /// Inside bar: high not higher and low not lower (each is either
    /// strictly within or tied to the predecessor's extreme). Both
    /// `A.high -> B.low` and `A.low -> B.high` orderings are established
    /// because neither of B's extremes breaks out.
    Type1,
    /// Outside/engulfing bar: both extremes break out, in opposite
    /// directions. Both orderings are merely possible within the new
    /// bar. Treated as a decision point; branches are not collapsed.
    Type3,
}

/// Classify `current` against `previous`. Total over all bar pairs,
/// including the boundary cases where exactly one of the two extremes
/// ties its predecessor (`current.high == previous.high` or
/// `current.low == previous.low`): a tie on one side is treated as "not
/// broken out" on that side, so it never turns a genuine breakout on the
/// other side into a `Type1` inside bar.
pub fn classify(previous: &Bar, current: &Bar) -> BarRelation {
    let high_cmp = current.high.cmp(&previous.high);
    let low_cmp = current.low.cmp(&previous.low);

    match (high_cmp, low_cmp) {
        (Ordering::Greater, Ordering::Less) => BarRelation::Type3,
        (Ordering::Less | Ordering::Equal, Ordering::Greater | Ordering::Equal) => {
            BarRelation::Type1
        }
        (Ordering::Greater, Ordering::Greater | Ordering::Equal) => BarRelation::Type2Bull,
        (Ordering::Less | Ordering::Equal, Ordering::Less) => BarRelation::Type2Bear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::bar;

    #[test]
    fn higher_high_higher_low_is_type2_bull() {
        let a = bar(0, "105", "100", "104");
        let b = bar(1, "107", "103", "106");
        assert_eq!(classify(&a, &b), BarRelation::Type2Bull);
    }

    #[test]
    fn lower_high_lower_low_is_type2_bear() {
        let a = bar(0, "105", "100", "102");
        let b = bar(1, "103", "98", "99");
        assert_eq!(classify(&a, &b), BarRelation::Type2Bear);
    }

    #[test]
    fn strictly_inside_is_type1() {
        let a = bar(0, "108", "104", "107");
        let b = bar(1, "107", "105", "105");
        assert_eq!(classify(&a, &b), BarRelation::Type1);
    }

    #[test]
    fn engulfing_is_type3() {
        let a = bar(0, "105", "100", "102");
        let b = bar(1, "110", "95", "103");
        assert_eq!(classify(&a, &b), BarRelation::Type3);
    }

    #[test]
    fn equal_high_and_low_is_type1() {
        let a = bar(0, "105", "100", "102");
        let b = bar(1, "105", "100", "103");
        assert_eq!(classify(&a, &b), BarRelation::Type1);
    }

    #[test]
    fn higher_high_with_tied_low_is_type2_bull_not_type1() {
        let a = bar(0, "105", "100", "102");
        let b = bar(1, "107", "100", "103");
        assert_eq!(classify(&a, &b), BarRelation::Type2Bull);
    }

    #[test]
    fn tied_high_with_lower_low_is_type2_bear_not_type1() {
        let a = bar(0, "105", "100", "102");
        let b = bar(1, "105", "97", "99");
        assert_eq!(classify(&a, &b), BarRelation::Type2Bear);
    }
}
