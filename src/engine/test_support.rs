//! Test-only helpers shared across the engine's unit and integration tests.

#![cfg(test)]

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use super::bar::Bar;

/// Parse a literal into a `Decimal`. Panics on malformed input, which is
/// fine for test fixtures.
pub fn d(s: &str) -> Decimal {
    s.parse().unwrap_or_else(|e| panic!("bad decimal {s:?}: {e}"))
}

/// Build a bar from `(high, low, close)` with `open` defaulted to `close`
/// of the previous bar convention used throughout the scenario fixtures in
/// `spec.md` §8, where open is "omitted where irrelevant".
pub fn bar(index: u64, high: &str, low: &str, close: &str) -> Bar {
    Bar::new(
        index,
        Utc.timestamp_opt(1_700_000_000 + index as i64 * 60, 0)
            .unwrap(),
        d(low),
        d(high),
        d(low),
        d(close),
    )
}
