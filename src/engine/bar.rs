//! OHLC bar type.
//!
//! Bars are immutable once constructed and arrive strictly in index order;
//! the engine never revises or re-examines a bar once `process_bar` returns.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLC observation at a fixed timestamp.
///
/// `index` is the caller-assigned, monotonically increasing sequence
/// number within a stream; it is the only ordering key the engine trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Bar {
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            index,
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    /// True range of the bar, `high - low`.
    #[inline]
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// The four OHLC fields a pending origin or pivot may have been sourced
/// from. Used only for tie-breaking (§4.3): `low < high < open < close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceSource {
    Low = 0,
    High = 1,
    Open = 2,
    Close = 3,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::d;

    #[test]
    fn range_is_high_minus_low() {
        let bar = Bar::new(0, Utc::now(), d("10"), d("12"), d("9"), d("11"));
        assert_eq!(bar.range(), d("3"));
    }

    #[test]
    fn source_precedence_ordinal_matches_spec() {
        assert!(PriceSource::Low < PriceSource::High);
        assert!(PriceSource::High < PriceSource::Open);
        assert!(PriceSource::Open < PriceSource::Close);
    }
}
