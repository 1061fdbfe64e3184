//! Pool deltas
//!
//! The core engine folds a trade over a hydrated in-memory state; this
//! module computes what that fold did to the unmatched pool so the ledger
//! can replay it as bitemporal row operations. Lots are keyed by
//! `(trade_id, quantity)`: the unmatched pool holds at most one lot per
//! market trade, so the key identifies a row, and a split shows up as one
//! closed row plus one opened row for the same trade.

use std::collections::HashSet;

use rust_decimal::Decimal;

use lotmatch_core::{PartialTrade, TradeId};

/// Identity of an unmatched-pool row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LotKey {
    /// The originating market trade
    pub trade_id: TradeId,

    /// The lot's remaining signed quantity
    pub quantity: Decimal,
}

impl LotKey {
    fn of(lot: &PartialTrade) -> Self {
        Self {
            trade_id: lot.trade_id(),
            quantity: lot.quantity(),
        }
    }
}

/// Row operations that carry the stored pool from one state to the next
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LotDelta {
    /// Rows in force before the fold but not after: close their validity
    pub closed: Vec<LotKey>,

    /// Rows in force after the fold but not before: insert them
    pub opened: Vec<LotKey>,
}

impl LotDelta {
    /// Returns true when the fold left the stored pool untouched
    pub fn is_empty(&self) -> bool {
        self.closed.is_empty() && self.opened.is_empty()
    }
}

/// Diffs the unmatched pool around a fold, preserving pool order within
/// each side
pub fn diff_unmatched(before: &[PartialTrade], after: &[PartialTrade]) -> LotDelta {
    let before_keys: HashSet<LotKey> = before.iter().map(LotKey::of).collect();
    let after_keys: HashSet<LotKey> = after.iter().map(LotKey::of).collect();

    LotDelta {
        closed: before
            .iter()
            .map(LotKey::of)
            .filter(|key| !after_keys.contains(key))
            .collect(),
        opened: after
            .iter()
            .map(LotKey::of)
            .filter(|key| !before_keys.contains(key))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lotmatch_core::MarketTrade;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn lot(trade_id: TradeId, quantity: Decimal) -> PartialTrade {
        PartialTrade::new(
            Arc::new(MarketTrade::new(
                trade_id,
                Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap(),
                "IBM",
                "tech",
                quantity,
                dec!(100),
            )),
            quantity,
        )
    }

    #[test]
    fn test_untouched_pool_has_no_delta() {
        let pool = vec![lot(1, dec!(6)), lot(2, dec!(6))];
        assert!(diff_unmatched(&pool, &pool).is_empty());
    }

    #[test]
    fn test_extend_opens_one_row() {
        let before = vec![lot(1, dec!(6))];
        let after = vec![lot(1, dec!(6)), lot(2, dec!(4))];
        let delta = diff_unmatched(&before, &after);

        assert!(delta.closed.is_empty());
        assert_eq!(
            delta.opened,
            vec![LotKey {
                trade_id: 2,
                quantity: dec!(4)
            }]
        );
    }

    #[test]
    fn test_full_match_closes_one_row() {
        let before = vec![lot(1, dec!(6)), lot(2, dec!(6))];
        let after = vec![lot(2, dec!(6))];
        let delta = diff_unmatched(&before, &after);

        assert_eq!(
            delta.closed,
            vec![LotKey {
                trade_id: 1,
                quantity: dec!(6)
            }]
        );
        assert!(delta.opened.is_empty());
    }

    #[test]
    fn test_split_closes_and_reopens_the_same_trade() {
        let before = vec![lot(1, dec!(6))];
        let after = vec![lot(1, dec!(2))];
        let delta = diff_unmatched(&before, &after);

        assert_eq!(
            delta.closed,
            vec![LotKey {
                trade_id: 1,
                quantity: dec!(6)
            }]
        );
        assert_eq!(
            delta.opened,
            vec![LotKey {
                trade_id: 1,
                quantity: dec!(2)
            }]
        );
    }

    #[test]
    fn test_cross_the_flat_line_swaps_the_pool() {
        let before = vec![lot(1, dec!(1))];
        let after = vec![lot(2, dec!(-1))];
        let delta = diff_unmatched(&before, &after);

        assert_eq!(delta.closed.len(), 1);
        assert_eq!(delta.opened.len(), 1);
        assert_eq!(delta.opened[0].trade_id, 2);
        assert_eq!(delta.opened[0].quantity, dec!(-1));
    }
}
