//! P&L state and derived analytics
//!
//! The state is a value: every transition produces a new `PnlState` and a
//! failed transition leaves the previous value untouched. The scalar
//! triple (quantity, cost, realized) is always derivable from the pools:
//! cost is the negated sum of quantity times price over the unmatched
//! lots, and realized accumulates `open_cost - close_value` over the
//! matched pairs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PnlError, PnlResult};
use crate::pool::{MatchedPool, MatchingPolicy, UnmatchedPool};

/// The P&L of a single instrument position in a single book
#[derive(Debug, Clone, PartialEq)]
pub struct PnlState {
    /// Net signed inventory
    pub quantity: Decimal,

    /// Accumulated cost; buys decrease it, sells increase it, so that a
    /// flat position closed at breakeven carries zero cost
    pub cost: Decimal,

    /// Cumulative realized P&L
    pub realized: Decimal,

    /// Open lots awaiting an opposite-sign counterpart
    pub unmatched: UnmatchedPool,

    /// Completed opening/closing pairs
    pub matched: MatchedPool,
}

impl PnlState {
    /// A flat, empty state under the given matching policy
    pub fn new(policy: MatchingPolicy) -> Self {
        Self {
            quantity: Decimal::ZERO,
            cost: Decimal::ZERO,
            realized: Decimal::ZERO,
            unmatched: UnmatchedPool::new(policy),
            matched: MatchedPool::new(),
        }
    }

    /// Rebuilds a state from persisted scalars and pools
    pub fn from_parts(
        quantity: Decimal,
        cost: Decimal,
        realized: Decimal,
        unmatched: UnmatchedPool,
        matched: MatchedPool,
    ) -> Self {
        Self {
            quantity,
            cost,
            realized,
            unmatched,
            matched,
        }
    }

    /// Returns true when the position is flat
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Average cost per unit of the open inventory; zero when flat
    pub fn avg_cost(&self) -> PnlResult<Decimal> {
        if self.quantity.is_zero() {
            return Ok(Decimal::ZERO);
        }
        (-self.cost)
            .checked_div(self.quantity)
            .ok_or(PnlError::ArithmeticOverflow)
    }

    /// Mark-to-market P&L of the open position at `price`.
    ///
    /// Zero when the mark equals the average cost.
    pub fn unrealized(&self, price: Decimal) -> PnlResult<Decimal> {
        self.quantity
            .checked_mul(price)
            .and_then(|value| value.checked_add(self.cost))
            .ok_or(PnlError::ArithmeticOverflow)
    }

    /// The summary strip at a mark price
    pub fn strip(&self, price: Decimal) -> PnlResult<PnlStrip> {
        Ok(PnlStrip {
            quantity: self.quantity,
            avg_cost: self.avg_cost()?,
            price,
            realized: self.realized,
            unrealized: self.unrealized(price)?,
        })
    }
}

impl std::fmt::Display for PnlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {} + {}", self.quantity, self.cost, self.realized)
    }
}

/// The summary strip: position, average cost, mark, realized and
/// unrealized P&L
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnlStrip {
    /// Net signed inventory
    pub quantity: Decimal,

    /// Average cost per unit of the open inventory
    pub avg_cost: Decimal,

    /// The mark price the strip was computed at
    pub price: Decimal,

    /// Cumulative realized P&L
    pub realized: Decimal,

    /// Mark-to-market P&L at `price`
    pub unrealized: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lot::PartialTrade;
    use crate::trade::MarketTrade;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn long_state() -> PnlState {
        let mut state = PnlState::new(MatchingPolicy::Fifo);
        state.quantity = dec!(10);
        state.cost = dec!(-1000);
        state.realized = dec!(40);
        state.unmatched.push(PartialTrade::open(Arc::new(
            MarketTrade::new(
                1,
                Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap(),
                "IBM",
                "tech",
                dec!(10),
                dec!(100),
            ),
        )));
        state
    }

    #[test]
    fn test_flat_state_is_zeroed() {
        let state = PnlState::new(MatchingPolicy::Fifo);
        assert!(state.is_flat());
        assert_eq!(state.avg_cost().unwrap(), Decimal::ZERO);
        assert_eq!(state.unrealized(dec!(104)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_avg_cost_is_price_per_unit() {
        assert_eq!(long_state().avg_cost().unwrap(), dec!(100));
    }

    #[test]
    fn test_unrealized_at_avg_cost_is_zero() {
        let state = long_state();
        assert_eq!(state.unrealized(dec!(100)).unwrap(), Decimal::ZERO);
        assert_eq!(state.unrealized(dec!(102)).unwrap(), dec!(20));
    }

    #[test]
    fn test_strip() {
        let strip = long_state().strip(dec!(102)).unwrap();
        assert_eq!(strip.quantity, dec!(10));
        assert_eq!(strip.avg_cost, dec!(100));
        assert_eq!(strip.price, dec!(102));
        assert_eq!(strip.realized, dec!(40));
        assert_eq!(strip.unrealized, dec!(20));
    }

    #[test]
    fn test_short_position_analytics() {
        let mut state = PnlState::new(MatchingPolicy::Fifo);
        state.quantity = dec!(-1);
        state.cost = dec!(102);
        assert_eq!(state.avg_cost().unwrap(), dec!(102));
        assert_eq!(state.unrealized(dec!(102)).unwrap(), Decimal::ZERO);
        assert_eq!(state.unrealized(dec!(100)).unwrap(), dec!(2));
    }
}
