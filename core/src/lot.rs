//! Partial trades
//!
//! A lot is a signed sub-quantity of a market trade. Splitting during
//! matching produces further lots, all sharing a reference to the
//! originating trade; market trades never know their lots, so the
//! provenance graph is a one-way tree.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::{PnlError, PnlResult};
use crate::trade::{MarketTrade, TradeId};

/// A signed sub-quantity of a market trade.
///
/// Stores the remaining signed quantity directly; the sign always matches
/// the originating trade and the absolute value never exceeds it. The sum
/// of the sub-quantities of every lot descended from one market trade
/// equals the trade's signed quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialTrade {
    trade: Arc<MarketTrade>,
    quantity: Decimal,
}

impl PartialTrade {
    /// Wraps a market trade as a lot carrying its full quantity
    pub fn open(trade: Arc<MarketTrade>) -> Self {
        let quantity = trade.quantity;
        Self { trade, quantity }
    }

    /// Creates a lot for a sub-quantity of the given trade
    pub fn new(trade: Arc<MarketTrade>, quantity: Decimal) -> Self {
        Self { trade, quantity }
    }

    /// The originating market trade
    pub fn trade(&self) -> &Arc<MarketTrade> {
        &self.trade
    }

    /// The originating trade's identifier
    pub fn trade_id(&self) -> TradeId {
        self.trade.trade_id
    }

    /// The remaining signed quantity of this lot
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// The execution price, always the originating trade's
    pub fn price(&self) -> Decimal {
        self.trade.price
    }

    /// A sibling lot over the same market trade with a different quantity
    pub fn with_quantity(&self, quantity: Decimal) -> Self {
        Self {
            trade: Arc::clone(&self.trade),
            quantity,
        }
    }

    /// Splits this lot into a matched piece of `quantity` and the leftover.
    ///
    /// `quantity` must have the lot's sign and a magnitude no greater than
    /// the lot's.
    pub fn split(&self, quantity: Decimal) -> PnlResult<(Self, Self)> {
        let leftover = self
            .quantity
            .checked_sub(quantity)
            .ok_or(PnlError::ArithmeticOverflow)?;
        Ok((self.with_quantity(quantity), self.with_quantity(leftover)))
    }
}

impl std::fmt::Display for PartialTrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (of {}) @ {}",
            self.quantity, self.trade.quantity, self.trade.price
        )
    }
}
