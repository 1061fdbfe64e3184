//! Market trades
//!
//! An externally executed buy or sell against a single instrument in a
//! single book. Trades are immutable once recorded; any number of partial
//! lots may reference one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stable identifier for a market trade. Matches the durable backend's
/// bigserial key.
pub type TradeId = i64;

/// Immutable record of an executed trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketTrade {
    /// Stable trade identifier
    pub trade_id: TradeId,

    /// Execution timestamp
    pub timestamp: DateTime<Utc>,

    /// Instrument identifier (e.g. "IBM")
    pub instrument: String,

    /// Book holding the position
    pub book: String,

    /// Signed quantity: buys positive, sells negative
    pub quantity: Decimal,

    /// Execution price
    pub price: Decimal,
}

impl MarketTrade {
    /// Creates a new market trade record
    pub fn new(
        trade_id: TradeId,
        timestamp: DateTime<Utc>,
        instrument: impl Into<String>,
        book: impl Into<String>,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            trade_id,
            timestamp,
            instrument: instrument.into(),
            book: book.into(),
            quantity,
            price,
        }
    }

    /// Returns true for a buy (positive quantity)
    pub fn is_buy(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// Returns true for a sell (negative quantity)
    pub fn is_sell(&self) -> bool {
        self.quantity < Decimal::ZERO
    }
}

impl std::fmt::Display for MarketTrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}: {}] {} {} @ {} in {}",
            self.trade_id,
            self.timestamp.to_rfc3339(),
            self.quantity,
            self.instrument,
            self.price,
            self.book
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn trade(quantity: Decimal) -> MarketTrade {
        MarketTrade::new(
            1,
            Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap(),
            "IBM",
            "tech",
            quantity,
            dec!(100),
        )
    }

    #[test]
    fn test_side_predicates() {
        assert!(trade(dec!(10)).is_buy());
        assert!(trade(dec!(-10)).is_sell());
        assert!(!trade(dec!(0)).is_buy());
        assert!(!trade(dec!(0)).is_sell());
    }

    #[test]
    fn test_display() {
        let text = format!("{}", trade(dec!(10)));
        assert!(text.contains("10 IBM @ 100 in tech"));
    }
}
