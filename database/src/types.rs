//! Row types for the durable backend

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use lotmatch_core::TradeId;

/// P&L scalars as persisted in a `pnl` snapshot row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PnlSnapshot {
    /// Net signed inventory
    pub quantity: Decimal,

    /// Accumulated cost of the open position
    pub cost: Decimal,

    /// Cumulative realized P&L
    pub realized: Decimal,
}

impl PnlSnapshot {
    /// The flat, empty snapshot used before any trade is booked
    pub fn flat() -> Self {
        Self {
            quantity: Decimal::ZERO,
            cost: Decimal::ZERO,
            realized: Decimal::ZERO,
        }
    }
}

/// An unmatched-pool row joined with its market trade
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UnmatchedLotRow {
    pub trade_id: TradeId,
    pub timestamp: DateTime<Utc>,
    pub instrument: String,
    pub book: String,
    pub trade_quantity: Decimal,
    pub price: Decimal,
    pub lot_quantity: Decimal,
}

/// A matched-pool row
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub(crate) struct MatchedPairRow {
    pub opening_trade_id: TradeId,
    pub closing_trade_id: TradeId,
}
