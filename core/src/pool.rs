//! Unmatched and matched pools
//!
//! The unmatched pool holds the open lots of the current position and
//! decides, per matching policy, which lot retires first when the position
//! is reduced. The matched pool is the append-only record of completed
//! opening/closing pairs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PnlError, PnlResult};
use crate::lot::PartialTrade;
use crate::trade::TradeId;

/// Rule determining which open lot is retired first when a position is
/// reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchingPolicy {
    /// Retire the earliest trade first. The accountants' default.
    Fifo,

    /// Retire the most recent trade first
    Lifo,

    /// Retire the lot that realizes the most P&L: the cheapest open buy
    /// when long, the dearest open sell when short
    BestPrice,

    /// The mirror of best price: dearest when long, cheapest when short
    WorstPrice,
}

/// Ordered collection of open lots supporting policy-driven removal.
///
/// Lots are kept ordered by `(timestamp, trade_id)` of their originating
/// trade. That order is the primary order for [`MatchingPolicy::Fifo`] and
/// [`MatchingPolicy::Lifo`] and the tie-break on equal prices for the two
/// price policies, in both the in-memory and durable backends. For trades
/// submitted in timestamp order it coincides with insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedPool {
    policy: MatchingPolicy,
    lots: Vec<PartialTrade>,
}

impl UnmatchedPool {
    /// Creates an empty pool governed by `policy`
    pub fn new(policy: MatchingPolicy) -> Self {
        Self {
            policy,
            lots: Vec::new(),
        }
    }

    /// The pool's matching policy
    pub fn policy(&self) -> MatchingPolicy {
        self.policy
    }

    /// Inserts a lot at its `(timestamp, trade_id)` position
    pub fn push(&mut self, lot: PartialTrade) {
        let key = Self::key(&lot);
        let index = self.lots.partition_point(|held| Self::key(held) <= key);
        self.lots.insert(index, lot);
    }

    /// Removes and returns the lot chosen by the pool's policy.
    ///
    /// `quantity` is the position's current net quantity; its sign drives
    /// the long/short orientation of the price policies. `cost` is passed
    /// for parity with the capability set but no policy consults it.
    pub fn pop(&mut self, quantity: Decimal, _cost: Decimal) -> PnlResult<PartialTrade> {
        if self.lots.is_empty() {
            return Err(PnlError::PoolExhausted);
        }
        let index = match self.policy {
            MatchingPolicy::Fifo => 0,
            MatchingPolicy::Lifo => self.lots.len() - 1,
            MatchingPolicy::BestPrice => {
                if quantity > Decimal::ZERO {
                    self.lowest_priced()
                } else {
                    self.highest_priced()
                }
            }
            MatchingPolicy::WorstPrice => {
                if quantity > Decimal::ZERO {
                    self.highest_priced()
                } else {
                    self.lowest_priced()
                }
            }
        };
        Ok(self.lots.remove(index))
    }

    /// Number of open lots
    pub fn len(&self) -> usize {
        self.lots.len()
    }

    /// Returns true when no lots are open
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// The open lots in `(timestamp, trade_id)` order
    pub fn lots(&self) -> &[PartialTrade] {
        &self.lots
    }

    /// Net signed quantity across all open lots
    pub fn total_quantity(&self) -> PnlResult<Decimal> {
        self.lots.iter().try_fold(Decimal::ZERO, |sum, lot| {
            sum.checked_add(lot.quantity())
                .ok_or(PnlError::ArithmeticOverflow)
        })
    }

    fn key(lot: &PartialTrade) -> (DateTime<Utc>, TradeId) {
        (lot.trade().timestamp, lot.trade_id())
    }

    // Ties on price fall back to the earliest (timestamp, trade_id).
    fn lowest_priced(&self) -> usize {
        let mut best = 0;
        for (index, lot) in self.lots.iter().enumerate().skip(1) {
            if lot.price() < self.lots[best].price() {
                best = index;
            }
        }
        best
    }

    fn highest_priced(&self) -> usize {
        let mut best = 0;
        for (index, lot) in self.lots.iter().enumerate().skip(1) {
            if lot.price() > self.lots[best].price() {
                best = index;
            }
        }
        best
    }
}

/// A completed opening/closing pair
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedTrade {
    /// The lot that opened the exposure
    pub opening: PartialTrade,

    /// The lot that closed it; opposite sign, equal magnitude
    pub closing: PartialTrade,
}

impl MatchedTrade {
    /// Pairs an opening lot with the closing lot that retired it
    pub fn new(opening: PartialTrade, closing: PartialTrade) -> Self {
        Self { opening, closing }
    }
}

/// Append-only record of completed pairs, in match order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchedPool {
    pairs: Vec<MatchedTrade>,
}

impl MatchedPool {
    /// Creates an empty pool
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Records a completed pair. Pairs are never removed or rewritten.
    pub fn push(&mut self, opening: PartialTrade, closing: PartialTrade) {
        self.pairs.push(MatchedTrade::new(opening, closing));
    }

    /// Number of completed pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true when nothing has matched yet
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The completed pairs in match order
    pub fn pairs(&self) -> &[MatchedTrade] {
        &self.pairs
    }
}
