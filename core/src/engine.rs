//! In-memory P&L engine
//!
//! Owns the current [`PnlState`] for one instrument/book stream and folds
//! incoming trades through the matching algorithm. The state is replaced
//! only when a transition succeeds; a failed call leaves the previous
//! state in force. Callers running concurrent streams own one engine per
//! stream or serialize externally.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;

use crate::algorithm;
use crate::error::PnlResult;
use crate::pool::MatchingPolicy;
use crate::state::{PnlState, PnlStrip};
use crate::trade::{MarketTrade, TradeId};

/// Position-matching P&L engine over an in-memory state
#[derive(Debug, Clone)]
pub struct PnlEngine {
    instrument: String,
    book: String,
    next_trade_id: TradeId,
    state: PnlState,
}

impl PnlEngine {
    /// Creates a flat engine under the given matching policy
    pub fn new(policy: MatchingPolicy) -> Self {
        Self::for_stream(policy, "", "")
    }

    /// Creates a flat engine labelled with the stream it tracks. The
    /// labels are stamped onto trades booked through [`PnlEngine::add`].
    pub fn for_stream(
        policy: MatchingPolicy,
        instrument: impl Into<String>,
        book: impl Into<String>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            book: book.into(),
            next_trade_id: 1,
            state: PnlState::new(policy),
        }
    }

    /// Applies a market trade and returns the new state.
    ///
    /// On error the engine still holds the state from before the call.
    pub fn add_trade(&mut self, trade: MarketTrade) -> PnlResult<&PnlState> {
        let trade = Arc::new(trade);
        let next = algorithm::add_trade(&self.state, &trade)?;
        self.next_trade_id = self.next_trade_id.max(trade.trade_id + 1);

        debug!(
            trade_id = trade.trade_id,
            quantity = %trade.quantity,
            price = %trade.price,
            position = %next.quantity,
            realized = %next.realized,
            "booked trade"
        );

        self.state = next;
        Ok(&self.state)
    }

    /// Books a trade for the engine's stream, stamping the next trade id
    /// and the current time
    pub fn add(&mut self, quantity: Decimal, price: Decimal) -> PnlResult<&PnlState> {
        let trade = MarketTrade::new(
            self.next_trade_id,
            Utc::now(),
            self.instrument.clone(),
            self.book.clone(),
            quantity,
            price,
        );
        self.add_trade(trade)
    }

    /// The current immutable state snapshot
    pub fn state(&self) -> &PnlState {
        &self.state
    }

    /// The engine's matching policy
    pub fn policy(&self) -> MatchingPolicy {
        self.state.unmatched.policy()
    }

    /// The summary strip at a mark price
    pub fn strip(&self, price: Decimal) -> PnlResult<PnlStrip> {
        self.state.strip(price)
    }
}
