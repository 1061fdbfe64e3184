//! Multi-stream blotter
//!
//! Routes incoming trades to one engine per `(instrument, book)` stream,
//! creating engines lazily under a single matching policy. Streams are
//! independent: no netting or P&L flows across them.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::engine::PnlEngine;
use crate::error::PnlResult;
use crate::pool::MatchingPolicy;
use crate::state::{PnlState, PnlStrip};
use crate::trade::MarketTrade;

/// Identifies one position stream: `(instrument, book)`
pub type StreamKey = (String, String);

/// A book of independent P&L engines keyed by stream
#[derive(Debug, Clone)]
pub struct TradingBlotter {
    policy: MatchingPolicy,
    books: HashMap<StreamKey, PnlEngine>,
}

impl TradingBlotter {
    /// Creates an empty blotter; every stream will match under `policy`
    pub fn new(policy: MatchingPolicy) -> Self {
        Self {
            policy,
            books: HashMap::new(),
        }
    }

    /// Books a trade against its stream's engine, creating the engine on
    /// first sight of the stream
    pub fn add_trade(&mut self, trade: MarketTrade) -> PnlResult<&PnlState> {
        let policy = self.policy;
        let engine = self
            .books
            .entry((trade.instrument.clone(), trade.book.clone()))
            .or_insert_with(|| {
                PnlEngine::for_stream(policy, trade.instrument.clone(), trade.book.clone())
            });
        engine.add_trade(trade)
    }

    /// The engine for a stream, if any trade has been booked against it
    pub fn engine(&self, instrument: &str, book: &str) -> Option<&PnlEngine> {
        self.books
            .get(&(instrument.to_string(), book.to_string()))
    }

    /// The state of a stream, if it exists
    pub fn state(&self, instrument: &str, book: &str) -> Option<&PnlState> {
        self.engine(instrument, book).map(PnlEngine::state)
    }

    /// The summary strip for a stream at a mark price, `None` for a
    /// stream with no trades
    pub fn strip(
        &self,
        instrument: &str,
        book: &str,
        price: Decimal,
    ) -> Option<PnlResult<PnlStrip>> {
        self.engine(instrument, book).map(|engine| engine.strip(price))
    }

    /// Iterates the streams and their states
    pub fn streams(&self) -> impl Iterator<Item = (&StreamKey, &PnlState)> {
        self.books.iter().map(|(key, engine)| (key, engine.state()))
    }

    /// Number of streams with at least one booked trade
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Returns true when no trades have been booked
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
