//! # Lotmatch Core
//!
//! Deterministic position-matching P&L engine for a single instrument held
//! in a single book. Every executed trade either extends the open position
//! or reduces it by pairing against prior opposite-sign trades drawn from
//! an unmatched pool under a configurable matching policy (FIFO, LIFO,
//! best price, worst price). All arithmetic is exact decimal; every lot
//! keeps a provenance reference to the market trade it was split from.

pub mod algorithm;
pub mod blotter;
pub mod engine;
pub mod error;
pub mod lot;
pub mod pool;
pub mod state;
pub mod trade;

// Re-export commonly used types
pub use algorithm::add_trade;
pub use blotter::TradingBlotter;
pub use engine::PnlEngine;
pub use error::{PnlError, PnlResult};
pub use lot::PartialTrade;
pub use pool::{MatchedPool, MatchedTrade, MatchingPolicy, UnmatchedPool};
pub use state::{PnlState, PnlStrip};
pub use trade::{MarketTrade, TradeId};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
