//! # Lotmatch Database Layer
//!
//! Durable backend for the P&L engine: PostgreSQL persistence of market
//! trades, the unmatched and matched pools, and P&L snapshots. Pool rows
//! are bitemporal (valid for `valid_from <= t < valid_to`, with an
//! open-ended sentinel), so the position can be reconstructed exactly as
//! of any past time. Each booked trade runs inside a single transaction:
//! either every pool mutation and the snapshot land, or none do.

pub mod config;
pub mod delta;
pub mod error;
pub mod ledger;
pub mod schema;
pub mod types;

// Re-export commonly used types
pub use config::DatabaseConfig;
pub use delta::{diff_unmatched, LotDelta, LotKey};
pub use error::{LedgerError, LedgerResult};
pub use ledger::TradeLedger;
pub use schema::MAX_VALID_TO;
pub use types::PnlSnapshot;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
