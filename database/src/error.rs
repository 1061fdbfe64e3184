//! Ledger error types
//!
//! This module provides error types for the durable backend. Nothing is
//! recovered locally: a failed call rolls its transaction back and the
//! error surfaces to the caller with no observable state change.

use chrono::{DateTime, Utc};
use thiserror::Error;

use lotmatch_core::PnlError;

/// Durable-backend errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A submitted trade's timestamp is not strictly after the latest
    /// snapshot for the stream. Rejected before any mutation.
    #[error("trade timestamp {submitted} is not after the latest snapshot at {latest}")]
    InvalidTimestamp {
        submitted: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    /// The matching engine rejected the transition
    #[error("engine error: {0}")]
    Engine(#[from] PnlError),

    /// An underlying read or write failed; the surrounding transaction
    /// was rolled back
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Type alias for ledger results
pub type LedgerResult<T> = Result<T, LedgerError>;
