//! Engine error types
//!
//! This module provides error types for the matching engine.

use thiserror::Error;

/// Errors raised by the matching engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PnlError {
    /// A decimal operation exceeded the representable precision. The call
    /// fails and the previous state remains in force.
    #[error("decimal arithmetic overflow")]
    ArithmeticOverflow,

    /// The reduce loop popped from an empty unmatched pool. Unreachable
    /// while the state invariants hold; surfaced rather than panicking.
    #[error("unmatched pool is empty")]
    PoolExhausted,
}

/// Type alias for engine results
pub type PnlResult<T> = Result<T, PnlError>;
