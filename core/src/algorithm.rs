//! The matching algorithm
//!
//! A position is a sequence of executed buys and sells. A trade that has
//! the position's sign (or arrives on a flat book) extends it: quantity
//! and cost grow and the trade joins the unmatched pool. A trade of the
//! opposite sign reduces it: open lots are popped per the matching policy
//! and paired against the incoming quantity, splitting whichever side is
//! larger and recycling the leftover. A trade big enough to cross the
//! flat line consumes the whole pool and re-enters as an extension in the
//! opposite direction.
//!
//! The transition is a pure total function over the state value; callers
//! observe either the complete new state or, on error, no change at all.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::trace;

use crate::error::{PnlError, PnlResult};
use crate::lot::PartialTrade;
use crate::state::PnlState;
use crate::trade::MarketTrade;

/// Applies a market trade to the state, returning the new state.
///
/// Zero-quantity trades are accepted and leave the state unchanged.
pub fn add_trade(state: &PnlState, trade: &Arc<MarketTrade>) -> PnlResult<PnlState> {
    if trade.quantity.is_zero() {
        return Ok(state.clone());
    }
    add_lot(state.clone(), PartialTrade::open(Arc::clone(trade)))
}

fn add_lot(state: PnlState, lot: PartialTrade) -> PnlResult<PnlState> {
    let extends = state.quantity.is_zero()
        || (state.quantity > Decimal::ZERO && lot.quantity() > Decimal::ZERO)
        || (state.quantity < Decimal::ZERO && lot.quantity() < Decimal::ZERO);

    if extends {
        extend_position(state, lot)
    } else {
        reduce_position(state, lot)
    }
}

/// A buy or sell from a flat position, a buy from a long position, or a
/// sell from a short one. No P&L is generated; the position and its cost
/// grow and the lot joins the unmatched pool.
fn extend_position(mut state: PnlState, lot: PartialTrade) -> PnlResult<PnlState> {
    state.quantity = checked_add(state.quantity, lot.quantity())?;
    let value = checked_mul(lot.quantity(), lot.price())?;
    state.cost = checked_sub(state.cost, value)?;
    state.unmatched.push(lot);
    Ok(state)
}

/// Pairs the reducing trade against open lots until it is spent or the
/// pool runs dry. A leftover that crossed the flat line re-enters through
/// [`add_lot`] and becomes an extension in the opposite direction.
fn reduce_position(mut state: PnlState, lot: PartialTrade) -> PnlResult<PnlState> {
    let mut reducing = Some(lot);

    loop {
        let closing = match reducing {
            Some(current) if !current.quantity().is_zero() && !state.unmatched.is_empty() => {
                current
            }
            other => {
                reducing = other;
                break;
            }
        };
        let (leftover, next) = match_one(state, closing)?;
        state = next;
        reducing = leftover;
    }

    match reducing {
        Some(leftover) if !leftover.quantity().is_zero() => add_lot(state, leftover),
        _ => Ok(state),
    }
}

/// Pops one opening lot and pairs it with the closing trade, splitting
/// whichever side is larger. Returns the unmatched remainder of the
/// closing trade, if any, along with the new state.
fn match_one(
    mut state: PnlState,
    closing: PartialTrade,
) -> PnlResult<(Option<PartialTrade>, PnlState)> {
    let opening = state.unmatched.pop(state.quantity, state.cost)?;

    let (opening_matched, closing_matched, closing_leftover) =
        if closing.quantity().abs() > opening.quantity().abs() {
            // The closing trade is the larger: split it against the whole
            // opening lot and keep matching with the remainder.
            let (matched, leftover) = closing.split(checked_neg(opening.quantity())?)?;
            (opening, matched, Some(leftover))
        } else if closing.quantity().abs() < opening.quantity().abs() {
            // The opening lot is the larger: split it, return the unused
            // piece to the pool, and the closing trade is fully spent.
            let (matched, leftover) = opening.split(checked_neg(closing.quantity())?)?;
            state.unmatched.push(leftover);
            (matched, closing, None)
        } else {
            (opening, closing, None)
        };

    // The opening lot has the opposite sign to the closing trade.
    let close_value = checked_mul(closing_matched.quantity(), closing_matched.price())?;
    let open_cost = checked_neg(checked_mul(
        opening_matched.quantity(),
        opening_matched.price(),
    )?)?;

    trace!(
        opening = %opening_matched,
        closing = %closing_matched,
        "matched lots"
    );

    state.quantity = checked_sub(state.quantity, opening_matched.quantity())?;
    state.cost = checked_sub(state.cost, open_cost)?;
    state.realized = checked_add(state.realized, checked_sub(open_cost, close_value)?)?;
    state.matched.push(opening_matched, closing_matched);

    Ok((closing_leftover, state))
}

fn checked_add(a: Decimal, b: Decimal) -> PnlResult<Decimal> {
    a.checked_add(b).ok_or(PnlError::ArithmeticOverflow)
}

fn checked_sub(a: Decimal, b: Decimal) -> PnlResult<Decimal> {
    a.checked_sub(b).ok_or(PnlError::ArithmeticOverflow)
}

fn checked_mul(a: Decimal, b: Decimal) -> PnlResult<Decimal> {
    a.checked_mul(b).ok_or(PnlError::ArithmeticOverflow)
}

fn checked_neg(a: Decimal) -> PnlResult<Decimal> {
    Decimal::ZERO
        .checked_sub(a)
        .ok_or(PnlError::ArithmeticOverflow)
}
