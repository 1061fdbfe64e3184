//! Acceptance scenarios for the matching engine: policy-by-policy partial
//! fills, crossing the flat line, fractional quantities, and the state
//! invariants that must hold after every transition.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use lotmatch_core::{MarketTrade, MatchingPolicy, PnlEngine, PnlState};

fn trade(trade_id: i64, quantity: Decimal, price: Decimal) -> MarketTrade {
    MarketTrade::new(
        trade_id,
        Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap() + chrono::Duration::minutes(trade_id),
        "IBM",
        "tech",
        quantity,
        price,
    )
}

fn assert_position(
    state: &PnlState,
    quantity: Decimal,
    cost: Decimal,
    realized: Decimal,
    avg_cost: Decimal,
) {
    assert_eq!(state.quantity, quantity, "quantity");
    assert_eq!(state.cost, cost, "cost");
    assert_eq!(state.realized, realized, "realized");
    assert_eq!(state.avg_cost().unwrap(), avg_cost, "avg_cost");
    assert_invariants(state);
}

/// The engine invariants: unmatched lots carry the position's sign
/// and sum to its quantity, cost is the negated value of the open lots,
/// matched pairs are sign-opposed and magnitude-equal, and realized is
/// exactly what the matched pairs accumulated.
fn assert_invariants(state: &PnlState) {
    let mut open_quantity = Decimal::ZERO;
    let mut open_value = Decimal::ZERO;
    for lot in state.unmatched.lots() {
        assert!(
            !lot.quantity().is_zero(),
            "unmatched pool holds a zero-quantity lot"
        );
        assert_eq!(
            lot.quantity() > Decimal::ZERO,
            state.quantity > Decimal::ZERO,
            "unmatched lot sign disagrees with the position"
        );
        open_quantity += lot.quantity();
        open_value += lot.quantity() * lot.price();
    }
    assert_eq!(open_quantity, state.quantity, "pool does not sum to quantity");
    assert_eq!(-open_value, state.cost, "cost is not the negated open value");

    if state.quantity.is_zero() {
        assert!(state.unmatched.is_empty(), "flat position with open lots");
        assert_eq!(state.cost, Decimal::ZERO, "flat position with residual cost");
    }

    let mut realized = Decimal::ZERO;
    for pair in state.matched.pairs() {
        assert_eq!(
            pair.opening.quantity(),
            -pair.closing.quantity(),
            "matched pair is not sign-opposed and magnitude-equal"
        );
        let close_value = pair.closing.quantity() * pair.closing.price();
        let open_cost = -(pair.opening.quantity() * pair.opening.price());
        realized += open_cost - close_value;
    }
    assert_eq!(realized, state.realized, "matched pairs do not account for realized");
}

fn three_buys_then_sell(policy: MatchingPolicy) -> PnlEngine {
    let mut engine = PnlEngine::new(policy);
    engine.add_trade(trade(1, dec!(6), dec!(100))).unwrap();
    engine.add_trade(trade(2, dec!(6), dec!(106))).unwrap();
    engine.add_trade(trade(3, dec!(6), dec!(103))).unwrap();
    engine.add_trade(trade(4, dec!(-9), dec!(105))).unwrap();
    engine
}

#[test]
fn fifo_long_to_short_with_partial_fills() {
    let mut engine = PnlEngine::new(MatchingPolicy::Fifo);

    let state = engine.add_trade(trade(1, dec!(6), dec!(100))).unwrap();
    assert_position(state, dec!(6), dec!(-600), dec!(0), dec!(100));

    let state = engine.add_trade(trade(2, dec!(6), dec!(106))).unwrap();
    assert_position(state, dec!(12), dec!(-1236), dec!(0), dec!(103));

    let state = engine.add_trade(trade(3, dec!(6), dec!(103))).unwrap();
    assert_position(state, dec!(18), dec!(-1854), dec!(0), dec!(103));

    let state = engine.add_trade(trade(4, dec!(-9), dec!(105))).unwrap();
    assert_position(state, dec!(9), dec!(-936), dec!(27), dec!(104));
}

#[test]
fn best_price_matches_the_cheapest_buys_first() {
    let engine = three_buys_then_sell(MatchingPolicy::BestPrice);
    assert_position(engine.state(), dec!(9), dec!(-945), dec!(36), dec!(105));
}

#[test]
fn worst_price_holds_the_dearest_lot() {
    let engine = three_buys_then_sell(MatchingPolicy::WorstPrice);
    assert_position(engine.state(), dec!(9), dec!(-909), dec!(0), dec!(101));
}

#[test]
fn lifo_matches_the_most_recent_buys_first() {
    let engine = three_buys_then_sell(MatchingPolicy::Lifo);
    assert_position(engine.state(), dec!(9), dec!(-918), dec!(9), dec!(102));
}

#[test]
fn fifo_short_position_partial_cover() {
    let mut engine = PnlEngine::new(MatchingPolicy::Fifo);

    let state = engine.add_trade(trade(1, dec!(-6), dec!(106))).unwrap();
    assert_position(state, dec!(-6), dec!(636), dec!(0), dec!(106));

    let state = engine.add_trade(trade(2, dec!(-6), dec!(103))).unwrap();
    assert_position(state, dec!(-12), dec!(1254), dec!(0), dec!(104.5));

    // Buying back 9 covers the first sell and splits the second.
    let state = engine.add_trade(trade(3, dec!(9), dec!(104))).unwrap();
    assert_position(state, dec!(-3), dec!(309), dec!(9), dec!(103));
}

#[test]
fn crossing_the_flat_line_reopens_the_other_way() {
    let mut engine = PnlEngine::new(MatchingPolicy::Fifo);
    engine.add_trade(trade(1, dec!(1), dec!(101))).unwrap();
    let state = engine.add_trade(trade(2, dec!(-2), dec!(102))).unwrap();

    assert_eq!(state.quantity, dec!(-1));
    assert_eq!(state.cost, dec!(102));
    assert_eq!(state.realized, dec!(1));
    assert_eq!(state.avg_cost().unwrap(), dec!(102));

    assert_eq!(state.matched.len(), 1);
    assert_eq!(state.matched.pairs()[0].opening.quantity(), dec!(1));
    assert_eq!(state.matched.pairs()[0].closing.quantity(), dec!(-1));

    assert_eq!(state.unmatched.len(), 1);
    let tail = &state.unmatched.lots()[0];
    assert_eq!(tail.quantity(), dec!(-1));
    assert_eq!(tail.trade_id(), 2, "tail lot must reference the sell trade");
    assert_invariants(state);
}

#[test]
fn fractional_quantities_reduce_exactly() {
    let mut engine = PnlEngine::new(MatchingPolicy::Fifo);
    engine.add_trade(trade(1, dec!(10.17), dec!(2.54))).unwrap();
    engine.add_trade(trade(2, dec!(-8.17), dec!(2.12))).unwrap();
    let state = engine.add_trade(trade(3, dec!(-1.5), dec!(2.05))).unwrap();

    assert_eq!(state.quantity, dec!(0.5));
    assert_invariants(state);
}

#[test]
fn flat_round_trip_realizes_the_price_difference() {
    // For any (q, p1) then (-q, p2), realized is q * (p2 - p1).
    let cases = [
        (dec!(10), dec!(100), dec!(104)),
        (dec!(-10), dec!(104), dec!(100)),
        (dec!(2.5), dec!(99.5), dec!(101.25)),
    ];
    for (quantity, open_price, close_price) in cases {
        for policy in [
            MatchingPolicy::Fifo,
            MatchingPolicy::Lifo,
            MatchingPolicy::BestPrice,
            MatchingPolicy::WorstPrice,
        ] {
            let mut engine = PnlEngine::new(policy);
            engine.add_trade(trade(1, quantity, open_price)).unwrap();
            let state = engine.add_trade(trade(2, -quantity, close_price)).unwrap();

            assert!(state.is_flat());
            assert_eq!(state.realized, quantity * (close_price - open_price));
            assert_invariants(state);
        }
    }
}

#[test]
fn identical_replays_are_bit_exact() {
    for policy in [
        MatchingPolicy::Fifo,
        MatchingPolicy::Lifo,
        MatchingPolicy::BestPrice,
        MatchingPolicy::WorstPrice,
    ] {
        let first = three_buys_then_sell(policy);
        let second = three_buys_then_sell(policy);
        assert_eq!(first.state(), second.state());
    }
}

#[test]
fn invariants_hold_through_a_mixed_sequence() {
    let steps = [
        (dec!(6), dec!(100)),
        (dec!(-2), dec!(102)),
        (dec!(6.5), dec!(101.5)),
        (dec!(-12), dec!(103)),
        (dec!(-3), dec!(99)),
        (dec!(4.5), dec!(98)),
        (dec!(0), dec!(97)),
        (dec!(6), dec!(100.25)),
    ];
    for policy in [
        MatchingPolicy::Fifo,
        MatchingPolicy::Lifo,
        MatchingPolicy::BestPrice,
        MatchingPolicy::WorstPrice,
    ] {
        let mut engine = PnlEngine::new(policy);
        for (index, (quantity, price)) in steps.iter().enumerate() {
            let state = engine
                .add_trade(trade(index as i64 + 1, *quantity, *price))
                .unwrap();
            assert_invariants(state);
        }
    }
}

#[test]
fn marked_strip_walkthrough() {
    // The classic blotter walkthrough: two buys, mark moves, wind down.
    let mut engine = PnlEngine::new(MatchingPolicy::Fifo);

    engine.add_trade(trade(1, dec!(10), dec!(100))).unwrap();
    let strip = engine.strip(dec!(102)).unwrap();
    assert_eq!(strip.unrealized, dec!(20));

    engine.add_trade(trade(2, dec!(10), dec!(102))).unwrap();
    let strip = engine.strip(dec!(102)).unwrap();
    assert_eq!(strip.quantity, dec!(20));
    assert_eq!(strip.avg_cost, dec!(101));
    assert_eq!(strip.realized, dec!(0));
    assert_eq!(strip.unrealized, dec!(20));

    engine.add_trade(trade(3, dec!(-10), dec!(104))).unwrap();
    let strip = engine.strip(dec!(104)).unwrap();
    assert_eq!(strip.quantity, dec!(10));
    assert_eq!(strip.avg_cost, dec!(102));
    assert_eq!(strip.realized, dec!(40));
    assert_eq!(strip.unrealized, dec!(20));

    let state = engine.add_trade(trade(4, dec!(-10), dec!(102))).unwrap();
    assert!(state.is_flat());
    assert_eq!(state.realized, dec!(40));
    let strip = engine.strip(dec!(102)).unwrap();
    assert_eq!(strip.unrealized, dec!(0));
}

#[test]
fn unmatched_lots_keep_provenance_to_their_market_trades() {
    let engine = three_buys_then_sell(MatchingPolicy::Fifo);
    let state = engine.state();

    // FIFO keeps the 106 remainder and the 103 lot open; both lots still
    // point at the trades that produced them.
    let lots = state.unmatched.lots();
    assert_eq!(lots.len(), 2);
    assert_eq!(lots[0].trade_id(), 2);
    assert_eq!(lots[0].quantity(), dec!(3));
    assert_eq!(lots[0].trade().quantity, dec!(6));
    assert_eq!(lots[1].trade_id(), 3);
    assert_eq!(lots[1].quantity(), dec!(6));
}
