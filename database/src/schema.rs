//! Schema management
//!
//! DDL for the four trading tables. `trade` rows are immutable;
//! `unmatched_trade`, `matched_trade` and `pnl` rows are bitemporal: a
//! row is in force for `valid_from <= t < valid_to`, open-ended rows
//! carry the [`MAX_VALID_TO`] sentinel, and logical removal closes
//! `valid_to` to the removing trade's timestamp instead of deleting.
//!
//! Quantity columns are `NUMERIC(30, 12)`, twelve decimal places so
//! fractional fills round-trip exactly; money columns are
//! `NUMERIC(24, 6)`.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use sqlx::PgPool;
use tracing::info;

use crate::error::LedgerResult;

/// The `valid_to` sentinel for rows still in force. A marker, never a
/// wall-clock value.
pub static MAX_VALID_TO: Lazy<DateTime<Utc>> = Lazy::new(|| {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .expect("sentinel timestamp is a valid datetime")
});

const CREATE_TABLE_TRADE: &str = r#"
    CREATE TABLE IF NOT EXISTS trade
    (
        trade_id    BIGSERIAL       NOT NULL,
        timestamp   TIMESTAMPTZ     NOT NULL,
        instrument  VARCHAR(32)     NOT NULL,
        quantity    NUMERIC(30,12)  NOT NULL,
        price       NUMERIC(24,6)   NOT NULL,
        book        VARCHAR(32)     NOT NULL,

        PRIMARY KEY(trade_id)
    )
"#;

const CREATE_TABLE_UNMATCHED_TRADE: &str = r#"
    CREATE TABLE IF NOT EXISTS unmatched_trade
    (
        trade_id    BIGINT          NOT NULL,
        quantity    NUMERIC(30,12)  NOT NULL,

        valid_from  TIMESTAMPTZ     NOT NULL,
        valid_to    TIMESTAMPTZ     NOT NULL,

        PRIMARY KEY (valid_from, valid_to, trade_id, quantity),
        FOREIGN KEY (trade_id) REFERENCES trade(trade_id)
    )
"#;

const CREATE_TABLE_MATCHED_TRADE: &str = r#"
    CREATE TABLE IF NOT EXISTS matched_trade
    (
        opening_trade_id    BIGINT      NOT NULL,
        closing_trade_id    BIGINT      NOT NULL,

        valid_from          TIMESTAMPTZ NOT NULL,
        valid_to            TIMESTAMPTZ NOT NULL,

        PRIMARY KEY(valid_from, valid_to, opening_trade_id, closing_trade_id),

        FOREIGN KEY (opening_trade_id) REFERENCES trade(trade_id),
        FOREIGN KEY (closing_trade_id) REFERENCES trade(trade_id)
    )
"#;

const CREATE_TABLE_PNL: &str = r#"
    CREATE TABLE IF NOT EXISTS pnl
    (
        instrument  VARCHAR(32)     NOT NULL,
        book        VARCHAR(32)     NOT NULL,
        quantity    NUMERIC(30,12)  NOT NULL,
        cost        NUMERIC(24,6)   NOT NULL,
        realized    NUMERIC(24,6)   NOT NULL,

        valid_from  TIMESTAMPTZ     NOT NULL,
        valid_to    TIMESTAMPTZ     NOT NULL,

        PRIMARY KEY(valid_from, valid_to, instrument, book)
    )
"#;

/// Creates the trading tables if they do not exist
pub async fn create_tables(pool: &PgPool) -> LedgerResult<()> {
    for statement in [
        CREATE_TABLE_TRADE,
        CREATE_TABLE_UNMATCHED_TRADE,
        CREATE_TABLE_MATCHED_TRADE,
        CREATE_TABLE_PNL,
    ] {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("trading tables ready");
    Ok(())
}

/// Drops the trading tables, children first
pub async fn drop_tables(pool: &PgPool) -> LedgerResult<()> {
    for statement in [
        "DROP TABLE IF EXISTS matched_trade",
        "DROP TABLE IF EXISTS unmatched_trade",
        "DROP TABLE IF EXISTS pnl",
        "DROP TABLE IF EXISTS trade",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("trading tables dropped");
    Ok(())
}
