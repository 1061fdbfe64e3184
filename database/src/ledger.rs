//! The durable P&L ledger
//!
//! One [`TradeLedger`] serves one `(instrument, book)` stream. Booking a
//! trade rehydrates the live position from storage, folds the trade
//! through the in-memory matching engine, and persists the pool delta and
//! the new snapshot bitemporally, all inside a single transaction, so a
//! failure anywhere leaves storage exactly as it was. Two concurrent
//! `add_trade` calls on the same stream must be serialized by the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};

use lotmatch_core::{
    algorithm, MarketTrade, MatchedPool, MatchingPolicy, PartialTrade, PnlState, PnlStrip,
    TradeId, UnmatchedPool,
};

use crate::config::DatabaseConfig;
use crate::delta::diff_unmatched;
use crate::error::{LedgerError, LedgerResult};
use crate::schema::{self, MAX_VALID_TO};
use crate::types::{MatchedPairRow, PnlSnapshot, UnmatchedLotRow};

/// Durable position-matching P&L engine for one instrument in one book
pub struct TradeLedger {
    pool: PgPool,
    policy: MatchingPolicy,
    instrument: String,
    book: String,
}

impl TradeLedger {
    /// Connects a ledger, building its connection pool from `config`
    #[instrument(skip_all, fields(instrument = %instrument.as_ref(), book = %book.as_ref()))]
    pub async fn connect(
        config: &DatabaseConfig,
        policy: MatchingPolicy,
        instrument: impl AsRef<str>,
        book: impl AsRef<str>,
    ) -> LedgerResult<Self> {
        config
            .validate()
            .map_err(|e| LedgerError::Configuration(e.to_string()))?;

        info!("connecting ledger pool");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;

        Ok(Self::with_pool(pool, policy, instrument, book))
    }

    /// Wraps an existing connection pool
    pub fn with_pool(
        pool: PgPool,
        policy: MatchingPolicy,
        instrument: impl AsRef<str>,
        book: impl AsRef<str>,
    ) -> Self {
        Self {
            pool,
            policy,
            instrument: instrument.as_ref().to_string(),
            book: book.as_ref().to_string(),
        }
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The ledger's matching policy
    pub fn policy(&self) -> MatchingPolicy {
        self.policy
    }

    /// Creates the trading tables if they do not exist
    pub async fn create_tables(&self) -> LedgerResult<()> {
        schema::create_tables(&self.pool).await
    }

    /// Drops the trading tables
    pub async fn drop_tables(&self) -> LedgerResult<()> {
        schema::drop_tables(&self.pool).await
    }

    /// Books a market trade and returns the new state.
    ///
    /// Runs in one transaction covering the trade row, every pool
    /// mutation, and the snapshot; the transaction commits before the
    /// call returns. The trade's timestamp must be strictly after every
    /// existing snapshot for the stream.
    #[instrument(skip(self), fields(instrument = %self.instrument, book = %self.book))]
    pub async fn add_trade(
        &self,
        timestamp: DateTime<Utc>,
        quantity: Decimal,
        price: Decimal,
    ) -> LedgerResult<PnlState> {
        let mut tx = self.pool.begin().await?;

        self.ensure_monotonic(&mut tx, timestamp).await?;

        let trade_id = self
            .insert_trade(&mut tx, timestamp, quantity, price)
            .await?;
        let trade = Arc::new(MarketTrade::new(
            trade_id,
            timestamp,
            self.instrument.clone(),
            self.book.clone(),
            quantity,
            price,
        ));

        let before = self.load_live_state(&mut tx).await?;
        let after = algorithm::add_trade(&before, &trade)?;

        let delta = diff_unmatched(before.unmatched.lots(), after.unmatched.lots());
        for key in &delta.closed {
            sqlx::query(
                "UPDATE unmatched_trade \
                 SET valid_to = $1 \
                 WHERE trade_id = $2 AND quantity = $3 AND valid_to = $4",
            )
            .bind(timestamp)
            .bind(key.trade_id)
            .bind(key.quantity)
            .bind(*MAX_VALID_TO)
            .execute(&mut *tx)
            .await?;
        }
        for key in &delta.opened {
            sqlx::query(
                "INSERT INTO unmatched_trade (trade_id, quantity, valid_from, valid_to) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(key.trade_id)
            .bind(key.quantity)
            .bind(timestamp)
            .bind(*MAX_VALID_TO)
            .execute(&mut *tx)
            .await?;
        }

        for pair in &after.matched.pairs()[before.matched.len()..] {
            sqlx::query(
                "INSERT INTO matched_trade \
                 (opening_trade_id, closing_trade_id, valid_from, valid_to) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(pair.opening.trade_id())
            .bind(pair.closing.trade_id())
            .bind(timestamp)
            .bind(*MAX_VALID_TO)
            .execute(&mut *tx)
            .await?;
        }

        self.save_snapshot(&mut tx, &after, timestamp).await?;

        tx.commit().await?;

        debug!(
            trade_id,
            quantity = %quantity,
            price = %price,
            position = %after.quantity,
            realized = %after.realized,
            closed = delta.closed.len(),
            opened = delta.opened.len(),
            "booked trade"
        );

        Ok(after)
    }

    /// The current state: live snapshot scalars plus the live unmatched
    /// pool
    pub async fn state(&self) -> LedgerResult<PnlState> {
        let mut conn = self.pool.acquire().await?;
        self.load_live_state(&mut conn).await
    }

    /// The summary strip of the current state at a mark price
    pub async fn strip(&self, price: Decimal) -> LedgerResult<PnlStrip> {
        Ok(self.state().await?.strip(price)?)
    }

    /// The P&L scalars in force at `at`; flat if the stream had no
    /// snapshot yet
    pub async fn pnl_at(&self, at: DateTime<Utc>) -> LedgerResult<PnlSnapshot> {
        let snapshot: Option<PnlSnapshot> = sqlx::query_as(
            "SELECT quantity, cost, realized \
             FROM pnl \
             WHERE instrument = $1 AND book = $2 \
             AND valid_from <= $3 AND $3 < valid_to",
        )
        .bind(&self.instrument)
        .bind(&self.book)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(snapshot.unwrap_or_else(PnlSnapshot::flat))
    }

    /// The open lots in force at `at`, in `(timestamp, trade_id)` order
    pub async fn unmatched_at(&self, at: DateTime<Utc>) -> LedgerResult<Vec<PartialTrade>> {
        let rows: Vec<UnmatchedLotRow> = sqlx::query_as(
            "SELECT t.trade_id, t.timestamp, t.instrument, t.book, \
                    t.quantity AS trade_quantity, t.price, ut.quantity AS lot_quantity \
             FROM unmatched_trade AS ut \
             JOIN trade AS t ON t.trade_id = ut.trade_id \
             WHERE t.instrument = $1 AND t.book = $2 \
             AND ut.valid_from <= $3 AND $3 < ut.valid_to \
             ORDER BY t.timestamp, t.trade_id",
        )
        .bind(&self.instrument)
        .bind(&self.book)
        .bind(at)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(into_lot).collect())
    }

    /// Reads back a recorded market trade by id
    pub async fn trade(&self, trade_id: TradeId) -> LedgerResult<Option<MarketTrade>> {
        let row: Option<(DateTime<Utc>, String, Decimal, Decimal, String)> = sqlx::query_as(
            "SELECT timestamp, instrument, quantity, price, book \
             FROM trade \
             WHERE trade_id = $1",
        )
        .bind(trade_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(timestamp, instrument, quantity, price, book)| {
            MarketTrade::new(trade_id, timestamp, instrument, book, quantity, price)
        }))
    }

    /// The completed `(opening, closing)` trade-id pairs in force at `at`
    pub async fn matched_at(&self, at: DateTime<Utc>) -> LedgerResult<Vec<(TradeId, TradeId)>> {
        let rows: Vec<MatchedPairRow> = sqlx::query_as(
            "SELECT mt.opening_trade_id, mt.closing_trade_id \
             FROM matched_trade AS mt \
             JOIN trade AS t ON t.trade_id = mt.opening_trade_id \
             WHERE t.instrument = $1 AND t.book = $2 \
             AND mt.valid_from <= $3 AND $3 < mt.valid_to \
             ORDER BY mt.valid_from, mt.opening_trade_id, mt.closing_trade_id",
        )
        .bind(&self.instrument)
        .bind(&self.book)
        .bind(at)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.opening_trade_id, row.closing_trade_id))
            .collect())
    }

    /// Reconstructs the state as of `at`: snapshot scalars plus the
    /// unmatched pool then in force. Equal (scalars and open lots) to an
    /// in-memory replay of every trade with `timestamp <= at` under the
    /// same policy. Matched pairs survive as trade-id pairs only; see
    /// [`TradeLedger::matched_at`].
    pub async fn state_at(&self, at: DateTime<Utc>) -> LedgerResult<PnlState> {
        let snapshot = self.pnl_at(at).await?;
        let lots = self.unmatched_at(at).await?;

        let mut unmatched = UnmatchedPool::new(self.policy);
        for lot in lots {
            unmatched.push(lot);
        }

        Ok(PnlState::from_parts(
            snapshot.quantity,
            snapshot.cost,
            snapshot.realized,
            unmatched,
            MatchedPool::new(),
        ))
    }

    /// Rejects a timestamp unless it is strictly after every snapshot
    /// already recorded for the stream.
    async fn ensure_monotonic(
        &self,
        conn: &mut PgConnection,
        timestamp: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MAX(valid_from) \
             FROM pnl \
             WHERE instrument = $1 AND book = $2 AND valid_from >= $3",
        )
        .bind(&self.instrument)
        .bind(&self.book)
        .bind(timestamp)
        .fetch_one(&mut *conn)
        .await?;

        match latest {
            Some(latest) => Err(LedgerError::InvalidTimestamp {
                submitted: timestamp,
                latest,
            }),
            None => Ok(()),
        }
    }

    async fn insert_trade(
        &self,
        conn: &mut PgConnection,
        timestamp: DateTime<Utc>,
        quantity: Decimal,
        price: Decimal,
    ) -> LedgerResult<TradeId> {
        let trade_id: TradeId = sqlx::query_scalar(
            "INSERT INTO trade (timestamp, instrument, quantity, price, book) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING trade_id",
        )
        .bind(timestamp)
        .bind(&self.instrument)
        .bind(quantity)
        .bind(price)
        .bind(&self.book)
        .fetch_one(&mut *conn)
        .await?;

        Ok(trade_id)
    }

    /// Hydrates the live state: current snapshot scalars plus the open
    /// lots with `valid_to` at the sentinel. The matched pool starts
    /// empty; only appended pairs are persisted per call.
    async fn load_live_state(&self, conn: &mut PgConnection) -> LedgerResult<PnlState> {
        let snapshot: Option<PnlSnapshot> = sqlx::query_as(
            "SELECT quantity, cost, realized \
             FROM pnl \
             WHERE instrument = $1 AND book = $2 AND valid_to = $3",
        )
        .bind(&self.instrument)
        .bind(&self.book)
        .bind(*MAX_VALID_TO)
        .fetch_optional(&mut *conn)
        .await?;
        let snapshot = snapshot.unwrap_or_else(PnlSnapshot::flat);

        let rows: Vec<UnmatchedLotRow> = sqlx::query_as(
            "SELECT t.trade_id, t.timestamp, t.instrument, t.book, \
                    t.quantity AS trade_quantity, t.price, ut.quantity AS lot_quantity \
             FROM unmatched_trade AS ut \
             JOIN trade AS t ON t.trade_id = ut.trade_id \
             WHERE t.instrument = $1 AND t.book = $2 AND ut.valid_to = $3 \
             ORDER BY t.timestamp, t.trade_id",
        )
        .bind(&self.instrument)
        .bind(&self.book)
        .bind(*MAX_VALID_TO)
        .fetch_all(&mut *conn)
        .await?;

        let mut unmatched = UnmatchedPool::new(self.policy);
        for row in rows {
            unmatched.push(into_lot(row));
        }

        Ok(PnlState::from_parts(
            snapshot.quantity,
            snapshot.cost,
            snapshot.realized,
            unmatched,
            MatchedPool::new(),
        ))
    }

    async fn save_snapshot(
        &self,
        conn: &mut PgConnection,
        state: &PnlState,
        timestamp: DateTime<Utc>,
    ) -> LedgerResult<()> {
        sqlx::query(
            "UPDATE pnl \
             SET valid_to = $1 \
             WHERE instrument = $2 AND book = $3 AND valid_to = $4",
        )
        .bind(timestamp)
        .bind(&self.instrument)
        .bind(&self.book)
        .bind(*MAX_VALID_TO)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO pnl \
             (instrument, book, quantity, cost, realized, valid_from, valid_to) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&self.instrument)
        .bind(&self.book)
        .bind(state.quantity)
        .bind(state.cost)
        .bind(state.realized)
        .bind(timestamp)
        .bind(*MAX_VALID_TO)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

impl std::fmt::Debug for TradeLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeLedger")
            .field("instrument", &self.instrument)
            .field("book", &self.book)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn into_lot(row: UnmatchedLotRow) -> PartialTrade {
    PartialTrade::new(
        Arc::new(MarketTrade::new(
            row.trade_id,
            row.timestamp,
            row.instrument,
            row.book,
            row.trade_quantity,
            row.price,
        )),
        row.lot_quantity,
    )
}
