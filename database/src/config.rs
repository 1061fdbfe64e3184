//! Database configuration
//!
//! Connection settings for the PostgreSQL backend. A ledger serves one
//! `(instrument, book)` stream and serializes its bookings, so the pool
//! stays deliberately small: one writer plus a few point-in-time readers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the ledger's PostgreSQL pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, e.g. `postgresql://localhost:5432/trading`
    pub database_url: String,
    /// Upper bound on pooled connections. Bookings are serialized per
    /// stream; the extra connections only serve point-in-time queries.
    pub max_connections: u32,
    /// How long to wait for a free connection before a call fails
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost:5432/trading".to_string()),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl DatabaseConfig {
    /// Checks the settings can plausibly reach a PostgreSQL server
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "ledger requires a postgres:// or postgresql:// url, got {:?}",
                self.database_url
            ));
        }

        if self.max_connections == 0 {
            return Err(anyhow::anyhow!(
                "ledger pool needs at least one connection to book trades"
            ));
        }

        Ok(())
    }
}
