//! PostgreSQL trade store

use super::{StoreError, TradeStore, UpsertOutcome};
use crate::config::StoreConfig;
use crate::event::PriceEvent;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Trade table bootstrap
pub const CREATE_TABLE_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS crypto_prices (
        symbol TEXT NOT NULL,
        price NUMERIC NOT NULL,
        event_time BIGINT NOT NULL,
        processed_at BIGINT NOT NULL,
        PRIMARY KEY (symbol, event_time)
    )
";

/// Conflict-free insert; an existing row is left untouched
pub const INSERT_TRADE_SQL: &str = r"
    INSERT INTO crypto_prices (symbol, price, event_time, processed_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (symbol, event_time) DO NOTHING
";

/// Trade store backed by a bounded Postgres pool shared across workers
#[derive(Debug, Clone)]
pub struct PgTradeStore {
    pool: PgPool,
}

impl PgTradeStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a bounded pool from configuration
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to trade store"
        );
        Ok(Self::new(pool))
    }

    /// Create the trade table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Migration)?;
        tracing::info!("Trade table ready");
        Ok(())
    }
}

#[async_trait]
impl TradeStore for PgTradeStore {
    async fn upsert(&self, event: &PriceEvent) -> Result<UpsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(INSERT_TRADE_SQL)
            .bind(&event.symbol)
            .bind(event.price)
            .bind(event.event_time)
            .bind(event.processed_at)
            .execute(&mut *tx)
            .await;

        let result = match inserted {
            Ok(result) => result,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
                return Err(e.into());
            }
        };

        tx.commit().await?;

        if result.rows_affected() == 0 {
            Ok(UpsertOutcome::Duplicate)
        } else {
            Ok(UpsertOutcome::Inserted)
        }
    }
}
