//! Trade persistence
//!
//! One table keyed by `(symbol, event_time)`; inserts never overwrite.

mod memory;
mod postgres;

pub use memory::{FailureKind, MemoryTradeStore};
pub use postgres::{PgTradeStore, CREATE_TABLE_SQL, INSERT_TRADE_SQL};

use crate::event::PriceEvent;
use async_trait::async_trait;

/// Result of an idempotent insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was written
    Inserted,
    /// A row with the same key already existed; nothing changed
    Duplicate,
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store as a whole cannot serve requests (pool exhausted, closed, I/O)
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    /// A single statement or transaction failed
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::Error),
}

impl StoreError {
    /// Whether the failure is resource-level rather than per-message
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e),
            other => StoreError::Query(other),
        }
    }
}

/// Durable trade storage
///
/// Each call is one unit of work: it acquires a connection, runs one
/// transaction, and releases the connection before returning.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Insert the event unless a row with the same `(symbol, event_time)` exists
    async fn upsert(&self, event: &PriceEvent) -> Result<UpsertOutcome, StoreError>;
}
