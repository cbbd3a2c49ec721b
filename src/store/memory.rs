//! In-memory trade store

use super::{StoreError, TradeStore, UpsertOutcome};
use crate::event::PriceEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};

/// Failure to inject into the next upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Statement-level failure
    Transient,
    /// Pool exhausted
    Unavailable,
}

impl FailureKind {
    fn to_error(self) -> StoreError {
        match self {
            FailureKind::Transient => {
                StoreError::Query(sqlx::Error::Protocol("injected failure".to_string()))
            }
            FailureKind::Unavailable => StoreError::Unavailable(sqlx::Error::PoolTimedOut),
        }
    }
}

/// Primary-key map with an insert-attempt log and failure injection
#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    rows: Mutex<BTreeMap<(String, i64), PriceEvent>>,
    attempts: Mutex<Vec<(String, i64)>>,
    failures: Mutex<VecDeque<FailureKind>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` upserts with `kind`
    pub fn fail_next(&self, count: usize, kind: FailureKind) {
        let mut failures = self.failures.lock();
        failures.extend(std::iter::repeat(kind).take(count));
    }

    /// Stored row for a key
    pub fn get(&self, symbol: &str, event_time: i64) -> Option<PriceEvent> {
        self.rows
            .lock()
            .get(&(symbol.to_string(), event_time))
            .cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    /// Keys of every upsert attempt, failed ones included, in call order
    pub fn attempts(&self) -> Vec<(String, i64)> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn upsert(&self, event: &PriceEvent) -> Result<UpsertOutcome, StoreError> {
        let key = (event.symbol.clone(), event.event_time);
        self.attempts.lock().push(key.clone());

        if let Some(kind) = self.failures.lock().pop_front() {
            return Err(kind.to_error());
        }

        let mut rows = self.rows.lock();
        if rows.contains_key(&key) {
            return Ok(UpsertOutcome::Duplicate);
        }
        rows.insert(key, event.clone());
        Ok(UpsertOutcome::Inserted)
    }
}
