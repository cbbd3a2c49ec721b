//! Message broker boundary
//!
//! The relay only needs two things from the broker: publish-with-key on the
//! producer side, and poll / manual commit / seek on the consumer side.
//! [`KafkaPublisher`] and [`KafkaConsumer`] talk to a real cluster;
//! [`MemoryBroker`] is an in-process partitioned log with the same contract.

mod kafka;
mod memory;

pub use kafka::{KafkaConsumer, KafkaPublisher};
pub use memory::MemoryBroker;

use crate::event::PriceEvent;
use async_trait::async_trait;
use rdkafka::error::KafkaError;
use std::sync::Arc;
use std::time::Duration;

/// A message read from the broker, detached from the client's buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Option<Vec<u8>>,
}

/// Broker errors
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("broker reported: {0}")]
    Reported(String),
    #[error("unknown partition {0}")]
    UnknownPartition(i32),
    #[error("broker task failed: {0}")]
    Task(String),
}

/// Producer side of the broker
///
/// Implementations must be safe to share between concurrent symbol tasks.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand an event to the broker, keyed by its symbol
    ///
    /// `Ok` means the event was accepted for delivery; delivery failures after
    /// the client's own retries are logged by the implementation.
    async fn publish(&self, event: &PriceEvent) -> Result<(), BrokerError>;

    /// Wait for accepted events to be delivered
    async fn flush(&self, _timeout: Duration) -> Result<(), BrokerError> {
        Ok(())
    }
}

/// Consumer side of the broker with manual offset management
#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    /// Wait up to `wait` for the next record; `Ok(None)` on an empty poll
    async fn poll(&self, wait: Duration) -> Result<Option<BrokerRecord>, BrokerError>;

    /// Commit the position after `record`, blocking until acknowledged
    async fn commit(&self, record: &BrokerRecord) -> Result<(), BrokerError>;

    /// Move the partition back so `record` is delivered again by the next poll
    async fn rewind(&self, record: &BrokerRecord) -> Result<(), BrokerError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, event: &PriceEvent) -> Result<(), BrokerError> {
        (**self).publish(event).await
    }

    async fn flush(&self, timeout: Duration) -> Result<(), BrokerError> {
        (**self).flush(timeout).await
    }
}

#[async_trait]
impl<T: BrokerConsumer + ?Sized> BrokerConsumer for Arc<T> {
    async fn poll(&self, wait: Duration) -> Result<Option<BrokerRecord>, BrokerError> {
        (**self).poll(wait).await
    }

    async fn commit(&self, record: &BrokerRecord) -> Result<(), BrokerError> {
        (**self).commit(record).await
    }

    async fn rewind(&self, record: &BrokerRecord) -> Result<(), BrokerError> {
        (**self).rewind(record).await
    }
}
