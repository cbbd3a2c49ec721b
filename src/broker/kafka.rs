//! Kafka producer and consumer

use super::{BrokerConsumer, BrokerError, BrokerRecord, EventPublisher};
use crate::config::KafkaConfig;
use crate::event::PriceEvent;
use crate::telemetry::{increment, CounterMetric};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::{Message, Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a partition seek
const SEEK_TIMEOUT: Duration = Duration::from_secs(10);

/// Idempotent Kafka producer shared by all symbol tasks
///
/// `FutureProducer` is internally reference counted and safe for concurrent
/// sends, so clones share one connection.
#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaPublisher {
    /// Create a producer with all-replica acks and idempotence enabled
    pub fn new(config: &KafkaConfig) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("retries", config.producer_retries.to_string())
            .set("linger.ms", config.linger_ms.to_string())
            .set("batch.size", config.batch_size.to_string())
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()?;

        tracing::info!(
            brokers = %config.bootstrap_servers,
            topic = %config.topic,
            "Kafka producer created"
        );

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, event: &PriceEvent) -> Result<(), BrokerError> {
        let payload = event.to_json_bytes()?;
        let record = FutureRecord::to(&self.topic)
            .key(event.key())
            .payload(&payload);

        // Enqueue only; the delivery report is awaited off the receive loop
        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _record)| BrokerError::Kafka(e))?;

        let symbol = event.symbol.clone();
        let event_time = event.event_time;
        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok((partition, offset))) => {
                    tracing::trace!(%symbol, event_time, partition, offset, "Event delivered");
                }
                Ok(Err((e, _message))) => {
                    increment(CounterMetric::PublishErrors);
                    tracing::error!(
                        %symbol,
                        event_time,
                        error = %e,
                        "Publish failed after retries, event dropped"
                    );
                }
                Err(_canceled) => {
                    tracing::warn!(%symbol, event_time, "Producer closed before delivery report");
                }
            }
        });

        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<(), BrokerError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| BrokerError::Task(e.to_string()))??;
        Ok(())
    }
}

/// Kafka consumer group member with manual, synchronous offset commits
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
}

impl KafkaConsumer {
    /// Create a consumer and subscribe it to the configured topic
    pub fn new(config: &KafkaConfig) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        tracing::info!(
            brokers = %config.bootstrap_servers,
            topic = %config.topic,
            group = %config.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }
}

#[async_trait]
impl BrokerConsumer for KafkaConsumer {
    async fn poll(&self, wait: Duration) -> Result<Option<BrokerRecord>, BrokerError> {
        match tokio::time::timeout(wait, self.consumer.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Err(e)) => Err(BrokerError::Kafka(e)),
            Ok(Ok(msg)) => Ok(Some(BrokerRecord {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
                key: msg.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: msg.payload().map(<[u8]>::to_vec),
            })),
        }
    }

    async fn commit(&self, record: &BrokerRecord) -> Result<(), BrokerError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &record.topic,
            record.partition,
            Offset::Offset(record.offset + 1),
        )?;

        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || consumer.commit(&tpl, CommitMode::Sync))
            .await
            .map_err(|e| BrokerError::Task(e.to_string()))??;
        Ok(())
    }

    async fn rewind(&self, record: &BrokerRecord) -> Result<(), BrokerError> {
        let consumer = Arc::clone(&self.consumer);
        let topic = record.topic.clone();
        let partition = record.partition;
        let offset = record.offset;
        tokio::task::spawn_blocking(move || {
            consumer.seek(&topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
        })
        .await
        .map_err(|e| BrokerError::Task(e.to_string()))??;
        Ok(())
    }
}
