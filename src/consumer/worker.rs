//! Trade consumer worker

use super::types::{ConsumerError, ConsumerStats};
use crate::broker::{BrokerConsumer, BrokerRecord};
use crate::config::ConsumerConfig;
use crate::event::PriceEvent;
use crate::store::{StoreError, TradeStore, UpsertOutcome};
use crate::telemetry::{increment, record_latency, CounterMetric, LatencyMetric};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// What happened to one broker record
#[derive(Debug)]
enum Delivery {
    /// Unit of work committed; offset may advance
    Persisted,
    /// Payload can never be persisted; offset may advance
    Skipped,
    /// Unit of work rolled back; offset must not advance
    Failed(StoreError),
}

/// Reads the topic and persists each event before committing its offset
///
/// A crash between persisting and committing causes a redelivery, which the
/// store absorbs as a duplicate. A persistence failure rewinds the partition
/// so the same record is retried before anything after it.
pub struct TradeConsumer<C, S> {
    worker_id: usize,
    consumer: C,
    store: Arc<S>,
    config: ConsumerConfig,
    stats: ConsumerStats,
}

impl<C: BrokerConsumer, S: TradeStore> TradeConsumer<C, S> {
    pub fn new(worker_id: usize, consumer: C, store: Arc<S>, config: ConsumerConfig) -> Self {
        Self {
            worker_id,
            consumer,
            store,
            config,
            stats: ConsumerStats::default(),
        }
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    /// Consume until shutdown or a sustained store outage
    ///
    /// Shutdown is only observed between records, so a unit of work and its
    /// offset commit are never separated by cancellation. A record whose
    /// rewind fails is held and retried in place; nothing after it in the
    /// partition is polled until it is persisted.
    pub async fn run(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<ConsumerStats, ConsumerError> {
        let worker = self.worker_id;
        let mut unavailable_streak = 0u32;
        let mut held: Option<BrokerRecord> = None;

        tracing::info!(worker, "Starting consumer...");

        loop {
            let record = match held.take() {
                Some(record) => record,
                None => {
                    let polled = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        polled = self.consumer.poll(self.config.poll_timeout()) => polled,
                    };

                    match polled {
                        Ok(Some(record)) => {
                            self.stats.consumed += 1;
                            increment(CounterMetric::Consumed);
                            record
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            self.stats.broker_errors += 1;
                            increment(CounterMetric::BrokerErrors);
                            tracing::error!(worker, error = %e, "Consumer error");
                            continue;
                        }
                    }
                }
            };

            match self.process(&record).await {
                Delivery::Persisted | Delivery::Skipped => {
                    unavailable_streak = 0;
                    self.commit(&record).await;
                }
                Delivery::Failed(error) => {
                    // Only resource-level failures count toward escalation
                    if error.is_unavailable() {
                        unavailable_streak += 1;
                    } else {
                        unavailable_streak = 0;
                    }

                    if self.config.max_consecutive_failures > 0
                        && unavailable_streak >= self.config.max_consecutive_failures
                    {
                        tracing::error!(
                            worker,
                            failures = unavailable_streak,
                            error = %error,
                            partition = record.partition,
                            offset = record.offset,
                            "Trade store unavailable, stopping worker; operator attention required"
                        );
                        return Err(ConsumerError::StoreUnavailable {
                            worker,
                            failures: unavailable_streak,
                            source: error,
                        });
                    }

                    if let Err(e) = self.consumer.rewind(&record).await {
                        tracing::warn!(
                            worker,
                            error = %e,
                            partition = record.partition,
                            offset = record.offset,
                            "Rewind failed, retrying record in place"
                        );
                        held = Some(record);
                    }

                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.retry_delay()) => {}
                    }
                }
            }
        }

        tracing::info!(
            worker,
            consumed = self.stats.consumed,
            persisted = self.stats.persisted,
            duplicates = self.stats.duplicates,
            "Stopping consumer..."
        );
        Ok(self.stats.clone())
    }

    /// Decode and persist one record
    async fn process(&mut self, record: &BrokerRecord) -> Delivery {
        let worker = self.worker_id;

        let Some(payload) = record.payload.as_deref() else {
            self.stats.skipped += 1;
            increment(CounterMetric::Skipped);
            tracing::warn!(
                worker,
                partition = record.partition,
                offset = record.offset,
                "Empty payload skipped"
            );
            return Delivery::Skipped;
        };

        let event = match PriceEvent::from_json_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                self.stats.skipped += 1;
                increment(CounterMetric::Skipped);
                tracing::warn!(
                    worker,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Undecodable payload skipped"
                );
                return Delivery::Skipped;
            }
        };

        let started = Instant::now();
        let result = self.store.upsert(&event).await;
        record_latency(LatencyMetric::Persist, started.elapsed());

        match result {
            Ok(outcome) => {
                match outcome {
                    UpsertOutcome::Inserted => {
                        self.stats.persisted += 1;
                        increment(CounterMetric::Persisted);
                    }
                    UpsertOutcome::Duplicate => {
                        self.stats.duplicates += 1;
                        increment(CounterMetric::Duplicates);
                        tracing::debug!(
                            worker,
                            symbol = %event.symbol,
                            event_time = event.event_time,
                            "Duplicate delivery ignored"
                        );
                    }
                }
                Delivery::Persisted
            }
            Err(e) => {
                self.stats.persist_failures += 1;
                increment(CounterMetric::PersistFailures);
                tracing::error!(
                    worker,
                    symbol = %event.symbol,
                    event_time = event.event_time,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Error inserting trade"
                );
                Delivery::Failed(e)
            }
        }
    }

    /// Synchronously commit the offset after `record`
    async fn commit(&mut self, record: &BrokerRecord) {
        let started = Instant::now();
        match self.consumer.commit(record).await {
            Ok(()) => {
                record_latency(LatencyMetric::OffsetCommit, started.elapsed());
                self.stats.commits += 1;
                increment(CounterMetric::OffsetCommits);
            }
            Err(e) => {
                // The row is durable; a redelivery will be absorbed as a duplicate
                self.stats.commit_errors += 1;
                increment(CounterMetric::CommitErrors);
                tracing::warn!(
                    worker = self.worker_id,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Offset commit failed"
                );
            }
        }
    }
}
